//! Synthetic SF 311 data seeder for the SQLite mirror.
//!
//! Generates service requests spread over a date window, with exponentially
//! distributed resolution times and a share of requests left open.
//!
//! # Usage
//!
//! ```bash
//! # Seed the default database (sf311.db)
//! cargo run --release --bin seed
//!
//! # Seed with custom settings
//! cargo run --release --bin seed -- --db ./dev.db --requests 50000 --start 2025-09-01 --days 60
//!
//! # Then start the server against it:
//! SF311__BACKEND=sqlite SF311__DATABASE_URL=sqlite:./dev.db cargo run --release
//! ```

use std::path::PathBuf;
use std::time::Instant;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand_distr::Exp;

use sf311::warehouse::sqlite::{create_pool, insert_request, run_migrations, NewServiceRequest};

const CATEGORIES: &[&str] = &[
    "Street and Sidewalk Cleaning",
    "Graffiti",
    "Encampments",
    "Abandoned Vehicle",
    "Parking Enforcement",
    "Illegal Postings",
    "Sewer Issues",
    "Streetlights",
    "Tree Maintenance",
    "Noise Report",
    "General Request - PUBLIC WORKS",
    "Litter Receptacles",
];

/// Mean time to resolution, in hours.
const MEAN_RESOLUTION_HOURS: f64 = 40.0;

const BATCH_SIZE: usize = 5_000;

fn random_created(rng: &mut impl Rng, start: NaiveDate, days: u32) -> NaiveDateTime {
    let day = start + Duration::days(rng.random_range(0..days as i64));
    let seconds = rng.random_range(0..86_400);
    day.and_hms_opt(0, 0, 0).unwrap_or_default() + Duration::seconds(seconds)
}

fn random_request(
    rng: &mut impl Rng,
    exp: &Exp<f64>,
    start: NaiveDate,
    days: u32,
    unresolved_ratio: f64,
) -> NewServiceRequest {
    let created_date = random_created(rng, start, days);
    let closed_date = if rng.random_bool(unresolved_ratio) {
        None
    } else {
        let minutes = (rng.sample(exp) * 60.0) as i64;
        Some(created_date + Duration::minutes(minutes))
    };

    NewServiceRequest {
        created_date,
        closed_date,
        category: CATEGORIES[rng.random_range(0..CATEGORIES.len())].to_string(),
    }
}

fn print_usage() {
    eprintln!(
        r#"
Usage: seed [options]

Options:
  --db <path>          Database path (default: sf311.db)
  --requests <n>       Number of service requests (default: 20000)
  --start <date>       First creation date, YYYY-MM-DD (default: 2025-09-15)
  --days <n>           Days of history to generate (default: 45)
  --unresolved <ratio> Share of requests left open, 0.0-1.0 (default: 0.1)

Start the server against the seeded database with:
  SF311__BACKEND=sqlite SF311__DATABASE_URL=sqlite:<path> cargo run --release
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let mut db_path = PathBuf::from("sf311.db");
    let mut requests = 20_000usize;
    let mut start = NaiveDate::from_ymd_opt(2025, 9, 15).unwrap_or_default();
    let mut days = 45u32;
    let mut unresolved_ratio = 0.1f64;

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match (args[i].as_str(), value) {
            ("--db", Some(v)) => db_path = PathBuf::from(v),
            ("--requests", Some(v)) => requests = v.parse()?,
            ("--start", Some(v)) => start = NaiveDate::parse_from_str(v, "%Y-%m-%d")?,
            ("--days", Some(v)) => days = v.parse()?,
            ("--unresolved", Some(v)) => unresolved_ratio = v.parse()?,
            ("--help", _) | ("-h", _) => {
                print_usage();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown or incomplete option: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 2;
    }

    if days == 0 || !(0.0..=1.0).contains(&unresolved_ratio) {
        eprintln!("--days must be positive and --unresolved within 0.0-1.0");
        std::process::exit(1);
    }

    println!("{}", "=".repeat(60));
    println!("SF 311 - Data Seeder");
    println!("{}", "=".repeat(60));
    println!("Database: {}", db_path.display());
    println!("Requests: {}", requests);
    println!("Window: {} + {} days", start, days);
    println!("Unresolved ratio: {}", unresolved_ratio);
    println!();

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    let pool = create_pool(&db_url).await?;
    run_migrations(&pool).await?;

    let exp = Exp::new(1.0 / MEAN_RESOLUTION_HOURS)?;
    let mut rng = rand::rng();
    let started = Instant::now();

    let mut inserted = 0usize;
    while inserted < requests {
        let batch = BATCH_SIZE.min(requests - inserted);
        let mut tx = pool.begin().await?;
        for _ in 0..batch {
            let request = random_request(&mut rng, &exp, start, days, unresolved_ratio);
            insert_request(&mut *tx, &request).await?;
        }
        tx.commit().await?;
        inserted += batch;
        println!("  inserted {}/{}", inserted, requests);
    }

    println!(
        "\nSeeded {} requests in {:.2}s",
        inserted,
        started.elapsed().as_secs_f64()
    );
    println!("\nStart the server with:");
    println!(
        "  SF311__BACKEND=sqlite SF311__DATABASE_URL={} cargo run --release",
        db_url
    );

    Ok(())
}
