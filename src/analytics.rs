use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::filters::FilterParams;
use crate::query::{build_where, Template, TimeBucket};
use crate::warehouse::{Row, Warehouse};

/// Number of requests created on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub created_date: NaiveDate,
    pub count: u64,
}

/// Number of requests whose resolution time fell into one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DurationBucket {
    pub time_bucket: TimeBucket,
    pub count: u64,
}

/// Requests per day in the filtered range, ascending by date. Days without
/// requests are absent.
pub async fn daily_counts(
    warehouse: &dyn Warehouse,
    filters: &FilterParams,
    timeout: Duration,
) -> Result<Vec<DailyCount>> {
    let rows = execute(warehouse, Template::DailyCounts, filters, timeout).await?;
    rows.iter()
        .map(|row| -> Result<DailyCount> {
            let day = row.get_str("created_date")?;
            let created_date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|e| Error::internal(format!("unexpected date {day:?}: {e}")))?;
            Ok(DailyCount {
                created_date,
                count: count(row, "date_category_count")?,
            })
        })
        .collect()
}

/// Requests per resolution-time bucket, in the order the warehouse returned
/// them (bucket rank). Empty buckets are absent.
pub async fn resolution_histogram(
    warehouse: &dyn Warehouse,
    filters: &FilterParams,
    timeout: Duration,
) -> Result<Vec<DurationBucket>> {
    let rows = execute(warehouse, Template::ResolutionHistogram, filters, timeout).await?;
    let buckets = rows
        .iter()
        .map(|row| -> Result<DurationBucket> {
            let label = row.get_str("time_bucket")?;
            let time_bucket = TimeBucket::from_label(label)
                .ok_or_else(|| Error::internal(format!("unknown time bucket {label:?}")))?;
            Ok(DurationBucket {
                time_bucket,
                count: count(row, "count")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(busiest) = buckets.iter().max_by_key(|b| b.count) {
        debug!(
            buckets = buckets.len(),
            busiest = %busiest.time_bucket,
            "resolution histogram decoded"
        );
    }
    Ok(buckets)
}

async fn execute(
    warehouse: &dyn Warehouse,
    template: Template,
    filters: &FilterParams,
    timeout: Duration,
) -> Result<Vec<Row>> {
    let bound = build_where(filters);
    let sql = template.render(warehouse.dialect(), warehouse.table(), &bound);
    debug!(
        template = template.name(),
        parameters = ?bound.placeholders(),
        "running analytics query"
    );

    tokio::time::timeout(timeout, warehouse.run(&sql, &bound.parameters))
        .await
        .map_err(|_| Error::Timeout(timeout))?
}

fn count(row: &Row, column: &str) -> Result<u64> {
    let n = row.get_i64(column)?;
    u64::try_from(n).map_err(|_| Error::internal(format!("negative {column}: {n}")))
}
