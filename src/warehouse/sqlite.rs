//! Local SQLite mirror of the service request dataset.
//!
//! Used for development and tests. sqlx binds SQLite parameters by position,
//! so named placeholders are rewritten to `?` and values are looked up by
//! name in order of appearance.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use super::{Row, Warehouse};
use crate::error::{Error, Result};
use crate::query::{to_positional, Dialect, ParameterType, QueryParameter};

pub async fn create_pool(url: &str) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let sql = include_str!("../../migrations/sqlite/001_service_requests.sql");
    sqlx::raw_sql(sql).execute(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewServiceRequest {
    pub created_date: NaiveDateTime,
    pub closed_date: Option<NaiveDateTime>,
    pub category: String,
}

pub async fn insert_request<'e, E>(executor: E, input: &NewServiceRequest) -> Result<i64>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let result = sqlx::query(
        "INSERT INTO service_requests (created_date, closed_date, category) VALUES (?, ?, ?)",
    )
    .bind(input.created_date)
    .bind(input.closed_date)
    .bind(&input.category)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

#[derive(Clone)]
pub struct SqliteWarehouse {
    pool: SqlitePool,
    table: String,
}

impl SqliteWarehouse {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn run(&self, sql: &str, parameters: &[QueryParameter]) -> Result<Vec<Row>> {
        let (positional, names) = to_positional(sql);

        let mut query = sqlx::query(&positional);
        for name in &names {
            let param = parameters
                .iter()
                .find(|p| p.name == name)
                .ok_or_else(|| Error::query(format!("no value bound for @{name}")))?;

            query = match param.param_type {
                // Enforce the declared type the way the warehouse would on cast
                ParameterType::Date => {
                    let date = NaiveDate::parse_from_str(&param.value, "%Y-%m-%d").map_err(|e| {
                        Error::query(format!(
                            "invalid {} value {:?} for @{name}: {e}",
                            param.param_type.as_str(),
                            param.value
                        ))
                    })?;
                    query.bind(date)
                }
                ParameterType::String => query.bind(param.value.clone()),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        debug!(placeholders = ?names, rows = rows.len(), "sqlite query complete");

        rows.iter().map(decode_row).collect()
    }
}

/// Decode failures mean the result has an unexpected shape, not that the
/// query failed.
fn decode_row(row: &SqliteRow) -> Result<Row> {
    row.columns()
        .iter()
        .map(|column| -> Result<(String, Value)> {
            let idx = column.ordinal();
            let name = column.name();
            let undecodable =
                |e: sqlx::Error| Error::internal(format!("cannot decode column {name}: {e}"));

            let raw = row.try_get_raw(idx).map_err(undecodable)?;
            let value = if raw.is_null() {
                Value::Null
            } else {
                match raw.type_info().name() {
                    "INTEGER" => Value::from(row.try_get::<i64, _>(idx).map_err(undecodable)?),
                    "REAL" => Value::from(row.try_get::<f64, _>(idx).map_err(undecodable)?),
                    "BLOB" => {
                        return Err(Error::internal(format!(
                            "unexpected BLOB in column {name}"
                        )))
                    }
                    _ => Value::from(row.try_get::<String, _>(idx).map_err(undecodable)?),
                }
            };
            Ok((name.to_string(), value))
        })
        .collect()
}
