//! Analytical engine boundary.
//!
//! A [`Warehouse`] runs a SQL statement containing `@name` placeholders
//! together with the typed values for those placeholders, and hands back the
//! complete result set. Substitution always happens inside the engine.

pub mod bigquery;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::{Backend, Settings};
use crate::error::{Error, Result};
use crate::query::{Dialect, QueryParameter};

pub use bigquery::BigQueryClient;
pub use sqlite::SqliteWarehouse;

#[async_trait]
pub trait Warehouse: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Table the templates select from.
    fn table(&self) -> &str;

    /// Run `sql`, binding `parameters` by name, and collect every row in the
    /// order the engine returned them.
    async fn run(&self, sql: &str, parameters: &[QueryParameter]) -> Result<Vec<Row>>;
}

/// One result row, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Map<String, Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn get_str(&self, column: &str) -> Result<&str> {
        match self.get(column) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(other) => Err(Error::internal(format!(
                "column {column} is not a string: {other}"
            ))),
            None => Err(Error::internal(format!("missing column {column}"))),
        }
    }

    /// Integer column. BigQuery's REST API encodes INT64 as a JSON string, so
    /// numeric strings are accepted too.
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        let value = self
            .get(column)
            .ok_or_else(|| Error::internal(format!("missing column {column}")))?;
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| Error::internal(format!("column {column} is not an integer: {value}")))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Build the warehouse selected by `settings`.
pub async fn connect(settings: &Settings) -> Result<Arc<dyn Warehouse>> {
    match settings.backend {
        Backend::BigQuery => {
            let client = BigQueryClient::from_settings(settings)?;
            info!("Using BigQuery table {}", client.table());
            Ok(Arc::new(client))
        }
        Backend::Sqlite => {
            info!("Connecting to SQLite mirror...");
            let pool = sqlite::create_pool(settings.database_url()).await?;
            sqlite::run_migrations(&pool).await?;
            info!("Using SQLite table {}", settings.table());
            Ok(Arc::new(SqliteWarehouse::new(pool, settings.table())))
        }
    }
}
