use std::time::Duration;

use config::{Config, ConfigError, Environment};
use regex::Regex;
use serde::Deserialize;

pub const BIGQUERY_PUBLIC_TABLE: &str = "bigquery-public-data.san_francisco_311.311_service_requests";
pub const SQLITE_TABLE: &str = "service_requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    BigQuery,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub backend: Backend,

    /// Fully qualified table name; falls back to the backend's default.
    pub table: Option<String>,

    pub bigquery_project_id: Option<String>,
    pub bigquery_access_token: Option<String>,

    #[serde(default = "default_bigquery_api_url")]
    pub bigquery_api_url: String,

    pub bigquery_location: Option<String>,

    pub database_url: Option<String>,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_bigquery_api_url() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".to_string()
}

fn default_query_timeout() -> u64 {
    30
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SF311")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would leave the warehouse unusable or put
    /// arbitrary text into the SQL templates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let table_pattern = Regex::new(r"^[A-Za-z0-9_.\-]+$")
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        if !table_pattern.is_match(self.table()) {
            return Err(ConfigError::Message(format!(
                "invalid table name: {:?}",
                self.table()
            )));
        }

        if self.backend == Backend::BigQuery && self.bigquery_project_id.is_none() {
            return Err(ConfigError::Message(
                "bigquery_project_id is required for the bigquery backend".to_string(),
            ));
        }

        if self.query_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "query_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn table(&self) -> &str {
        match (&self.table, self.backend) {
            (Some(table), _) => table,
            (None, Backend::BigQuery) => BIGQUERY_PUBLIC_TABLE,
            (None, Backend::Sqlite) => SQLITE_TABLE,
        }
    }

    pub fn database_url(&self) -> &str {
        self.database_url
            .as_deref()
            .unwrap_or("sqlite:sf311.db?mode=rwc")
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}
