use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Warehouse request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which client-facing failure an error collapses into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The warehouse rejected or failed the query.
    Query,
    /// Anything else that went wrong while handling the request.
    Internal,
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Query => "Database query failed.",
            ErrorKind::Internal => "Internal server error.",
        }
    }
}

impl Error {
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Query(_) | Error::Database(_) | Error::Http(_) | Error::Timeout(_) => {
                ErrorKind::Query
            }
            Error::Config(_) | Error::Json(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Body returned for every failed data request.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub message: &'static str,
}

impl From<ErrorKind> for ErrorEnvelope {
    fn from(kind: ErrorKind) -> Self {
        Self {
            status: "error",
            message: kind.message(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorEnvelope::from(self.kind())),
        )
            .into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
