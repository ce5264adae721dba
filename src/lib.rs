pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod filters;
pub mod query;
pub mod state;
pub mod warehouse;
