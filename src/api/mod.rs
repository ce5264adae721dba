use axum::{
    extract::{RawQuery, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

use crate::analytics;
use crate::error::{Error, ErrorKind};
use crate::filters::FilterParams;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RouteIndex {
    pub message: &'static str,
    pub endpoints: [&'static str; 2],
}

pub const ROUTE_INDEX: RouteIndex = RouteIndex {
    message: "SF 311 Service Requests API",
    endpoints: [
        "GET /api/complaints - Get number of complaints over time, by category.",
        "GET /api/complaints_resolution_data - Get data about time to resolution for complaints, by category.",
    ],
};

/// All routes with CORS and request tracing applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/", get(index))
        .route("/api/complaints", get(complaints))
        .route(
            "/api/complaints_resolution_data",
            get(complaints_resolution_data),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// GET /
pub async fn index() -> Json<RouteIndex> {
    Json(ROUTE_INDEX)
}

/// GET /api/complaints
pub async fn complaints(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let filters = FilterParams::from_query_string(query.as_deref());

    match analytics::daily_counts(
        state.warehouse.as_ref(),
        &filters,
        state.settings.query_timeout(),
    )
    .await
    {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => failure("daily complaint counts", &filters, e),
    }
}

/// GET /api/complaints_resolution_data
pub async fn complaints_resolution_data(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    let filters = FilterParams::from_query_string(query.as_deref());

    match analytics::resolution_histogram(
        state.warehouse.as_ref(),
        &filters,
        state.settings.query_timeout(),
    )
    .await
    {
        Ok(buckets) => Json(buckets).into_response(),
        Err(e) => failure("resolution histogram", &filters, e),
    }
}

/// Log the full error and answer with the generic envelope for its kind.
fn failure(what: &str, filters: &FilterParams, e: Error) -> Response {
    match e.kind() {
        ErrorKind::Query => error!(?filters, "Warehouse error fetching {}: {}", what, e),
        ErrorKind::Internal => error!(?filters, "Internal error fetching {}: {}", what, e),
    }
    e.into_response()
}
