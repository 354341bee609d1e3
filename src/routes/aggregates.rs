//! Read endpoints for the stored hourly and daily buckets.
//!
//! These handlers only read, so they do not take the scheduler's write lock.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tracing::{debug, error};

use crate::{Granularity, Scheduler};

// ---

pub fn router() -> Router<Scheduler> {
    // ---
    Router::new()
        .route("/aggregates/hourly", get(hourly))
        .route("/aggregates/daily", get(daily))
}

async fn hourly(State(scheduler): State<Scheduler>) -> impl IntoResponse {
    list(&scheduler, Granularity::Hourly).await
}

async fn daily(State(scheduler): State<Scheduler>) -> impl IntoResponse {
    list(&scheduler, Granularity::Daily).await
}

async fn list(scheduler: &Scheduler, granularity: Granularity) -> axum::response::Response {
    // ---
    match scheduler.store().list_buckets(granularity).await {
        Ok(buckets) => {
            debug!("GET /aggregates/{} - {} buckets", granularity, buckets.len());
            (StatusCode::OK, Json(buckets)).into_response()
        }
        Err(e) => {
            error!("Failed to list {} buckets: {}", granularity, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to load buckets"),
            )
                .into_response()
        }
    }
}
