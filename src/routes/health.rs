// src/routes/health.rs
//! Liveness endpoint for the rollup service.
//!
//! Exposes `GET /health` so process supervisors and CI can check that the
//! HTTP listener is up. The route sits next to the aggregate and ingest
//! routes in `routes/`:
//! - Private to this file: the handler and its response body
//! - Handed to the gateway (`mod.rs`): a subrouter holding `/health`
//!
//! It never touches the store, so it stays green while an aggregation cycle
//! is failing. Cycle failures show up in the logs, not here.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Body of a `/health` reply, always `{"status":"ok"}`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Handle `GET /health`.
///
/// Answers as soon as the listener accepts the request. No lock, no store
/// query, no dependency on the scheduler.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Subrouter with the `/health` route.
///
/// Generic over the gateway state `S` so it merges into a
/// `Router<Scheduler>` without needing the scheduler itself.
///
/// # Type Parameters
/// - `S`: state type of the router this one is merged into.
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health))
}
