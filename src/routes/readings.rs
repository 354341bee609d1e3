use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;
use tracing::{error, info};

use crate::{parse_readings, RawReading, Scheduler};

// ---

pub fn router() -> Router<Scheduler> {
    // ---
    Router::new().route("/readings", post(handler))
}

/// Response body for `POST /readings`
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Upsert a JSON array of readings. Records with a malformed timestamp are
/// skipped and counted; the rest are stored in one transaction.
async fn handler(
    State(scheduler): State<Scheduler>,
    Json(raw): Json<Vec<RawReading>>,
) -> impl IntoResponse {
    // ---
    info!("POST /readings - {} records", raw.len());

    let (readings, skipped) = parse_readings(&raw);

    match scheduler.ingest(&readings).await {
        Ok(imported) => {
            info!("Stored {} readings, skipped {}", imported, skipped);
            (StatusCode::OK, Json(IngestSummary { imported, skipped })).into_response()
        }
        Err(e) => {
            error!("Failed to store readings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json("Failed to store readings"),
            )
                .into_response()
        }
    }
}
