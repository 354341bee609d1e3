use axum::Router;

use crate::Scheduler;

mod aggregates;
mod health;
mod readings;

// ---

pub fn router(scheduler: Scheduler) -> Router {
    // ---
    Router::new()
        .merge(aggregates::router())
        .merge(readings::router())
        .merge(health::router())
        .with_state(scheduler)
}
