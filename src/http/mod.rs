//! The HTTP boundary: out of scope for correctness per the spec, but still
//! built as a thin axum surface the core `Broker` is designed against.

mod dto;
mod error;
mod handlers;

use axum::routing::{get, post};
use axum::Router;

use crate::broker::Broker;

pub fn router(broker: Broker) -> Router {
    Router::new()
        .route("/api/v2/generate/text/async", post(handlers::submit_async))
        .route("/api/v2/generate/text/status/:id", get(handlers::status))
        .route("/api/v2/generate/text/pop", post(handlers::pop))
        .route("/api/v2/generate/text/submit/:id", post(handlers::submit_generation))
        .route("/api/v2/status/models", get(handlers::models))
        .route("/api/v2/kudos/transfer", post(handlers::kudos_transfer))
        .with_state(broker)
}
