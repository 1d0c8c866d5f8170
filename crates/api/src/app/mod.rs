//! HTTP API application wiring (Axum router + store wiring).
//!
//! - `services.rs`: builds the stores and the `ReconcileEngine` from config
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: response DTOs
//! - `errors.rs`: consistent error responses

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use stockrecon_infra::reconcile::ReconcileEngine;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(engine: ReconcileEngine) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/admin", routes::router())
        .layer(ServiceBuilder::new().layer(Extension(engine)))
}
