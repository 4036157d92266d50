//! # grader-api — Axum API Service
//!
//! HTTP front end of the submission protocol, built on Axum/Tower/Tokio.
//!
//! ## Routes
//!
//! - `PUT /v1/user/:ns` — register a user and its public key
//! - `PUT /v1/group/:ns` — create or touch a group
//! - `PUT /v1/group/:ns/:group/member` — add a group member
//! - `PUT /v1/module/:ns` — create or touch a module
//! - `PUT /v1/question/:ns/:module/:name` — create or update a question
//! - `PUT /v1/answer/:ns/:module/:name` — submit an answer
//! - `/health/*` — liveness and readiness probes (unauthenticated)
//!
//! ## Request Contract
//!
//! Bodies are flat JSON objects: the endpoint's fields plus `nonce`,
//! `public_key_id` (alias `kid`) and `signature`. Each route declares the
//! ordered list of fields it signs over; see the route modules.
//!
//! Successful responses carry an `oid`. Failures are `{}` with a 4xx or
//! 5xx status, and the reason is logged server-side only.
//!
//! ## Crate Policy
//!
//! - No business logic in route handlers — delegates to `grader-ledger`
//!   and `grader-crypto`.
//! - All errors map to HTTP responses via `AppError`.

pub mod auth;
pub mod error;
pub mod extractors;
pub mod replay;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::{AppConfig, AppState};

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::user::router())
        .merge(routes::group::router())
        .merge(routes::module::router())
        .merge(routes::question::router())
        .merge(routes::answer::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    Router::new().merge(health).merge(api)
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness() -> &'static str {
    "ready"
}
