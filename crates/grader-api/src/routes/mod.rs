//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area.
//! Routers are assembled in `lib.rs` into the application.

pub mod answer;
pub mod group;
pub mod module;
pub mod question;
pub mod user;

use axum::http::StatusCode;

/// 201 for a newly created row, 200 for an update or match.
pub(crate) fn upsert_status(created: bool) -> StatusCode {
    if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}
