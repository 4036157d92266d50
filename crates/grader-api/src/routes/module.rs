//! # Modules
//!
//! - `PUT /v1/module/:ns` — create or touch a module administered by a group
//!
//! Signed fields: `kid, name, admin_group, nonce`. The caller must be a
//! member of `admin_group`, and an existing module keeps its admin group.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_name, Credentials, Validate};
use crate::routes::upsert_status;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModuleRequest {
    pub name: String,
    pub admin_group: String,
    #[serde(flatten)]
    pub auth: Credentials,
}

impl Validate for ModuleRequest {
    fn validate(&self) -> Result<(), String> {
        require_name("name", &self.name)?;
        require_name("admin_group", &self.admin_group)
    }
}

/// The module id is the `oid`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModuleResponse {
    pub oid: i64,
    pub name: String,
    pub admin_group: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/module/:ns", put(upsert_module))
}

/// PUT /v1/module/:ns
async fn upsert_module(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    body: Result<Json<ModuleRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ModuleResponse>), AppError> {
    state.check_namespace(&ns)?;
    let req = extract_validated_json(body)?;
    let kid = authenticate(
        &state,
        &req.auth,
        &[
            req.auth.public_key_id.as_str(),
            req.name.as_str(),
            req.admin_group.as_str(),
        ],
    )?;

    let upsert = state
        .registry
        .upsert_module(&req.name, &req.admin_group, &kid)?;
    tracing::info!(module = %req.name, admin_group = %req.admin_group, created = upsert.created, "module upserted");
    Ok((
        upsert_status(upsert.created),
        Json(ModuleResponse {
            oid: upsert.record.id,
            name: upsert.record.name,
            admin_group: upsert.record.admin_group,
        }),
    ))
}
