//! # Groups and Membership
//!
//! - `PUT /v1/group/:ns` — create a group, or touch one the caller belongs to
//! - `PUT /v1/group/:ns/:group/member` — add a member to a group
//!
//! Signed fields: `kid, name, nonce` and `kid, group, member_kid, nonce`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use grader_core::KeyId;
use serde::{Deserialize, Serialize};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_name, Credentials, Validate};
use crate::routes::upsert_status;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub name: String,
    #[serde(flatten)]
    pub auth: Credentials,
}

impl Validate for GroupRequest {
    fn validate(&self) -> Result<(), String> {
        require_name("name", &self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub member_kid: KeyId,
    #[serde(flatten)]
    pub auth: Credentials,
}

impl Validate for MemberRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupResponse {
    pub oid: i64,
    pub name: String,
    pub members: usize,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/group/:ns", put(upsert_group))
        .route("/v1/group/:ns/:group/member", put(add_member))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// PUT /v1/group/:ns — The creator becomes the first member.
async fn upsert_group(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    body: Result<Json<GroupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GroupResponse>), AppError> {
    state.check_namespace(&ns)?;
    let req = extract_validated_json(body)?;
    let kid = authenticate(
        &state,
        &req.auth,
        &[req.auth.public_key_id.as_str(), req.name.as_str()],
    )?;

    let upsert = state.registry.upsert_group(&req.name, &kid)?;
    tracing::info!(group = %req.name, kid = %kid, created = upsert.created, "group upserted");
    Ok((
        upsert_status(upsert.created),
        Json(GroupResponse {
            oid: upsert.record.id,
            name: upsert.record.name,
            members: upsert.record.members.len(),
        }),
    ))
}

/// PUT /v1/group/:ns/:group/member — An existing member adds a known identity.
async fn add_member(
    State(state): State<AppState>,
    Path((ns, group)): Path<(String, String)>,
    body: Result<Json<MemberRequest>, JsonRejection>,
) -> Result<Json<GroupResponse>, AppError> {
    state.check_namespace(&ns)?;
    let req = extract_validated_json(body)?;
    let kid = authenticate(
        &state,
        &req.auth,
        &[req.auth.public_key_id.as_str(), group.as_str(), req.member_kid.as_str()],
    )?;

    if !state.is_known_identity(&req.member_kid) {
        return Err(AppError::UnknownIdentity(format!("member {}", req.member_kid)));
    }
    let record = state.registry.add_member(&group, &kid, &req.member_kid)?;
    tracing::info!(group = %group, member = %req.member_kid, by = %kid, "member added");
    Ok(Json(GroupResponse {
        oid: record.id,
        name: record.name,
        members: record.members.len(),
    }))
}
