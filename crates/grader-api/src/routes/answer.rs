//! # Answers
//!
//! - `PUT /v1/answer/:ns/:module/:name` — submit an answer for grading
//!
//! Signed fields: `kid, module, name, group_name, data, nonce`.
//!
//! The caller must be a member of `group_name`. The payload then goes
//! through the submission ledger: identical bytes for the same question
//! share one result row, and a submitter's answers to a question stay
//! under the group they first answered with.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use grader_core::ContentDigest;
use grader_ledger::SubmitRequest;
use serde::{Deserialize, Serialize};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_name, require_text, Credentials, Validate};
use crate::routes::upsert_status;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub group_name: String,
    /// Base64 answer payload.
    pub data: String,
    #[serde(flatten)]
    pub auth: Credentials,
}

impl Validate for AnswerRequest {
    fn validate(&self) -> Result<(), String> {
        require_name("group_name", &self.group_name)?;
        require_text("data", &self.data)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    /// Answer (ownership) id.
    pub oid: i64,
    /// Result id shared by every identical submission.
    pub score_id: i64,
    pub digest: ContentDigest,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/answer/:ns/:module/:name", put(submit_answer))
}

/// PUT /v1/answer/:ns/:module/:name
async fn submit_answer(
    State(state): State<AppState>,
    Path((ns, module, name)): Path<(String, String, String)>,
    body: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AnswerResponse>), AppError> {
    state.check_namespace(&ns)?;
    let req = extract_validated_json(body)?;
    let kid = authenticate(
        &state,
        &req.auth,
        &[
            req.auth.public_key_id.as_str(),
            module.as_str(),
            name.as_str(),
            req.group_name.as_str(),
            req.data.as_str(),
        ],
    )?;

    if !state.registry.is_member(&req.group_name, &kid)? {
        return Err(AppError::Forbidden(format!(
            "{kid} is not a member of group {:?}",
            req.group_name
        )));
    }
    let question = state.registry.question(&module, &name)?;
    let receipt = state.ledger.submit(SubmitRequest {
        namespace: state.config.namespace.as_str(),
        question: &question,
        payload_b64: &req.data,
        submitter: &kid,
        group: &req.group_name,
    })?;

    Ok((
        upsert_status(receipt.created),
        Json(AnswerResponse {
            oid: receipt.answer_id,
            score_id: receipt.result_id,
            digest: receipt.digest,
        }),
    ))
}
