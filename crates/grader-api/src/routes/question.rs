//! # Questions
//!
//! - `PUT /v1/question/:ns/:module/:name` — create a question or replace its grader
//!
//! Signed fields: `kid, module, name, data, max_try, nonce`. `data` is the
//! base64 grader blob; `max_try` is signed as its decimal text. The caller
//! must be a member of the module's admin group.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::authenticate;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_base64, require_name, Credentials, Validate};
use crate::routes::upsert_status;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    /// Base64 grader data.
    pub data: String,
    /// Distinct answers allowed per submitter; 0 means unlimited.
    #[serde(default)]
    pub max_try: i64,
    #[serde(flatten)]
    pub auth: Credentials,
}

impl Validate for QuestionRequest {
    fn validate(&self) -> Result<(), String> {
        require_base64("data", &self.data)?;
        if self.max_try < 0 {
            return Err(format!("max_try {} is negative", self.max_try));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub oid: i64,
    pub module: String,
    pub name: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/question/:ns/:module/:name", put(upsert_question))
}

/// PUT /v1/question/:ns/:module/:name
async fn upsert_question(
    State(state): State<AppState>,
    Path((ns, module, name)): Path<(String, String, String)>,
    body: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuestionResponse>), AppError> {
    state.check_namespace(&ns)?;
    require_name("name", &name).map_err(AppError::BadRequest)?;
    let req = extract_validated_json(body)?;
    let max_try = req.max_try.to_string();
    let kid = authenticate(
        &state,
        &req.auth,
        &[
            req.auth.public_key_id.as_str(),
            module.as_str(),
            name.as_str(),
            req.data.as_str(),
            max_try.as_str(),
        ],
    )?;

    let upsert = state
        .registry
        .upsert_question(&module, &name, &req.data, req.max_try, &kid)?;
    tracing::info!(module = %module, question = %name, max_try = req.max_try, created = upsert.created, "question upserted");
    Ok((
        upsert_status(upsert.created),
        Json(QuestionResponse {
            oid: upsert.record.id,
            module: upsert.record.module,
            name: upsert.record.name,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(data: &str, max_try: i64) -> QuestionRequest {
        serde_json::from_value(serde_json::json!({
            "public_key_id": "0a0b",
            "data": data,
            "max_try": max_try,
            "nonce": 1,
            "signature": "c2ln",
        }))
        .unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(request("Z3JhZGVy", 0).validate().is_ok());
        assert!(request("Z3JhZGVy", 3).validate().is_ok());
        assert!(request("Z3JhZGVy", -1).validate().is_err());
        assert!(request("***", 0).validate().is_err());
    }
}
