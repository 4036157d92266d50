//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs, the [`Credentials`]
//! block every signed request carries, and helpers to extract + validate
//! JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use grader_core::KeyId;
use serde::Deserialize;

use crate::error::AppError;

/// Trait for request types that can validate their business rules
/// beyond what serde deserialization checks.
pub trait Validate {
    /// Validate business rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Identity, nonce and signature of a signed request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(alias = "kid")]
    pub public_key_id: KeyId,
    pub nonce: i64,
    pub signature: String,
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::BadRequest)?;
    Ok(value)
}

/// Reject empty or whitespace-only text fields.
pub fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

/// Names appear in request paths and signing messages.
pub fn require_name(field: &str, value: &str) -> Result<(), String> {
    require_text(field, value)?;
    if value.contains(['/', ':']) {
        return Err(format!("{field} must not contain '/' or ':'"));
    }
    Ok(())
}

pub fn require_base64(field: &str, value: &str) -> Result<(), String> {
    BASE64
        .decode(value)
        .map(|_| ())
        .map_err(|e| format!("{field} is not base64: {e}"))
}
