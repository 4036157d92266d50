//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps ledger, crypto, and canonicalization errors to HTTP status codes.
//!
//! ## Security Invariant
//!
//! Every error response body is the literal `{}`. The reason for a
//! rejection goes to the server log only: a client cannot tell an unknown
//! group from a group it is not a member of, or an unknown key from a bad
//! signature beyond the status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grader_core::CanonicalError;
use grader_crypto::{CryptoError, KeyError, VerifyError};
use grader_ledger::LedgerError;
use thiserror::Error;

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing field, bad base64, unparseable payload (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The claimed key id is neither a registered user nor an operator key (403).
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),

    /// Signature did not verify, or the nonce was stale or replayed (403).
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    /// The authenticated identity lacks a required membership (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resubmission under a different group than the one first bound (403).
    #[error("ownership conflict: {0}")]
    OwnershipConflict(String),

    /// Unexpected fault (500).
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::UnknownIdentity(_) => (StatusCode::FORBIDDEN, "UNKNOWN_IDENTITY"),
            Self::SignatureInvalid(_) => (StatusCode::FORBIDDEN, "SIGNATURE_INVALID"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::OwnershipConflict(_) => (StatusCode::FORBIDDEN, "OWNERSHIP_CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        match &self {
            Self::Internal(_) => tracing::error!(code, error = %self, "request failed"),
            _ => tracing::warn!(code, reason = %self, "request rejected"),
        }
        (status, Json(serde_json::json!({}))).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::InvalidPayload(_) => Self::BadRequest(err.to_string()),
            LedgerError::OwnershipConflict { .. } => Self::OwnershipConflict(err.to_string()),
            LedgerError::UnknownGroup(_)
            | LedgerError::UnknownModule(_)
            | LedgerError::UnknownQuestion { .. }
            | LedgerError::NotMember { .. }
            | LedgerError::AdminGroupMismatch { .. }
            | LedgerError::KeyInUse { .. }
            | LedgerError::TryLimitExceeded { .. } => Self::Forbidden(err.to_string()),
        }
    }
}

impl From<VerifyError> for AppError {
    fn from(err: VerifyError) -> Self {
        match &err {
            VerifyError::UnknownKey(_) => Self::UnknownIdentity(err.to_string()),
            VerifyError::SignatureInvalid => Self::SignatureInvalid(err.to_string()),
            VerifyError::Malformed(_) => Self::BadRequest(err.to_string()),
        }
    }
}

/// Key errors reaching a handler come from client-supplied key material.
impl From<KeyError> for AppError {
    fn from(err: KeyError) -> Self {
        match &err {
            KeyError::Malformed(_) => Self::BadRequest(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// A payload type the hasher cannot encode is a programming error.
impl From<CanonicalError> for AppError {
    fn from(err: CanonicalError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Key(e) => e.into(),
            CryptoError::Verify(e) => e.into(),
            CryptoError::Canonical(e) => e.into(),
        }
    }
}
