//! # Error Types — Structured Error Hierarchy
//!
//! Defines the error types shared across the grader stack. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Canonicalization errors are programmer errors: a payload type that
//!   produces an unsupported value is a bug in that type, and the request
//!   carrying it is aborted.
//! - Validation errors name the offending input so the server can log it;
//!   they are never echoed back to clients.

use thiserror::Error;

/// Top-level error type for `grader-core`.
#[derive(Error, Debug)]
pub enum GraderError {
    /// Canonical hashing failed.
    #[error("canonicalization error: {0}")]
    Canonical(#[from] CanonicalError),

    /// An identifier failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Error raised while turning a value into hash input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonicalError {
    /// The value has no canonical byte representation.
    #[error("unsupported type for hashing: {0}")]
    UnsupportedType(String),

    /// A timestamp carried no timezone information.
    #[error("timestamp has no timezone: {0}")]
    MissingTimezone(String),

    /// A timestamp string could not be parsed at all.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// NaN and infinities have no fixed-precision decimal form.
    #[error("non-finite float cannot be hashed: {0}")]
    NonFiniteFloat(f64),
}

/// Error raised by validated identifier constructors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Key id is not an even-length lowercase hex string of 2..=64 chars.
    #[error("invalid key id: {0:?}")]
    InvalidKeyId(String),

    /// Namespace is empty, too long, or contains a path separator.
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// Digest hex is not 64 hex characters.
    #[error("invalid digest: {0:?}")]
    InvalidDigest(String),
}
