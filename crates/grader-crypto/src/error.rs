//! # Cryptographic Error Types
//!
//! Structured errors for key handling and signature checks in
//! `grader-crypto`. Verification failures deliberately carry no detail
//! about *which* byte mismatched.

use std::path::PathBuf;

use grader_core::CanonicalError;
use thiserror::Error;

/// Errors from signing operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The payload could not be hashed.
    #[error("payload hashing failed: {0}")]
    Canonical(#[from] CanonicalError),
}

/// Errors from loading, generating, or decoding keys.
#[derive(Error, Debug)]
pub enum KeyError {
    /// No key file exists and creation was not requested.
    #[error("key not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding is not a P-256 key in a supported format.
    #[error("malformed key: {0}")]
    Malformed(String),

    /// Encrypted key without a password, or the wrong password.
    #[error("cannot decrypt private key {}", .0.display())]
    Decrypt(PathBuf),

    /// Key ring directory is readable by group or others.
    #[error("{} permissions are too open ({mode:o}), must be 0700", path.display())]
    InsecurePermissions { path: PathBuf, mode: u32 },
}

impl KeyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Outcome of a failed signature check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// No stored key for the claimed identity.
    #[error("unknown key id: {0}")]
    UnknownKey(String),

    /// Signature does not verify over the reconstructed message.
    #[error("signature invalid")]
    SignatureInvalid,

    /// Signature or key bytes could not be decoded.
    #[error("malformed signature input: {0}")]
    Malformed(String),
}
