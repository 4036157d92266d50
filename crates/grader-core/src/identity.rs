//! # Identity Newtypes
//!
//! Wire identifiers that the protocol compares byte-for-byte. Each one is
//! validated at construction so that a malformed identifier fails at the
//! request boundary instead of as a missed lookup deep in the ledger.
//!
//! ## Validation
//!
//! - [`KeyId`]: lowercase hex, even length, 2 to 64 characters (a SHA-256
//!   fingerprint truncated to 1..=32 bytes).
//! - [`Namespace`]: non-empty, at most 128 bytes, no `/`.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Hex fingerprint of a public key: the truncated SHA-256 of its DER
/// SubjectPublicKeyInfo encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyId(String);

impl KeyId {
    /// Parse a key id, validating the hex format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidKeyId`] if the string is not
    /// lowercase hex of an even length between 2 and 64.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// Build the key id of a digest truncated to `len` bytes.
    ///
    /// `len` is clamped to 1..=32.
    pub fn from_digest_prefix(digest: &[u8; 32], len: usize) -> Self {
        let len = len.clamp(1, 32);
        Self(hex::encode(&digest[..len]))
    }

    fn validate(s: &str) -> Result<(), ValidationError> {
        let ok = (2..=64).contains(&s.len())
            && s.len() % 2 == 0
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if ok {
            Ok(())
        } else {
            Err(ValidationError::InvalidKeyId(s.to_string()))
        }
    }

    /// The lowercase hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of fingerprint bytes this id encodes.
    pub fn byte_len(&self) -> usize {
        self.0.len() / 2
    }
}

impl TryFrom<String> for KeyId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<KeyId> for String {
    fn from(id: KeyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A grading namespace, the first component of every content digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    const MAX_LEN: usize = 128;

    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidNamespace`] for an empty string,
    /// one longer than 128 bytes, or one containing `/`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        if s.is_empty() || s.len() > Self::MAX_LEN || s.contains('/') {
            return Err(ValidationError::InvalidNamespace(s));
        }
        Ok(Self(s))
    }

    /// The namespace as it appears in request paths.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl TryFrom<String> for Namespace {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
