//! # Content Digest — Content-Addressed Identifiers
//!
//! Defines `ContentDigest`, the 32-byte SHA-256 value used both as the
//! canonical hash of signable payloads and as the deduplication key of
//! graded results.
//!
//! ## Submission Digest
//!
//! A submission's content digest is
//! `SHA256(namespace || question_name || base64_payload)`, computed over
//! the base64 text exactly as it arrived on the wire. Two byte-identical
//! answers to the same question in the same namespace always collide;
//! that collision is what deduplication relies on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// A raw 32-byte SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32 digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex digest.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|_| ValidationError::InvalidDigest(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 of raw bytes.
pub fn sha256(data: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(data).into())
}

/// Compute the deduplication digest of a submitted payload.
///
/// `payload_b64` must be the base64 text as received, not a re-encoding
/// of the decoded bytes.
pub fn content_digest(namespace: &str, question_name: &str, payload_b64: &str) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(question_name.as_bytes());
    hasher.update(payload_b64.as_bytes());
    ContentDigest(hasher.finalize().into())
}
