//! # Signed Envelope
//!
//! The wire body a client sends for a typed payload:
//!
//! ```json
//! {
//!   "Payload": { ... },
//!   "Signature": { "nonce": "1700000000", "kid": "<hex>", "ecdas": "<base64>", "digest": "<hex>" }
//! }
//! ```
//!
//! `digest` is present only when the signer was built with
//! `with_digest(true)`. It is the SHA-256 of the signing message and is
//! informational: verifiers never read it.

use grader_core::KeyId;
use serde::{Deserialize, Deserializer, Serialize};

/// A payload together with the signature that binds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    #[serde(rename = "Payload")]
    pub payload: P,
    #[serde(rename = "Signature")]
    pub signature: SignatureBlock,
}

/// Signature metadata carried next to the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    /// Decimal nonce exactly as it appears in the signing message.
    #[serde(deserialize_with = "nonce_text")]
    pub nonce: String,
    pub kid: KeyId,
    /// Base64 DER ECDSA-SHA256 signature.
    pub ecdas: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Signature over a flat list of endpoint fields, as used in the
/// request bodies of the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedFields {
    pub nonce: i64,
    pub public_key_id: KeyId,
    pub signature: String,
}

// Older clients emit the nonce as a JSON number.
fn nonce_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let env = Envelope {
            payload: serde_json::json!({"Name": "G"}),
            signature: SignatureBlock {
                nonce: "1700000000".into(),
                kid: KeyId::new("abcd").unwrap(),
                ecdas: "c2ln".into(),
                digest: None,
            },
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Payload": {"Name": "G"},
                "Signature": {"nonce": "1700000000", "kid": "abcd", "ecdas": "c2ln"}
            })
        );
    }

    #[test]
    fn test_numeric_nonce_accepted() {
        let raw = r#"{"Payload":{},"Signature":{"nonce":17,"kid":"abcd","ecdas":"x"}}"#;
        let env: Envelope<serde_json::Value> = serde_json::from_str(raw).unwrap();
        assert_eq!(env.signature.nonce, "17");
    }
}
