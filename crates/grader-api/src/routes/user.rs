//! # User Registration
//!
//! - `PUT /v1/user/:ns` — register a user, update its username, or rotate its key
//!
//! Signed fields: `username`, `email`, `public_key`, `nonce`.
//!
//! The signature is checked against the key in the body: the fingerprint
//! of that key *becomes* the identity. An email already registered under
//! a different key is a key rotation and additionally needs
//! `reset_signature`, the same signing message signed by the stored key.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::{Json, Router};
use grader_core::KeyId;
use grader_crypto::PublicKey;
use grader_ledger::{NewUser, UserRecord};
use serde::{Deserialize, Serialize};

use crate::auth::check_fresh;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_name, require_text, Validate};
use crate::routes::upsert_status;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
    pub email: String,
    /// Base64 DER SubjectPublicKeyInfo, or base64 of a PEM block.
    pub public_key: String,
    pub nonce: i64,
    pub signature: String,
    /// Signature by the currently stored key; required to change keys.
    #[serde(default)]
    pub reset_signature: Option<String>,
}

impl Validate for UserRequest {
    fn validate(&self) -> Result<(), String> {
        require_name("username", &self.username)?;
        require_name("email", &self.email)?;
        if !self.email.contains('@') {
            return Err(format!("email {:?} has no '@'", self.email));
        }
        require_text("public_key", &self.public_key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub oid: i64,
    pub public_key_id: KeyId,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/user/:ns", put(register_user))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// PUT /v1/user/:ns — Register or update a user.
async fn register_user(
    State(state): State<AppState>,
    Path(ns): Path<String>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    state.check_namespace(&ns)?;
    let req = extract_validated_json(body)?;

    let key = PublicKey::decode_b64(&req.public_key)?;
    let kid = key.fingerprint(state.config.kid_bytes);
    let nonce = req.nonce.to_string();
    let fields = [req.username.as_str(), req.email.as_str(), req.public_key.as_str()];
    state
        .verifier
        .verify_with_key(&fields, &nonce, &req.signature, &key)?;
    check_fresh(&state, &kid, req.nonce)?;

    // Verify a rotation against the stored key before taking the registry
    // write lock; the closure below only re-checks the key id under it.
    let rotating_from = match state.registry.user_by_email(&req.email) {
        Some(user) if user.key_id != kid => {
            let reset = req.reset_signature.as_deref().ok_or_else(|| {
                AppError::Forbidden(format!("user {} changes key without reset_signature", user.id))
            })?;
            let stored = PublicKey::from_der(&user.public_key_der)
                .map_err(|e| AppError::Internal(format!("stored key of user {}: {e}", user.id)))?;
            state
                .verifier
                .verify_with_key(&fields, &nonce, reset, &stored)?;
            Some(user.key_id)
        }
        _ => None,
    };

    let new = NewUser {
        username: req.username.clone(),
        email: req.email.clone(),
        key_id: kid.clone(),
        public_key_der: key.der().to_vec(),
    };
    let upsert = state.registry.upsert_user(new, |existing: Option<&UserRecord>| {
        authorize_rotation(existing, &kid, rotating_from.as_ref())
    })?;

    tracing::info!(user = upsert.record.id, kid = %kid, created = upsert.created, "user registered");
    Ok((
        upsert_status(upsert.created),
        Json(UserResponse {
            oid: upsert.record.id,
            public_key_id: kid,
        }),
    ))
}

/// Allow a user change only if any key rotation was verified against the
/// key that is still stored.
fn authorize_rotation(
    existing: Option<&UserRecord>,
    kid: &KeyId,
    verified_from: Option<&KeyId>,
) -> Result<(), AppError> {
    let Some(user) = existing.filter(|u| &u.key_id != kid) else {
        return Ok(());
    };
    if verified_from != Some(&user.key_id) {
        return Err(AppError::Forbidden(format!(
            "user {} key changed to {} without a matching reset_signature",
            user.id, kid
        )));
    }
    tracing::info!(user = user.id, old = %user.key_id, new = %kid, "rotating user key");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str) -> UserRequest {
        UserRequest {
            username: username.into(),
            email: email.into(),
            public_key: "AAAA".into(),
            nonce: 1,
            signature: "c2ln".into(),
            reset_signature: None,
        }
    }

    #[test]
    fn test_validation() {
        assert!(request("alice", "alice@example.edu").validate().is_ok());
        assert!(request("", "alice@example.edu").validate().is_err());
        assert!(request("alice", "alice.example.edu").validate().is_err());
        assert!(request("al:ice", "alice@example.edu").validate().is_err());
    }

    fn kid(n: u8) -> KeyId {
        KeyId::from_digest_prefix(&[n; 32], 20)
    }

    fn stored_user(key_id: KeyId) -> UserRecord {
        let now = chrono::Utc::now();
        UserRecord {
            id: 1,
            username: "alice".into(),
            email: "alice@example.edu".into(),
            key_id,
            public_key_der: Vec::new(),
            created: now,
            updated: now,
        }
    }

    #[test]
    fn test_rotation_needs_verified_stored_key() {
        let user = stored_user(kid(1));
        assert!(authorize_rotation(None, &kid(2), None).is_ok());
        assert!(authorize_rotation(Some(&user), &kid(1), None).is_ok());
        assert!(authorize_rotation(Some(&user), &kid(2), Some(&kid(1))).is_ok());
        assert!(matches!(
            authorize_rotation(Some(&user), &kid(2), None),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_rotation_rejected_when_stored_key_moved() {
        // Verified against key 1, but key 3 was stored before the lock.
        let user = stored_user(kid(3));
        assert!(matches!(
            authorize_rotation(Some(&user), &kid(2), Some(&kid(1))),
            Err(AppError::Forbidden(_))
        ));
    }
}
