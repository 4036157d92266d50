//! # Request Authentication
//!
//! Every mutating endpoint signs a fixed, ordered list of its body and
//! path fields followed by the nonce. Handlers build that list and call
//! [`authenticate`] before touching any store.
//!
//! ## Security Invariant
//!
//! The verifying key is always the one stored for the claimed key id,
//! looked up before verification. A key carried in the request body is
//! trusted only by the user registration endpoint, and only to establish
//! a brand-new identity.

use chrono::Utc;
use grader_core::KeyId;

use crate::error::AppError;
use crate::extractors::Credentials;
use crate::state::AppState;

/// Verify `creds` over `fields` and return the authenticated key id.
pub fn authenticate<S: AsRef<str>>(
    state: &AppState,
    creds: &Credentials,
    fields: &[S],
) -> Result<KeyId, AppError> {
    let kid = &creds.public_key_id;
    let stored = state.lookup_key(kid)?;
    state.verifier.verify(
        kid,
        fields,
        &creds.nonce.to_string(),
        &creds.signature,
        stored.as_ref(),
    )?;
    check_fresh(state, kid, creds.nonce)?;
    Ok(kid.clone())
}

/// Apply the nonce freshness window, if one is configured.
pub fn check_fresh(state: &AppState, kid: &KeyId, nonce: i64) -> Result<(), AppError> {
    match &state.nonces {
        Some(tracker) => tracker
            .check(kid, nonce, Utc::now().timestamp())
            .map_err(|e| AppError::SignatureInvalid(e.to_string())),
        None => Ok(()),
    }
}
