//! # Payload Validation
//!
//! The hook that decides whether a never-seen payload is well-formed for
//! its question before a result row is created. It runs only for new
//! digests; a digest already in the ledger was validated when it was
//! first stored.

use crate::registry::QuestionRecord;

/// Decides whether raw answer bytes satisfy a question's grading contract.
pub trait SubmissionValidator: Send + Sync {
    /// Return `Err(reason)` to reject the payload. Fails closed: a
    /// rejected payload never creates a result row.
    fn validate(&self, question: &QuestionRecord, payload: &[u8]) -> Result<(), String>;
}

/// Accepts payloads that parse as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadValidator;

impl SubmissionValidator for JsonPayloadValidator {
    fn validate(&self, question: &QuestionRecord, payload: &[u8]) -> Result<(), String> {
        serde_json::from_slice::<serde_json::Value>(payload)
            .map(|_| ())
            .map_err(|e| format!("{}.{}: payload is not JSON: {e}", question.module, question.name))
    }
}

/// Accepts any non-empty payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyValidator;

impl SubmissionValidator for NonEmptyValidator {
    fn validate(&self, _question: &QuestionRecord, payload: &[u8]) -> Result<(), String> {
        if payload.is_empty() {
            Err("empty payload".into())
        } else {
            Ok(())
        }
    }
}
