//! # Ledger Error Types
//!
//! Every variant names the records involved so the server can log the
//! precise reason; none of this detail is returned to clients.

use grader_core::KeyId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("unknown group {0:?}")]
    UnknownGroup(String),

    #[error("unknown module {0:?}")]
    UnknownModule(String),

    #[error("unknown question {module:?}.{name:?}")]
    UnknownQuestion { module: String, name: String },

    /// The acting identity is not a member of a group it needs.
    #[error("{kid} is not a member of group {group:?}")]
    NotMember { kid: KeyId, group: String },

    /// A module's admin group is fixed at creation.
    #[error("module {module:?} is administered by {admin_group:?}, not {requested:?}")]
    AdminGroupMismatch {
        module: String,
        admin_group: String,
        requested: String,
    },

    /// A key id is already bound to a different user.
    #[error("key {kid} already belongs to another user")]
    KeyInUse { kid: KeyId },

    /// The payload failed the grading contract of its question.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The submitter already answers this question under another group.
    #[error("{kid} answers under group {bound:?}, cannot switch to {requested:?}")]
    OwnershipConflict {
        kid: KeyId,
        bound: String,
        requested: String,
    },

    #[error("{kid} used all {max_try} tries")]
    TryLimitExceeded { kid: KeyId, max_try: i64 },
}
