//! # Signable Models
//!
//! The payload types clients sign. Field names serialize in PascalCase,
//! which is the JSON shape carried in an envelope's `Payload`; the hash
//! tags in each `HASH_FIELDS` table are the part of the wire contract
//! that decides the digest.
//!
//! | Type | Tags |
//! |------|------|
//! | [`User`] | `n` Username, `s` Scope, `e` Email, `k` Key |
//! | [`Group`] | `n` Name, `s` Scope |
//! | [`Module`] | `n` Name, `a` Audience, `b` Before, `r` Reveal |
//! | [`Question`] | `n` Name, `b` Before, `r` Reveal, `g` Grader, `h` MaxScore, `m` MinScore, `t` MaxTry |
//! | [`Submission`] | `g` Group, `q` Question, `d` Data |

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::canonical::{HashField, HashValue, Signable};
use crate::temporal::TimestampValue;

/// A user registration or update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    /// Display name; not unique.
    pub username: String,
    /// Optional scope qualifier; omitted from the hash when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Email address, the registration key.
    pub email: String,
    /// Base64 DER SubjectPublicKeyInfo of the user's key.
    pub key: String,
}

impl User {
    /// An unscoped user.
    pub fn new(username: impl Into<String>, email: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            scope: None,
            email: email.into(),
            key: key.into(),
        }
    }
}

impl Signable for User {
    const HASH_FIELDS: &'static [HashField<Self>] = &[
        HashField { tag: "n", value: |u| HashValue::from(&u.username) },
        HashField { tag: "s", value: |u| HashValue::from(u.scope.clone()) },
        HashField { tag: "e", value: |u| HashValue::from(&u.email) },
        HashField { tag: "k", value: |u| HashValue::from(&u.key) },
    ];
}

/// A named group of submitters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Group {
    /// Group name.
    pub name: String,
    /// Optional scope qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl Group {
    /// An unscoped group.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: None,
        }
    }
}

impl Signable for Group {
    const HASH_FIELDS: &'static [HashField<Self>] = &[
        HashField { tag: "n", value: |g| HashValue::from(&g.name) },
        HashField { tag: "s", value: |g| HashValue::from(g.scope.clone()) },
    ];
}

/// A course module. `reveal` falls back to `before` when unset.
///
/// Timestamps without an offset deserialize as naive values so that
/// hashing rejects them with `MissingTimezone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Intended audience size.
    pub audience: i64,
    /// Submission deadline.
    #[serde(default)]
    pub before: Option<TimestampValue>,
    /// When grades become visible.
    #[serde(default)]
    pub reveal: Option<TimestampValue>,
}

impl Module {
    /// The reveal time after applying the `before` fallback.
    pub fn effective_reveal(&self) -> Option<TimestampValue> {
        self.reveal.clone().or_else(|| self.before.clone())
    }
}

impl Signable for Module {
    const HASH_FIELDS: &'static [HashField<Self>] = &[
        HashField { tag: "n", value: |m| HashValue::from(&m.name) },
        HashField { tag: "a", value: |m| HashValue::from(m.audience) },
        HashField { tag: "b", value: |m| HashValue::from(m.before.clone()) },
        HashField { tag: "r", value: |m| HashValue::from(m.effective_reveal()) },
    ];
}

/// A gradable question within a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Question {
    /// Question name, unique within its module.
    pub name: String,
    /// Submission deadline.
    #[serde(default)]
    pub before: Option<TimestampValue>,
    /// When grades become visible.
    #[serde(default)]
    pub reveal: Option<TimestampValue>,
    /// Opaque grader reference or source.
    pub grader: String,
    /// Highest attainable score.
    pub max_score: i64,
    /// Lowest attainable score.
    pub min_score: i64,
    /// Distinct answers one submitter may own; zero is unlimited.
    pub max_try: i64,
}

impl Question {
    /// The reveal time after applying the `before` fallback.
    pub fn effective_reveal(&self) -> Option<TimestampValue> {
        self.reveal.clone().or_else(|| self.before.clone())
    }
}

impl Signable for Question {
    const HASH_FIELDS: &'static [HashField<Self>] = &[
        HashField { tag: "n", value: |q| HashValue::from(&q.name) },
        HashField { tag: "b", value: |q| HashValue::from(q.before.clone()) },
        HashField { tag: "r", value: |q| HashValue::from(q.effective_reveal()) },
        HashField { tag: "g", value: |q| HashValue::from(&q.grader) },
        HashField { tag: "h", value: |q| HashValue::from(q.max_score) },
        HashField { tag: "m", value: |q| HashValue::from(q.min_score) },
        HashField { tag: "t", value: |q| HashValue::from(q.max_try) },
    ];
}

/// An answer to a question, submitted on behalf of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Submission {
    /// Group the answer is submitted under.
    pub group: String,
    /// Question name.
    pub question: String,
    /// Base64 of the raw answer bytes.
    pub data: String,
}

impl Submission {
    /// Build a submission, base64-encoding the raw answer bytes.
    pub fn new(question: impl Into<String>, group: impl Into<String>, data: &[u8]) -> Self {
        Self {
            group: group.into(),
            question: question.into(),
            data: BASE64.encode(data),
        }
    }
}

impl Signable for Submission {
    const HASH_FIELDS: &'static [HashField<Self>] = &[
        HashField { tag: "g", value: |s| HashValue::from(&s.group) },
        HashField { tag: "q", value: |s| HashValue::from(&s.question) },
        HashField { tag: "d", value: |s| HashValue::from(&s.data) },
    ];
}
