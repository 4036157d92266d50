//! # Submission Deduplicator
//!
//! Content-addressed storage of graded results and the ownership rows
//! that link submitters to them.
//!
//! ## Protocol
//!
//! 1. `digest = SHA256(namespace || question_name || payload_b64)`.
//! 2. Result rows are unique per `(question, digest)`. The digest omits
//!    the module, so same-named questions in two modules hash identical
//!    bytes alike; keying by question id keeps their rows apart. An
//!    unknown pair has its payload validated, then a result row is
//!    inserted. A known pair reuses its row; validation is skipped.
//! 3. The ownership row for `(submitter, question, result)` is created
//!    or reused. A submitter answers a question under one group only: a
//!    request naming any other group is an [`LedgerError::OwnershipConflict`].
//! 4. Steps 2 and 3 commit together or not at all.
//!
//! ## Concurrency
//!
//! Validation runs outside the lock. The transaction then takes the
//! write guard and re-reads the digest index, so two racing submissions
//! of the same bytes converge on one result row: the loser finds the
//! winner's row and reuses it. The digest index and the ownership index
//! are the unique constraints; "already present" is never an error.
//!
//! A [`Txn`] records every insert it makes. Dropping it without
//! `commit()` undoes them in reverse order before the guard is released,
//! so no reader ever sees a result row without its ownership row.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use grader_core::{content_digest, ContentDigest, KeyId};
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::LedgerError;
use crate::registry::QuestionRecord;
use crate::store::{Row, Table};
use crate::validate::{JsonPayloadValidator, SubmissionValidator};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A de-duplicated graded result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub id: i64,
    pub question_id: i64,
    pub digest: ContentDigest,
    /// Raw submitted bytes.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub score: Option<f64>,
    pub created: DateTime<Utc>,
}

/// Binding of a submitter and group to a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub id: i64,
    pub submitter: KeyId,
    pub group: String,
    pub question_id: i64,
    pub result_id: i64,
    pub created: DateTime<Utc>,
}

impl Row for ResultRecord {
    fn id(&self) -> i64 {
        self.id
    }
}

impl Row for AnswerRecord {
    fn id(&self) -> i64 {
        self.id
    }
}

/// One inbound answer.
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    pub namespace: &'a str,
    pub question: &'a QuestionRecord,
    /// Base64 payload exactly as received.
    pub payload_b64: &'a str,
    pub submitter: &'a KeyId,
    pub group: &'a str,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub answer_id: i64,
    pub result_id: i64,
    pub digest: ContentDigest,
    /// Whether this call created the ownership row.
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Tables and transaction
// ---------------------------------------------------------------------------

type OwnershipKey = (KeyId, i64, i64);
type ResultKey = (i64, ContentDigest);

#[derive(Debug, Default)]
struct LedgerTables {
    results: Table<ResultRecord>,
    result_by_digest: HashMap<ResultKey, i64>,
    answers: Table<AnswerRecord>,
    answer_by_owner: HashMap<OwnershipKey, i64>,
    /// Answer ids per (submitter, question), in submission order.
    answers_by_submitter: HashMap<(KeyId, i64), Vec<i64>>,
}

enum Undo {
    Result { id: i64, key: ResultKey },
    Answer { id: i64, key: OwnershipKey },
}

struct Txn<'a> {
    tables: &'a mut LedgerTables,
    undo: Vec<Undo>,
    committed: bool,
}

impl<'a> Txn<'a> {
    fn begin(tables: &'a mut LedgerTables) -> Self {
        Self {
            tables,
            undo: Vec::new(),
            committed: false,
        }
    }

    /// Existing result id for `digest` under `question_id`, or a newly inserted row.
    fn result_for(&mut self, question_id: i64, digest: ContentDigest, data: Vec<u8>) -> i64 {
        let key = (question_id, digest);
        if let Some(&id) = self.tables.result_by_digest.get(&key) {
            return id;
        }
        let id = self.tables.results.allocate_id();
        self.tables.results.insert(ResultRecord {
            id,
            question_id,
            digest,
            data,
            score: None,
            created: Utc::now(),
        });
        self.tables.result_by_digest.insert(key, id);
        self.undo.push(Undo::Result { id, key });
        id
    }

    fn insert_answer(&mut self, submitter: &KeyId, group: &str, question_id: i64, result_id: i64) -> i64 {
        let id = self.tables.answers.allocate_id();
        self.tables.answers.insert(AnswerRecord {
            id,
            submitter: submitter.clone(),
            group: group.to_string(),
            question_id,
            result_id,
            created: Utc::now(),
        });
        let key = (submitter.clone(), question_id, result_id);
        self.tables.answer_by_owner.insert(key.clone(), id);
        self.tables
            .answers_by_submitter
            .entry((submitter.clone(), question_id))
            .or_default()
            .push(id);
        self.undo.push(Undo::Answer { id, key });
        id
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Txn<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Result { id, key } => {
                    self.tables.results.remove(id);
                    self.tables.result_by_digest.remove(&key);
                }
                Undo::Answer { id, key } => {
                    self.tables.answers.remove(id);
                    self.tables.answer_by_owner.remove(&key);
                    let owner = (key.0, key.1);
                    if let Some(ids) = self.tables.answers_by_submitter.get_mut(&owner) {
                        ids.retain(|a| *a != id);
                        if ids.is_empty() {
                            self.tables.answers_by_submitter.remove(&owner);
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SubmissionDeduplicator
// ---------------------------------------------------------------------------

/// Shared handle to the results and answers tables. Clones share state.
#[derive(Clone)]
pub struct SubmissionDeduplicator {
    tables: Arc<RwLock<LedgerTables>>,
    validator: Arc<dyn SubmissionValidator>,
}

impl std::fmt::Debug for SubmissionDeduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("SubmissionDeduplicator")
            .field("results", &tables.results.len())
            .field("answers", &tables.answers.len())
            .finish()
    }
}

impl Default for SubmissionDeduplicator {
    fn default() -> Self {
        Self::new(JsonPayloadValidator)
    }
}

impl SubmissionDeduplicator {
    pub fn new(validator: impl SubmissionValidator + 'static) -> Self {
        Self {
            tables: Arc::new(RwLock::new(LedgerTables::default())),
            validator: Arc::new(validator),
        }
    }

    /// Store or reuse the result for a payload and bind it to the submitter.
    pub fn submit(&self, req: SubmitRequest<'_>) -> Result<SubmissionReceipt, LedgerError> {
        let question = req.question;
        let data = BASE64
            .decode(req.payload_b64)
            .map_err(|e| LedgerError::InvalidPayload(format!("payload base64: {e}")))?;
        let digest = content_digest(req.namespace, &question.name, req.payload_b64);

        let known = self
            .tables
            .read()
            .result_by_digest
            .contains_key(&(question.id, digest));
        if !known {
            self.validator
                .validate(question, &data)
                .map_err(LedgerError::InvalidPayload)?;
        }

        let mut guard = self.tables.write();
        let mut txn = Txn::begin(&mut guard);
        let result_id = txn.result_for(question.id, digest, data);

        let owner = (req.submitter.clone(), question.id);
        let owned: Vec<i64> = txn
            .tables
            .answers_by_submitter
            .get(&owner)
            .cloned()
            .unwrap_or_default();

        if let Some(bound) = owned
            .first()
            .and_then(|id| txn.tables.answers.get(*id))
            .map(|a| a.group.clone())
        {
            if bound != req.group {
                return Err(LedgerError::OwnershipConflict {
                    kid: req.submitter.clone(),
                    bound,
                    requested: req.group.to_string(),
                });
            }
        }

        let ownership_key = (req.submitter.clone(), question.id, result_id);
        if let Some(&answer_id) = txn.tables.answer_by_owner.get(&ownership_key) {
            txn.commit();
            tracing::debug!(answer_id, result_id, %digest, "resubmission of owned digest");
            return Ok(SubmissionReceipt {
                answer_id,
                result_id,
                digest,
                created: false,
            });
        }

        if question.max_try > 0 && owned.len() as i64 >= question.max_try {
            return Err(LedgerError::TryLimitExceeded {
                kid: req.submitter.clone(),
                max_try: question.max_try,
            });
        }

        let answer_id = txn.insert_answer(req.submitter, req.group, question.id, result_id);
        txn.commit();
        tracing::info!(answer_id, result_id, %digest, submitter = %req.submitter, "answer recorded");
        Ok(SubmissionReceipt {
            answer_id,
            result_id,
            digest,
            created: true,
        })
    }

    pub fn result(&self, id: i64) -> Option<ResultRecord> {
        self.tables.read().results.get(id).cloned()
    }

    pub fn result_by_digest(&self, question_id: i64, digest: &ContentDigest) -> Option<ResultRecord> {
        let tables = self.tables.read();
        let id = *tables.result_by_digest.get(&(question_id, *digest))?;
        tables.results.get(id).cloned()
    }

    /// Answers one submitter owns for a question, oldest first.
    pub fn answers_for(&self, submitter: &KeyId, question_id: i64) -> Vec<AnswerRecord> {
        let tables = self.tables.read();
        tables
            .answers_by_submitter
            .get(&(submitter.clone(), question_id))
            .into_iter()
            .flatten()
            .filter_map(|id| tables.answers.get(*id).cloned())
            .collect()
    }

    /// Record the grader's score for a result. Returns false if unknown.
    pub fn set_score(&self, result_id: i64, score: f64) -> bool {
        match self.tables.write().results.get_mut(result_id) {
            Some(result) => {
                result.score = Some(score);
                true
            }
            None => false,
        }
    }

    pub fn result_count(&self) -> usize {
        self.tables.read().results.len()
    }

    pub fn answer_count(&self) -> usize {
        self.tables.read().answers.len()
    }
}
