//! # grader-ledger — Registry and Submission Ledger
//!
//! State the server keeps between requests:
//!
//! - [`Registry`]: users keyed by email and key id, groups with their
//!   member key ids, modules with a fixed admin group, and the questions
//!   of each module.
//! - [`SubmissionDeduplicator`]: graded results stored once per content
//!   digest, plus the ownership rows that bind submitters to them.
//!
//! Both are in-memory and cheaply cloneable handles over shared state.
//! Neither knows about signatures: callers pass an already-authenticated
//! [`grader_core::KeyId`] as the actor.

pub mod error;
pub mod ledger;
pub mod registry;
pub mod store;
pub mod validate;

pub use error::LedgerError;
pub use ledger::{AnswerRecord, ResultRecord, SubmissionDeduplicator, SubmissionReceipt, SubmitRequest};
pub use registry::{GroupRecord, ModuleRecord, NewUser, QuestionRecord, Registry, Upsert, UserRecord};
pub use validate::{JsonPayloadValidator, NonEmptyValidator, SubmissionValidator};
