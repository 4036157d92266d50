#![deny(missing_docs)]
//! # grader-core — Foundational Types for the Grader Stack
//!
//! This crate is the bedrock of the grader workspace. Every other crate
//! depends on `grader-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Statically declared hash fields.** A payload type opts into
//!    signing by implementing [`Signable`], which lists its
//!    `(tag, accessor)` pairs in a `const` table. There is no runtime
//!    reflection; the hash input order comes from the tags alone.
//!
//! 2. **`ContentDigest` only from the hasher.** Digests of payloads flow
//!    through [`canonical::hash_tagged`]; content digests of submissions
//!    flow through [`digest::content_digest`].
//!
//! 3. **Timezone-aware timestamps.** A timestamp without an offset is
//!    rejected with `MissingTimezone` instead of being assumed UTC.
//!
//! 4. **Newtypes for wire identifiers.** `KeyId` and `Namespace` are
//!    validated on construction.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `grader-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod models;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::{HashField, HashValue, Signable, TaggedValue};
pub use digest::{content_digest, sha256, ContentDigest};
pub use error::{CanonicalError, GraderError, ValidationError};
pub use identity::{KeyId, Namespace};
pub use models::{Group, Module, Question, Submission, User};
pub use temporal::{parse_timestamp, TimestampValue};
