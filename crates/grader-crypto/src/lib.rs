//! # grader-crypto — Request Authentication for the Grader Stack
//!
//! This crate provides the cryptographic half of the submission protocol:
//!
//! - **Key management**: P-256 key generation, PEM persistence, and the
//!   truncated SPKI fingerprint that serves as a wire identity.
//! - **Request signing**: envelopes for typed payloads and signatures over
//!   flat endpoint field lists.
//! - **Signature verification**: reconstruction of the signing message
//!   from declared fields and ECDSA-SHA256 verification against a stored
//!   key.
//! - **Key ring**: operator keys loaded from a directory at startup.
//!
//! Payload digests come from [`grader_core::Signable`]; this crate never
//! decides what bytes a payload hashes to.

pub mod envelope;
pub mod error;
pub mod key;
pub mod keyring;
pub mod signer;
pub mod verify;

// Re-export primary types.
pub use envelope::{Envelope, SignatureBlock, SignedFields};
pub use error::{CryptoError, KeyError, VerifyError};
pub use key::{KeyPair, PublicKey, DEFAULT_KID_BYTES};
pub use keyring::KeyRing;
pub use signer::{current_nonce, RequestSigner};
pub use verify::{signing_message, SignatureVerifier};
