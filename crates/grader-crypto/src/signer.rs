//! # Request Signer
//!
//! Client-side construction of signed requests. The signing message is
//! the colon-joined list of caller parameters, then the nonce, then (for
//! typed payloads) the hex digest of the payload:
//!
//! ```text
//! param_1:...:param_n:nonce:hexdigest(payload)
//! ```
//!
//! The nonce binds the envelope, never the payload digest, so identical
//! content signed twice yields two signatures over one digest.
//!
//! The private key is read on first use and cached for the lifetime of
//! the signer.

use std::path::PathBuf;
use std::sync::Arc;

use grader_core::{sha256, KeyId, Signable};
use parking_lot::RwLock;
use serde::Serialize;

use crate::envelope::{Envelope, SignatureBlock, SignedFields};
use crate::error::{CryptoError, KeyError};
use crate::key::{KeyPair, DEFAULT_KID_BYTES};
use crate::verify::signing_message;

/// The default nonce: current Unix time in seconds.
pub fn current_nonce() -> i64 {
    chrono::Utc::now().timestamp()
}

enum KeySource {
    File {
        path: PathBuf,
        password: Option<Vec<u8>>,
    },
    Loaded,
}

pub struct RequestSigner {
    source: KeySource,
    key: RwLock<Option<Arc<KeyPair>>>,
    kid_bytes: usize,
    with_digest: bool,
}

impl RequestSigner {
    /// A signer whose key lives at `path`; generated on first use if absent.
    pub fn from_path(path: impl Into<PathBuf>, password: Option<Vec<u8>>) -> Self {
        Self {
            source: KeySource::File {
                path: path.into(),
                password,
            },
            key: RwLock::new(None),
            kid_bytes: DEFAULT_KID_BYTES,
            with_digest: false,
        }
    }

    /// A signer over an already loaded key.
    pub fn from_key(key: KeyPair) -> Self {
        Self {
            source: KeySource::Loaded,
            key: RwLock::new(Some(Arc::new(key))),
            kid_bytes: DEFAULT_KID_BYTES,
            with_digest: false,
        }
    }

    /// Fingerprint truncation for the `kid` this signer reports.
    pub fn with_kid_bytes(mut self, kid_bytes: usize) -> Self {
        self.kid_bytes = kid_bytes;
        self
    }

    /// Include the SHA-256 of the signing message in envelopes.
    pub fn with_digest(mut self, with_digest: bool) -> Self {
        self.with_digest = with_digest;
        self
    }

    fn key(&self) -> Result<Arc<KeyPair>, KeyError> {
        if let Some(key) = self.key.read().as_ref() {
            return Ok(Arc::clone(key));
        }

        let mut slot = self.key.write();
        if let Some(key) = slot.as_ref() {
            return Ok(Arc::clone(key));
        }
        let key = match &self.source {
            KeySource::File { path, password } => {
                Arc::new(KeyPair::load_or_create(path, password.as_deref())?)
            }
            // from_key always fills the slot.
            KeySource::Loaded => return Err(KeyError::Malformed("signer has no key".into())),
        };
        *slot = Some(Arc::clone(&key));
        Ok(key)
    }

    pub fn key_id(&self) -> Result<KeyId, KeyError> {
        Ok(self.key()?.fingerprint(self.kid_bytes))
    }

    /// Base64 DER of the public key.
    pub fn public_key_b64(&self) -> Result<String, KeyError> {
        Ok(self.key()?.public_key().to_b64())
    }

    /// Sign a raw message; returns the base64 DER signature.
    pub fn sign_message(&self, message: &str) -> Result<String, KeyError> {
        Ok(self.key()?.sign_b64(message.as_bytes()))
    }

    /// Build a signed envelope for a typed payload.
    pub fn sign<P: Signable + Serialize>(
        &self,
        payload: P,
        params: &[&str],
        nonce: Option<i64>,
    ) -> Result<Envelope<P>, CryptoError> {
        let key = self.key()?;
        let nonce = nonce.unwrap_or_else(current_nonce).to_string();
        let mut message = signing_message(params, &nonce);
        message.push(':');
        message.push_str(&payload.hash_hex()?);

        let digest = self
            .with_digest
            .then(|| sha256(message.as_bytes()).to_hex());

        tracing::debug!(kid = %key.fingerprint(self.kid_bytes), %message, "signing envelope");

        Ok(Envelope {
            payload,
            signature: SignatureBlock {
                nonce,
                kid: key.fingerprint(self.kid_bytes),
                ecdas: key.sign_b64(message.as_bytes()),
                digest,
            },
        })
    }

    /// Sign a flat field list for an HTTP endpoint body.
    pub fn sign_fields<S: AsRef<str>>(
        &self,
        fields: &[S],
        nonce: Option<i64>,
    ) -> Result<SignedFields, CryptoError> {
        let key = self.key()?;
        let nonce = nonce.unwrap_or_else(current_nonce);
        let message = signing_message(fields, &nonce.to_string());
        Ok(SignedFields {
            nonce,
            public_key_id: key.fingerprint(self.kid_bytes),
            signature: key.sign_b64(message.as_bytes()),
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = match &self.source {
            KeySource::File { path, .. } => Some(path),
            KeySource::Loaded => None,
        };
        f.debug_struct("RequestSigner")
            .field("path", &path)
            .field("kid_bytes", &self.kid_bytes)
            .field("with_digest", &self.with_digest)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grader_core::Group;

    #[test]
    fn test_envelope_kid_and_nonce() {
        let signer = RequestSigner::from_key(KeyPair::generate().unwrap());
        let env = signer.sign(Group::new("G"), &["7"], Some(1_700_000_000)).unwrap();
        assert_eq!(env.signature.nonce, "1700000000");
        assert_eq!(env.signature.kid, signer.key_id().unwrap());
        assert_eq!(env.signature.kid.byte_len(), 20);
        assert!(env.signature.digest.is_none());
    }

    #[test]
    fn test_with_digest_hashes_signing_message() {
        let signer = RequestSigner::from_key(KeyPair::generate().unwrap()).with_digest(true);
        let env = signer.sign(Group::new("G"), &["7"], Some(1_700_000_000)).unwrap();
        assert_eq!(
            env.signature.digest.as_deref(),
            Some("c033a8cda803638396ad3c824ea3893124805ad649546e59ca52ce5ca5d01594")
        );
    }

    #[test]
    fn test_default_nonce_is_current_time() {
        let signer = RequestSigner::from_key(KeyPair::generate().unwrap());
        let before = current_nonce();
        let env = signer.sign(Group::new("G"), &[], None).unwrap();
        let nonce: i64 = env.signature.nonce.parse().unwrap();
        assert!(nonce >= before && nonce <= current_nonce());
    }

    #[test]
    fn test_lazy_key_created_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.pem");
        let signer = RequestSigner::from_path(&path, None).with_kid_bytes(16);
        assert!(!path.exists());
        let kid = signer.key_id().unwrap();
        assert!(path.exists());
        assert_eq!(kid.byte_len(), 16);
        assert_eq!(signer.key_id().unwrap(), kid);
    }
}
