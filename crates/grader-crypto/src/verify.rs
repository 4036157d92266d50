//! # Signature Verifier
//!
//! Server-side reconstruction and checking of signing messages.
//!
//! ## Security Invariant
//!
//! The verifier never takes a public key from the request being verified.
//! The caller looks up the stored key for the *claimed* key id and passes
//! it in; a missing key is [`VerifyError::UnknownKey`]. The single
//! exception, first registration of a new identity, goes through
//! [`SignatureVerifier::verify_with_key`] and is the caller's decision.
//!
//! Any difference in any declared field, in the nonce, or in field order
//! produces a different message and fails verification. There is no
//! partial match.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use grader_core::{ContentDigest, KeyId, Signable};

use crate::envelope::Envelope;
use crate::error::{CryptoError, VerifyError};
use crate::key::PublicKey;

/// Colon-join the declared fields followed by the nonce.
pub fn signing_message<S: AsRef<str>>(fields: &[S], nonce: &str) -> String {
    let mut message = String::new();
    for field in fields {
        message.push_str(field.as_ref());
        message.push(':');
    }
    message.push_str(nonce);
    message
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify a signature made by the holder of `claimed`.
    ///
    /// `stored` is the key registered under `claimed`, or `None` when the
    /// id is unknown. A stored key whose fingerprint does not match the
    /// claimed id is treated as unknown.
    pub fn verify<S: AsRef<str>>(
        &self,
        claimed: &KeyId,
        declared_fields: &[S],
        nonce: &str,
        signature_b64: &str,
        stored: Option<&PublicKey>,
    ) -> Result<(), VerifyError> {
        let key = resolve(claimed, stored)?;
        check(key, &signing_message(declared_fields, nonce), signature_b64)
    }

    /// Verify against an explicitly supplied key.
    pub fn verify_with_key<S: AsRef<str>>(
        &self,
        declared_fields: &[S],
        nonce: &str,
        signature_b64: &str,
        key: &PublicKey,
    ) -> Result<(), VerifyError> {
        check(key, &signing_message(declared_fields, nonce), signature_b64)
    }

    /// Verify a typed envelope and return the payload digest it binds.
    ///
    /// `params` are the positional parameters the endpoint expects the
    /// client to have signed, in order.
    pub fn verify_envelope<P: Signable>(
        &self,
        envelope: &Envelope<P>,
        params: &[&str],
        stored: Option<&PublicKey>,
    ) -> Result<ContentDigest, CryptoError> {
        let key = resolve(&envelope.signature.kid, stored)?;
        let digest = envelope.payload.hash_object()?;
        let mut message = signing_message(params, &envelope.signature.nonce);
        message.push(':');
        message.push_str(&digest.to_hex());
        check(key, &message, &envelope.signature.ecdas)?;
        Ok(digest)
    }
}

fn resolve<'k>(claimed: &KeyId, stored: Option<&'k PublicKey>) -> Result<&'k PublicKey, VerifyError> {
    match stored {
        Some(key) if key.fingerprint(claimed.byte_len()) == *claimed => Ok(key),
        _ => Err(VerifyError::UnknownKey(claimed.to_string())),
    }
}

fn check(key: &PublicKey, message: &str, signature_b64: &str) -> Result<(), VerifyError> {
    let signature = BASE64
        .decode(signature_b64.trim())
        .map_err(|e| VerifyError::Malformed(format!("signature base64: {e}")))?;
    if key.verify(message.as_bytes(), &signature) {
        Ok(())
    } else {
        Err(VerifyError::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;
    use crate::signer::RequestSigner;
    use grader_core::Group;

    #[test]
    fn test_signing_message_layout() {
        assert_eq!(signing_message(&["a", "b"], "9"), "a:b:9");
        assert_eq!(signing_message::<&str>(&[], "9"), "9");
    }

    #[test]
    fn test_verify_flat_fields() {
        let pair = KeyPair::generate().unwrap();
        let kid = pair.fingerprint(20);
        let sig = pair.sign_b64(b"kid:G:42");
        let v = SignatureVerifier::new();
        v.verify(&kid, &["kid", "G"], "42", &sig, Some(pair.public_key()))
            .unwrap();
    }

    #[test]
    fn test_tampered_field_rejected() {
        let pair = KeyPair::generate().unwrap();
        let kid = pair.fingerprint(20);
        let sig = pair.sign_b64(b"kid:G:42");
        let v = SignatureVerifier::new();
        assert_eq!(
            v.verify(&kid, &["kid", "H"], "42", &sig, Some(pair.public_key())),
            Err(VerifyError::SignatureInvalid)
        );
        assert_eq!(
            v.verify(&kid, &["kid", "G"], "43", &sig, Some(pair.public_key())),
            Err(VerifyError::SignatureInvalid)
        );
        assert_eq!(
            v.verify(&kid, &["G", "kid"], "42", &sig, Some(pair.public_key())),
            Err(VerifyError::SignatureInvalid)
        );
    }

    #[test]
    fn test_unknown_or_mismatched_key() {
        let pair = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let kid = pair.fingerprint(20);
        let sig = pair.sign_b64(b"x:1");
        let v = SignatureVerifier::new();
        assert!(matches!(
            v.verify(&kid, &["x"], "1", &sig, None),
            Err(VerifyError::UnknownKey(_))
        ));
        assert!(matches!(
            v.verify(&kid, &["x"], "1", &sig, Some(other.public_key())),
            Err(VerifyError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let pair = KeyPair::generate().unwrap();
        let kid = pair.fingerprint(20);
        assert!(matches!(
            SignatureVerifier::new().verify(&kid, &["x"], "1", "%%%", Some(pair.public_key())),
            Err(VerifyError::Malformed(_))
        ));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let signer = RequestSigner::from_key(KeyPair::generate().unwrap());
        let stored = PublicKey::decode_b64(&signer.public_key_b64().unwrap()).unwrap();
        let env = signer.sign(Group::new("G"), &["7"], Some(1_700_000_000)).unwrap();
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope<Group> = serde_json::from_str(&json).unwrap();

        let v = SignatureVerifier::new();
        let digest = v.verify_envelope(&back, &["7"], Some(&stored)).unwrap();
        assert_eq!(digest, Group::new("G").hash_object().unwrap());

        assert!(v.verify_envelope(&back, &["8"], Some(&stored)).is_err());
        let mut renamed = back.clone();
        renamed.payload.name = "H".into();
        assert!(v.verify_envelope(&renamed, &["7"], Some(&stored)).is_err());
    }

    #[test]
    fn test_same_content_different_nonce() {
        let signer = RequestSigner::from_key(KeyPair::generate().unwrap());
        let stored = PublicKey::decode_b64(&signer.public_key_b64().unwrap()).unwrap();
        let a = signer.sign(Group::new("G"), &[], Some(1)).unwrap();
        let b = signer.sign(Group::new("G"), &[], Some(2)).unwrap();
        assert_ne!(a.signature.ecdas, b.signature.ecdas);

        let v = SignatureVerifier::new();
        assert_eq!(
            v.verify_envelope(&a, &[], Some(&stored)).unwrap(),
            v.verify_envelope(&b, &[], Some(&stored)).unwrap()
        );
    }
}
