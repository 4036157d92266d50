//! # Envelope and Hash Subcommands
//!
//! Typed payloads read from JSON files (PascalCase field names, as the
//! models serialize), hashed with the canonical hasher or wrapped in a
//! signed envelope.
//!
//! `hash json` accepts any JSON document and hashes it untyped: object
//! keys become tags. Booleans and nulls inside lists are rejected.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use grader_core::canonical::hash_value;
use grader_core::{ContentDigest, Group, HashValue, Module, Question, Signable, Submission, User};
use grader_crypto::RequestSigner;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::{read_json, KeyOpts};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    User,
    Group,
    Module,
    Question,
    Submission,
    /// Untyped JSON; hash only.
    Json,
}

/// Arguments for `grader envelope`.
#[derive(Args, Debug)]
pub struct EnvelopeArgs {
    #[arg(value_enum)]
    pub model: Model,
    /// JSON payload file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
    #[command(flatten)]
    pub key: KeyOpts,
    /// Positional parameter signed before the nonce. Repeatable, in order.
    #[arg(long = "param")]
    pub params: Vec<String>,
    #[arg(long)]
    pub nonce: Option<i64>,
    /// Include the SHA-256 of the signing message for debugging.
    #[arg(long)]
    pub with_digest: bool,
}

/// Arguments for `grader hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    #[arg(value_enum)]
    pub model: Model,
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub fn run_envelope(args: &EnvelopeArgs) -> Result<u8> {
    let signer = args.key.signer()?.with_digest(args.with_digest);
    let payload = read_json(&args.file)?;
    let params: Vec<&str> = args.params.iter().map(String::as_str).collect();
    let envelope = envelope_json(&signer, args.model, payload, &params, args.nonce)?;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(0)
}

pub fn run_hash(args: &HashArgs) -> Result<u8> {
    let payload = read_json(&args.file)?;
    println!("{}", hash_json(args.model, payload)?);
    Ok(0)
}

fn typed<P: DeserializeOwned>(model: Model, value: Value) -> Result<P> {
    serde_json::from_value(value).with_context(|| format!("payload is not a valid {model:?}"))
}

fn digest_of<P: Signable + DeserializeOwned>(model: Model, value: Value) -> Result<ContentDigest> {
    Ok(typed::<P>(model, value)?.hash_object()?)
}

/// Canonical digest of a payload document.
pub fn hash_json(model: Model, value: Value) -> Result<ContentDigest> {
    match model {
        Model::User => digest_of::<User>(model, value),
        Model::Group => digest_of::<Group>(model, value),
        Model::Module => digest_of::<Module>(model, value),
        Model::Question => digest_of::<Question>(model, value),
        Model::Submission => digest_of::<Submission>(model, value),
        Model::Json => {
            let hv = HashValue::try_from(&value)?;
            Ok(hash_value(&hv)?)
        }
    }
}

fn sign_as<P>(
    signer: &RequestSigner,
    model: Model,
    value: Value,
    params: &[&str],
    nonce: Option<i64>,
) -> Result<Value>
where
    P: Signable + Serialize + DeserializeOwned,
{
    let envelope = signer.sign(typed::<P>(model, value)?, params, nonce)?;
    Ok(serde_json::to_value(envelope)?)
}

/// Signed envelope for a typed payload document.
pub fn envelope_json(
    signer: &RequestSigner,
    model: Model,
    value: Value,
    params: &[&str],
    nonce: Option<i64>,
) -> Result<Value> {
    match model {
        Model::User => sign_as::<User>(signer, model, value, params, nonce),
        Model::Group => sign_as::<Group>(signer, model, value, params, nonce),
        Model::Module => sign_as::<Module>(signer, model, value, params, nonce),
        Model::Question => sign_as::<Question>(signer, model, value, params, nonce),
        Model::Submission => sign_as::<Submission>(signer, model, value, params, nonce),
        Model::Json => bail!("untyped JSON cannot be enveloped; pick a model"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grader_core::CanonicalError;
    use grader_crypto::{Envelope, KeyPair, SignatureVerifier};
    use serde_json::json;

    #[test]
    fn test_hash_group_matches_model() {
        let digest = hash_json(Model::Group, json!({"Name": "G"})).unwrap();
        assert_eq!(
            digest.to_hex(),
            "333e0a1e27815d0ceee55c473fe3dc93d56c63e3bee2b3b4aee8eed6d70191a3"
        );
    }

    #[test]
    fn test_hash_untyped_json() {
        let digest = hash_json(Model::Json, json!({"x": [1, "a", 2.5]})).unwrap();
        assert_eq!(
            digest.to_hex(),
            "d1281e0381980cefad2d35617986859ff55a10bb0d152f8ff46b73a8933d15bc"
        );
        assert!(hash_json(Model::Json, json!({"flag": true})).is_err());
    }

    #[test]
    fn test_module_without_timezone_is_missing_timezone() {
        let err = hash_json(
            Model::Module,
            json!({"Name": "M", "Audience": 1, "Before": "2024-01-01T00:00:00"}),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CanonicalError>(),
            Some(CanonicalError::MissingTimezone(_))
        ));
    }

    #[test]
    fn test_wrong_shape_is_error() {
        assert!(hash_json(Model::User, json!({"Name": "G"})).is_err());
    }

    #[test]
    fn test_envelope_verifies() {
        let pair = KeyPair::generate().unwrap();
        let copy = KeyPair::from_pem(&pair.to_pem(None).unwrap(), None).unwrap();
        let signer = RequestSigner::from_key(copy).with_digest(true);

        let value =
            envelope_json(&signer, Model::Group, json!({"Name": "G"}), &["create"], Some(5)).unwrap();
        assert!(value["Signature"]["digest"].is_string());
        let envelope: Envelope<Group> = serde_json::from_value(value).unwrap();
        let digest = SignatureVerifier::new()
            .verify_envelope(&envelope, &["create"], Some(pair.public_key()))
            .unwrap();
        assert_eq!(digest, Group::new("G").hash_object().unwrap());
    }

    #[test]
    fn test_untyped_envelope_refused() {
        let signer = RequestSigner::from_key(KeyPair::generate().unwrap());
        assert!(envelope_json(&signer, Model::Json, json!({}), &[], None).is_err());
    }
}
