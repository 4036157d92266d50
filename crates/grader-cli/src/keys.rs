//! # Key Subcommand
//!
//! P-256 key generation and inspection.
//!
//! ## Security Invariant
//!
//! `generate` never overwrites an existing key file, and writes new
//! private keys with owner-only permissions.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use grader_core::KeyId;
use grader_crypto::KeyPair;
use serde::Serialize;

use crate::KeyOpts;

/// Arguments for the `grader key` subcommand.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Generate a new P-256 key pair.
    Generate(KeyOpts),

    /// Print the key id and base64 public key of an existing key.
    Show(KeyOpts),
}

/// What a client needs to register: its key id and public key.
#[derive(Debug, Serialize)]
pub struct KeyInfo {
    pub public_key_id: KeyId,
    /// Base64 DER SubjectPublicKeyInfo.
    pub public_key: String,
}

impl KeyInfo {
    pub fn of(pair: &KeyPair, kid_bytes: usize) -> Self {
        Self {
            public_key_id: pair.fingerprint(kid_bytes),
            public_key: pair.public_key().to_b64(),
        }
    }
}

/// Execute the key subcommand.
pub fn run_key(args: &KeyArgs) -> Result<u8> {
    let info = match &args.command {
        KeyCommand::Generate(opts) => generate(&opts.key, opts.password()?.as_deref(), opts.kid_bytes)?,
        KeyCommand::Show(opts) => KeyInfo::of(&opts.load()?, opts.kid_bytes),
    };
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(0)
}

/// Generate and persist a key pair at `path`.
pub fn generate(path: &Path, password: Option<&[u8]>, kid_bytes: usize) -> Result<KeyInfo> {
    if path.exists() {
        bail!("refusing to overwrite existing key: {}", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let pair = KeyPair::generate().context("key generation failed")?;
    pair.write_pem(path, password)
        .with_context(|| format!("failed to write key: {}", path.display()))?;
    tracing::info!(path = %path.display(), encrypted = password.is_some(), "generated key");
    Ok(KeyInfo::of(&pair, kid_bytes))
}
