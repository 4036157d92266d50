//! # grader-cli — CLI Tool for the Grader Stack
//!
//! Provides the `grader` command-line interface: the client half of the
//! submission protocol.
//!
//! ## Subcommands
//!
//! - `grader key` — generate a P-256 key pair, or show a key's id.
//! - `grader request` — print the signed JSON body for a server endpoint.
//! - `grader envelope` — print a signed envelope for a typed payload.
//! - `grader hash` — print the canonical digest of a payload.
//!
//! ```bash
//! grader key generate --key ~/.grader/key.pem
//! grader request --key ~/.grader/key.pem group --name G
//! grader hash group group.json
//! ```

pub mod keys;
pub mod payload;
pub mod request;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use grader_crypto::{KeyPair, RequestSigner, DEFAULT_KID_BYTES};

/// Key selection shared by every signing subcommand.
#[derive(Args, Debug, Clone)]
pub struct KeyOpts {
    /// Path to the PEM private key.
    #[arg(long)]
    pub key: std::path::PathBuf,
    /// Environment variable holding the key password.
    #[arg(long, value_name = "VAR")]
    pub password_env: Option<String>,
    /// Key id length in bytes.
    #[arg(long, default_value_t = DEFAULT_KID_BYTES)]
    pub kid_bytes: usize,
}

impl KeyOpts {
    pub fn password(&self) -> Result<Option<Vec<u8>>> {
        read_password(self.password_env.as_deref())
    }

    /// Load the key pair; a missing file is an error.
    pub fn load(&self) -> Result<KeyPair> {
        load_key(&self.key, self.password()?.as_deref())
    }

    pub fn signer(&self) -> Result<RequestSigner> {
        let pair = self.load()?;
        Ok(RequestSigner::from_key(pair).with_kid_bytes(self.kid_bytes))
    }
}

/// Read a password from the named environment variable.
pub fn read_password(var: Option<&str>) -> Result<Option<Vec<u8>>> {
    match var {
        Some(var) => {
            let value = std::env::var(var)
                .with_context(|| format!("password variable {var} is not set"))?;
            Ok(Some(value.into_bytes()))
        }
        None => Ok(None),
    }
}

pub fn load_key(path: &Path, password: Option<&[u8]>) -> Result<KeyPair> {
    KeyPair::load(path, password, false)
        .with_context(|| format!("failed to load key {}", path.display()))
}

/// Read a JSON document from a file.
pub fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))
}
