//! # Server Key Ring
//!
//! Operator public keys loaded once from a directory at startup. The ring
//! is an ordinary value: the server builds it before binding its listener
//! and hands it to request handlers by reference. Nothing re-scans the
//! directory behind the caller's back; [`KeyRing::reload`] returns a new
//! ring and the caller decides whether to swap it in.
//!
//! ## Directory Layout
//!
//! - `key_<fingerprint>_pub.pem`: a PEM `PUBLIC KEY`, loaded into the ring.
//! - `key_<fingerprint>.pem`: the matching private key, never read here.
//!
//! File names carry the full 32-byte fingerprint; the ring indexes keys by
//! the fingerprint truncated to the configured key id length, which is the
//! form clients send.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use grader_core::{sha256, KeyId};

use crate::error::KeyError;
use crate::key::{write_new_file, KeyPair, PublicKey};

/// Operator public keys loaded from a directory, indexed by key id.
#[derive(Debug, Clone)]
pub struct KeyRing {
    dir: PathBuf,
    kid_bytes: usize,
    keys: HashMap<KeyId, PublicKey>,
}

impl KeyRing {
    /// Load every public key in `dir`, creating the directory (mode 0700)
    /// if needed. An empty ring gets one freshly generated server key.
    ///
    /// # Errors
    ///
    /// [`KeyError::InsecurePermissions`] if the directory is accessible by
    /// group or others.
    pub fn load(dir: impl Into<PathBuf>, kid_bytes: usize) -> Result<Self, KeyError> {
        let dir = dir.into();
        ensure_private_dir(&dir)?;

        let mut keys = HashMap::new();
        let entries = fs::read_dir(&dir).map_err(|e| KeyError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| KeyError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_file() || !is_public_key_file(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let pem = fs::read_to_string(&path).map_err(|e| KeyError::io(&path, e))?;
            let key = PublicKey::from_pem(&pem)?;
            keys.insert(key.fingerprint(kid_bytes), key);
        }

        if keys.is_empty() {
            let key = generate_server_key(&dir)?;
            tracing::info!(dir = %dir.display(), kid = %key.fingerprint(kid_bytes), "key ring empty, generated server key");
            keys.insert(key.fingerprint(kid_bytes), key);
        }

        tracing::info!(dir = %dir.display(), keys = keys.len(), "loaded key ring");
        Ok(Self {
            dir,
            kid_bytes,
            keys,
        })
    }

    /// Re-read the directory into a new ring.
    pub fn reload(&self) -> Result<Self, KeyError> {
        Self::load(self.dir.clone(), self.kid_bytes)
    }

    /// Public key for `kid`, if the ring holds it.
    pub fn get(&self, kid: &KeyId) -> Option<&PublicKey> {
        self.keys.get(kid)
    }

    /// Whether `kid` is an operator key.
    pub fn contains(&self, kid: &KeyId) -> bool {
        self.keys.contains_key(kid)
    }

    /// Key ids, in no particular order.
    pub fn key_ids(&self) -> impl Iterator<Item = &KeyId> {
        self.keys.keys()
    }

    /// Number of loaded keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Directory the ring was loaded from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_public_key_file(name: &str) -> bool {
    name.strip_prefix("key_")
        .and_then(|rest| rest.strip_suffix("_pub.pem"))
        .is_some_and(|fp| !fp.is_empty())
}

fn generate_server_key(dir: &Path) -> Result<PublicKey, KeyError> {
    let pair = KeyPair::generate()?;
    let fp = sha256(pair.public_key().der()).to_hex();
    pair.write_pem(&dir.join(format!("key_{fp}.pem")), None)?;
    let public_pem = pair.public_key().to_pem()?;
    write_new_file(&dir.join(format!("key_{fp}_pub.pem")), public_pem.as_bytes(), 0o644)?;
    Ok(pair.public_key().clone())
}

#[cfg(unix)]
fn ensure_private_dir(dir: &Path) -> Result<(), KeyError> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};

    fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|e| KeyError::io(dir, e))?;
    let mode = fs::metadata(dir)
        .map_err(|e| KeyError::io(dir, e))?
        .permissions()
        .mode();
    if mode & 0o077 != 0 {
        return Err(KeyError::InsecurePermissions {
            path: dir.to_path_buf(),
            mode: mode & 0o777,
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_private_dir(dir: &Path) -> Result<(), KeyError> {
    fs::create_dir_all(dir).map_err(|e| KeyError::io(dir, e))
}
