//! # Nonce Freshness Window
//!
//! Optional replay protection. A signature binds its nonce but nothing
//! else stops the same signed body from being sent twice; with a window
//! configured, a nonce must be within `window` seconds of server time and
//! each `(key id, nonce)` pair is accepted once.
//!
//! Pairs older than the window are pruned on insert. A pruned pair can no
//! longer be replayed because its nonce is stale by then.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use grader_core::KeyId;
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    #[error("nonce {nonce} outside {window}s of server time {now}")]
    Stale { nonce: i64, now: i64, window: i64 },

    #[error("nonce {nonce} already used by {kid}")]
    Replayed { kid: KeyId, nonce: i64 },
}

#[derive(Debug, Clone)]
pub struct NonceTracker {
    window: i64,
    seen: Arc<Mutex<BTreeMap<i64, HashSet<KeyId>>>>,
}

impl NonceTracker {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: i64::try_from(window_secs).unwrap_or(i64::MAX),
            seen: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    pub fn window(&self) -> i64 {
        self.window
    }

    /// Accept `nonce` for `kid` at server time `now`, or reject it.
    pub fn check(&self, kid: &KeyId, nonce: i64, now: i64) -> Result<(), ReplayError> {
        if nonce.abs_diff(now) > self.window.unsigned_abs() {
            return Err(ReplayError::Stale {
                nonce,
                now,
                window: self.window,
            });
        }

        let mut seen = self.seen.lock();
        let horizon = now.saturating_sub(self.window);
        // Keep only nonces that can still pass the staleness check.
        let live = seen.split_off(&horizon);
        *seen = live;

        if !seen.entry(nonce).or_default().insert(kid.clone()) {
            return Err(ReplayError::Replayed {
                kid: kid.clone(),
                nonce,
            });
        }
        Ok(())
    }

    /// Number of remembered `(kid, nonce)` pairs.
    pub fn len(&self) -> usize {
        self.seen.lock().values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
