//! Advisory subtree locks.
//!
//! Top-level operations lock the root forum id of every subtree they touch.
//! Acquisition is all-or-nothing: a caller either holds every requested key
//! or none, so two operations can never wait on each other in a cycle. A
//! caller that cannot get its keys before the timeout fails with
//! `ForumError::LockTimeout`.
//!
//! The global sticky list is shared by every subtree, so operations that may
//! rewrite it also take [`GLOBAL_STICKY_KEY`].

use crate::error::{ForumError, Result};
use crate::forum::types::NodeId;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lock key guarding the global sticky list. Store ids start at 1.
pub const GLOBAL_STICKY_KEY: NodeId = NodeId(0);

/// Registry of held subtree keys.
#[derive(Debug, Default)]
pub struct SubtreeLocks {
    held: Mutex<HashSet<NodeId>>,
    released: Condvar,
}

/// Releases its keys on drop.
#[derive(Debug)]
pub struct SubtreeGuard<'a> {
    locks: &'a SubtreeLocks,
    keys: BTreeSet<NodeId>,
}

impl SubtreeGuard<'_> {
    /// Keys held by this guard.
    pub fn keys(&self) -> &BTreeSet<NodeId> {
        &self.keys
    }
}

impl SubtreeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every key in `keys`, waiting at most `timeout`.
    pub fn acquire<I>(&self, keys: I, timeout: Duration) -> Result<SubtreeGuard<'_>>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let keys: BTreeSet<NodeId> = keys.into_iter().collect();
        let deadline = Instant::now() + timeout;

        let mut held = self
            .held
            .lock()
            .map_err(|_| ForumError::storage("subtree lock table poisoned"))?;

        while keys.iter().any(|k| held.contains(k)) {
            let now = Instant::now();
            if now >= deadline {
                warn!(keys = ?keys, ?timeout, "lock: timed out waiting for subtree");
                return Err(ForumError::lock_timeout(format!(
                    "subtree {:?} busy after {:?}",
                    keys, timeout
                )));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| ForumError::storage("subtree lock table poisoned"))?;
            held = guard;
        }

        held.extend(keys.iter().copied());
        debug!(keys = ?keys, "lock: acquired");
        Ok(SubtreeGuard { locks: self, keys })
    }

    /// Takes every key in `keys` only if none is held right now.
    pub fn try_acquire<I>(&self, keys: I) -> Result<Option<SubtreeGuard<'_>>>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let keys: BTreeSet<NodeId> = keys.into_iter().collect();
        let mut held = self
            .held
            .lock()
            .map_err(|_| ForumError::storage("subtree lock table poisoned"))?;
        if keys.iter().any(|k| held.contains(k)) {
            return Ok(None);
        }
        held.extend(keys.iter().copied());
        Ok(Some(SubtreeGuard { locks: self, keys }))
    }

    /// Returns true if `key` is currently held.
    pub fn is_held(&self, key: NodeId) -> bool {
        self.held.lock().map(|h| h.contains(&key)).unwrap_or(false)
    }
}

impl Drop for SubtreeGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for key in &self.keys {
            held.remove(key);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}
