//! Resource lock registry
//!
//! Maps a target key ("package-manager" or "stack:<id>") to the session
//! currently holding it. Acquisition is a single compare-and-set with no
//! queueing; a second request for a held key is rejected immediately.
//! Release rides on guard drop so every session exit path releases exactly
//! once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

/// A live lock on a target key
#[derive(Debug, Clone)]
pub struct LockToken {
    /// The locked key
    pub target_key: String,

    /// Session holding the lock
    pub holder_session_id: Uuid,

    /// Acquisition timestamp
    pub acquired_at: DateTime<Utc>,
}

/// Registry of held target keys
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: Mutex<HashMap<String, LockToken>>,
}

impl LockRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to acquire `target_key` for `holder`.
    ///
    /// Returns `None` when the key is already held. The returned guard
    /// releases the key when dropped.
    pub fn try_acquire(
        self: &Arc<Self>,
        target_key: &str,
        holder: Uuid,
    ) -> Option<LockGuard> {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());

        if held.contains_key(target_key) {
            return None;
        }

        held.insert(
            target_key.to_string(),
            LockToken {
                target_key: target_key.to_string(),
                holder_session_id: holder,
                acquired_at: Utc::now(),
            },
        );

        debug!("Lock acquired: {} by {}", target_key, holder);

        Some(LockGuard {
            registry: Arc::clone(self),
            target_key: target_key.to_string(),
            holder,
        })
    }

    /// The token currently holding `target_key`, if any
    pub fn holder_of(&self, target_key: &str) -> Option<LockToken> {
        let held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        held.get(target_key).cloned()
    }

    /// Whether `target_key` is currently held
    pub fn is_held(&self, target_key: &str) -> bool {
        self.holder_of(target_key).is_some()
    }

    fn release(&self, target_key: &str, holder: Uuid) {
        let mut held = self.held.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = held.get(target_key) {
            if token.holder_session_id == holder {
                held.remove(target_key);
                debug!("Lock released: {} by {}", target_key, holder);
            }
        }
    }
}

/// Scoped lock ownership. Dropping the guard releases the key.
#[derive(Debug)]
pub struct LockGuard {
    registry: Arc<LockRegistry>,
    target_key: String,
    holder: Uuid,
}

impl LockGuard {
    /// The locked key
    pub fn target_key(&self) -> &str {
        &self.target_key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.registry.release(&self.target_key, self.holder);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_on_drop() {
        let registry = Arc::new(LockRegistry::new());
        let holder = Uuid::new_v4();

        let guard = registry.try_acquire("package-manager", holder).unwrap();
        assert!(registry.is_held("package-manager"));

        drop(guard);
        assert!(!registry.is_held("package-manager"));
    }

    #[test]
    fn second_acquire_is_rejected() {
        let registry = Arc::new(LockRegistry::new());

        let _guard = registry
            .try_acquire("package-manager", Uuid::new_v4())
            .unwrap();
        assert!(registry
            .try_acquire("package-manager", Uuid::new_v4())
            .is_none());
    }

    #[test]
    fn independent_keys_do_not_contend() {
        let registry = Arc::new(LockRegistry::new());

        let _media = registry.try_acquire("stack:media", Uuid::new_v4()).unwrap();
        let _db = registry.try_acquire("stack:db", Uuid::new_v4()).unwrap();

        assert!(registry.is_held("stack:media"));
        assert!(registry.is_held("stack:db"));
    }

    #[test]
    fn release_after_contention_allows_reacquire() {
        let registry = Arc::new(LockRegistry::new());
        let first = Uuid::new_v4();

        let guard = registry.try_acquire("stack:media", first).unwrap();
        assert!(registry.try_acquire("stack:media", Uuid::new_v4()).is_none());
        drop(guard);

        assert!(registry.try_acquire("stack:media", Uuid::new_v4()).is_some());
    }

    #[test]
    fn holder_token_is_exposed() {
        let registry = Arc::new(LockRegistry::new());
        let holder = Uuid::new_v4();

        let _guard = registry.try_acquire("stack:media", holder).unwrap();
        let token = registry.holder_of("stack:media").unwrap();
        assert_eq!(token.holder_session_id, holder);
        assert_eq!(token.target_key, "stack:media");
    }
}
