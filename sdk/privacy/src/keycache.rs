//! Unlocked key cache
//!
//! Holds decrypted secrets for a bounded time. Expiry is measured on an
//! injected [`Clock`]; an expired entry reads as locked and is wiped.
//! Entries unlocked without an explicit TTL use `[keys].cache_ttl_secs`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, trace};
use shade_config::KeyConfig;

use crate::clock::Clock;
use crate::keys::Secret;

struct CachedKey {
    key: Secret,
    expires_at_ms: u64,
}

/// Time-bounded cache of unlocked secrets
pub struct KeyCache<C: Clock> {
    clock: C,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CachedKey>>,
}

impl<C: Clock> KeyCache<C> {
    /// Cache with the default `[keys]` settings
    pub fn new(clock: C) -> Self {
        Self::from_config(&KeyConfig::default(), clock)
    }

    pub fn from_config(config: &KeyConfig, clock: C) -> Self {
        Self {
            clock,
            default_ttl: config.cache_ttl(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CachedKey>> {
        // Entries stay consistent even if a holder panicked
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cache `key` under `id` until `ttl` elapses. Replaces any previous entry.
    pub fn unlock(&self, id: impl Into<String>, key: Secret, ttl: Duration) {
        let id = id.into();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at_ms = self.clock.now_millis().saturating_add(ttl_ms);
        debug!("unlocked key {id} for {ttl_ms} ms");
        self.entries().insert(id, CachedKey { key, expires_at_ms });
    }

    /// [`unlock`](Self::unlock) for the configured TTL
    pub fn unlock_default(&self, id: impl Into<String>, key: Secret) {
        self.unlock(id, key, self.default_ttl);
    }

    /// The cached key, if unlocked and not yet expired
    pub fn get(&self, id: &str) -> Option<Secret> {
        let now = self.clock.now_millis();
        let mut entries = self.entries();
        match entries.get(id) {
            Some(entry) if now < entry.expires_at_ms => Some(entry.key.clone()),
            Some(_) => {
                trace!("key {id} expired");
                entries.remove(id);
                None
            }
            None => None,
        }
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Drop one key. Returns whether it was cached.
    pub fn lock(&self, id: &str) -> bool {
        self.entries().remove(id).is_some()
    }

    pub fn lock_all(&self) {
        let mut entries = self.entries();
        debug!("locking {} cached keys", entries.len());
        entries.clear();
    }

    /// Remove every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at_ms);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
