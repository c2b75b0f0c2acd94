//! Short-lived cache for in-flight registration requests.
//!
//! Entries expire after a fixed lifetime; expiry is lazy, applied whenever
//! the cache is read.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a registration entry is retained by default: twice the longest
/// a node will wait on a fetch before retrying.
pub const DEFAULT_REGISTRATION_CACHE_LIFETIME: Duration = Duration::from_secs(2 * 150);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A TTL map keyed by key ID, used by the enrollment flow to hold
/// registration state between a node's fetch attempts.
pub struct RegistrationCache<V> {
    lifetime: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> RegistrationCache<V> {
    pub fn new() -> Self {
        Self::with_lifetime(DEFAULT_REGISTRATION_CACHE_LIFETIME)
    }

    pub fn with_lifetime(lifetime: Duration) -> Self {
        Self {
            lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a live entry. Expired entries are dropped here rather than
    /// by a background sweep.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value with the default lifetime, replacing any previous
    /// entry for the key.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + self.lifetime,
            },
        );
    }

    /// Number of live entries.
    pub fn item_count(&self) -> usize {
        self.prune();
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    /// Snapshot of all live entries.
    pub fn items(&self) -> HashMap<String, V> {
        self.prune();
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Drop every entry.
    pub fn flush(&self) {
        self.entries.lock().expect("cache mutex poisoned").clear();
    }

    fn prune(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .retain(|_, e| e.expires_at > now);
    }
}

impl<V: Clone> Default for RegistrationCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
