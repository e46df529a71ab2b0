//! Injectable key/value state backend for the correlation and enforcement
//! engines.
//!
//! The engines never touch raw maps: all shared state flows through
//! [`StateStore`], so a multi-worker deployment can swap the process-local
//! [`MemoryStore`] for an external store without changing the algorithms.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

/// Narrow key/value contract for shared engine state.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value that expires `ttl` after the write.
    fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration);

    fn delete(&self, key: &str);

    /// Live keys, used for bulk flushes and operational inspection.
    fn keys(&self) -> Vec<String>;
}

/// Process-local store backed by a locked map.
///
/// Expiry is lazy: stale entries are dropped when read, not by a background
/// sweep.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredValue>>,
}

struct StoredValue {
    value: Value,
    expires_at: Instant,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let expired = {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(stored) if stored.expires_at > Instant::now() => {
                    return Some(stored.value.clone())
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.entries.write().remove(key);
        }
        None
    }

    fn put_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let stored = StoredValue {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.to_string(), stored);
    }

    fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        entries.retain(|_, stored| stored.expires_at > now);
        entries.keys().cloned().collect()
    }
}
