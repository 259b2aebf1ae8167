//! Cache storage abstraction and the in-process backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use super::fingerprint::Fingerprint;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Short-TTL key/value store consumed by the deduplication cache.
///
/// Best-effort: a backend may evict entries before their TTL elapses, so
/// callers must tolerate a miss even within the TTL window. Writes to an
/// existing key overwrite the value and restart the TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &Fingerprint, value: Vec<u8>, ttl: Duration)
    -> Result<(), StoreError>;
}

struct StoredEntry {
    expires_at: Instant,
    payload: Vec<u8>,
}

/// In-process [`CacheStore`] backend.
///
/// Expiry is checked on read; expired entries are purged opportunistically
/// when a write finds the store at capacity. If purging frees nothing, an
/// arbitrary entry is evicted early, which the contract allows.
pub struct MemoryStore {
    entries: DashMap<String, StoredEntry>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        // The read guard must drop before the expired entry is removed.
        match self.entries.get(key.as_str()) {
            None => return Ok(None),
            Some(entry) => {
                if entry.expires_at > Instant::now() {
                    return Ok(Some(entry.payload.clone()));
                }
            }
        }

        self.entries.remove(key.as_str());
        Ok(None)
    }

    async fn put(
        &self,
        key: &Fingerprint,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if !self.entries.contains_key(key.as_str()) && self.entries.len() >= self.capacity {
            self.purge_expired();

            if self.entries.len() >= self.capacity {
                let victim = self.entries.iter().next().map(|entry| entry.key().clone());
                if let Some(victim) = victim {
                    self.entries.remove(&victim);
                }
            }
        }

        self.entries.insert(
            key.as_str().to_owned(),
            StoredEntry {
                expires_at: Instant::now() + ttl,
                payload: value,
            },
        );
        Ok(())
    }
}
