//! Fingerprint-based deduplication facade.
//!
//! Composes attribute extraction, fingerprint construction, and the TTL
//! store into the lookup/store flow callers use to absorb near-duplicate
//! tracking writes. Deduplication is an optimization, never a correctness
//! requirement: every backend failure degrades to a miss on read or a
//! dropped write on put, and the surrounding record-creation flow proceeds
//! against the authoritative store.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::attributes::{AttributeSource, CacheIdentity};
use super::config::CacheConfig;
use super::fingerprint::{Fingerprint, build_key};
use super::store::CacheStore;

pub struct DedupCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    enabled: bool,
}

impl DedupCache {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            ttl: config.ttl(),
            enabled: config.enabled,
        }
    }

    /// Normalize `source`, build the fingerprint, and consult the store.
    ///
    /// The fingerprint is returned alongside the result, also on a miss, so
    /// the caller can reuse it for the subsequent [`store_at_key`] call
    /// without recomputation. A backend failure or an undecodable cached
    /// payload degrades to a miss.
    ///
    /// [`store_at_key`]: Self::store_at_key
    pub async fn lookup<T: DeserializeOwned>(
        &self,
        source: AttributeSource<'_>,
        keys: &[&str],
        type_id: &str,
    ) -> (Option<T>, Fingerprint) {
        let attributes = source.into_attributes();
        let key = build_key(&attributes, keys, type_id);

        if !self.enabled {
            metrics::counter!("orma_dedup_miss_total").increment(1);
            return (None, key);
        }

        let payload = match self.store.get(&key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                metrics::counter!("orma_dedup_miss_total").increment(1);
                return (None, key);
            }
            Err(err) => {
                warn!(fingerprint = %key, type_id, error = %err, "Treating cache read failure as miss");
                metrics::counter!("orma_dedup_backend_error_total").increment(1);
                metrics::counter!("orma_dedup_miss_total").increment(1);
                return (None, key);
            }
        };

        match serde_json::from_slice(&payload) {
            Ok(value) => {
                metrics::counter!("orma_dedup_hit_total").increment(1);
                (Some(value), key)
            }
            Err(err) => {
                warn!(fingerprint = %key, type_id, error = %err, "Discarding undecodable cache payload");
                metrics::counter!("orma_dedup_miss_total").increment(1);
                (None, key)
            }
        }
    }

    /// Write-through cache of a record keyed by its own identity.
    ///
    /// Derives the fingerprint from the value's [`CacheIdentity`]; used when
    /// the caller holds an authoritative record but no fingerprint from a
    /// prior lookup.
    pub async fn store_by_identity<T>(&self, value: &T)
    where
        T: Serialize + CacheIdentity,
    {
        let attributes = value.cache_attributes();
        let key = build_key(&attributes, value.identity_keys(), value.cache_type());
        self.put(&key, value).await;
    }

    /// Write a value at a fingerprint previously returned by [`lookup`].
    ///
    /// [`lookup`]: Self::lookup
    pub async fn store_at_key<T: Serialize>(&self, value: &T, key: &Fingerprint) {
        self.put(key, value).await;
    }

    async fn put<T: Serialize>(&self, key: &Fingerprint, value: &T) {
        if !self.enabled {
            return;
        }

        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(fingerprint = %key, error = %err, "Skipping cache write for unserializable value");
                return;
            }
        };

        match self.store.put(key, payload, self.ttl).await {
            Ok(()) => {
                metrics::counter!("orma_dedup_store_total").increment(1);
            }
            Err(err) => {
                warn!(fingerprint = %key, error = %err, "Dropping cache write after backend failure");
                metrics::counter!("orma_dedup_backend_error_total").increment(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::super::attributes::{AttributeMap, AttributeValue};
    use super::super::store::{MemoryStore, StoreError};
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Visitor {
        id: u64,
        name: String,
    }

    fn cache_with_store(store: Arc<dyn CacheStore>) -> DedupCache {
        DedupCache::new(store, &CacheConfig::default())
    }

    fn visitor_attrs(id: u64) -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.insert("id", id as i64);
        attrs
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let cache = cache_with_store(Arc::new(MemoryStore::new(16)));

        let (missed, fingerprint) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(42)),
                &["id"],
                "session",
            )
            .await;
        assert!(missed.is_none());

        let record = Visitor {
            id: 42,
            name: "first".into(),
        };
        cache.store_at_key(&record, &fingerprint).await;

        let (hit, second_fingerprint) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(42)),
                &["id"],
                "session",
            )
            .await;
        assert_eq!(hit, Some(record));
        assert_eq!(fingerprint, second_fingerprint);
    }

    #[tokio::test]
    async fn type_id_separates_entries() {
        let cache = cache_with_store(Arc::new(MemoryStore::new(16)));

        let (_, fingerprint) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(7)),
                &["id"],
                "session",
            )
            .await;
        cache
            .store_at_key(
                &Visitor {
                    id: 7,
                    name: "session".into(),
                },
                &fingerprint,
            )
            .await;

        let (other_kind, _) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(7)),
                &["id"],
                "access",
            )
            .await;
        assert!(other_kind.is_none());
    }

    #[tokio::test]
    async fn scalar_source_round_trips() {
        let cache = cache_with_store(Arc::new(MemoryStore::new(16)));

        let (_, fingerprint) = cache
            .lookup::<Visitor>(AttributeSource::Scalar(AttributeValue::Int(9)), &[], "cookie")
            .await;
        cache
            .store_at_key(
                &Visitor {
                    id: 9,
                    name: "scalar".into(),
                },
                &fingerprint,
            )
            .await;

        // The same identifier as a string normalizes to the same entry.
        let (hit, _) = cache
            .lookup::<Visitor>(
                AttributeSource::Scalar(AttributeValue::from("9")),
                &[],
                "cookie",
            )
            .await;
        assert!(hit.is_some());
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let cache = DedupCache::new(Arc::new(MemoryStore::new(16)), &config);

        let (_, fingerprint) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(1)),
                &["id"],
                "session",
            )
            .await;
        cache
            .store_at_key(
                &Visitor {
                    id: 1,
                    name: "ignored".into(),
                },
                &fingerprint,
            )
            .await;

        let (hit, _) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(1)),
                &["id"],
                "session",
            )
            .await;
        assert!(hit.is_none());
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl CacheStore for FailingStore {
        async fn get(&self, _key: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }

        async fn put(
            &self,
            _key: &Fingerprint,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_miss() {
        let cache = cache_with_store(Arc::new(FailingStore));

        let (missed, fingerprint) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(3)),
                &["id"],
                "session",
            )
            .await;
        assert!(missed.is_none());

        // The dropped write must not surface an error to the caller.
        cache
            .store_at_key(
                &Visitor {
                    id: 3,
                    name: "durable".into(),
                },
                &fingerprint,
            )
            .await;
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_miss() {
        let store = Arc::new(MemoryStore::new(16));
        let cache = cache_with_store(store.clone());

        let (_, fingerprint) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(5)),
                &["id"],
                "session",
            )
            .await;
        store
            .put(&fingerprint, b"not-json".to_vec(), Duration::from_secs(5))
            .await
            .expect("raw put");

        let (hit, _) = cache
            .lookup::<Visitor>(
                AttributeSource::Mapping(visitor_attrs(5)),
                &["id"],
                "session",
            )
            .await;
        assert!(hit.is_none());
    }
}
