//! Deduplication cache configuration.

use std::time::Duration;

use serde::Deserialize;

// The TTL is sized to absorb bursts of duplicate tracking writes within one
// interactive session; it is not a durability mechanism.
const DEFAULT_TTL_SECS: u64 = 10;
const DEFAULT_CAPACITY: usize = 4096;

/// Deduplication cache configuration from the `[cache]` settings section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the deduplication cache.
    pub enabled: bool,
    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,
    /// Maximum entries held by the in-process backend.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_TTL_SECS,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_secs: settings.ttl_secs,
            capacity: settings.capacity,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ttl_secs, 10);
        assert_eq!(config.capacity, 4096);
    }

    #[test]
    fn ttl_converts_to_duration() {
        let config = CacheConfig {
            ttl_secs: 3,
            ..Default::default()
        };
        assert_eq!(config.ttl(), Duration::from_secs(3));
    }
}
