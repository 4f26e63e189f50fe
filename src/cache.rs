// Value Cache: TTL map for slow, provider-enumerated filter value lists
// (e.g. every person in a photo library). Reader-preferring lock; writes
// only happen on cache fill.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::provider::FilterValueOption;

struct CacheEntry {
    values: Vec<FilterValueOption>,
    expires_at: DateTime<Utc>,
}

/// Default TTL applied when an attribute doesn't specify its own.
pub const DEFAULT_TTL_SECONDS: i64 = 24 * 60 * 60;

pub struct ValueCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl Default for ValueCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached values for `attribute` if present and not
    /// expired. A hit on an empty vector (set to suppress re-fetch) returns
    /// `Some(&[])`, distinct from `None` meaning "never fetched".
    pub fn get(&self, attribute: &str) -> Option<Vec<FilterValueOption>> {
        let entries = self.entries.read();
        let entry = entries.get(attribute)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        Some(entry.values.clone())
    }

    pub fn set(&self, attribute: impl Into<String>, values: Vec<FilterValueOption>, ttl_seconds: Option<u64>) {
        let ttl = ttl_seconds.map(|s| s as i64).unwrap_or(DEFAULT_TTL_SECONDS);
        let expires_at = Utc::now() + ChronoDuration::seconds(ttl);
        self.entries.write().insert(attribute.into(), CacheEntry { values, expires_at });
    }

    pub fn invalidate(&self, attribute: &str) {
        self.entries.write().remove(attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(value: &str, count: usize) -> FilterValueOption {
        FilterValueOption {
            value: value.to_string(),
            label: value.to_string(),
            count,
        }
    }

    #[test]
    fn miss_returns_none_until_set() {
        let cache = ValueCache::new();
        assert!(cache.get("person").is_none());
        cache.set("person", vec![option("p1", 3)], Some(3600));
        assert_eq!(cache.get("person").unwrap(), vec![option("p1", 3)]);
    }

    #[test]
    fn empty_vector_is_cached_to_suppress_refetch() {
        let cache = ValueCache::new();
        cache.set("album", Vec::new(), Some(60));
        assert_eq!(cache.get("album"), Some(Vec::new()));
    }

    #[test]
    fn expired_entry_is_treated_as_a_miss() {
        let cache = ValueCache::new();
        cache.set("person", vec![option("p1", 1)], Some(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(cache.get("person").is_none());
    }

    #[test]
    fn invalidate_forces_a_fresh_fetch() {
        let cache = ValueCache::new();
        cache.set("person", vec![option("p1", 1)], Some(3600));
        cache.invalidate("person");
        assert!(cache.get("person").is_none());
    }
}
