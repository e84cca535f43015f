//! In-memory TTL cache for orchestrator status strings.
//!
//! Expiry is lazy: an entry is dropped the first time it is read at or after
//! its deadline. There is no background sweep; the key space is bounded by the
//! number of live workspaces.
//!
//! Uses [`tokio::time::Instant`] so tests can drive expiry with a paused clock.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

struct CachedStatus {
    value: String,
    expires_at: Instant,
}

/// Workspace id → last known orchestrator status.
pub struct StatusCache {
    entries: Mutex<HashMap<String, CachedStatus>>,
    default_ttl: Duration,
}

impl StatusCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Returns the cached value, or `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => Instant::now() >= entry.expires_at,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    /// Insert or wholesale-replace an entry that lives for `ttl`.
    pub fn put(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.lock()
            .insert(key.to_string(), CachedStatus { value, expires_at });
    }

    /// [`put`](Self::put) with the configured default TTL.
    pub fn put_default(&self, key: &str, value: String) {
        self.put(key, value, self.default_ttl);
    }

    /// Drop an entry (e.g. after a start/stop changes the real state).
    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CachedStatus>> {
        // Entries are replaced wholesale, so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_visible_within_ttl() {
        let cache = StatusCache::new(Duration::from_secs(30));
        cache.put_default("csb-a", "Running".to_string());
        tokio::time::advance(Duration::from_millis(29_999)).await;
        assert_eq!(cache.get("csb-a").as_deref(), Some("Running"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_absent_at_ttl_and_evicted() {
        let cache = StatusCache::new(Duration::from_secs(30));
        cache.put("csb-a", "Running".to_string(), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("csb-a"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_value_and_deadline() {
        let cache = StatusCache::new(Duration::from_secs(30));
        cache.put("csb-a", "Starting".to_string(), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(4)).await;
        cache.put("csb-a", "Running".to_string(), Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("csb-a").as_deref(), Some("Running"));
    }

    #[tokio::test]
    async fn test_missing_and_invalidated() {
        let cache = StatusCache::new(Duration::from_secs(30));
        assert_eq!(cache.get("csb-a"), None);
        cache.put_default("csb-a", "Stopped".to_string());
        cache.invalidate("csb-a");
        assert_eq!(cache.get("csb-a"), None);
    }
}
