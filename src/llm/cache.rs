//! In-memory TTL cache for LLM responses.
//!
//! Vision extraction is the expensive step of the pipeline; re-uploading
//! the same scan should not pay for a second model call. Keys are SHA-256
//! fingerprints over the request parts, so raw image bytes never sit in
//! the key space.
//!
//! The cache sits OUTSIDE the retry wrapper: a hit skips retry entirely,
//! a miss pays the full resilient call and stores the outcome. Lookups on
//! expired entries evict lazily; a background sweeper reclaims the rest.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL-bounded response cache. Cheap to clone behind an `Arc`.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    stats: Mutex<CacheStats>,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(ttl: Duration, enabled: bool) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
            ttl,
            enabled,
        }
    }

    /// Fingerprint request parts into a stable cache key.
    ///
    /// Parts are length-prefixed before hashing so `["ab", "c"]` and
    /// `["a", "bc"]` cannot collide.
    pub fn fingerprint(parts: &[&[u8]]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().unwrap();
        let hit = match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        let mut stats = self.stats.lock().unwrap();
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.entries.lock().unwrap().insert(
            key.into(),
            CacheEntry {
                value: value.into(),
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = *self.stats.lock().unwrap();
        stats.entries = self.entries.lock().unwrap().len();
        stats
    }

    /// Spawn the periodic sweep task. The task holds a weak reference,
    /// so it ends once the cache itself is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                let removed = cache.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "cache sweep evicted expired entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60), true);
        cache.put("k", "resposta");
        assert_eq!(cache.get("k").as_deref(), Some("resposta"));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_evicted() {
        let cache = ResponseCache::new(Duration::ZERO, true);
        cache.put("k", "resposta");
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn disabled_cache_stores_and_returns_nothing() {
        let cache = ResponseCache::new(Duration::from_secs(60), false);
        cache.put("k", "resposta");
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60), true);
        cache.put("fresh", "a");
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.stats().entries, 1);

        let expiring = ResponseCache::new(Duration::ZERO, true);
        expiring.put("old", "b");
        assert_eq!(expiring.sweep(), 1);
        assert_eq!(expiring.stats().entries, 0);
    }

    #[test]
    fn fingerprint_is_stable_and_boundary_safe() {
        let a = ResponseCache::fingerprint(&[b"modelo", b"prompt", b"imagem"]);
        let b = ResponseCache::fingerprint(&[b"modelo", b"prompt", b"imagem"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        // Same concatenation, different part boundaries, must differ.
        let c = ResponseCache::fingerprint(&[b"ab", b"c"]);
        let d = ResponseCache::fingerprint(&[b"a", b"bc"]);
        assert_ne!(c, d);
    }
}
