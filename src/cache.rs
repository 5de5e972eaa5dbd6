//! A small, time-bounded cache (§5: "no indefinite caches"). Entries expire
//! `ttl` after insertion; admin writes additionally clear the relevant key
//! so a write is visible to the next Capacity Engine read immediately,
//! rather than waiting out the TTL.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

pub struct TtlCache<V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, value: V) {
        self.entries.lock().unwrap().insert(
            key,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Invalidate a single key (called by admin writes, per §5/§4.6).
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    /// Invalidate every key whose prefix matches — used when a write affects
    /// a whole family of cached reads (e.g. all closures in a date range).
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.entries.lock().unwrap().retain(|k, _| !k.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_millis(10));
        cache.put("k".into(), 42);
        assert_eq!(cache.get("k"), Some(42));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn invalidate_clears_before_ttl() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(300));
        cache.put("k".into(), 1);
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn invalidate_prefix_clears_family() {
        let cache: TtlCache<i32> = TtlCache::new(Duration::from_secs(300));
        cache.put("closures:a@x.com".into(), 1);
        cache.put("closures:b@x.com".into(), 2);
        cache.put("overrides:a@x.com".into(), 3);
        cache.invalidate_prefix("closures:");
        assert_eq!(cache.get("closures:a@x.com"), None);
        assert_eq!(cache.get("closures:b@x.com"), None);
        assert_eq!(cache.get("overrides:a@x.com"), Some(3));
    }
}
