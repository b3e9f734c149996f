//! Optional read-through cache keyed by `(provider, endpoint, args)` with a
//! configurable TTL. Quotes use a short TTL (≤5s); candles use a longer one
//! per timeframe.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<V: Clone> {
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn key(provider: &str, endpoint: &str, args: &str) -> String {
        format!("{provider}:{endpoint}:{args}")
    }

    pub fn get(&self, provider: &str, endpoint: &str, args: &str) -> Option<V> {
        let key = Self::key(provider, endpoint, args);
        let entries = self.entries.lock();
        entries.get(&key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, provider: &str, endpoint: &str, args: &str, value: V, ttl: Duration) {
        let key = Self::key(provider, endpoint, args);
        let mut entries = self.entries.lock();
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

pub const QUOTE_TTL: Duration = Duration::from_secs(5);
pub const CANDLE_TTL: Duration = Duration::from_secs(300);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_after_ttl_expires() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.put("p", "quote", "AAPL", 42, Duration::from_millis(10));
        assert_eq!(cache.get("p", "quote", "AAPL"), Some(42));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get("p", "quote", "AAPL"), None);
    }

    #[test]
    fn distinct_args_do_not_collide() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.put("p", "quote", "AAPL", 1, Duration::from_secs(5));
        cache.put("p", "quote", "TSLA", 2, Duration::from_secs(5));
        assert_eq!(cache.get("p", "quote", "AAPL"), Some(1));
        assert_eq!(cache.get("p", "quote", "TSLA"), Some(2));
    }
}
