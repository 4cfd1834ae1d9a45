use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

struct Entry {
    count: u32,
    window_start: Instant,
}

/// Fixed-window rate limiter keyed by caller identity. Injected wherever
/// it is needed rather than living in a process global, and bounded:
/// when the key map is full, expired windows are swept first and the
/// stalest window is evicted if the sweep was not enough.
pub struct RateLimiter {
    window: Duration,
    max_hits: u32,
    max_keys: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_hits: u32, max_keys: usize) -> Self {
        Self {
            window,
            max_hits,
            max_keys,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records one hit for `key` and reports whether it is allowed.
    pub async fn allow(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(key) {
            if now.duration_since(entry.window_start) > self.window {
                entry.count = 1;
                entry.window_start = now;
                return true;
            }
            if entry.count >= self.max_hits {
                return false;
            }
            entry.count += 1;
            return true;
        }

        if entries.len() >= self.max_keys {
            let window = self.window;
            entries.retain(|_, e| now.duration_since(e.window_start) <= window);
            if entries.len() >= self.max_keys {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.window_start)
                    .map(|(k, _)| k.clone());
                if let Some(key) = oldest {
                    entries.remove(&key);
                }
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                count: 1,
                window_start: now,
            },
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 3, 100);

        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);

        // Other callers are unaffected.
        assert!(limiter.allow("5.6.7.8").await);
    }

    #[tokio::test]
    async fn a_new_window_resets_the_count() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1, 100);

        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.allow("1.2.3.4").await);
    }

    #[tokio::test]
    async fn key_capacity_stays_bounded() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1, 2);

        assert!(limiter.allow("a").await);
        assert!(limiter.allow("b").await);
        // Forces eviction of the stalest live window.
        assert!(limiter.allow("c").await);

        let entries = limiter.entries.lock().await;
        assert!(entries.len() <= 2);
        assert!(entries.contains_key("c"));
    }
}
