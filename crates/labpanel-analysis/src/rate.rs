//! Per-key minimum update interval.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Drops updates that arrive sooner than `interval` after the last accepted
/// update of the same key. Keys are compared case-insensitively.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: HashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: HashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Accept or drop an update of `key` arriving now.
    pub fn accept(&mut self, key: &str) -> bool {
        self.accept_at(key, Instant::now())
    }

    /// Accept or drop an update of `key` arriving at `now`.
    pub fn accept_at(&mut self, key: &str, now: Instant) -> bool {
        let key = key.to_lowercase();
        match self.last.get(&key) {
            Some(&previous) if now.saturating_duration_since(previous) < self.interval => false,
            _ => {
                self.last.insert(key, now);
                true
            }
        }
    }

    /// Forget the history of `key`.
    pub fn reset(&mut self, key: &str) {
        self.last.remove(&key.to_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_within_interval_passes_once() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        let accepted = (0..10)
            .filter(|i| limiter.accept_at("Image_00", t0 + Duration::from_millis(i * 45)))
            .count();
        assert_eq!(accepted, 1);
        assert!(limiter.accept_at("IMAGE_00", t0 + Duration::from_millis(500)));
    }

    #[test]
    fn keys_are_independent() {
        let mut limiter = RateLimiter::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(limiter.accept_at("Image_00", t0));
        assert!(limiter.accept_at("Image_01", t0));
        assert!(!limiter.accept_at("image_00", t0 + Duration::from_millis(100)));
        limiter.reset("image_00");
        assert!(limiter.accept_at("image_00", t0 + Duration::from_millis(100)));
    }
}
