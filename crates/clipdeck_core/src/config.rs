//! Cache configuration.

use std::time::Duration;

/// Configuration for a [`ResultCache`](crate::cache::ResultCache).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries after eviction.
    pub capacity: usize,
    /// How long an entry stays valid after insertion.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the time-to-live.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 50);
        assert_eq!(config.ttl, Duration::from_secs(300));
    }

    #[test]
    fn builder_pattern() {
        let config = CacheConfig::new()
            .with_capacity(2)
            .with_ttl(Duration::from_millis(10));
        assert_eq!(config.capacity, 2);
        assert_eq!(config.ttl, Duration::from_millis(10));
    }
}
