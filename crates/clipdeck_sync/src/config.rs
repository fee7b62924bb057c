//! Configuration for the sync engine.

use clipdeck_core::{CacheConfig, EntityId};
use rand::Rng;
use std::time::Duration;

/// Storage key of the offline log when no project scope is given.
pub const DEFAULT_OFFLINE_KEY: &str = "clipdeck.offline_queue";

/// Storage key of the auto-save draft when no project scope is given.
pub const DEFAULT_DRAFT_KEY: &str = "clipdeck.draft";

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of calls, the first one included.
    pub max_attempts: u32,
    /// Delay after the first failure when the failure carries no hint.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add up to 25% random extra delay.
    pub jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration allowing `max_attempts` calls.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay after the call with index `attempt` (0-indexed) failed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.delay_with_seed(attempt, None)
    }

    /// Like [`Self::delay_for_attempt`], starting from `seed` instead of
    /// the base delay when one is given.
    ///
    /// `delay = min(seed * multiplier^attempt, max_delay)`
    pub fn delay_with_seed(&self, attempt: u32, seed: Option<Duration>) -> Duration {
        let seed = seed.unwrap_or(self.base_delay).as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_secs = (seed * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_secs_f64());
        let delay_secs = if delay_secs.is_finite() { delay_secs } else { 0.0 };

        if self.jitter && delay_secs > 0.0 {
            let jitter = delay_secs * 0.25 * rand::thread_rng().gen_range(0.0..1.0);
            Duration::from_secs_f64(delay_secs + jitter)
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// What to do when a retryable failure outlasts the attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustedRetryPolicy {
    /// Keep the optimistic state and queue the remaining steps for replay.
    #[default]
    HandOffToOfflineQueue,
    /// Restore the pre-mutation snapshot.
    RollBack,
}

/// Configuration for the offline queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineQueueConfig {
    /// Key the log is persisted under.
    pub storage_key: String,
    /// Maximum number of queued mutations.
    pub max_entries: usize,
}

impl Default for OfflineQueueConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_OFFLINE_KEY.to_owned(),
            max_entries: 1000,
        }
    }
}

impl OfflineQueueConfig {
    /// Sets the storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Sets the entry limit.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }
}

/// Configuration for the auto-save pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSaveConfig {
    /// Quiet period before a burst of snapshots is saved.
    pub debounce: Duration,
    /// Largest encoded snapshot accepted.
    pub max_snapshot_bytes: usize,
    /// Key the latest draft is persisted under.
    pub draft_key: String,
    /// Whether sessions feed their state into the pipeline.
    pub enabled: bool,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(2),
            max_snapshot_bytes: 5 * 1024 * 1024,
            draft_key: DEFAULT_DRAFT_KEY.to_owned(),
            enabled: true,
        }
    }
}

impl AutoSaveConfig {
    /// Sets the debounce period.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the snapshot size bound.
    pub fn with_max_snapshot_bytes(mut self, bytes: usize) -> Self {
        self.max_snapshot_bytes = bytes;
        self
    }

    /// Sets the draft key.
    pub fn with_draft_key(mut self, key: impl Into<String>) -> Self {
        self.draft_key = key.into();
        self
    }

    /// Enables or disables session-driven saving.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Configuration for one project session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Project the session edits.
    pub project_id: EntityId,
    /// Retry behavior for remote calls.
    pub retry: RetryConfig,
    /// Policy after retries run out.
    pub exhausted_policy: ExhaustedRetryPolicy,
    /// Offline queue settings.
    pub offline: OfflineQueueConfig,
    /// Auto-save settings.
    pub autosave: AutoSaveConfig,
    /// Lookup cache settings.
    pub cache: CacheConfig,
}

impl SessionConfig {
    /// Creates a configuration whose storage keys are scoped to the project.
    pub fn new(project_id: EntityId) -> Self {
        Self {
            project_id,
            retry: RetryConfig::default(),
            exhausted_policy: ExhaustedRetryPolicy::default(),
            offline: OfflineQueueConfig::default()
                .with_storage_key(format!("clipdeck.{project_id}.offline_queue")),
            autosave: AutoSaveConfig::default()
                .with_draft_key(format!("clipdeck.{project_id}.draft")),
            cache: CacheConfig::default(),
        }
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the exhausted-retry policy.
    pub fn with_exhausted_policy(mut self, policy: ExhaustedRetryPolicy) -> Self {
        self.exhausted_policy = policy;
        self
    }

    /// Sets the offline queue configuration.
    pub fn with_offline(mut self, offline: OfflineQueueConfig) -> Self {
        self.offline = offline;
        self
    }

    /// Sets the auto-save configuration.
    pub fn with_autosave(mut self, autosave: AutoSaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    /// Sets the cache configuration.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
