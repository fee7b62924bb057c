//! Retry scheduling with exponential backoff.

use crate::cancel::Ticket;
use crate::classify::ErrorClassifier;
use crate::config::RetryConfig;
use crate::error::{ClassifiedError, SyncError, SyncResult};
use clipdeck_protocol::RemoteFailure;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tracing::{debug, warn};

/// What to do after a failed call.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Wait `delay`, then call again.
    Retry {
        /// Backoff before the next call.
        delay: Duration,
        /// Classification of the failure.
        error: ClassifiedError,
    },
    /// No connectivity: hand the work to the offline queue.
    Offline(ClassifiedError),
    /// Not retryable: surface it.
    Terminal(ClassifiedError),
    /// Retryable, but the attempt cap is reached.
    Exhausted {
        /// Calls made, the first one included.
        attempts: u32,
        /// Classification of the final failure.
        last: ClassifiedError,
    },
}

/// Decides and waits out retries.
///
/// Every failure is classified afresh, so a retry that fails for a
/// different reason than the original call is handled by its own kind.
#[derive(Debug, Clone, Default)]
pub struct RetryScheduler {
    config: RetryConfig,
    classifier: ErrorClassifier,
}

impl RetryScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(config: RetryConfig, classifier: ErrorClassifier) -> Self {
        Self { config, classifier }
    }

    /// Retry configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Classifier used for every failure.
    #[must_use]
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Decides what follows the failure of call number `attempt` (0-indexed).
    #[must_use]
    pub fn decide(&self, failure: &RemoteFailure, attempt: u32) -> RetryDecision {
        let error = self.classifier.classify(failure);
        if error.kind.is_connectivity() {
            return RetryDecision::Offline(error);
        }
        if !error.retryable {
            return RetryDecision::Terminal(error);
        }
        let attempts = attempt.saturating_add(1);
        if attempts >= self.config.max_attempts {
            return RetryDecision::Exhausted {
                attempts,
                last: error,
            };
        }
        let delay = self.config.delay_with_seed(attempt, error.retry_after);
        RetryDecision::Retry { delay, error }
    }

    /// Suspends for `delay`.
    pub async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }

    /// Runs `operation` until it succeeds or a decision other than
    /// `Retry` is reached.
    ///
    /// Offline and terminal failures surface as [`SyncError::Classified`],
    /// an exhausted cap as [`SyncError::RetriesExhausted`]. With a ticket,
    /// the loop stops with [`SyncError::Superseded`] as soon as the ticket
    /// goes stale, and a stale success is discarded.
    pub async fn run<T, F, Fut, K>(
        &self,
        ticket: Option<&Ticket<K>>,
        mut operation: F,
    ) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteFailure>>,
        K: Eq + Hash,
    {
        let stale = || ticket.is_some_and(|t| !t.is_current());
        let mut attempt = 0u32;
        loop {
            if stale() {
                return Err(SyncError::Superseded);
            }
            let failure = match operation().await {
                Ok(value) if stale() => {
                    debug!(attempt, "discarding superseded result");
                    drop(value);
                    return Err(SyncError::Superseded);
                }
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            match self.decide(&failure, attempt) {
                RetryDecision::Retry { delay, error } => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, kind = %error.kind, "scheduling retry");
                    self.wait(delay).await;
                    attempt += 1;
                }
                RetryDecision::Offline(error) | RetryDecision::Terminal(error) => {
                    return Err(SyncError::Classified(error));
                }
                RetryDecision::Exhausted { attempts, last } => {
                    warn!(attempts, kind = %last.kind, "retries exhausted");
                    return Err(SyncError::RetriesExhausted { attempts, last });
                }
            }
        }
    }
}
