//! Raw failures reported by the remote entity service.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    /// The service answered with an HTTP status.
    Http,
    /// The request never reached the service.
    Network,
    /// The client knows it is offline.
    Offline,
    /// The request timed out.
    Timeout,
    /// The service or local storage is out of space.
    Quota,
    /// The request was rejected before it was sent.
    Invalid,
    /// Anything else.
    Other,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Http => "http",
            Self::Network => "network",
            Self::Offline => "offline",
            Self::Timeout => "timeout",
            Self::Quota => "quota",
            Self::Invalid => "invalid",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// A failure raised by a remote call, before classification.
///
/// This is the signal the sync engine's classifier maps onto its error
/// taxonomy. It carries no verdict of its own.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{category} failure{}: {message}", status_suffix(.status))]
pub struct RemoteFailure {
    /// HTTP status, if the service answered.
    pub status: Option<u16>,
    /// Failure origin.
    pub category: FailureCategory,
    /// Human-readable message.
    pub message: String,
    /// Server-suggested wait before retrying.
    pub retry_after: Option<Duration>,
}

impl RemoteFailure {
    /// Creates a failure of the given category.
    pub fn new(category: FailureCategory, message: impl Into<String>) -> Self {
        Self {
            status: None,
            category,
            message: message.into(),
            retry_after: None,
        }
    }

    /// An HTTP error response.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(FailureCategory::Http, message)
        }
    }

    /// The client is offline.
    pub fn offline() -> Self {
        Self::new(FailureCategory::Offline, "client is offline")
    }

    /// The service could not be reached.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Network, message)
    }

    /// The request timed out.
    pub fn timeout() -> Self {
        Self::new(FailureCategory::Timeout, "request timed out")
    }

    /// Storage is full.
    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Quota, message)
    }

    /// The request was rejected locally.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Invalid, message)
    }

    /// An unrecognized failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FailureCategory::Other, message)
    }

    /// Attaches a `Retry-After` hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status() {
        let failure = RemoteFailure::http(503, "maintenance");
        assert_eq!(failure.to_string(), "http failure (503): maintenance");
        assert_eq!(
            RemoteFailure::offline().to_string(),
            "offline failure: client is offline"
        );
    }

    #[test]
    fn retry_after_hint() {
        let failure = RemoteFailure::http(429, "slow down").with_retry_after(Duration::from_secs(7));
        assert_eq!(failure.retry_after, Some(Duration::from_secs(7)));
        assert_eq!(failure.category, FailureCategory::Http);
    }
}
