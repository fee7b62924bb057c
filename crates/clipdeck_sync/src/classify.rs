//! Mapping raw remote failures onto the error taxonomy.

use crate::error::{ClassifiedError, ErrorKind};
use clipdeck_protocol::{FailureCategory, RemoteFailure};
use std::collections::HashMap;

/// Pure mapping from failure signal to [`ClassifiedError`].
///
/// Call sites that know more about a status than the generic table (for
/// example a service that answers 403 for "quota used up") register
/// overrides with [`ErrorClassifier::with_status`].
///
/// A `ServiceUnavailable` failure keeps the server's `Retry-After` hint.
/// Without one the retry scheduler starts from its configured base delay.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
    overrides: HashMap<u16, ErrorKind>,
}

impl ErrorClassifier {
    /// Creates a classifier with the standard table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `status` to `kind`, taking precedence over the standard table.
    #[must_use]
    pub fn with_status(mut self, status: u16, kind: ErrorKind) -> Self {
        self.overrides.insert(status, kind);
        self
    }

    /// Classifies `failure`.
    #[must_use]
    pub fn classify(&self, failure: &RemoteFailure) -> ClassifiedError {
        let kind = match failure.category {
            FailureCategory::Http => failure
                .status
                .map_or(ErrorKind::Unknown, |status| self.kind_for_status(status)),
            FailureCategory::Network => ErrorKind::NetworkUnreachable,
            FailureCategory::Offline => ErrorKind::Offline,
            FailureCategory::Timeout => ErrorKind::ServiceUnavailable,
            FailureCategory::Quota => ErrorKind::QuotaExceeded,
            FailureCategory::Invalid => ErrorKind::Validation,
            FailureCategory::Other => ErrorKind::Unknown,
        };

        let retry_after = failure
            .retry_after
            .filter(|_| kind == ErrorKind::ServiceUnavailable);

        ClassifiedError {
            kind,
            retryable: kind.is_retryable(),
            retry_after,
            message: failure.message.clone(),
        }
    }

    fn kind_for_status(&self, status: u16) -> ErrorKind {
        if let Some(kind) = self.overrides.get(&status) {
            return *kind;
        }
        match status {
            400 | 422 => ErrorKind::Validation,
            404 | 410 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            413 | 507 => ErrorKind::QuotaExceeded,
            408 | 429 => ErrorKind::ServiceUnavailable,
            500..=599 => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn kind_of(failure: RemoteFailure) -> ErrorKind {
        ErrorClassifier::new().classify(&failure).kind
    }

    #[test]
    fn http_status_table() {
        let cases = [
            (400, ErrorKind::Validation),
            (422, ErrorKind::Validation),
            (404, ErrorKind::NotFound),
            (409, ErrorKind::Conflict),
            (413, ErrorKind::QuotaExceeded),
            (507, ErrorKind::QuotaExceeded),
            (429, ErrorKind::ServiceUnavailable),
            (503, ErrorKind::ServiceUnavailable),
            (500, ErrorKind::ServiceUnavailable),
            (401, ErrorKind::Unknown),
            (302, ErrorKind::Unknown),
        ];
        for (status, expected) in cases {
            assert_eq!(kind_of(RemoteFailure::http(status, "x")), expected, "{status}");
        }
    }

    #[test]
    fn categories() {
        assert_eq!(kind_of(RemoteFailure::offline()), ErrorKind::Offline);
        assert_eq!(
            kind_of(RemoteFailure::network("dns")),
            ErrorKind::NetworkUnreachable
        );
        assert_eq!(kind_of(RemoteFailure::timeout()), ErrorKind::ServiceUnavailable);
        assert_eq!(kind_of(RemoteFailure::quota("full")), ErrorKind::QuotaExceeded);
        assert_eq!(kind_of(RemoteFailure::invalid("bad")), ErrorKind::Validation);
        assert_eq!(kind_of(RemoteFailure::other("boom")), ErrorKind::Unknown);
    }

    #[test]
    fn only_server_hints_become_retry_after() {
        let classifier = ErrorClassifier::new();
        let c = classifier.classify(&RemoteFailure::http(503, "down"));
        assert!(c.retryable);
        assert_eq!(c.retry_after, None);

        let hinted = RemoteFailure::http(429, "slow").with_retry_after(Duration::from_secs(9));
        assert_eq!(
            classifier.classify(&hinted).retry_after,
            Some(Duration::from_secs(9))
        );

        let offline = classifier.classify(&RemoteFailure::offline());
        assert!(offline.retryable);
        assert_eq!(offline.retry_after, None);

        let conflict = RemoteFailure::http(409, "dup").with_retry_after(Duration::from_secs(9));
        assert_eq!(classifier.classify(&conflict).retry_after, None);
    }

    #[test]
    fn overrides_win() {
        let classifier = ErrorClassifier::new().with_status(403, ErrorKind::QuotaExceeded);
        let c = classifier.classify(&RemoteFailure::http(403, "limit"));
        assert_eq!(c.kind, ErrorKind::QuotaExceeded);
        assert!(!c.retryable);
        assert_eq!(c.message, "limit");
    }
}
