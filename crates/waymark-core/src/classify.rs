//! Error classification.
//!
//! Most failures cross an external-service boundary as text, so the engine
//! classifies them by inspecting the rendered message rather than by type.
//! The only exception is [`WaymarkError::Cancelled`], the dedicated
//! cancellation signal, which is recognised by identity.
//!
//! The matching rules are a pluggable strategy behind [`ErrorClassifier`];
//! [`HeuristicClassifier`] is the default.

use once_cell::sync::Lazy;
use regex::RegexSet;

use crate::{error::WaymarkError, models::ErrorClass};

/// Maps a raised error to exactly one [`ErrorClass`].
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &WaymarkError) -> ErrorClass;
}

/// Recognised transient conditions, matched case-insensitively on the
/// rendered error message.
static TRANSIENT_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // quota and rate limiting
        r"(?i)quota",
        r"(?i)rate[\s_-]?limit",
        r"(?i)\b429\b",
        r"(?i)too many requests",
        r"(?i)resource[\s_-]?exhausted",
        // network
        r"(?i)network",
        r"(?i)\beconn(reset|refused|aborted)\b",
        r"(?i)\benotfound\b",
        r"(?i)connection (reset|refused|closed|aborted)",
        r"(?i)socket hang up",
        r"(?i)fetch failed",
        // service availability
        r"(?i)service unavailable",
        r"(?i)\b50[234]\b",
        r"(?i)overloaded",
        r"(?i)temporarily unavailable",
        // timeouts
        r"(?i)time(d)?[\s-]?out",
        r"(?i)\betimedout\b",
        r"(?i)deadline exceeded",
    ])
    .unwrap_or_else(|_| RegexSet::empty())
});

/// Default classifier: cancellation by identity, then substring heuristics
/// on the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Classifies a bare message the way [`ErrorClassifier::classify`]
    /// classifies a non-cancellation error.
    pub fn classify_message(&self, message: &str) -> ErrorClass {
        if TRANSIENT_PATTERNS.is_match(message) {
            ErrorClass::Transient
        } else {
            ErrorClass::NonTransient
        }
    }
}

impl ErrorClassifier for HeuristicClassifier {
    fn classify(&self, error: &WaymarkError) -> ErrorClass {
        match error {
            WaymarkError::Cancelled => ErrorClass::Cancellation,
            // Validation failures never heal on retry, whatever they mention.
            WaymarkError::InvalidPlan { .. } => ErrorClass::NonTransient,
            other => self.classify_message(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generation::GenerationError, workspace::StorageError};

    fn classify(error: WaymarkError) -> ErrorClass {
        HeuristicClassifier.classify(&error)
    }

    #[test]
    fn test_cancellation_by_identity() {
        assert_eq!(classify(WaymarkError::Cancelled), ErrorClass::Cancellation);
        assert_eq!(
            classify(GenerationError::Cancelled.into()),
            ErrorClass::Cancellation
        );
    }

    #[test]
    fn test_transient_conditions() {
        let classifier = HeuristicClassifier;
        for message in [
            "You exceeded your current quota",
            "Rate limit reached for requests",
            "HTTP 429",
            "Too Many Requests",
            "RESOURCE_EXHAUSTED",
            "Network error while sending request",
            "read ECONNRESET",
            "connect ECONNREFUSED 127.0.0.1:443",
            "getaddrinfo ENOTFOUND api.example.com",
            "socket hang up",
            "TypeError: fetch failed",
            "The service is temporarily unavailable",
            "503 Service Unavailable",
            "The model is overloaded",
            "request timed out",
            "Timeout after 30s",
            "deadline exceeded",
        ] {
            assert_eq!(
                classifier.classify_message(message),
                ErrorClass::Transient,
                "expected transient: {message}"
            );
        }
    }

    #[test]
    fn test_non_transient_conditions() {
        assert_eq!(
            classify(WaymarkError::Storage(StorageError::NotFound {
                path: "src/missing.rs".into()
            })),
            ErrorClass::NonTransient
        );
        assert_eq!(
            classify(WaymarkError::MalformedOutput {
                path: "a.rs".to_string(),
                reason: "empty response".to_string(),
            }),
            ErrorClass::NonTransient
        );
        assert_eq!(
            classify(WaymarkError::invalid_plan(1).with_reason("quota field missing")),
            ErrorClass::NonTransient
        );
    }

    #[test]
    fn test_exhausted_pool_is_transient() {
        let error: WaymarkError = GenerationError::QuotaExhausted { pool_size: 3 }.into();
        assert_eq!(classify(error), ErrorClass::Transient);
    }

    #[test]
    fn test_numbers_inside_words_do_not_match() {
        let classifier = HeuristicClassifier;
        assert_eq!(
            classifier.classify_message("expected 4290 bytes"),
            ErrorClass::NonTransient
        );
    }
}
