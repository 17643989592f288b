//! Failure classification for connection attempts.
//!
//! # Responsibilities
//! - Map a raw failure message onto an error category
//! - Distinguish transient transport symptoms from structural ones
//!
//! # Design Decisions
//! - Classification is a documented rule table, not ad-hoc substring checks
//!   scattered through the call sites
//! - Rules match case-insensitively on message substrings; first match wins
//! - The table is tuned to the reqwest/hyper error vocabulary and can be
//!   replaced wholesale when the backend's wording changes
//! - Anything unmatched classifies Unknown and never retries

use super::error::{ConnectionError, ErrorCategory};

/// One classification rule: if any needle occurs in the message, the
/// failure belongs to `category`.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub needles: &'static [&'static str],
    pub category: ErrorCategory,
}

/// Default table, ordered from most to least specific.
///
/// Transient transport symptoms (timeouts, refused connections, DNS
/// failures, resets, 5xx probe statuses) classify Network. Structural
/// symptoms (malformed endpoint, bad credential shape, 404 probe path)
/// classify Configuration. Auth-layer rejections classify ProbeAuth.
pub const DEFAULT_RULES: &[Rule] = &[
    Rule {
        needles: &["unauthorized", "invalid api key", "jwt", "status 401", "status 403", "forbidden"],
        category: ErrorCategory::ProbeAuth,
    },
    Rule {
        needles: &["relative url without a base", "invalid url", "invalid port", "builder error", "unsupported scheme", "status 404"],
        category: ErrorCategory::Configuration,
    },
    Rule {
        needles: &["timed out", "timeout"],
        category: ErrorCategory::Network,
    },
    Rule {
        needles: &["connection refused", "connection reset", "broken pipe", "connection closed"],
        category: ErrorCategory::Network,
    },
    Rule {
        needles: &["dns error", "failed to lookup", "name or service not known", "nodename nor servname"],
        category: ErrorCategory::Network,
    },
    Rule {
        needles: &["error sending request", "status 5"],
        category: ErrorCategory::Network,
    },
];

/// Structured classifier over a rule table.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<Rule>,
}

impl ErrorClassifier {
    /// Classifier backed by [`DEFAULT_RULES`].
    pub fn new() -> Self {
        Self::with_rules(DEFAULT_RULES.to_vec())
    }

    /// Classifier with a custom table, for retuning against the actual
    /// backend's error vocabulary.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Classify a raw failure message into a structured error.
    pub fn classify(&self, message: &str) -> ConnectionError {
        let lowered = message.to_lowercase();
        for rule in &self.rules {
            if rule.needles.iter().any(|needle| lowered.contains(needle)) {
                return ConnectionError::new(rule.category, message);
            }
        }
        ConnectionError::unknown(message)
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
