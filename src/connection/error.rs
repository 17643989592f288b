//! Connection error taxonomy.
//!
//! # Responsibilities
//! - Categorize connection failures (Configuration/Environment/Network/ProbeAuth/Unknown)
//! - Carry operator-facing remediation steps with every error
//! - Mark which categories are safe to retry
//!
//! # Design Decisions
//! - Configuration and Environment never retry (waiting cannot fix a missing setting)
//! - Unknown never retries (avoids unbounded loops on unclassified failures)
//! - ProbeAuth is non-fatal to initialization and therefore never scheduled for retry

use serde::{Deserialize, Serialize};

/// Failure category for a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Missing or malformed setting. Operator-actionable, non-retryable.
    Configuration,
    /// Runtime-context problem (broken settings source, bad process env). Non-retryable.
    Environment,
    /// Transient transport failure. Retryable up to the configured bound.
    Network,
    /// The probe's own authorization layer rejected the credentials.
    ProbeAuth,
    /// Defensive catch-all for unclassified failures. Non-retryable.
    Unknown,
}

impl ErrorCategory {
    /// Whether this category is eligible for automatic retry.
    pub fn retryable(self) -> bool {
        matches!(self, ErrorCategory::Network)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Configuration => "Configuration",
            ErrorCategory::Environment => "Environment",
            ErrorCategory::Network => "Network",
            ErrorCategory::ProbeAuth => "ProbeAuth",
            ErrorCategory::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// A structured connection failure.
///
/// Every public operation of the connection manager reports failures through
/// this type; nothing in the lifecycle path panics.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{category}: {message}")]
pub struct ConnectionError {
    pub category: ErrorCategory,
    pub message: String,
    pub retryable: bool,
    /// Ordered remediation steps for developers/operators. User-facing flows
    /// are expected to translate this into a generic retry-later message.
    pub remediation: Vec<String>,
}

impl ConnectionError {
    /// Build an error with the default remediation list for its category.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            retryable: category.retryable(),
            remediation: default_remediation(category),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Configuration, message)
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Environment, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Unknown, message)
    }

    /// Append a note to the message, keeping category and remediation.
    pub fn annotated(mut self, note: impl AsRef<str>) -> Self {
        self.message = format!("{} ({})", self.message, note.as_ref());
        self
    }
}

/// Remediation text per category, ordered by how likely each step is to help.
fn default_remediation(category: ErrorCategory) -> Vec<String> {
    match category {
        ErrorCategory::Configuration => vec![
            "Check that BACKEND_URL and BACKEND_SERVICE_KEY are set".to_string(),
            "Verify the backend URL is an absolute http(s) URL".to_string(),
            "Compare the settings against the project dashboard values".to_string(),
        ],
        ErrorCategory::Environment => vec![
            "Verify the process environment the service was started with".to_string(),
            "Restart the service after fixing the runtime environment".to_string(),
        ],
        ErrorCategory::Network => vec![
            "Check backend service status and network reachability".to_string(),
            "Retry after the scheduled backoff delay".to_string(),
            "Inspect DNS resolution and firewall rules if failures persist".to_string(),
        ],
        ErrorCategory::ProbeAuth => vec![
            "Rotate or refresh the backend service key".to_string(),
            "Confirm the key has read access to the probe resource".to_string(),
        ],
        ErrorCategory::Unknown => vec![
            "Inspect service logs around the failure timestamp".to_string(),
            "Re-run initialization with debug logging enabled".to_string(),
        ],
    }
}

/// Returned by `ConnectionManager::client` when the connection is not Ready.
///
/// This is the one accessor that fails loudly instead of returning a
/// structured lifecycle result; callers are expected to check `is_ready`
/// or go through `initialize` first.
#[derive(Debug, Clone, thiserror::Error)]
#[error("backend client requested while connection is {state}; call initialize() first")]
pub struct NotReady {
    /// The state the connection was in at the time of the call.
    pub state: super::state::ConnectionState,
}
