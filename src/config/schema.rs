//! Configuration schema definitions.
//!
//! This module defines the tunables of the connection core. All types
//! derive Serde traits for deserialization from config files; every knob
//! has an explicit default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Root configuration for the backend-connection core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CoreConfig {
    /// Connection lifecycle tuning (retries, backoff, probe).
    pub connection: ConnectionTuning,

    /// Health monitoring tuning (score weights, alert limits).
    pub health: HealthTuning,

    /// Health aggregation tuning (cache TTL, cross-cutting thresholds).
    pub aggregator: AggregatorTuning,

    /// Durable storage settings.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Connection lifecycle tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionTuning {
    /// Maximum automatic retry attempts for retryable failures.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Path of the minimal connectivity probe, relative to the service URL.
    pub probe_path: String,

    /// Probe request timeout in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for ConnectionTuning {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            probe_path: "/rest/v1/".to_string(),
            probe_timeout_secs: 10,
        }
    }
}

/// Health monitoring tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthTuning {
    /// A recorded state change older than this is flagged stale.
    pub stale_state_secs: u64,

    /// One-shot alert limits (strictly-greater semantics: the alert fires
    /// when a counter first exceeds its limit).
    pub alert_limits: AlertLimits,

    /// Score deductions per accumulated error.
    pub score_weights: ScoreWeights,
}

impl Default for HealthTuning {
    fn default() -> Self {
        Self {
            stale_state_secs: 30,
            alert_limits: AlertLimits::default(),
            score_weights: ScoreWeights::default(),
        }
    }
}

/// Counter limits that trigger one-shot alerts when exceeded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertLimits {
    /// Polling-error count above which an "error" alert fires.
    pub polling_errors: u64,

    /// Storage-error count above which a "critical" alert fires.
    pub storage_errors: u64,

    /// Active-callback count above which a "warning" alert fires.
    pub active_callbacks: u64,
}

impl Default for AlertLimits {
    fn default() -> Self {
        Self {
            polling_errors: 4,
            storage_errors: 3,
            active_callbacks: 50,
        }
    }
}

/// Health-score deductions. The score starts at 100 and subtracts the
/// weight once per accumulated error; stale state and stopped polling are
/// flat penalties. Storage failures cost more than polling failures, which
/// cost more than callback failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub polling_error: u32,
    pub storage_error: u32,
    pub callback_error: u32,
    pub stale_state: u32,
    pub polling_stopped: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            polling_error: 5,
            storage_error: 10,
            callback_error: 2,
            stale_state: 10,
            polling_stopped: 15,
        }
    }
}

/// Health aggregation tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregatorTuning {
    /// How long a full report stays fresh for quick status queries, seconds.
    pub cache_ttl_secs: u64,

    /// Configuration validation slower than this draws a recommendation, ms.
    pub slow_validation_ms: u64,

    /// Polling success rate below this floor draws a recommendation (0..=1).
    pub min_poll_success_rate: f64,

    /// Resource path the access-audit probe reads, relative to the service URL.
    pub access_audit_path: String,
}

impl Default for AggregatorTuning {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            slow_validation_ms: 1_000,
            min_poll_success_rate: 0.9,
            access_audit_path: "/rest/v1/rooms?select=id&limit=1".to_string(),
        }
    }
}

/// Durable storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the file store writes its snapshots under.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "data/core-state".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
