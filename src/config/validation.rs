//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retry bounds, delay ordering, rate floors)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::CoreConfig;

/// A single semantic violation, naming the offending field.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let conn = &config.connection;
    if conn.max_retries == 0 {
        errors.push(ValidationError::new(
            "connection.max_retries",
            "must be at least 1",
        ));
    }
    if conn.base_delay_ms == 0 {
        errors.push(ValidationError::new(
            "connection.base_delay_ms",
            "must be greater than 0",
        ));
    }
    if conn.max_delay_ms < conn.base_delay_ms {
        errors.push(ValidationError::new(
            "connection.max_delay_ms",
            "must be >= base_delay_ms",
        ));
    }
    if conn.probe_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "connection.probe_timeout_secs",
            "must be greater than 0",
        ));
    }
    if !conn.probe_path.starts_with('/') {
        errors.push(ValidationError::new(
            "connection.probe_path",
            "must start with '/'",
        ));
    }

    let health = &config.health;
    if health.stale_state_secs == 0 {
        errors.push(ValidationError::new(
            "health.stale_state_secs",
            "must be greater than 0",
        ));
    }
    let weights = &health.score_weights;
    for (field, value) in [
        ("health.score_weights.polling_error", weights.polling_error),
        ("health.score_weights.storage_error", weights.storage_error),
        ("health.score_weights.callback_error", weights.callback_error),
        ("health.score_weights.stale_state", weights.stale_state),
        ("health.score_weights.polling_stopped", weights.polling_stopped),
    ] {
        if value > 100 {
            errors.push(ValidationError::new(field, "must be at most 100"));
        }
    }

    let agg = &config.aggregator;
    if agg.cache_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "aggregator.cache_ttl_secs",
            "must be greater than 0",
        ));
    }
    if !(0.0..=1.0).contains(&agg.min_poll_success_rate) {
        errors.push(ValidationError::new(
            "aggregator.min_poll_success_rate",
            "must be between 0.0 and 1.0",
        ));
    }
    if !agg.access_audit_path.starts_with('/') {
        errors.push(ValidationError::new(
            "aggregator.access_audit_path",
            "must start with '/'",
        ));
    }

    if config.storage.path.trim().is_empty() {
        errors.push(ValidationError::new("storage.path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
