//! Rolling health metrics.
//!
//! # Responsibilities
//! - Accumulate discrete runtime events into counters and gauges
//! - Survive restarts: the snapshot serializes and is adopted at load
//!
//! # Design Decisions
//! - Counters are monotonic until an explicit reset
//! - The successful-poll count backs the running mean, so the average and
//!   the success rate are pure functions of the struct
//! - Stale-state and stopped-polling are carried as gauges so the health
//!   score stays a pure function of current metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthMetrics {
    // Counters
    pub polling_errors: u64,
    pub storage_errors: u64,
    pub callback_errors: u64,
    pub state_changes: u64,
    /// Successful polls folded into the running mean.
    pub polling_samples: u64,

    // Gauges
    pub average_polling_interval_ms: f64,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub active_callbacks: u64,
    pub polling_active: bool,
    /// Set when a recorded state change carried a timestamp older than the
    /// stale window; cleared by a fresh state change or a reset.
    pub stale_state_detected: bool,
    /// Set on an active→inactive polling transition; cleared when polling
    /// resumes or on reset.
    pub polling_stopped: bool,

    pub last_error_message: Option<String>,
}

impl HealthMetrics {
    /// Fold a successful poll duration into the running arithmetic mean.
    pub fn record_poll_success(&mut self, duration_ms: u64, at: DateTime<Utc>) {
        self.polling_samples += 1;
        let n = self.polling_samples as f64;
        self.average_polling_interval_ms +=
            (duration_ms as f64 - self.average_polling_interval_ms) / n;
        self.last_successful_poll = Some(at);
    }

    /// Fraction of polls that succeeded, if any polls were recorded.
    pub fn poll_success_rate(&self) -> Option<f64> {
        let total = self.polling_samples + self.polling_errors;
        if total == 0 {
            None
        } else {
            Some(self.polling_samples as f64 / total as f64)
        }
    }

    /// Zero every counter and gauge.
    pub fn reset(&mut self) {
        *self = HealthMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_mean() {
        let mut metrics = HealthMetrics::default();
        let now = Utc::now();
        metrics.record_poll_success(100, now);
        metrics.record_poll_success(200, now);
        metrics.record_poll_success(300, now);
        assert_eq!(metrics.polling_samples, 3);
        assert!((metrics.average_polling_interval_ms - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_success_rate() {
        let mut metrics = HealthMetrics::default();
        assert!(metrics.poll_success_rate().is_none());
        metrics.record_poll_success(50, Utc::now());
        metrics.polling_errors = 1;
        assert_eq!(metrics.poll_success_rate(), Some(0.5));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut metrics = HealthMetrics::default();
        metrics.record_poll_success(120, Utc::now());
        metrics.storage_errors = 2;
        metrics.polling_active = true;
        metrics.last_error_message = Some("disk full".to_string());

        let value = serde_json::to_value(&metrics).unwrap();
        let restored: HealthMetrics = serde_json::from_value(value).unwrap();
        assert_eq!(restored, metrics);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut metrics = HealthMetrics::default();
        metrics.record_poll_success(120, Utc::now());
        metrics.polling_errors = 4;
        metrics.polling_active = true;
        metrics.reset();
        assert_eq!(metrics, HealthMetrics::default());
    }
}
