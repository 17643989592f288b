//! Runtime health monitoring.
//!
//! # Responsibilities
//! - Record discrete runtime events into rolling metrics
//! - Compute a 0-100 health score and status band from current metrics
//! - Emit one-shot alerts when counters cross their limits
//! - Persist metrics best-effort after every mutating call
//!
//! # Design Decisions
//! - The score is a pure function of current metrics and the configured weights
//! - Threshold alerts on error counters latch until an explicit reset, so a
//!   limit crossing fires once and not once per increment; the
//!   active-callback gauge latch also re-arms when the gauge falls back
//!   below its limit
//! - Persistence is fire-and-forget; a failing store is logged, never thrown
//! - destroy() notifies remaining subscribers before detaching them

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::schema::{HealthTuning, ScoreWeights};
use crate::connection::state::ConnectionSnapshot;
use crate::health::alerts::{AlertHub, AlertLevel, AlertSubscription, HealthAlert};
use crate::health::metrics::HealthMetrics;
use crate::storage::{KvStore, HEALTH_METRICS_KEY};

/// Health band for the monitor's own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    Healthy,
    Warning,
    Error,
    Critical,
}

/// Result of `health_status`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatusReport {
    pub status: MonitorStatus,
    pub issues: Vec<String>,
    pub score: u8,
}

/// Result of `generate_report`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub timestamp: chrono::DateTime<Utc>,
    pub metrics: HealthMetrics,
    pub status: HealthStatusReport,
    pub recommendations: Vec<String>,
}

/// One-shot latches for threshold-crossing alerts.
#[derive(Debug, Default)]
struct AlertLatches {
    polling: bool,
    storage: bool,
    callbacks: bool,
}

pub struct HealthMonitor {
    tuning: HealthTuning,
    store: Arc<dyn KvStore>,
    metrics: Mutex<HealthMetrics>,
    latches: Mutex<AlertLatches>,
    hub: Arc<AlertHub>,
}

impl HealthMonitor {
    /// Construct the monitor, adopting any previously persisted snapshot.
    pub async fn load(store: Arc<dyn KvStore>, tuning: HealthTuning) -> Self {
        let metrics = match store.get(HEALTH_METRICS_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<HealthMetrics>(value) {
                Ok(loaded) => {
                    tracing::info!(
                        polling_errors = loaded.polling_errors,
                        storage_errors = loaded.storage_errors,
                        "adopted persisted health metrics"
                    );
                    loaded
                }
                Err(e) => {
                    tracing::warn!(error = %e, "persisted health metrics unreadable; starting fresh");
                    HealthMetrics::default()
                }
            },
            Ok(None) => HealthMetrics::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read persisted health metrics; starting fresh");
                HealthMetrics::default()
            }
        };

        Self {
            tuning,
            store,
            metrics: Mutex::new(metrics),
            latches: Mutex::new(AlertLatches::default()),
            hub: Arc::new(AlertHub::new()),
        }
    }

    /// Record a poll outcome. Failures increment the error counter and set
    /// the last error message; successes fold into the running mean.
    pub fn record_polling_event(&self, success: bool, duration_ms: u64, error: Option<&str>) {
        let alert = {
            let mut metrics = self.lock_metrics();
            if success {
                metrics.record_poll_success(duration_ms, Utc::now());
                None
            } else {
                metrics.polling_errors += 1;
                if let Some(msg) = error {
                    metrics.last_error_message = Some(msg.to_string());
                }
                self.crossed_limit(
                    metrics.polling_errors,
                    self.tuning.alert_limits.polling_errors,
                    |l| &mut l.polling,
                )
                .then(|| {
                    HealthAlert::new(
                        AlertLevel::Error,
                        "polling error count exceeded its limit",
                        json!({ "polling_errors": metrics.polling_errors }),
                    )
                })
            }
        };
        self.emit_opt(alert);
        self.persist();
    }

    /// Record a storage-operation outcome.
    pub fn record_storage_event(&self, success: bool, operation: &str, error: Option<&str>) {
        if success {
            return;
        }
        let alert = {
            let mut metrics = self.lock_metrics();
            metrics.storage_errors += 1;
            if let Some(msg) = error {
                metrics.last_error_message = Some(format!("{operation}: {msg}"));
            }
            self.crossed_limit(
                metrics.storage_errors,
                self.tuning.alert_limits.storage_errors,
                |l| &mut l.storage,
            )
            .then(|| {
                HealthAlert::new(
                    AlertLevel::Critical,
                    "storage error count exceeded its limit",
                    json!({
                        "storage_errors": metrics.storage_errors,
                        "operation": operation,
                    }),
                )
            })
        };
        self.emit_opt(alert);
        self.persist();
    }

    /// Record a callback outcome and the current active-callback gauge.
    ///
    /// Unlike the error counters, the gauge can fall back below its limit;
    /// when it does, the latch re-arms so the next crossing alerts again.
    pub fn record_callback_event(&self, success: bool, active_callbacks: u64, error: Option<&str>) {
        let alert = {
            let mut metrics = self.lock_metrics();
            metrics.active_callbacks = active_callbacks;
            if !success {
                metrics.callback_errors += 1;
                if let Some(msg) = error {
                    metrics.last_error_message = Some(msg.to_string());
                }
            }
            let limit = self.tuning.alert_limits.active_callbacks;
            if active_callbacks <= limit {
                self.latches.lock().expect("latches poisoned").callbacks = false;
                None
            } else {
                self.crossed_limit(active_callbacks, limit, |l| &mut l.callbacks)
                    .then(|| {
                        HealthAlert::new(
                            AlertLevel::Warning,
                            "active callback count exceeded its limit",
                            json!({ "active_callbacks": active_callbacks }),
                        )
                    })
            }
        };
        self.emit_opt(alert);
        self.persist();
    }

    /// Record a connection state change. A snapshot whose own timestamp is
    /// older than the stale window draws a warning alert.
    pub fn record_state_change(&self, snapshot: &ConnectionSnapshot, source: &str) {
        let alert = {
            let mut metrics = self.lock_metrics();
            metrics.state_changes += 1;

            let stale = snapshot.last_attempt.is_some_and(|at| {
                (Utc::now() - at).num_seconds() > self.tuning.stale_state_secs as i64
            });
            metrics.stale_state_detected = stale;
            stale.then(|| {
                HealthAlert::new(
                    AlertLevel::Warning,
                    "recorded connection state is stale",
                    json!({
                        "state": snapshot.state.to_string(),
                        "source": source,
                        "last_attempt": snapshot.last_attempt,
                    }),
                )
            })
        };
        self.emit_opt(alert);
        self.persist();
    }

    /// Update the polling-active gauge. An active→inactive transition
    /// draws a warning alert.
    pub fn record_polling_status(&self, active: bool) {
        let alert = {
            let mut metrics = self.lock_metrics();
            let was_active = metrics.polling_active;
            metrics.polling_active = active;
            if active {
                metrics.polling_stopped = false;
                None
            } else if was_active {
                metrics.polling_stopped = true;
                Some(HealthAlert::new(
                    AlertLevel::Warning,
                    "polling has stopped",
                    Value::Null,
                ))
            } else {
                None
            }
        };
        self.emit_opt(alert);
        self.persist();
    }

    /// Subscribe to alerts. Many subscribers are supported; one panicking
    /// subscriber never blocks delivery to the others.
    pub fn on_alert(
        &self,
        callback: impl Fn(&HealthAlert) + Send + Sync + 'static,
    ) -> AlertSubscription {
        self.hub.subscribe(Box::new(callback))
    }

    /// Snapshot of the current metrics.
    pub fn metrics(&self) -> HealthMetrics {
        self.lock_metrics().clone()
    }

    /// Current status band, issue list, and score.
    pub fn health_status(&self) -> HealthStatusReport {
        let metrics = self.lock_metrics().clone();
        score_metrics(&metrics, &self.tuning.score_weights)
    }

    /// Full report with deterministic recommendations.
    pub fn generate_report(&self) -> HealthReport {
        let metrics = self.lock_metrics().clone();
        let status = score_metrics(&metrics, &self.tuning.score_weights);
        let recommendations = recommendations_for(&metrics, &self.tuning);
        HealthReport {
            timestamp: Utc::now(),
            metrics,
            status,
            recommendations,
        }
    }

    /// Zero every counter and gauge, clear the alert latches, emit an info
    /// alert, and persist the cleared snapshot.
    pub fn reset_metrics(&self) {
        {
            self.lock_metrics().reset();
            *self.latches.lock().expect("latches poisoned") = AlertLatches::default();
        }
        self.hub.emit(&HealthAlert::new(
            AlertLevel::Info,
            "health metrics reset",
            Value::Null,
        ));
        self.persist();
    }

    /// Shut the monitor down: notify remaining subscribers, then detach them.
    pub fn destroy(&self) {
        self.hub.emit(&HealthAlert::new(
            AlertLevel::Info,
            "health monitor shutting down",
            Value::Null,
        ));
        self.hub.clear();
    }

    /// Await the persistence of the current snapshot. Useful at shutdown
    /// and in tests; routine persistence is fire-and-forget.
    pub async fn flush(&self) -> Result<(), crate::storage::StorageError> {
        let value = serde_json::to_value(self.lock_metrics().clone())?;
        self.store.put(HEALTH_METRICS_KEY, &value).await
    }

    fn lock_metrics(&self) -> std::sync::MutexGuard<'_, HealthMetrics> {
        self.metrics.lock().expect("metrics poisoned")
    }

    /// Latch check: true exactly once, when `count` first exceeds `limit`.
    fn crossed_limit(
        &self,
        count: u64,
        limit: u64,
        latch: impl FnOnce(&mut AlertLatches) -> &mut bool,
    ) -> bool {
        if count <= limit {
            return false;
        }
        let mut latches = self.latches.lock().expect("latches poisoned");
        let flag = latch(&mut latches);
        if *flag {
            false
        } else {
            *flag = true;
            true
        }
    }

    fn emit_opt(&self, alert: Option<HealthAlert>) {
        if let Some(alert) = alert {
            tracing::debug!(level = ?alert.level, message = %alert.message, "health alert");
            self.hub.emit(&alert);
        }
    }

    /// Fire-and-forget persistence; may lag in-memory state.
    fn persist(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let snapshot = self.lock_metrics().clone();
        let store = self.store.clone();
        handle.spawn(async move {
            match serde_json::to_value(&snapshot) {
                Ok(value) => {
                    if let Err(e) = store.put(HEALTH_METRICS_KEY, &value).await {
                        tracing::warn!(error = %e, "failed to persist health metrics");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to serialize health metrics"),
            }
        });
    }
}

/// Pure scoring over current metrics. Start at 100, deduct the configured
/// weight per accumulated error plus flat penalties, clamp at 0.
fn score_metrics(metrics: &HealthMetrics, weights: &ScoreWeights) -> HealthStatusReport {
    let mut deduction: u64 = 0;
    deduction += metrics.polling_errors * weights.polling_error as u64;
    deduction += metrics.storage_errors * weights.storage_error as u64;
    deduction += metrics.callback_errors * weights.callback_error as u64;
    if metrics.stale_state_detected {
        deduction += weights.stale_state as u64;
    }
    if metrics.polling_stopped {
        deduction += weights.polling_stopped as u64;
    }
    let score = 100u64.saturating_sub(deduction) as u8;

    let mut issues = Vec::new();
    if metrics.polling_errors > 0 {
        issues.push(format!("{} polling errors", metrics.polling_errors));
    }
    if metrics.storage_errors > 0 {
        issues.push(format!("{} storage errors", metrics.storage_errors));
    }
    if metrics.callback_errors > 0 {
        issues.push(format!("{} callback errors", metrics.callback_errors));
    }
    if metrics.stale_state_detected {
        issues.push("connection state is stale".to_string());
    }
    if metrics.polling_stopped {
        issues.push("polling has stopped".to_string());
    }

    let status = if issues.is_empty() && score == 100 {
        MonitorStatus::Healthy
    } else if score < 50 {
        MonitorStatus::Critical
    } else if score < 75 {
        MonitorStatus::Error
    } else {
        MonitorStatus::Warning
    };

    HealthStatusReport {
        status,
        issues,
        score,
    }
}

/// Deterministic recommendations per non-zero counter or tripped gauge.
fn recommendations_for(metrics: &HealthMetrics, tuning: &HealthTuning) -> Vec<String> {
    let mut out = Vec::new();
    if metrics.polling_errors > 0 {
        out.push("Investigate backend poll failures; check service availability and credentials".to_string());
    }
    if metrics.storage_errors > 0 {
        out.push("Inspect the durable store; recent snapshot writes are failing".to_string());
    }
    if metrics.callback_errors > 0 {
        out.push("Review alert and change subscribers for failing callbacks".to_string());
    }
    if metrics.active_callbacks > tuning.alert_limits.active_callbacks {
        out.push("Audit subscriptions for leaks; the active callback count is unusually high".to_string());
    }
    if metrics.polling_stopped {
        out.push("Polling has stopped; restart it or reinitialize the connection".to_string());
    }
    if metrics.stale_state_detected {
        out.push("Connection state is stale; consider an explicit reinitialize".to_string());
    }
    if out.is_empty() {
        out.push("No action required".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::HealthTuning;
    use crate::storage::MemoryStore;

    async fn monitor() -> HealthMonitor {
        HealthMonitor::load(Arc::new(MemoryStore::new()), HealthTuning::default()).await
    }

    #[tokio::test]
    async fn test_score_bands() {
        let m = monitor().await;
        assert_eq!(m.health_status().status, MonitorStatus::Healthy);
        assert_eq!(m.health_status().score, 100);

        // One polling failure: 95, warning.
        m.record_polling_event(false, 0, Some("boom"));
        let status = m.health_status();
        assert_eq!(status.status, MonitorStatus::Warning);
        assert_eq!(status.score, 95);

        // Six polling failures total: 70, error band (not critical).
        for _ in 0..5 {
            m.record_polling_event(false, 0, None);
        }
        let status = m.health_status();
        assert_eq!(status.score, 70);
        assert_eq!(status.status, MonitorStatus::Error);
    }

    #[tokio::test]
    async fn test_storage_errors_weigh_more_than_callbacks() {
        let m = monitor().await;
        for _ in 0..6 {
            m.record_storage_event(false, "put", Some("disk full"));
        }
        let status = m.health_status();
        assert_eq!(status.score, 40);
        assert_eq!(status.status, MonitorStatus::Critical);
    }

    #[tokio::test]
    async fn test_flat_penalties() {
        let m = monitor().await;
        m.record_polling_status(true);
        m.record_polling_status(false);
        let status = m.health_status();
        assert_eq!(status.score, 85);
        assert!(status.issues.contains(&"polling has stopped".to_string()));
    }

    #[tokio::test]
    async fn test_report_recommendations_are_deterministic() {
        let m = monitor().await;
        let report = m.generate_report();
        assert_eq!(report.recommendations, vec!["No action required".to_string()]);

        m.record_storage_event(false, "put", None);
        let report = m.generate_report();
        assert!(report.recommendations[0].contains("durable store"));
    }
}
