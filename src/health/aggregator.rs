//! Cross-component health aggregation.
//!
//! # Responsibilities
//! - Gather ComponentHealth from the resolver, the connection manager, the
//!   health monitor, and the access-audit probe, concurrently
//! - Merge by worst-of-components into one report with recommendations
//! - Serve quick status queries from a TTL-bounded cache
//!
//! # Design Decisions
//! - An Unknown component only surfaces when nothing worse is present
//! - Shallow checks omit the access audit entirely rather than reporting it
//!   Unknown, so a cached quick status is not pinned to Unknown
//! - Degraded still counts as usable for is_healthy()

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::resolver::ConfigurationResolver;
use crate::config::schema::AggregatorTuning;
use crate::connection::manager::ConnectionManager;
use crate::connection::state::ConnectionState;
use crate::health::monitor::{HealthMonitor, MonitorStatus};

/// Health band for a single component and for the merged report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Critical,
    Unknown,
}

/// Health of one component as seen by the aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    pub last_check: DateTime<Utc>,
    pub metrics: Value,
    pub errors: Vec<String>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: impl Into<String>, metrics: Value) -> Self {
        Self {
            status,
            message: message.into(),
            last_check: Utc::now(),
            metrics,
            errors: Vec::new(),
        }
    }

    fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }
}

/// The merged report.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateHealthReport {
    pub overall: ComponentStatus,
    pub timestamp: DateTime<Utc>,
    pub components: BTreeMap<String, ComponentHealth>,
    pub metrics: Value,
    pub recommendations: Vec<String>,
    pub details: Value,
}

/// Options for a health check pass.
#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    /// Run the access-audit probe (a real read against the backend).
    pub run_access_audit: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            run_access_audit: true,
        }
    }
}

/// Result of an access-audit probe.
#[derive(Debug, Clone)]
pub struct AccessAudit {
    pub ok: bool,
    pub message: String,
    pub details: Value,
}

/// Generic access-audit seam: verifies the configured credentials can
/// actually read application data, beyond mere reachability.
#[async_trait]
pub trait AccessProbe: Send + Sync {
    async fn audit(&self) -> AccessAudit;
}

/// Access probe that reads one row through the managed client.
pub struct RestAccessProbe {
    manager: ConnectionManager,
    path: String,
}

impl RestAccessProbe {
    pub fn new(manager: ConnectionManager, path: impl Into<String>) -> Self {
        Self {
            manager,
            path: path.into(),
        }
    }
}

#[async_trait]
impl AccessProbe for RestAccessProbe {
    async fn audit(&self) -> AccessAudit {
        let client = match self.manager.client() {
            Ok(client) => client,
            Err(e) => {
                return AccessAudit {
                    ok: false,
                    message: format!("client unavailable: {e}"),
                    details: Value::Null,
                }
            }
        };
        match client.read_status(&self.path).await {
            Ok(status) if (200..300).contains(&status) => AccessAudit {
                ok: true,
                message: "audit read succeeded".to_string(),
                details: json!({ "status": status }),
            },
            Ok(status) => AccessAudit {
                ok: false,
                message: format!("audit read returned status {status}"),
                details: json!({ "status": status }),
            },
            Err(e) => AccessAudit {
                ok: false,
                message: format!("audit read failed: {e}"),
                details: Value::Null,
            },
        }
    }
}

struct CachedReport {
    at: Instant,
    report: AggregateHealthReport,
}

/// Rolls the core's health signals into one report for dashboards and ops
/// tooling.
pub struct HealthAggregator {
    manager: ConnectionManager,
    monitor: Arc<HealthMonitor>,
    resolver: ConfigurationResolver,
    access_probe: Arc<dyn AccessProbe>,
    tuning: AggregatorTuning,
    cache: Mutex<Option<CachedReport>>,
}

impl HealthAggregator {
    pub fn new(
        manager: ConnectionManager,
        monitor: Arc<HealthMonitor>,
        resolver: ConfigurationResolver,
        access_probe: Arc<dyn AccessProbe>,
        tuning: AggregatorTuning,
    ) -> Self {
        Self {
            manager,
            monitor,
            resolver,
            access_probe,
            tuning,
            cache: Mutex::new(None),
        }
    }

    /// Gather every component concurrently and merge worst-of.
    pub async fn perform_health_check(&self, options: CheckOptions) -> AggregateHealthReport {
        let (configuration, connection, monitoring, access) = tokio::join!(
            self.check_configuration(),
            self.check_connection(),
            self.check_monitoring(),
            self.check_access(options),
        );

        let mut components = BTreeMap::new();
        components.insert("configuration".to_string(), configuration);
        components.insert("connection".to_string(), connection);
        components.insert("monitoring".to_string(), monitoring);
        if let Some(access) = access {
            components.insert("access_audit".to_string(), access);
        }

        let overall = merge_statuses(components.values().map(|c| c.status));
        let recommendations = self.recommendations(&components);

        let monitor_status = self.monitor.health_status();
        let poll_success_rate = self.monitor.metrics().poll_success_rate();
        let connection_snapshot = self.manager.status();

        let report = AggregateHealthReport {
            overall,
            timestamp: Utc::now(),
            components,
            metrics: json!({
                "health_score": monitor_status.score,
                "connection_state": connection_snapshot.state.to_string(),
                "retry_count": connection_snapshot.retry_count,
                "poll_success_rate": poll_success_rate,
            }),
            recommendations,
            details: json!({
                "access_audit_included": options.run_access_audit,
            }),
        };

        let mut cache = self.cache.lock().expect("report cache poisoned");
        *cache = Some(CachedReport {
            at: Instant::now(),
            report: report.clone(),
        });
        report
    }

    /// The last report if younger than the cache TTL, else a shallow fresh
    /// check (access audit skipped).
    pub async fn quick_status(&self) -> AggregateHealthReport {
        {
            let cache = self.cache.lock().expect("report cache poisoned");
            if let Some(cached) = cache.as_ref() {
                if cached.at.elapsed().as_secs() < self.tuning.cache_ttl_secs {
                    return cached.report.clone();
                }
            }
        }
        self.perform_health_check(CheckOptions {
            run_access_audit: false,
        })
        .await
    }

    /// Usable means healthy or degraded.
    pub async fn is_healthy(&self) -> bool {
        matches!(
            self.quick_status().await.overall,
            ComponentStatus::Healthy | ComponentStatus::Degraded
        )
    }

    async fn check_configuration(&self) -> ComponentHealth {
        let started = Instant::now();
        let result = self.resolver.resolve();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let metrics = json!({ "validation_ms": elapsed_ms });

        match result {
            Ok(settings) => ComponentHealth::new(
                ComponentStatus::Healthy,
                format!("configuration valid for {}", settings.url),
                metrics,
            ),
            Err(e) => ComponentHealth::new(
                ComponentStatus::Critical,
                format!("configuration invalid: {}", e.message),
                metrics,
            )
            .with_errors(e.remediation.clone()),
        }
    }

    async fn check_connection(&self) -> ComponentHealth {
        let snapshot = self.manager.status();
        let metrics = serde_json::to_value(&snapshot).unwrap_or(Value::Null);
        let (status, message) = match snapshot.state {
            ConnectionState::Ready => (ComponentStatus::Healthy, "connection ready".to_string()),
            ConnectionState::Initializing => (
                ComponentStatus::Degraded,
                "connection establishing".to_string(),
            ),
            ConnectionState::Retrying => (
                ComponentStatus::Degraded,
                format!("connection retrying ({}/3)", snapshot.retry_count),
            ),
            ConnectionState::Error => {
                let detail = snapshot
                    .last_error
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "unknown failure".to_string());
                (
                    ComponentStatus::Critical,
                    format!("connection failed: {detail}"),
                )
            }
            ConnectionState::Uninitialized => (
                ComponentStatus::Unknown,
                "connection not yet initialized".to_string(),
            ),
        };
        let errors = snapshot
            .last_error
            .as_ref()
            .map(|e| e.remediation.clone())
            .unwrap_or_default();
        ComponentHealth::new(status, message, metrics).with_errors(errors)
    }

    async fn check_monitoring(&self) -> ComponentHealth {
        let status_report = self.monitor.health_status();
        let status = match status_report.status {
            MonitorStatus::Healthy => ComponentStatus::Healthy,
            // The four-value component scale has no Error band; both mean
            // impaired-but-usable here.
            MonitorStatus::Warning | MonitorStatus::Error => ComponentStatus::Degraded,
            MonitorStatus::Critical => ComponentStatus::Critical,
        };
        ComponentHealth::new(
            status,
            format!("health score {}", status_report.score),
            json!({ "score": status_report.score }),
        )
        .with_errors(status_report.issues)
    }

    async fn check_access(&self, options: CheckOptions) -> Option<ComponentHealth> {
        if !options.run_access_audit {
            return None;
        }
        let audit = self.access_probe.audit().await;
        let status = if audit.ok {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Degraded
        };
        Some(ComponentHealth::new(status, audit.message, audit.details))
    }

    /// Deterministic per-component text plus cross-cutting thresholds.
    fn recommendations(&self, components: &BTreeMap<String, ComponentHealth>) -> Vec<String> {
        let mut out = Vec::new();

        for (name, component) in components {
            match component.status {
                ComponentStatus::Critical => {
                    out.push(format!("{name}: critical: {}", component.message));
                }
                ComponentStatus::Degraded => {
                    out.push(format!("{name}: degraded: {}", component.message));
                }
                ComponentStatus::Healthy | ComponentStatus::Unknown => {}
            }
        }

        if let Some(rate) = self.monitor.metrics().poll_success_rate() {
            if rate < self.tuning.min_poll_success_rate {
                out.push(format!(
                    "Polling success rate {:.0}% is below the {:.0}% floor; inspect backend stability",
                    rate * 100.0,
                    self.tuning.min_poll_success_rate * 100.0
                ));
            }
        }

        if let Some(config) = components.get("configuration") {
            if let Some(ms) = config.metrics.get("validation_ms").and_then(Value::as_u64) {
                if ms > self.tuning.slow_validation_ms {
                    out.push(format!(
                        "Configuration validation took {ms}ms; investigate the settings source"
                    ));
                }
            }
        }

        out
    }
}

/// Worst-of merge: any Critical wins, then any Degraded, then all-Healthy;
/// a mix that includes Unknown reports Unknown.
fn merge_statuses(statuses: impl Iterator<Item = ComponentStatus>) -> ComponentStatus {
    let mut saw_unknown = false;
    let mut saw_degraded = false;
    let mut saw_any = false;
    for status in statuses {
        saw_any = true;
        match status {
            ComponentStatus::Critical => return ComponentStatus::Critical,
            ComponentStatus::Degraded => saw_degraded = true,
            ComponentStatus::Unknown => saw_unknown = true,
            ComponentStatus::Healthy => {}
        }
    }
    if saw_degraded {
        ComponentStatus::Degraded
    } else if saw_unknown || !saw_any {
        ComponentStatus::Unknown
    } else {
        ComponentStatus::Healthy
    }
}
