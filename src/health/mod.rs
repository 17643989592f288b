//! Health monitoring subsystem.
//!
//! # Data Flow
//! ```text
//! Runtime events (polls, storage ops, callbacks, state changes):
//!     → monitor.rs record_* entry points
//!     → metrics.rs (counters, gauges, running mean)
//!     → alerts.rs (one-shot threshold alerts, fan-out)
//!
//! Dashboards and ops tooling:
//!     → aggregator.rs (concurrent component gathering, worst-of merge)
//! ```
//!
//! # Design Decisions
//! - The health score is a pure function of current metrics
//! - Threshold alerts fire once per crossing, re-armed by reset
//! - The aggregator caches its last report behind a TTL

pub mod aggregator;
pub mod alerts;
pub mod metrics;
pub mod monitor;

pub use aggregator::{AggregateHealthReport, ComponentStatus, HealthAggregator};
pub use alerts::{AlertLevel, AlertSubscription, HealthAlert};
pub use metrics::HealthMetrics;
pub use monitor::{HealthMonitor, HealthReport, MonitorStatus};
