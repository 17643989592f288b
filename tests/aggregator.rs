//! Aggregated health reporting: component gathering, worst-of merge, caching.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reservation_core::config::resolver::{
    ConfigurationResolver, MapSettings, BACKEND_SERVICE_KEY_KEY, BACKEND_URL_KEY,
};
use reservation_core::config::schema::{AggregatorTuning, ConnectionTuning, HealthTuning};
use reservation_core::connection::ConnectionManager;
use reservation_core::health::aggregator::{AccessAudit, AccessProbe, CheckOptions};
use reservation_core::health::{ComponentStatus, HealthAggregator, HealthMonitor};
use reservation_core::storage::MemoryStore;

struct StubProbe {
    ok: bool,
}

#[async_trait]
impl AccessProbe for StubProbe {
    async fn audit(&self) -> AccessAudit {
        AccessAudit {
            ok: self.ok,
            message: if self.ok {
                "audit read succeeded".to_string()
            } else {
                "audit read failed: status 500".to_string()
            },
            details: serde_json::Value::Null,
        }
    }
}

fn fast_tuning() -> ConnectionTuning {
    ConnectionTuning {
        max_retries: 3,
        base_delay_ms: 10,
        max_delay_ms: 80,
        probe_path: "/rest/v1/".to_string(),
        probe_timeout_secs: 2,
    }
}

fn settings_for(url: &str) -> MapSettings {
    let map = MapSettings::new();
    map.set(BACKEND_URL_KEY, url);
    map.set(BACKEND_SERVICE_KEY_KEY, "test-service-key");
    map
}

struct Harness {
    manager: ConnectionManager,
    monitor: Arc<HealthMonitor>,
    aggregator: HealthAggregator,
}

async fn harness(settings: MapSettings, probe_ok: bool, tuning: AggregatorTuning) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let resolver = ConfigurationResolver::new(Arc::new(settings));
    let manager = ConnectionManager::new(resolver.clone(), fast_tuning(), store.clone());
    let monitor = Arc::new(HealthMonitor::load(store, HealthTuning::default()).await);
    let aggregator = HealthAggregator::new(
        manager.clone(),
        monitor.clone(),
        resolver,
        Arc::new(StubProbe { ok: probe_ok }),
        tuning,
    );
    Harness {
        manager,
        monitor,
        aggregator,
    }
}

#[tokio::test]
async fn test_all_healthy_components_merge_healthy() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), true, AggregatorTuning::default()).await;
    h.manager.initialize().await.unwrap();

    let report = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert_eq!(report.overall, ComponentStatus::Healthy);
    assert_eq!(report.components.len(), 4);
    assert!(report.components.contains_key("access_audit"));
    assert!(report.recommendations.is_empty());
}

#[tokio::test]
async fn test_failed_connection_merges_critical() {
    let map = MapSettings::new();
    map.set(BACKEND_SERVICE_KEY_KEY, "test-service-key");
    let h = harness(map, true, AggregatorTuning::default()).await;
    let _ = h.manager.initialize().await;

    let report = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert_eq!(report.overall, ComponentStatus::Critical);
    assert_eq!(
        report.components["connection"].status,
        ComponentStatus::Critical
    );
    assert_eq!(
        report.components["configuration"].status,
        ComponentStatus::Critical
    );
    assert!(!report.recommendations.is_empty());
}

#[tokio::test]
async fn test_impaired_monitor_merges_degraded() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), true, AggregatorTuning::default()).await;
    h.manager.initialize().await.unwrap();

    // Six polling failures put the monitor in its error band, which the
    // component scale reports as degraded.
    for _ in 0..6 {
        h.monitor.record_polling_event(false, 0, Some("unreachable"));
    }

    let report = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert_eq!(
        report.components["monitoring"].status,
        ComponentStatus::Degraded
    );
    assert_eq!(report.overall, ComponentStatus::Degraded);
    assert!(h.aggregator.is_healthy().await);
}

#[tokio::test]
async fn test_uninitialized_connection_reports_unknown() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), true, AggregatorTuning::default()).await;

    let report = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert_eq!(
        report.components["connection"].status,
        ComponentStatus::Unknown
    );
    assert_eq!(report.overall, ComponentStatus::Unknown);
}

#[tokio::test]
async fn test_shallow_check_omits_access_audit() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), true, AggregatorTuning::default()).await;
    h.manager.initialize().await.unwrap();

    let report = h
        .aggregator
        .perform_health_check(CheckOptions {
            run_access_audit: false,
        })
        .await;
    assert!(!report.components.contains_key("access_audit"));
    assert_eq!(report.overall, ComponentStatus::Healthy);
}

#[tokio::test]
async fn test_quick_status_serves_the_cached_report() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), true, AggregatorTuning::default()).await;
    h.manager.initialize().await.unwrap();

    let first = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert_eq!(first.overall, ComponentStatus::Healthy);

    // Degrade the monitor after the report was cached; the quick status
    // must still serve the cached view inside the TTL.
    for _ in 0..6 {
        h.monitor.record_polling_event(false, 0, Some("unreachable"));
    }
    let cached = h.aggregator.quick_status().await;
    assert_eq!(cached.overall, ComponentStatus::Healthy);
    assert_eq!(cached.timestamp, first.timestamp);
}

#[tokio::test]
async fn test_expired_cache_triggers_a_shallow_refresh() {
    let backend = common::start_mock_backend(200, "[]").await;
    let tuning = AggregatorTuning {
        cache_ttl_secs: 0,
        ..AggregatorTuning::default()
    };
    let h = harness(settings_for(&backend.url()), true, tuning).await;
    h.manager.initialize().await.unwrap();

    h.aggregator.perform_health_check(CheckOptions::default()).await;
    for _ in 0..6 {
        h.monitor.record_polling_event(false, 0, Some("unreachable"));
    }

    tokio::time::sleep(Duration::from_millis(20)).await;
    let refreshed = h.aggregator.quick_status().await;
    assert_eq!(refreshed.overall, ComponentStatus::Degraded);
    assert!(!refreshed.components.contains_key("access_audit"));
}

#[tokio::test]
async fn test_failed_audit_degrades_without_being_fatal() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), false, AggregatorTuning::default()).await;
    h.manager.initialize().await.unwrap();

    let report = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert_eq!(
        report.components["access_audit"].status,
        ComponentStatus::Degraded
    );
    assert_eq!(report.overall, ComponentStatus::Degraded);
    assert!(h.aggregator.is_healthy().await);
}

#[tokio::test]
async fn test_low_poll_success_rate_draws_a_recommendation() {
    let backend = common::start_mock_backend(200, "[]").await;
    let h = harness(settings_for(&backend.url()), true, AggregatorTuning::default()).await;
    h.manager.initialize().await.unwrap();

    h.monitor.record_polling_event(true, 100, None);
    h.monitor.record_polling_event(false, 0, Some("unreachable"));

    let report = h.aggregator.perform_health_check(CheckOptions::default()).await;
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("success rate")));
}
