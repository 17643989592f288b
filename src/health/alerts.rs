//! Health alert delivery.
//!
//! # Responsibilities
//! - Fan alerts out to the current subscribers
//! - Isolate a panicking subscriber from the rest
//!
//! # Design Decisions
//! - Alerts are ephemeral: delivered to current subscribers only, never replayed
//! - Subscriptions hold a weak hub reference; unsubscribing after the
//!   monitor is destroyed is a no-op

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

/// A single health alert.
#[derive(Debug, Clone, Serialize)]
pub struct HealthAlert {
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

impl HealthAlert {
    pub fn new(level: AlertLevel, message: impl Into<String>, details: Value) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
            details,
        }
    }
}

type AlertCallback = Box<dyn Fn(&HealthAlert) + Send + Sync>;

/// Subscriber registry with panic-isolated fan-out.
#[derive(Default)]
pub struct AlertHub {
    subscribers: DashMap<Uuid, AlertCallback>,
}

impl AlertHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(self: &Arc<Self>, callback: AlertCallback) -> AlertSubscription {
        let id = Uuid::new_v4();
        self.subscribers.insert(id, callback);
        AlertSubscription {
            id,
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver an alert to every current subscriber. A panicking callback
    /// is logged and skipped; delivery to the others continues.
    pub fn emit(&self, alert: &HealthAlert) {
        for entry in self.subscribers.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| (entry.value())(alert)));
            if result.is_err() {
                tracing::warn!(
                    subscriber = %entry.key(),
                    message = %alert.message,
                    "alert subscriber panicked; continuing delivery"
                );
            }
        }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
    }

    /// Detach every subscriber.
    pub fn clear(&self) {
        self.subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Handle returned by `on_alert`; call [`unsubscribe`](Self::unsubscribe)
/// to stop receiving alerts.
pub struct AlertSubscription {
    id: Uuid,
    hub: Weak<AlertHub>,
}

impl AlertSubscription {
    pub fn unsubscribe(self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_subscribers() {
        let hub = Arc::new(AlertHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        let _s1 = hub.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));
        let c2 = count.clone();
        let _s2 = hub.subscribe(Box::new(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        }));

        hub.emit(&HealthAlert::new(AlertLevel::Info, "hello", Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribed_receives_nothing() {
        let hub = Arc::new(AlertHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let sub = hub.subscribe(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        sub.unsubscribe();

        hub.emit(&HealthAlert::new(AlertLevel::Info, "hello", Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_delivery() {
        let hub = Arc::new(AlertHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let _bad = hub.subscribe(Box::new(|_| panic!("subscriber bug")));
        let c = count.clone();
        let _good = hub.subscribe(Box::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        hub.emit(&HealthAlert::new(AlertLevel::Error, "boom", Value::Null));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
