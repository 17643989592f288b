//! Durable key-value persistence for diagnostics and health metrics.
//!
//! # Responsibilities
//! - Define the store seam the core persists through
//! - Provide a file-backed store for production and an in-memory store for tests
//!
//! # Design Decisions
//! - Values are plain structured data (serde_json::Value); schema lives with
//!   the writers
//! - Writers treat persistence as best-effort; a failing store is logged by
//!   the caller, never propagated to application flows

mod file;
mod memory;

use async_trait::async_trait;
use serde_json::Value;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Fixed key for the connection manager's diagnostics snapshot.
pub const CONNECTION_DIAGNOSTICS_KEY: &str = "connection:diagnostics";

/// Fixed key for the health monitor's metrics snapshot.
pub const HEALTH_METRICS_KEY: &str = "health:metrics";

/// Storage failure. Carried for logging; never surfaced to callers of the
/// health or connection APIs.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Key-value persistence seam.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &Value) -> Result<(), StorageError>;
}
