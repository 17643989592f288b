//! Connection lifecycle state.
//!
//! # State Transitions
//! ```text
//! Uninitialized → Initializing: initialize() called
//! Initializing  → Ready:        probe succeeded (auth-layer rejections tolerated)
//! Initializing  → Retrying:     retryable failure, attempts remaining
//! Retrying      → Initializing: backoff timer fired
//! Initializing  → Error:        non-retryable failure or retries exhausted
//! Retrying      → Error:        reclassified while waiting (via reinitialize path)
//! any           → Initializing: reinitialize() (pending timer cancelled first)
//! ```
//!
//! # Design Decisions
//! - The snapshot is plain serializable data; the manager owns all mutation
//! - Error is terminal until an explicit reinitialize()

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ConnectionError;

/// Lifecycle state of the single managed backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Uninitialized,
    Initializing,
    Ready,
    Error,
    Retrying,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Uninitialized => "Uninitialized",
            ConnectionState::Initializing => "Initializing",
            ConnectionState::Ready => "Ready",
            ConnectionState::Error => "Error",
            ConnectionState::Retrying => "Retrying",
        };
        f.write_str(s)
    }
}

/// Read-only snapshot of the connection state machine.
///
/// Persisted under the diagnostics key after every terminal transition and
/// returned by `ConnectionManager::status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub retry_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub next_retry: Option<DateTime<Utc>>,
    pub last_error: Option<ConnectionError>,
}

impl ConnectionSnapshot {
    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }
}

impl Default for ConnectionSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Uninitialized,
            retry_count: 0,
            last_attempt: None,
            next_retry: None,
            last_error: None,
        }
    }
}
