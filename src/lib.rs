//! Resilient backend-connection core for the room reservation service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Application code
//!     ────────────────────────────────────────────────
//!        │ initialize() / client()        │ record_*()
//!        ▼                                ▼
//!  ┌──────────────┐                ┌──────────────┐
//!  │  connection  │                │    health    │
//!  │  manager +   │                │  monitor +   │
//!  │  classifier  │                │  aggregator  │
//!  └──────┬───────┘                └──────┬───────┘
//!         │                               │
//!         ▼                               ▼
//!  ┌──────────────┐                ┌──────────────┐
//!  │  resilience  │                │   storage    │
//!  │ backoff +    │                │  key/value   │
//!  │ scheduling   │                │  snapshots   │
//!  └──────────────┘                └──────────────┘
//!
//!  Cross-cutting: config (settings + tuning), observability (logging)
//! ```
//!
//! The connection manager owns a small state machine
//! (Uninitialized → Initializing → Ready/Retrying/Error), coalesces
//! concurrent initialization and retries network failures with bounded
//! exponential backoff. The health monitor folds runtime events into
//! metrics, fires one-shot threshold alerts and scores the system; the
//! aggregator merges per-component health into one report.

// Core subsystems
pub mod config;
pub mod connection;
pub mod health;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;
pub mod storage;

pub use config::resolver::{BackendSettings, ConfigurationResolver};
pub use config::schema::CoreConfig;
pub use connection::{ConnectionError, ConnectionManager, ConnectionState, ErrorCategory};
pub use health::{HealthAggregator, HealthMonitor};
