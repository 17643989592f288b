//! Backend connection subsystem.
//!
//! # Data Flow
//! ```text
//! Caller initialize()
//!     → manager.rs (state machine, coalescing, retry scheduling)
//!     → resolver (named settings, fail fast)
//!     → client.rs (HTTP client construction + reachability probe)
//!     → classifier.rs (failure text → error category)
//!     → error.rs / state.rs (structured outcome + snapshot)
//! ```
//!
//! # Design Decisions
//! - One manager owns the lifecycle; callers share it by cloning
//! - Concurrent initializers coalesce onto a single in-flight attempt
//! - Only network failures are retried; everything else fails fast

pub mod classifier;
pub mod client;
pub mod error;
pub mod manager;
pub mod state;

pub use classifier::ErrorClassifier;
pub use client::BackendClient;
pub use error::{ConnectionError, ErrorCategory};
pub use manager::ConnectionManager;
pub use state::{ConnectionSnapshot, ConnectionState};
