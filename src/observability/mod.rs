//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; every subsystem logs with fields
//! - Log level configurable via config and environment

pub mod logging;

pub use logging::init_logging;
