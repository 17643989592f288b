//! Retry scheduling primitives shared by the connection lifecycle.

pub mod backoff;
pub mod schedule;

pub use backoff::calculate_backoff;
pub use schedule::{schedule, ScheduledTask};
