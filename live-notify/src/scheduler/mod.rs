//! Periodic polling of monitored rooms.

pub mod service;

pub use service::{DEFAULT_POLL_INTERVAL, PassReport, PollScheduler, PollSchedulerConfig};
