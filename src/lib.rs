//! Waiting Room - admission control for ticket booking
//!
//! This crate runs virtual waiting rooms in front of a booking flow. Each
//! queue admits a bounded number of subjects at a time in join order; the
//! rest wait and poll for their position. Admitted subjects get a time
//! window to finish booking before their slot is reclaimed.

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod statistics;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{AdmissionError, Result};
pub use types::*;

// Re-export key components
pub use queue::{AdmissionLedger, QueueProvider, QueueRegistry, StaticQueueProvider, TtlSweeper};
pub use statistics::{StatisticsAccumulator, StatisticsTracker};
pub use utils::{Clock, ManualClock, SystemClock};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
