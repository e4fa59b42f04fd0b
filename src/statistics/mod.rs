//! All-time statistics for queues
//!
//! These counters are independent of the live ledger: they only grow as
//! transitions happen and are used for reporting, never for admission
//! decisions.

pub mod accumulator;
pub mod wait_time;

// Re-export commonly used types
pub use accumulator::{QueueCounters, StatisticsAccumulator, StatisticsTracker};
pub use wait_time::AdmissionWaitStats;
