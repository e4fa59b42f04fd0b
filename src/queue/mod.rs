//! Admission-control queues
//!
//! A queue holds a FIFO waiting line and a bounded set of admitted entries.
//! The [`ledger`] owns that state for one queue, the [`registry`] owns every
//! queue and serializes access per queue, and the [`sweeper`] enforces
//! admission windows in the background.

pub mod ledger;
pub mod provider;
pub mod rank;
pub mod registry;
pub mod sweeper;

pub use ledger::{AdmissionLedger, LedgerEvent, SweepPolicy, SweepReport};
pub use provider::{QueueProvider, StaticQueueProvider};
pub use registry::{QueueHandle, QueueRegistry};
pub use sweeper::{SweeperStatus, TtlSweeper};
