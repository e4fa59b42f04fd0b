//! Background TTL sweeper
//!
//! Expires admitted entries whose window has elapsed, reclaims waiting
//! entries that stopped polling, and backfills freed slots.

use crate::error::Result;
use crate::queue::ledger::SweepReport;
use crate::queue::registry::QueueRegistry;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Last known state of the sweeper, read by health checks
#[derive(Debug, Default)]
pub struct SweeperStatus {
    runs: AtomicU64,
    failures: AtomicU64,
    last_run: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

impl SweeperStatus {
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run.lock().ok().and_then(|last| *last)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|last| last.clone())
    }

    fn record(&self, at: DateTime<Utc>, outcome: &Result<SweepReport>) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_run.lock() {
            *last = Some(at);
        }
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = match outcome {
                Ok(_) => None,
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    Some(e.to_string())
                }
            };
        }
    }
}

/// Periodic sweep over every queue in a registry
pub struct TtlSweeper {
    registry: Arc<QueueRegistry>,
    interval: Duration,
    status: Arc<SweeperStatus>,
}

impl TtlSweeper {
    pub fn new(registry: Arc<QueueRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            status: Arc::new(SweeperStatus::default()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn status(&self) -> Arc<SweeperStatus> {
        self.status.clone()
    }

    /// Run one sweep and record its outcome
    pub async fn run_once(&self) -> Result<SweepReport> {
        let metrics = self.registry.metrics();
        let timer = metrics.start_timer();

        let outcome = self.registry.sweep_all().await;
        let elapsed = timer.stop();
        self.status.record(self.registry.now(), &outcome);

        match &outcome {
            Ok(report) => {
                metrics.record_sweep(report, elapsed);
                if report.is_empty() {
                    debug!("Sweep completed - nothing to do");
                } else {
                    info!(
                        "Sweep completed in {:.2}ms - expired: {}, abandoned: {}, promoted: {}",
                        elapsed.as_secs_f64() * 1000.0,
                        report.expired,
                        report.abandoned,
                        report.promoted
                    );
                }
            }
            Err(e) => error!("Sweep failed: {}", e),
        }
        outcome
    }

    /// Run until a shutdown signal arrives
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                "TTL sweeper started ({}s interval)",
                self.interval.as_secs_f64()
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Failures are logged and retried on the next tick
                        let _ = self.run_once().await;
                    }
                    _ = shutdown.recv() => break,
                }
            }

            info!("TTL sweeper stopped after {} runs", self.status.runs());
        })
    }
}
