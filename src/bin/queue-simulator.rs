//! Queue Simulator CLI Tool
//!
//! Drives an in-process registry with a scripted crowd on a manual clock, so
//! admission behavior can be checked without running the HTTP service.
//!
//! Usage:
//!   cargo run --bin queue-simulator -- --help
//!   cargo run --bin queue-simulator run --subjects 500 --max-active 50 --complete-percent 70
//!   cargo run --bin queue-simulator rush --subjects 1000 --max-active 100

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use waiting_room::queue::{QueueRegistry, StaticQueueProvider, SweepPolicy};
use waiting_room::types::{CreateQueueRequest, PositionStatus, QueueId, QueueType};
use waiting_room::utils::ManualClock;

#[derive(Parser)]
#[command(name = "queue-simulator")]
#[command(about = "Simulate a crowd moving through a waiting room queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print final statistics as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Everyone joins at once, then polls every tick until the line drains
    Run {
        /// Number of subjects joining
        #[arg(short, long, default_value = "200")]
        subjects: u32,
        /// Concurrent admission limit
        #[arg(short, long, default_value = "20")]
        max_active: u32,
        /// Admission window in minutes
        #[arg(short, long, default_value = "10")]
        ttl_minutes: u32,
        /// Share of admitted subjects that finish booking, in percent
        #[arg(short, long, default_value = "80")]
        complete_percent: u32,
        /// Simulated seconds between polls
        #[arg(long, default_value = "60")]
        tick_seconds: i64,
        /// Stop after this many ticks even if the line has not drained
        #[arg(long, default_value = "1000")]
        max_ticks: u32,
    },
    /// Concurrent start-booking calls against one schedule
    Rush {
        /// Number of concurrent subjects
        #[arg(short, long, default_value = "1000")]
        subjects: u32,
        /// Concurrent admission limit of the implicit queue
        #[arg(short, long, default_value = "100")]
        max_active: u32,
    },
}

const SIM_PERFORMANCE: &str = "sim-performance";
const SIM_SCHEDULE: &str = "sim-schedule";

fn subject_name(index: u32) -> String {
    format!("subject-{:05}", index)
}

/// Deterministic choice of who finishes booking
fn completes(index: u32, complete_percent: u32) -> bool {
    (index.wrapping_mul(37) % 100) < complete_percent
}

fn build_registry(clock: Arc<ManualClock>, max_active: u32) -> Result<QueueRegistry> {
    let provider = StaticQueueProvider::new()
        .with_override(
            QueueType::BookingOrder,
            waiting_room::types::QueueLimits::new(max_active, 10),
        )?
        .with_schedule(SIM_SCHEDULE, SIM_PERFORMANCE);

    Ok(QueueRegistry::new(Arc::new(provider), clock)?.with_sweep_policy(SweepPolicy {
        // Simulated subjects poll every tick, so nobody is abandoned
        abandon_after: None,
        outcome_retention: Duration::minutes(10),
    }))
}

async fn print_statistics(registry: &QueueRegistry, queue_id: QueueId, json: bool) -> Result<()> {
    let stats = registry.statistics(queue_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📊 Queue Statistics ({}):", queue_id);
    println!("  Waiting now: {}", stats.current_waiting);
    println!(
        "  Enterable now: {} / {}",
        stats.current_enterable, stats.max_active_users
    );
    println!("  Total entries: {}", stats.total_entries);
    for count in &stats.status_counts {
        println!("    {}: {}", count.status, count.count);
    }
    println!(
        "  Transitions: created={}, admitted={}, expired={}, completed={}",
        stats.transitions.created,
        stats.transitions.admitted,
        stats.transitions.expired,
        stats.transitions.completed
    );
    println!(
        "  Admission wait: mean {:.1}s, min {:.1}s, max {:.1}s ({} samples)",
        stats.admission_wait.mean_seconds,
        stats.admission_wait.min_seconds,
        stats.admission_wait.max_seconds,
        stats.admission_wait.samples
    );
    Ok(())
}

async fn run_simulation(
    subjects: u32,
    max_active: u32,
    ttl_minutes: u32,
    complete_percent: u32,
    tick_seconds: i64,
    max_ticks: u32,
    json: bool,
) -> Result<()> {
    if tick_seconds <= 0 {
        return Err(anyhow!("tick-seconds must be positive"));
    }

    let clock = Arc::new(ManualClock::default());
    let registry = build_registry(clock.clone(), max_active)?;

    let summary = registry
        .create_queue(CreateQueueRequest {
            performance_id: SIM_PERFORMANCE.to_string(),
            schedule_id: None,
            queue_type: QueueType::BookingOrder,
            max_active_users: max_active,
            entry_ttl_minutes: ttl_minutes,
        })
        .await?;
    let queue_id = summary.queue_id;

    println!(
        "🧪 {} subjects joining queue {} ({} active, {} min TTL)",
        subjects, queue_id, max_active, ttl_minutes
    );
    for index in 0..subjects {
        registry.join(queue_id, &subject_name(index)).await?;
    }

    let mut finished = vec![false; subjects as usize];
    let mut ticks = 0;

    while ticks < max_ticks {
        let mut live = 0;
        for index in 0..subjects {
            if finished[index as usize] {
                continue;
            }
            let subject = subject_name(index);
            let view = registry.position(queue_id, &subject).await?;
            match view.status {
                PositionStatus::Waiting => live += 1,
                PositionStatus::Enterable if completes(index, complete_percent) => {
                    registry.complete(queue_id, &subject).await?;
                    finished[index as usize] = true;
                }
                // Non-completing subjects sit on their slot until it expires
                PositionStatus::Enterable => live += 1,
                PositionStatus::Expired
                | PositionStatus::Completed
                | PositionStatus::NotInQueue => finished[index as usize] = true,
            }
        }

        if live == 0 {
            break;
        }

        clock.advance(Duration::seconds(tick_seconds));
        let report = registry.sweep_all().await?;
        ticks += 1;

        if !json && !report.is_empty() {
            println!(
                "  tick {:>4}: expired {}, promoted {}",
                ticks, report.expired, report.promoted
            );
        }
    }

    println!(
        "⏱️  Finished after {} ticks ({} simulated minutes)",
        ticks,
        ticks as i64 * tick_seconds / 60
    );
    print_statistics(&registry, queue_id, json).await
}

async fn run_rush(subjects: u32, max_active: u32, json: bool) -> Result<()> {
    let clock = Arc::new(ManualClock::default());
    let registry = Arc::new(build_registry(clock, max_active)?);

    println!(
        "🏃 {} subjects calling start-booking on '{}' concurrently",
        subjects, SIM_SCHEDULE
    );

    let handles: Vec<_> = (0..subjects)
        .map(|index| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .start_booking(SIM_SCHEDULE, &subject_name(index))
                    .await
            })
        })
        .collect();

    let mut admitted = 0;
    let mut waiting = 0;
    let mut queue_id = None;
    for handle in handles {
        let view = handle.await??;
        queue_id = Some(view.queue_id);
        match view.status {
            PositionStatus::Enterable => admitted += 1,
            PositionStatus::Waiting => waiting += 1,
            _ => {}
        }
    }

    let queue_id = queue_id.ok_or_else(|| anyhow!("No subjects were simulated"))?;
    println!(
        "✅ {} admitted immediately, {} waiting, {} queue(s) created",
        admitted,
        waiting,
        registry.queue_count()?
    );
    print_statistics(&registry, queue_id, json).await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            subjects,
            max_active,
            ttl_minutes,
            complete_percent,
            tick_seconds,
            max_ticks,
        } => {
            run_simulation(
                subjects,
                max_active,
                ttl_minutes,
                complete_percent,
                tick_seconds,
                max_ticks,
                cli.json,
            )
            .await
        }
        Commands::Rush {
            subjects,
            max_active,
        } => run_rush(subjects, max_active, cli.json).await,
    };

    if let Err(e) = outcome {
        eprintln!("❌ Simulation failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
