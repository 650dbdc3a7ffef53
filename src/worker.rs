//! Consumer side of the work queue: one work unit in, one partition result out.
use crate::benchmarks::BenchmarkRegistry;
use crate::evolution::crayfish::optimize;
use crate::messages::WorkUnit;
use crate::transport::{Delivery, Receipt, ResultQueue, TransportError, WorkQueue};
use rand::prelude::*;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Optimisation task did not finish: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// What happened to a single delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    /// A result was published and the unit acknowledged.
    Published { best_fitness: f64 },
    /// The unit could not be processed; it was acknowledged and dropped.
    Rejected { reason: String },
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    pub poll_interval: Duration,
    /// Stop after the queue stayed empty this long. `None` keeps polling
    /// until the task is cancelled.
    pub idle_timeout: Option<Duration>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        WorkerOptions {
            poll_interval: Duration::from_millis(10),
            idle_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub published: usize,
    pub rejected: usize,
}

/// Handles one delivery end to end: decode, optimise, publish, acknowledge.
///
/// A unit that cannot be processed (undecodable, unknown function, bad
/// shape) is acknowledged so it is not redelivered forever; only transport
/// failures on receive or publish are returned as errors. The result is
/// published before the unit is acknowledged, so a crash in between yields a
/// duplicate, never a loss. A failed acknowledgement is only logged.
pub async fn handle_delivery<W, R>(
    work: &W,
    results: &R,
    registry: &BenchmarkRegistry,
    delivery: Delivery<WorkUnit>,
    seed: u64,
) -> Result<WorkOutcome, WorkerError>
where
    W: WorkQueue + ?Sized,
    R: ResultQueue + ?Sized,
{
    let Delivery { receipt, payload } = delivery;

    let outcome = match payload {
        Err(e) => Err(e.to_string()),
        Ok(unit) => match registry.lookup(&unit.function_name) {
            Err(e) => Err(e.to_string()),
            Ok(spec) => {
                let spec = spec.clone();
                tokio::task::spawn_blocking(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    optimize(unit, &spec, &mut rng)
                })
                .await?
                .map_err(|e| e.to_string())
            }
        },
    };

    match outcome {
        Ok(result) => {
            let best_fitness = result.best_fitness;
            results.publish_result(result).await?;
            acknowledge_or_warn(work, &receipt).await;
            debug!(%receipt, best_fitness, "Partition result published");
            Ok(WorkOutcome::Published { best_fitness })
        }
        Err(reason) => {
            warn!(%receipt, %reason, "Dropping work unit");
            acknowledge_or_warn(work, &receipt).await;
            Ok(WorkOutcome::Rejected { reason })
        }
    }
}

// A receipt can expire while the unit is being optimised; the queue has then
// handed the unit to someone else and the work done here is already out.
async fn acknowledge_or_warn<W>(work: &W, receipt: &Receipt)
where
    W: WorkQueue + ?Sized,
{
    if let Err(e) = work.acknowledge(receipt).await {
        warn!(%receipt, error = %e, "Could not acknowledge work unit, it may run twice");
    }
}

/// Pulls work units until the queue stays idle for `options.idle_timeout`.
/// Every unit gets its own RNG stream derived from `seed`.
#[instrument(skip(work, results, registry, options))]
pub async fn run_worker<W, R>(
    worker_id: usize,
    work: &W,
    results: &R,
    registry: &BenchmarkRegistry,
    seed: u64,
    options: WorkerOptions,
) -> Result<WorkerStats, WorkerError>
where
    W: WorkQueue + ?Sized,
    R: ResultQueue + ?Sized,
{
    let mut seeds = StdRng::seed_from_u64(seed);
    let mut stats = WorkerStats::default();
    let mut last_activity = Instant::now();

    loop {
        match work.receive_work().await? {
            Some(delivery) => {
                match handle_delivery(work, results, registry, delivery, seeds.gen()).await? {
                    WorkOutcome::Published { .. } => stats.published += 1,
                    WorkOutcome::Rejected { .. } => stats.rejected += 1,
                }
                last_activity = Instant::now();
            }
            None => {
                if let Some(idle) = options.idle_timeout {
                    if last_activity.elapsed() >= idle {
                        break;
                    }
                }
                tokio::time::sleep(options.poll_interval).await;
            }
        }
    }

    info!(
        published = stats.published,
        rejected = stats.rejected,
        "Worker going idle"
    );
    Ok(stats)
}
