use crate::benchmarks::{BenchmarkError, BenchmarkRegistry, BenchmarkSpec};
use crate::collector::{collect_results, CompletionPolicy};
use crate::config::{RunConfig, RunnerStrategy};
use crate::evolution::aggregator::{AggregateSummary, Aggregator};
use crate::evolution::crayfish::{optimize, OptimizerError};
use crate::evolution::partitioner::{
    build_work_units, dispatch_work_units, generate_population, split_population, PartitionError,
};
use crate::messages::{PartitionResult, WorkUnit};
use crate::transport::memory::InMemoryQueue;
use crate::transport::TransportError;
use crate::worker::{run_worker, WorkerError, WorkerOptions};
use chrono::Utc;
use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// How long a queued run waits for its results when no timeout was configured.
pub const DEFAULT_COLLECT_DEADLINE: Duration = Duration::from_secs(15 * 60);

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Benchmark(#[from] BenchmarkError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),
}

impl From<tokio::task::JoinError> for RunError {
    fn from(e: tokio::task::JoinError) -> Self {
        RunError::Worker(WorkerError::TaskFailed(e))
    }
}

impl RunError {
    /// True for errors caused by the request rather than by the run itself.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            RunError::Benchmark(_) | RunError::Partition(_) | RunError::InvalidConfig(_)
        )
    }
}

/// Outcome of one optimisation run.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RunReport {
    pub function_name: String,
    pub partitions: usize,
    pub iterations: usize,
    pub runner: RunnerStrategy,
    pub summary: AggregateSummary,
    pub elapsed_ms: u64,
}

/// Runs one full optimisation: validate, generate, split, optimise every
/// partition and aggregate. Validation fails before anything is dispatched.
#[instrument(skip(registry), fields(function = %config.function_name))]
pub async fn run_optimization(
    config: RunConfig,
    registry: Arc<BenchmarkRegistry>,
) -> Result<RunReport, RunError> {
    let started = Instant::now();
    let spec = config.validate(&registry)?.clone();

    let seed = config.seed.unwrap_or_else(|| thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);
    let population =
        generate_population(config.population_size, &spec, config.sampling, &mut rng)?;
    let sub_populations = split_population(population, config.partitions)?;
    let units = build_work_units(
        sub_populations,
        config.iterations,
        &spec.name,
        Utc::now(),
    );

    // Partition streams start one past the population stream.
    let partition_seed = seed.wrapping_add(1);
    let summary = match config.runner {
        RunnerStrategy::Local => run_local(&config, spec, units, partition_seed).await?,
        RunnerStrategy::Queued => run_queued(&config, registry, units, partition_seed).await?,
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        overall_best_fitness = summary.overall_best_fitness,
        results_seen = summary.results_seen,
        elapsed_ms,
        "Run finished"
    );
    Ok(RunReport {
        function_name: config.function_name,
        partitions: config.partitions,
        iterations: config.iterations,
        runner: config.runner,
        summary,
        elapsed_ms,
    })
}

/// Optimises every unit on a rayon pool of `max_concurrency` threads.
/// Partition `i` draws from its own RNG seeded with `seed + i`.
pub fn optimize_partitions(
    units: Vec<WorkUnit>,
    spec: &BenchmarkSpec,
    seed: u64,
    max_concurrency: usize,
) -> Result<Vec<Result<PartitionResult, OptimizerError>>, RunError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(max_concurrency)
        .build()
        .map_err(|e| RunError::InvalidConfig(e.to_string()))?;

    Ok(pool.install(|| {
        units
            .into_par_iter()
            .enumerate()
            .map(|(index, unit)| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
                optimize(unit, spec, &mut rng)
            })
            .collect()
    }))
}

async fn run_local(
    config: &RunConfig,
    spec: BenchmarkSpec,
    units: Vec<WorkUnit>,
    seed: u64,
) -> Result<AggregateSummary, RunError> {
    let max_concurrency = config.max_concurrency;
    let outcomes = tokio::task::spawn_blocking(move || {
        optimize_partitions(units, &spec, seed, max_concurrency)
    })
    .await??;

    let mut aggregator = Aggregator::new();
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(result) => aggregator.observe(&result),
            Err(e) if config.strict => return Err(e.into()),
            Err(e) => warn!(partition = index, error = %e, "Partition failed"),
        }
    }

    let summary = aggregator.finalize();
    if summary.is_incomplete(config.partitions) {
        warn!(
            expected = config.partitions,
            seen = summary.results_seen,
            "Run finished with missing partition results"
        );
    }
    Ok(summary)
}

/// Collection stops at the run's deadline. Work units stay claimed for the
/// same span, so a slow partition is never handed to a second worker while
/// the run still waits on it.
fn queued_deadline(config: &RunConfig) -> Duration {
    config.collect_timeout().unwrap_or(DEFAULT_COLLECT_DEADLINE)
}

fn queued_policy(config: &RunConfig, expected: usize) -> CompletionPolicy {
    CompletionPolicy::expecting(expected).with_deadline(Some(queued_deadline(config)))
}

async fn run_queued(
    config: &RunConfig,
    registry: Arc<BenchmarkRegistry>,
    units: Vec<WorkUnit>,
    seed: u64,
) -> Result<AggregateSummary, RunError> {
    let work = InMemoryQueue::<WorkUnit>::with_visibility_timeout(queued_deadline(config));
    let results = InMemoryQueue::<PartitionResult>::new();

    let worker_count = config.max_concurrency.min(units.len());
    let workers: Vec<_> = (0..worker_count)
        .map(|worker_id| {
            let work = work.clone();
            let results = results.clone();
            let registry = Arc::clone(&registry);
            let worker_seed = seed.wrapping_add(worker_id as u64);
            tokio::spawn(async move {
                run_worker(
                    worker_id,
                    &work,
                    &results,
                    &registry,
                    worker_seed,
                    WorkerOptions::default(),
                )
                .await
            })
        })
        .collect();

    let dispatched = dispatch_work_units(&work, units).await;
    let collected = match dispatched {
        Ok(expected) => {
            collect_results(&results, queued_policy(config, expected), config.strict).await
        }
        Err(e) => Err(e),
    };

    // Workers poll until cancelled; collection decides when the run is over.
    for worker in &workers {
        worker.abort();
    }
    for worker in workers {
        match worker.await {
            Ok(Err(e)) => warn!(error = %e, "Worker stopped with an error"),
            Ok(Ok(_)) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Worker task panicked"),
        }
    }

    Ok(collected?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::benchmarks::default_registry;
    use crate::evolution::partitioner::PopulationSampling;

    fn registry() -> Arc<BenchmarkRegistry> {
        Arc::new(default_registry().clone())
    }

    fn config(runner: RunnerStrategy) -> RunConfig {
        let mut config = RunConfig::new(40, 4, 30, "F16");
        config.seed = Some(7);
        config.max_concurrency = 2;
        config.runner = runner;
        config
    }

    #[tokio::test]
    async fn local_run_aggregates_every_partition() {
        let report = run_optimization(config(RunnerStrategy::Local), registry())
            .await
            .unwrap();
        assert_eq!(report.partitions, 4);
        assert_eq!(report.summary.results_seen, 4);
        let curve = report.summary.overall_convergence.unwrap();
        assert_eq!(curve.len(), 30);
        // F16 has its global minimum near -1.0316.
        assert!(report.summary.overall_best_fitness < 0.);
        assert!(report.summary.overall_best_fitness > -1.0317);
        assert_eq!(report.summary.overall_best_position.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn local_runs_are_reproducible() {
        let first = run_optimization(config(RunnerStrategy::Local), registry())
            .await
            .unwrap();
        let second = run_optimization(config(RunnerStrategy::Local), registry())
            .await
            .unwrap();
        assert_eq!(
            first.summary.overall_best_fitness,
            second.summary.overall_best_fitness
        );
        assert_eq!(
            first.summary.overall_convergence,
            second.summary.overall_convergence
        );
    }

    #[tokio::test]
    async fn queued_run_collects_every_partition() {
        let report = run_optimization(config(RunnerStrategy::Queued), registry())
            .await
            .unwrap();
        assert_eq!(report.runner, RunnerStrategy::Queued);
        assert_eq!(report.summary.results_seen, 4);
        assert_eq!(report.summary.overall_convergence.unwrap().len(), 30);
        assert!(report.summary.overall_best_fitness.is_finite());
    }

    #[test]
    fn queued_runs_always_have_a_deadline() {
        let mut config = config(RunnerStrategy::Queued);
        config.collect_timeout_secs = None;
        let policy = queued_policy(&config, 4);
        assert_eq!(policy.expected, Some(4));
        assert_eq!(policy.deadline, Some(DEFAULT_COLLECT_DEADLINE));
        assert_eq!(queued_deadline(&config), DEFAULT_COLLECT_DEADLINE);

        config.collect_timeout_secs = Some(90);
        assert_eq!(queued_policy(&config, 4).deadline, Some(Duration::from_secs(90)));
        assert_eq!(queued_deadline(&config), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn per_dimension_sampling_runs() {
        let mut config = config(RunnerStrategy::Local);
        config.function_name = "F17".into();
        config.sampling = PopulationSampling::PerDimension;
        let report = run_optimization(config, registry()).await.unwrap();
        // Branin minimum is about 0.3979.
        assert!(report.summary.overall_best_fitness >= 0.39);
    }

    #[tokio::test]
    async fn invalid_runs_fail_before_any_work() {
        let mut bad = config(RunnerStrategy::Queued);
        bad.partitions = 41;
        let err = run_optimization(bad, registry()).await.unwrap_err();
        assert!(matches!(err, RunError::Partition(_)));
        assert!(err.is_caller_error());

        let mut bad = config(RunnerStrategy::Local);
        bad.function_name = "F99".into();
        assert!(matches!(
            run_optimization(bad, registry()).await,
            Err(RunError::Benchmark(BenchmarkError::UnknownFunction(_)))
        ));
    }

    #[test]
    fn partitions_get_distinct_streams() {
        let spec = default_registry().lookup("F1").unwrap();
        let rows = vec![vec![50.; 30], vec![-20.; 30]];
        let unit = |rows: Vec<Vec<f64>>| WorkUnit {
            sub_population: rows,
            iterations: 5,
            function_name: "F1".into(),
            start_time: Utc::now(),
            partition: None,
        };
        let outcomes = optimize_partitions(
            vec![unit(rows.clone()), unit(rows)],
            spec,
            11,
            2,
        )
        .unwrap();
        let curves: Vec<Vec<f64>> = outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap().convergence_curve)
            .collect();
        assert_ne!(curves[0], curves[1]);
    }
}
