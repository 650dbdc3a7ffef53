use crate::benchmarks::BenchmarkSpec;
use crate::messages::WorkUnit;
use crate::transport::{TransportError, WorkQueue};
use chrono::{DateTime, Utc};
use rand::distributions::Uniform;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PartitionError {
    #[error("Cannot split a population of {population} into {partitions} partitions.")]
    InvalidPartitionCount { partitions: usize, population: usize },
    #[error("Population size cannot be zero.")]
    EmptyPopulation,
}

/// How coordinates of the initial population are drawn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PopulationSampling {
    /// Every coordinate is drawn from the first lower/upper bound pair,
    /// whatever the per-dimension bounds say.
    #[default]
    FirstBound,
    /// Coordinate `j` is drawn from its own bounds.
    PerDimension,
}

/// Draws `size` positions uniformly inside the benchmark's search box.
pub fn generate_population<R: Rng + ?Sized>(
    size: usize,
    spec: &BenchmarkSpec,
    sampling: PopulationSampling,
    rng: &mut R,
) -> Result<Vec<Vec<f64>>, PartitionError> {
    if size == 0 {
        return Err(PartitionError::EmptyPopulation);
    }

    let population = match sampling {
        PopulationSampling::FirstBound => {
            let uniform = Uniform::new_inclusive(spec.lower(0), spec.upper(0));
            (0..size)
                .map(|_| (0..spec.dimension).map(|_| uniform.sample(rng)).collect())
                .collect()
        }
        PopulationSampling::PerDimension => {
            let uniforms: Vec<Uniform<f64>> = (0..spec.dimension)
                .map(|j| Uniform::new_inclusive(spec.lower(j), spec.upper(j)))
                .collect();
            (0..size)
                .map(|_| uniforms.iter().map(|uniform| uniform.sample(rng)).collect())
                .collect()
        }
    };
    Ok(population)
}

/// Splits the population into `partitions` contiguous groups whose sizes
/// differ by at most one; the first `N mod k` groups take the extra row.
pub fn split_population(
    population: Vec<Vec<f64>>,
    partitions: usize,
) -> Result<Vec<Vec<Vec<f64>>>, PartitionError> {
    let total = population.len();
    if partitions == 0 || partitions > total {
        return Err(PartitionError::InvalidPartitionCount {
            partitions,
            population: total,
        });
    }

    let base_size = total / partitions;
    let remainder = total % partitions;

    let mut rows = population.into_iter();
    Ok((0..partitions)
        .map(|i| {
            let size = if i < remainder { base_size + 1 } else { base_size };
            rows.by_ref().take(size).collect()
        })
        .collect())
}

/// Pairs every sub-population with the run parameters and its index.
pub fn build_work_units(
    sub_populations: Vec<Vec<Vec<f64>>>,
    iterations: usize,
    function_name: &str,
    start_time: DateTime<Utc>,
) -> Vec<WorkUnit> {
    sub_populations
        .into_iter()
        .enumerate()
        .map(|(index, sub_population)| WorkUnit {
            sub_population,
            iterations,
            function_name: function_name.to_string(),
            start_time,
            partition: Some(index),
        })
        .collect()
}

/// Enqueues every unit without waiting for any result. Stops at the first
/// transport failure and reports it.
pub async fn dispatch_work_units<Q>(queue: &Q, units: Vec<WorkUnit>) -> Result<usize, TransportError>
where
    Q: WorkQueue + ?Sized,
{
    let total = units.len();
    for (index, unit) in units.into_iter().enumerate() {
        debug!(partition = index, rows = unit.size(), "Dispatching work unit");
        queue.dispatch(unit).await?;
    }
    info!(partitions = total, "All work units dispatched");
    Ok(total)
}
