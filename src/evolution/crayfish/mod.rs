use crate::benchmarks::BenchmarkSpec;
use crate::consts::{
    CONTROL_FACTOR_START, FOOD_SIZE_THRESHOLD, HOT_TEMPERATURE_THRESHOLD, SHELTER_PROBABILITY,
    TEMPERATURE_MIN, TEMPERATURE_SPAN,
};
use crate::messages::{PartitionResult, WorkUnit};
use itertools::izip;
use rand::prelude::*;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, instrument};

use self::stages::{compete, eat, seek_shelter, shred_and_eat, IntakeCurve};

pub mod stages;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("Work unit carries an empty sub-population.")]
    EmptySubPopulation,
    #[error("Row {row} has {got} coordinates, benchmark expects {expected}.")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Work unit targets `{got}` but benchmark `{expected}` was supplied.")]
    FunctionMismatch { expected: String, got: String },
    #[error("Could not build the intake curve: {0}")]
    IntakeCurve(String),
}

/// A fitness value together with the position it was measured at.
#[derive(Debug, Clone, PartialEq)]
pub struct Best {
    pub fitness: f64,
    pub position: Vec<f64>,
}

/// The state of one partition's swarm during the search.
pub struct Crayfish<'a> {
    spec: &'a BenchmarkSpec,
    intake: IntakeCurve,
    population: Vec<Vec<f64>>,
    fitness: Vec<f64>,
    candidates: Vec<Vec<f64>>,
    local_best: Best,
    global_best: Best,
}

impl<'a> Crayfish<'a> {
    pub fn new(spec: &'a BenchmarkSpec, population: Vec<Vec<f64>>) -> Result<Self, OptimizerError> {
        if population.is_empty() {
            return Err(OptimizerError::EmptySubPopulation);
        }
        if let Some((row, position)) = population
            .iter()
            .enumerate()
            .find(|(_, position)| position.len() != spec.dimension)
        {
            return Err(OptimizerError::DimensionMismatch {
                row,
                expected: spec.dimension,
                got: position.len(),
            });
        }
        let intake = IntakeCurve::new().map_err(OptimizerError::IntakeCurve)?;

        let fitness: Vec<f64> = population
            .par_iter()
            .map(|position| spec.evaluate(position))
            .collect();
        let local_best = best_of(&population, &fitness);
        let global_best = local_best.clone();

        Ok(Crayfish {
            spec,
            intake,
            candidates: population.clone(),
            population,
            fitness,
            local_best,
            global_best,
        })
    }

    /// Runs iteration `t` out of `iterations` and returns the global best
    /// fitness recorded for it.
    pub fn step<R: Rng + ?Sized>(&mut self, t: usize, iterations: usize, rng: &mut R) -> f64 {
        let spec = self.spec;
        let rows = self.population.len();

        // Decreasing curve, from 2 towards 1.
        let control_factor = CONTROL_FACTOR_START - (t as f64) / (iterations as f64);
        let temperature = TEMPERATURE_MIN + TEMPERATURE_SPAN * rng.gen::<f64>();
        let intake = self.intake.probability(temperature);

        let shelter: Vec<f64> = self
            .local_best
            .position
            .iter()
            .zip(&self.global_best.position)
            .map(|(local, global)| (local + global) / 2.)
            .collect();
        let mut food = self.local_best.position.clone();

        let mut candidates: Vec<Vec<f64>> = Vec::with_capacity(rows);
        for (i, row) in self.population.iter().enumerate() {
            let candidate = if temperature > HOT_TEMPERATURE_THRESHOLD {
                if rng.gen::<f64>() < SHELTER_PROBABILITY {
                    seek_shelter(row, &shelter, control_factor, rng)
                } else {
                    compete(i, &self.population, &shelter, rng)
                }
            } else {
                let intake_ratio =
                    3. * rng.gen::<f64>() * self.fitness[i] / spec.evaluate(&food);
                if intake_ratio > FOOD_SIZE_THRESHOLD {
                    shred_and_eat(row, &mut food, intake_ratio, intake, rng)
                } else {
                    eat(row, &food, intake, rng)
                }
            };
            candidates.push(candidate);
        }

        for candidate in candidates.iter_mut() {
            for (j, x) in candidate.iter_mut().enumerate() {
                *x = spec.clamp(j, *x);
            }
        }

        let candidate_fitness: Vec<f64> = candidates
            .par_iter()
            .map(|position| spec.evaluate(position))
            .collect();

        // The global best follows the candidates, accepted or not.
        self.global_best = best_of(&candidates, &candidate_fitness);

        for (row, fitness, candidate, &new_fitness) in izip!(
            self.population.iter_mut(),
            self.fitness.iter_mut(),
            candidates.iter(),
            candidate_fitness.iter()
        ) {
            if new_fitness < *fitness {
                *fitness = new_fitness;
                row.clone_from(candidate);
                if new_fitness < self.local_best.fitness {
                    self.local_best = Best {
                        fitness: new_fitness,
                        position: candidate.clone(),
                    };
                }
            }
        }

        self.candidates = candidates;
        self.global_best.fitness
    }

    pub fn population(&self) -> &[Vec<f64>] {
        &self.population
    }

    pub fn fitness(&self) -> &[f64] {
        &self.fitness
    }

    /// Candidates produced by the last call to [`Crayfish::step`].
    pub fn candidates(&self) -> &[Vec<f64>] {
        &self.candidates
    }

    pub fn local_best(&self) -> &Best {
        &self.local_best
    }

    pub fn global_best(&self) -> &Best {
        &self.global_best
    }

    pub fn into_local_best(self) -> Best {
        self.local_best
    }
}

/// Minimum of `fitness`, seeded from row 0 and replaced only on strict
/// improvement.
fn best_of(positions: &[Vec<f64>], fitness: &[f64]) -> Best {
    let mut best_index = 0;
    for (i, &value) in fitness.iter().enumerate().skip(1) {
        if value < fitness[best_index] {
            best_index = i;
        }
    }
    Best {
        fitness: fitness[best_index],
        position: positions[best_index].clone(),
    }
}

/// Runs the crayfish optimisation over a single work unit for its full
/// iteration budget.
#[instrument(skip_all, fields(function = %unit.function_name, rows = unit.size(), iterations = unit.iterations))]
pub fn optimize<R: Rng + ?Sized>(
    unit: WorkUnit,
    spec: &BenchmarkSpec,
    rng: &mut R,
) -> Result<PartitionResult, OptimizerError> {
    if unit.function_name != spec.name {
        return Err(OptimizerError::FunctionMismatch {
            expected: spec.name.clone(),
            got: unit.function_name,
        });
    }
    let iterations = unit.iterations;
    let partition = unit.partition;
    let mut swarm = Crayfish::new(spec, unit.sub_population)?;

    let convergence_curve: Vec<f64> = (0..iterations)
        .map(|t| swarm.step(t, iterations, rng))
        .collect();

    let best = swarm.into_local_best();
    debug!(best_fitness = best.fitness, "Partition optimised");

    Ok(PartitionResult {
        start_time: unit.start_time,
        best_fitness: best.fitness,
        best_position: best.position,
        convergence_curve,
        partition,
    })
}
