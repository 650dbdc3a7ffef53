use crate::benchmarks::{BenchmarkRegistry, BenchmarkSpec};
use crate::evolution::partitioner::{PartitionError, PopulationSampling};
use crate::evolution::runner::RunError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

/// Where the partitions of a run get optimised.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
pub enum RunnerStrategy {
    /// Every partition in this process on the rayon pool.
    #[default]
    Local,
    /// Partitions go through a work queue to a pool of workers and come back
    /// through a result queue.
    Queued,
}

/// Parameters of one optimisation run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct RunConfig {
    /// Total number of crayfish (N).
    pub population_size: usize,
    /// Number of partitions (k), one work unit each.
    pub partitions: usize,
    /// Iterations every partition runs (T).
    pub iterations: usize,
    pub function_name: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub sampling: PopulationSampling,
    #[serde(default)]
    pub runner: RunnerStrategy,
    /// Fail the run on the first malformed message or failing partition
    /// instead of skipping it.
    #[serde(default)]
    pub strict: bool,
    /// Upper bound on how long the queued runner waits for results.
    #[serde(default)]
    pub collect_timeout_secs: Option<u64>,
}

impl RunConfig {
    pub fn new(
        population_size: usize,
        partitions: usize,
        iterations: usize,
        function_name: impl Into<String>,
    ) -> Self {
        RunConfig {
            population_size,
            partitions,
            iterations,
            function_name: function_name.into(),
            seed: None,
            max_concurrency: default_max_concurrency(),
            sampling: PopulationSampling::default(),
            runner: RunnerStrategy::default(),
            strict: false,
            collect_timeout_secs: None,
        }
    }

    /// Checks the run can go ahead and hands back the benchmark it targets.
    /// Nothing gets generated or dispatched before this passes.
    pub fn validate<'r>(
        &self,
        registry: &'r BenchmarkRegistry,
    ) -> Result<&'r BenchmarkSpec, RunError> {
        if self.population_size == 0 {
            return Err(PartitionError::EmptyPopulation.into());
        }
        if self.partitions == 0 || self.partitions > self.population_size {
            return Err(PartitionError::InvalidPartitionCount {
                partitions: self.partitions,
                population: self.population_size,
            }
            .into());
        }
        if self.max_concurrency == 0 {
            return Err(RunError::InvalidConfig(
                "max_concurrency must be at least 1".into(),
            ));
        }
        Ok(registry.lookup(&self.function_name)?)
    }

    pub fn collect_timeout(&self) -> Option<Duration> {
        self.collect_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Environment variable {key} has an invalid value `{value}`.")]
    InvalidValue { key: String, value: String },
}

/// Settings of the HTTP service, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub log_level: String,
    /// Upper bound on the threads or workers a single run may use.
    pub workers: usize,
    pub collect_timeout: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            workers: default_max_concurrency(),
            collect_timeout: None,
        }
    }
}

impl ServiceConfig {
    /// Loads `.env` (if any) and then reads the `CRAYFISH_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(bind_addr) = lookup("CRAYFISH_BIND_ADDR") {
            config.bind_addr = bind_addr;
        }
        if let Some(log_level) = lookup("CRAYFISH_LOG_LEVEL") {
            config.log_level = log_level;
        }
        if let Some(workers) = lookup("CRAYFISH_WORKERS") {
            config.workers = parse_positive("CRAYFISH_WORKERS", &workers)?;
        }
        if let Some(timeout) = lookup("CRAYFISH_COLLECT_TIMEOUT_SECS") {
            let secs = parse_positive("CRAYFISH_COLLECT_TIMEOUT_SECS", &timeout)?;
            config.collect_timeout = Some(Duration::from_secs(secs as u64));
        }
        Ok(config)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
