use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod functions;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BenchmarkError {
    #[error("Benchmark function `{0}` is not registered.")]
    UnknownFunction(String),
    #[error("Invalid benchmark definition for `{name}`: {reason}")]
    InvalidDefinition { name: String, reason: String },
}

/// The closed set of objective functions a benchmark can evaluate.
/// Lower is better for every one of them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BenchmarkFunction {
    Sphere,
    Schwefel222,
    Schwefel12,
    Schwefel221,
    Rosenbrock,
    Step,
    Quartic,
    Schwefel226,
    Rastrigin,
    Ackley,
    Griewank,
    SixHumpCamel,
    Branin,
    GoldsteinPrice,
}

impl BenchmarkFunction {
    pub fn evaluate(&self, position: &[f64]) -> f64 {
        match self {
            BenchmarkFunction::Sphere => functions::sphere(position),
            BenchmarkFunction::Schwefel222 => functions::schwefel_2_22(position),
            BenchmarkFunction::Schwefel12 => functions::schwefel_1_2(position),
            BenchmarkFunction::Schwefel221 => functions::schwefel_2_21(position),
            BenchmarkFunction::Rosenbrock => functions::rosenbrock(position),
            BenchmarkFunction::Step => functions::step(position),
            BenchmarkFunction::Quartic => functions::quartic(position),
            BenchmarkFunction::Schwefel226 => functions::schwefel_2_26(position),
            BenchmarkFunction::Rastrigin => functions::rastrigin(position),
            BenchmarkFunction::Ackley => functions::ackley(position),
            BenchmarkFunction::Griewank => functions::griewank(position),
            BenchmarkFunction::SixHumpCamel => functions::six_hump_camel(position),
            BenchmarkFunction::Branin => functions::branin(position),
            BenchmarkFunction::GoldsteinPrice => functions::goldstein_price(position),
        }
    }

    /// Smallest number of coordinates the function reads.
    fn minimum_dimension(&self) -> usize {
        match self {
            BenchmarkFunction::SixHumpCamel
            | BenchmarkFunction::Branin
            | BenchmarkFunction::GoldsteinPrice => 2,
            _ => 1,
        }
    }
}

/// A named objective together with its search box.
///
/// Bounds are either a single value, broadcast to every dimension, or one
/// value per dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkSpec {
    pub name: String,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
    pub dimension: usize,
    pub function: BenchmarkFunction,
}

impl BenchmarkSpec {
    pub fn new(
        name: impl Into<String>,
        lower_bound: Vec<f64>,
        upper_bound: Vec<f64>,
        dimension: usize,
        function: BenchmarkFunction,
    ) -> Result<Self, BenchmarkError> {
        let name = name.into();
        let invalid = |reason: String| BenchmarkError::InvalidDefinition {
            name: name.clone(),
            reason,
        };

        if dimension < function.minimum_dimension() {
            return Err(invalid(format!(
                "{:?} needs at least {} dimensions, got {}",
                function,
                function.minimum_dimension(),
                dimension
            )));
        }
        for (label, bound) in [("lower", &lower_bound), ("upper", &upper_bound)] {
            if bound.len() != 1 && bound.len() != dimension {
                return Err(invalid(format!(
                    "{} bound must have 1 or {} entries, got {}",
                    label,
                    dimension,
                    bound.len()
                )));
            }
        }
        for j in 0..dimension {
            let (lo, hi) = (broadcast(&lower_bound, j), broadcast(&upper_bound, j));
            if lo > hi {
                return Err(invalid(format!(
                    "lower bound {} exceeds upper bound {} at index {}",
                    lo, hi, j
                )));
            }
        }

        Ok(BenchmarkSpec {
            name,
            lower_bound,
            upper_bound,
            dimension,
            function,
        })
    }

    fn scalar(
        name: &str,
        lower: f64,
        upper: f64,
        dimension: usize,
        function: BenchmarkFunction,
    ) -> Self {
        BenchmarkSpec {
            name: name.to_string(),
            lower_bound: vec![lower],
            upper_bound: vec![upper],
            dimension,
            function,
        }
    }

    pub fn evaluate(&self, position: &[f64]) -> f64 {
        self.function.evaluate(position)
    }

    /// Lower bound of dimension `j`, broadcasting a single-entry bound.
    pub fn lower(&self, j: usize) -> f64 {
        broadcast(&self.lower_bound, j)
    }

    /// Upper bound of dimension `j`, broadcasting a single-entry bound.
    pub fn upper(&self, j: usize) -> f64 {
        broadcast(&self.upper_bound, j)
    }

    /// Boundary repair of a single coordinate.
    pub fn clamp(&self, j: usize, value: f64) -> f64 {
        value.min(self.upper(j)).max(self.lower(j))
    }

    pub fn contains(&self, position: &[f64]) -> bool {
        position
            .iter()
            .enumerate()
            .all(|(j, &x)| x >= self.lower(j) && x <= self.upper(j))
    }
}

fn broadcast(bound: &[f64], j: usize) -> f64 {
    if bound.len() == 1 {
        bound[0]
    } else {
        bound[j]
    }
}

/// Read-only lookup table from function name to benchmark definition.
#[derive(Clone, Debug, Default)]
pub struct BenchmarkRegistry {
    specs: BTreeMap<String, BenchmarkSpec>,
}

impl BenchmarkRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The classic F1-F11 and F16-F18 suite.
    pub fn standard() -> Self {
        use BenchmarkFunction::*;
        let mut registry = Self::empty();
        for spec in [
            BenchmarkSpec::scalar("F1", -100., 100., 30, Sphere),
            BenchmarkSpec::scalar("F2", -10., 10., 30, Schwefel222),
            BenchmarkSpec::scalar("F3", -100., 100., 30, Schwefel12),
            BenchmarkSpec::scalar("F4", -100., 100., 30, Schwefel221),
            BenchmarkSpec::scalar("F5", -30., 30., 30, Rosenbrock),
            BenchmarkSpec::scalar("F6", -100., 100., 30, Step),
            BenchmarkSpec::scalar("F7", -1.28, 1.28, 30, Quartic),
            BenchmarkSpec::scalar("F8", -500., 500., 30, Schwefel226),
            BenchmarkSpec::scalar("F9", -5.12, 5.12, 30, Rastrigin),
            BenchmarkSpec::scalar("F10", -32., 32., 30, Ackley),
            BenchmarkSpec::scalar("F11", -600., 600., 30, Griewank),
            BenchmarkSpec::scalar("F16", -5., 5., 2, SixHumpCamel),
            BenchmarkSpec {
                name: "F17".to_string(),
                lower_bound: vec![-5., 0.],
                upper_bound: vec![10., 15.],
                dimension: 2,
                function: Branin,
            },
            BenchmarkSpec::scalar("F18", -2., 2., 2, GoldsteinPrice),
        ] {
            registry.register(spec);
        }
        registry
    }

    /// Adds (or replaces) an entry, keyed by its name.
    pub fn register(&mut self, spec: BenchmarkSpec) -> &mut Self {
        self.specs.insert(spec.name.clone(), spec);
        self
    }

    pub fn lookup(&self, name: &str) -> Result<&BenchmarkSpec, BenchmarkError> {
        self.specs
            .get(name)
            .ok_or_else(|| BenchmarkError::UnknownFunction(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }
}

static DEFAULT_REGISTRY: Lazy<BenchmarkRegistry> = Lazy::new(BenchmarkRegistry::standard);

/// Shared immutable instance of [`BenchmarkRegistry::standard`].
pub fn default_registry() -> &'static BenchmarkRegistry {
    &DEFAULT_REGISTRY
}
