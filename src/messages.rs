use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One partition job: a slice of the population plus everything a worker
/// needs to optimise it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkUnit {
    #[serde(alias = "SubPopulation")]
    pub sub_population: Vec<Vec<f64>>,
    #[serde(alias = "T")]
    pub iterations: usize,
    #[serde(alias = "F")]
    pub function_name: String,
    #[serde(alias = "StartTime")]
    pub start_time: DateTime<Utc>,
    /// Index of the partition within its run, carried over to the result so
    /// redelivered copies can be recognised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<usize>,
}

impl WorkUnit {
    pub fn size(&self) -> usize {
        self.sub_population.len()
    }
}

/// What a worker reports back for a single [`WorkUnit`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PartitionResult {
    #[serde(alias = "StartTime")]
    pub start_time: DateTime<Utc>,
    #[serde(alias = "BestFit", deserialize_with = "fitness_or_infinity")]
    pub best_fitness: f64,
    #[serde(alias = "BestPos")]
    pub best_position: Vec<f64>,
    #[serde(alias = "GlobalCov", deserialize_with = "curve_or_infinity")]
    pub convergence_curve: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<usize>,
}

// serde_json writes non-finite floats as `null`; the only non-finite value a
// fitness can sensibly carry here is +inf (nothing evaluated yet / overflow).
fn fitness_or_infinity<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
}

fn curve_or_infinity<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Vec::<Option<f64>>::deserialize(deserializer)?
        .into_iter()
        .map(|value| value.unwrap_or(f64::INFINITY))
        .collect())
}
