use crate::messages::PartitionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;
use utoipa::ToSchema;

/// Snapshot of everything the aggregator has seen so far.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct AggregateSummary {
    /// Lowest best-fitness reported by any partition (`+inf` when nothing was observed).
    pub overall_best_fitness: f64,
    pub overall_best_position: Option<Vec<f64>>,
    /// Element-wise sum of every observed convergence curve.
    pub overall_convergence: Option<Vec<f64>>,
    pub results_seen: usize,
    /// Earliest start time carried by the observed results.
    #[schema(value_type = Option<String>)]
    pub started_at: Option<DateTime<Utc>>,
}

impl AggregateSummary {
    /// True when fewer results than `expected` made it into the summary.
    pub fn is_incomplete(&self, expected: usize) -> bool {
        self.results_seen < expected
    }
}

/// Reduces partition results into a single global answer.
///
/// The reduction is a min for the best fitness and a sum for the convergence
/// curves, so the final state does not depend on the order results arrive
/// in. Curve values are kept per iteration and added in ascending order when
/// the summary is built, which makes the floating-point sum independent of
/// arrival order too. Nothing is deduplicated: observing the same result
/// twice counts it twice.
#[derive(Debug, Clone)]
pub struct Aggregator {
    overall_best_fitness: f64,
    overall_best_position: Option<Vec<f64>>,
    // contributions[t] holds every curve value observed for iteration t.
    contributions: Option<Vec<Vec<f64>>>,
    results_seen: usize,
    started_at: Option<DateTime<Utc>>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator {
            overall_best_fitness: f64::INFINITY,
            overall_best_position: None,
            contributions: None,
            results_seen: 0,
            started_at: None,
        }
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a PartitionResult>,
    {
        let mut aggregator = Self::new();
        results
            .into_iter()
            .for_each(|result| aggregator.observe(result));
        aggregator
    }

    pub fn observe(&mut self, result: &PartitionResult) {
        if self.improves_best(result) {
            self.overall_best_fitness = result.best_fitness;
            self.overall_best_position = Some(result.best_position.clone());
        }

        let contributions = self
            .contributions
            .get_or_insert_with(|| vec![Vec::new(); result.convergence_curve.len()]);
        if contributions.len() != result.convergence_curve.len() {
            warn!(
                expected = contributions.len(),
                got = result.convergence_curve.len(),
                "Convergence curve length differs from earlier results"
            );
            if contributions.len() < result.convergence_curve.len() {
                contributions.resize(result.convergence_curve.len(), Vec::new());
            }
        }
        contributions
            .iter_mut()
            .zip(&result.convergence_curve)
            .for_each(|(values, &value)| values.push(value));

        self.started_at = Some(match self.started_at {
            Some(earliest) => earliest.min(result.start_time),
            None => result.start_time,
        });
        self.results_seen += 1;
    }

    // Equal fitness values are settled by comparing positions so that the
    // winner does not depend on arrival order.
    fn improves_best(&self, result: &PartitionResult) -> bool {
        if result.best_fitness < self.overall_best_fitness {
            return true;
        }
        match &self.overall_best_position {
            Some(current) if result.best_fitness == self.overall_best_fitness => {
                compare_positions(&result.best_position, current) == Ordering::Less
            }
            _ => false,
        }
    }

    pub fn results_seen(&self) -> usize {
        self.results_seen
    }

    pub fn finalize(&self) -> AggregateSummary {
        AggregateSummary {
            overall_best_fitness: self.overall_best_fitness,
            overall_best_position: self.overall_best_position.clone(),
            overall_convergence: self
                .contributions
                .as_ref()
                .map(|contributions| {
                    contributions
                        .iter()
                        .map(|values| ordered_sum(values))
                        .collect()
                }),
            results_seen: self.results_seen,
            started_at: self.started_at,
        }
    }
}

// Indices no result reached sum to zero.
fn ordered_sum(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.iter().sum()
}

fn compare_positions(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

impl Extend<PartitionResult> for Aggregator {
    fn extend<T: IntoIterator<Item = PartitionResult>>(&mut self, iter: T) {
        iter.into_iter().for_each(|result| self.observe(&result));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn result(best_fitness: f64, position: Vec<f64>, curve: Vec<f64>) -> PartitionResult {
        PartitionResult {
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 1, 1, 1).unwrap(),
            best_fitness,
            best_position: position,
            convergence_curve: curve,
            partition: None,
        }
    }

    fn permutations(items: &[PartitionResult]) -> Vec<Vec<PartitionResult>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut all = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head.clone());
                all.push(tail);
            }
        }
        all
    }

    #[test]
    fn two_results_scenario() {
        let mut aggregator = Aggregator::new();
        aggregator.observe(&result(5., vec![5., 5.], vec![5., 5.]));
        aggregator.observe(&result(3., vec![3., 3.], vec![3., 3.]));

        let summary = aggregator.finalize();
        assert_eq!(summary.overall_best_fitness, 3.);
        assert_eq!(summary.overall_best_position, Some(vec![3., 3.]));
        assert_eq!(summary.overall_convergence, Some(vec![8., 8.]));
        assert_eq!(summary.results_seen, 2);
    }

    #[test]
    fn fresh_aggregator_reports_nothing() {
        let summary = Aggregator::new().finalize();
        assert_eq!(summary.overall_best_fitness, f64::INFINITY);
        assert_eq!(summary.overall_best_position, None);
        assert_eq!(summary.overall_convergence, None);
        assert_eq!(summary.results_seen, 0);
        assert!(summary.is_incomplete(1));
    }

    #[test]
    fn first_curve_is_accumulated() {
        let summary = Aggregator::from_results(&[result(1., vec![0.], vec![4., 2., 1.])]).finalize();
        assert_eq!(summary.overall_convergence, Some(vec![4., 2., 1.]));
    }

    #[test]
    fn order_does_not_matter() {
        let results = vec![
            result(4.25, vec![1., 2.], vec![9., 6., 4.25]),
            result(0.5, vec![0.1, 0.2], vec![3., 1., 0.5]),
            result(2., vec![7., 8.], vec![2., 2., 2.]),
            result(0.5, vec![9., 9.], vec![1., 0.75, 0.5]),
        ];
        let reference = Aggregator::from_results(&results).finalize();
        for permutation in permutations(&results) {
            let summary = Aggregator::from_results(&permutation).finalize();
            assert_eq!(summary.overall_best_fitness, reference.overall_best_fitness);
            assert_eq!(summary.overall_best_position, reference.overall_best_position);
            assert_eq!(summary.overall_convergence, reference.overall_convergence);
            assert_eq!(summary.results_seen, reference.results_seen);
        }
    }

    #[test]
    fn curve_sums_do_not_depend_on_arrival_order() {
        let results = vec![
            result(0.1, vec![0.1], vec![0.1, 1e16, 0.7]),
            result(0.2, vec![0.2], vec![0.2, 1., 0.1]),
            result(0.3, vec![0.3], vec![0.3, -1e16, 0.3]),
            result(0.4, vec![0.4], vec![0.7, 1., 1.1]),
        ];
        let reference = Aggregator::from_results(&results)
            .finalize()
            .overall_convergence
            .unwrap();
        for permutation in permutations(&results) {
            let curve = Aggregator::from_results(&permutation)
                .finalize()
                .overall_convergence
                .unwrap();
            assert_eq!(curve, reference);
        }

        let forward = Aggregator::from_results(&results[..3]).finalize();
        let backward = Aggregator::from_results(results[..3].iter().rev()).finalize();
        assert_eq!(forward.overall_convergence, backward.overall_convergence);
    }

    #[test]
    fn tied_fitness_picks_the_smaller_position() {
        let a = result(0.5, vec![0.1, 0.2], vec![0.5]);
        let b = result(0.5, vec![0.1, -0.2], vec![0.5]);
        for ordered in [[a.clone(), b.clone()], [b.clone(), a.clone()]] {
            let summary = Aggregator::from_results(&ordered).finalize();
            assert_eq!(summary.overall_best_position, Some(vec![0.1, -0.2]));
        }
    }

    #[test]
    fn convergence_is_the_element_wise_sum() {
        let curves = vec![
            vec![10., 8., 7., 7.],
            vec![3., 3., 2.5, 1.],
            vec![6., 5., 4., 3.],
        ];
        let mut aggregator = Aggregator::new();
        aggregator.extend(curves.iter().map(|c| result(c[3], vec![0.], c.clone())));
        let overall = aggregator.finalize().overall_convergence.unwrap();
        for t in 0..4 {
            let expected: f64 = curves.iter().map(|c| c[t]).sum();
            assert_eq!(overall[t], expected);
        }
    }

    #[test]
    fn duplicates_are_double_counted() {
        let r = result(1., vec![0.], vec![1., 1.]);
        let summary = Aggregator::from_results(&[r.clone(), r]).finalize();
        assert_eq!(summary.overall_convergence, Some(vec![2., 2.]));
        assert_eq!(summary.results_seen, 2);
    }

    #[test]
    fn mismatched_curves_extend_the_accumulator() {
        let mut aggregator = Aggregator::new();
        aggregator.observe(&result(1., vec![0.], vec![1., 1.]));
        aggregator.observe(&result(2., vec![0.], vec![1., 1., 1.]));
        aggregator.observe(&result(3., vec![0.], vec![1.]));
        assert_eq!(aggregator.finalize().overall_convergence, Some(vec![3., 2., 1.]));
    }

    #[test]
    fn earliest_start_time_is_kept() {
        let early = result(1., vec![0.], vec![1.]);
        let mut late = early.clone();
        late.start_time = early.start_time + Duration::seconds(30);
        let summary = Aggregator::from_results(&[late, early.clone()]).finalize();
        assert_eq!(summary.started_at, Some(early.start_time));
    }
}
