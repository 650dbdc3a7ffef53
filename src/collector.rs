use crate::evolution::aggregator::{AggregateSummary, Aggregator};
use crate::transport::{Delivery, ResultQueue, TransportError};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// When the collector stops waiting for partition results.
///
/// Whichever limit is hit first ends collection. With no limit set at all
/// the collector only drains what is already queued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionPolicy {
    /// Stop once this many results were observed.
    pub expected: Option<usize>,
    /// Stop after the queue stayed empty this long.
    pub idle_timeout: Option<Duration>,
    /// Stop this long after collection started, whatever arrived.
    pub deadline: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        CompletionPolicy {
            expected: None,
            idle_timeout: Some(Duration::from_secs(30)),
            deadline: None,
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl CompletionPolicy {
    /// Waits for exactly `expected` results, however long it takes.
    pub fn expecting(expected: usize) -> Self {
        CompletionPolicy {
            expected: Some(expected),
            idle_timeout: None,
            ..Self::default()
        }
    }

    pub fn drain() -> Self {
        CompletionPolicy {
            expected: None,
            idle_timeout: None,
            deadline: None,
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn drain_only(&self) -> bool {
        self.expected.is_none() && self.idle_timeout.is_none() && self.deadline.is_none()
    }
}

/// Consumes partition results into a fresh [`Aggregator`] until `policy` says
/// to stop.
///
/// Malformed results are acknowledged and skipped; with `strict` the first
/// one aborts collection instead. A result carrying a partition index that was
/// already observed is a redelivered duplicate and is acknowledged unseen.
/// Missing results are not an error: the summary's `results_seen` tells how
/// many made it.
#[instrument(skip(queue))]
pub async fn collect_results<Q>(
    queue: &Q,
    policy: CompletionPolicy,
    strict: bool,
) -> Result<AggregateSummary, TransportError>
where
    Q: ResultQueue + ?Sized,
{
    let started = Instant::now();
    let mut last_activity = started;
    let mut aggregator = Aggregator::new();
    let mut skipped = 0usize;
    let mut observed = HashSet::new();

    loop {
        if matches!(policy.expected, Some(expected) if aggregator.results_seen() >= expected) {
            break;
        }
        if matches!(policy.deadline, Some(deadline) if started.elapsed() >= deadline) {
            warn!("Collection deadline reached");
            break;
        }

        match queue.receive_result().await? {
            Some(Delivery { receipt, payload }) => {
                last_activity = Instant::now();
                match payload {
                    Ok(result) if result.partition.is_some_and(|p| !observed.insert(p)) => {
                        queue.acknowledge(&receipt).await?;
                        debug!(partition = result.partition, "Skipping duplicate result");
                    }
                    Ok(result) => {
                        aggregator.observe(&result);
                        queue.acknowledge(&receipt).await?;
                        debug!(
                            seen = aggregator.results_seen(),
                            best_fitness = result.best_fitness,
                            "Result aggregated"
                        );
                    }
                    Err(e) => {
                        queue.acknowledge(&receipt).await?;
                        if strict {
                            return Err(e);
                        }
                        warn!(error = %e, "Skipping malformed result");
                        skipped += 1;
                    }
                }
            }
            None => {
                if policy.drain_only() {
                    break;
                }
                if matches!(policy.idle_timeout, Some(idle) if last_activity.elapsed() >= idle) {
                    warn!("No result arrived within the idle timeout");
                    break;
                }
                tokio::time::sleep(policy.poll_interval).await;
            }
        }
    }

    let summary = aggregator.finalize();
    if let Some(expected) = policy.expected {
        if summary.is_incomplete(expected) {
            warn!(
                expected,
                seen = summary.results_seen,
                skipped,
                "Run finished with missing partition results"
            );
        }
    }
    info!(
        overall_best_fitness = summary.overall_best_fitness,
        seen = summary.results_seen,
        "Collection finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::PartitionResult;
    use crate::transport::memory::InMemoryQueue;
    use chrono::Utc;

    fn result(best_fitness: f64, curve: Vec<f64>) -> PartitionResult {
        PartitionResult {
            start_time: Utc::now(),
            best_fitness,
            best_position: vec![best_fitness],
            convergence_curve: curve,
            partition: None,
        }
    }

    async fn queue_with(results: &[PartitionResult]) -> InMemoryQueue<PartitionResult> {
        let queue = InMemoryQueue::new();
        for r in results {
            queue.publish_result(r.clone()).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn stops_at_the_expected_count() {
        let queue = queue_with(&[
            result(5., vec![5., 5.]),
            result(3., vec![3., 3.]),
            result(1., vec![1., 1.]),
        ])
        .await;

        let summary = collect_results(&queue, CompletionPolicy::expecting(2), false)
            .await
            .unwrap();
        assert_eq!(summary.results_seen, 2);
        assert_eq!(summary.overall_best_fitness, 3.);
        assert_eq!(summary.overall_convergence, Some(vec![8., 8.]));
        assert_eq!(queue.pending().await, 1);
    }

    #[tokio::test]
    async fn drain_takes_whatever_is_queued() {
        let queue = queue_with(&[result(2., vec![2.]), result(4., vec![4.])]).await;
        let summary = collect_results(&queue, CompletionPolicy::drain(), false)
            .await
            .unwrap();
        assert_eq!(summary.results_seen, 2);
        assert_eq!(queue.pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_an_incomplete_run_short() {
        let queue = queue_with(&[result(2., vec![2.])]).await;
        let policy = CompletionPolicy::expecting(3).with_deadline(Some(Duration::from_secs(5)));

        let summary = collect_results(&queue, policy, false).await.unwrap();
        assert_eq!(summary.results_seen, 1);
        assert!(summary.is_incomplete(3));
        assert_eq!(summary.overall_best_fitness, 2.);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_ends_collection() {
        let queue = InMemoryQueue::<PartitionResult>::new();
        let policy = CompletionPolicy::default().with_idle_timeout(Some(Duration::from_secs(1)));
        let summary = collect_results(&queue, policy, false).await.unwrap();
        assert_eq!(summary.results_seen, 0);
        assert_eq!(summary.overall_best_fitness, f64::INFINITY);
    }

    #[tokio::test]
    async fn late_results_are_still_collected() {
        let queue = InMemoryQueue::<PartitionResult>::new();
        let producer = queue.clone();
        let publisher = tokio::spawn(async move {
            for fitness in [3., 1., 2.] {
                tokio::time::sleep(Duration::from_millis(5)).await;
                producer.publish_result(result(fitness, vec![fitness])).await.unwrap();
            }
        });

        let policy = CompletionPolicy::expecting(3).with_poll_interval(Duration::from_millis(1));
        let summary = collect_results(&queue, policy, false).await.unwrap();
        publisher.await.unwrap();
        assert_eq!(summary.results_seen, 3);
        assert_eq!(summary.overall_best_fitness, 1.);
        assert_eq!(summary.overall_convergence, Some(vec![6.]));
    }

    #[tokio::test]
    async fn redelivered_partitions_count_once() {
        let tagged = |partition, fitness: f64| PartitionResult {
            partition: Some(partition),
            ..result(fitness, vec![fitness])
        };
        let queue = queue_with(&[
            tagged(0, 4.),
            tagged(1, 2.),
            tagged(0, 1.),
            result(3., vec![3.]),
            result(3., vec![3.]),
        ])
        .await;

        let summary = collect_results(&queue, CompletionPolicy::expecting(4), false)
            .await
            .unwrap();
        // Untagged results cannot be told apart and are all counted.
        assert_eq!(summary.results_seen, 4);
        assert_eq!(summary.overall_best_fitness, 2.);
        assert_eq!(summary.overall_convergence, Some(vec![12.]));
        assert_eq!(queue.pending().await, 0);
    }

    #[tokio::test]
    async fn malformed_results_are_skipped_unless_strict() {
        let queue = queue_with(&[result(3., vec![3.])]).await;
        queue.push_raw("{\"bestFitness\": []}").await;
        queue.publish_result(result(1., vec![1.])).await.unwrap();

        let summary = collect_results(&queue, CompletionPolicy::drain(), false)
            .await
            .unwrap();
        assert_eq!(summary.results_seen, 2);
        assert_eq!(summary.overall_best_fitness, 1.);
        assert_eq!(queue.pending().await, 0);

        let queue = queue_with(&[result(3., vec![3.])]).await;
        queue.push_raw("not json at all").await;
        let err = collect_results(&queue, CompletionPolicy::drain(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MalformedResult(_)));
    }
}
