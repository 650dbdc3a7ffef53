use crate::messages::{PartitionResult, WorkUnit};
use crate::transport::codec::WireMessage;
use crate::transport::{Delivery, Receipt, ResultQueue, TransportError, WorkQueue};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct InFlight {
    body: String,
    visible_again_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<String>,
    in_flight: HashMap<Receipt, InFlight>,
}

impl QueueState {
    // Messages whose visibility timeout ran out without an acknowledgement
    // go back to the front of the queue.
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<Receipt> = self
            .in_flight
            .iter()
            .filter(|(_, message)| message.visible_again_at <= now)
            .map(|(receipt, _)| *receipt)
            .collect();
        for receipt in expired {
            if let Some(message) = self.in_flight.remove(&receipt) {
                debug!(%receipt, "Visibility timeout expired, redelivering");
                self.ready.push_front(message.body);
            }
        }
    }
}

/// Process-local queue with at-least-once semantics: a received message stays
/// hidden until it is acknowledged or its visibility timeout runs out, after
/// which it is delivered again. Bodies are kept as JSON so the same codec runs
/// as with an external queue.
pub struct InMemoryQueue<T> {
    state: Arc<Mutex<QueueState>>,
    visibility_timeout: Duration,
    _message: PhantomData<fn() -> T>,
}

impl<T> Clone for InMemoryQueue<T> {
    fn clone(&self) -> Self {
        InMemoryQueue {
            state: Arc::clone(&self.state),
            visibility_timeout: self.visibility_timeout,
            _message: PhantomData,
        }
    }
}

impl<T: WireMessage> Default for InMemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WireMessage> InMemoryQueue<T> {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        InMemoryQueue {
            state: Arc::new(Mutex::new(QueueState::default())),
            visibility_timeout,
            _message: PhantomData,
        }
    }

    /// Messages not yet acknowledged, whether waiting or in flight.
    pub async fn pending(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.in_flight.len()
    }

    /// Enqueues an already encoded body as is.
    pub async fn push_raw(&self, body: impl Into<String>) {
        self.state.lock().await.ready.push_back(body.into());
    }

    async fn send(&self, message: &T) -> Result<(), TransportError> {
        let body = message.encode()?;
        self.push_raw(body).await;
        Ok(())
    }

    async fn receive(&self) -> Option<Delivery<T>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.requeue_expired(now);

        let body = state.ready.pop_front()?;
        let receipt = Receipt::new();
        let payload = T::decode(&body);
        state.in_flight.insert(
            receipt,
            InFlight {
                body,
                visible_again_at: now + self.visibility_timeout,
            },
        );
        Some(Delivery { receipt, payload })
    }

    async fn delete(&self, receipt: &Receipt) -> Result<(), TransportError> {
        match self.state.lock().await.in_flight.remove(receipt) {
            Some(_) => Ok(()),
            None => Err(TransportError::Failure(format!(
                "Unknown or expired receipt {}",
                receipt
            ))),
        }
    }
}

#[async_trait]
impl WorkQueue for InMemoryQueue<WorkUnit> {
    async fn dispatch(&self, unit: WorkUnit) -> Result<(), TransportError> {
        self.send(&unit).await
    }

    async fn receive_work(&self) -> Result<Option<Delivery<WorkUnit>>, TransportError> {
        Ok(self.receive().await)
    }

    async fn acknowledge(&self, receipt: &Receipt) -> Result<(), TransportError> {
        self.delete(receipt).await
    }
}

#[async_trait]
impl ResultQueue for InMemoryQueue<PartitionResult> {
    async fn publish_result(&self, result: PartitionResult) -> Result<(), TransportError> {
        self.send(&result).await
    }

    async fn receive_result(&self) -> Result<Option<Delivery<PartitionResult>>, TransportError> {
        Ok(self.receive().await)
    }

    async fn acknowledge(&self, receipt: &Receipt) -> Result<(), TransportError> {
        self.delete(receipt).await
    }
}
