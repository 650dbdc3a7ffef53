//! Queue boundary between the partitioner, the workers and the aggregator.
//!
//! The core only relies on at-least-once delivery with explicit
//! acknowledgement; any queue offering that (SQS, a broker, the in-memory
//! queue below) can sit behind these traits.
use crate::messages::{PartitionResult, WorkUnit};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod codec;
pub mod memory;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Malformed work unit: {0}")]
    MalformedWorkUnit(String),
    #[error("Malformed partition result: {0}")]
    MalformedResult(String),
    #[error("Transport failure: {0}")]
    Failure(String),
}

impl TransportError {
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            TransportError::MalformedWorkUnit(_) | TransportError::MalformedResult(_)
        )
    }
}

/// Handle needed to acknowledge (delete) a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Receipt(Uuid);

impl Receipt {
    pub fn new() -> Self {
        Receipt(Uuid::new_v4())
    }
}

impl Default for Receipt {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A received message. The payload has already been decoded; a decoding
/// failure still comes with its receipt so the consumer can drop it.
#[derive(Debug)]
pub struct Delivery<T> {
    pub receipt: Receipt,
    pub payload: Result<T, TransportError>,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn dispatch(&self, unit: WorkUnit) -> Result<(), TransportError>;
    /// Pulls at most one pending unit, `None` when the queue is empty.
    async fn receive_work(&self) -> Result<Option<Delivery<WorkUnit>>, TransportError>;
    async fn acknowledge(&self, receipt: &Receipt) -> Result<(), TransportError>;
}

#[async_trait]
pub trait ResultQueue: Send + Sync {
    async fn publish_result(&self, result: PartitionResult) -> Result<(), TransportError>;
    /// Pulls at most one pending result, `None` when the queue is empty.
    async fn receive_result(&self) -> Result<Option<Delivery<PartitionResult>>, TransportError>;
    async fn acknowledge(&self, receipt: &Receipt) -> Result<(), TransportError>;
}
