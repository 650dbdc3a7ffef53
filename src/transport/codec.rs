use crate::messages::{PartitionResult, WorkUnit};
use crate::transport::TransportError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON encoding of the records that cross the queue boundary.
pub trait WireMessage: Serialize + DeserializeOwned + Sized {
    fn malformed(reason: String) -> TransportError;

    fn encode(&self) -> Result<String, TransportError> {
        serde_json::to_string(self).map_err(|e| TransportError::Failure(e.to_string()))
    }

    fn decode(body: &str) -> Result<Self, TransportError> {
        serde_json::from_str(body).map_err(|e| Self::malformed(e.to_string()))
    }
}

impl WireMessage for WorkUnit {
    fn malformed(reason: String) -> TransportError {
        TransportError::MalformedWorkUnit(reason)
    }
}

impl WireMessage for PartitionResult {
    fn malformed(reason: String) -> TransportError {
        TransportError::MalformedResult(reason)
    }
}
