use std::time::Duration;

use command_bridge::BridgeError;
use synapse_core_types::SynapseError;
use thiserror::Error;

/// Failures of the external transform call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("API key missing")]
    MissingApiKey,
    #[error("transform request failed: {0}")]
    Request(String),
    #[error("no response generated")]
    Empty,
    #[error("transform timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// Stage failures; each one ends the run in ERROR.
#[derive(Debug, Error)]
pub enum PipeError {
    #[error("could not read context from {origin}: {reason}")]
    Extract { origin: String, reason: String },
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("could not focus {target}: {cause}")]
    Switch { target: String, cause: BridgeError },
    #[error("injection rejected by page: {0}")]
    Inject(String),
    #[error("submit rejected by page: {0}")]
    Submit(String),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("pipe run cancelled")]
    Cancelled,
    #[error("unknown pipe '{0}'")]
    UnknownPipe(String),
    #[error("invalid pipe catalog: {0}")]
    Catalog(String),
}

impl From<PipeError> for SynapseError {
    fn from(err: PipeError) -> Self {
        SynapseError::new(err.to_string())
    }
}

impl From<TransformError> for SynapseError {
    fn from(err: TransformError) -> Self {
        SynapseError::new(err.to_string())
    }
}
