use synapse_core_types::{SynapseError, TabId};
use thiserror::Error;

/// Errors surfaced by the bridge.
#[derive(Clone, Debug, Error)]
pub enum BridgeError {
    #[error("no active tab")]
    NoActiveTab,
    #[error("no tab matches '{0}'")]
    NoMatchingTab(String),
    #[error("{0} is not open")]
    TabNotFound(TabId),
    #[error("could not establish connection: no receiving end in {0}")]
    NoReceiver(TabId),
    #[error("channel closed")]
    ChannelClosed,
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Transport-level failures the sender swallows under the at-most-once contract.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BridgeError::NoActiveTab
                | BridgeError::TabNotFound(_)
                | BridgeError::NoReceiver(_)
                | BridgeError::ChannelClosed
        )
    }
}

impl From<BridgeError> for SynapseError {
    fn from(err: BridgeError) -> Self {
        SynapseError::new(err.to_string())
    }
}
