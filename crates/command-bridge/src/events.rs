use serde::{Deserialize, Serialize};
use synapse_core_types::ContextRole;
use tokio::sync::broadcast;

use crate::BackendKind;

/// Channel observers subscribe to.
pub type BridgeEventBus = broadcast::Sender<BridgeEvent>;

pub fn event_bus(capacity: usize) -> BridgeEventBus {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    tx
}

/// Events emitted by the bridge to observers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum BridgeEvent {
    BackendSelected {
        backend: BackendKind,
    },
    CommandSent {
        from: ContextRole,
        action: String,
    },
    CommandDelivered {
        action: String,
        acknowledged: bool,
    },
    CommandDropped {
        action: String,
        reason: String,
    },
}
