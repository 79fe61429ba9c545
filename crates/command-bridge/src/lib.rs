//! Command bridge between the privileged sidebar and content scripts.
//!
//! Two backends share one contract: [`RuntimeBridge`] routes serialized
//! commands through an [`ExtensionRuntime`] into a tab's isolated context,
//! while [`SimulatedBridge`] delivers synchronously inside one process.
//! Delivery is at-most-once and fire-and-forget; callers that care about the
//! outcome read the acknowledgement carried in [`Delivery`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use synapse_core_types::ContextRole;

pub mod command;
pub mod errors;
pub mod events;
pub mod isolated;
pub mod probe;
pub mod registry;
pub mod runtime;
pub mod simulated;

pub use command::{Command, CommandResponse, Delivery, InjectionAck, SenderInfo, Target};
pub use errors::BridgeError;
pub use events::{event_bus, BridgeEvent, BridgeEventBus};
pub use isolated::RuntimeBridge;
pub use probe::{BridgeEnvironment, BridgeFactory, CapabilityProbe};
pub use registry::{CommandHandler, ListenerId, ListenerRegistry, Subscription};
pub use runtime::{ExtensionRuntime, NoopSwitcher, TabSwitcher, TabsRuntime};
pub use simulated::SimulatedBridge;

/// Backend selected by the capability probe.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Extension messaging across isolated contexts.
    Runtime,
    /// In-process delivery for development hosts.
    Simulated,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Runtime => "runtime",
            BackendKind::Simulated => "simulated",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait CommandBridge: Send + Sync {
    fn backend(&self) -> BackendKind;

    /// Context this handle belongs to.
    fn role(&self) -> ContextRole;

    /// Fire-and-forget send. Transport failures come back as
    /// [`Delivery::Dropped`]; `Err` is reserved for encoding problems.
    async fn send(&self, command: Command, target: Target) -> Result<Delivery, BridgeError>;

    /// Registers a listener in this context. Drop the returned handle to remove it.
    fn on_command(&self, handler: Arc<dyn CommandHandler>) -> Subscription;
}
