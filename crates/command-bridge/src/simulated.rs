//! Same-process backend: sidebar and page share one listener registry.

use std::sync::Arc;

use async_trait::async_trait;
use synapse_core_types::ContextRole;
use tracing::debug;

use crate::command::{Command, Delivery, SenderInfo, Target};
use crate::errors::BridgeError;
use crate::events::{BridgeEvent, BridgeEventBus};
use crate::registry::{CommandHandler, ListenerRegistry, Subscription};
use crate::{BackendKind, CommandBridge};

pub struct SimulatedBridge {
    registry: Arc<ListenerRegistry>,
    events: BridgeEventBus,
}

impl SimulatedBridge {
    pub fn new(events: BridgeEventBus) -> Arc<Self> {
        Arc::new(Self {
            registry: ListenerRegistry::new(),
            events,
        })
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Synchronous delivery. Handlers may call this re-entrantly.
    pub fn send_now(&self, command: &Command) -> Delivery {
        let action = command.action().to_string();
        let _ = self.events.send(BridgeEvent::CommandSent {
            from: ContextRole::Sidebar,
            action: action.clone(),
        });
        debug!(target: "bridge", %action, listeners = self.registry.len(), "simulated dispatch");

        let response = self.registry.dispatch(command, &SenderInfo::mock());
        let _ = self.events.send(BridgeEvent::CommandDelivered {
            action,
            acknowledged: response.is_some(),
        });
        Delivery::Delivered { response }
    }
}

#[async_trait]
impl CommandBridge for SimulatedBridge {
    fn backend(&self) -> BackendKind {
        BackendKind::Simulated
    }

    fn role(&self) -> ContextRole {
        ContextRole::Sidebar
    }

    async fn send(&self, command: Command, _target: Target) -> Result<Delivery, BridgeError> {
        // Single page in process: every target is the mounted page.
        Ok(self.send_now(&command))
    }

    fn on_command(&self, handler: Arc<dyn CommandHandler>) -> Subscription {
        self.registry.subscribe(handler)
    }
}
