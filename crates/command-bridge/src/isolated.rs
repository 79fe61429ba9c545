//! Backend over an [`ExtensionRuntime`]: every hop is serialized.

use std::sync::Arc;

use async_trait::async_trait;
use synapse_core_types::ContextRole;
use tracing::{debug, warn};

use crate::command::{Command, CommandResponse, Delivery, SenderInfo, Target};
use crate::errors::BridgeError;
use crate::events::{BridgeEvent, BridgeEventBus};
use crate::registry::{CommandHandler, ListenerRegistry, Subscription};
use crate::runtime::ExtensionRuntime;
use crate::{BackendKind, CommandBridge};

pub struct RuntimeBridge {
    runtime: Arc<dyn ExtensionRuntime>,
    role: ContextRole,
    registry: Arc<ListenerRegistry>,
    events: BridgeEventBus,
}

impl RuntimeBridge {
    /// Binds a handle to `role`. Fails when that context is not hosted by the runtime.
    pub fn attach(
        runtime: Arc<dyn ExtensionRuntime>,
        role: ContextRole,
        events: BridgeEventBus,
    ) -> Result<Arc<Self>, BridgeError> {
        let registry = runtime.listeners(role).ok_or(match role {
            ContextRole::Tab(tab) => BridgeError::TabNotFound(tab),
            ContextRole::Sidebar => BridgeError::Internal("runtime has no sidebar".into()),
        })?;
        Ok(Arc::new(Self {
            runtime,
            role,
            registry,
            events,
        }))
    }

    fn sender(&self) -> SenderInfo {
        SenderInfo::new(format!("synapse:{}", self.role), self.role)
    }

    fn dropped(&self, action: &str, reason: String) -> Delivery {
        let _ = self.events.send(BridgeEvent::CommandDropped {
            action: action.to_string(),
            reason: reason.clone(),
        });
        Delivery::Dropped { reason }
    }
}

#[async_trait]
impl CommandBridge for RuntimeBridge {
    fn backend(&self) -> BackendKind {
        BackendKind::Runtime
    }

    fn role(&self) -> ContextRole {
        self.role
    }

    async fn send(&self, command: Command, target: Target) -> Result<Delivery, BridgeError> {
        let action = command.action();
        let tab = match target {
            Target::Tab(tab) => tab,
            Target::ActiveTab => match self.runtime.active_tab().await {
                Some(tab) => tab,
                None => {
                    warn!(target: "bridge", action, "no active tab; command dropped");
                    return Ok(self.dropped(action, BridgeError::NoActiveTab.to_string()));
                }
            },
        };

        let message = command.to_wire()?;
        let _ = self.events.send(BridgeEvent::CommandSent {
            from: self.role,
            action: action.to_string(),
        });
        debug!(target: "bridge", action, %tab, "sending command");

        match self.runtime.send_to_tab(tab, self.sender(), message).await {
            Ok(reply) => {
                let response = match reply {
                    Some(value) => Some(CommandResponse::from_wire(value)?),
                    None => None,
                };
                let _ = self.events.send(BridgeEvent::CommandDelivered {
                    action: action.to_string(),
                    acknowledged: response.is_some(),
                });
                Ok(Delivery::Delivered { response })
            }
            Err(err) if err.is_transport() => {
                warn!(target: "bridge", action, %tab, error = %err, "command dropped");
                Ok(self.dropped(action, err.to_string()))
            }
            Err(err) => Err(err),
        }
    }

    fn on_command(&self, handler: Arc<dyn CommandHandler>) -> Subscription {
        self.registry.subscribe(handler)
    }
}
