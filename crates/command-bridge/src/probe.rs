//! One-time capability detection and backend construction.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use synapse_core_types::{ContextRole, TabId};
use tracing::{info, warn};

use crate::errors::BridgeError;
use crate::events::{event_bus, BridgeEvent, BridgeEventBus};
use crate::isolated::RuntimeBridge;
use crate::runtime::ExtensionRuntime;
use crate::simulated::SimulatedBridge;
use crate::{BackendKind, CommandBridge};

/// What the host process exposes to the bridge.
#[derive(Clone, Default)]
pub struct BridgeEnvironment {
    pub runtime: Option<Arc<dyn ExtensionRuntime>>,
}

impl BridgeEnvironment {
    pub fn with_runtime(runtime: Arc<dyn ExtensionRuntime>) -> Self {
        Self {
            runtime: Some(runtime),
        }
    }

    pub fn detached() -> Self {
        Self::default()
    }
}

/// Decides the backend once and remembers it.
#[derive(Default)]
pub struct CapabilityProbe {
    decided: OnceCell<BackendKind>,
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes on first call; later calls return the cached answer even if the
    /// environment changes.
    pub fn detect(&self, env: &BridgeEnvironment) -> BackendKind {
        *self.decided.get_or_init(|| {
            let kind = if env.runtime.is_some() {
                BackendKind::Runtime
            } else {
                BackendKind::Simulated
            };
            info!(target: "bridge", backend = %kind, "bridge backend selected");
            kind
        })
    }

    pub fn decided(&self) -> Option<BackendKind> {
        self.decided.get().copied()
    }
}

/// Hands out bridge handles for the detected backend.
pub struct BridgeFactory {
    env: BridgeEnvironment,
    kind: BackendKind,
    events: BridgeEventBus,
    simulated: OnceCell<Arc<SimulatedBridge>>,
}

impl BridgeFactory {
    pub fn probe(probe: &CapabilityProbe, env: BridgeEnvironment) -> Self {
        let kind = probe.detect(&env);
        Self::with_kind(kind, env)
    }

    /// Skips probing. Asking for `Runtime` without a runtime degrades to simulated.
    pub fn with_kind(kind: BackendKind, env: BridgeEnvironment) -> Self {
        let kind = match (kind, env.runtime.is_some()) {
            (BackendKind::Runtime, false) => {
                warn!(target: "bridge", "runtime backend requested but unavailable; using simulated");
                BackendKind::Simulated
            }
            (kind, _) => kind,
        };
        let events = event_bus(64);
        let _ = events.send(BridgeEvent::BackendSelected { backend: kind });
        Self {
            env,
            kind,
            events,
            simulated: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn events(&self) -> BridgeEventBus {
        self.events.clone()
    }

    fn simulated(&self) -> Arc<SimulatedBridge> {
        Arc::clone(
            self.simulated
                .get_or_init(|| SimulatedBridge::new(self.events.clone())),
        )
    }

    fn runtime(&self) -> Result<Arc<dyn ExtensionRuntime>, BridgeError> {
        self.env
            .runtime
            .clone()
            .ok_or_else(|| BridgeError::Internal("runtime backend without runtime".into()))
    }

    /// Handle for the privileged side.
    pub fn sidebar(&self) -> Result<Arc<dyn CommandBridge>, BridgeError> {
        self.handle(ContextRole::Sidebar)
    }

    /// Handle for the content script in `tab`. The simulated backend has a
    /// single page, so the tab is ignored there.
    pub fn content_script(&self, tab: TabId) -> Result<Arc<dyn CommandBridge>, BridgeError> {
        self.handle(ContextRole::Tab(tab))
    }

    fn handle(&self, role: ContextRole) -> Result<Arc<dyn CommandBridge>, BridgeError> {
        let bridge: Arc<dyn CommandBridge> = match self.kind {
            BackendKind::Simulated => self.simulated(),
            BackendKind::Runtime => {
                RuntimeBridge::attach(self.runtime()?, role, self.events.clone())?
            }
        };
        Ok(bridge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TabsRuntime;

    #[test]
    fn probe_caches_first_answer() {
        let probe = CapabilityProbe::new();
        assert_eq!(probe.decided(), None);
        assert_eq!(
            probe.detect(&BridgeEnvironment::detached()),
            BackendKind::Simulated
        );
        let runtime: Arc<dyn ExtensionRuntime> = TabsRuntime::new();
        assert_eq!(
            probe.detect(&BridgeEnvironment::with_runtime(runtime)),
            BackendKind::Simulated
        );
    }

    #[test]
    fn runtime_request_without_runtime_degrades() {
        let factory = BridgeFactory::with_kind(BackendKind::Runtime, BridgeEnvironment::detached());
        assert_eq!(factory.kind(), BackendKind::Simulated);
        let sidebar = factory.sidebar().unwrap();
        assert_eq!(sidebar.backend(), BackendKind::Simulated);
    }

    #[test]
    fn unknown_tab_cannot_host_content_script() {
        let runtime: Arc<dyn ExtensionRuntime> = TabsRuntime::new();
        let factory = BridgeFactory::with_kind(
            BackendKind::Runtime,
            BridgeEnvironment::with_runtime(runtime),
        );
        assert!(matches!(
            factory.content_script(TabId(99)),
            Err(BridgeError::TabNotFound(TabId(99)))
        ));
    }
}
