//! Privileged messaging capability and an in-process implementation of it.
//!
//! `TabsRuntime` gives every tab its own task and inbox. Commands cross the
//! boundary as JSON values, so a tab never shares memory with the sender.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use synapse_core_types::{ContextRole, TabId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::command::{Command, SenderInfo};
use crate::errors::BridgeError;
use crate::registry::ListenerRegistry;

const TAB_INBOX_CAPACITY: usize = 64;

/// Tab-messaging API available to a privileged extension context.
#[async_trait]
pub trait ExtensionRuntime: Send + Sync {
    async fn active_tab(&self) -> Option<TabId>;

    /// Delivers a serialized command into the tab's isolated channel and
    /// returns the serialized acknowledgement, if any.
    async fn send_to_tab(
        &self,
        tab: TabId,
        sender: SenderInfo,
        message: Value,
    ) -> Result<Option<Value>, BridgeError>;

    /// Listener table owned by a context, for `onMessage`-style registration.
    fn listeners(&self, role: ContextRole) -> Option<Arc<ListenerRegistry>>;
}

/// Brings the context hosting `target` to the foreground.
#[async_trait]
pub trait TabSwitcher: Send + Sync {
    async fn focus(&self, target: &str) -> Result<Option<TabId>, BridgeError>;
}

/// Switcher for topologies with a single page.
#[derive(Clone, Debug, Default)]
pub struct NoopSwitcher;

#[async_trait]
impl TabSwitcher for NoopSwitcher {
    async fn focus(&self, _target: &str) -> Result<Option<TabId>, BridgeError> {
        Ok(None)
    }
}

struct Envelope {
    sender: SenderInfo,
    message: Value,
    reply: oneshot::Sender<Result<Option<Value>, BridgeError>>,
}

struct TabSlot {
    url: String,
    inbox: mpsc::Sender<Envelope>,
    registry: Arc<ListenerRegistry>,
    task: JoinHandle<()>,
}

pub struct TabsRuntime {
    tabs: DashMap<TabId, TabSlot>,
    active: Mutex<Option<TabId>>,
    next_id: AtomicU32,
    sidebar: Arc<ListenerRegistry>,
}

impl TabsRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tabs: DashMap::new(),
            active: Mutex::new(None),
            next_id: AtomicU32::new(1),
            sidebar: ListenerRegistry::new(),
        })
    }

    /// Opens a tab and focuses it. Must be called inside a tokio runtime.
    pub fn open_tab(&self, url: impl Into<String>) -> TabId {
        let tab = TabId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let url = url.into();
        let registry = ListenerRegistry::new();
        let (inbox, mut rx) = mpsc::channel::<Envelope>(TAB_INBOX_CAPACITY);

        let tab_registry = Arc::clone(&registry);
        let task = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let result = dispatch_in_tab(tab, &tab_registry, envelope.sender, envelope.message);
                let _ = envelope.reply.send(result);
            }
        });

        info!(target: "bridge", %tab, %url, "tab opened");
        self.tabs.insert(
            tab,
            TabSlot {
                url,
                inbox,
                registry,
                task,
            },
        );
        *self.active.lock() = Some(tab);
        tab
    }

    pub fn close_tab(&self, tab: TabId) -> bool {
        let Some((_, slot)) = self.tabs.remove(&tab) else {
            return false;
        };
        slot.task.abort();
        let mut active = self.active.lock();
        if *active == Some(tab) {
            *active = None;
        }
        info!(target: "bridge", %tab, "tab closed");
        true
    }

    pub fn activate(&self, tab: TabId) -> Result<(), BridgeError> {
        if !self.tabs.contains_key(&tab) {
            return Err(BridgeError::TabNotFound(tab));
        }
        *self.active.lock() = Some(tab);
        debug!(target: "bridge", %tab, "tab activated");
        Ok(())
    }

    pub fn url(&self, tab: TabId) -> Option<String> {
        self.tabs.get(&tab).map(|slot| slot.url.clone())
    }

    /// Lowest-numbered tab whose URL contains `needle`.
    pub fn find(&self, needle: &str) -> Option<TabId> {
        self.tabs
            .iter()
            .filter(|entry| entry.value().url.contains(needle))
            .map(|entry| *entry.key())
            .min()
    }
}

impl Drop for TabsRuntime {
    fn drop(&mut self) {
        for entry in self.tabs.iter() {
            entry.value().task.abort();
        }
    }
}

fn dispatch_in_tab(
    tab: TabId,
    registry: &ListenerRegistry,
    sender: SenderInfo,
    message: Value,
) -> Result<Option<Value>, BridgeError> {
    if registry.is_empty() {
        return Err(BridgeError::NoReceiver(tab));
    }
    let command = Command::from_wire(message)?;
    match registry.dispatch(&command, &sender) {
        Some(response) => response.to_wire().map(Some),
        None => Ok(None),
    }
}

#[async_trait]
impl ExtensionRuntime for TabsRuntime {
    async fn active_tab(&self) -> Option<TabId> {
        *self.active.lock()
    }

    async fn send_to_tab(
        &self,
        tab: TabId,
        sender: SenderInfo,
        message: Value,
    ) -> Result<Option<Value>, BridgeError> {
        let inbox = self
            .tabs
            .get(&tab)
            .map(|slot| slot.inbox.clone())
            .ok_or(BridgeError::TabNotFound(tab))?;

        let (reply, reply_rx) = oneshot::channel();
        inbox
            .send(Envelope {
                sender,
                message,
                reply,
            })
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        reply_rx.await.map_err(|_| BridgeError::ChannelClosed)?
    }

    fn listeners(&self, role: ContextRole) -> Option<Arc<ListenerRegistry>> {
        match role {
            ContextRole::Sidebar => Some(Arc::clone(&self.sidebar)),
            ContextRole::Tab(tab) => self.tabs.get(&tab).map(|slot| Arc::clone(&slot.registry)),
        }
    }
}

#[async_trait]
impl TabSwitcher for TabsRuntime {
    async fn focus(&self, target: &str) -> Result<Option<TabId>, BridgeError> {
        let tab = self
            .find(target)
            .ok_or_else(|| BridgeError::NoMatchingTab(target.to_string()))?;
        self.activate(tab)?;
        Ok(Some(tab))
    }
}
