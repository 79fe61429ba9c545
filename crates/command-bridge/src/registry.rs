//! Listener registry shared by both backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use crate::command::{Command, CommandResponse, SenderInfo};

/// Receives commands inside an execution context.
///
/// Returning `Some` is the equivalent of calling the acknowledgement callback.
pub trait CommandHandler: Send + Sync {
    fn handle(&self, command: &Command, sender: &SenderInfo) -> Option<CommandResponse>;
}

impl<F> CommandHandler for F
where
    F: Fn(&Command, &SenderInfo) -> Option<CommandResponse> + Send + Sync,
{
    fn handle(&self, command: &Command, sender: &SenderInfo) -> Option<CommandResponse> {
        self(command, sender)
    }
}

/// Opaque listener identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Insertion-ordered listener table. Dispatch iterates a snapshot, so handlers may
/// subscribe, unsubscribe or send while being called.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn CommandHandler>)>>,
}

impl ListenerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, handler: Arc<dyn CommandHandler>) -> Subscription {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.lock().push((id, handler));
        debug!(target: "bridge", listener = id.0, "listener registered");
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            debug!(target: "bridge", listener = id.0, "listener removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Arc<dyn CommandHandler>> {
        self.listeners
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    /// Calls every listener in registration order. The first response wins.
    pub fn dispatch(&self, command: &Command, sender: &SenderInfo) -> Option<CommandResponse> {
        let mut first = None;
        for handler in self.snapshot() {
            let response = handler.handle(command, sender);
            if first.is_none() {
                first = response;
            }
        }
        first
    }
}

/// Keeps a listener registered; dropping it unregisters (component unmount).
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Keeps the listener for the lifetime of the registry.
    pub fn detach(self) -> ListenerId {
        let id = self.id;
        std::mem::forget(self);
        id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::InjectionAck;

    fn sender() -> SenderInfo {
        SenderInfo::mock()
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let registry = ListenerRegistry::new();
        let sub = registry.subscribe(Arc::new(
            |_: &Command, _: &SenderInfo| -> Option<CommandResponse> { None },
        ));
        assert_eq!(registry.len(), 1);
        drop(sub);
        assert!(registry.is_empty());
    }

    #[test]
    fn first_response_wins_but_all_listeners_run() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let c1 = Arc::clone(&calls);
        let _a = registry.subscribe(Arc::new(move |_: &Command, _: &SenderInfo| {
            c1.lock().push("a");
            Some(CommandResponse::Ack(InjectionAck::success("#a")))
        }));
        let c2 = Arc::clone(&calls);
        let _b = registry.subscribe(Arc::new(move |_: &Command, _: &SenderInfo| {
            c2.lock().push("b");
            Some(CommandResponse::Ack(InjectionAck::success("#b")))
        }));

        let response = registry.dispatch(&Command::SubmitInput, &sender());
        assert_eq!(*calls.lock(), vec!["a", "b"]);
        assert_eq!(
            response.and_then(|r| r.ack().and_then(|a| a.selector.clone())),
            Some("#a".to_string())
        );
    }

    #[test]
    fn handler_may_unsubscribe_itself_during_dispatch() {
        let registry = ListenerRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_in = Arc::clone(&slot);
        let sub = registry.subscribe(Arc::new(
            move |_: &Command, _: &SenderInfo| -> Option<CommandResponse> {
                slot_in.lock().take();
                None
            },
        ));
        *slot.lock() = Some(sub);

        registry.dispatch(&Command::GetPageContent, &sender());
        assert!(registry.is_empty());
    }
}
