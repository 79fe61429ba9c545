use std::sync::Arc;

use command_bridge::{
    event_bus, BackendKind, BridgeEnvironment, BridgeEvent, BridgeFactory, CapabilityProbe,
    Command, CommandBridge, CommandHandler, CommandResponse, Delivery, ExtensionRuntime,
    InjectionAck, SenderInfo, SimulatedBridge, TabSwitcher, TabsRuntime, Target,
};
use parking_lot::Mutex;
use synapse_core_types::{ContextRole, TabId};

fn page_content(content: &'static str) -> Arc<dyn CommandHandler> {
    Arc::new(move |command: &Command, _: &SenderInfo| match command {
        Command::GetPageContent => Some(CommandResponse::PageContent {
            content: content.to_string(),
        }),
        _ => None,
    })
}

#[tokio::test]
async fn isolated_round_trip_returns_page_content() {
    let runtime = TabsRuntime::new();
    let tab = runtime.open_tab("https://chat.deepseek.com/");
    let shared: Arc<dyn ExtensionRuntime> = runtime.clone();
    let factory = BridgeFactory::probe(
        &CapabilityProbe::new(),
        BridgeEnvironment::with_runtime(shared),
    );
    assert_eq!(factory.kind(), BackendKind::Runtime);

    let page = factory.content_script(tab).unwrap();
    let _listener = page.on_command(page_content("user: hi\nassistant: hello"));

    let sidebar = factory.sidebar().unwrap();
    let delivery = sidebar
        .send(Command::GetPageContent, Target::ActiveTab)
        .await
        .unwrap();
    assert_eq!(
        delivery.response().and_then(|r| r.content()),
        Some("user: hi\nassistant: hello")
    );
}

#[tokio::test]
async fn listeners_observe_sender_identity() {
    let runtime = TabsRuntime::new();
    let tab = runtime.open_tab("https://kimi.moonshot.cn/");
    let shared: Arc<dyn ExtensionRuntime> = runtime.clone();
    let factory = BridgeFactory::with_kind(
        BackendKind::Runtime,
        BridgeEnvironment::with_runtime(shared),
    );

    let seen: Arc<Mutex<Option<ContextRole>>> = Arc::new(Mutex::new(None));
    let seen_in = Arc::clone(&seen);
    let page = factory.content_script(tab).unwrap();
    let _listener = page.on_command(Arc::new(
        move |_: &Command, sender: &SenderInfo| -> Option<CommandResponse> {
            *seen_in.lock() = Some(sender.role);
            Some(CommandResponse::Ack(InjectionAck::success("textarea")))
        },
    ));

    let delivery = factory
        .sidebar()
        .unwrap()
        .send(Command::inject("hello"), Target::Tab(tab))
        .await
        .unwrap();
    assert_eq!(*seen.lock(), Some(ContextRole::Sidebar));
    assert_eq!(delivery.response().and_then(|r| r.ack()).map(|a| a.ok), Some(true));
}

#[tokio::test]
async fn tab_without_listener_drops_command() {
    let runtime = TabsRuntime::new();
    runtime.open_tab("https://example.org/");
    let shared: Arc<dyn ExtensionRuntime> = runtime.clone();
    let factory = BridgeFactory::with_kind(
        BackendKind::Runtime,
        BridgeEnvironment::with_runtime(shared),
    );
    let mut events = factory.events().subscribe();

    let delivery = factory
        .sidebar()
        .unwrap()
        .send(Command::inject("lost"), Target::ActiveTab)
        .await
        .unwrap();
    assert!(matches!(delivery, Delivery::Dropped { .. }));

    let mut dropped = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, BridgeEvent::CommandDropped { .. }) {
            dropped = true;
        }
    }
    assert!(dropped);
}

#[tokio::test]
async fn no_active_tab_is_dropped_not_an_error() {
    let runtime = TabsRuntime::new();
    let tab = runtime.open_tab("https://example.org/");
    assert!(runtime.close_tab(tab));
    let shared: Arc<dyn ExtensionRuntime> = runtime.clone();
    let factory = BridgeFactory::with_kind(
        BackendKind::Runtime,
        BridgeEnvironment::with_runtime(shared),
    );

    let delivery = factory
        .sidebar()
        .unwrap()
        .send(Command::GetPageContent, Target::ActiveTab)
        .await
        .unwrap();
    assert!(!delivery.is_delivered());
}

#[tokio::test]
async fn switcher_focuses_lowest_matching_tab() {
    let runtime = TabsRuntime::new();
    let first = runtime.open_tab("https://chat.deepseek.com/a");
    let _other = runtime.open_tab("https://kimi.moonshot.cn/");
    let _second = runtime.open_tab("https://chat.deepseek.com/b");

    assert_eq!(runtime.focus("deepseek").await.unwrap(), Some(first));
    assert_eq!(runtime.active_tab().await, Some(first));
    assert!(runtime.focus("claude.ai").await.is_err());
    assert!(runtime.activate(TabId(42)).is_err());
}

#[tokio::test]
async fn simulated_bridge_calls_every_listener_in_order() {
    let bridge = SimulatedBridge::new(event_bus(8));
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    let _a = bridge.on_command(Arc::new(
        move |command: &Command, _: &SenderInfo| -> Option<CommandResponse> {
            first.lock().push(("a", command.clone()));
            None
        },
    ));
    let second = Arc::clone(&order);
    let _b = bridge.on_command(Arc::new(
        move |command: &Command, _: &SenderInfo| -> Option<CommandResponse> {
            second.lock().push(("b", command.clone()));
            None
        },
    ));

    let delivery = bridge
        .send(Command::inject("x"), Target::ActiveTab)
        .await
        .unwrap();
    assert_eq!(delivery, Delivery::Delivered { response: None });
    assert_eq!(
        *order.lock(),
        vec![("a", Command::inject("x")), ("b", Command::inject("x"))]
    );
}

#[tokio::test]
async fn simulated_send_with_no_listener_is_delivered_silently() {
    let bridge = SimulatedBridge::new(event_bus(8));
    let delivery = bridge
        .send(Command::GetPageContent, Target::ActiveTab)
        .await
        .unwrap();
    assert!(delivery.is_delivered());
    assert!(delivery.response().is_none());
}

#[tokio::test]
async fn simulated_handlers_may_send_reentrantly() {
    let bridge = SimulatedBridge::new(event_bus(8));
    let inner = Arc::clone(&bridge);
    let _echo = bridge.on_command(Arc::new(
        move |command: &Command, _: &SenderInfo| -> Option<CommandResponse> {
            if let Command::InjectText { .. } = command {
                inner.send_now(&Command::SubmitInput);
            }
            None
        },
    ));
    let submits = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&submits);
    let _count = bridge.on_command(Arc::new(
        move |command: &Command, _: &SenderInfo| -> Option<CommandResponse> {
            if *command == Command::SubmitInput {
                *counter.lock() += 1;
            }
            None
        },
    ));

    bridge.send_now(&Command::inject("go"));
    assert_eq!(*submits.lock(), 1);
}
