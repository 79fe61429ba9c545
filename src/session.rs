//! Wires the sidebar, the bridge and one content script per page into a
//! running session against the in-process mock browser.

use std::sync::Arc;

use anyhow::{Context, Result};
use command_bridge::{
    BackendKind, BridgeEnvironment, BridgeFactory, CapabilityProbe, CommandBridge, Subscription,
    TabSwitcher, TabsRuntime,
};
use dom_injector::{ContentScript, MockBrowser, MockPage, PageHost};
use pipe_executor::{PipeCatalog, PipeExecutor, StageTimings, TransformPort};
use selector_config::SelectorConfigStore;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::AppConfig;

pub struct Session {
    store: Arc<SelectorConfigStore>,
    browser: Arc<MockBrowser>,
    factory: BridgeFactory,
    sidebar: Arc<dyn CommandBridge>,
    switcher: Arc<dyn TabSwitcher>,
    runtime: Option<Arc<TabsRuntime>>,
    listeners: Vec<Subscription>,
    refresh: Option<JoinHandle<()>>,
}

impl Session {
    /// Loads the selector store from `config` and starts the session.
    pub async fn start(config: &AppConfig) -> Result<Self> {
        let source = config.selector_source();
        let store = Arc::new(
            SelectorConfigStore::load(source.clone())
                .await
                .with_context(|| format!("loading selector config from {source}"))?,
        );
        let mut session = Self::with_store(
            store,
            MockBrowser::with_default_pages(),
            config.forced_backend(),
        )?;
        if let Some(every) = config.refresh_interval()? {
            session.refresh = Some(session.store.spawn_refresh(every));
        }
        Ok(session)
    }

    /// `backend: None` probes. Must be called inside a tokio runtime.
    pub fn with_store(
        store: Arc<SelectorConfigStore>,
        browser: Arc<MockBrowser>,
        backend: Option<BackendKind>,
    ) -> Result<Self> {
        let runtime = match backend {
            Some(BackendKind::Simulated) => None,
            _ => Some(TabsRuntime::new()),
        };
        let env = match &runtime {
            Some(runtime) => BridgeEnvironment::with_runtime(runtime.clone()),
            None => BridgeEnvironment::detached(),
        };
        let factory = match backend {
            Some(kind) => BridgeFactory::with_kind(kind, env),
            None => BridgeFactory::probe(&CapabilityProbe::new(), env),
        };

        let mut listeners = Vec::new();
        let switcher: Arc<dyn TabSwitcher> = match (factory.kind(), &runtime) {
            (BackendKind::Runtime, Some(runtime)) => {
                let pages = browser.pages();
                let mut first = None;
                for page in &pages {
                    let tab = runtime.open_tab(page.url());
                    first.get_or_insert(tab);
                    let bridge = factory
                        .content_script(tab)
                        .with_context(|| format!("attaching content script to {tab}"))?;
                    listeners.push(bridge.on_command(content_script(page.clone(), &store)));
                    debug!(%tab, url = page.url(), "content script attached");
                }
                if let Some(tab) = first {
                    runtime.activate(tab)?;
                }
                runtime.clone()
            }
            _ => {
                let bridge = factory.sidebar()?;
                let host: Arc<dyn PageHost> = browser.clone();
                listeners.push(bridge.on_command(content_script(host, &store)));
                browser.clone()
            }
        };

        let sidebar = factory.sidebar().context("attaching sidebar bridge")?;
        info!(backend = %factory.kind(), pages = browser.pages().len(), "session started");
        Ok(Self {
            store,
            browser,
            factory,
            sidebar,
            switcher,
            runtime,
            listeners,
            refresh: None,
        })
    }

    pub fn store(&self) -> &Arc<SelectorConfigStore> {
        &self.store
    }

    pub fn browser(&self) -> &Arc<MockBrowser> {
        &self.browser
    }

    pub fn backend(&self) -> BackendKind {
        self.factory.kind()
    }

    pub fn sidebar(&self) -> Arc<dyn CommandBridge> {
        Arc::clone(&self.sidebar)
    }

    pub fn switcher(&self) -> Arc<dyn TabSwitcher> {
        Arc::clone(&self.switcher)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Adds a page and its content script, and brings it to the front.
    pub fn open_page(&mut self, page: Arc<MockPage>) -> Result<()> {
        self.browser.open(page.clone());
        let subscription = match &self.runtime {
            Some(runtime) if self.factory.kind() == BackendKind::Runtime => {
                let tab = runtime.open_tab(page.url());
                self.factory
                    .content_script(tab)?
                    .on_command(content_script(page, &self.store))
            }
            // The simulated listener already follows the browser's active page.
            _ => return Ok(()),
        };
        self.listeners.push(subscription);
        Ok(())
    }

    pub fn executor(
        &self,
        transform: Arc<dyn TransformPort>,
        timings: StageTimings,
    ) -> PipeExecutor {
        PipeExecutor::new(self.sidebar(), self.switcher(), transform, timings)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.abort();
        }
    }
}

fn content_script(host: Arc<dyn PageHost>, store: &Arc<SelectorConfigStore>) -> Arc<ContentScript> {
    Arc::new(ContentScript::new(host, Arc::clone(store)))
}

/// Builtin pipes, or the catalog file named in the config.
pub fn load_catalog(config: &AppConfig) -> Result<PipeCatalog> {
    match &config.pipes.catalog {
        Some(path) => PipeCatalog::load(path)
            .with_context(|| format!("loading pipe catalog {}", path.display())),
        None => Ok(PipeCatalog::builtin()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use command_bridge::{Command, Delivery, Target};

    #[tokio::test]
    async fn isolated_session_reads_the_active_tab() {
        let session = Session::with_store(
            Arc::new(SelectorConfigStore::builtin()),
            MockBrowser::with_default_pages(),
            None,
        )
        .unwrap();
        assert_eq!(session.backend(), BackendKind::Runtime);
        assert_eq!(session.listener_count(), 3);

        let delivery = session
            .sidebar()
            .send(Command::GetPageContent, Target::ActiveTab)
            .await
            .unwrap();
        match delivery {
            Delivery::Delivered {
                response: Some(command_bridge::CommandResponse::PageContent { content }),
            } => assert!(content.starts_with("user: Compare")),
            other => panic!("unexpected delivery {other:?}"),
        }
    }

    #[tokio::test]
    async fn isolated_switch_targets_the_matching_tab() {
        let session = Session::with_store(
            Arc::new(SelectorConfigStore::builtin()),
            MockBrowser::with_default_pages(),
            Some(BackendKind::Runtime),
        )
        .unwrap();
        session.switcher().focus("deepseek").await.unwrap();
        let delivery = session
            .sidebar()
            .send(Command::inject("hello"), Target::ActiveTab)
            .await
            .unwrap();
        assert!(delivery.is_delivered());
        assert_eq!(
            session.browser().page_for("deepseek").unwrap().input_text(),
            "hello"
        );
    }

    #[tokio::test]
    async fn simulated_session_uses_the_browser_as_switcher() {
        let session = Session::with_store(
            Arc::new(SelectorConfigStore::builtin()),
            MockBrowser::with_default_pages(),
            Some(BackendKind::Simulated),
        )
        .unwrap();
        assert_eq!(session.backend(), BackendKind::Simulated);
        session.switcher().focus("translate").await.unwrap();
        session
            .sidebar()
            .send(Command::inject("bonjour"), Target::ActiveTab)
            .await
            .unwrap();
        assert_eq!(
            session.browser().page_for("translate").unwrap().input_text(),
            "bonjour"
        );
    }
}
