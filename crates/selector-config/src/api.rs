use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::defaults::{default_remote_config, generic_input_selectors, generic_submit_selectors};
use crate::errors::ConfigError;
use crate::loader::{load_document, ConfigSource};
use crate::model::{
    ConfigResolution, EffectiveSelectors, RemoteConfig, SelectorConfig, StatusReport, Strategy,
};

/// Floor for [`SelectorConfigStore::spawn_refresh`].
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Immutable view of one loaded document.
#[derive(Clone, Debug)]
pub struct ConfigSnapshot {
    pub rev: u64,
    pub document: RemoteConfig,
    pub platforms: Vec<SelectorConfig>,
}

impl ConfigSnapshot {
    fn new(rev: u64, document: RemoteConfig) -> Self {
        let platforms = document.compile();
        Self {
            rev,
            document,
            platforms,
        }
    }

    pub fn resolve(&self, url: &str) -> ConfigResolution {
        if self.document.global_killswitch {
            return ConfigResolution::Disabled {
                version: self.document.version.clone(),
            };
        }
        self.platforms
            .iter()
            .find(|platform| platform.matches(url))
            .cloned()
            .map(ConfigResolution::Platform)
            .unwrap_or(ConfigResolution::Unmatched)
    }
}

/// Process-wide selector configuration. Constructed once and shared by `Arc`.
pub struct SelectorConfigStore {
    current: ArcSwap<ConfigSnapshot>,
    source: ConfigSource,
    rev_counter: AtomicU64,
    watch_tx: watch::Sender<Arc<ConfigSnapshot>>,
}

impl SelectorConfigStore {
    pub fn new(document: RemoteConfig, source: ConfigSource) -> Result<Self, ConfigError> {
        document.validate()?;
        let snapshot = Arc::new(ConfigSnapshot::new(1, document));
        let (watch_tx, _watch_rx) = watch::channel(Arc::clone(&snapshot));
        Ok(Self {
            current: ArcSwap::new(snapshot),
            source,
            rev_counter: AtomicU64::new(1),
            watch_tx,
        })
    }

    pub fn builtin() -> Self {
        let snapshot = Arc::new(ConfigSnapshot::new(1, default_remote_config()));
        let (watch_tx, _watch_rx) = watch::channel(Arc::clone(&snapshot));
        Self {
            current: ArcSwap::new(snapshot),
            source: ConfigSource::Builtin,
            rev_counter: AtomicU64::new(1),
            watch_tx,
        }
    }

    /// Loads the initial document from `source`.
    pub async fn load(source: ConfigSource) -> Result<Self, ConfigError> {
        let document = load_document(&source).await?;
        Self::new(document, source)
    }

    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.load_full()
    }

    pub fn resolve_config(&self, url: &str) -> ConfigResolution {
        self.current.load().resolve(url)
    }

    /// Platform selectors, or the generic list when nothing matches.
    /// Fails closed with `ConfigError::Disabled` when the killswitch is set.
    pub fn effective_selectors(&self, url: &str) -> Result<EffectiveSelectors, ConfigError> {
        let snapshot = self.current.load();
        let version = snapshot.document.version.clone();
        match snapshot.resolve(url) {
            ConfigResolution::Disabled { version } => Err(ConfigError::Disabled(version)),
            ConfigResolution::Platform(config) => Ok(EffectiveSelectors {
                version,
                platform: Some(config.platform),
                input: config.input_selectors,
                submit: config.submit_selectors,
                strategy: config.strategy,
            }),
            ConfigResolution::Unmatched => Ok(EffectiveSelectors {
                version,
                platform: None,
                input: generic_input_selectors(),
                submit: generic_submit_selectors(),
                strategy: Strategy::Waterfall,
            }),
        }
    }

    /// Hot-swaps the document. An invalid document leaves the current one in place.
    pub fn replace(&self, document: RemoteConfig) -> Result<u64, ConfigError> {
        document.validate()?;
        let rev = self.rev_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(ConfigSnapshot::new(rev, document));
        info!(
            target: "selector-config",
            rev,
            version = %snapshot.document.version,
            killswitch = snapshot.document.global_killswitch,
            "selector config swapped"
        );
        self.current.store(Arc::clone(&snapshot));
        self.watch_tx.send_replace(snapshot);
        Ok(rev)
    }

    /// Re-reads the source. Returns whether the active document changed.
    pub async fn reload(&self) -> Result<bool, ConfigError> {
        let document = load_document(&self.source).await?;
        if same_content(&self.current.load().document, &document) {
            return Ok(false);
        }
        self.replace(document)?;
        Ok(true)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ConfigSnapshot>> {
        self.watch_tx.subscribe()
    }

    pub fn status_report(&self, url: &str) -> StatusReport {
        let snapshot = self.current.load();
        let document = &snapshot.document;
        let (platform, strategy, input_selectors) = match snapshot.resolve(url) {
            ConfigResolution::Platform(config) => (
                Some(config.platform),
                config.strategy.label().to_string(),
                config.input_selectors,
            ),
            ConfigResolution::Unmatched | ConfigResolution::Disabled { .. } => (
                None,
                "VISUAL_GUESS".to_string(),
                generic_input_selectors(),
            ),
        };
        StatusReport {
            url: url.to_string(),
            version: document.version.clone(),
            last_updated: document.last_updated,
            operational: platform.is_some(),
            platform,
            killswitch: document.global_killswitch,
            strategy,
            input_selectors,
        }
    }

    /// Periodically reloads from the source. Failures keep the previous snapshot.
    /// Intervals below [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let every = if every < MIN_REFRESH_INTERVAL {
            warn!(target: "selector-config", requested = ?every, "refresh interval raised to {:?}", MIN_REFRESH_INTERVAL);
            MIN_REFRESH_INTERVAL
        } else {
            every
        };
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.reload().await {
                    Ok(true) | Ok(false) => {}
                    Err(err) => {
                        warn!(target: "selector-config", source = %store.source, "selector refresh failed: {err}");
                    }
                }
            }
        })
    }
}

fn same_content(a: &RemoteConfig, b: &RemoteConfig) -> bool {
    a.version == b.version
        && a.global_killswitch == b.global_killswitch
        && a.platforms.iter().eq(b.platforms.iter())
}
