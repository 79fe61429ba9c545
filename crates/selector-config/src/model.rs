use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// How the resolver walks a selector list.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Try candidates in declared order, first live match wins.
    #[default]
    Waterfall,
    /// Reserved for visual/structural scoring. Resolved like `Waterfall` today.
    Heuristic,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Waterfall => "WATERFALL",
            Strategy::Heuristic => "HEURISTIC",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Remote selector document, as delivered by the configuration source.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    pub version: String,
    #[serde(rename = "lastUpdated", default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub global_killswitch: bool,
    /// Keyed by platform name. Declaration order is match order.
    #[serde(default)]
    pub platforms: IndexMap<String, PlatformEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PlatformEntry {
    pub host: Vec<String>,
    pub input: InputSection,
    #[serde(default)]
    pub submit: SubmitSection,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InputSection {
    pub selectors: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SubmitSection {
    #[serde(default)]
    pub selectors: Vec<String>,
}

impl RemoteConfig {
    /// Checks the invariants every registered platform must hold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("missing version".into()));
        }
        for (key, entry) in &self.platforms {
            if entry.host.iter().all(|h| h.trim().is_empty()) {
                return Err(ConfigError::EmptyHosts(key.clone()));
            }
            if entry.host.iter().any(|h| h.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "platform '{key}' contains a blank host entry"
                )));
            }
            if entry.input.selectors.iter().all(|s| s.trim().is_empty()) {
                return Err(ConfigError::EmptyInputSelectors(key.clone()));
            }
        }
        Ok(())
    }

    pub fn compile(&self) -> Vec<SelectorConfig> {
        self.platforms
            .iter()
            .map(|(key, entry)| SelectorConfig::from_entry(key, entry))
            .collect()
    }
}

/// Per-site selector policy used by the resolver.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorConfig {
    pub platform: String,
    pub hosts: Vec<String>,
    /// Order is policy: the first selector that hits wins.
    pub input_selectors: Vec<String>,
    pub submit_selectors: Vec<String>,
    pub strategy: Strategy,
}

impl SelectorConfig {
    fn from_entry(key: &str, entry: &PlatformEntry) -> Self {
        let mut hosts: Vec<String> = Vec::with_capacity(entry.host.len());
        for host in &entry.host {
            let host = host.trim().to_string();
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        Self {
            platform: key.to_string(),
            hosts,
            input_selectors: clean(&entry.input.selectors),
            submit_selectors: clean(&entry.submit.selectors),
            strategy: entry.input.strategy,
        }
    }

    /// Substring containment: a URL belongs to the platform when any host occurs in it.
    pub fn matches(&self, url: &str) -> bool {
        self.hosts.iter().any(|host| url.contains(host.as_str()))
    }
}

fn clean(selectors: &[String]) -> Vec<String> {
    selectors
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Outcome of looking a URL up in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigResolution {
    Platform(SelectorConfig),
    /// No platform claims the URL; callers fall back to the generic list.
    Unmatched,
    /// Global killswitch is set. Distinct from `Unmatched`: injection must not run.
    Disabled { version: String },
}

/// Selectors the content script should actually use for a page.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectiveSelectors {
    pub version: String,
    pub platform: Option<String>,
    pub input: Vec<String>,
    pub submit: Vec<String>,
    pub strategy: Strategy,
}

impl EffectiveSelectors {
    pub fn is_fallback(&self) -> bool {
        self.platform.is_none()
    }
}

/// Human-facing view of the engine state for a URL.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub url: String,
    pub version: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub platform: Option<String>,
    pub operational: bool,
    pub killswitch: bool,
    pub strategy: String,
    pub input_selectors: Vec<String>,
}

impl StatusReport {
    pub fn headline(&self) -> &'static str {
        if self.killswitch {
            "Disabled"
        } else if self.operational {
            "Operational"
        } else {
            "Fallback Mode"
        }
    }
}
