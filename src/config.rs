//! Application configuration
//!
//! One YAML file with four sections. Every field has a default, so an empty or
//! missing file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use command_bridge::BackendKind;
use pipe_executor::StageTimings;
use selector_config::ConfigSource;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub selectors: SelectorsSection,
    pub bridge: BridgeSection,
    pub pipes: PipesSection,
    pub llm: LlmSection,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectorsSection {
    /// File path or http(s) URL of the selector document. Unset means builtin.
    pub source: Option<String>,
    /// How often to reload `source`, e.g. "5m". Unset disables refresh.
    pub refresh_interval: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Probe for an extension runtime and use it when present.
    #[default]
    Auto,
    Isolated,
    Simulated,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeSection {
    pub runtime: RuntimeMode,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipesSection {
    pub extract_ms: u64,
    pub transform_ms: u64,
    pub switch_ms: u64,
    pub settle_ms: u64,
    pub transform_timeout_ms: Option<u64>,
    /// YAML catalog replacing the builtin pipes.
    pub catalog: Option<PathBuf>,
}

impl Default for PipesSection {
    fn default() -> Self {
        let timings = StageTimings::default();
        Self {
            extract_ms: timings.extract.as_millis() as u64,
            transform_ms: timings.transform.as_millis() as u64,
            switch_ms: timings.switch.as_millis() as u64,
            settle_ms: timings.settle.as_millis() as u64,
            transform_timeout_ms: None,
            catalog: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSection {
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub fast_model: String,
    pub deep_model: String,
    pub thinking_budget: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_key_env: "API_KEY".into(),
            fast_model: "gemini-flash-lite-latest".into(),
            deep_model: "gemini-3-pro-preview".into(),
            thinking_budget: pipe_executor::DEFAULT_THINKING_BUDGET,
            request_timeout_secs: 300,
        }
    }
}

impl LlmSection {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(raw).context("parsing configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.refresh_interval()?;
        if self.pipes.settle_ms == 0 {
            bail!("pipes.settle_ms must be greater than zero");
        }
        if self.pipes.transform_timeout_ms == Some(0) {
            bail!("pipes.transform_timeout_ms must be greater than zero when set");
        }
        if self.llm.api_key_env.trim().is_empty() {
            bail!("llm.api_key_env cannot be empty");
        }
        if self.llm.deep_model.trim().is_empty() || self.llm.fast_model.trim().is_empty() {
            bail!("llm model names cannot be empty");
        }
        Ok(())
    }

    pub fn selector_source(&self) -> ConfigSource {
        match self.selectors.source.as_deref().map(str::trim) {
            None | Some("") | Some("builtin") => ConfigSource::Builtin,
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                ConfigSource::Url(url.to_string())
            }
            Some(path) => ConfigSource::File(PathBuf::from(path)),
        }
    }

    pub fn refresh_interval(&self) -> Result<Option<Duration>> {
        match self.selectors.refresh_interval.as_deref() {
            None => Ok(None),
            Some(raw) => {
                let every = humantime::parse_duration(raw)
                    .with_context(|| format!("invalid selectors.refresh_interval '{raw}'"))?;
                if every.is_zero() {
                    bail!("selectors.refresh_interval must be greater than zero");
                }
                Ok(Some(every))
            }
        }
    }

    pub fn stage_timings(&self) -> StageTimings {
        StageTimings {
            extract: Duration::from_millis(self.pipes.extract_ms),
            transform: Duration::from_millis(self.pipes.transform_ms),
            switch: Duration::from_millis(self.pipes.switch_ms),
            settle: Duration::from_millis(self.pipes.settle_ms),
            transform_timeout: self.pipes.transform_timeout_ms.map(Duration::from_millis),
        }
    }

    /// `None` asks the probe.
    pub fn forced_backend(&self) -> Option<BackendKind> {
        match self.bridge.runtime {
            RuntimeMode::Auto => None,
            RuntimeMode::Isolated => Some(BackendKind::Runtime),
            RuntimeMode::Simulated => Some(BackendKind::Simulated),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.stage_timings(), StageTimings::default());
        assert_eq!(config.selector_source(), ConfigSource::Builtin);
        assert_eq!(config.forced_backend(), None);
    }

    #[test]
    fn sections_parse() {
        let raw = r#"
selectors:
  source: https://config.example.com/selectors.json
  refresh_interval: 5m
bridge:
  runtime: isolated
pipes:
  settle_ms: 1500
  transform_timeout_ms: 20000
llm:
  deep_model: gemini-2.5-pro
"#;
        let config = AppConfig::from_yaml_str(raw).unwrap();
        assert_eq!(
            config.selector_source(),
            ConfigSource::Url("https://config.example.com/selectors.json".into())
        );
        assert_eq!(
            config.refresh_interval().unwrap(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(config.forced_backend(), Some(BackendKind::Runtime));
        let timings = config.stage_timings();
        assert_eq!(timings.settle, Duration::from_millis(1500));
        assert_eq!(timings.extract, Duration::from_millis(600));
        assert_eq!(timings.transform_timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.llm.deep_model, "gemini-2.5-pro");
        assert_eq!(config.llm.fast_model, "gemini-flash-lite-latest");
    }

    #[test]
    fn local_paths_become_file_sources() {
        let mut config = AppConfig::default();
        config.selectors.source = Some("config/selectors.yaml".into());
        assert_eq!(
            config.selector_source(),
            ConfigSource::File(PathBuf::from("config/selectors.yaml"))
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(AppConfig::from_yaml_str("selectors:\n  refresh_interval: soon\n").is_err());
        assert!(AppConfig::from_yaml_str("pipes:\n  settle_ms: 0\n").is_err());
        assert!(AppConfig::from_yaml_str("bridge:\n  runtime: telepathy\n").is_err());
    }
}
