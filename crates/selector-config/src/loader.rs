use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::defaults::default_remote_config;
use crate::errors::ConfigError;
use crate::model::RemoteConfig;

/// Replaces whatever the source delivers with an inline JSON document.
pub const ENV_OVERRIDE_JSON: &str = "SYNAPSE_SELECTORS_JSON";

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where the trusted selector document comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    Builtin,
    File(PathBuf),
    Url(String),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Builtin => f.write_str("builtin"),
            ConfigSource::File(path) => write!(f, "file:{}", path.display()),
            ConfigSource::Url(url) => f.write_str(url),
        }
    }
}

/// Parses a selector document. JSON is accepted as a YAML subset.
pub fn parse_document(raw: &str) -> Result<RemoteConfig, ConfigError> {
    let document: RemoteConfig =
        serde_yaml::from_str(raw).map_err(|err| ConfigError::Invalid(format!("{}", err)))?;
    document.validate()?;
    Ok(document)
}

pub fn load_file(path: &Path) -> Result<RemoteConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(format!("{}", err)))?;
    parse_document(&content)
}

pub async fn fetch_url(url: &str) -> Result<RemoteConfig, ConfigError> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|err| ConfigError::Fetch(format!("failed to build HTTP client: {err}")))?;
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| ConfigError::Fetch(err.to_string()))?;
    if !response.status().is_success() {
        return Err(ConfigError::Fetch(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }
    let body = response
        .text()
        .await
        .map_err(|err| ConfigError::Fetch(err.to_string()))?;
    parse_document(&body)
}

/// Loads the document for `source`, then applies the env override if present.
pub async fn load_document(source: &ConfigSource) -> Result<RemoteConfig, ConfigError> {
    if let Some(document) = document_from_env()? {
        info!(target: "selector-config", "using selector document from {ENV_OVERRIDE_JSON}");
        return Ok(document);
    }

    let document = match source {
        ConfigSource::Builtin => default_remote_config(),
        ConfigSource::File(path) => load_file(path)?,
        ConfigSource::Url(url) => fetch_url(url).await?,
    };
    debug!(
        target: "selector-config",
        source = %source,
        version = %document.version,
        platforms = document.platforms.len(),
        "selector document loaded"
    );
    Ok(document)
}

fn document_from_env() -> Result<Option<RemoteConfig>, ConfigError> {
    match env::var(ENV_OVERRIDE_JSON) {
        Ok(raw) if !raw.trim().is_empty() => parse_document(&raw).map(Some),
        _ => Ok(None),
    }
}
