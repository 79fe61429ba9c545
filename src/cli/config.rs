use std::path::{Path, PathBuf};

use crate::cli::context::CliContext;
use crate::config::AppConfig;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use pipe_executor::PipeCatalog;
use selector_config::{parse_document, ConfigSource};
use serde_json::Value as JsonValue;
use tokio::fs;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Get a configuration value by dotted key, e.g. `pipes.settle_ms`
    Get {
        /// Configuration key
        key: String,
    },

    /// Validate a configuration file and the files it references
    Validate {
        /// File to check; defaults to the active configuration path
        file: Option<PathBuf>,
    },
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            println!("Current configuration ({}):", ctx.config_path().display());
            print!("{}", serde_yaml::to_string(ctx.config())?);
        }
        ConfigAction::Get { key } => {
            let json = serde_json::to_value(ctx.config())?;
            let segments = split_key(&key)?;
            match get_json_value(&json, &segments) {
                Some(value) => print!("{}", serde_yaml::to_string(value)?),
                None => bail!("{} not found in configuration", key),
            }
        }
        ConfigAction::Validate { file } => {
            let explicit = file.is_some();
            let path = file.unwrap_or_else(|| ctx.config_path().to_path_buf());
            if !fs::try_exists(&path).await? {
                if explicit {
                    bail!("{} does not exist", path.display());
                }
                println!(
                    "No configuration file at {}; defaults are valid",
                    path.display()
                );
                return Ok(());
            }
            let raw = fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config = AppConfig::from_yaml_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?;
            validate_references(&config, path.parent()).await?;
            println!("Configuration file {} is valid", path.display());
        }
    }

    Ok(())
}

/// Checks the selector document and pipe catalog a config points at. URL
/// sources are not fetched.
async fn validate_references(config: &AppConfig, base: Option<&Path>) -> Result<()> {
    if let ConfigSource::File(path) = config.selector_source() {
        let path = resolve(base, &path);
        let raw = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading selector document {}", path.display()))?;
        parse_document(&raw)
            .with_context(|| format!("selector document {}", path.display()))?;
    }
    if let Some(catalog) = &config.pipes.catalog {
        let path = resolve(base, catalog);
        PipeCatalog::load(&path).with_context(|| format!("pipe catalog {}", path.display()))?;
    }
    Ok(())
}

fn resolve(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(base) if path.is_relative() && !path.exists() => base.join(path),
        _ => path.to_path_buf(),
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key
        .split('.')
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        bail!("configuration key cannot be empty");
    }
    Ok(segments)
}

fn get_json_value<'a>(value: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    let mut current = value;
    for segment in path {
        match current {
            JsonValue::Object(map) => {
                current = map.get(*segment)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_keys_reach_nested_values() {
        let json = serde_json::to_value(AppConfig::default()).unwrap();
        let segments = split_key("llm.deep_model").unwrap();
        assert_eq!(
            get_json_value(&json, &segments),
            Some(&JsonValue::from("gemini-3-pro-preview"))
        );
        assert_eq!(get_json_value(&json, &["llm", "nope"]), None);
        assert!(split_key("..").is_err());
    }

    #[tokio::test]
    async fn references_are_resolved_next_to_the_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pipes.yaml"),
            "pipes:\n  - {id: x, name: X, source: current, target: example.org, transformPrompt: Go}\n",
        )
        .unwrap();
        let mut config = AppConfig::default();
        config.pipes.catalog = Some(PathBuf::from("pipes.yaml"));
        validate_references(&config, Some(dir.path())).await.unwrap();

        config.selectors.source = Some("missing-selectors.yaml".into());
        assert!(validate_references(&config, Some(dir.path())).await.is_err());
    }
}
