//! Pipe definitions available to the executor.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::PipeError;
use crate::model::{PipeDef, CURRENT_SOURCE};

pub fn builtin_pipes() -> Vec<PipeDef> {
    vec![
        PipeDef {
            id: "p1".into(),
            name: "Analyst Handover".into(),
            description: "Pipe Kimi summary to DeepSeek for code generation.".into(),
            source: "chat.kimi.ai".into(),
            target: "chat.deepseek.com".into(),
            transform_prompt: "Read the following summary and write a Python script to visualize the data trends using Matplotlib:".into(),
            is_thinking_mode: false,
            auto_submit: false,
        },
        PipeDef {
            id: "p2".into(),
            name: "Executive Briefing (Thinking)".into(),
            description: "Deep analysis of current context using Reasoning Model.".into(),
            source: CURRENT_SOURCE.into(),
            target: "chat.deepseek.com".into(),
            transform_prompt: "Provide a strategic risk assessment based on this context. Think deeply about second-order effects.".into(),
            is_thinking_mode: true,
            auto_submit: false,
        },
        PipeDef {
            id: "p3".into(),
            name: "Translation Stream".into(),
            description: "Convert current text to Japanese instantly.".into(),
            source: CURRENT_SOURCE.into(),
            target: "translate.google.com".into(),
            transform_prompt: "Translate the following text to Japanese naturally:".into(),
            is_thinking_mode: false,
            auto_submit: false,
        },
    ]
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    pipes: Vec<PipeDef>,
}

#[derive(Clone, Debug)]
pub struct PipeCatalog {
    pipes: Vec<PipeDef>,
}

impl Default for PipeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PipeCatalog {
    pub fn builtin() -> Self {
        Self {
            pipes: builtin_pipes(),
        }
    }

    pub fn new(pipes: Vec<PipeDef>) -> Result<Self, PipeError> {
        let mut seen = HashSet::new();
        for pipe in &pipes {
            if pipe.id.trim().is_empty() {
                return Err(PipeError::Catalog("pipe with empty id".into()));
            }
            if pipe.target.trim().is_empty() {
                return Err(PipeError::Catalog(format!("pipe '{}' has no target", pipe.id)));
            }
            if !seen.insert(pipe.id.as_str()) {
                return Err(PipeError::Catalog(format!("duplicate pipe id '{}'", pipe.id)));
            }
        }
        Ok(Self { pipes })
    }

    /// Parses `pipes: [...]` YAML.
    pub fn from_yaml_str(raw: &str) -> Result<Self, PipeError> {
        let file: CatalogFile =
            serde_yaml::from_str(raw).map_err(|err| PipeError::Catalog(err.to_string()))?;
        Self::new(file.pipes)
    }

    pub fn load(path: &Path) -> Result<Self, PipeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| PipeError::Catalog(format!("{}: {err}", path.display())))?;
        let catalog = Self::from_yaml_str(&raw)?;
        info!(target: "pipe", path = %path.display(), pipes = catalog.len(), "pipe catalog loaded");
        Ok(catalog)
    }

    pub fn get(&self, id: &str) -> Option<&PipeDef> {
        self.pipes.iter().find(|pipe| pipe.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&PipeDef, PipeError> {
        self.get(id).ok_or_else(|| PipeError::UnknownPipe(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipeDef> {
        self.pipes.iter()
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
}
