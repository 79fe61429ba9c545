//! External text-generation boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::errors::TransformError;

pub const DEFAULT_THINKING_BUDGET: u32 = 32_768;

/// Clip text sent for classification is cut to this many characters.
pub const METADATA_INPUT_CHARS: usize = 1000;

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClipMetadata {
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ClipMetadata {
    pub fn analysis_failed() -> Self {
        Self {
            title: "Analysis Failed".into(),
            summary: "Failed to generate metadata".into(),
            tags: vec!["error".into()],
        }
    }

    pub fn no_api_key() -> Self {
        Self {
            title: "No API Key".into(),
            summary: "Configure API Key in env".into(),
            tags: vec!["error".into()],
        }
    }
}

#[async_trait]
pub trait TransformPort: Send + Sync {
    /// Model name shown in the `[Think]` log line.
    fn deep_model(&self) -> String;

    fn thinking_budget(&self) -> u32 {
        DEFAULT_THINKING_BUDGET
    }

    async fn metadata(&self, text: &str) -> Result<ClipMetadata, TransformError>;

    async fn deep_transform(&self, prompt: &str, context: &str) -> Result<String, TransformError>;
}

/// Port used when no API key is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineTransform;

#[async_trait]
impl TransformPort for OfflineTransform {
    fn deep_model(&self) -> String {
        "offline".into()
    }

    async fn metadata(&self, _text: &str) -> Result<ClipMetadata, TransformError> {
        Err(TransformError::MissingApiKey)
    }

    async fn deep_transform(&self, _prompt: &str, _context: &str) -> Result<String, TransformError> {
        Err(TransformError::MissingApiKey)
    }
}

/// Best-effort clip classification. Never fails; errors become placeholders.
pub async fn generate_metadata(port: &dyn TransformPort, text: &str) -> ClipMetadata {
    let excerpt: String = text.chars().take(METADATA_INPUT_CHARS).collect();
    match port.metadata(&excerpt).await {
        Ok(metadata) => metadata,
        Err(TransformError::MissingApiKey) => {
            warn!(target: "pipe", "metadata requested without API key");
            ClipMetadata::no_api_key()
        }
        Err(err) => {
            error!(target: "pipe", error = %err, "metadata generation failed");
            ClipMetadata::analysis_failed()
        }
    }
}

/// Deep transform for callers that want text back no matter what.
pub async fn run_deep_transform(port: &dyn TransformPort, prompt: &str, context: &str) -> String {
    match port.deep_transform(prompt, context).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) | Err(TransformError::Empty) => "No response generated.".into(),
        Err(TransformError::MissingApiKey) => "Error: API Key missing.".into(),
        Err(err) => {
            error!(target: "pipe", error = %err, "thinking transform failed");
            "Error executing thinking pipe. Please check console.".into()
        }
    }
}
