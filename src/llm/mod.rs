pub mod gemini;

pub use gemini::{GeminiConfig, GeminiTransform};

use std::sync::Arc;

use pipe_executor::{OfflineTransform, TransformPort};
use tracing::{info, warn};

use crate::config::LlmSection;

/// Gemini when a key is configured, otherwise the offline port that reports
/// the missing key on every call.
pub fn transform_from_config(llm: &LlmSection) -> Arc<dyn TransformPort> {
    let Some(api_key) = llm.api_key() else {
        warn!(env = %llm.api_key_env, "no API key configured; thinking pipes will fail");
        return Arc::new(OfflineTransform);
    };
    match GeminiTransform::new(GeminiConfig::from_section(llm, api_key)) {
        Ok(client) => {
            info!(deep_model = %llm.deep_model, fast_model = %llm.fast_model, "Gemini transform ready");
            Arc::new(client)
        }
        Err(err) => {
            warn!(error = %err, "failed to build Gemini client; falling back to offline transform");
            Arc::new(OfflineTransform)
        }
    }
}
