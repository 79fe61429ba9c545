//! Gemini `generateContent` client behind the pipe transform port.

use std::time::Duration;

use async_trait::async_trait;
use pipe_executor::{ClipMetadata, TransformError, TransformPort};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, warn};

use crate::config::LlmSection;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub api_base: String,
    pub fast_model: String,
    pub deep_model: String,
    pub thinking_budget: u32,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn from_section(llm: &LlmSection, api_key: String) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_API_BASE.to_string(),
            fast_model: llm.fast_model.clone(),
            deep_model: llm.deep_model.clone(),
            thinking_budget: llm.thinking_budget,
            timeout: llm.request_timeout(),
        }
    }
}

pub struct GeminiTransform {
    client: Client,
    config: GeminiConfig,
}

impl GeminiTransform {
    pub fn new(config: GeminiConfig) -> Result<Self, TransformError> {
        if config.api_key.trim().is_empty() {
            return Err(TransformError::MissingApiKey);
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|err| TransformError::Request(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, config })
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<String, TransformError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        );
        debug!(target: "pipe", %model, "gemini generateContent");

        // Error text reaches the pipe console, so it never carries the URL.
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                TransformError::Request(format!("gemini request failed: {}", err.without_url()))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|err| {
            TransformError::Request(format!("gemini response unreadable: {}", err.without_url()))
        })?;
        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            warn!(target: "pipe", %model, %status, %message, "gemini returned an error");
            return Err(TransformError::Request(format!("gemini returned {status}: {message}")));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|err| TransformError::Request(format!("gemini response invalid: {err}")))?;
        parsed.text().ok_or(TransformError::Empty)
    }
}

#[async_trait]
impl TransformPort for GeminiTransform {
    fn deep_model(&self) -> String {
        self.config.deep_model.clone()
    }

    fn thinking_budget(&self) -> u32 {
        self.config.thinking_budget
    }

    async fn metadata(&self, text: &str) -> Result<ClipMetadata, TransformError> {
        let request = metadata_request(text);
        let raw = self.generate(&self.config.fast_model, &request).await?;
        serde_json::from_str(&raw)
            .map_err(|err| TransformError::Request(format!("metadata JSON invalid: {err}")))
    }

    async fn deep_transform(&self, prompt: &str, context: &str) -> Result<String, TransformError> {
        let request = deep_request(prompt, context, self.config.thinking_budget);
        self.generate(&self.config.deep_model, &request).await
    }
}

fn metadata_request(text: &str) -> GenerateContentRequest {
    let prompt = format!(
        "Analyze the following text snippet. Provide a short Title, a 1-sentence Summary, and 3-5 relevant Tags.\n\nText: \"{text}...\""
    );
    GenerateContentRequest {
        contents: vec![Content::user(prompt)],
        generation_config: Some(GenerationConfig {
            response_mime_type: Some("application/json".into()),
            response_schema: Some(json!({
                "type": "OBJECT",
                "properties": {
                    "title": { "type": "STRING" },
                    "summary": { "type": "STRING" },
                    "tags": { "type": "ARRAY", "items": { "type": "STRING" } }
                }
            })),
            thinking_config: None,
        }),
    }
}

fn deep_request(prompt: &str, context: &str, thinking_budget: u32) -> GenerateContentRequest {
    let text = format!(
        "Context: {context}\n\nTask: {prompt}\n\nPlease provide a comprehensive and deeply reasoned output."
    );
    GenerateContentRequest {
        contents: vec![Content::user(text)],
        generation_config: Some(GenerationConfig {
            response_mime_type: None,
            response_schema: None,
            thinking_config: Some(ThinkingConfig { thinking_budget }),
        }),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn user(text: String) -> Self {
        Self {
            role: "user".into(),
            parts: vec![Part {
                text: Some(text),
                thought: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Set on reasoning summaries, which are not part of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Answer text of the first candidate, thoughts excluded.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .filter(|part| part.thought != Some(true))
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_request_asks_for_json() {
        let body = serde_json::to_value(metadata_request("hello")).unwrap();
        let config = &body["generationConfig"];
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["properties"]["tags"]["type"], "ARRAY");
        assert!(config.get("thinkingConfig").is_none());
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.ends_with("Text: \"hello...\""));
    }

    #[test]
    fn deep_request_carries_the_thinking_budget() {
        let body = serde_json::to_value(deep_request("Assess risk", "ctx", 32_768)).unwrap();
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 32_768);
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.starts_with("Context: ctx\n\nTask: Assess risk"));
    }

    #[test]
    fn response_text_skips_thoughts() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"weighing options","thought":true},
            {"text":"Final "},
            {"text":"answer"}
        ]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Final answer"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_key() {
        let config = GeminiConfig {
            api_key: "SECRET-KEY-123".into(),
            api_base: "http://127.0.0.1:1/v1beta".into(),
            fast_model: "gemini-flash-lite-latest".into(),
            deep_model: "gemini-3-pro-preview".into(),
            thinking_budget: 1024,
            timeout: Duration::from_secs(5),
        };
        let client = GeminiTransform::new(config).unwrap();

        let err = client.deep_transform("p", "c").await.unwrap_err();
        assert!(matches!(err, TransformError::Request(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");

        let err = client.metadata("clip").await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"), "{err}");
    }

    #[test]
    fn blank_key_is_rejected() {
        let config = GeminiConfig::from_section(&LlmSection::default(), "  ".into());
        assert!(matches!(
            GeminiTransform::new(config),
            Err(TransformError::MissingApiKey)
        ));
    }
}
