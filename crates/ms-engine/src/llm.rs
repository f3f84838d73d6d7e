//! Text-generation client: system instructions plus one user message in,
//! generated text out. Single request, no streaming, no retry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ms_types::config::{LlmProvider, LlmSettings};

use crate::error::{Error, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anything that can turn a (system, user) prompt pair into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

// ─── Anthropic Messages API ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl ChatResponse {
    /// Extract all text content from the response.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

// ─── OpenAI-compatible Chat Completions ───────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Content of the first choice, if any.
    pub fn text(&self) -> String {
        self.choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// HTTP client bound to one provider, model and credential.
///
/// Built explicitly by the caller and handed to the reflection cycle.
pub struct LlmClient {
    client: reqwest::Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// API key and model, or a configuration error naming what is missing.
    fn credentials(&self) -> Result<(&str, &str)> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("Missing environment variable: LLM_API_KEY".into()))?;
        let model = self
            .settings
            .model
            .as_deref()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                Error::Config("Missing environment variable: LLM_MODEL_NAME".into())
            })?;
        Ok((api_key, model))
    }

    async fn anthropic(&self, api_key: &str, request: &ChatRequest) -> Result<String> {
        let url = format!("{}/messages", self.settings.endpoint());
        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to send request to Anthropic API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "Anthropic API error ({status}): {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse Anthropic API response: {e}")))?;
        if let Some(usage) = &chat.usage {
            debug!(
                "Anthropic usage: {} in / {} out",
                usage.input_tokens, usage.output_tokens
            );
        }
        require_text(chat.text())
    }

    async fn openai(&self, api_key: &str, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.settings.endpoint());
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to send request to OpenAI API: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("OpenAI API error ({status}): {body}")));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse OpenAI API response: {e}")))?;
        require_text(completion.text())
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let (api_key, model) = self.credentials()?;
        let provider = self.settings.provider;
        info!("Calling {} model {}", provider, model);

        let text = match provider {
            LlmProvider::Anthropic => {
                let request = ChatRequest {
                    model: model.to_string(),
                    max_tokens: self.settings.max_tokens,
                    system: system_prompt.to_string(),
                    messages: vec![ChatMessage::user(user_prompt)],
                };
                self.anthropic(api_key, &request).await?
            }
            LlmProvider::OpenAi => {
                let request = CompletionRequest {
                    model: model.to_string(),
                    messages: vec![
                        ChatMessage::system(system_prompt),
                        ChatMessage::user(user_prompt),
                    ],
                };
                self.openai(api_key, &request).await?
            }
        };

        info!("LLM returned {} characters", text.chars().count());
        Ok(text)
    }
}

fn require_text(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::Transport(
            "LLM API returned an empty response or no content.".into(),
        ));
    }
    Ok(text)
}
