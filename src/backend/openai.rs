use super::CompletionBackend;
use crate::error::{BackendError, ConfigError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Any endpoint speaking the OpenAI chat-completions protocol.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ConfigError::InvalidSetting {
                name: "openai_client",
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Key from `OPENAI_API_KEY`, else the first line of `key_file`.
    pub fn load_api_key(key_file: &Path) -> Result<String, ConfigError> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key.trim().to_string());
            }
        }

        fs::read_to_string(key_file)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                env: API_KEY_ENV,
                path: key_file.to_path_buf(),
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        let backend = self.name().to_string();
        if e.is_timeout() {
            BackendError::Timeout {
                backend,
                message: e.to_string(),
            }
        } else {
            BackendError::Unavailable {
                backend,
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn submit(&self, prompt: &str) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(BackendError::from_status(self.name(), status.as_u16(), error_body));
        }

        let data: ChatResponse = response.json().await.map_err(|e| BackendError::InvalidReply {
            backend: self.name().to_string(),
            message: e.to_string(),
        })?;

        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::InvalidReply {
                backend: self.name().to_string(),
                message: "no choices in completion".to_string(),
            })?;

        debug!(model = %self.model, chars = content.len(), "openai reply");
        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}
