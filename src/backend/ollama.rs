use super::CompletionBackend;
use crate::error::{BackendError, ConfigError};
use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::Ollama;
use reqwest::Url;
use tracing::{debug, info, warn};

/// Local Ollama server.
pub struct OllamaBackend {
    ollama: Ollama,
    model: String,
}

impl OllamaBackend {
    pub fn new(host: &str, port: u16, model: impl Into<String>) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidSetting {
            name: "ollama_host",
            reason,
        };
        let mut url = Url::parse(host).map_err(|e| invalid(format!("{host}: {e}")))?;
        url.set_port(Some(port))
            .map_err(|_| invalid(format!("{host} cannot carry a port")))?;

        Ok(Self {
            ollama: Ollama::from_url(url),
            model: model.into(),
        })
    }

    /// Checks the server answers before a run starts. Failure only warns: the
    /// retry policy gets its own chance later.
    pub async fn check_available(&self) -> bool {
        match self.ollama.list_local_models().await {
            Ok(models) => {
                let present = models.iter().any(|m| m.name == self.model);
                if present {
                    info!(model = %self.model, "Ollama available");
                } else {
                    warn!(model = %self.model, "Ollama reachable but model is not pulled");
                }
                true
            }
            Err(e) => {
                warn!(error = %e, "Ollama not reachable");
                false
            }
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn submit(&self, prompt: &str) -> Result<String, BackendError> {
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());

        match self.ollama.generate(request).await {
            Ok(response) => {
                debug!(model = %self.model, chars = response.response.len(), "ollama reply");
                Ok(response.response)
            }
            // ollama-rs folds transport and server errors together; all of them
            // are worth another try
            Err(e) => Err(BackendError::Unavailable {
                backend: self.name().to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
