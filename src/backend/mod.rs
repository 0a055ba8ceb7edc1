//! Text-completion backends used by the relevance judge.
//!
//! The judge only ever needs one thing from a model: send a prompt, get text
//! back. Retries, repair prompts and parsing all live above this boundary.

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod openai;

use crate::error::BackendError;
use async_trait::async_trait;

#[cfg(any(test, feature = "mock"))]
pub use mock::ScriptedBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// A stateless prompt-in, text-out model endpoint.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn submit(&self, prompt: &str) -> Result<String, BackendError>;

    /// Short label for logs.
    fn name(&self) -> &str;
}
