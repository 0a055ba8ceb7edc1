use super::CompletionBackend;
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str) -> Result<String, BackendError> + Send + Sync>;

enum Script {
    Queue(VecDeque<Result<String, BackendError>>),
    Responder(Responder),
}

/// In-memory backend for tests: replays queued replies or answers through a closure.
/// Every prompt it receives is recorded.
pub struct ScriptedBackend {
    script: Mutex<Script>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Replies are handed out in order; once they run out every call is `Unavailable`.
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, BackendError>>,
    {
        Self::with_script(Script::Queue(replies.into_iter().collect()))
    }

    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())))
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, BackendError> + Send + Sync + 'static,
    {
        Self::with_script(Script::Responder(Box::new(f)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Convenience for building a transient failure.
    pub fn outage() -> BackendError {
        BackendError::Unavailable {
            backend: "scripted".to_string(),
            message: "simulated outage".to_string(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn submit(&self, prompt: &str) -> Result<String, BackendError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let mut script = self.script.lock().map_err(|_| BackendError::Unavailable {
            backend: "scripted".to_string(),
            message: "script lock poisoned".to_string(),
        })?;

        match &mut *script {
            Script::Queue(queue) => queue.pop_front().unwrap_or_else(|| {
                Err(BackendError::Unavailable {
                    backend: "scripted".to_string(),
                    message: "script exhausted".to_string(),
                })
            }),
            Script::Responder(f) => f(prompt),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
