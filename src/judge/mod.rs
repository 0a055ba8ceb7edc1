//! Relevance judge: asks the backend for a structured verdict on one paper.
//!
//! Every paper goes through a small state machine:
//!
//! ```text
//! Unattempted -> Normalized -> Parsed
//!                    |
//!                    +--(parse error, repairs left)--> Repairing -> Normalized
//!                    +--(parse error, no repairs)----> Fallback
//! ```
//!
//! Transport failures are retried underneath by the [`RetryPolicy`]; only when
//! that gives up does [`RelevanceJudge::judge`] return a [`BackendError`].
//! Malformed replies never surface as errors: after the repair budget is spent
//! the paper gets a zero-score fallback evaluation.

pub mod parse;
pub mod prompt;

use crate::backend::CompletionBackend;
use crate::error::BackendError;
use crate::paper::{Evaluation, Paper};
use crate::profile::UserProfile;
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, warn};

pub use parse::{normalize, parse_evaluation, MalformedResponse};

/// How many repair prompts to send after a malformed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPolicy {
    max_repairs: u32,
}

impl RepairPolicy {
    pub fn new(max_repairs: u32) -> Self {
        Self { max_repairs }
    }

    pub fn max_repairs(&self) -> u32 {
        self.max_repairs
    }
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

enum JudgeState {
    Unattempted,
    Normalized(String),
    Parsed(Evaluation),
    Repairing,
    Fallback(MalformedResponse),
}

pub struct RelevanceJudge {
    backend: Arc<dyn CompletionBackend>,
    retry: RetryPolicy,
    repair: RepairPolicy,
    threshold: u8,
}

impl RelevanceJudge {
    pub fn new(backend: Arc<dyn CompletionBackend>, retry: RetryPolicy, repair: RepairPolicy) -> Self {
        Self {
            backend,
            retry,
            repair,
            threshold: 7,
        }
    }

    /// Threshold quoted to the model in the prompt. Default: `7`.
    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn judge(&self, paper: &Paper, profile: &UserProfile) -> Result<Evaluation, BackendError> {
        let request = prompt::evaluation_prompt(paper, profile, self.threshold);
        let mut repairs = 0;
        let mut state = JudgeState::Unattempted;

        loop {
            state = match state {
                JudgeState::Unattempted => {
                    let raw = self.submit(&request).await?;
                    JudgeState::Normalized(normalize(&raw))
                }
                JudgeState::Normalized(text) => match parse_evaluation(&text) {
                    Ok(evaluation) => JudgeState::Parsed(evaluation),
                    Err(err) if repairs < self.repair.max_repairs() => {
                        warn!(title = %paper.title, error = %err, "malformed evaluation, sending repair prompt");
                        debug!(reply = %text, "rejected reply");
                        JudgeState::Repairing
                    }
                    Err(err) => {
                        debug!(reply = %text, "rejected reply");
                        JudgeState::Fallback(err)
                    }
                },
                JudgeState::Repairing => {
                    repairs += 1;
                    let raw = self.submit(&prompt::repair_prompt(&request)).await?;
                    JudgeState::Normalized(normalize(&raw))
                }
                JudgeState::Parsed(evaluation) => {
                    debug!(title = %paper.title, score = evaluation.relevance_score, "paper judged");
                    return Ok(evaluation);
                }
                JudgeState::Fallback(err) => {
                    warn!(title = %paper.title, error = %err, repairs, "giving up on malformed replies, scoring 0");
                    return Ok(Evaluation::fallback(&err.to_string()));
                }
            };
        }
    }

    async fn submit(&self, prompt: &str) -> Result<String, BackendError> {
        let backend = &self.backend;
        self.retry
            .run(backend.name(), move || backend.submit(prompt))
            .await
    }
}
