//! Tunables for the evaluation stage.

use crate::error::ConfigError;
use crate::judge::RepairPolicy;
use crate::retry::RetryPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Papers per batch. Default: `5`.
    pub batch_size: usize,

    /// Sleep after each batch finishes. Default: 3 s.
    pub inter_batch_delay: Duration,

    /// Minimum score that makes the digest. Default: `7`.
    pub relevance_threshold: u8,

    /// Attempts per backend call, first one included. Default: `10`.
    pub max_transient_retries: u32,

    /// Lower bound of the randomized backoff. Default: 1 s.
    pub min_backoff: Duration,

    /// Upper bound of the randomized backoff. Default: 60 s.
    pub max_backoff: Duration,

    /// Repair prompts sent after a malformed reply. Default: `1`.
    pub repair_attempts: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            inter_batch_delay: Duration::from_secs(3),
            relevance_threshold: 7,
            max_transient_retries: 10,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            repair_attempts: 1,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.relevance_threshold > crate::paper::Evaluation::MAX_SCORE {
            return Err(ConfigError::InvalidSetting {
                name: "relevance_threshold",
                reason: format!("{} is above the maximum score of 10", self.relevance_threshold),
            });
        }
        if self.max_transient_retries == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "max_transient_retries",
                reason: "must allow at least one attempt".to_string(),
            });
        }
        if self.min_backoff > self.max_backoff {
            return Err(ConfigError::InvalidSetting {
                name: "min_backoff",
                reason: format!(
                    "{:?} exceeds max_backoff {:?}",
                    self.min_backoff, self.max_backoff
                ),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_transient_retries, self.min_backoff, self.max_backoff)
    }

    pub fn repair_policy(&self) -> RepairPolicy {
        RepairPolicy::new(self.repair_attempts)
    }
}
