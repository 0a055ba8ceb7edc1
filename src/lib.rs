//! Literature triage: fetch recent papers, let a language model judge each one
//! against a research profile, and keep the relevant ones best first.

pub mod backend;
pub mod config;
pub mod error;
pub mod judge;
pub mod paper;
pub mod preference;
pub mod profile;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod snapshot;
pub mod sources;

pub use backend::CompletionBackend;
pub use config::EvaluationConfig;
pub use error::{BackendError, ConfigError};
pub use judge::{RelevanceJudge, RepairPolicy};
pub use paper::{Evaluation, Paper, RankedResult, RelevantTopics};
pub use preference::{is_preferred, PreferenceMatcher};
pub use profile::UserProfile;
pub use retry::RetryPolicy;
pub use scheduler::evaluate_all;
