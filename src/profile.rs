//! The single research profile every paper is judged against.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Loaded once at startup, then only ever borrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub research_topics: Vec<String>,
    pub research_interests: String,
    #[serde(default)]
    pub preferred_authors: Vec<String>,
    #[serde(default)]
    pub preferred_affiliations: Vec<String>,
    /// Scopes the PubMed query; empty means any journal.
    #[serde(default)]
    pub pubmed_journals: Vec<String>,
}

impl UserProfile {
    /// Reads and validates a JSON profile.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ProfileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let profile: Self =
            serde_json::from_str(&raw).map_err(|source| ConfigError::ProfileInvalid {
                path: path.to_path_buf(),
                source,
            })?;
        profile.validated()
    }

    /// Trims every entry, drops blanks and duplicates, then checks the required fields.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.research_topics = clean_set(self.research_topics);
        self.preferred_authors = clean_set(self.preferred_authors);
        self.preferred_affiliations = clean_set(self.preferred_affiliations);
        self.pubmed_journals = clean_set(self.pubmed_journals);
        self.research_interests = self.research_interests.trim().to_string();

        if self.research_topics.is_empty() {
            return Err(ConfigError::EmptyTopics);
        }
        if self.research_interests.is_empty() {
            return Err(ConfigError::EmptyInterests);
        }
        Ok(self)
    }
}

fn clean_set(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v.eq_ignore_ascii_case(value)) {
            out.push(value.to_string());
        }
    }
    out
}
