use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One candidate paper as delivered by a source connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub affiliations: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub published: Option<NaiveDate>,
    #[serde(default)]
    pub pdf_url: String,
}

impl Paper {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            authors: Vec::new(),
            affiliations: Vec::new(),
            abstract_text: String::new(),
            journal: String::new(),
            published: None,
            pdf_url: String::new(),
        }
    }

    /// Adds affiliations, skipping blanks and anything already present.
    pub fn push_affiliations<I, S>(&mut self, affiliations: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for affiliation in affiliations {
            let affiliation = affiliation.into();
            let trimmed = affiliation.trim();
            if !trimmed.is_empty() && !self.affiliations.iter().any(|a| a == trimmed) {
                self.affiliations.push(trimmed.to_string());
            }
        }
    }
}

/// Topics a judged paper touches, or the marker left by the preference override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelevantTopics {
    Listed(Vec<String>),
    PreferredOverride,
}

impl RelevantTopics {
    pub const OVERRIDE_MARKER: &'static str = "Preferred paper.";

    pub fn is_override(&self) -> bool {
        matches!(self, Self::PreferredOverride)
    }
}

impl Default for RelevantTopics {
    fn default() -> Self {
        Self::Listed(Vec::new())
    }
}

impl fmt::Display for RelevantTopics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listed(topics) => write!(f, "{}", topics.join(", ")),
            Self::PreferredOverride => f.write_str(Self::OVERRIDE_MARKER),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Always within 0..=10.
    pub relevance_score: u8,
    pub thoughts: String,
    pub summary: String,
    pub relevant_topics: RelevantTopics,
}

impl Evaluation {
    pub const MAX_SCORE: u8 = 10;
    pub const FALLBACK_THOUGHTS: &'static str = "Invalid JSON response from LLM after retry.";

    /// Synthetic verdict for papers by trusted authors or institutions.
    pub fn preferred() -> Self {
        Self {
            relevance_score: Self::MAX_SCORE,
            thoughts: "Paper by preferred author or from preferred affiliation".to_string(),
            summary: "See abstract for details.".to_string(),
            relevant_topics: RelevantTopics::PreferredOverride,
        }
    }

    /// Zero-score placeholder for a backend that never produced usable JSON.
    pub fn fallback(diagnostic: &str) -> Self {
        Self {
            relevance_score: 0,
            thoughts: format!("{} ({diagnostic})", Self::FALLBACK_THOUGHTS),
            summary: String::new(),
            relevant_topics: RelevantTopics::default(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.relevance_score == 0 && self.thoughts.starts_with(Self::FALLBACK_THOUGHTS)
    }
}

/// A paper that made it into the digest, with its verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub paper: Paper,
    pub evaluation: Evaluation,
}

impl RankedResult {
    pub fn score(&self) -> u8 {
        self.evaluation.relevance_score
    }
}
