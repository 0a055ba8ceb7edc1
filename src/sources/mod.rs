//! Paper source connectors.
//!
//! Each connector turns a [`SourceQuery`] into [`Paper`]s. They are thin:
//! query building, paging and response parsing, nothing else.

pub mod arxiv;
pub mod pubmed;
pub mod rxiv;

use crate::paper::Paper;
use crate::profile::UserProfile;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

pub use arxiv::ArxivSource;
pub use pubmed::PubMedSource;
pub use rxiv::{RxivServer, RxivSource};

/// What to look for and how far back.
#[derive(Debug, Clone)]
pub struct SourceQuery {
    pub since: NaiveDate,
    pub topics: Vec<String>,
    pub authors: Vec<String>,
    pub journals: Vec<String>,
    pub max_results: usize,
}

impl SourceQuery {
    pub fn from_profile(profile: &UserProfile, since: NaiveDate, max_results: usize) -> Self {
        Self {
            since,
            topics: profile.research_topics.clone(),
            authors: profile.preferred_authors.clone(),
            journals: profile.pubmed_journals.clone(),
            max_results,
        }
    }
}

#[async_trait]
pub trait PaperSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Paper>>;
}

/// Shared HTTP client for the connectors.
pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!("paper-digest/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?)
}

/// Builds a connector from its command-line name.
pub fn source_by_name(name: &str, client: &Client) -> Option<Box<dyn PaperSource>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "arxiv" => Some(Box::new(ArxivSource::new(client.clone()))),
        "pubmed" => Some(Box::new(PubMedSource::new(client.clone()))),
        "biorxiv" => Some(Box::new(RxivSource::new(client.clone(), RxivServer::Biorxiv))),
        "medrxiv" => Some(Box::new(RxivSource::new(client.clone(), RxivServer::Medrxiv))),
        _ => None,
    }
}

/// Queries every source in turn. A failing source is logged and skipped.
pub async fn collect_papers(sources: &[Box<dyn PaperSource>], query: &SourceQuery) -> Vec<Paper> {
    let mut papers = Vec::new();

    for source in sources {
        info!(source = source.name(), since = %query.since, "fetching papers");
        match source.fetch(query).await {
            Ok(found) => {
                info!(source = source.name(), found = found.len(), "fetched papers");
                papers.extend(found);
            }
            Err(e) => warn!(source = source.name(), error = %e, "source failed, continuing without it"),
        }
    }

    info!(total = papers.len(), "papers collected");
    papers
}

// Collapses the runs of whitespace and newlines feeds like to put inside titles.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
