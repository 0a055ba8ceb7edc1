use super::{squash_whitespace, PaperSource, SourceQuery};
use crate::paper::Paper;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::debug;

const API_URL: &str = "https://api.biorxiv.org/details";

/// Both preprint servers share one API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxivServer {
    Biorxiv,
    Medrxiv,
}

impl RxivServer {
    fn slug(self) -> &'static str {
        match self {
            Self::Biorxiv => "biorxiv",
            Self::Medrxiv => "medrxiv",
        }
    }
}

impl fmt::Display for RxivServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Biorxiv => f.write_str("bioRxiv"),
            Self::Medrxiv => f.write_str("medRxiv"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DetailsPage {
    #[serde(default)]
    messages: Vec<PageMessage>,
    #[serde(default)]
    collection: Vec<Preprint>,
}

#[derive(Debug, Deserialize)]
struct PageMessage {
    #[serde(default)]
    total: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Preprint {
    doi: String,
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default)]
    author_corresponding_institution: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    category: String,
    #[serde(rename = "abstract", default)]
    abstract_text: String,
}

pub struct RxivSource {
    http: Client,
    server: RxivServer,
    base: String,
}

impl RxivSource {
    pub fn new(http: Client, server: RxivServer) -> Self {
        Self {
            http,
            server,
            base: API_URL.to_string(),
        }
    }

    async fn page(&self, since: NaiveDate, until: NaiveDate, cursor: usize) -> Result<DetailsPage> {
        let url = format!(
            "{}/{}/{}/{}/{}",
            self.base,
            self.server.slug(),
            since.format("%Y-%m-%d"),
            until.format("%Y-%m-%d"),
            cursor
        );
        let resp = self.http.get(&url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("{} API error: HTTP {}", self.server, status));
        }
        resp.json()
            .await
            .with_context(|| format!("{} details page at cursor {}", self.server, cursor))
    }
}

#[async_trait]
impl PaperSource for RxivSource {
    fn name(&self) -> &'static str {
        self.server.slug()
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Paper>> {
        let until = Local::now().date_naive();
        let mut papers = Vec::new();
        let mut cursor = 0;

        // the API has no search; page through the window and filter locally
        while papers.len() < query.max_results {
            let page = self.page(query.since, until, cursor).await?;
            if !absorb_page(&mut papers, &mut cursor, page, query, self.server) {
                break;
            }
        }
        Ok(papers)
    }
}

/// Folds one details page into `papers` and advances `cursor`.
/// Returns whether another page is worth fetching.
fn absorb_page(
    papers: &mut Vec<Paper>,
    cursor: &mut usize,
    page: DetailsPage,
    query: &SourceQuery,
    server: RxivServer,
) -> bool {
    if page.collection.is_empty() {
        return false;
    }
    *cursor += page.collection.len();
    let total = page.messages.first().and_then(|m| m.total.as_ref()).and_then(as_count);

    for preprint in page.collection {
        if papers.len() >= query.max_results {
            break;
        }
        if matches_topics(&preprint, &query.topics) {
            papers.push(to_paper(preprint, server));
        }
    }

    debug!(%server, cursor = *cursor, ?total, kept = papers.len(), "details page");
    papers.len() < query.max_results && !total.is_some_and(|t| *cursor >= t)
}

// The API reports counts as numbers on some endpoints and strings on others.
fn as_count(value: &serde_json::Value) -> Option<usize> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn matches_topics(preprint: &Preprint, topics: &[String]) -> bool {
    let haystack = format!(
        "{} {} {}",
        preprint.title, preprint.abstract_text, preprint.category
    )
    .to_lowercase();
    topics
        .iter()
        .map(|t| t.trim().to_lowercase())
        .any(|t| !t.is_empty() && haystack.contains(&t))
}

// "Lin, X.; Doe, J." -> ["X. Lin", "J. Doe"]
fn split_authors(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| match a.split_once(',') {
            Some((last, first)) if !first.trim().is_empty() => {
                format!("{} {}", first.trim(), last.trim())
            }
            _ => a.trim_end_matches(',').to_string(),
        })
        .collect()
}

fn to_paper(preprint: Preprint, server: RxivServer) -> Paper {
    let version = if preprint.version.is_empty() { "1" } else { &preprint.version };
    let mut paper = Paper::new(squash_whitespace(&preprint.title));
    paper.authors = split_authors(&preprint.authors);
    paper.push_affiliations([preprint.author_corresponding_institution.as_str()]);
    paper.abstract_text = squash_whitespace(&preprint.abstract_text);
    paper.journal = server.to_string();
    paper.published = NaiveDate::parse_from_str(&preprint.date, "%Y-%m-%d").ok();
    paper.pdf_url = format!(
        "https://www.{}.org/content/{}v{}.full.pdf",
        server.slug(),
        preprint.doi,
        version
    );
    paper
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
      "messages": [{"status": "ok", "interval": "2024-10-01:2024-10-04", "cursor": 0, "count": 2, "total": "2"}],
      "collection": [
        {
          "doi": "10.1101/2024.10.01.615000",
          "title": "Single-cell  atlas of\n the aging kidney",
          "authors": "Lin, X.; Doe, J.; Consortium,",
          "author_corresponding": "Xihong Lin",
          "author_corresponding_institution": "Harvard University",
          "date": "2024-10-02",
          "version": "2",
          "type": "new results",
          "category": "genomics",
          "abstract": "We profile kidneys."
        },
        {
          "doi": "10.1101/2024.10.01.615001",
          "title": "Bird song dialects",
          "authors": "Smith, A.",
          "author_corresponding_institution": "",
          "date": "2024-10-03",
          "version": "1",
          "category": "animal behavior and cognition",
          "abstract": "Finches sing."
        }
      ]
    }"#;

    fn query(max_results: usize) -> SourceQuery {
        SourceQuery {
            since: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            topics: vec!["Genomics".into()],
            authors: vec![],
            journals: vec![],
            max_results,
        }
    }

    fn details(titles: &[&str], total: Option<usize>) -> DetailsPage {
        let collection: Vec<serde_json::Value> = titles
            .iter()
            .enumerate()
            .map(|(i, title)| {
                serde_json::json!({
                    "doi": format!("10.1101/2024.10.01.{i}"),
                    "title": title,
                    "category": "genomics",
                    "date": "2024-10-02",
                    "version": "1"
                })
            })
            .collect();
        let messages = match total {
            Some(t) => serde_json::json!([{ "status": "ok", "total": t }]),
            None => serde_json::json!([]),
        };
        serde_json::from_value(serde_json::json!({
            "messages": messages,
            "collection": collection
        }))
        .unwrap()
    }

    fn absorb(papers: &mut Vec<Paper>, cursor: &mut usize, page: DetailsPage, max: usize) -> bool {
        absorb_page(papers, cursor, page, &query(max), RxivServer::Biorxiv)
    }

    #[test]
    fn paging_stops_on_empty_page() {
        let mut papers = Vec::new();
        let mut cursor = 100;
        let more = absorb(&mut papers, &mut cursor, details(&[], Some(500)), 5);
        assert!(!more);
        assert_eq!(cursor, 100);
        assert!(papers.is_empty());
    }

    #[test]
    fn paging_stops_at_reported_total() {
        let mut papers = Vec::new();
        let mut cursor = 0;

        let more = absorb(&mut papers, &mut cursor, details(&["a", "b"], Some(4)), 10);
        assert!(more);
        assert_eq!(cursor, 2);

        let more = absorb(&mut papers, &mut cursor, details(&["c", "d"], Some(4)), 10);
        assert!(!more);
        assert_eq!(cursor, 4);
        assert_eq!(papers.len(), 4);
    }

    #[test]
    fn paging_continues_without_a_total() {
        let mut papers = Vec::new();
        let mut cursor = 0;
        let page = details(&["a"], None);
        let more = absorb_page(&mut papers, &mut cursor, page, &query(10), RxivServer::Medrxiv);
        assert!(more);
        assert_eq!(papers[0].journal, "medRxiv");
    }

    #[test]
    fn paging_stops_once_max_results_are_kept() {
        let mut papers = Vec::new();
        let mut cursor = 0;
        let more = absorb(&mut papers, &mut cursor, details(&["a", "b", "c"], Some(300)), 2);
        assert!(!more);
        let titles: Vec<&str> = papers.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert_eq!(cursor, 3);
    }

    #[test]
    fn page_deserializes() {
        let page: DetailsPage = serde_json::from_str(PAGE).unwrap();
        assert_eq!(page.collection.len(), 2);
        assert_eq!(page.messages[0].total.as_ref().and_then(as_count), Some(2));
    }

    #[test]
    fn converts_and_filters_preprints() {
        let page: DetailsPage = serde_json::from_str(PAGE).unwrap();
        let topics = vec!["Genomics".to_string()];

        let kept: Vec<Paper> = page
            .collection
            .into_iter()
            .filter(|p| matches_topics(p, &topics))
            .map(|p| to_paper(p, RxivServer::Biorxiv))
            .collect();

        assert_eq!(kept.len(), 1);
        let paper = &kept[0];
        assert_eq!(paper.title, "Single-cell atlas of the aging kidney");
        assert_eq!(paper.authors, vec!["X. Lin", "J. Doe", "Consortium"]);
        assert_eq!(paper.affiliations, vec!["Harvard University"]);
        assert_eq!(paper.journal, "bioRxiv");
        assert_eq!(paper.published, NaiveDate::from_ymd_opt(2024, 10, 2));
        assert_eq!(
            paper.pdf_url,
            "https://www.biorxiv.org/content/10.1101/2024.10.01.615000v2.full.pdf"
        );
    }

    #[test]
    fn blank_institution_is_not_an_affiliation() {
        let page: DetailsPage = serde_json::from_str(PAGE).unwrap();
        let bird = page.collection.into_iter().nth(1).unwrap();
        let paper = to_paper(bird, RxivServer::Medrxiv);
        assert!(paper.affiliations.is_empty());
        assert_eq!(paper.journal, "medRxiv");
        assert!(paper.pdf_url.starts_with("https://www.medrxiv.org/content/"));
    }
}
