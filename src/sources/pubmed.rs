use super::{squash_whitespace, PaperSource, SourceQuery};
use crate::paper::Paper;
use crate::retry::RetryPolicy;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{Month, NaiveDate};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const EUTILS: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// NCBI E-utilities: `esearch` for ids, then `efetch` for the records.
pub struct PubMedSource {
    http: Client,
    base: String,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct SearchReply {
    esearchresult: SearchResult,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedSource {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base: EUTILS.to_string(),
            // five tries, one second apart
            retry: RetryPolicy::fixed(5, Duration::from_secs(1)),
        }
    }

    fn build_term(query: &SourceQuery) -> String {
        let quoted = |items: &[String], tag: &str| {
            items
                .iter()
                .map(|s| format!("\"{}\"[{}]", s.trim(), tag))
                .collect::<Vec<_>>()
                .join(" OR ")
        };

        let mut subject = quoted(&query.topics, "Title/Abstract");
        if !query.authors.is_empty() {
            subject = format!("{} OR {}", subject, quoted(&query.authors, "Author"));
        }

        let mut clauses = vec![format!("({subject})")];
        if !query.journals.is_empty() {
            clauses.push(format!("({})", quoted(&query.journals, "Journal")));
        }
        clauses.push(format!(
            "(\"{}\"[epdat] : \"3000\"[epdat])",
            query.since.format("%Y/%m/%d")
        ));
        clauses.push("(\"Journal Article\"[Publication Type])".to_string());
        clauses.join(" AND ")
    }

    async fn search(&self, term: &str, max_results: usize) -> Result<Vec<String>> {
        let retmax = max_results.to_string();
        let resp = self
            .http
            .get(format!("{}/esearch.fcgi", self.base))
            .query(&[
                ("db", "pubmed"),
                ("retmode", "json"),
                ("sort", "pub_date"),
                ("retmax", retmax.as_str()),
                ("term", term),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("PubMed esearch error: HTTP {}", status));
        }
        let reply: SearchReply = resp.json().await.context("PubMed esearch reply")?;
        Ok(reply.esearchresult.idlist)
    }

    async fn fetch_records(&self, ids: &str) -> Result<String> {
        let resp = self
            .http
            .get(format!("{}/efetch.fcgi", self.base))
            .query(&[("db", "pubmed"), ("retmode", "xml"), ("id", ids)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("PubMed efetch error: HTTP {}", status));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PaperSource for PubMedSource {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Paper>> {
        let term = Self::build_term(query);
        debug!(term = %term, "PubMed search");

        let this = self;
        let term = term.as_str();
        let max_results = query.max_results;
        let ids = self
            .retry
            .run("pubmed esearch", move || this.search(term, max_results))
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = ids.join(",");
        let id_list = ids.as_str();
        let xml = self
            .retry
            .run("pubmed efetch", move || this.fetch_records(id_list))
            .await?;
        parse_pubmed_xml(&xml)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Pmid,
    ArticleTitle,
    AbstractText,
    JournalTitle,
    ForeName,
    LastName,
    Affiliation,
    Year,
    Month,
    Day,
}

#[derive(Default)]
struct PartialDate {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
}

impl PartialDate {
    fn to_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }
}

#[derive(Default)]
struct Record {
    pmid: String,
    title: String,
    abstract_parts: Vec<String>,
    journal: String,
    authors: Vec<String>,
    affiliations: Vec<String>,
    fore_name: String,
    last_name: String,
    article_date: PartialDate,
    pub_date: PartialDate,
}

impl Record {
    fn into_paper(self) -> Paper {
        let mut paper = Paper::new(self.title);
        paper.authors = self.authors;
        paper.push_affiliations(self.affiliations);
        paper.abstract_text = self.abstract_parts.join(" ");
        paper.journal = self.journal;
        paper.published = self.article_date.to_date().or_else(|| self.pub_date.to_date());
        if !self.pmid.is_empty() {
            paper.pdf_url = format!("https://pubmed.ncbi.nlm.nih.gov/{}/", self.pmid);
        }
        paper
    }
}

// "10", "Oct" and "October" all show up in PubMed dates.
fn parse_month(raw: &str) -> Option<u32> {
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<Month>().ok().map(|m| m.number_from_month()))
}

fn capture_for(name: &str, parent: &str, grandparent: &str) -> Option<Capture> {
    let in_date = matches!(parent, "ArticleDate" | "PubDate");
    match name {
        "PMID" if parent == "MedlineCitation" => Some(Capture::Pmid),
        "ArticleTitle" => Some(Capture::ArticleTitle),
        "AbstractText" => Some(Capture::AbstractText),
        "Title" if parent == "Journal" => Some(Capture::JournalTitle),
        "ForeName" if parent == "Author" => Some(Capture::ForeName),
        "LastName" if parent == "Author" => Some(Capture::LastName),
        "Affiliation" if grandparent == "Author" => Some(Capture::Affiliation),
        "Year" if in_date => Some(Capture::Year),
        "Month" if in_date => Some(Capture::Month),
        "Day" if in_date => Some(Capture::Day),
        _ => None,
    }
}

/// Papers out of an `efetch` PubmedArticleSet document.
pub(crate) fn parse_pubmed_xml(xml: &str) -> Result<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut papers = Vec::new();

    let mut path: Vec<String> = Vec::new();
    let mut record: Option<Record> = None;
    let mut capture: Option<(Capture, usize)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name == "PubmedArticle" {
                    record = Some(Record::default());
                } else if name == "Author" {
                    if let Some(r) = record.as_mut() {
                        r.fore_name.clear();
                        r.last_name.clear();
                    }
                }

                let parent = path.last().map_or("", String::as_str);
                let grandparent = path.len().checked_sub(2).map_or("", |i| path[i].as_str());
                if capture.is_none() && record.is_some() {
                    if let Some(kind) = capture_for(&name, parent, grandparent) {
                        capture = Some((kind, path.len() + 1));
                        text.clear();
                    }
                }
                path.push(name);
            }
            Ok(Event::Text(t)) if capture.is_some() => {
                let chunk = t
                    .unescape()
                    .map_err(|e| anyhow!("bad text in PubMed record: {e}"))?;
                text.push_str(&chunk);
                text.push(' ');
            }
            Ok(Event::End(_)) => {
                let depth = path.len();
                let name = path.pop().unwrap_or_default();

                if let (Some((kind, at)), Some(r)) = (capture, record.as_mut()) {
                    if at == depth {
                        let value = squash_whitespace(&text);
                        let date = match path.last().map(String::as_str) {
                            Some("ArticleDate") => &mut r.article_date,
                            _ => &mut r.pub_date,
                        };
                        match kind {
                            Capture::Pmid => r.pmid = value,
                            Capture::ArticleTitle => r.title = value,
                            Capture::AbstractText => r.abstract_parts.push(value),
                            Capture::JournalTitle => r.journal = value,
                            Capture::ForeName => r.fore_name = value,
                            Capture::LastName => r.last_name = value,
                            Capture::Affiliation => r.affiliations.push(value),
                            Capture::Year => date.year = value.parse().ok(),
                            Capture::Month => date.month = parse_month(&value),
                            Capture::Day => date.day = value.parse().ok(),
                        }
                        capture = None;
                        text.clear();
                    }
                }

                match name.as_str() {
                    "Author" => {
                        if let Some(r) = record.as_mut() {
                            let full = squash_whitespace(&format!("{} {}", r.fore_name, r.last_name));
                            if !full.is_empty() {
                                r.authors.push(full);
                            }
                        }
                    }
                    "PubmedArticle" => {
                        if let Some(r) = record.take() {
                            papers.push(r.into_paper());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(papers)
}
