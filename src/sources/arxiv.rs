use super::{squash_whitespace, PaperSource, SourceQuery};
use crate::paper::Paper;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use tracing::debug;

const API_URL: &str = "https://export.arxiv.org/api/query";

pub struct ArxivSource {
    http: Client,
    base: String,
}

impl ArxivSource {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base: API_URL.to_string(),
        }
    }

    /// `abs:"topic" OR ... OR au:"author" OR ...`
    fn build_query(query: &SourceQuery) -> String {
        query
            .topics
            .iter()
            .map(|t| format!("abs:\"{}\"", t.trim()))
            .chain(query.authors.iter().map(|a| format!("au:\"{}\"", a.trim())))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Paper>> {
        let search_query = Self::build_query(query);
        debug!(query = %search_query, "arXiv search");

        let max_results = query.max_results.to_string();
        let resp = self
            .http
            .get(&self.base)
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .header(reqwest::header::ACCEPT, "application/atom+xml")
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("arXiv API error: HTTP {}", status));
        }

        let feed = resp.text().await?;
        Ok(take_window(parse_atom_feed(&feed)?, query.since))
    }
}

// Entries arrive newest first, so the first stale one ends the window.
fn take_window(entries: Vec<(Option<NaiveDate>, Paper)>, since: NaiveDate) -> Vec<Paper> {
    entries
        .into_iter()
        .take_while(|(published, _)| !published.is_some_and(|d| d < since))
        .map(|(_, paper)| paper)
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Summary,
    Published,
    AuthorName,
    Affiliation,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Self::Title),
            b"summary" => Some(Self::Summary),
            b"published" => Some(Self::Published),
            b"name" => Some(Self::AuthorName),
            b"affiliation" => Some(Self::Affiliation),
            _ => None,
        }
    }

    fn tag(self) -> &'static [u8] {
        match self {
            Self::Title => b"title",
            Self::Summary => b"summary",
            Self::Published => b"published",
            Self::AuthorName => b"name",
            Self::Affiliation => b"affiliation",
        }
    }
}

// Drops the namespace prefix: `arxiv:affiliation` -> `affiliation`.
fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

fn pdf_link(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut is_pdf = false;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"title" if value.eq_ignore_ascii_case("pdf") => is_pdf = true,
            b"type" if value.contains("pdf") => is_pdf = true,
            _ => {}
        }
    }
    href.filter(|_| is_pdf)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.date_naive())
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

/// Entries of an arXiv Atom feed, each with its publication date.
pub(crate) fn parse_atom_feed(xml: &str) -> Result<Vec<(Option<NaiveDate>, Paper)>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    let mut current: Option<Paper> = None;
    let mut published = String::new();
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"entry" => {
                    current = Some(Paper::new(""));
                    published.clear();
                    field = None;
                }
                b"link" => {
                    if let (Some(paper), Some(href)) = (current.as_mut(), pdf_link(&e)) {
                        paper.pdf_url = href;
                    }
                }
                tag if current.is_some() => {
                    if let Some(f) = Field::from_tag(tag) {
                        field = Some(f);
                        text.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if local_name(e.name().as_ref()) == b"link" {
                    if let (Some(paper), Some(href)) = (current.as_mut(), pdf_link(&e)) {
                        paper.pdf_url = href;
                    }
                }
            }
            Ok(Event::Text(t)) if field.is_some() => {
                let chunk = t
                    .unescape()
                    .map_err(|e| anyhow!("bad text in arXiv feed: {e}"))?;
                text.push_str(&chunk);
            }
            Ok(Event::End(e)) => {
                let tag = local_name(e.name().as_ref()).to_vec();
                if tag == b"entry" {
                    if let Some(mut paper) = current.take() {
                        paper.journal = "arXiv".to_string();
                        out.push((parse_date(&published), paper));
                    }
                    field = None;
                } else if let (Some(f), Some(paper)) = (field, current.as_mut()) {
                    if f.tag() == tag.as_slice() {
                        let value = squash_whitespace(&text);
                        match f {
                            Field::Title => paper.title = value,
                            Field::Summary => paper.abstract_text = value,
                            Field::Published => published = value,
                            Field::AuthorName => paper.authors.push(value),
                            Field::Affiliation => paper.push_affiliations([value]),
                        }
                        field = None;
                        text.clear();
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=abs:"Genomics"</title>
  <entry>
    <id>http://arxiv.org/abs/2410.01234v1</id>
    <updated>2024-10-02T12:00:00Z</updated>
    <published>2024-10-02T12:00:00Z</published>
    <title>Transformers for
      polygenic risk &amp; ancestry</title>
    <summary>  We fit a
      transformer to biobank genotypes.  </summary>
    <author>
      <name>Xihong Lin</name>
      <arxiv:affiliation>Harvard University</arxiv:affiliation>
    </author>
    <author><name>Jane Doe</name></author>
    <link href="http://arxiv.org/abs/2410.01234v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2410.01234v1" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="q-bio.GN" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2409.09999v2</id>
    <published>2024-09-20T08:00:00Z</published>
    <title>Older work</title>
    <summary>Old.</summary>
    <author><name>Someone</name></author>
  </entry>
</feed>
"#;

    #[test]
    fn parses_entries() {
        let entries = parse_atom_feed(FEED).expect("parse");
        assert_eq!(entries.len(), 2);

        let (published, paper) = &entries[0];
        assert_eq!(*published, NaiveDate::from_ymd_opt(2024, 10, 2));
        assert_eq!(paper.title, "Transformers for polygenic risk & ancestry");
        assert_eq!(paper.abstract_text, "We fit a transformer to biobank genotypes.");
        assert_eq!(paper.authors, vec!["Xihong Lin", "Jane Doe"]);
        assert_eq!(paper.affiliations, vec!["Harvard University"]);
        assert_eq!(paper.pdf_url, "http://arxiv.org/pdf/2410.01234v1");
        assert_eq!(paper.journal, "arXiv");

        assert_eq!(entries[1].1.title, "Older work");
        assert!(entries[1].1.affiliations.is_empty());
    }

    #[test]
    fn query_joins_topics_and_authors() {
        let query = SourceQuery {
            since: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            topics: vec!["Genomics".into(), "Deep Learning".into()],
            authors: vec!["Xihong Lin".into()],
            journals: vec![],
            max_results: 5,
        };
        assert_eq!(
            ArxivSource::build_query(&query),
            r#"abs:"Genomics" OR abs:"Deep Learning" OR au:"Xihong Lin""#
        );
    }

    #[test]
    fn window_stops_at_first_stale_entry() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 10, d);
        let entries = vec![
            (day(4), Paper::new("newest")),
            (None, Paper::new("undated")),
            (day(1), Paper::new("on the boundary")),
            (NaiveDate::from_ymd_opt(2024, 9, 30), Paper::new("stale")),
            (day(3), Paper::new("after the stale one")),
        ];
        let kept = take_window(entries, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        let titles: Vec<&str> = kept.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["newest", "undated", "on the boundary"]);
    }

    #[test]
    fn feed_entries_outside_window_are_dropped() {
        let entries = parse_atom_feed(FEED).unwrap();
        let kept = take_window(entries, NaiveDate::from_ymd_opt(2024, 10, 1).unwrap());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "Transformers for polygenic risk & ancestry");
    }

    #[test]
    fn dates_accept_plain_days() {
        assert_eq!(parse_date("2024-10-02"), NaiveDate::from_ymd_opt(2024, 10, 2));
        assert_eq!(parse_date("garbage"), None);
    }
}
