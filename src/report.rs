//! Plain-text digest of the ranked papers.

use crate::paper::{Evaluation, Paper, RankedResult};
use std::fmt::Write;

const SEPARATOR_WIDTH: usize = 70;

/// One digest entry.
pub fn render_paper(paper: &Paper, evaluation: &Evaluation) -> String {
    let mut out = String::new();
    let published = paper
        .published
        .map_or_else(|| "unknown".to_string(), |d| d.format("%Y-%m-%d").to_string());

    // writing into a String cannot fail
    let _ = writeln!(out, "Title: {}", paper.title);
    let _ = writeln!(out, "Authors: {}", paper.authors.join(", "));
    if !paper.affiliations.is_empty() {
        let _ = writeln!(out, "Affiliations:");
        for affiliation in &paper.affiliations {
            let _ = writeln!(out, "  - {}", affiliation);
        }
    }
    let _ = writeln!(out, "Journal: {}", paper.journal);
    let _ = writeln!(out, "Published: {}", published);
    let _ = writeln!(out, "URL: {}", paper.pdf_url);
    let _ = writeln!(out, "Abstract:\n{}", paper.abstract_text);
    let _ = writeln!(out, "Relevance Score: {}/{}", evaluation.relevance_score, Evaluation::MAX_SCORE);
    let _ = writeln!(out, "Relevant Topics: {}", evaluation.relevant_topics);
    if !evaluation.summary.is_empty() {
        let _ = writeln!(out, "Summary: {}", evaluation.summary);
    }
    let _ = write!(out, "Explanation:\n{}", evaluation.thoughts);
    out
}

/// All entries, best first, each closed by a separator line.
pub fn render_digest(results: &[RankedResult]) -> String {
    let separator = "=".repeat(SEPARATOR_WIDTH);
    results
        .iter()
        .map(|r| format!("{}\n{}\n", render_paper(&r.paper, &r.evaluation), separator))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::RelevantTopics;
    use chrono::NaiveDate;

    fn ranked(title: &str, score: u8) -> RankedResult {
        let mut paper = Paper::new(title);
        paper.authors = vec!["Xihong Lin".into(), "Jane Doe".into()];
        paper.push_affiliations(["Harvard University"]);
        paper.journal = "arXiv".into();
        paper.published = NaiveDate::from_ymd_opt(2024, 10, 2);
        paper.pdf_url = "http://arxiv.org/pdf/2410.01234v1".into();
        paper.abstract_text = "Abstract text.".into();
        RankedResult {
            paper,
            evaluation: Evaluation {
                relevance_score: score,
                thoughts: "Matches genomics.".into(),
                summary: "A model.".into(),
                relevant_topics: RelevantTopics::Listed(vec!["Genomics".into()]),
            },
        }
    }

    #[test]
    fn entry_lists_every_field() {
        let r = ranked("Polygenic transformers", 8);
        let text = render_paper(&r.paper, &r.evaluation);
        for needle in [
            "Title: Polygenic transformers",
            "Authors: Xihong Lin, Jane Doe",
            "  - Harvard University",
            "Journal: arXiv",
            "Published: 2024-10-02",
            "URL: http://arxiv.org/pdf/2410.01234v1",
            "Abstract:\nAbstract text.",
            "Relevance Score: 8/10",
            "Relevant Topics: Genomics",
            "Explanation:\nMatches genomics.",
        ] {
            assert!(text.contains(needle), "missing {needle:?} in\n{text}");
        }
    }

    #[test]
    fn preferred_papers_show_marker() {
        let mut r = ranked("By a favourite", 10);
        r.evaluation = Evaluation::preferred();
        let text = render_paper(&r.paper, &r.evaluation);
        assert!(text.contains("Relevant Topics: Preferred paper."));
    }

    #[test]
    fn digest_keeps_order_and_separates() {
        let digest = render_digest(&[ranked("first", 9), ranked("second", 7)]);
        let first = digest.find("Title: first").unwrap();
        let second = digest.find("Title: second").unwrap();
        assert!(first < second);
        assert_eq!(digest.matches(&"=".repeat(70)).count(), 2);
        assert!(render_digest(&[]).is_empty());
    }
}
