//! Preference override: papers by trusted people or institutions skip the judge.

use crate::error::ConfigError;
use crate::paper::{Evaluation, Paper};
use crate::profile::UserProfile;
use regex::Regex;

// Ignored when comparing author names.
const NAME_NOISE: &[&str] = &[
    "dr", "prof", "professor", "mr", "mrs", "ms", "jr", "sr", "ii", "iii", "phd", "md",
];

/// Compiled form of the profile's preferred authors and affiliations.
#[derive(Debug, Clone)]
pub struct PreferenceMatcher {
    authors: Vec<Vec<String>>,
    affiliations: Vec<Regex>,
}

impl PreferenceMatcher {
    pub fn new(profile: &UserProfile) -> Result<Self, ConfigError> {
        let authors = profile
            .preferred_authors
            .iter()
            .map(|name| name_key(name))
            .filter(|key| !key.is_empty())
            .collect();

        let affiliations = profile
            .preferred_affiliations
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| phrase_regex(a))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            authors,
            affiliations,
        })
    }

    pub fn matches(&self, paper: &Paper) -> bool {
        self.matches_author(paper) || self.matches_affiliation(paper)
    }

    fn matches_author(&self, paper: &Paper) -> bool {
        if self.authors.is_empty() {
            return false;
        }
        paper.authors.iter().any(|author| {
            let key = name_key(author);
            !key.is_empty() && self.authors.contains(&key)
        })
    }

    fn matches_affiliation(&self, paper: &Paper) -> bool {
        paper
            .affiliations
            .iter()
            .any(|affiliation| self.affiliations.iter().any(|re| re.is_match(affiliation)))
    }

    /// Returns the synthetic verdict when the paper is preferred.
    pub fn evaluate(&self, paper: &Paper) -> Option<Evaluation> {
        self.matches(paper).then(Evaluation::preferred)
    }
}

/// One-shot check. Prefer building a [`PreferenceMatcher`] when checking many papers.
pub fn is_preferred(paper: &Paper, profile: &UserProfile) -> bool {
    PreferenceMatcher::new(profile)
        .map(|m| m.matches(paper))
        .unwrap_or(false)
}

// Lowercased significant name words, sorted so "Lin, Xihong" == "Xihong Lin".
// Bracketed detail is dropped and dots vanish, so "M.D." is the noise word "md".
fn name_key(name: &str) -> Vec<String> {
    let mut words: Vec<String> = strip_brackets(name)
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|w| w.replace('.', "").to_lowercase())
        .filter(|w| !w.is_empty())
        .filter(|w| !NAME_NOISE.contains(&w.as_str()))
        .filter(|w| w.chars().filter(|c| c.is_alphabetic()).count() > 1)
        .collect();
    words.sort();
    words
}

fn strip_brackets(name: &str) -> String {
    let mut depth = 0usize;
    let mut kept = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => kept.push(c),
            _ => {}
        }
    }
    kept
}

// Whole-word, case-insensitive phrase; any run of whitespace in the phrase matches any other.
fn phrase_regex(phrase: &str) -> Result<Regex, ConfigError> {
    let body = phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    Regex::new(&format!(r"(?i)(?:^|\W){body}(?:\W|$)")).map_err(|source| {
        ConfigError::InvalidPreference {
            value: phrase.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(authors: &[&str], affiliations: &[&str]) -> UserProfile {
        UserProfile {
            research_topics: vec!["Genomics".into()],
            research_interests: "genetics".into(),
            preferred_authors: authors.iter().map(|s| s.to_string()).collect(),
            preferred_affiliations: affiliations.iter().map(|s| s.to_string()).collect(),
            pubmed_journals: vec![],
        }
    }

    fn paper(authors: &[&str], affiliations: &[&str]) -> Paper {
        let mut p = Paper::new("A paper");
        p.authors = authors.iter().map(|s| s.to_string()).collect();
        p.push_affiliations(affiliations.iter().copied());
        p
    }

    #[test]
    fn exact_author_matches_case_insensitively() {
        let prof = profile(&["Xihong Lin"], &[]);
        assert!(is_preferred(&paper(&["Jane Doe", "XIHONG LIN"], &[]), &prof));
    }

    #[test]
    fn author_fragment_does_not_match() {
        let prof = profile(&["Lin"], &[]);
        assert!(!is_preferred(&paper(&["Al Lin"], &[]), &prof));

        let prof = profile(&["Xihong Lin"], &[]);
        assert!(!is_preferred(&paper(&["Lin"], &[]), &prof));
        assert!(!is_preferred(&paper(&["Xihong Linton"], &[]), &prof));
    }

    #[test]
    fn author_tolerates_initials_titles_and_order() {
        let prof = profile(&["Xihong Lin"], &[]);
        assert!(is_preferred(&paper(&["Prof. Xihong X. Lin"], &[]), &prof));
        assert!(is_preferred(&paper(&["Lin, Xihong"], &[]), &prof));
    }

    #[test]
    fn author_ignores_bracketed_detail_and_dotted_suffixes() {
        let prof = profile(&["Xihong Lin"], &[]);
        assert!(is_preferred(&paper(&["Xihong Lin (Harvard)"], &[]), &prof));
        assert!(is_preferred(&paper(&["Xihong Lin [corresponding]"], &[]), &prof));
        assert!(is_preferred(&paper(&["Xihong Lin, M.D."], &[]), &prof));
        assert!(is_preferred(&paper(&["Dr. Xihong Lin, Ph.D."], &[]), &prof));
        assert!(!is_preferred(&paper(&["Xihong (Lin)"], &[]), &prof));

        let prof = profile(&["Lin"], &[]);
        assert!(!is_preferred(&paper(&["Al Lin (MIT)"], &[]), &prof));
    }

    #[test]
    fn affiliation_matches_whole_words_inside_longer_names() {
        let prof = profile(&[], &["Stanford University"]);
        assert!(is_preferred(
            &paper(&[], &["Stanford University School of Medicine"]),
            &prof
        ));
        assert!(is_preferred(
            &paper(&[], &["Dept. of Genetics, stanford  university, CA"]),
            &prof
        ));
        assert!(!is_preferred(&paper(&[], &["Stanford Universityhospital"]), &prof));
    }

    #[test]
    fn affiliation_fragment_does_not_match() {
        let prof = profile(&[], &["Harvard"]);
        assert!(!is_preferred(&paper(&[], &["Harvardian Institute"]), &prof));
        assert!(is_preferred(&paper(&[], &["Harvard Medical School"]), &prof));
    }

    #[test]
    fn empty_paper_fields_never_match() {
        let prof = profile(&["Xihong Lin"], &["Broad Institute"]);
        assert!(!is_preferred(&paper(&[], &[]), &prof));
        assert!(!is_preferred(&paper(&["", "X."], &[]), &prof));
    }

    #[test]
    fn matching_is_pure() {
        let prof = profile(&["Alkes Price"], &["Broad Institute"]);
        let p = paper(&["Alkes L. Price"], &[]);
        let first = is_preferred(&p, &prof);
        for _ in 0..5 {
            assert_eq!(is_preferred(&p, &prof), first);
        }
        assert!(first);
    }

    #[test]
    fn evaluate_builds_override_verdict() {
        let matcher = PreferenceMatcher::new(&profile(&[], &["Broad Institute"])).unwrap();
        let verdict = matcher
            .evaluate(&paper(&[], &["Broad Institute of MIT and Harvard"]))
            .unwrap();
        assert_eq!(verdict.relevance_score, 10);
        assert!(verdict.relevant_topics.is_override());
        assert!(matcher.evaluate(&paper(&["Someone Else"], &[])).is_none());
    }
}
