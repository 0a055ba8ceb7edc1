//! Turning raw model text into an [`Evaluation`].
//!
//! Two fixed stages: [`normalize`] cleans up the usual model noise, then
//! [`parse_evaluation`] enforces the four-field contract.

use crate::paper::{Evaluation, RelevantTopics};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// Why a reply could not be turned into an evaluation. Never leaves the judge.
#[derive(Debug, Error)]
pub enum MalformedResponse {
    #[error("reply is not a JSON evaluation object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("relevance_score {0} is not an integer")]
    NotAnInteger(String),

    #[error("relevance_score {0} is outside 0..=10")]
    OutOfRange(i64),
}

#[derive(Deserialize)]
struct RawEvaluation {
    relevance_score: Value,
    thoughts: String,
    summary: String,
    relevant_topics: Vec<String>,
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```$").expect("valid fence regex")
    })
}

/// Trim, drop a surrounding code fence, escape stray backslashes, remove `$`.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = match fence_regex().captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim(),
        None => trimmed,
    };
    escape_backslashes(unfenced).replace('$', "")
}

// `\\` and `\"` are kept as-is, so already valid JSON survives; any other
// backslash (usually LaTeX) becomes a literal one.
// That includes `\n` and `\u00e9`: `\nu` and `\tau` are far more common in
// abstracts than real escapes, so those show up literally in the digest.
fn escape_backslashes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some(&next) if next == '\\' || next == '"' => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }
    out
}

/// Parses normalized text. The score may arrive as a number or a quoted integer.
pub fn parse_evaluation(text: &str) -> Result<Evaluation, MalformedResponse> {
    let raw: RawEvaluation = serde_json::from_str(text)?;
    let score = coerce_score(&raw.relevance_score)?;

    Ok(Evaluation {
        relevance_score: score,
        thoughts: raw.thoughts.trim().to_string(),
        summary: raw.summary.trim().to_string(),
        relevant_topics: RelevantTopics::Listed(
            raw.relevant_topics
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        ),
    })
}

// `8`, `8.0`, `"8"` and `"8.0"` are all eight; `7.5` is not a score.
fn whole_number(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0).then_some(n as i64)
}

fn coerce_score(value: &Value) -> Result<u8, MalformedResponse> {
    let score = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(whole_number))
            .ok_or_else(|| MalformedResponse::NotAnInteger(n.to_string()))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_number))
                .ok_or_else(|| MalformedResponse::NotAnInteger(format!("{s:?}")))?
        }
        other => return Err(MalformedResponse::NotAnInteger(other.to_string())),
    };

    if (0..=i64::from(Evaluation::MAX_SCORE)).contains(&score) {
        Ok(score as u8)
    } else {
        Err(MalformedResponse::OutOfRange(score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"relevance_score": 8, "thoughts": "fits", "summary": "A model.", "relevant_topics": ["Genomics"]}"#;

    #[test]
    fn strips_json_fence() {
        let raw = format!("```json\n{VALID}\n```");
        assert_eq!(normalize(&raw), VALID);
    }

    #[test]
    fn strips_bare_fence_and_whitespace() {
        let raw = format!("\n  ```\n{VALID}```  \n");
        assert_eq!(normalize(&raw), VALID);
    }

    #[test]
    fn fence_on_single_line() {
        let raw = format!("```json {VALID} ```");
        assert_eq!(normalize(&raw), VALID);
    }

    #[test]
    fn removes_dollar_signs_and_escapes_latex() {
        let raw = r#"{"thoughts": "uses $\alpha$ and \"quotes\" and a\\b"}"#;
        let normalized = normalize(raw);
        assert_eq!(
            normalized,
            r#"{"thoughts": "uses \\alpha and \"quotes\" and a\\b"}"#
        );
        let value: Value = serde_json::from_str(&normalized).unwrap();
        assert_eq!(value["thoughts"], r#"uses \alpha and "quotes" and a\b"#);
    }

    #[test]
    fn parses_valid_object() {
        let eval = parse_evaluation(VALID).unwrap();
        assert_eq!(eval.relevance_score, 8);
        assert_eq!(eval.thoughts, "fits");
        assert_eq!(eval.summary, "A model.");
        assert_eq!(eval.relevant_topics, RelevantTopics::Listed(vec!["Genomics".into()]));
    }

    #[test]
    fn quoted_score_is_coerced() {
        let text = r#"{"relevance_score": " 7 ", "thoughts": "", "summary": "", "relevant_topics": []}"#;
        assert_eq!(parse_evaluation(text).unwrap().relevance_score, 7);
    }

    #[test]
    fn extra_keys_are_ignored() {
        let text = r#"{"relevance_score": 3, "thoughts": "t", "summary": "s", "relevant_topics": [], "confidence": 0.4}"#;
        assert_eq!(parse_evaluation(text).unwrap().relevance_score, 3);
    }

    #[test]
    fn whole_number_floats_are_scores() {
        let make = |score: &str| {
            format!(r#"{{"relevance_score": {score}, "thoughts": "", "summary": "", "relevant_topics": []}}"#)
        };
        assert_eq!(parse_evaluation(&normalize(&make("8.0"))).unwrap().relevance_score, 8);
        assert_eq!(parse_evaluation(&make("\"8.0\"")).unwrap().relevance_score, 8);
        assert_eq!(parse_evaluation(&make("0.0")).unwrap().relevance_score, 0);
        assert!(matches!(
            parse_evaluation(&make("11.0")),
            Err(MalformedResponse::OutOfRange(11))
        ));
        assert!(matches!(
            parse_evaluation(&make("\"7.5\"")),
            Err(MalformedResponse::NotAnInteger(_))
        ));
    }

    #[test]
    fn valid_escapes_are_kept_literal() {
        let raw = r#"{"thoughts": "line1\nline2"}"#;
        let value: Value = serde_json::from_str(&normalize(raw)).unwrap();
        assert_eq!(value["thoughts"], r"line1\nline2");
    }

    #[test]
    fn rejects_out_of_range_and_non_integers() {
        let make = |score: &str| {
            format!(r#"{{"relevance_score": {score}, "thoughts": "", "summary": "", "relevant_topics": []}}"#)
        };
        assert!(matches!(
            parse_evaluation(&make("11")),
            Err(MalformedResponse::OutOfRange(11))
        ));
        assert!(matches!(
            parse_evaluation(&make("-1")),
            Err(MalformedResponse::OutOfRange(-1))
        ));
        assert!(matches!(
            parse_evaluation(&make("\"high\"")),
            Err(MalformedResponse::NotAnInteger(_))
        ));
        assert!(matches!(
            parse_evaluation(&make("7.5")),
            Err(MalformedResponse::NotAnInteger(_))
        ));
        assert!(matches!(
            parse_evaluation(&make("null")),
            Err(MalformedResponse::NotAnInteger(_))
        ));
    }

    #[test]
    fn rejects_prose_and_missing_fields() {
        assert!(matches!(
            parse_evaluation("This paper is quite relevant, I'd say 8/10."),
            Err(MalformedResponse::Json(_))
        ));
        assert!(matches!(
            parse_evaluation(r#"{"relevance_score": 5, "thoughts": "t"}"#),
            Err(MalformedResponse::Json(_))
        ));
    }
}
