//! Batched evaluation of a whole candidate set.
//!
//! Papers are cut into consecutive batches. Batches run concurrently as
//! cooperative futures on the caller's task; papers inside a batch are judged
//! one after another. Every batch sleeps for the pacing delay once it is done,
//! which keeps the request rate polite no matter how many batches there are.

use crate::config::EvaluationConfig;
use crate::judge::RelevanceJudge;
use crate::paper::{Evaluation, Paper, RankedResult};
use crate::preference::PreferenceMatcher;
use crate::profile::UserProfile;
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// What happened to one paper.
#[derive(Debug)]
struct Outcome {
    paper: Paper,
    evaluation: Option<Evaluation>,
    overridden: bool,
}

/// Judges every paper and returns the relevant ones, best first.
pub async fn evaluate_all(
    papers: Vec<Paper>,
    profile: &UserProfile,
    matcher: &PreferenceMatcher,
    judge: &RelevanceJudge,
    config: &EvaluationConfig,
) -> Vec<RankedResult> {
    let total = papers.len();
    let batch_size = config.batch_size.max(1);
    let batches = into_batches(papers, batch_size);

    info!(
        papers = total,
        batches = batches.len(),
        batch_size,
        backend = judge.backend_name(),
        "evaluating papers"
    );

    let tasks = batches
        .into_iter()
        .enumerate()
        .map(|(index, batch)| run_batch(index, batch, profile, matcher, judge, config));
    let outcomes: Vec<Outcome> = join_all(tasks).await.into_iter().flatten().collect();

    let overridden = outcomes.iter().filter(|o| o.overridden).count();
    let skipped = outcomes.iter().filter(|o| o.evaluation.is_none()).count();
    let fallbacks = outcomes
        .iter()
        .filter(|o| o.evaluation.as_ref().is_some_and(Evaluation::is_fallback))
        .count();

    let ranked = rank(outcomes, config.relevance_threshold);

    info!(
        evaluated = total,
        overridden,
        skipped,
        fallbacks,
        relevant = ranked.len(),
        "evaluation finished"
    );
    ranked
}

async fn run_batch(
    index: usize,
    batch: Vec<Paper>,
    profile: &UserProfile,
    matcher: &PreferenceMatcher,
    judge: &RelevanceJudge,
    config: &EvaluationConfig,
) -> Vec<Outcome> {
    debug!(batch = index, size = batch.len(), "batch started");
    let mut outcomes = Vec::with_capacity(batch.len());

    for paper in batch {
        if let Some(evaluation) = matcher.evaluate(&paper) {
            debug!(title = %paper.title, "preferred paper, skipping judge");
            outcomes.push(Outcome {
                paper,
                evaluation: Some(evaluation),
                overridden: true,
            });
            continue;
        }

        let evaluation = match judge.judge(&paper, profile).await {
            Ok(evaluation) => Some(evaluation),
            Err(e) => {
                warn!(title = %paper.title, error = %e, "backend failed, paper skipped");
                None
            }
        };
        outcomes.push(Outcome {
            paper,
            evaluation,
            overridden: false,
        });
    }

    sleep(config.inter_batch_delay).await;
    debug!(batch = index, "batch finished");
    outcomes
}

fn into_batches(papers: Vec<Paper>, batch_size: usize) -> Vec<Vec<Paper>> {
    let mut batches = Vec::with_capacity(papers.len().div_ceil(batch_size));
    let mut papers = papers.into_iter().peekable();
    while papers.peek().is_some() {
        batches.push(papers.by_ref().take(batch_size).collect());
    }
    batches
}

// Drops skipped and sub-threshold papers, then a stable sort by score.
fn rank(outcomes: Vec<Outcome>, threshold: u8) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = outcomes
        .into_iter()
        .filter_map(|o| {
            let evaluation = o.evaluation?;
            (evaluation.relevance_score >= threshold).then(|| RankedResult {
                paper: o.paper,
                evaluation,
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.score().cmp(&a.score()));
    ranked
}
