// ┌─┐┌─┐┌─┐┌─┐┬─┐  ┌┬┐┬┌─┐┌─┐┌─┐┌┬┐
// ├─┘├─┤├─┘├┤ ├┬┘   │││││ ┬├┤ └─┐ │
// ┴  ┴ ┴┴  └─┘┴└─  ─┴┘┴└─┘└─┘└─┘ ┴

// Requires Ollama or an OpenAI-compatible endpoint
// fetches recent papers, ranks them against a research profile with AI, and prints a digest.

// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use paper_digest::backend::openai::DEFAULT_BASE_URL;
use paper_digest::backend::{CompletionBackend, OllamaBackend, OpenAiBackend};
use paper_digest::sources::{self, PaperSource, SourceQuery};
use paper_digest::{
    evaluate_all, report, snapshot, EvaluationConfig, Paper, PreferenceMatcher, RelevanceJudge,
    UserProfile,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Ollama,
    Openai,
}

// CL arguments for config
#[derive(Parser, Debug)]
#[command(author, version, about = "Research Paper Digest with AI Relevance Ranking", long_about = None)]
struct Args {
    /// JSON research profile
    #[arg(short, long, default_value = "profile.json")]
    profile: PathBuf,

    /// How many days back to look
    #[arg(short, long, default_value_t = 3)]
    days: u32,

    /// Papers requested per source
    #[arg(short, long, default_value_t = 5)]
    max_results: usize,

    #[arg(short, long, default_value = "biorxiv,arxiv,medrxiv,pubmed")]
    sources: String,

    #[arg(long, value_enum, default_value_t = BackendKind::Ollama)]
    backend: BackendKind,

    /// Defaults to llama3.2:latest for Ollama and gpt-4o for OpenAI
    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value = "http://localhost")]
    ollama_host: String,

    #[arg(long, default_value_t = 11434)]
    ollama_port: u16,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    openai_base_url: String,

    /// Read when OPENAI_API_KEY is unset
    #[arg(long, default_value = ".openai_api_key")]
    openai_key_file: PathBuf,

    #[arg(long, default_value_t = 5)]
    batch_size: usize,

    #[arg(long, default_value_t = 3)]
    batch_delay_secs: u64,

    /// Minimum score (0-10) for the digest
    #[arg(short, long, default_value_t = 7)]
    threshold: u8,

    /// Attempts per backend call
    #[arg(long, default_value_t = 10)]
    max_retries: u32,

    #[arg(long, default_value_t = 1)]
    min_backoff_secs: u64,

    #[arg(long, default_value_t = 60)]
    max_backoff_secs: u64,

    #[arg(long, default_value_t = 1)]
    repair_attempts: u32,

    #[arg(long, default_value = ".")]
    snapshot_dir: PathBuf,

    /// Save the fetched papers before evaluating them
    #[arg(long, default_value_t = false)]
    save_snapshot: bool,

    /// Evaluate a saved snapshot instead of fetching
    #[arg(long)]
    from_snapshot: Option<PathBuf>,

    /// Also write the digest to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn evaluation_config(&self) -> EvaluationConfig {
        EvaluationConfig {
            batch_size: self.batch_size,
            inter_batch_delay: Duration::from_secs(self.batch_delay_secs),
            relevance_threshold: self.threshold,
            max_transient_retries: self.max_retries,
            min_backoff: Duration::from_secs(self.min_backoff_secs),
            max_backoff: Duration::from_secs(self.max_backoff_secs),
            repair_attempts: self.repair_attempts,
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn build_backend(args: &Args) -> Result<Arc<dyn CompletionBackend>> {
    match args.backend {
        BackendKind::Ollama => {
            let model = args.model.clone().unwrap_or_else(|| "llama3.2:latest".to_string());
            let backend = OllamaBackend::new(&args.ollama_host, args.ollama_port, model)?;
            backend.check_available().await;
            Ok(Arc::new(backend))
        }
        BackendKind::Openai => {
            let key = OpenAiBackend::load_api_key(&args.openai_key_file)?;
            let model = args.model.clone().unwrap_or_else(|| "gpt-4o".to_string());
            info!(model = %model, base_url = %args.openai_base_url, "using OpenAI backend");
            Ok(Arc::new(OpenAiBackend::new(&args.openai_base_url, model, key)?))
        }
    }
}

async fn fetch_papers(args: &Args, profile: &UserProfile, since: NaiveDate) -> Result<Vec<Paper>> {
    let client = sources::http_client()?;
    let mut connectors: Vec<Box<dyn PaperSource>> = Vec::new();
    for name in args.sources.split(',').filter(|s| !s.trim().is_empty()) {
        match sources::source_by_name(name, &client) {
            Some(source) => connectors.push(source),
            None => warn!(source = name.trim(), "unknown source, ignoring"),
        }
    }
    if connectors.is_empty() {
        bail!("no usable sources in '{}'", args.sources);
    }

    let query = SourceQuery::from_profile(profile, since, args.max_results);
    Ok(sources::collect_papers(&connectors, &query).await)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // everything that can be misconfigured fails here, before any network call
    let profile = UserProfile::load(&args.profile)?;
    let config = args.evaluation_config();
    config.validate()?;
    let matcher = PreferenceMatcher::new(&profile)?;
    let backend = build_backend(&args).await?;

    let since = Local::now().date_naive() - chrono::Duration::days(i64::from(args.days));

    let papers = match &args.from_snapshot {
        Some(path) => {
            let papers = snapshot::load(path)?;
            info!(path = %path.display(), papers = papers.len(), "loaded snapshot");
            papers
        }
        None => {
            let papers = fetch_papers(&args, &profile, since).await?;
            if args.save_snapshot {
                let path = snapshot::snapshot_path(&args.snapshot_dir, since, args.days);
                snapshot::save(&papers, &path)?;
                info!(path = %path.display(), "snapshot saved");
            }
            papers
        }
    };
    let fetched = papers.len();

    let judge = RelevanceJudge::new(backend, config.retry_policy(), config.repair_policy())
        .with_threshold(config.relevance_threshold);
    let ranked = evaluate_all(papers, &profile, &matcher, &judge, &config).await;

    let digest = report::render_digest(&ranked);
    if !digest.is_empty() {
        println!("{}", digest);
    }

    println!("{}", "=".repeat(64));
    println!("Results");
    println!("{}", "=".repeat(64));
    println!("Papers fetched: {}", fetched);
    println!("Relevant papers: {}", ranked.len());

    if let Some(path) = &args.output {
        fs::write(path, &digest).with_context(|| format!("writing digest to {}", path.display()))?;
        println!("Output: {}", path.display());
    }
    println!();

    Ok(())
}
