use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::config::Config;
use crate::context::{Services, ingestion_job, open_index};
use crate::database::lancedb::IndexError;
use crate::embeddings::OllamaClient;
use crate::indexer::IngestReport;
use crate::pipeline::{CompletedRun, PipelineError, PipelineObserver, PipelineState, Stage};
use crate::records::load_records;
use crate::render::{OutputFormat, render_run};

pub const DEFAULT_MAX_QUERIES_PER_SESSION: usize = 3;

/// Load a JSON array of maintenance records and rebuild the index from it
#[inline]
pub async fn ingest(base_dir: &Path, file: &Path) -> Result<IngestReport> {
    let config = Config::load(base_dir)?;
    info!("Ingesting maintenance logs from {}", file.display());

    let records = load_records(file)
        .with_context(|| format!("Failed to load records from {}", file.display()))?;

    let mut job = ingestion_job(&config)
        .await
        .context("Failed to prepare ingestion")?
        .with_progress(true);
    let report = job.run(&records).await.context("Ingestion failed")?;

    println!(
        "{} Stored {} chunks from {} records in {:.1?}",
        style("✓").green(),
        report.chunks,
        report.records,
        report.elapsed
    );
    println!("   Collection: {}", job.index().table_name());
    println!("   Location: {}", job.index().path().display());

    Ok(report)
}

/// Answer one question and print the result in the requested format
#[inline]
pub async fn ask(base_dir: &Path, question: Option<String>, format: OutputFormat) -> Result<()> {
    let question = match question {
        Some(question) => question,
        None => prompt_question(false)?,
    };

    let services = connect(base_dir).await?;
    let run = answer(&services, &question).await?;
    print_run(&run, format)
}

/// Interactive loop answering up to `max_queries` questions
#[inline]
pub async fn session(base_dir: &Path, max_queries: usize, format: OutputFormat) -> Result<()> {
    let services = connect(base_dir).await?;
    let mut budget = SessionBudget::new(max_queries);

    eprintln!(
        "{}",
        style("⚙️  Maintenance Knowledge Preservation System").bold().cyan()
    );
    eprintln!(
        "Up to {} questions this session. Submit an empty line to finish.",
        budget.max()
    );

    loop {
        eprintln!();
        let question = prompt_question(true)?;
        if question.trim().is_empty() {
            break;
        }

        if !budget.try_start() {
            eprintln!(
                "{}",
                style(format!(
                    "You've reached the maximum of {} queries for this session. \
                     Start a new session to continue. Thank you for using the Maintenance Knowledge System!",
                    budget.max()
                ))
                .yellow()
            );
            break;
        }

        match answer(&services, &question).await {
            Ok(run) => print_run(&run, format)?,
            Err(e) => {
                error!("Question failed: {:#}", e);
                eprintln!("{} {:#}", style("✗").red(), e);
            }
        }

        eprintln!(
            "{}",
            style(format!("{} questions remaining", budget.remaining())).dim()
        );
    }

    Ok(())
}

/// Show where the index lives, whether it is built and whether Ollama answers
#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir)?;

    println!("📊 Maintenance KB Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🔍 Vector Index:");
    println!("   Path: {}", config.vector_database_path().display());
    println!("   Collection: {}", config.index.collection);
    match open_index(&config).await {
        Ok(index) => match index.count().await {
            Ok(count) => println!("   ✅ Built: {} chunks stored", count),
            Err(IndexError::NotFound { .. }) => {
                println!("   ⚠️  Not built yet; run 'maintenance-kb ingest <file>'");
            }
            Err(e) => println!("   ❌ Unreadable - {}", e),
        },
        Err(e) => println!("   ❌ Failed to open - {}", e),
    }

    println!();
    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", config.ollama.model);
                println!("   🔢 Dimension: {}", config.ollama.embedding_dimension);
            }
            Err(e) => println!("   ⚠️  Ollama: Unhealthy - {}", e),
        },
        Err(e) => println!("   ❌ Ollama: Misconfigured - {}", e),
    }

    println!();
    println!("🧠 Language Model:");
    println!("   📋 Model: {}", config.llm.model);
    if config.llm.api_key().is_ok() {
        println!("   ✅ API key found in {}", config.llm.api_key_env);
    } else {
        println!("   ❌ {} is not set", config.llm.api_key_env);
    }

    Ok(())
}

async fn connect(base_dir: &Path) -> Result<Services> {
    let config = Config::load(base_dir)?;
    Services::connect(config)
        .await
        .context("Failed to initialise services")
}

async fn answer(services: &Services, question: &str) -> Result<CompletedRun, PipelineError> {
    let observer = SpinnerObserver::new();
    let result = services.pipeline().run_observed(question, &observer).await;
    observer.finish();
    result
}

fn print_run(run: &CompletedRun, format: OutputFormat) -> Result<()> {
    let rendered = render_run(run, format).context("Failed to render response")?;
    println!("{}", rendered);
    Ok(())
}

fn prompt_question(allow_empty: bool) -> Result<String> {
    Input::<String>::new()
        .with_prompt("Ask a maintenance question")
        .allow_empty(allow_empty)
        .interact_text()
        .context("Failed to read question")
}

/// Caps the number of pipeline runs in one interactive session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionBudget {
    max: usize,
    used: usize,
}

impl SessionBudget {
    #[inline]
    pub const fn new(max: usize) -> Self {
        Self { max, used: 0 }
    }

    #[inline]
    pub const fn max(&self) -> usize {
        self.max
    }

    #[inline]
    pub const fn remaining(&self) -> usize {
        self.max.saturating_sub(self.used)
    }

    /// Claim one run, or return false once the budget is spent
    #[inline]
    pub const fn try_start(&mut self) -> bool {
        if self.used >= self.max {
            return false;
        }
        self.used += 1;
        true
    }
}

/// Renders stage progress as a spinner on an attended terminal
struct SpinnerObserver {
    bar: ProgressBar,
}

impl SpinnerObserver {
    fn new() -> Self {
        let bar = if console::user_attended_stderr() {
            let style = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            let bar = ProgressBar::new_spinner().with_style(style);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineObserver for SpinnerObserver {
    fn stage_started(&self, stage: Stage) {
        self.bar.set_message(format!("{}...", stage.label()));
    }

    fn stage_completed(&self, stage: Stage, state: &PipelineState, elapsed: Duration) {
        let detail = match stage {
            Stage::Rewrite => format!("query: {}", state.effective_query()),
            Stage::Retrieve => format!(
                "{} chunks",
                state.retrieved_chunks().map_or(0, <[_]>::len)
            ),
            Stage::Extract | Stage::Synthesize => String::new(),
        };
        self.bar.println(format!(
            "{} {} ({:.1?}) {}",
            style("✓").green(),
            stage.label(),
            elapsed,
            style(detail).dim()
        ));
    }

    fn run_failed(&self, error: &PipelineError) {
        self.bar.abandon_with_message(format!("{} {}", style("✗").red(), error));
    }
}
