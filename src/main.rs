use std::path::PathBuf;

use clap::{Parser, Subcommand};
use maintenance_kb::Result;
use maintenance_kb::commands::{DEFAULT_MAX_QUERIES_PER_SESSION, ask, ingest, session, show_status};
use maintenance_kb::config::{resolve_base_dir, run_interactive_config, show_config};
use maintenance_kb::render::OutputFormat;

#[derive(Parser)]
#[command(name = "maintenance-kb")]
#[command(about = "Answer fleet maintenance questions from historical repair logs")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector index (default ~/.maintenance-kb)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding service, language model and pipeline
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Rebuild the index from a JSON array of maintenance records
    Ingest {
        /// Path to the maintenance log JSON file
        file: PathBuf,
    },
    /// Ask a single question; prompts for one when omitted
    Ask {
        /// The question, e.g. "truck overheating under load"
        question: Vec<String>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Ask questions interactively, up to a per-session limit
    Session {
        /// Maximum number of questions answered in this session
        #[arg(long, default_value_t = DEFAULT_MAX_QUERIES_PER_SESSION)]
        max_queries: usize,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Show index, embedding service and language model status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Ingest { file } => {
            ingest(&base_dir, &file).await?;
        }
        Commands::Ask { question, format } => {
            let question = (!question.is_empty()).then(|| question.join(" "));
            ask(&base_dir, question, format).await?;
        }
        Commands::Session {
            max_queries,
            format,
        } => {
            session(&base_dir, max_queries, format).await?;
        }
        Commands::Status => {
            show_status(&base_dir).await?;
        }
    }

    Ok(())
}
