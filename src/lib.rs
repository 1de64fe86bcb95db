use thiserror::Error;

pub type Result<T> = std::result::Result<T, KbError>;

#[derive(Error, Debug)]
pub enum KbError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] records::ValidationError),

    #[error("Vector index error: {0}")]
    Index(#[from] database::lancedb::IndexError),

    #[error("Provider error: {0}")]
    Provider(#[from] http::ProviderError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] indexer::IngestError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod embeddings;
pub mod http;
pub mod indexer;
pub mod llm;
pub mod pipeline;
pub mod records;
pub mod render;

#[cfg(test)]
pub(crate) mod test_support;
