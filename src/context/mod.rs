// Process-wide service context
// Adapters and the index handle are built once from the configuration and
// shared by every pipeline run.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::database::lancedb::{IndexError, VectorIndex};
use crate::embeddings::{EmbeddingProvider, OllamaClient};
use crate::indexer::IngestionJob;
use crate::llm::{AnthropicClient, LanguageModel};
use crate::pipeline::Pipeline;

/// Open the configured collection's vector index without creating it
#[inline]
pub async fn open_index(config: &Config) -> Result<VectorIndex, IndexError> {
    let index = VectorIndex::open(
        &config.vector_database_path(),
        &config.index.collection,
        config.ollama.embedding_dimension as usize,
    )
    .await?;
    Ok(index.with_upsert_batch_size(config.index.upsert_batch_size))
}

/// Build an ingestion job that owns the index exclusively
#[inline]
pub async fn ingestion_job(config: &Config) -> crate::Result<IngestionJob> {
    let embedder = OllamaClient::new(&config.ollama)?;
    let index = open_index(config).await?;

    Ok(IngestionJob::new(Arc::new(embedder), index)
        .with_embed_batch_size(config.ollama.batch_size as usize))
}

/// Shared handles used to answer questions
#[derive(Clone)]
pub struct Services {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    index: Arc<VectorIndex>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("embedder", &self.embedder.model_name())
            .field("llm", &self.llm.model_name())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl Services {
    /// Build the production adapters from configuration
    ///
    /// Fails when the API key variable is unset or any setting is invalid.
    #[inline]
    pub async fn connect(config: Config) -> crate::Result<Self> {
        config.validate()?;

        let embedder = OllamaClient::new(&config.ollama)?;
        let llm = AnthropicClient::from_env(&config.llm)?;
        let index = open_index(&config).await?;

        info!(
            "Services ready: embeddings via {} ({}), completions via {}",
            config.ollama.model,
            config.ollama.ollama_url()?,
            config.llm.model
        );

        Ok(Self::with_adapters(
            config,
            Arc::new(embedder),
            Arc::new(llm),
            Arc::new(index),
        ))
    }

    #[inline]
    pub fn with_adapters(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        index: Arc<VectorIndex>,
    ) -> Self {
        debug!(
            "Assembling services with embedder {} and model {}",
            embedder.model_name(),
            llm.model_name()
        );
        Self {
            config,
            embedder,
            llm,
            index,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// A pipeline sharing this context's adapters and index
    #[inline]
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            Arc::clone(&self.embedder),
            Arc::clone(&self.llm),
            Arc::clone(&self.index),
            self.config.pipeline.clone(),
        )
    }
}
