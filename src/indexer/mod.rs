// Indexer module
// Offline ingestion: validate, chunk, embed and store maintenance records


use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::database::lancedb::{IndexError, VectorIndex};
use crate::embeddings::EmbeddingProvider;
use crate::embeddings::chunking::chunk_records;
use crate::http::ProviderError;
use crate::records::{MaintenanceRecord, ValidationError, validate_all};

const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("embedding failed: {0}")]
    Embedding(#[from] ProviderError),
    #[error("index write failed: {0}")]
    Index(#[from] IndexError),
}

/// Outcome of a completed ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub records: usize,
    pub chunks: usize,
    pub elapsed: Duration,
}

/// Rebuilds the vector index from a full record set
///
/// Owns the index exclusively for the duration of the job.
pub struct IngestionJob {
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    embed_batch_size: usize,
    show_progress: bool,
}

impl IngestionJob {
    #[inline]
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: VectorIndex) -> Self {
        Self {
            embedder,
            index,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            show_progress: false,
        }
    }

    /// Texts sent to the embedding provider per call
    #[inline]
    pub fn with_embed_batch_size(mut self, batch_size: usize) -> Self {
        self.embed_batch_size = batch_size.max(1);
        self
    }

    /// Draw progress bars on an attended terminal
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn into_index(self) -> VectorIndex {
        self.index
    }

    fn check_vectors(&self, chunks: usize, vectors: &[Vec<f32>]) -> Result<(), ValidationError> {
        if vectors.len() != chunks {
            return Err(ValidationError::LengthMismatch {
                chunks,
                vectors: vectors.len(),
            });
        }

        let expected = self.index.dimension();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(ValidationError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        Ok(())
    }

    /// Validate, chunk, embed, rebuild the collection and upsert everything
    ///
    /// The previous collection is only dropped once every record has been
    /// validated and every chunk embedded with the index dimension. A write
    /// failure after that point can leave the collection partially filled.
    #[inline]
    pub async fn run(&mut self, records: &[MaintenanceRecord]) -> Result<IngestReport, IngestError> {
        let started = Instant::now();

        validate_all(records)?;
        let chunks = chunk_records(records)?;
        info!(
            "Ingesting {} records as {} chunks",
            records.len(),
            chunks.len()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let bar = self.progress_bar(texts.len(), "Embedding chunks");
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            let embedded = self.embedder.encode(batch).await?;
            debug!("Embedded batch of {} chunks", embedded.len());
            vectors.extend(embedded);
            bar.set_position(vectors.len() as u64);
        }
        bar.finish_and_clear();

        self.check_vectors(chunks.len(), &vectors)?;
        self.index.rebuild().await?;

        let bar = self.progress_bar(chunks.len(), "Writing to index");
        let written = self
            .index
            .upsert_with_progress(&chunks, &vectors, |n| bar.set_position(n as u64))
            .await?;
        bar.finish_and_clear();

        let report = IngestReport {
            records: records.len(),
            chunks: written,
            elapsed: started.elapsed(),
        };

        info!(
            "Stored {} chunks from {} records in {:.2?}",
            report.chunks, report.records, report.elapsed
        );
        Ok(report)
    }

    fn progress_bar(&self, len: usize, message: &'static str) -> ProgressBar {
        if !self.show_progress || !console::user_attended_stderr() {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::with_template("{spinner} {msg} [{bar:30}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(len as u64).with_style(style);
        bar.set_message(message);
        bar
    }
}
