// Pipeline module
// Four-stage question answering over the maintenance index:
// rewrite -> retrieve -> extract -> synthesize

mod errors;
pub mod prompts;
mod state;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::database::lancedb::{QueryFilter, RetrievedChunk, VectorIndex};
use crate::embeddings::EmbeddingProvider;
use crate::http::ProviderError;
use crate::llm::LanguageModel;

pub use errors::{PipelineError, StageFailure};
pub use state::{CompletedRun, PipelineState, Stage, StageTiming};

/// Receives stage lifecycle events while a run is in progress
pub trait PipelineObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_completed(&self, _stage: Stage, _state: &PipelineState, _elapsed: Duration) {}

    fn run_failed(&self, _error: &PipelineError) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Runs questions through the four stages against one vector index
///
/// Holds only shared read-only handles, so concurrent runs are independent.
#[derive(Clone)]
pub struct Pipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LanguageModel>,
    index: Arc<VectorIndex>,
    settings: PipelineConfig,
    stage_timeout: Duration,
    filter: Option<QueryFilter>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("embedder", &self.embedder.model_name())
            .field("llm", &self.llm.model_name())
            .field("index", &self.index)
            .field("settings", &self.settings)
            .field("filter", &self.filter)
            .finish()
    }
}

impl Pipeline {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LanguageModel>,
        index: Arc<VectorIndex>,
        settings: PipelineConfig,
    ) -> Self {
        let stage_timeout = settings.stage_timeout();
        Self {
            embedder,
            llm,
            index,
            settings,
            stage_timeout,
            filter: None,
        }
    }

    /// Upper bound on the wall-clock time of any single stage
    #[inline]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Restrict retrieval to chunks matching the given metadata
    #[inline]
    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    #[inline]
    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    #[inline]
    pub async fn run(&self, question: &str) -> Result<CompletedRun, PipelineError> {
        self.run_observed(question, &NoopObserver).await
    }

    /// Run all four stages, reporting progress to `observer`
    ///
    /// Any stage failure aborts the run; nothing from earlier stages is
    /// returned.
    #[inline]
    pub async fn run_observed(
        &self,
        question: &str,
        observer: &dyn PipelineObserver,
    ) -> Result<CompletedRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline", %run_id);

        let result = self.execute(run_id, question, observer).instrument(span).await;
        if let Err(e) = &result {
            warn!(%run_id, "Pipeline run failed: {}", e);
            observer.run_failed(e);
        }
        result
    }

    async fn execute(
        &self,
        run_id: Uuid,
        question: &str,
        observer: &dyn PipelineObserver,
    ) -> Result<CompletedRun, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        info!("Starting pipeline run for: {}", question);
        let mut state = PipelineState::new(question);
        let mut timings = Vec::with_capacity(Stage::ALL.len());

        // Rewrite
        let started = begin(Stage::Rewrite, observer);
        let rewrite = prompts::rewrite_prompt(state.original_query());
        let rewritten = self
            .timed(Stage::Rewrite, self.llm.complete(&rewrite, self.settings.rewrite_max_tokens))
            .await?
            .trim()
            .to_string();
        if rewritten.is_empty() {
            warn!("Rewrite came back empty, using the original question");
        } else {
            debug!("Rewritten query: {}", rewritten);
        }
        state.set_rewritten_query(rewritten.clone());
        finish(Stage::Rewrite, started, &state, observer, &mut timings);

        // Retrieve
        let started = begin(Stage::Retrieve, observer);
        let retrieval_query = state.effective_query().to_string();
        let chunks = self
            .timed(Stage::Retrieve, self.retrieve(&retrieval_query))
            .await?;
        if chunks.is_empty() {
            warn!("No chunks retrieved for query");
        } else {
            debug!("Retrieved {} chunks", chunks.len());
        }
        state.set_retrieved_chunks(chunks.clone());
        finish(Stage::Retrieve, started, &state, observer, &mut timings);

        // Extract
        let started = begin(Stage::Extract, observer);
        let extraction = prompts::extraction_prompt(state.effective_query(), &chunks);
        let analysis = self
            .timed(
                Stage::Extract,
                self.llm.complete(&extraction, self.settings.extraction_max_tokens),
            )
            .await?;
        state.set_knowledge_analysis(analysis.clone());
        finish(Stage::Extract, started, &state, observer, &mut timings);

        // Synthesize
        let started = begin(Stage::Synthesize, observer);
        let synthesis = prompts::synthesis_prompt(state.original_query(), &analysis);
        let response = self
            .timed(
                Stage::Synthesize,
                self.llm.complete(&synthesis, self.settings.synthesis_max_tokens),
            )
            .await?;
        state.set_final_response(response.clone());
        finish(Stage::Synthesize, started, &state, observer, &mut timings);

        info!("Pipeline run complete");

        Ok(CompletedRun {
            run_id,
            original_query: question.to_string(),
            rewritten_query: rewritten,
            retrieval_query,
            retrieved_chunks: chunks,
            knowledge_analysis: analysis,
            final_response: response,
            timings,
        })
    }

    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, StageFailure> {
        let vectors = self.embedder.encode(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(self
            .index
            .query(&vector, self.settings.top_k, self.filter.as_ref())
            .await?)
    }

    async fn timed<T, E, F>(&self, stage: Stage, fut: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<StageFailure>,
    {
        // Expiry only stops waiting. A blocking HTTP call already handed to
        // spawn_blocking keeps running until the agent's own timeout fires.
        let outcome = match tokio::time::timeout(self.stage_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(StageFailure::TimedOut(self.stage_timeout)),
        };
        outcome.map_err(|failure| PipelineError::at_stage(stage, failure))
    }
}

fn begin(stage: Stage, observer: &dyn PipelineObserver) -> Instant {
    debug!("Stage {} started", stage);
    observer.stage_started(stage);
    Instant::now()
}

fn finish(
    stage: Stage,
    started: Instant,
    state: &PipelineState,
    observer: &dyn PipelineObserver,
    timings: &mut Vec<StageTiming>,
) {
    let elapsed = started.elapsed();
    info!("Stage {} finished in {:.2?}", stage, elapsed);
    observer.stage_completed(stage, state, elapsed);
    timings.push(StageTiming { stage, elapsed });
}
