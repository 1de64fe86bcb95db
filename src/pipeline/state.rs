use std::fmt;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::database::lancedb::RetrievedChunk;

/// The four pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Rewrite,
    Retrieve,
    Extract,
    Synthesize,
}

impl Stage {
    pub const ALL: [Self; 4] = [Self::Rewrite, Self::Retrieve, Self::Extract, Self::Synthesize];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rewrite => "rewrite",
            Self::Retrieve => "retrieve",
            Self::Extract => "extract",
            Self::Synthesize => "synthesize",
        }
    }

    /// Human readable name used in progress output
    #[inline]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Rewrite => "Rewriting query",
            Self::Retrieve => "Retrieving maintenance history",
            Self::Extract => "Extracting fault patterns",
            Self::Synthesize => "Writing response",
        }
    }
}

impl fmt::Display for Stage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State carried through one pipeline run
///
/// Every stage output is written exactly once. Observers only ever see a
/// shared reference.
#[derive(Debug, Clone)]
pub struct PipelineState {
    original_query: String,
    rewritten_query: Option<String>,
    retrieved_chunks: Option<Vec<RetrievedChunk>>,
    knowledge_analysis: Option<String>,
    final_response: Option<String>,
}

impl PipelineState {
    #[inline]
    pub fn new(original_query: impl Into<String>) -> Self {
        Self {
            original_query: original_query.into(),
            rewritten_query: None,
            retrieved_chunks: None,
            knowledge_analysis: None,
            final_response: None,
        }
    }

    #[inline]
    pub fn original_query(&self) -> &str {
        &self.original_query
    }

    #[inline]
    pub fn rewritten_query(&self) -> Option<&str> {
        self.rewritten_query.as_deref()
    }

    /// The rewrite when it has content, otherwise the original question
    #[inline]
    pub fn effective_query(&self) -> &str {
        self.rewritten_query
            .as_deref()
            .filter(|q| !q.trim().is_empty())
            .unwrap_or(&self.original_query)
    }

    #[inline]
    pub fn retrieved_chunks(&self) -> Option<&[RetrievedChunk]> {
        self.retrieved_chunks.as_deref()
    }

    #[inline]
    pub fn knowledge_analysis(&self) -> Option<&str> {
        self.knowledge_analysis.as_deref()
    }

    #[inline]
    pub fn final_response(&self) -> Option<&str> {
        self.final_response.as_deref()
    }

    /// The last stage whose output has been written
    #[inline]
    pub fn last_completed(&self) -> Option<Stage> {
        if self.final_response.is_some() {
            Some(Stage::Synthesize)
        } else if self.knowledge_analysis.is_some() {
            Some(Stage::Extract)
        } else if self.retrieved_chunks.is_some() {
            Some(Stage::Retrieve)
        } else if self.rewritten_query.is_some() {
            Some(Stage::Rewrite)
        } else {
            None
        }
    }

    pub(crate) fn set_rewritten_query(&mut self, query: String) {
        write_once(&mut self.rewritten_query, query, Stage::Rewrite);
    }

    pub(crate) fn set_retrieved_chunks(&mut self, chunks: Vec<RetrievedChunk>) {
        write_once(&mut self.retrieved_chunks, chunks, Stage::Retrieve);
    }

    pub(crate) fn set_knowledge_analysis(&mut self, analysis: String) {
        write_once(&mut self.knowledge_analysis, analysis, Stage::Extract);
    }

    pub(crate) fn set_final_response(&mut self, response: String) {
        write_once(&mut self.final_response, response, Stage::Synthesize);
    }
}

fn write_once<T>(slot: &mut Option<T>, value: T, stage: Stage) {
    debug_assert!(slot.is_none(), "{stage} output written twice");
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Wall-clock time spent in one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed: Duration,
}

/// Everything a successful run produced
#[derive(Debug, Clone, Serialize)]
pub struct CompletedRun {
    pub run_id: Uuid,
    pub original_query: String,
    pub rewritten_query: String,
    /// The text that was actually embedded for retrieval
    pub retrieval_query: String,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub knowledge_analysis: String,
    pub final_response: String,
    pub timings: Vec<StageTiming>,
}

impl CompletedRun {
    #[inline]
    pub fn total_elapsed(&self) -> Duration {
        self.timings.iter().map(|t| t.elapsed).sum()
    }
}
