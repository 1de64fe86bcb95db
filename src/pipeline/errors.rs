use std::time::Duration;

use thiserror::Error;

use super::state::Stage;
use crate::database::lancedb::IndexError;
use crate::http::ProviderError;

/// Why a single stage could not produce its output
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

/// A pipeline run that was aborted; no partial output survives
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("question is empty")]
    EmptyQuery,
    #[error("query rewrite failed: {0}")]
    RewriteFailed(#[source] StageFailure),
    #[error("retrieval failed: {0}")]
    RetrievalFailed(#[source] StageFailure),
    #[error("collection '{collection}' does not exist; run ingestion first")]
    IndexNotFound { collection: String },
    #[error("knowledge extraction failed: {0}")]
    ExtractionFailed(#[source] StageFailure),
    #[error("response synthesis failed: {0}")]
    SynthesisFailed(#[source] StageFailure),
}

impl PipelineError {
    /// The stage that failed, if the run got as far as starting one
    #[inline]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::EmptyQuery => None,
            Self::RewriteFailed(_) => Some(Stage::Rewrite),
            Self::RetrievalFailed(_) | Self::IndexNotFound { .. } => Some(Stage::Retrieve),
            Self::ExtractionFailed(_) => Some(Stage::Extract),
            Self::SynthesisFailed(_) => Some(Stage::Synthesize),
        }
    }

    pub(crate) fn at_stage(stage: Stage, failure: StageFailure) -> Self {
        match (stage, failure) {
            (_, StageFailure::Index(IndexError::NotFound { collection })) => {
                Self::IndexNotFound { collection }
            }
            (Stage::Rewrite, failure) => Self::RewriteFailed(failure),
            (Stage::Retrieve, failure) => Self::RetrievalFailed(failure),
            (Stage::Extract, failure) => Self::ExtractionFailed(failure),
            (Stage::Synthesize, failure) => Self::SynthesisFailed(failure),
        }
    }
}
