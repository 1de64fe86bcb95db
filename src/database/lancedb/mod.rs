// LanceDB vector database module
// Handles chunk storage and top-k similarity search

#[cfg(test)]
mod tests;

pub mod vector_store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embeddings::chunking::{ChunkMetadata, ChunkType};
use crate::records::{Severity, ValidationError};

pub use vector_store::VectorIndex;

/// A stored chunk returned from a similarity query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query vector; smaller is more similar
    pub distance: f32,
}

/// Optional metadata restrictions applied before ranking
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub equipment_type: Option<String>,
    pub severity: Option<Severity>,
    pub chunk_type: Option<ChunkType>,
}

impl QueryFilter {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.equipment_type.is_none() && self.severity.is_none() && self.chunk_type.is_none()
    }

    /// SQL predicate for the filter, or `None` when nothing is restricted
    #[inline]
    pub fn to_predicate(&self) -> Option<String> {
        let mut clauses: Vec<String> = Vec::new();

        if let Some(equipment_type) = &self.equipment_type {
            clauses.push(format!(
                "equipment_type = '{}'",
                escape_literal(equipment_type)
            ));
        }
        if let Some(severity) = self.severity {
            clauses.push(format!("severity = '{}'", severity.as_str()));
        }
        if let Some(chunk_type) = self.chunk_type {
            clauses.push(format!("chunk_type = '{}'", chunk_type.as_str()));
        }

        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("collection '{collection}' does not exist; run ingestion first")]
    NotFound { collection: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("database error: {0}")]
    Database(String),
}
