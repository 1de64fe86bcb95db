#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::records::{MaintenanceRecord, Severity, ValidationError};

/// The four views of a maintenance record that are embedded separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    FaultOverview,
    Diagnostic,
    Resolution,
    EngineerNotes,
}

impl ChunkType {
    pub const ALL: [Self; 4] = [
        Self::FaultOverview,
        Self::Diagnostic,
        Self::Resolution,
        Self::EngineerNotes,
    ];

    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FaultOverview => "fault_overview",
            Self::Diagnostic => "diagnostic",
            Self::Resolution => "resolution",
            Self::EngineerNotes => "engineer_notes",
        }
    }
}

impl fmt::Display for ChunkType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = ValidationError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|chunk_type| chunk_type.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownChunkType(s.to_string()))
    }
}

/// Record fields copied onto every chunk so a hit can be shown and filtered
/// without going back to the source record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub record_id: String,
    pub date: NaiveDate,
    pub equipment_id: String,
    pub equipment_type: String,
    pub severity: Severity,
    pub repair_time_hours: f64,
    pub chunk_type: ChunkType,
}

/// Represents a chunk of a maintenance record ready for embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{record_id}_{chunk_type}`
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[inline]
pub fn chunk_id(record_id: &str, chunk_type: ChunkType) -> String {
    format!("{}_{}", record_id, chunk_type.as_str())
}

/// Split one validated record into its four chunks
#[inline]
pub fn chunk_record(record: &MaintenanceRecord) -> Result<[Chunk; 4], ValidationError> {
    record.validate()?;

    Ok(ChunkType::ALL.map(|chunk_type| Chunk {
        id: chunk_id(&record.record_id, chunk_type),
        text: render_text(record, chunk_type),
        metadata: ChunkMetadata {
            record_id: record.record_id.clone(),
            date: record.date,
            equipment_id: record.equipment_id.clone(),
            equipment_type: record.equipment_type.clone(),
            severity: record.severity,
            repair_time_hours: record.repair_time_hours,
            chunk_type,
        },
    }))
}

/// Chunk every record, preserving record order and chunk type order
#[inline]
pub fn chunk_records(records: &[MaintenanceRecord]) -> Result<Vec<Chunk>, ValidationError> {
    let mut chunks = Vec::with_capacity(records.len() * ChunkType::ALL.len());
    for record in records {
        chunks.extend(chunk_record(record)?);
    }

    debug!(
        "Created {} chunks from {} records",
        chunks.len(),
        records.len()
    );
    Ok(chunks)
}

fn render_text(record: &MaintenanceRecord, chunk_type: ChunkType) -> String {
    let fault = &record.fault_description;
    let equipment_type = &record.equipment_type;

    match chunk_type {
        ChunkType::FaultOverview => format!(
            "Equipment: {} ({}). Date: {}. Severity: {}. Fault: {}. Symptoms: {}.",
            equipment_type,
            record.equipment_id,
            record.date,
            record.severity,
            fault,
            record.symptoms.join("; ")
        ),
        ChunkType::Diagnostic => format!(
            "Fault: {} on {}. Diagnostic steps performed: {}.",
            fault,
            equipment_type,
            record.diagnostic_steps.join("; ")
        ),
        ChunkType::Resolution => {
            let parts = if record.parts_replaced.is_empty() {
                "none".to_string()
            } else {
                record.parts_replaced.join(", ")
            };
            format!(
                "Fault: {} on {}. Root cause: {}. Resolution: {}. Parts replaced: {}. Repair time: {:?} hours.",
                fault,
                equipment_type,
                record.root_cause,
                record.resolution,
                parts,
                record.repair_time_hours
            )
        }
        ChunkType::EngineerNotes => format!(
            "Engineer notes for {} on {} ({}): {}",
            fault, equipment_type, record.equipment_id, record.engineer_note
        ),
    }
}
