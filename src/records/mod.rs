//! Maintenance records: the immutable input to ingestion.


use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// How serious a recorded fault was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ValidationError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ValidationError::UnknownSeverity(s.to_string())),
        }
    }
}

/// One historical maintenance log entry
///
/// Field names follow the log export format; `log_id` and `engineer_notes`
/// are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    #[serde(alias = "log_id")]
    pub record_id: String,
    pub date: NaiveDate,
    pub equipment_id: String,
    pub equipment_type: String,
    pub fault_description: String,
    pub symptoms: Vec<String>,
    pub diagnostic_steps: Vec<String>,
    pub root_cause: String,
    pub resolution: String,
    #[serde(default)]
    pub parts_replaced: Vec<String>,
    pub repair_time_hours: f64,
    #[serde(alias = "engineer_notes")]
    pub engineer_note: String,
    pub severity: Severity,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("record '{record_id}': required field `{field}` is empty")]
    EmptyField {
        record_id: String,
        field: &'static str,
    },
    #[error("record at position {index} has an empty id")]
    MissingRecordId { index: usize },
    #[error("record '{record_id}': repair time must be a positive number of hours, got {hours}")]
    InvalidRepairTime { record_id: String, hours: f64 },
    #[error("duplicate record id: {0}")]
    DuplicateRecordId(String),
    #[error("unknown severity: {0}")]
    UnknownSeverity(String),
    #[error("unknown chunk type: {0}")]
    UnknownChunkType(String),
    #[error("malformed record data: {0}")]
    Malformed(String),
    #[error("length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch { chunks: usize, vectors: usize },
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl MaintenanceRecord {
    /// Check that every required field is present and sensible
    #[inline]
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("record_id", &self.record_id),
            ("equipment_id", &self.equipment_id),
            ("equipment_type", &self.equipment_type),
            ("fault_description", &self.fault_description),
            ("root_cause", &self.root_cause),
            ("resolution", &self.resolution),
            ("engineer_note", &self.engineer_note),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(self.empty_field(field));
            }
        }

        if !has_entries(&self.symptoms) {
            return Err(self.empty_field("symptoms"));
        }

        if !has_entries(&self.diagnostic_steps) {
            return Err(self.empty_field("diagnostic_steps"));
        }

        if !self.repair_time_hours.is_finite() || self.repair_time_hours <= 0.0 {
            return Err(ValidationError::InvalidRepairTime {
                record_id: self.record_id.clone(),
                hours: self.repair_time_hours,
            });
        }

        Ok(())
    }

    fn empty_field(&self, field: &'static str) -> ValidationError {
        ValidationError::EmptyField {
            record_id: self.record_id.clone(),
            field,
        }
    }
}

fn has_entries(items: &[String]) -> bool {
    !items.is_empty() && items.iter().all(|item| !item.trim().is_empty())
}

/// Validate a whole record set, including id uniqueness across records
#[inline]
pub fn validate_all(records: &[MaintenanceRecord]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        if record.record_id.trim().is_empty() {
            return Err(ValidationError::MissingRecordId { index });
        }
        record.validate()?;
        if !seen.insert(record.record_id.as_str()) {
            return Err(ValidationError::DuplicateRecordId(record.record_id.clone()));
        }
    }

    debug!("Validated {} maintenance records", records.len());
    Ok(())
}

/// Parse a JSON array of maintenance records
#[inline]
pub fn parse_records(json: &str) -> Result<Vec<MaintenanceRecord>, ValidationError> {
    serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Load maintenance records from a JSON file
#[inline]
pub fn load_records<P: AsRef<Path>>(path: P) -> crate::Result<Vec<MaintenanceRecord>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let records = parse_records(&content).map_err(|e| match e {
        ValidationError::Malformed(message) => {
            ValidationError::Malformed(format!("{}: {}", path.display(), message))
        }
        other => other,
    })?;

    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
