//! Shared fixtures and fakes for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::embeddings::EmbeddingProvider;
use crate::http::ProviderError;
use crate::llm::LanguageModel;
use crate::records::{MaintenanceRecord, Severity};

pub fn overheating_record(id: &str) -> MaintenanceRecord {
    MaintenanceRecord {
        record_id: id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 1, 14).unwrap_or_default(),
        equipment_id: "TRK-412".to_string(),
        equipment_type: "Heavy Utility Truck".to_string(),
        fault_description: "Engine overheating during sustained load".to_string(),
        symptoms: vec![
            "Coolant temperature warning light active".to_string(),
            "Loss of power under load".to_string(),
        ],
        diagnostic_steps: vec![
            "Check coolant level and condition".to_string(),
            "Inspect thermostat operation".to_string(),
        ],
        root_cause: "Thermostat stuck in closed position".to_string(),
        resolution: "Replaced thermostat and flushed cooling system".to_string(),
        parts_replaced: vec!["Thermostat".to_string(), "Coolant".to_string()],
        repair_time_hours: 6.5,
        engineer_note: "Recommend follow-up inspection in 30 days.".to_string(),
        severity: Severity::High,
    }
}

pub fn hydraulic_record(id: &str) -> MaintenanceRecord {
    MaintenanceRecord {
        record_id: id.to_string(),
        date: NaiveDate::from_ymd_opt(2024, 2, 3).unwrap_or_default(),
        equipment_id: "AV-233".to_string(),
        equipment_type: "Armoured Personnel Carrier".to_string(),
        fault_description: "Hydraulic system pressure loss".to_string(),
        symptoms: vec!["Hydraulic fluid visible on ground".to_string()],
        diagnostic_steps: vec!["Inspect all hose connections and fittings".to_string()],
        root_cause: "Hydraulic hose burst at crimped fitting".to_string(),
        resolution: "Replaced failed hydraulic hose".to_string(),
        parts_replaced: vec!["Hydraulic hose".to_string()],
        repair_time_hours: 3.0,
        engineer_note: "Flush the system at next service window.".to_string(),
        severity: Severity::Medium,
    }
}

/// Embeds text by counting hits against a handful of keyword families.
///
/// Deterministic, so similarity between texts that share vocabulary is
/// predictable in tests.
pub struct KeywordEmbedder {
    pub calls: Mutex<Vec<Vec<String>>>,
}

pub const KEYWORD_FAMILIES: &[&[&str]] = &[
    &["overheat", "hot", "coolant", "temperature", "thermostat", "radiator"],
    &["hydraulic", "leak", "fluid", "hose", "pressure"],
    &["load", "power"],
    &["truck"],
    &["smoke", "exhaust", "fuel"],
];

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn embed_text(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORD_FAMILIES
            .iter()
            .map(|family| {
                family
                    .iter()
                    .map(|keyword| lowered.matches(keyword).count() as f32)
                    .sum()
            })
            .collect();
        vector.push(0.1);
        vector
    }

    pub fn dimension() -> usize {
        KEYWORD_FAMILIES.len() + 1
    }

    pub fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(texts.to_vec());
        }
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }

    fn dimension(&self) -> usize {
        Self::dimension()
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

/// Replays queued completions in order and records every prompt
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    pub prompts: Mutex<Vec<(String, u32)>>,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded_prompts(&self) -> Vec<(String, u32)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((prompt.to_string(), max_tokens));
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(ProviderError::EmptyResponse))
    }

    fn model_name(&self) -> &str {
        "scripted-test"
    }
}
