//! Run history: the persistence collaborator interface.
//!
//! A [`RunRecord`] bundles every phase output of one run as a single unit
//! keyed by a generated id and a UTC timestamp. Stores list summaries newest
//! first and delete by id. Only an in-memory store lives here; durable
//! backends implement [`HistoryStore`] elsewhere.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CouncilAnalyses, DiscussionMap, Dossier, ValidationReport, Verdict};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("run {0} not found")]
    NotFound(String),
    #[error("failed to serialize run record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("history store lock poisoned")]
    Poisoned,
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub character_name: String,
    pub media_source: String,
    pub final_type: String,
    #[serde(default)]
    pub prompt_version: String,
    pub dossier: Dossier,
    pub council_results: CouncilAnalyses,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_results: Option<DiscussionMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<ValidationReport>,
    pub final_result: Verdict,
}

impl RunRecord {
    pub fn new(
        dossier: Dossier,
        council_results: CouncilAnalyses,
        discussion_results: Option<DiscussionMap>,
        validation_results: Option<ValidationReport>,
        final_result: Verdict,
    ) -> Self {
        Self {
            id: new_run_id(),
            timestamp: Utc::now(),
            character_name: dossier.character_name.clone(),
            media_source: dossier.media_source.clone(),
            final_type: final_result.final_type.clone(),
            prompt_version: String::new(),
            dossier,
            council_results,
            discussion_results,
            validation_results,
            final_result,
        }
    }

    pub fn with_prompt_version(mut self, version: &str) -> Self {
        self.prompt_version = version.to_string();
        self
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            id: self.id.clone(),
            timestamp: self.timestamp,
            character_name: self.character_name.clone(),
            media_source: self.media_source.clone(),
            final_type: self.final_type.clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, HistoryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Listing fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub character_name: String,
    pub media_source: String,
    pub final_type: String,
}

/// Eight hex characters of a v4 UUID.
pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

pub trait HistoryStore: Send + Sync {
    /// Persist `record`, replacing any record with the same id. Returns the id.
    fn save(&self, record: RunRecord) -> Result<String, HistoryError>;
    /// Summaries, newest first.
    fn list(&self) -> Result<Vec<RunSummary>, HistoryError>;
    fn load(&self, id: &str) -> Result<RunRecord, HistoryError>;
    fn delete(&self, id: &str) -> Result<(), HistoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: Mutex<Vec<RunRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn save(&self, record: RunRecord) -> Result<String, HistoryError> {
        let mut records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        let id = record.id.clone();
        records.retain(|r| r.id != id);
        records.push(record);
        tracing::debug!(run_id = %id, "run saved");
        Ok(id)
    }

    fn list(&self) -> Result<Vec<RunSummary>, HistoryError> {
        let records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        let mut summaries: Vec<RunSummary> = records.iter().map(RunRecord::summary).collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }

    fn load(&self, id: &str) -> Result<RunRecord, HistoryError> {
        let records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        records
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(id.to_string()))
    }

    fn delete(&self, id: &str) -> Result<(), HistoryError> {
        let mut records = self.records.lock().map_err(|_| HistoryError::Poisoned)?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(HistoryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
