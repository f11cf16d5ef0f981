//! Run metrics.
//!
//! [`MetricsCollector`] accumulates per-stage wall time and call counts while
//! a run is driven; [`MetricsCollector::finalize`] produces the serializable
//! [`RunMetrics`]. The CLI prints them next to the run record and can append
//! them to a JSONL log.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use deliberation::Stage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Wall time of one stage attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
    pub succeeded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub started_at: String,
    pub elapsed_ms: u64,
    pub prompt_version: String,
    pub stages: Vec<StageTiming>,
    pub model_calls: u32,
    /// Records built from unparseable model output.
    pub degraded_records: u32,
    /// Fan-out tasks whose model call failed.
    pub failed_tasks: u32,
    /// Stage attempts that failed and were retried by the caller.
    pub retried_stages: u32,
}

pub struct MetricsCollector {
    started_at: chrono::DateTime<chrono::Utc>,
    run_start: Instant,
    prompt_version: String,
    stages: Vec<StageTiming>,
    model_calls: u32,
    degraded_records: u32,
    failed_tasks: u32,
}

impl MetricsCollector {
    pub fn new(prompt_version: &str) -> Self {
        Self {
            started_at: chrono::Utc::now(),
            run_start: Instant::now(),
            prompt_version: prompt_version.to_string(),
            stages: Vec::new(),
            model_calls: 0,
            degraded_records: 0,
            failed_tasks: 0,
        }
    }

    pub fn record_stage(&mut self, stage: Stage, elapsed: Duration, succeeded: bool) {
        self.stages.push(StageTiming {
            stage,
            elapsed_ms: elapsed.as_millis() as u64,
            succeeded,
        });
    }

    pub fn record_model_calls(&mut self, count: u32) {
        self.model_calls += count;
    }

    pub fn record_degraded(&mut self, count: u32) {
        self.degraded_records += count;
    }

    pub fn record_failed_tasks(&mut self, count: u32) {
        self.failed_tasks += count;
    }

    pub fn finalize(&self) -> RunMetrics {
        RunMetrics {
            started_at: self.started_at.to_rfc3339(),
            elapsed_ms: self.run_start.elapsed().as_millis() as u64,
            prompt_version: self.prompt_version.clone(),
            stages: self.stages.clone(),
            model_calls: self.model_calls,
            degraded_records: self.degraded_records,
            failed_tasks: self.failed_tasks,
            retried_stages: self.stages.iter().filter(|t| !t.succeeded).count() as u32,
        }
    }
}

/// Append `metrics` as one JSON line to `path`, creating the file if needed.
pub fn append_metrics(metrics: &RunMetrics, path: &Path) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(metrics).context("Failed to serialize run metrics")?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open metrics log {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("Failed to append to metrics log {}", path.display()))?;
    debug!(path = %path.display(), stages = metrics.stages.len(), "run metrics appended");
    Ok(())
}
