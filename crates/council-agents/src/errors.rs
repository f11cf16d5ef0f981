//! Error taxonomy for the council.
//!
//! | Error              | Where it surfaces                       | Retriable |
//! |--------------------|-----------------------------------------|-----------|
//! | `ModelError`       | contained per task in fan-out phases    | n/a       |
//! | `PipelineError`    | research, validation, synthesis         | per cause |
//! | `SearchError`      | logged and skipped by the scout         | n/a       |
//!
//! Malformed model output is not an error anywhere: it becomes a degraded
//! record.

use deliberation::{DeliberationPhase, HistoryError, PhaseError, Stage};
use thiserror::Error;

/// Failure of one model invocation (a transport failure).
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode completion envelope: {0}")]
    Decode(String),

    #[error("completion contained no message content")]
    EmptyCompletion,

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ModelError {
    /// Rate limits and server-side errors are worth retrying; a 4xx
    /// other than 408/429 is not.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Decode(_) | Self::EmptyCompletion => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::ClientBuild(_) => false,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        Self::Request(e.to_string())
    }
}

/// A single search query failed.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query {query:?} failed: {message}")]
    Query { query: String, message: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transport failure inside a single-call phase. The caller may retry
    /// exactly this stage.
    #[error("{stage} phase failed: {source}")]
    Phase {
        stage: Stage,
        #[source]
        source: ModelError,
    },

    #[error(transparent)]
    Sequencing(#[from] PhaseError),

    #[error(transparent)]
    History(#[from] HistoryError),

    /// A run record was requested before synthesis finished.
    #[error("run is incomplete: stopped at phase {0}")]
    Incomplete(DeliberationPhase),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn phase(stage: Stage, source: ModelError) -> Self {
        Self::Phase { stage, source }
    }

    /// The stage a retry should re-invoke, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Phase { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Phase { source, .. } => source.is_retriable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_retry_classification() {
        let rate = ModelError::Status {
            status: 429,
            body: String::new(),
        };
        let bad = ModelError::Status {
            status: 400,
            body: String::new(),
        };
        let server = ModelError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(rate.is_retriable());
        assert!(!bad.is_retriable());
        assert!(server.is_retriable());
    }

    #[test]
    fn test_phase_error_reports_stage() {
        let err = PipelineError::phase(Stage::Validation, ModelError::Request("reset".into()));
        assert_eq!(err.stage(), Some(Stage::Validation));
        assert!(err.is_retriable());
        assert_eq!(err.to_string(), "validation phase failed: request failed: reset");
    }

    #[test]
    fn test_configuration_not_retriable() {
        let err = PipelineError::Configuration("missing key".into());
        assert!(!err.is_retriable());
        assert_eq!(err.stage(), None);
    }
}
