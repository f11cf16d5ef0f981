//! Network-free core of the typing council.
//!
//! - [`lens`]: the three specialist framings
//! - [`canon`]: canonical type table rendered into prompts
//! - [`types`]: dossier, analysis, discussion, validation and verdict records
//! - [`extract`]: JSON payload recovery and tagged decoding of model output
//! - [`consensus`]: allowed-set, agreement and verdict membership checks
//! - [`phase`]: run state machine
//! - [`history`]: run records and the persistence interface
//!
//! Nothing in this crate performs I/O; model and search calls live in
//! `council-agents`.

#![allow(clippy::uninlined_format_args)]

pub mod canon;
pub mod consensus;
pub mod extract;
pub mod history;
pub mod lenient;
pub mod lens;
pub mod phase;
pub mod types;

pub use consensus::{allowed_types, check_verdict, Agreement, ConsensusStatus};
pub use extract::{extract_json_payload, parse_object, Parsed};
pub use history::{HistoryError, HistoryStore, InMemoryHistoryStore, RunRecord, RunSummary};
pub use lens::Lens;
pub use phase::{DeliberationPhase, PhaseError, PhaseTracker, Stage};
pub use types::{
    AnalysisPayload, CouncilAnalyses, DiscussionMap, DiscussionResponse, Dossier, ErrorFinding,
    LensFindings, SpecialistAnalysis, ValidationReport, Verdict, ERROR_TYPE, UNKNOWN_TYPE,
};
