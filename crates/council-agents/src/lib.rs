//! Typing council: a scout, three lens-bound specialists, a validator and a
//! manager deliberating over an OpenAI-compatible chat endpoint.
//!
//! The network-free domain (records, canon, consensus rules, phase machine)
//! lives in the `deliberation` crate; this crate owns every model and search
//! call plus the orchestration around them.

#![allow(clippy::uninlined_format_args)]

pub mod agents;
pub mod config;
pub mod council;
pub mod errors;
pub mod llm;
pub mod prompts;
pub mod search;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::AgentFactory;
pub use config::CouncilConfig;
pub use council::{
    CouncilRun, DeliberationOrchestrator, NoopObserver, ProgressObserver, RunOptions,
};
pub use errors::{ModelError, PipelineError, SearchError};
pub use llm::{CouncilClients, ModelClient};
pub use search::{NoSearch, SearchHit, SearchProvider, SearxSearch};
pub use telemetry::RunMetrics;
