//! Deliberation phase state machine.
//!
//! A run moves `Idle → Fetched → Analyzed → Discussed → Validated →
//! Synthesized`. Discussion and validation are optional, so `Analyzed` may
//! jump forward to `Validated` or `Synthesized` and `Discussed` may jump to
//! `Synthesized`. A failed single-call phase does not move the tracker; the
//! caller retries the same [`Stage`] from the same state.
//!
//! ```text
//! Idle       → Fetched
//! Fetched    → Analyzed
//! Analyzed   → Discussed | Validated | Synthesized
//! Discussed  → Validated | Synthesized
//! Validated  → Synthesized
//! ```

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliberationPhase {
    Idle,
    Fetched,
    Analyzed,
    Discussed,
    Validated,
    /// Terminal.
    Synthesized,
}

impl DeliberationPhase {
    pub fn is_terminal(self) -> bool {
        self == Self::Synthesized
    }
}

impl fmt::Display for DeliberationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetched => "fetched",
            Self::Analyzed => "analyzed",
            Self::Discussed => "discussed",
            Self::Validated => "validated",
            Self::Synthesized => "synthesized",
        };
        f.write_str(s)
    }
}

/// A unit of pipeline work. Completing a stage moves the tracker to
/// [`Stage::completes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Analysis,
    Discussion,
    Validation,
    Synthesis,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Research,
        Stage::Analysis,
        Stage::Discussion,
        Stage::Validation,
        Stage::Synthesis,
    ];

    pub fn completes(self) -> DeliberationPhase {
        match self {
            Self::Research => DeliberationPhase::Fetched,
            Self::Analysis => DeliberationPhase::Analyzed,
            Self::Discussion => DeliberationPhase::Discussed,
            Self::Validation => DeliberationPhase::Validated,
            Self::Synthesis => DeliberationPhase::Synthesized,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Discussion => "discussion",
            Self::Validation => "validation",
            Self::Synthesis => "synthesis",
        };
        f.write_str(s)
    }
}

fn is_legal_transition(from: DeliberationPhase, to: DeliberationPhase) -> bool {
    use DeliberationPhase::*;
    matches!(
        (from, to),
        (Idle, Fetched)
            | (Fetched, Analyzed)
            | (Analyzed, Discussed)
            | (Analyzed, Validated)
            | (Analyzed, Synthesized)
            | (Discussed, Validated)
            | (Discussed, Synthesized)
            | (Validated, Synthesized)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("illegal phase transition: {from} -> {to}")]
    IllegalTransition {
        from: DeliberationPhase,
        to: DeliberationPhase,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: DeliberationPhase,
    pub to: DeliberationPhase,
    /// Milliseconds since the tracker was created.
    pub elapsed_ms: u64,
}

/// Current phase plus the log of how the run got there.
#[derive(Debug)]
pub struct PhaseTracker {
    current: DeliberationPhase,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::resume(DeliberationPhase::Idle)
    }

    /// Start from a persisted phase, for callers stepping through a run
    /// across process boundaries.
    pub fn resume(phase: DeliberationPhase) -> Self {
        Self {
            current: phase,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> DeliberationPhase {
        self.current
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn advance(&mut self, to: DeliberationPhase) -> Result<(), PhaseError> {
        if !is_legal_transition(self.current, to) {
            return Err(PhaseError::IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "phase transition");
        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
        });
        self.current = to;
        Ok(())
    }

    /// Record that `stage` finished.
    pub fn complete(&mut self, stage: Stage) -> Result<(), PhaseError> {
        self.advance(stage.completes())
    }

    /// Whether `stage` may run now.
    pub fn can_run(&self, stage: Stage) -> bool {
        is_legal_transition(self.current, stage.completes())
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// `idle -> fetched -> analyzed -> synthesized` form.
    pub fn summary(&self) -> String {
        let mut states = vec![self
            .transitions
            .first()
            .map(|t| t.from)
            .unwrap_or(self.current)
            .to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        states.join(" -> ")
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
