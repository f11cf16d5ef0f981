//! Consensus rules over specialist proposals.
//!
//! Only the structural rules are checked here: the final label must be one a
//! specialist actually proposed, and the stated grouping must match the
//! canonical grouping of that label. Theory-level correctness of the claims
//! is left to the validator and synthesizer prompts.

use serde::{Deserialize, Serialize};

use crate::canon;
use crate::lens::Lens;
use crate::types::{is_sentinel, CouncilAnalyses, Verdict};

/// Distinct usable proposals in council order. Sentinel labels
/// (`Unknown`, `Error`) are never allowed.
pub fn allowed_types(analyses: &CouncilAnalyses) -> Vec<String> {
    let mut allowed: Vec<String> = Vec::new();
    for lens in Lens::ALL {
        let Some(analysis) = analyses.get(&lens) else {
            continue;
        };
        let label = analysis.predicted_type.trim();
        if is_sentinel(label) {
            continue;
        }
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(label)) {
            allowed.push(label.to_string());
        }
    }
    allowed
}

/// How far the specialists agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Agreement {
    /// Every usable specialist proposed the same label. Degraded or failed
    /// specialists do not count as dissent.
    Unanimous { label: String },
    /// At least two agree and at least one differs.
    Majority { label: String, dissenters: Vec<Lens> },
    /// No label has two votes.
    Split,
    /// No specialist produced a usable label.
    NoProposals,
}

impl std::fmt::Display for Agreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unanimous { label } => write!(f, "unanimous ({label})"),
            Self::Majority { label, dissenters } => {
                write!(f, "majority ({label}, {} dissenting)", dissenters.len())
            }
            Self::Split => write!(f, "split"),
            Self::NoProposals => write!(f, "no_proposals"),
        }
    }
}

pub fn agreement(analyses: &CouncilAnalyses) -> Agreement {
    let allowed = allowed_types(analyses);
    if allowed.is_empty() {
        return Agreement::NoProposals;
    }

    let votes_for = |label: &str| {
        analyses
            .values()
            .filter(|a| a.predicted_type.trim().eq_ignore_ascii_case(label))
            .count()
    };

    let best = allowed
        .iter()
        .map(|label| (label, votes_for(label)))
        .max_by_key(|(_, votes)| *votes);

    match best {
        Some((label, votes)) if votes >= 2 || allowed.len() == 1 => {
            let dissenters: Vec<Lens> = analyses
                .iter()
                .filter(|(_, a)| {
                    a.is_usable() && !a.predicted_type.trim().eq_ignore_ascii_case(label)
                })
                .map(|(lens, _)| *lens)
                .collect();
            if dissenters.is_empty() {
                Agreement::Unanimous {
                    label: label.clone(),
                }
            } else {
                Agreement::Majority {
                    label: label.clone(),
                    dissenters,
                }
            }
        }
        _ => Agreement::Split,
    }
}

/// Result of checking a verdict against the structural rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsensusStatus {
    Consistent,
    /// Final label was not proposed by any specialist.
    Invented {
        final_type: String,
        allowed: Vec<String>,
    },
    /// Stated grouping contradicts the canonical grouping of the label.
    GroupingMismatch {
        final_type: String,
        stated: String,
        expected: String,
    },
    /// The verdict is itself a degraded record; nothing to check.
    Degraded,
}

impl ConsensusStatus {
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Invented { .. } | Self::GroupingMismatch { .. })
    }
}

pub fn check_verdict(verdict: &Verdict, analyses: &CouncilAnalyses) -> ConsensusStatus {
    let final_type = verdict.final_type.trim();
    if verdict.raw_response.is_some() || is_sentinel(final_type) {
        return ConsensusStatus::Degraded;
    }

    let allowed = allowed_types(analyses);
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(final_type)) {
        return ConsensusStatus::Invented {
            final_type: final_type.to_string(),
            allowed,
        };
    }

    let stated = verdict.quadra.trim();
    if let Some(expected) = canon::quadra_of(final_type) {
        let expected = expected.to_string();
        if !stated.is_empty() && !stated.to_lowercase().contains(&expected.to_lowercase()) {
            return ConsensusStatus::GroupingMismatch {
                final_type: final_type.to_string(),
                stated: stated.to_string(),
                expected,
            };
        }
    }

    ConsensusStatus::Consistent
}
