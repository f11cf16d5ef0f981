//! Records produced by each deliberation phase.
//!
//! Every record deserializes directly from the JSON payload a model is asked
//! to emit (field-level leniency lives in [`crate::lenient`]), and every record
//! has an explicit degraded constructor used when no payload could be decoded.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::canon;
use crate::lenient::{self, truncate_chars};
use crate::lens::Lens;

/// Sentinel label for a record whose model output could not be parsed.
pub const UNKNOWN_TYPE: &str = "Unknown";
/// Sentinel label for a specialist whose model call failed outright.
pub const ERROR_TYPE: &str = "Error";

/// Characters of raw response kept in a degraded dossier or verdict summary.
const RAW_EXCERPT_CHARS: usize = 500;
/// Characters of raw response echoed in a degraded validation summary.
const VALIDATION_EXCERPT_CHARS: usize = 200;

/// `true` for the sentinels a degraded or failed record carries.
pub fn is_sentinel(label: &str) -> bool {
    let label = label.trim();
    label.is_empty()
        || label.eq_ignore_ascii_case(UNKNOWN_TYPE)
        || label.eq_ignore_ascii_case(ERROR_TYPE)
}

// ── Dossier ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "QuoteRepr")]
pub struct Quote {
    pub quote: String,
    pub context: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuoteRepr {
    Bare(String),
    Full {
        #[serde(default, alias = "text", deserialize_with = "lenient::text")]
        quote: String,
        #[serde(default, deserialize_with = "lenient::text")]
        context: String,
    },
}

impl From<QuoteRepr> for Quote {
    fn from(repr: QuoteRepr) -> Self {
        match repr {
            QuoteRepr::Bare(quote) => Quote {
                quote,
                context: String::new(),
            },
            QuoteRepr::Full { quote, context } => Quote { quote, context },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default, deserialize_with = "lenient::text")]
    pub person: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub dynamic: String,
}

/// Objective fact sheet about the subject. Immutable once produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dossier {
    #[serde(default, deserialize_with = "lenient::text")]
    pub character_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub media_source: String,
    #[serde(default, alias = "behavioral_facts", deserialize_with = "lenient::text_list")]
    pub biographical_facts: Vec<String>,
    #[serde(default, deserialize_with = "lenient::list_entries")]
    pub key_quotes: Vec<Quote>,
    #[serde(
        default,
        deserialize_with = "lenient::object",
        skip_serializing_if = "Option::is_none"
    )]
    pub relationships: Option<Vec<Relationship>>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    /// URLs of the search hits the dossier was compiled from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_urls: Vec<String>,
    /// Raw model output, kept only when the payload could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl Dossier {
    /// Dossier built from unparseable model output: one truncated fact.
    pub fn degraded(subject: &str, source: &str, raw: &str) -> Self {
        let excerpt = truncate_chars(raw.trim(), RAW_EXCERPT_CHARS);
        let facts = if excerpt.is_empty() {
            vec!["(model returned an empty response)".to_string()]
        } else {
            vec![excerpt.to_string()]
        };
        Self {
            character_name: subject.to_string(),
            media_source: source.to_string(),
            biographical_facts: facts,
            summary: "Failed to parse structured response".to_string(),
            raw_response: Some(raw.to_string()),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.raw_response.is_some()
    }

    /// Fill blank identity fields from the caller's inputs.
    pub fn with_identity(mut self, subject: &str, source: &str) -> Self {
        if self.character_name.trim().is_empty() {
            self.character_name = subject.to_string();
        }
        if self.media_source.trim().is_empty() {
            self.media_source = source.to_string();
        }
        self
    }

    /// Deterministic text rendering embedded in specialist prompts.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Character: {}\n", or_unknown(&self.character_name)));
        out.push_str(&format!("Source: {}\n", or_unknown(&self.media_source)));
        out.push('\n');
        out.push_str("BIOGRAPHICAL FACTS:\n");
        for (i, fact) in self.biographical_facts.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, fact));
        }

        out.push_str("\nKEY QUOTES:\n");
        for q in &self.key_quotes {
            if q.context.is_empty() {
                out.push_str(&format!("- \"{}\"\n", q.quote));
            } else {
                out.push_str(&format!("- \"{}\" ({})\n", q.quote, q.context));
            }
        }

        if let Some(relationships) = &self.relationships {
            out.push_str("\nKEY RELATIONSHIPS:\n");
            for r in relationships {
                out.push_str(&format!("- {}: {}\n", or_unknown(&r.person), r.dynamic));
            }
        }

        let summary = if self.summary.is_empty() {
            "No summary available"
        } else {
            &self.summary
        };
        out.push_str(&format!("\nSUMMARY: {summary}"));
        out
    }
}

fn or_unknown(s: &str) -> &str {
    if s.trim().is_empty() {
        UNKNOWN_TYPE
    } else {
        s
    }
}

// ── Specialist analysis ─────────────────────────────────────────────

/// Chosen pole of one dichotomy. A bare string is taken as the pole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PoleRepr")]
pub struct PoleEvidence {
    pub pole: String,
    pub evidence: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PoleRepr {
    Bare(String),
    Full {
        #[serde(default, deserialize_with = "lenient::text")]
        pole: String,
        #[serde(default, deserialize_with = "lenient::text")]
        evidence: String,
    },
}

impl From<PoleRepr> for PoleEvidence {
    fn from(repr: PoleRepr) -> Self {
        match repr {
            PoleRepr::Bare(pole) => PoleEvidence {
                pole,
                evidence: String::new(),
            },
            PoleRepr::Full { pole, evidence } => PoleEvidence { pole, evidence },
        }
    }
}

/// Fit score for one quadra. A bare number is taken as the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FitRepr")]
pub struct FitEvidence {
    pub score: u8,
    pub evidence: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FitRepr {
    Full {
        #[serde(default, deserialize_with = "lenient::confidence")]
        score: u8,
        #[serde(default, deserialize_with = "lenient::text")]
        evidence: String,
    },
    Bare(serde_json::Value),
}

impl From<FitRepr> for FitEvidence {
    fn from(repr: FitRepr) -> Self {
        match repr {
            FitRepr::Full { score, evidence } => FitEvidence { score, evidence },
            FitRepr::Bare(value) => FitEvidence {
                score: lenient::clamp_confidence(&value),
                evidence: String::new(),
            },
        }
    }
}

/// Element placed in one function slot. A bare string is taken as the element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SlotRepr")]
pub struct SlotEvidence {
    pub function: String,
    pub evidence: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotRepr {
    Bare(String),
    Full {
        #[serde(default, deserialize_with = "lenient::text")]
        function: String,
        #[serde(default, deserialize_with = "lenient::text")]
        evidence: String,
    },
}

impl From<SlotRepr> for SlotEvidence {
    fn from(repr: SlotRepr) -> Self {
        match repr {
            SlotRepr::Bare(function) => SlotEvidence {
                function,
                evidence: String::new(),
            },
            SlotRepr::Full { function, evidence } => SlotEvidence { function, evidence },
        }
    }
}

/// Lens-specific structured sub-fields of an analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LensFindings {
    /// Dichotomy key (e.g. `static_dynamic`) to the chosen pole.
    Dichotomies {
        analysis: BTreeMap<String, PoleEvidence>,
    },
    /// `<quadra>_fit` to a 0-100 fit score.
    QuadraValues {
        quadra_analysis: BTreeMap<String, FitEvidence>,
        predicted_quadra: Option<String>,
    },
    /// Slot (e.g. `likely_base`) to the element placed there.
    Functions {
        function_analysis: BTreeMap<String, SlotEvidence>,
        full_stack_prediction: Option<String>,
    },
    #[default]
    Absent,
}

impl LensFindings {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Dichotomies { analysis } => analysis.is_empty(),
            Self::QuadraValues {
                quadra_analysis,
                predicted_quadra,
            } => quadra_analysis.is_empty() && predicted_quadra.is_none(),
            Self::Functions {
                function_analysis,
                full_stack_prediction,
            } => function_analysis.is_empty() && full_stack_prediction.is_none(),
            Self::Absent => true,
        }
    }

    /// Compact bullet rendering for downstream prompts.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            Self::Dichotomies { analysis } => {
                for (key, pe) in analysis {
                    out.push_str(&format!("- {key}: {} ({})\n", pe.pole, pe.evidence));
                }
            }
            Self::QuadraValues {
                quadra_analysis,
                predicted_quadra,
            } => {
                for (key, fit) in quadra_analysis {
                    out.push_str(&format!("- {key}: {} ({})\n", fit.score, fit.evidence));
                }
                if let Some(q) = predicted_quadra {
                    out.push_str(&format!("- predicted_quadra: {q}\n"));
                }
            }
            Self::Functions {
                function_analysis,
                full_stack_prediction,
            } => {
                for (key, slot) in function_analysis {
                    out.push_str(&format!("- {key}: {} ({})\n", slot.function, slot.evidence));
                }
                if let Some(stack) = full_stack_prediction {
                    out.push_str(&format!("- full_stack_prediction: {stack}\n"));
                }
            }
            Self::Absent => {}
        }
        out
    }
}

/// JSON object a specialist is instructed to emit. Only `predicted_type`
/// is mandatory; the lens sub-schema fields are all optional, and a
/// mis-shaped one is dropped rather than failing the payload.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPayload {
    pub predicted_type: String,
    #[serde(default, deserialize_with = "lenient::confidence")]
    pub confidence: u8,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reasoning: String,
    #[serde(default, deserialize_with = "lenient::map_entries")]
    pub analysis: BTreeMap<String, PoleEvidence>,
    #[serde(default, deserialize_with = "lenient::map_entries")]
    pub quadra_analysis: BTreeMap<String, FitEvidence>,
    #[serde(default, deserialize_with = "lenient::label")]
    pub predicted_quadra: Option<String>,
    #[serde(default, deserialize_with = "lenient::map_entries")]
    pub function_analysis: BTreeMap<String, SlotEvidence>,
    #[serde(default, deserialize_with = "lenient::label")]
    pub full_stack_prediction: Option<String>,
}

/// One specialist's conclusion. Exactly one per lens per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistAnalysis {
    pub agent_name: String,
    pub lens: Lens,
    pub predicted_type: String,
    pub confidence: u8,
    pub reasoning: String,
    #[serde(default)]
    pub findings: LensFindings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl SpecialistAnalysis {
    /// Build from a decoded payload. Identity always comes from the lens,
    /// never from the payload; only the lens's own sub-schema is kept.
    pub fn from_payload(lens: Lens, payload: AnalysisPayload) -> Self {
        let findings = match lens {
            Lens::Dichotomies => LensFindings::Dichotomies {
                analysis: payload.analysis,
            },
            Lens::QuadraValues => LensFindings::QuadraValues {
                quadra_analysis: payload.quadra_analysis,
                predicted_quadra: payload.predicted_quadra,
            },
            Lens::Functions => LensFindings::Functions {
                function_analysis: payload.function_analysis,
                full_stack_prediction: payload.full_stack_prediction,
            },
        };
        let predicted_type = if payload.predicted_type.trim().is_empty() {
            UNKNOWN_TYPE.to_string()
        } else {
            payload.predicted_type
        };
        Self {
            agent_name: lens.agent_name().to_string(),
            lens,
            predicted_type,
            confidence: payload.confidence.min(100),
            reasoning: payload.reasoning,
            findings,
            raw_response: None,
        }
    }

    /// Record for a response with no decodable payload.
    pub fn degraded(lens: Lens, raw: &str) -> Self {
        Self {
            agent_name: lens.agent_name().to_string(),
            lens,
            predicted_type: UNKNOWN_TYPE.to_string(),
            confidence: 0,
            reasoning: "Failed to parse response".to_string(),
            findings: LensFindings::Absent,
            raw_response: Some(raw.to_string()),
        }
    }

    /// Record for a specialist whose model call itself failed.
    pub fn failed(lens: Lens, cause: &str) -> Self {
        Self {
            agent_name: lens.agent_name().to_string(),
            lens,
            predicted_type: ERROR_TYPE.to_string(),
            confidence: 0,
            reasoning: format!("Error during analysis: {cause}"),
            findings: LensFindings::Absent,
            raw_response: None,
        }
    }

    /// Whether this analysis proposes a real category label.
    pub fn is_usable(&self) -> bool {
        !is_sentinel(&self.predicted_type)
    }

    /// `Agent X predicted: T (confidence: C%)` header line.
    pub fn headline(&self) -> String {
        format!(
            "{} predicted: {} (confidence: {}%)",
            self.agent_name, self.predicted_type, self.confidence
        )
    }
}

/// Initial-analysis phase output, keyed by producer.
pub type CouncilAnalyses = BTreeMap<Lens, SpecialistAnalysis>;

// ── Discussion ──────────────────────────────────────────────────────

/// Free-text rebuttal or concession from one specialist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionResponse {
    pub agent_name: String,
    pub lens: Lens,
    pub text: String,
    /// Set when `text` is an error placeholder rather than a model response.
    #[serde(default)]
    pub failed: bool,
}

impl DiscussionResponse {
    pub fn new(lens: Lens, text: String) -> Self {
        Self {
            agent_name: lens.agent_name().to_string(),
            lens,
            text,
            failed: false,
        }
    }

    pub fn failed(lens: Lens, cause: &str) -> Self {
        Self {
            agent_name: lens.agent_name().to_string(),
            lens,
            text: format!("Error during discussion: {cause}"),
            failed: true,
        }
    }
}

/// Discussion phase output, keyed by producer.
pub type DiscussionMap = BTreeMap<Lens, DiscussionResponse>;

// ── Validation ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFinding {
    #[serde(default, deserialize_with = "lenient::text")]
    pub agent: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub claim: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub correction: String,
    /// Which canonical rule the claim violates.
    #[serde(default, deserialize_with = "lenient::text")]
    pub reference: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default, deserialize_with = "lenient::list_entries")]
    pub errors_found: Vec<ErrorFinding>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub verified_correct: Vec<String>,
    #[serde(default, deserialize_with = "lenient::label")]
    pub recommended_type: Option<String>,
    /// Advisory note on whether confidence should move.
    #[serde(default, deserialize_with = "lenient::label")]
    pub confidence_adjustment: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ValidationReport {
    pub fn degraded(raw: &str) -> Self {
        Self {
            summary: format!(
                "Failed to parse validation response: {}...",
                truncate_chars(raw, VALIDATION_EXCERPT_CHARS)
            ),
            raw_response: Some(raw.to_string()),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.raw_response.is_some()
    }

    /// Findings attributed to one specialist (matched by agent name).
    pub fn errors_for(&self, lens: Lens) -> impl Iterator<Item = &ErrorFinding> {
        self.errors_found
            .iter()
            .filter(move |e| Lens::from_agent_name(&e.agent) == Some(lens))
    }

    /// Condensed form embedded in the synthesis prompt.
    pub fn digest(&self) -> String {
        if self.errors_found.is_empty() {
            return format!("Validator found no errors. {}", self.summary)
                .trim_end()
                .to_string();
        }
        let mut out = format!(
            "Validator found {} error(s):\n",
            self.errors_found.len()
        );
        for e in &self.errors_found {
            out.push_str(&format!(
                "- {}: claimed \"{}\" -> correction: {} [{}]\n",
                e.agent,
                e.claim,
                e.correction,
                e.reference,
            ));
        }
        if let Some(rec) = &self.recommended_type {
            out.push_str(&format!("Validator recommended type: {rec}\n"));
        }
        if !self.summary.is_empty() {
            out.push_str(&format!("Summary: {}", self.summary));
        }
        out.trim_end().to_string()
    }
}

// ── Verdict ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisBreakdown {
    #[serde(default, deserialize_with = "lenient::text")]
    pub agreements: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub disagreements: String,
    #[serde(default, deserialize_with = "lenient::label")]
    pub majority_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub resolution: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDigest {
    #[serde(default, deserialize_with = "lenient::text")]
    pub errors_found: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub discounted_claims: String,
}

/// Terminal record of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub final_type: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub type_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub type_nickname: String,
    /// Higher-order grouping label.
    #[serde(default, deserialize_with = "lenient::text")]
    pub quadra: String,
    #[serde(default, deserialize_with = "lenient::confidence")]
    pub confidence_score: u8,
    #[serde(default, deserialize_with = "lenient::text")]
    pub confidence_explanation: String,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub key_traits: Vec<String>,
    #[serde(default, deserialize_with = "lenient::label")]
    pub function_stack: Option<String>,
    #[serde(default, deserialize_with = "lenient::map_entries")]
    pub agent_predictions: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::object_or_default")]
    pub synthesis: SynthesisBreakdown,
    #[serde(default, deserialize_with = "lenient::object")]
    pub validation_summary: Option<ValidationDigest>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl Verdict {
    /// Verdict for a synthesis whose output could not be used.
    pub fn degraded(raw: &str, explanation: &str) -> Self {
        Self {
            final_type: UNKNOWN_TYPE.to_string(),
            type_name: "Could not determine".to_string(),
            type_nickname: UNKNOWN_TYPE.to_string(),
            quadra: UNKNOWN_TYPE.to_string(),
            confidence_score: 0,
            confidence_explanation: explanation.to_string(),
            summary: truncate_chars(raw, RAW_EXCERPT_CHARS).to_string(),
            raw_response: Some(raw.to_string()),
            ..Self::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.raw_response.is_some() || is_sentinel(&self.final_type)
    }

    /// Fill blank descriptive fields from the canonical table. The final
    /// label itself is never changed.
    pub fn fill_from_canon(mut self) -> Self {
        if let Some(profile) = canon::profile(&self.final_type) {
            if self.type_name.trim().is_empty() {
                self.type_name = profile.name.to_string();
            }
            if self.type_nickname.trim().is_empty() {
                self.type_nickname = profile.nickname.to_string();
            }
            if self.quadra.trim().is_empty() {
                self.quadra = profile.quadra.to_string();
            }
            if self.function_stack.is_none() {
                self.function_stack = Some(profile.stack_string());
            }
        }
        self
    }
}
