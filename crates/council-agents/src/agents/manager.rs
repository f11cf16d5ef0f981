//! Final arbiter: merges analyses, discussion and validation into a verdict.

use std::sync::Arc;

use deliberation::{
    allowed_types, parse_object, CouncilAnalyses, DiscussionMap, Dossier, Parsed,
    ValidationReport, Verdict,
};
use tracing::{info, warn};

use crate::errors::ModelError;
use crate::llm::ModelClient;
use crate::prompts;

pub struct Manager {
    client: Arc<dyn ModelClient>,
}

impl Manager {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Synthesize the final verdict.
    ///
    /// With no usable specialist label there is nothing to choose from, so
    /// no call is made and a degraded verdict is returned.
    pub async fn synthesize(
        &self,
        dossier: &Dossier,
        analyses: &CouncilAnalyses,
        discussion: Option<&DiscussionMap>,
        validation: Option<&ValidationReport>,
    ) -> Result<Verdict, ModelError> {
        let allowed = allowed_types(analyses);
        if allowed.is_empty() {
            warn!("no specialist proposed a usable type, skipping synthesis call");
            let mut verdict = Verdict::degraded(
                "",
                "No specialist produced a usable type; nothing to synthesize",
            );
            verdict.summary = "No usable specialist analyses.".to_string();
            return Ok(verdict);
        }

        let raw = self
            .client
            .invoke(
                &prompts::manager_system_prompt(),
                &prompts::synthesis_user_prompt(dossier, analyses, discussion, validation, &allowed),
            )
            .await?;

        let verdict = match parse_object::<Verdict>(&raw) {
            Parsed::Structured(mut verdict) => {
                verdict.raw_response = None;
                verdict.final_type = normalize_label(&verdict.final_type, &allowed);
                verdict.fill_from_canon()
            }
            Parsed::Degraded { raw, reason } => {
                warn!(%reason, "synthesis output degraded");
                Verdict::degraded(&raw, "Failed to parse response")
            }
        };
        info!(
            final_type = %verdict.final_type,
            confidence = verdict.confidence_score,
            "synthesis complete"
        );
        Ok(verdict)
    }
}

/// Map a case variant of an allowed label onto its canonical spelling.
fn normalize_label(label: &str, allowed: &[String]) -> String {
    let label = label.trim();
    allowed
        .iter()
        .find(|a| a.eq_ignore_ascii_case(label))
        .cloned()
        .unwrap_or_else(|| label.to_string())
}
