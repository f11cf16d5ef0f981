//! Lens-bound specialist: initial analysis and discussion rebuttal.

use std::sync::Arc;

use deliberation::types::AnalysisPayload;
use deliberation::{parse_object, CouncilAnalyses, Dossier, Lens, Parsed, SpecialistAnalysis};
use tracing::{debug, warn};

use crate::errors::ModelError;
use crate::llm::ModelClient;
use crate::prompts;

pub struct SpecialistAnalyst {
    lens: Lens,
    client: Arc<dyn ModelClient>,
}

impl SpecialistAnalyst {
    pub fn new(lens: Lens, client: Arc<dyn ModelClient>) -> Self {
        Self { lens, client }
    }

    pub fn lens(&self) -> Lens {
        self.lens
    }

    /// Produce this lens's analysis of the dossier. Unparseable output
    /// becomes a degraded analysis rather than an error.
    pub async fn analyze(&self, dossier: &Dossier) -> Result<SpecialistAnalysis, ModelError> {
        let raw = self
            .client
            .invoke(
                &prompts::specialist_system_prompt(self.lens),
                &prompts::analysis_user_prompt(dossier),
            )
            .await?;

        let analysis = match parse_object::<AnalysisPayload>(&raw) {
            Parsed::Structured(payload) => SpecialistAnalysis::from_payload(self.lens, payload),
            Parsed::Degraded { raw, reason } => {
                warn!(lens = %self.lens, %reason, "specialist output degraded");
                SpecialistAnalysis::degraded(self.lens, &raw)
            }
        };
        debug!(
            lens = %self.lens,
            predicted = %analysis.predicted_type,
            confidence = analysis.confidence,
            "analysis complete"
        );
        Ok(analysis)
    }

    /// Free-text counter-argument against the other lenses' analyses.
    pub async fn respond_to_discussion(
        &self,
        dossier: &Dossier,
        analyses: &CouncilAnalyses,
    ) -> Result<String, ModelError> {
        let placeholder;
        let own = match analyses.get(&self.lens) {
            Some(own) => own,
            None => {
                placeholder = SpecialistAnalysis::failed(self.lens, "no initial analysis");
                &placeholder
            }
        };
        let text = self
            .client
            .invoke(
                &prompts::discussion_system_prompt(self.lens),
                &prompts::counter_argument_prompt(own, analyses, dossier),
            )
            .await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedModel;
    use deliberation::types::LensFindings;

    fn dossier() -> Dossier {
        Dossier {
            character_name: "X".into(),
            media_source: "Y".into(),
            biographical_facts: vec!["f1".into(), "f2".into()],
            ..Dossier::default()
        }
    }

    #[tokio::test]
    async fn test_analyze_injects_identity_and_keeps_own_findings() {
        let model = Arc::new(FixedModel::replying(
            r#"{"agent_name": "Impostor", "predicted_type": "AAA", "confidence": 70,
                "reasoning": "r", "predicted_quadra": "Gamma",
                "function_analysis": {"likely_base": {"function": "Te", "evidence": "e"}}}"#,
        ));
        let analyst = SpecialistAnalyst::new(Lens::QuadraValues, model.clone());
        let a = analyst.analyze(&dossier()).await.unwrap();

        assert_eq!(a.agent_name, "Agent Quadra");
        assert_eq!(a.predicted_type, "AAA");
        assert_eq!(a.confidence, 70);
        assert_eq!(a.reasoning, "r");
        match a.findings {
            LensFindings::QuadraValues {
                predicted_quadra, ..
            } => assert_eq!(predicted_quadra.as_deref(), Some("Gamma")),
            other => panic!("unexpected findings {other:?}"),
        }
        let prompt = model.last_user_prompt();
        assert!(prompt.contains("1. f1"));
        assert!(prompt.contains("2. f2"));
    }

    #[tokio::test]
    async fn test_analyze_degrades_on_garbage() {
        let model = Arc::new(FixedModel::replying("not json at all"));
        let a = SpecialistAnalyst::new(Lens::Functions, model)
            .analyze(&dossier())
            .await
            .unwrap();
        assert_eq!(a.predicted_type, "Unknown");
        assert_eq!(a.confidence, 0);
        assert_eq!(a.raw_response.as_deref(), Some("not json at all"));
    }

    #[tokio::test]
    async fn test_discussion_returns_trimmed_text() {
        let model = Arc::new(FixedModel::replying("  I concede.  \n"));
        let analyst = SpecialistAnalyst::new(Lens::Dichotomies, model.clone());
        let text = analyst
            .respond_to_discussion(&dossier(), &CouncilAnalyses::new())
            .await
            .unwrap();
        assert_eq!(text, "I concede.");
        assert!(model
            .calls
            .lock()
            .unwrap()
            .last()
            .unwrap()
            .0
            .contains("STAY IN YOUR LANE"));
    }
}
