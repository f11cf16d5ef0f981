//! Fact-checker for the specialists' claims.

use std::sync::Arc;

use deliberation::{parse_object, CouncilAnalyses, Parsed, ValidationReport};
use tracing::{info, warn};

use crate::errors::ModelError;
use crate::llm::ModelClient;
use crate::prompts;

pub struct Validator {
    client: Arc<dyn ModelClient>,
}

impl Validator {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Check every analysis against the canonical tables. The report is
    /// advisory; it never rewrites an analysis.
    pub async fn validate(&self, analyses: &CouncilAnalyses) -> Result<ValidationReport, ModelError> {
        let raw = self
            .client
            .invoke(
                &prompts::validator_system_prompt(),
                &prompts::validation_user_prompt(analyses),
            )
            .await?;

        let report = match parse_object::<ValidationReport>(&raw) {
            Parsed::Structured(mut report) => {
                report.raw_response = None;
                report
            }
            Parsed::Degraded { raw, reason } => {
                warn!(%reason, "validation output degraded");
                ValidationReport::degraded(&raw)
            }
        };
        info!(
            errors = report.errors_found.len(),
            recommended = report.recommended_type.as_deref().unwrap_or("-"),
            "validation complete"
        );
        Ok(report)
    }
}
