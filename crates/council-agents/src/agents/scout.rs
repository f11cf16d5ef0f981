//! The scout: search, then compile an objective dossier.

use std::sync::Arc;

use deliberation::{parse_object, Dossier, Parsed};
use tracing::{info, warn};

use crate::config::SearchConfig;
use crate::errors::ModelError;
use crate::llm::ModelClient;
use crate::prompts;
use crate::search::{self, SearchProvider};

/// Appended to the summary when the dossier was compiled without search hits
/// and the model did not say so itself.
pub const BACKGROUND_KNOWLEDGE_NOTE: &str =
    "Note: compiled from general background knowledge; no search results were available.";

pub struct Scout {
    client: Arc<dyn ModelClient>,
    search: Arc<dyn SearchProvider>,
    caps: SearchConfig,
}

impl Scout {
    pub fn new(
        client: Arc<dyn ModelClient>,
        search: Arc<dyn SearchProvider>,
        caps: SearchConfig,
    ) -> Self {
        Self {
            client,
            search,
            caps,
        }
    }

    /// Research `subject` from `source`.
    ///
    /// Search failures and an unparseable completion never fail the call;
    /// only a failed model invocation does.
    pub async fn research(&self, subject: &str, source: &str) -> Result<Dossier, ModelError> {
        let hits = search::gather(self.search.as_ref(), subject, source, &self.caps).await;
        let formatted = search::format_results(&hits, subject, source);
        info!(subject, source, hits = hits.len(), "scout compiling dossier");

        let raw = self
            .client
            .invoke(
                prompts::SCOUT_SYSTEM_PROMPT,
                &prompts::scout_user_prompt(subject, source, &formatted),
            )
            .await?;

        let mut dossier = match parse_object::<Dossier>(&raw) {
            Parsed::Structured(mut dossier) => {
                dossier.raw_response = None;
                dossier.with_identity(subject, source)
            }
            Parsed::Degraded { raw, reason } => {
                warn!(subject, %reason, "scout returned no usable dossier");
                Dossier::degraded(subject, source, &raw)
            }
        };

        dossier.source_urls = hits.into_iter().map(|h| h.url).collect();
        if dossier.source_urls.is_empty() && !dossier.is_degraded() {
            mark_background_knowledge(&mut dossier);
        }
        Ok(dossier)
    }
}

fn mark_background_knowledge(dossier: &mut Dossier) {
    let summary = dossier.summary.to_lowercase();
    if summary.contains("background knowledge") || summary.contains("general knowledge") {
        return;
    }
    if dossier.summary.trim().is_empty() {
        dossier.summary = BACKGROUND_KNOWLEDGE_NOTE.to_string();
    } else {
        dossier.summary = format!("{} {}", dossier.summary.trim_end(), BACKGROUND_KNOWLEDGE_NOTE);
    }
}
