//! Council members.
//!
//! Each member wraps a [`ModelClient`] and owns its prompts. Members never
//! fail on malformed model output (that becomes a degraded record); they
//! only return `Err` when the model call itself fails.
//! [`AgentFactory`] builds every member from one set of clients.

pub mod analyst;
pub mod manager;
pub mod scout;
pub mod validator;

use std::sync::Arc;

use deliberation::Lens;

use crate::config::SearchConfig;
use crate::llm::CouncilClients;
use crate::search::SearchProvider;

pub use analyst::SpecialistAnalyst;
pub use manager::Manager;
pub use scout::Scout;
pub use validator::Validator;

/// Builds council members from shared clients.
#[derive(Clone)]
pub struct AgentFactory {
    pub clients: CouncilClients,
    pub search: Arc<dyn SearchProvider>,
    pub search_caps: SearchConfig,
}

impl AgentFactory {
    pub fn new(
        clients: CouncilClients,
        search: Arc<dyn SearchProvider>,
        search_caps: SearchConfig,
    ) -> Self {
        Self {
            clients,
            search,
            search_caps,
        }
    }

    pub fn scout(&self) -> Scout {
        Scout::new(
            self.clients.scout.clone(),
            self.search.clone(),
            self.search_caps.clone(),
        )
    }

    pub fn analyst(&self, lens: Lens) -> SpecialistAnalyst {
        SpecialistAnalyst::new(lens, self.clients.specialist.clone())
    }

    pub fn validator(&self) -> Validator {
        Validator::new(self.clients.validator.clone())
    }

    pub fn manager(&self) -> Manager {
        Manager::new(self.clients.manager.clone())
    }
}
