use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-3-pro-preview";

/// Which council member a model call is made on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Scout,
    Specialist,
    Validator,
    Manager,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scout => write!(f, "scout"),
            Self::Specialist => write!(f, "specialist"),
            Self::Validator => write!(f, "validator"),
            Self::Manager => write!(f, "manager"),
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Sent as `HTTP-Referer` (OpenRouter app attribution).
    pub app_url: Option<String>,
    /// Sent as `X-Title`.
    pub app_title: Option<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            app_url: None,
            app_title: Some("Typing Council".into()),
        }
    }
}

/// Model name per council role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub scout: String,
    pub specialist: String,
    pub validator: String,
    pub manager: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            scout: DEFAULT_MODEL.into(),
            specialist: DEFAULT_MODEL.into(),
            validator: DEFAULT_MODEL.into(),
            manager: DEFAULT_MODEL.into(),
        }
    }
}

impl ModelsConfig {
    pub fn for_role(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::Scout => &self.scout,
            AgentRole::Specialist => &self.specialist,
            AgentRole::Validator => &self.validator,
            AgentRole::Manager => &self.manager,
        }
    }

    fn set_all(&mut self, model: &str) {
        self.scout = model.into();
        self.specialist = model.into();
        self.validator = model.into();
        self.manager = model.into();
    }
}

/// Caps for the scout's search pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Overall cap on collected results.
    pub max_results: usize,
    /// Cap per phrasing variant.
    pub per_query: usize,
    /// Pause between consecutive queries.
    pub query_delay_ms: u64,
    /// SearxNG base URL. Without one the scout runs on background knowledge.
    pub searx_url: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 15,
            per_query: 5,
            query_delay_ms: 300,
            searx_url: None,
        }
    }
}

/// Top-level council configuration.
///
/// Resolution order (highest first): environment, TOML file, defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilConfig {
    pub endpoint: EndpointConfig,
    pub models: ModelsConfig,
    pub search: SearchConfig,
    pub request_timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            models: ModelsConfig::default(),
            search: SearchConfig::default(),
            request_timeout_secs: 120,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl CouncilConfig {
    /// Load from an optional TOML file, overlay the process environment and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml_str(&text)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env_with(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid council config TOML")
    }

    /// Overlay environment values read through `lookup`. Blank values are
    /// ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("COUNCIL_BASE_URL") {
            self.endpoint.base_url = url;
        }
        if let Some(key) = get("COUNCIL_API_KEY").or_else(|| get("OPENROUTER_API_KEY")) {
            self.endpoint.api_key = Some(key);
        }
        if let Some(model) = get("COUNCIL_MODEL") {
            self.models.set_all(&model);
        }
        if let Some(model) = get("COUNCIL_SCOUT_MODEL") {
            self.models.scout = model;
        }
        if let Some(model) = get("COUNCIL_SPECIALIST_MODEL") {
            self.models.specialist = model;
        }
        if let Some(model) = get("COUNCIL_VALIDATOR_MODEL") {
            self.models.validator = model;
        }
        if let Some(model) = get("COUNCIL_MANAGER_MODEL") {
            self.models.manager = model;
        }
        if let Some(url) = get("COUNCIL_SEARX_URL") {
            self.search.searx_url = Some(url);
        }
        if let Some(max) = get("COUNCIL_SEARCH_MAX_RESULTS") {
            match max.trim().parse() {
                Ok(n) => self.search.max_results = n,
                Err(_) => tracing::warn!(value = %max, "ignoring non-numeric COUNCIL_SEARCH_MAX_RESULTS"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: String| Err(PipelineError::Configuration(msg));

        if self.endpoint.base_url.trim().is_empty() {
            return fail("endpoint.base_url must not be empty".into());
        }
        for role in [
            AgentRole::Scout,
            AgentRole::Specialist,
            AgentRole::Validator,
            AgentRole::Manager,
        ] {
            if self.models.for_role(role).trim().is_empty() {
                return fail(format!("models.{role} must not be empty"));
            }
        }
        if self.search.max_results == 0 || self.search.per_query == 0 {
            return fail("search caps must be greater than zero".into());
        }
        if self.search.per_query > self.search.max_results {
            return fail(format!(
                "search.per_query ({}) exceeds search.max_results ({})",
                self.search.per_query, self.search.max_results
            ));
        }
        if self.request_timeout_secs == 0 {
            return fail("request_timeout_secs must be greater than zero".into());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return fail(format!("temperature {t} outside [0, 2]"));
            }
        }
        Ok(())
    }
}
