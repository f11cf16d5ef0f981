//! Model invocation boundary.
//!
//! Every council call is one system message plus one user message; no
//! conversation state is kept on the provider side. [`OpenAiCompatClient`]
//! speaks the OpenAI chat completion shape (OpenRouter, vLLM, llama.cpp
//! server, ...).

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AgentRole, CouncilConfig};
use crate::errors::ModelError;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send one system + user message pair and return the completion text.
    async fn invoke(&self, system: &str, user: &str) -> Result<String, ModelError>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Build the shared HTTP client. `reqwest::Client` is reference-counted, so
/// one instance serves every role.
pub fn http_client(config: &CouncilConfig) -> Result<reqwest::Client, ModelError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ModelError::ClientBuild(e.to_string()))
}

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    app_url: Option<String>,
    app_title: Option<String>,
}

impl OpenAiCompatClient {
    pub fn new(http: reqwest::Client, config: &CouncilConfig, role: AgentRole) -> Self {
        Self {
            http,
            url: format!(
                "{}/chat/completions",
                config.endpoint.base_url.trim_end_matches('/')
            ),
            api_key: config.endpoint.api_key.clone(),
            model: config.models.for_role(role).to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            app_url: config.endpoint.app_url.clone(),
            app_title: config.endpoint.app_title.clone(),
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn invoke(&self, system: &str, user: &str) -> Result<String, ModelError> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(url) = &self.app_url {
            request = request.header("HTTP-Referer", url);
        }
        if let Some(title) = &self.app_title {
            request = request.header("X-Title", title);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status, body });
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ModelError::EmptyCompletion)?;

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "model call complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// One client per council role.
#[derive(Clone)]
pub struct CouncilClients {
    pub scout: Arc<dyn ModelClient>,
    pub specialist: Arc<dyn ModelClient>,
    pub validator: Arc<dyn ModelClient>,
    pub manager: Arc<dyn ModelClient>,
}

impl CouncilClients {
    pub fn from_config(config: &CouncilConfig) -> Result<Self, ModelError> {
        let http = http_client(config)?;
        let make = |role| -> Arc<dyn ModelClient> {
            Arc::new(OpenAiCompatClient::new(http.clone(), config, role))
        };
        Ok(Self {
            scout: make(AgentRole::Scout),
            specialist: make(AgentRole::Specialist),
            validator: make(AgentRole::Validator),
            manager: make(AgentRole::Manager),
        })
    }

    /// Same client for every role.
    pub fn uniform(client: Arc<dyn ModelClient>) -> Self {
        Self {
            scout: client.clone(),
            specialist: client.clone(),
            validator: client.clone(),
            manager: client,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "sys",
                },
                ChatMessage {
                    role: "user",
                    content: "usr",
                },
            ],
            temperature: None,
            max_tokens: Some(512),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "usr");
        assert_eq!(json["max_tokens"], 512);
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_envelope_decoding() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}]}"#;
        let env: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(env.choices[0].message.content.as_deref(), Some("hi"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.choices.is_empty());
    }

    #[test]
    fn test_client_uses_role_model_and_trims_url() {
        let mut config = CouncilConfig::default();
        config.endpoint.base_url = "http://localhost:8080/v1/".into();
        config.models.validator = "small".into();
        let client = OpenAiCompatClient::new(reqwest::Client::new(), &config, AgentRole::Validator);
        assert_eq!(client.url, "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.model_name(), "small");
    }
}
