//! In-crate test doubles.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::ModelError;
use crate::llm::ModelClient;

/// Replies with a fixed text (or a transport failure) and records every
/// `(system, user)` pair it was sent.
pub struct FixedModel {
    reply: Result<String, u16>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl FixedModel {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            reply: Err(status),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> String {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, user)| user.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for FixedModel {
    async fn invoke(&self, system: &str, user: &str) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(ModelError::Status {
                status: *status,
                body: "scripted failure".into(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}
