//! Shared test helpers for pipeline tests.

use finqa_core::provider::Usage;
use finqa_core::{Message, Provider, ProviderError, ProviderRequest, ProviderResponse};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A mock provider that replays a script of replies.
///
/// Each call to `complete` pops the next entry and captures the request.
/// Panics if more calls are made than entries provided.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn from_results(script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The user payload of request `index`.
    pub fn payload(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].messages[1].content.clone()
    }

    /// The system instructions of request `index`.
    pub fn instructions(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].messages[0].content.clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };

        let next = self.script.lock().unwrap().pop_front();
        let content = next.unwrap_or_else(|| {
            panic!("ScriptedProvider: no more replies (call #{call})")
        })?;

        Ok(ProviderResponse {
            message: Message::assistant(content),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

// ── Canned replies ────────────────────────────────────────────────────────

pub fn plan_json(intent: &str) -> String {
    serde_json::json!({
        "intent": intent,
        "data_points": [],
        "execution_steps": ["look up the value"],
        "is_percentage_required": false
    })
    .to_string()
}

pub fn step_json(expression: &str, is_percentage: bool) -> String {
    serde_json::json!({
        "thought": "compute",
        "mapping_verification": null,
        "expression": expression,
        "is_percentage": is_percentage,
        "unit_context": null
    })
    .to_string()
}

pub fn review_json(is_valid: bool, commentary: &str) -> String {
    serde_json::json!({
        "is_valid": is_valid,
        "identified_errors": [],
        "commentary": commentary,
        "fixed_expression": null
    })
    .to_string()
}
