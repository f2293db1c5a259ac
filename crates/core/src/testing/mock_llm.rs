//! Mock LLM client for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, LlmUsage};

/// Scripted LLM client.
///
/// Replies are consumed in order; once the script is exhausted every call
/// returns the default text (`{}` unless changed).
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    default_text: Mutex<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_text: Mutex::new("{}".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_text(self, text: impl Into<String>) -> Self {
        *self.default_text.lock().unwrap() = text.into();
        self
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.script.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn push_error(&self, error: LlmError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(reply) => reply?,
            None => self.default_text.lock().unwrap().clone(),
        };
        Ok(CompletionResponse {
            text,
            usage: LlmUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
        })
    }
}
