//! Reply generation through a local Ollama server.

use crate::config::AnswerConfig;
use crate::error::{KiraError, Result};
use crate::http;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

const SERVICE: &str = "ollama";

/// Produces a reply to a question, given background context.
pub trait AnswerProvider: Send + Sync {
    fn ask(&self, question: &str, context: &str) -> Result<String>;
}

/// Prompt layout shared by every provider.
pub fn compose_prompt(question: &str, context: &str) -> String {
    format!("Context: {}\n\nQuestion: {}", context, question)
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Reachability check run once at startup.
    pub fn check_status(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .map_err(|e| KiraError::Other(format!(
                "Ollama is not reachable at {} ({}). Start it with: ollama serve",
                self.base_url, e
            )))?;
        http::ensure_success(SERVICE, response)?;
        Ok(())
    }

    /// Send a raw prompt.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()?;
        let text = http::ensure_success(SERVICE, response)?.text()?;
        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| KiraError::malformed(SERVICE, e.to_string()))?;
        Ok(parsed.response)
    }
}

impl AnswerProvider for OllamaClient {
    fn ask(&self, question: &str, context: &str) -> Result<String> {
        tracing::debug!(model = %self.model, context_chars = context.len(), "asking model");
        self.generate(&compose_prompt(question, context))
    }
}

/// Answer provider returning scripted replies and recording what it was asked.
#[derive(Debug, Default)]
pub struct MockAnswerProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    questions: Mutex<Vec<(String, String)>>,
}

impl MockAnswerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: &str) -> Self {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(Ok(reply.to_string()));
        }
        self
    }

    pub fn with_error(self, error: KiraError) -> Self {
        if let Ok(mut queue) = self.replies.lock() {
            queue.push_back(Err(error));
        }
        self
    }

    /// `(question, context)` pairs in call order.
    pub fn questions(&self) -> Vec<(String, String)> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl AnswerProvider for MockAnswerProvider {
    fn ask(&self, question: &str, context: &str) -> Result<String> {
        if let Ok(mut questions) = self.questions.lock() {
            questions.push((question.to_string(), context.to_string()));
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Ok("OK.".to_string()))
    }
}
