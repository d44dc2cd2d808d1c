use crate::error::{AssistantError, Result};
use crate::models::{Row, Turn};
use crate::prompts;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

lazy_static! {
    static ref JSON_OBJECT: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
}

/// Returned when the model produced no text at all.
pub const EMPTY_RESPONSE: &str = "I'm sorry, I couldn't generate a response for that query.";

/// Verdict of the intent-classification step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentVerdict {
    pub needs_database: bool,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub suggested_approach: Option<String>,
}

impl IntentVerdict {
    /// Parse model output, tolerating code fences and surrounding prose.
    /// `None` when no verdict can be read.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        if let Ok(verdict) = serde_json::from_str::<IntentVerdict>(cleaned) {
            return Some(verdict);
        }
        let object = JSON_OBJECT.find(cleaned)?;
        serde_json::from_str(object.as_str()).ok()
    }

    /// Used when the classifier's output is unreadable: attempt a database answer.
    pub fn database_default() -> Self {
        Self {
            needs_database: true,
            explanation: "Defaulting to database query".to_string(),
            suggested_approach: Some("Execute database query".to_string()),
        }
    }
}

/// The text-generation collaborator.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Free-form answer with bounded history and an optional system prompt.
    async fn generate_response(
        &self,
        prompt: &str,
        history: &[Turn],
        system_prompt: Option<&str>,
    ) -> Result<String>;

    /// A single SQL string for the request, no prose.
    async fn generate_sql(&self, request: &str, schema: &str) -> Result<String>;

    /// `Ok(None)` when the collaborator answered but the verdict is unreadable.
    async fn classify_intent(&self, request: &str, schema: &str) -> Result<Option<IntentVerdict>>;

    /// Narrative rendering of query results.
    async fn format_results(&self, request: &str, sql: &str, rows: &[Row]) -> Result<String>;
}

/// Build the free-form prompt: system, recent turns, then the user message.
pub fn conversation_prompt(
    prompt: &str,
    history: &[Turn],
    system_prompt: Option<&str>,
    max_turns: usize,
) -> String {
    let mut context = Vec::new();
    if let Some(system) = system_prompt {
        context.push(format!("System: {}", system));
    }
    let start = history.len().saturating_sub(max_turns);
    for turn in &history[start..] {
        context.push(format!("{}: {}", capitalize(&turn.role), turn.content));
    }
    context.push(format!("User: {}", prompt));
    context.join("\n")
}

fn capitalize(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => "User".to_string(),
    }
}

/// OpenAI-compatible chat-completions client
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    history_turns: usize,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout: Duration::from_secs(30),
            history_turns: 5,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_turns(mut self, turns: usize) -> Self {
        self.history_turns = turns;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One completion call under the client's deadline.
    async fn call_llm(
        &self,
        operation: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        debug!("LLM call '{}' ({} prompt chars)", operation, prompt.len());
        match tokio::time::timeout(self.timeout, self.complete(prompt, temperature, max_tokens)).await {
            Ok(result) => result,
            Err(_) => Err(AssistantError::timeout(operation, self.timeout.as_secs())),
        }
    }

    async fn complete(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AssistantError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AssistantError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(AssistantError::Llm(format!("LLM API error: {}", error)));
        }

        let choice = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| AssistantError::Llm("No choices in LLM response".to_string()))?;

        match choice.get("finish_reason").and_then(|r| r.as_str()) {
            Some("length") => warn!("⚠️  LLM response was truncated due to length limit"),
            Some("content_filter") => {
                // blocked output is treated like an empty answer
                warn!("LLM response was filtered by content policy");
                return Ok(String::new());
            }
            _ => {}
        }

        Ok(choice["message"]["content"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate_response(
        &self,
        prompt: &str,
        history: &[Turn],
        system_prompt: Option<&str>,
    ) -> Result<String> {
        let full_prompt = conversation_prompt(prompt, history, system_prompt, self.history_turns);
        let text = self.call_llm("response generation", &full_prompt, 0.0, 2048).await?;
        if text.trim().is_empty() {
            warn!("No response text generated");
            return Ok(EMPTY_RESPONSE.to_string());
        }
        Ok(text)
    }

    async fn generate_sql(&self, request: &str, schema: &str) -> Result<String> {
        let text = self
            .call_llm("SQL generation", &prompts::sql_prompt(request, schema), 0.3, 1024)
            .await?;
        Ok(text.trim().trim_matches('`').trim().to_string())
    }

    async fn classify_intent(&self, request: &str, schema: &str) -> Result<Option<IntentVerdict>> {
        let text = self
            .call_llm("intent classification", &prompts::intent_prompt(request, schema), 0.3, 512)
            .await?;
        Ok(IntentVerdict::parse(&text))
    }

    async fn format_results(&self, request: &str, sql: &str, rows: &[Row]) -> Result<String> {
        let text = self
            .call_llm("result formatting", &prompts::format_prompt(request, sql, rows), 0.0, 2048)
            .await?;
        Ok(text.trim().to_string())
    }
}
