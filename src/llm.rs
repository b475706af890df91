//! LLM generation boundary via OpenRouter.
//!
//! The orchestrator only sees the [`Generator`] contract: request text and
//! temperature in, generated text and elapsed time out. Transport details
//! stay behind this module.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

const MAX_TOKENS: u32 = 8_192;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Maximum length for provider error content surfaced in messages.
const MAX_ERROR_CONTENT_LEN: usize = 200;

/// One successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub elapsed: Duration,
}

/// Generator boundary consumed by the orchestrator. All retry logic lives
/// in the orchestrator; implementations make exactly one provider call.
#[allow(async_fn_in_trait)]
pub trait Generator {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<Generation>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

impl Generator for OpenRouterClient {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<Generation> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: MAX_TOKENS,
            temperature,
            stream: false,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(OPENROUTER_URL)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", "https://github.com/cameronspears/optiforge")
            .header("X-Title", "optiforge")
            .json(&request)
            .send()
            .await
            .context("LLM request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "LLM API error {}: {}",
                status,
                sanitize_api_error(&body)
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse LLM response")?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("LLM returned no choices"))?;

        Ok(Generation {
            text,
            elapsed: started.elapsed(),
        })
    }
}

/// Truncate and redact provider error bodies so credentials never land in
/// error messages or reports.
fn sanitize_api_error(content: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &["api_key", "apikey", "secret", "password", "bearer", "sk-"];

    let truncated = crate::util::truncate(content, MAX_ERROR_CONTENT_LEN);
    let lower = truncated.to_lowercase();
    for pattern in SECRET_PATTERNS {
        if lower.contains(pattern) {
            return "(response details redacted - may contain sensitive data)".to_string();
        }
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_expected_fields() {
        let request = ChatRequest {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
            max_tokens: 100,
            temperature: 0.5,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn chat_response_parses_first_choice() {
        let json = r#"{"choices":[{"message":{"content":"print('hi')"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "print('hi')");
    }

    #[test]
    fn sanitize_api_error_truncates() {
        let long = "x".repeat(1_000);
        assert!(sanitize_api_error(&long).chars().count() <= MAX_ERROR_CONTENT_LEN);
    }

    #[test]
    fn sanitize_api_error_redacts_secrets() {
        let redacted = sanitize_api_error(r#"{"error":"bad api_key sk-12345"}"#);
        assert!(!redacted.contains("sk-12345"));
        assert!(redacted.contains("redacted"));
    }
}
