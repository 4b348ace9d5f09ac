//! Minimal Anthropic Messages client for our use-cases.
//!
//! We only call the messages endpoint and request plain text; structured
//! study artifacts are recovered afterwards by the response parser. Calls are
//! instrumented and log model names, latencies, and token usage (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::{Prompts, Secrets};
use crate::domain::ChatMessage;
use crate::util::fill_template;

const API_VERSION: &str = "2023-06-01";

// Call parameters per mode, matching the product's tuning.
const QA_MAX_TOKENS: u32 = 750;
const QA_TEMPERATURE: f32 = 0.6;
const QUIZ_MAX_TOKENS: u32 = 600;
const QUIZ_TEMPERATURE: f32 = 0.8;
const FLASHCARD_MAX_TOKENS: u32 = 400;
const FLASHCARD_TEMPERATURE: f32 = 0.6;

#[derive(Clone)]
pub struct Anthropic {
  pub client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Anthropic {
  /// Construct the client from resolved secrets; returns None without a key.
  pub fn from_secrets(secrets: &Secrets) -> Option<Self> {
    let api_key = secrets.anthropic_api_key.clone()?;
    let base_url =
      std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| "https://api.anthropic.com".into());
    let model =
      std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| "claude-3-haiku-20240307".into());

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url, model })
  }

  /// One messages-endpoint call returning the first text block.
  #[instrument(level = "info", skip(self, system, messages), fields(model = %self.model, turns = messages.len()))]
  async fn complete(
    &self,
    system: Option<&str>,
    messages: &[ChatMessage],
    max_tokens: u32,
    temperature: f32,
  ) -> Result<String, String> {
    let url = format!("{}/v1/messages", self.base_url);
    let req = MessagesRequest {
      model: self.model.clone(),
      max_tokens,
      temperature,
      system: system.map(|s| s.to_string()),
      messages: messages.to_vec(),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "tutor-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-api-key", &self.api_key)
      .header("anthropic-version", API_VERSION)
      .json(&req).send().await.map_err(|e| e.to_string())?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_api_error(&body).unwrap_or(body);
      return Err(format!("Anthropic HTTP {}: {}", status, msg));
    }

    let body: MessagesResponse = res.json().await.map_err(|e| e.to_string())?;
    if let Some(usage) = &body.usage {
      info!(input_tokens = ?usage.input_tokens, output_tokens = ?usage.output_tokens, elapsed = ?start.elapsed(), "Anthropic usage");
    }
    let text = body
      .content
      .iter()
      .find_map(|block| block.text.clone())
      .unwrap_or_default()
      .trim()
      .to_string();

    Ok(text)
  }

  // --- High-level helpers (one per tutor mode) ---

  /// Q&A turn: the whole conversation so far plus a topic-injected system prompt.
  #[instrument(level = "info", skip(self, prompts, history), fields(%topic, turns = history.len()))]
  pub async fn tutor_reply(
    &self,
    prompts: &Prompts,
    topic: &str,
    history: &[ChatMessage],
  ) -> Result<String, String> {
    let system = fill_template(&prompts.qa_system_template, &[("topic", topic)]);
    self.complete(Some(&system), history, QA_MAX_TOKENS, QA_TEMPERATURE).await
  }

  /// Raw quiz completion in the marker template; parsed by the caller.
  #[instrument(level = "info", skip(self, prompts), fields(%topic))]
  pub async fn quiz_text(&self, prompts: &Prompts, topic: &str) -> Result<String, String> {
    let user = fill_template(&prompts.quiz_user_template, &[("topic", topic)]);
    let messages = [ChatMessage::user(user)];
    self.complete(None, &messages, QUIZ_MAX_TOKENS, QUIZ_TEMPERATURE).await
  }

  /// Raw flashcard completion in the marker template; parsed by the caller.
  #[instrument(level = "info", skip(self, prompts), fields(%topic))]
  pub async fn flashcard_text(&self, prompts: &Prompts, topic: &str) -> Result<String, String> {
    let user = fill_template(&prompts.flashcard_user_template, &[("topic", topic)]);
    let messages = [ChatMessage::user(user)];
    self.complete(None, &messages, FLASHCARD_MAX_TOKENS, FLASHCARD_TEMPERATURE).await
  }
}

// --- Messages DTOs ---

#[derive(Serialize)]
struct MessagesRequest {
  model: String,
  max_tokens: u32,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  system: Option<String>,
  messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
  content: Vec<ContentBlock>,
  #[serde(default)]
  usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
  #[serde(default)]
  text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  input_tokens: Option<u32>,
  #[serde(default)]
  output_tokens: Option<u32>,
}

/// Try to extract a clean error message from an Anthropic error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_error_message_from_api_body() {
    let body = r#"{"type":"error","error":{"type":"invalid_request_error","message":"max_tokens required"}}"#;
    assert_eq!(extract_api_error(body).as_deref(), Some("max_tokens required"));
    assert_eq!(extract_api_error("not json"), None);
  }

  #[test]
  fn response_parses_first_text_block() {
    let body = r#"{"content":[{"type":"text","text":"hello"}],"usage":{"input_tokens":10,"output_tokens":4}}"#;
    let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.content[0].text.as_deref(), Some("hello"));
    assert_eq!(parsed.usage.unwrap().output_tokens, Some(4));
  }
}
