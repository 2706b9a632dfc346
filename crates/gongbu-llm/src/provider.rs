//! The `CompletionProvider` seam and its OpenAI implementation.

use std::future::Future;

use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{LlmError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
  pub system: String,
  pub user:   String,
}

/// Anything that can turn a prompt into raw model text.
///
/// Providers report transport and HTTP failures; deadlines, retries and JSON
/// handling belong to the [`LlmGateway`](crate::LlmGateway).
pub trait CompletionProvider: Send + Sync {
  fn complete(&self, prompt: Prompt) -> impl Future<Output = Result<String>> + Send + '_;
}

// ─── OpenAI Responses API ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
  pub api_key:  String,
  pub model:    String,
  pub endpoint: String,
}

impl OpenAiConfig {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      api_key:  api_key.into(),
      model:    DEFAULT_MODEL.into(),
      endpoint: DEFAULT_ENDPOINT.into(),
    }
  }
}

/// Calls `POST /v1/responses`.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct OpenAiProvider {
  client: Client,
  config: OpenAiConfig,
}

impl OpenAiProvider {
  pub fn new(config: OpenAiConfig) -> Result<Self> {
    let client = Client::builder()
      .build()
      .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  pub fn model(&self) -> &str { &self.config.model }
}

impl CompletionProvider for OpenAiProvider {
  async fn complete(&self, prompt: Prompt) -> Result<String> {
    let body = json!({
      "model": self.config.model,
      "input": [
        { "role": "system", "content": prompt.system },
        { "role": "user", "content": prompt.user },
      ],
    });

    debug!(endpoint = %self.config.endpoint, model = %self.config.model, "calling LLM");

    let resp = self
      .client
      .post(&self.config.endpoint)
      .bearer_auth(&self.config.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| LlmError::Transport(e.to_string()))?;

    let status = resp.status();
    let text = resp
      .text()
      .await
      .map_err(|e| LlmError::Transport(e.to_string()))?;

    if !status.is_success() {
      let excerpt: String = text.chars().take(800).collect();
      warn!(status = status.as_u16(), body = %excerpt, "LLM endpoint rejected request");
      return Err(LlmError::Http(status.as_u16()));
    }

    let data: Value = serde_json::from_str(&text)
      .map_err(|e| LlmError::InvalidJson(format!("response envelope: {e}")))?;
    Ok(output_text(&data))
  }
}

/// Concatenate every text item of a Responses API envelope.
///
/// Items live at `output[].content[]`; those of type `output_text` or `text`
/// contribute their `text`.
pub fn output_text(envelope: &Value) -> String {
  let mut text = String::new();
  let outputs = envelope.get("output").and_then(Value::as_array);
  for item in outputs.into_iter().flatten() {
    let contents = item.get("content").and_then(Value::as_array);
    for content in contents.into_iter().flatten() {
      let kind = content.get("type").and_then(Value::as_str);
      if matches!(kind, Some("output_text" | "text")) {
        if let Some(t) = content.get("text").and_then(Value::as_str) {
          text.push_str(t);
        }
      }
    }
  }
  text
}
