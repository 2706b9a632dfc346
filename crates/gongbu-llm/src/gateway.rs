//! [`LlmGateway`]: deadlines, the single retry, and the `doc_import` profile.

use std::time::Duration;

use gongbu_core::{analysis::Analysis, model::GrammarPattern};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
  CompletionProvider, LlmError, Profile, Prompt, Result,
  normalize::{self, extract_json},
  profile::doc_import_prompt,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(750);

/// Attempts per call: the first try plus one retry.
const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct GatewayConfig {
  /// Wall-clock limit for a single attempt.
  pub timeout:       Duration,
  /// Fixed pause before the retry.
  pub retry_backoff: Duration,
}

impl Default for GatewayConfig {
  fn default() -> Self {
    Self { timeout: DEFAULT_TIMEOUT, retry_backoff: DEFAULT_RETRY_BACKOFF }
  }
}

/// The single entry point for model calls.
pub struct LlmGateway<P> {
  provider: P,
  config:   GatewayConfig,
}

impl<P: CompletionProvider> LlmGateway<P> {
  pub fn new(provider: P, config: GatewayConfig) -> Self { Self { provider, config } }

  pub fn provider(&self) -> &P { &self.provider }

  /// Run `prompt` and return the JSON value the model produced.
  ///
  /// Each attempt is bounded by the configured timeout. A retryable failure
  /// on the first attempt is retried once after the fixed backoff.
  pub async fn call(&self, profile: Profile, prompt: Prompt) -> Result<Value> {
    let mut attempt = 1;
    loop {
      match self.attempt(prompt.clone()).await {
        Ok(value) => {
          debug!(%profile, attempt, "LLM call succeeded");
          return Ok(value);
        }
        Err(e) if attempt < MAX_ATTEMPTS && e.is_retryable() => {
          warn!(%profile, attempt, error = %e, "LLM call failed; retrying");
          tokio::time::sleep(self.config.retry_backoff).await;
          attempt += 1;
        }
        Err(e) => {
          warn!(%profile, attempt, code = %e.code(), error = %e, "LLM call failed");
          return Err(e);
        }
      }
    }
  }

  async fn attempt(&self, prompt: Prompt) -> Result<Value> {
    let text = tokio::time::timeout(self.config.timeout, self.provider.complete(prompt))
      .await
      .map_err(|_| LlmError::Timeout)??;
    extract_json(&text)
  }

  /// `doc_import`: extract vocabulary, sentences, patterns and fragments
  /// from lesson text.
  pub async fn doc_import(
    &self,
    lesson_text: &str,
    patterns: &[GrammarPattern],
  ) -> Result<Analysis> {
    let value = self
      .call(Profile::DocImport, doc_import_prompt(lesson_text, patterns))
      .await?;
    normalize::analysis(value)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::testing::ScriptedProvider;

  fn gateway(provider: ScriptedProvider) -> LlmGateway<ScriptedProvider> {
    LlmGateway::new(provider, GatewayConfig {
      timeout:       Duration::from_millis(50),
      retry_backoff: Duration::from_millis(5),
    })
  }

  fn prompt() -> Prompt {
    Prompt { system: "s".into(), user: "u".into() }
  }

  #[tokio::test]
  async fn returns_first_success() {
    let provider = ScriptedProvider::new();
    provider.reply_json(json!({ "ok": 1 }));
    let gw = gateway(provider.clone());

    let value = gw.call(Profile::DocImport, prompt()).await.unwrap();
    assert_eq!(value, json!({ "ok": 1 }));
    assert_eq!(provider.prompts().len(), 1);
  }

  #[tokio::test]
  async fn retries_once_after_invalid_json() {
    let provider = ScriptedProvider::new();
    provider.reply("I think the answer is");
    provider.reply("```json\n{\"ok\": 2}\n```");
    let gw = gateway(provider.clone());

    let value = gw.call(Profile::PracticeGeneration, prompt()).await.unwrap();
    assert_eq!(value, json!({ "ok": 2 }));
    assert_eq!(provider.prompts().len(), 2);
  }

  #[tokio::test]
  async fn gives_up_after_the_retry() {
    let provider = ScriptedProvider::new();
    provider.fail(LlmError::Http(503));
    provider.fail(LlmError::Http(502));
    provider.reply_json(json!({ "never": "reached" }));
    let gw = gateway(provider.clone());

    let err = gw.call(Profile::PracticeValidation, prompt()).await.unwrap_err();
    assert_eq!(err.code(), "LLM_HTTP_502");
    assert_eq!(provider.remaining(), 1);
  }

  #[tokio::test]
  async fn client_errors_are_not_retried() {
    let provider = ScriptedProvider::new();
    provider.fail(LlmError::Http(401));
    provider.reply_json(json!({}));
    let gw = gateway(provider.clone());

    let err = gw.call(Profile::DocImport, prompt()).await.unwrap_err();
    assert!(matches!(err, LlmError::Http(401)));
    assert_eq!(provider.prompts().len(), 1);
  }

  #[tokio::test]
  async fn stalled_provider_times_out_twice() {
    let provider = ScriptedProvider::new();
    provider.stall();
    provider.stall();
    let gw = gateway(provider.clone());

    let err = gw.call(Profile::DocImport, prompt()).await.unwrap_err();
    assert!(matches!(err, LlmError::Timeout));
    assert_eq!(provider.prompts().len(), 2);
  }

  #[tokio::test]
  async fn doc_import_normalises_the_payload() {
    let provider = ScriptedProvider::new();
    provider.reply_json(json!({
      "sentences": [{ "ko": " 학교에 갔어요. ", "vocabulary": ["가다"] }],
      "patterns": [{ "surface_form": "-았/었어요" }]
    }));
    let gw = gateway(provider.clone());

    let analysis = gw.doc_import("학교에 갔어요.", &[]).await.unwrap();
    assert_eq!(analysis.sentences[0].ko, "학교에 갔어요.");
    assert_eq!(analysis.sentences[0].vocabulary[0].lemma, "가다");
    assert_eq!(analysis.patterns.len(), 1);
    assert!(analysis.fragments.is_empty());
    assert!(provider.prompts()[0].user.contains("학교에 갔어요."));
  }
}
