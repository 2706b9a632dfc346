//! A scripted [`CompletionProvider`] for tests.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
  time::Duration,
};

use serde_json::Value;

use crate::{CompletionProvider, LlmError, Prompt, Result};

enum Reply {
  Text(String),
  Fail(LlmError),
  Stall,
}

/// Replays queued replies in order and records every prompt it receives.
///
/// Clones share the same script, so a test can keep a handle after moving
/// one into a gateway. An exhausted script fails with
/// [`LlmError::Transport`].
#[derive(Clone, Default)]
pub struct ScriptedProvider {
  replies: Arc<Mutex<VecDeque<Reply>>>,
  prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl ScriptedProvider {
  pub fn new() -> Self { Self::default() }

  fn push(&self, reply: Reply) {
    if let Ok(mut replies) = self.replies.lock() {
      replies.push_back(reply);
    }
  }

  /// Queue raw model text.
  pub fn reply(&self, text: impl Into<String>) { self.push(Reply::Text(text.into())) }

  /// Queue a JSON value as model text.
  pub fn reply_json(&self, value: Value) { self.push(Reply::Text(value.to_string())) }

  /// Queue a provider failure.
  pub fn fail(&self, error: LlmError) { self.push(Reply::Fail(error)) }

  /// Queue a reply that never arrives within any sane deadline.
  pub fn stall(&self) { self.push(Reply::Stall) }

  /// Prompts received so far.
  pub fn prompts(&self) -> Vec<Prompt> {
    self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
  }

  /// Replies not yet consumed.
  pub fn remaining(&self) -> usize { self.replies.lock().map(|r| r.len()).unwrap_or(0) }
}

impl CompletionProvider for ScriptedProvider {
  async fn complete(&self, prompt: Prompt) -> Result<String> {
    if let Ok(mut prompts) = self.prompts.lock() {
      prompts.push(prompt);
    }
    let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
    match next {
      Some(Reply::Text(text)) => Ok(text),
      Some(Reply::Fail(error)) => Err(error),
      Some(Reply::Stall) => {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(LlmError::Timeout)
      }
      None => Err(LlmError::Transport("script exhausted".into())),
    }
  }
}
