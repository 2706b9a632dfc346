//! Error type for `gongbu-llm`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
  #[error("LLM call exceeded its deadline")]
  Timeout,

  #[error("LLM endpoint returned HTTP {0}")]
  Http(u16),

  #[error("LLM transport error: {0}")]
  Transport(String),

  #[error("LLM response is not valid JSON: {0}")]
  InvalidJson(String),

  #[error("LLM response has an unusable shape: {0}")]
  InvalidShape(String),
}

impl LlmError {
  /// Stable machine-readable code, e.g. `LLM_HTTP_429`.
  pub fn code(&self) -> String {
    match self {
      LlmError::Timeout => "LLM_TIMEOUT".into(),
      LlmError::Http(status) => format!("LLM_HTTP_{status}"),
      LlmError::Transport(_) => "LLM_TRANSPORT".into(),
      LlmError::InvalidJson(_) => "LLM_INVALID_JSON".into(),
      LlmError::InvalidShape(_) => "LLM_INVALID_SHAPE".into(),
    }
  }

  /// Whether a second attempt could plausibly succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      LlmError::Timeout | LlmError::Transport(_) | LlmError::InvalidJson(_) => true,
      LlmError::Http(status) => *status == 429 || *status >= 500,
      LlmError::InvalidShape(_) => false,
    }
  }
}

pub type Result<T, E = LlmError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_embed_http_status() {
    assert_eq!(LlmError::Http(503).code(), "LLM_HTTP_503");
    assert_eq!(LlmError::Timeout.code(), "LLM_TIMEOUT");
    assert_eq!(LlmError::InvalidShape("x".into()).code(), "LLM_INVALID_SHAPE");
  }

  #[test]
  fn only_transient_failures_retry() {
    assert!(LlmError::Http(429).is_retryable());
    assert!(LlmError::Http(502).is_retryable());
    assert!(!LlmError::Http(401).is_retryable());
    assert!(LlmError::InvalidJson("eof".into()).is_retryable());
    assert!(!LlmError::InvalidShape("no sentences".into()).is_retryable());
  }
}
