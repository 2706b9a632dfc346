//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure renders as `{ "ok": false, "error": CODE, "detail"?: ... }`.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use gongbu_llm::LlmError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("selected_text is required")]
  SelectedTextRequired,

  #[error("google_doc_url is required")]
  GoogleDocUrlRequired,

  #[error("no authenticated owner")]
  Unauthenticated,

  #[error("malformed request: {0}")]
  BadRequest(String),

  #[error("practice generation failed: {0}")]
  GenerationFailed(#[source] LlmError),

  #[error(transparent)]
  Core(#[from] gongbu_core::Error),
}

impl ApiError {
  /// Convert a backend store error through the core error kinds.
  pub fn store<E: Into<gongbu_core::Error>>(e: E) -> Self { ApiError::Core(e.into()) }

  pub fn code(&self) -> &'static str {
    match self {
      ApiError::SelectedTextRequired => "SELECTED_TEXT_REQUIRED",
      ApiError::GoogleDocUrlRequired => "GOOGLE_DOC_URL_REQUIRED",
      ApiError::Unauthenticated => "UNAUTHENTICATED",
      ApiError::BadRequest(_) => "INVALID_INPUT",
      ApiError::GenerationFailed(_) => "GENERATION_FAILED",
      ApiError::Core(e) => e.code(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self.code() {
      "SELECTED_TEXT_REQUIRED"
      | "GOOGLE_DOC_URL_REQUIRED"
      | "SNAPSHOT_ASSET_ID_REQUIRED"
      | "NO_SENTENCES"
      | "INVALID_INPUT" => StatusCode::BAD_REQUEST,
      "UNAUTHENTICATED" => StatusCode::UNAUTHORIZED,
      "NOT_FOUND" => StatusCode::NOT_FOUND,
      "TOO_MANY_SENTENCES" => StatusCode::PAYLOAD_TOO_LARGE,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// Extra context safe to show the caller. Internal failures carry none.
  fn detail(&self) -> Option<String> {
    match self {
      ApiError::GenerationFailed(e) => Some(e.code()),
      ApiError::BadRequest(m) => Some(m.clone()),
      ApiError::Core(gongbu_core::Error::InvalidInput(m)) => Some(m.clone()),
      ApiError::Core(gongbu_core::Error::TooManySentences(n)) => {
        Some(format!("{n} sentences"))
      }
      _ => None,
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(code = self.code(), error = %self, "request failed");
    }
    let mut body = json!({ "ok": false, "error": self.code() });
    if let Some(detail) = self.detail() {
      body["detail"] = detail.into();
    }
    (status, Json(body)).into_response()
  }
}
