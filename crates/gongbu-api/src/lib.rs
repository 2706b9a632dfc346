//! JSON API for the Gongbu lesson pipeline.
//!
//! Exposes an axum [`Router`] backed by any [`LessonStore`], any
//! [`CompletionProvider`] and, optionally, a [`BlobStore`] for snapshot text.
//! Authentication is the caller's responsibility: some outer layer must
//! insert an [`Owner`] request extension.
//!
//! | Method | Path       | Notes |
//! |--------|------------|-------|
//! | `POST` | `/generate`| Import the lesson, then generate and validate practice |
//! | `POST` | `/commit`  | Materialise reviewed sentences as a list; 201 |
//! | `GET`  | `/healthz` | No owner required |
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", gongbu_api::api_router(state))
//! ```

pub mod auth;
pub mod commit;
pub mod error;
pub mod generate;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use axum::{
  Json, Router,
  routing::{get, post},
};
use gongbu_core::{blob::BlobStore, store::LessonStore};
use gongbu_llm::{CompletionProvider, LlmGateway};
use serde_json::{Value, json};

pub use auth::Owner;
pub use error::ApiError;

/// Deadline for a single snapshot blob write.
pub const DEFAULT_BLOB_TIMEOUT: Duration = Duration::from_secs(15);

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, P, B> {
  pub store:        Arc<S>,
  pub gateway:      Arc<LlmGateway<P>>,
  /// Where `/generate` writes snapshot text when the request names no
  /// `asset_id`. `None` disables minting.
  pub blobs:        Option<Arc<B>>,
  pub blob_timeout: Duration,
}

impl<S, P, B> AppState<S, P, B> {
  pub fn new(store: S, gateway: LlmGateway<P>, blobs: Option<B>) -> Self {
    Self {
      store:        Arc::new(store),
      gateway:      Arc::new(gateway),
      blobs:        blobs.map(Arc::new),
      blob_timeout: DEFAULT_BLOB_TIMEOUT,
    }
  }
}

impl<S, P, B> Clone for AppState<S, P, B> {
  fn clone(&self) -> Self {
    Self {
      store:        Arc::clone(&self.store),
      gateway:      Arc::clone(&self.gateway),
      blobs:        self.blobs.clone(),
      blob_timeout: self.blob_timeout,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P, B>(state: AppState<S, P, B>) -> Router<()>
where
  S: LessonStore + 'static,
  P: CompletionProvider + 'static,
  B: BlobStore + 'static,
{
  Router::new()
    .route("/generate", post(generate::handler::<S, P, B>))
    .route("/commit", post(commit::handler::<S, P, B>))
    .route("/healthz", get(healthz))
    .with_state(state)
}

/// `GET /healthz`
async fn healthz() -> Json<Value> { Json(json!({ "ok": true })) }
