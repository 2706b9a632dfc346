//! The Gongbu HTTP server: configuration, authentication, blob storage and
//! catalog seeding around the [`gongbu_api`] router.

pub mod auth;
pub mod blob;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, middleware};
use gongbu_api::AppState;
use gongbu_core::{
  blob::BlobStore,
  model::OwnerId,
  store::{LessonStore, NewGrammarPattern, NewTeachingVocab},
};
use gongbu_llm::{
  CompletionProvider, GatewayConfig, OpenAiConfig,
  gateway::{DEFAULT_RETRY_BACKOFF, DEFAULT_TIMEOUT},
  provider::{DEFAULT_ENDPOINT, DEFAULT_MODEL},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use blob::FsBlobStore;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `GONGBU__*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Directory for snapshot blobs. Without it, `/generate` needs an
  /// `asset_id` for every new document.
  #[serde(default)]
  pub blob_root:  Option<PathBuf>,
  #[serde(default)]
  pub llm:        LlmSettings,
  #[serde(default)]
  pub users:      Vec<UserConfig>,
}

#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct LlmSettings {
  pub api_key:          String,
  pub model:            String,
  pub endpoint:         String,
  pub timeout_secs:     u64,
  pub retry_backoff_ms: u64,
}

impl Default for LlmSettings {
  fn default() -> Self {
    Self {
      api_key:          String::new(),
      model:            DEFAULT_MODEL.to_owned(),
      endpoint:         DEFAULT_ENDPOINT.to_owned(),
      timeout_secs:     DEFAULT_TIMEOUT.as_secs(),
      retry_backoff_ms: DEFAULT_RETRY_BACKOFF.as_millis() as u64,
    }
  }
}

impl LlmSettings {
  pub fn provider_config(&self) -> OpenAiConfig {
    OpenAiConfig {
      api_key:  self.api_key.clone(),
      model:    self.model.clone(),
      endpoint: self.endpoint.clone(),
    }
  }

  pub fn gateway_config(&self) -> GatewayConfig {
    GatewayConfig {
      timeout:       Duration::from_secs(self.timeout_secs),
      retry_backoff: Duration::from_millis(self.retry_backoff_ms),
    }
  }
}

/// A user allowed to sign in, and the owner id their rows are stored under.
#[derive(Deserialize, Clone)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub owner_id:      OwnerId,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API router behind Basic authentication and request tracing.
pub fn app<S, P, B>(state: AppState<S, P, B>, users: Vec<UserConfig>) -> Router
where
  S: LessonStore + 'static,
  P: CompletionProvider + 'static,
  B: BlobStore + 'static,
{
  gongbu_api::api_router(state)
    .layer(middleware::from_fn_with_state(Arc::new(users), auth::authenticate))
    .layer(TraceLayer::new_for_http())
}

// ─── Catalog seeding ──────────────────────────────────────────────────────────

/// Canonical grammar patterns and curated teaching vocab, as loaded by
/// `--seed`.
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
  #[serde(default)]
  pub grammar_patterns: Vec<NewGrammarPattern>,
  #[serde(default)]
  pub teaching_vocab:   Vec<NewTeachingVocab>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedTally {
  pub patterns: usize,
  pub vocab:    usize,
}

/// Load `catalog` into `store`. Re-seeding the same catalog is harmless.
pub async fn seed<S: LessonStore>(
  store: &S,
  catalog: Catalog,
) -> gongbu_core::Result<SeedTally> {
  let mut tally = SeedTally::default();
  for pattern in catalog.grammar_patterns {
    store.add_grammar_pattern(pattern).await.map_err(Into::into)?;
    tally.patterns += 1;
  }
  for vocab in catalog.teaching_vocab {
    store.add_teaching_vocab(vocab).await.map_err(Into::into)?;
    tally.vocab += 1;
  }
  Ok(tally)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use gongbu_core::{blob::MemoryBlobStore, model::VocabStatus};
  use gongbu_llm::{LlmGateway, testing::ScriptedProvider};
  use gongbu_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  fn user(username: &str, password: &str) -> UserConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    UserConfig {
      username:      username.to_string(),
      password_hash: hash,
      owner_id:      Uuid::new_v4(),
    }
  }

  async fn make_app(users: Vec<UserConfig>) -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let gateway = LlmGateway::new(ScriptedProvider::new(), GatewayConfig::default());
    app(AppState::new(store, gateway, Some(MemoryBlobStore::new())), users)
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn oneshot_raw(
    app:     Router,
    method:  &str,
    uri:     &str,
    headers: Vec<(header::HeaderName, &str)>,
    body:    &str,
  ) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
      builder = builder.header(k, v);
    }
    let req = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(req).await.unwrap()
  }

  async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn commit_body() -> String {
    json!({ "name": "Drill", "sentences": [{ "ko": "빵을 먹었어요." }] }).to_string()
  }

  // ── Auth ────────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn healthz_is_open() {
    let app = make_app(vec![user("minji", "secret")]).await;
    let res = oneshot_raw(app, "GET", "/healthz", vec![], "").await;
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn missing_credentials_get_a_basic_challenge() {
    let app = make_app(vec![user("minji", "secret")]).await;
    let res = oneshot_raw(
      app,
      "POST",
      "/commit",
      vec![(header::CONTENT_TYPE, "application/json")],
      &commit_body(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let challenge = res.headers().get(header::WWW_AUTHENTICATE).unwrap();
    assert_eq!(challenge, "Basic realm=\"gongbu\"");
    assert_eq!(body_json(res).await["error"], "UNAUTHENTICATED");
  }

  #[tokio::test]
  async fn wrong_password_is_rejected() {
    let app = make_app(vec![user("minji", "secret")]).await;
    let auth = auth_header("minji", "guess");
    let res = oneshot_raw(
      app,
      "POST",
      "/commit",
      vec![
        (header::AUTHORIZATION, auth.as_str()),
        (header::CONTENT_TYPE, "application/json"),
      ],
      &commit_body(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn valid_credentials_act_as_the_configured_owner() {
    let app = make_app(vec![user("minji", "secret"), user("joon", "hunter2")]).await;
    let auth = auth_header("joon", "hunter2");
    let res = oneshot_raw(
      app,
      "POST",
      "/commit",
      vec![
        (header::AUTHORIZATION, auth.as_str()),
        (header::CONTENT_TYPE, "application/json"),
      ],
      &commit_body(),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let json = body_json(res).await;
    assert_eq!(json["list_name"], "Drill");
    assert_eq!(json["items_created"], 1);
  }

  #[test]
  fn verify_basic_resolves_the_owner() {
    let minji = user("minji", "secret");
    let owner = minji.owner_id;
    let users = vec![minji];

    let mut headers = axum::http::HeaderMap::new();
    headers.insert(header::AUTHORIZATION, auth_header("minji", "secret").parse().unwrap());
    assert_eq!(auth::verify_basic(&headers, &users), Some(owner));

    headers.insert(header::AUTHORIZATION, auth_header("nobody", "secret").parse().unwrap());
    assert_eq!(auth::verify_basic(&headers, &users), None);

    headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
    assert_eq!(auth::verify_basic(&headers, &users), None);
  }

  // ── Config ──────────────────────────────────────────────────────────────────

  #[test]
  fn llm_settings_fall_back_to_defaults() {
    let cfg: ServerConfig = serde_json::from_value(json!({
      "host": "127.0.0.1",
      "port": 8080,
      "store_path": "gongbu.db",
      "llm": { "api_key": "sk-test" }
    }))
    .unwrap();

    assert!(cfg.blob_root.is_none());
    assert!(cfg.users.is_empty());
    assert_eq!(cfg.llm.model, DEFAULT_MODEL);
    assert_eq!(cfg.llm.gateway_config().timeout, DEFAULT_TIMEOUT);
    assert_eq!(cfg.llm.provider_config().api_key, "sk-test");
  }

  // ── Seeding ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn seeding_loads_the_catalog_and_is_repeatable() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let catalog = || -> Catalog {
      serde_json::from_value(json!({
        "grammar_patterns": [
          { "id": "P1", "display_name": "-았/었어요", "aliases": ["-았어요", "-었어요"] }
        ],
        "teaching_vocab": [{ "lemma": "먹다", "part_of_speech": "동사" }]
      }))
      .unwrap()
    };

    assert_eq!(seed(&store, catalog()).await.unwrap(), SeedTally { patterns: 1, vocab: 1 });
    seed(&store, catalog()).await.unwrap();

    let patterns = store.grammar_patterns().await.unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(store.match_pattern_surface("- 었어요").await.unwrap().as_deref(), Some("P1"));

    let vocab = store.find_teaching_vocab("먹다").await.unwrap().unwrap();
    assert_eq!(vocab.status, VocabStatus::Curated);
  }
}
