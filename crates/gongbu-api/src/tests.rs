//! Router tests: the full pipeline over an in-memory store, a scripted model
//! and an in-memory blob store.

use std::time::Duration;

use axum::{
  Extension, Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use gongbu_core::{
  blob::MemoryBlobStore,
  model::{CefrLevel, ContentType, SourceKind},
  store::{EnsureDocument, LessonStore, NewGrammarPattern, NewSnapshot},
};
use gongbu_llm::{GatewayConfig, LlmError, LlmGateway, testing::ScriptedProvider};
use gongbu_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, Owner, api_router};

const LESSON: &str = "사과를 먹었어요. 학교에 갔어요.";
const DOC_URL: &str = "https://docs.google.com/document/d/lesson-1/edit";

struct Harness {
  store:    SqliteStore,
  provider: ScriptedProvider,
  blobs:    MemoryBlobStore,
  owner:    Uuid,
}

impl Harness {
  async fn new() -> Self {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .add_grammar_pattern(NewGrammarPattern {
        id:           "P1".into(),
        display_name: "-았/었어요".into(),
        aliases:      vec!["-았어요".into(), "-었어요".into()],
        active:       true,
      })
      .await
      .unwrap();
    Self {
      store,
      provider: ScriptedProvider::new(),
      blobs: MemoryBlobStore::new(),
      owner: Uuid::new_v4(),
    }
  }

  fn state(&self, blobs: Option<MemoryBlobStore>) -> AppState<SqliteStore, ScriptedProvider, MemoryBlobStore> {
    let gateway = LlmGateway::new(self.provider.clone(), GatewayConfig {
      timeout:       Duration::from_millis(50),
      retry_backoff: Duration::from_millis(1),
    });
    AppState::new(self.store.clone(), gateway, blobs)
  }

  /// The router as an authenticated owner sees it.
  fn app(&self) -> Router {
    api_router(self.state(Some(self.blobs.clone()))).layer(Extension(Owner(self.owner)))
  }

  fn app_without_blobs(&self) -> Router {
    api_router(self.state(None)).layer(Extension(Owner(self.owner)))
  }

  fn anonymous_app(&self) -> Router { api_router(self.state(None)) }

  /// Queue a successful analysis, generation and validation.
  fn script_happy_path(&self) {
    self.provider.reply_json(analysis_reply());
    self.provider.reply_json(generation_reply());
    self.provider.reply_json(validation_reply());
  }
}

async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(body.to_string()))
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, json)
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
  send(app, "POST", uri, &body.to_string()).await
}

fn generate_body() -> Value {
  json!({
    "google_doc_url": DOC_URL,
    "selected_text":  LESSON,
    "session_date":   "2026-03-02",
    "count":          2,
  })
}

fn analysis_reply() -> Value {
  json!({
    "vocabulary": [{ "lemma": "먹다", "pos": "동사" }, { "lemma": "가다", "pos": "동사" }],
    "sentences": [
      {
        "ko": "사과를 먹었어요.",
        "gloss": "I ate an apple.",
        "vocabulary": [{ "lemma": "먹다", "pos": "동사" }]
      },
      {
        "ko": "학교에 갔어요.",
        "gloss": "I went to school.",
        "vocabulary": [{ "lemma": "가다", "pos": "동사" }]
      }
    ],
    "patterns": [{ "surface_form": "-았/었어요", "kind": "ending", "confidence": 0.9 }],
    "fragments": []
  })
}

fn generation_reply() -> Value {
  json!({
    "sentences": [
      {
        "ko": "빵을 먹었어요.",
        "en": "I ate bread.",
        "cefr_level": "A1",
        "tense": "past",
        "vocabulary": [{ "lemma_ko": "먹다", "pos_ko": "동사" }]
      },
      {
        "ko": "집에 갔어요.",
        "en": "I went home.",
        "cefr_level": "A1",
        "tense": "past",
        "vocabulary": [{ "lemma_ko": "가다", "pos_ko": "동사" }]
      }
    ]
  })
}

fn validation_reply() -> Value {
  json!({
    "validations": [
      { "index": 1, "naturalness_score": 0.95, "natural": true, "issues": [] },
      {
        "index": 2,
        "naturalness_score": 0.4,
        "natural": false,
        "issues": ["particle"],
        "suggested_fix": "집에 갔어요!",
        "explanation": "fine, but flat"
      }
    ]
  })
}

fn summary(json: &Value) -> [u64; 4] {
  let s = &json["import_summary"];
  [
    s["sentences_created"].as_u64().unwrap(),
    s["patterns_created"].as_u64().unwrap(),
    s["vocab_touched"].as_u64().unwrap(),
    s["fragments_created"].as_u64().unwrap(),
  ]
}

// ─── Health & auth ───────────────────────────────────────────────────────────

#[tokio::test]
async fn healthz_needs_no_owner() {
  let h = Harness::new().await;
  let (status, json) = send(h.anonymous_app(), "GET", "/healthz", "").await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(json, json!({ "ok": true }));
}

#[tokio::test]
async fn pipeline_routes_require_an_owner() {
  let h = Harness::new().await;
  let (status, json) = post(h.anonymous_app(), "/generate", generate_body()).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(json["error"], "UNAUTHENTICATED");

  let (status, _) = post(h.anonymous_app(), "/commit", json!({ "sentences": [] })).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Generate ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_generate_imports_and_validates() {
  let h = Harness::new().await;
  h.script_happy_path();

  let (status, json) = post(h.app(), "/generate", generate_body()).await;
  assert_eq!(status, StatusCode::OK, "{json}");
  assert_eq!(json["ok"], true);
  assert_eq!(summary(&json), [2, 1, 2, 0]);

  let sentences = json["practice_sentences"].as_array().unwrap();
  assert_eq!(sentences.len(), 2);
  assert_eq!(sentences[0]["ko"], "빵을 먹었어요.");
  assert_eq!(sentences[0]["validation_score"], 0.95);
  assert_eq!(sentences[1]["validation_natural"], false);
  assert_eq!(sentences[1]["suggested_fix"], "집에 갔어요!");
  assert_eq!(sentences[1]["vocabulary"][0]["lemma_ko"], "가다");

  let pattern = h
    .store
    .find_content_item(h.owner, ContentType::Pattern, "-았/었어요")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(pattern.grammar_pattern_id.as_deref(), Some("P1"));
}

#[tokio::test]
async fn generate_stores_the_analysed_text_as_a_snapshot() {
  let h = Harness::new().await;
  h.script_happy_path();

  let (status, json) = post(h.app(), "/generate", generate_body()).await;
  assert_eq!(status, StatusCode::OK);

  let document = h
    .store
    .ensure_document(EnsureDocument {
      owner:       h.owner,
      source_kind: SourceKind::GoogleDoc,
      source_uri:  "https://docs.google.com/document/d/lesson-1".into(),
      asset_id:    None,
      title:       None,
    })
    .await
    .unwrap();
  assert_eq!(json["document_id"], document.document_id.to_string());

  let snapshot = h.store.get_snapshot(h.owner, document.asset_id).await.unwrap().unwrap();
  assert_eq!(snapshot.size, LESSON.len() as u64);
  assert_eq!(snapshot.sha256.len(), 64);

  let (mime, body) = h.blobs.get(&snapshot.blob_key).unwrap();
  assert_eq!(mime, "text/plain; charset=utf-8");
  assert_eq!(&body[..], LESSON.as_bytes());
}

#[tokio::test]
async fn repeat_generate_reuses_the_document_and_library() {
  let h = Harness::new().await;
  h.script_happy_path();
  h.script_happy_path();

  let (_, first) = post(h.app(), "/generate", generate_body()).await;

  let mut body = generate_body();
  body["google_doc_url"] = "https://docs.google.com/document/d/lesson-1/view?usp=sharing".into();
  let (status, second) = post(h.app(), "/generate", body).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["document_id"], second["document_id"]);
  assert_eq!(summary(&second), [0, 0, 2, 0]);
}

#[tokio::test]
async fn import_timeout_still_generates() {
  let h = Harness::new().await;
  h.provider.stall();
  h.provider.stall();
  h.provider.reply_json(generation_reply());
  h.provider.fail(LlmError::Http(400));

  let (status, json) = post(h.app(), "/generate", generate_body()).await;
  assert_eq!(status, StatusCode::OK, "{json}");
  assert_eq!(summary(&json), [0, 0, 0, 0]);

  let sentences = json["practice_sentences"].as_array().unwrap();
  assert_eq!(sentences.len(), 2);
  assert!(sentences.iter().all(|s| s.get("validation_score").is_none()));
  assert!(
    h.store
      .find_content_item(h.owner, ContentType::Sentence, "사과를 먹었어요.")
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn generation_failure_keeps_the_import() {
  let h = Harness::new().await;
  h.provider.reply_json(analysis_reply());
  h.provider.fail(LlmError::Http(401));

  let (status, json) = post(h.app(), "/generate", generate_body()).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(json, json!({ "ok": false, "error": "GENERATION_FAILED", "detail": "LLM_HTTP_401" }));

  assert!(
    h.store
      .find_content_item(h.owner, ContentType::Sentence, "사과를 먹었어요.")
      .await
      .unwrap()
      .is_some()
  );
}

#[tokio::test]
async fn generate_checks_required_fields() {
  let h = Harness::new().await;

  let (status, json) = post(h.app(), "/generate", json!({ "google_doc_url": DOC_URL })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "SELECTED_TEXT_REQUIRED");

  let (status, json) =
    post(h.app(), "/generate", json!({ "selected_text": LESSON, "google_doc_url": "  " })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "GOOGLE_DOC_URL_REQUIRED");

  assert!(h.provider.prompts().is_empty());
}

#[tokio::test]
async fn first_import_needs_a_snapshot() {
  let h = Harness::new().await;

  let (status, json) = post(h.app_without_blobs(), "/generate", generate_body()).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "SNAPSHOT_ASSET_ID_REQUIRED");

  let mut body = generate_body();
  body["asset_id"] = Uuid::new_v4().to_string().into();
  let (status, json) = post(h.app_without_blobs(), "/generate", body).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "SNAPSHOT_ASSET_ID_REQUIRED");
  assert!(h.provider.prompts().is_empty());
}

#[tokio::test]
async fn supplied_snapshot_is_used_without_a_blob_store() {
  let h = Harness::new().await;
  let asset_id = Uuid::new_v4();
  h.store
    .register_snapshot(NewSnapshot {
      asset_id,
      owner: h.owner,
      blob_key: format!("uploads/{asset_id}.txt"),
      mime: "text/plain".into(),
      size: LESSON.len() as u64,
      sha256: "ab".repeat(32),
      title: None,
    })
    .await
    .unwrap();
  h.script_happy_path();

  let mut body = generate_body();
  body["asset_id"] = asset_id.to_string().into();
  let (status, json) = post(h.app_without_blobs(), "/generate", body).await;
  assert_eq!(status, StatusCode::OK, "{json}");
  assert_eq!(summary(&json), [2, 1, 2, 0]);
}

#[tokio::test]
async fn generation_prompt_follows_profile_and_request() {
  let h = Harness::new().await;
  h.store.set_learner_cefr(h.owner, CefrLevel::B1).await.unwrap();
  h.script_happy_path();

  let mut body = generate_body();
  body["perspective"] = "third_person".into();
  body["politeness"] = "합니다체".into();
  let (status, _) = post(h.app(), "/generate", body).await;
  assert_eq!(status, StatusCode::OK);

  let prompts = h.provider.prompts();
  assert_eq!(prompts.len(), 3);
  assert!(prompts[0].user.contains("-았/었어요"), "patterns ground the analysis");
  let generation: Value = serde_json::from_str(&prompts[1].user).unwrap();
  assert_eq!(generation["target_cefr"], "B1");
  assert_eq!(generation["politeness"], "합니다체");
  assert_eq!(generation["perspective"], "third_person");
  assert_eq!(generation["count"], 2);
}

#[tokio::test]
async fn malformed_json_is_an_input_error() {
  let h = Harness::new().await;
  let (status, json) = send(h.app(), "POST", "/generate", "{ not json").await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["ok"], false);
  assert_eq!(json["error"], "INVALID_INPUT");
  assert!(json["detail"].is_string());
}

// ─── Commit ──────────────────────────────────────────────────────────────────

fn sentence(ko: &str) -> Value { json!({ "ko": ko, "en": "gloss", "naturalness_score": 0.9 }) }

#[tokio::test]
async fn commit_reuses_library_sentences() {
  let h = Harness::new().await;

  let (status, first) =
    post(h.app(), "/commit", json!({ "sentences": [sentence("빵을 먹었어요.")] })).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(first["list_name"], "Practice List 1");
  let existing = h
    .store
    .find_content_item(h.owner, ContentType::Sentence, "빵을 먹었어요.")
    .await
    .unwrap()
    .unwrap();

  let (status, json) = post(
    h.app(),
    "/commit",
    json!({
      "sentences": [sentence("빵을 먹었어요."), sentence("집에 갔어요."), sentence("책을 읽었어요.")]
    }),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{json}");
  assert_eq!(json["ok"], true);
  assert_eq!(json["list_name"], "Practice List 2");
  assert_eq!(json["items_created"], 3);

  let list_id: Uuid = json["list_id"].as_str().unwrap().parse().unwrap();
  let list = h.store.get_list(h.owner, list_id).await.unwrap().unwrap();
  assert_eq!(list.global_weight, 3);
  let items = h.store.list_items(list_id).await.unwrap();
  let positions: Vec<i64> = items.iter().map(|i| i.position).collect();
  assert_eq!(positions, [100, 200, 300]);
  assert_eq!(items[0].item_id, existing.content_item_id);
}

#[tokio::test]
async fn commit_after_generate_links_the_document() {
  let h = Harness::new().await;
  h.script_happy_path();
  let (_, generated) = post(h.app(), "/generate", generate_body()).await;

  let (status, json) = post(
    h.app(),
    "/commit",
    json!({
      "document_id":  generated["document_id"],
      "session_date": "2026-03-02",
      "name":         "Week 1",
      "sentences":    generated["practice_sentences"],
    }),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{json}");
  assert_eq!(json["list_name"], "Week 1");
  assert_eq!(json["items_created"], 2);

  let item = h
    .store
    .find_content_item(h.owner, ContentType::Sentence, "집에 갔어요.")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(item.notes.as_deref(), Some("I went home."));
  assert_eq!(item.tense.as_deref(), Some("past"));
}

#[tokio::test]
async fn commit_bounds_map_to_statuses() {
  let h = Harness::new().await;

  let (status, json) = post(h.app(), "/commit", json!({ "sentences": [] })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "NO_SENTENCES");

  let (status, json) = post(h.app(), "/commit", json!({})).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "NO_SENTENCES");

  let many: Vec<Value> = (0..101).map(|i| sentence(&format!("문장 {i}"))).collect();
  let (status, json) = post(h.app(), "/commit", json!({ "sentences": many })).await;
  assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
  assert_eq!(json["error"], "TOO_MANY_SENTENCES");
  assert!(
    h.store
      .find_content_item(h.owner, ContentType::Sentence, "문장 0")
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn blank_sentences_are_rejected_without_a_list() {
  let h = Harness::new().await;

  let blank = json!({ "sentences": [sentence("  "), sentence("")] });
  let (status, json) = post(h.app(), "/commit", blank).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(json["error"], "NO_SENTENCES");

  let (status, json) = post(h.app(), "/commit", json!({ "sentences": [sentence("하나예요.")] })).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(json["list_name"], "Practice List 1");
}

#[tokio::test]
async fn commit_to_an_unknown_document_is_not_found() {
  let h = Harness::new().await;
  let (status, json) = post(
    h.app(),
    "/commit",
    json!({ "document_id": Uuid::new_v4(), "sentences": [sentence("빵을 먹었어요.")] }),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(json["error"], "NOT_FOUND");
}
