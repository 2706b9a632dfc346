//! `POST /generate`: the pipeline orchestrator.
//!
//! Steps, in order:
//!
//! 1. Check inputs and read the learner's CEFR level (default `A1`).
//! 2. Fetch canonical patterns to ground the analysis (best effort).
//! 3. Mint a snapshot of the selected text when no `asset_id` was supplied.
//! 4. Resolve the document for the Google Doc URL.
//! 5. Analyse and import the lesson (best effort; zero tallies on failure).
//! 6. Generate practice sentences. Failure here fails the request.
//! 7. Validate them (best effort; unvalidated sentences on failure).

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use bytes::Bytes;
use chrono::NaiveDate;
use gongbu_core::{
  blob::BlobStore,
  model::{Document, GrammarPattern, OwnerId, Perspective, Register, SourceKind},
  practice::{DEFAULT_PRACTICE_COUNT, GenerateParams, PracticeSentence, merge_validations},
  source::canonical_google_doc_uri,
  store::{EnsureDocument, ImportRequest, ImportTally, LessonStore, NewSnapshot},
};
use gongbu_llm::CompletionProvider;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{AppState, auth::Owner, error::ApiError};

pub const SNAPSHOT_MIME: &str = "text/plain; charset=utf-8";

const DEFAULT_GLOSS_LANG: &str = "en";

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
  #[serde(default)]
  pub google_doc_url: Option<String>,
  /// An existing snapshot owned by the caller.
  #[serde(default)]
  pub asset_id:       Option<Uuid>,
  #[serde(default)]
  pub title:          Option<String>,
  #[serde(default)]
  pub selected_text:  Option<String>,
  #[serde(default)]
  pub session_date:   Option<NaiveDate>,
  /// Clamped into `1..=20`; defaults to 5.
  #[serde(default)]
  pub count:          Option<i64>,
  #[serde(default)]
  pub perspective:    Option<Perspective>,
  #[serde(default)]
  pub politeness:     Option<Register>,
  #[serde(default)]
  pub gloss_lang:     Option<String>,
}

/// Import counters as reported to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
  pub sentences_created: usize,
  pub patterns_created:  usize,
  pub vocab_touched:     usize,
  pub fragments_created: usize,
}

impl From<ImportTally> for ImportSummary {
  fn from(t: ImportTally) -> Self {
    Self {
      sentences_created: t.sentences_created,
      patterns_created:  t.patterns_created,
      vocab_touched:     t.vocab_touched,
      fragments_created: t.fragments_created,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
  pub ok:                 bool,
  pub document_id:        Uuid,
  pub import_summary:     ImportSummary,
  pub practice_sentences: Vec<PracticeSentence>,
}

// ─── Handler ──────────────────────────────────────────────────────────────────

pub async fn handler<S, P, B>(
  State(state): State<AppState<S, P, B>>,
  Owner(owner): Owner,
  body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError>
where
  S: LessonStore,
  P: CompletionProvider,
  B: BlobStore,
{
  let Json(body) = body?;

  let lesson_text = body
    .selected_text
    .filter(|t| !t.trim().is_empty())
    .ok_or(ApiError::SelectedTextRequired)?;
  let doc_url = body
    .google_doc_url
    .as_deref()
    .map(str::trim)
    .filter(|u| !u.is_empty())
    .ok_or(ApiError::GoogleDocUrlRequired)?;

  let cefr = state
    .store
    .learner_cefr(owner)
    .await
    .map_err(ApiError::store)?
    .unwrap_or_default();
  let patterns = grounding_patterns(&state).await;

  let asset_id = match (body.asset_id, &state.blobs) {
    (Some(id), _) => Some(id),
    (None, Some(blobs)) => {
      Some(mint_snapshot(&state, blobs.as_ref(), owner, &lesson_text, body.title.clone()).await?)
    }
    (None, None) => None,
  };

  let document = state
    .store
    .ensure_document(EnsureDocument {
      owner,
      source_kind: SourceKind::GoogleDoc,
      source_uri: canonical_google_doc_uri(doc_url),
      asset_id,
      title: body.title,
    })
    .await
    .map_err(ApiError::store)?;

  let tally = import_lesson(&state, &document, body.session_date, &lesson_text, &patterns).await;

  let params = GenerateParams {
    lesson_text,
    cefr,
    count: clamp_count(body.count),
    perspective: body.perspective.unwrap_or_default(),
    register: body.politeness.unwrap_or_default(),
    gloss_lang: body
      .gloss_lang
      .filter(|l| !l.trim().is_empty())
      .unwrap_or_else(|| DEFAULT_GLOSS_LANG.to_owned()),
  };
  let mut sentences = state
    .gateway
    .generate_practice(&params)
    .await
    .map_err(ApiError::GenerationFailed)?;

  validate(&state, &mut sentences, &params.gloss_lang).await;

  info!(
    %owner,
    document_id = %document.document_id,
    cefr = %cefr,
    sentences = sentences.len(),
    "practice ready for review"
  );
  Ok(Json(GenerateResponse {
    ok:                 true,
    document_id:        document.document_id,
    import_summary:     tally.into(),
    practice_sentences: sentences,
  }))
}

fn clamp_count(count: Option<i64>) -> u8 {
  match count {
    // Saturate before narrowing; `GenerateParams` applies the upper bound.
    Some(n) => u8::try_from(n.clamp(1, i64::from(u8::MAX))).unwrap_or(u8::MAX),
    None => DEFAULT_PRACTICE_COUNT,
  }
}

// ─── Steps ────────────────────────────────────────────────────────────────────

async fn grounding_patterns<S, P, B>(state: &AppState<S, P, B>) -> Vec<GrammarPattern>
where
  S: LessonStore,
{
  match state.store.grammar_patterns().await {
    Ok(patterns) => patterns,
    Err(e) => {
      warn!(error = %e, "could not load grammar patterns; analysing ungrounded");
      Vec::new()
    }
  }
}

/// Write `text` verbatim to the blob store and record its registry row.
async fn mint_snapshot<S, P, B>(
  state: &AppState<S, P, B>,
  blobs: &B,
  owner: OwnerId,
  text: &str,
  title: Option<String>,
) -> Result<Uuid, ApiError>
where
  S: LessonStore,
  B: BlobStore,
{
  let asset_id = Uuid::new_v4();
  let blob_key = format!("snapshots/{owner}/{asset_id}.txt");
  let body = Bytes::copy_from_slice(text.as_bytes());
  let size = body.len() as u64;
  let sha256 = hex::encode(Sha256::digest(&body));

  tokio::time::timeout(
    state.blob_timeout,
    blobs.put(blob_key.clone(), body, SNAPSHOT_MIME.to_owned()),
  )
  .await
  .map_err(|_| gongbu_core::Error::StoreTimeout)??;

  state
    .store
    .register_snapshot(NewSnapshot {
      asset_id,
      owner,
      blob_key,
      mime: SNAPSHOT_MIME.to_owned(),
      size,
      sha256,
      title,
    })
    .await
    .map_err(ApiError::store)?;

  info!(%owner, %asset_id, size, "snapshot stored");
  Ok(asset_id)
}

/// Analyse and import the lesson. Never fails: any error is logged and
/// reported as zero tallies.
async fn import_lesson<S, P, B>(
  state: &AppState<S, P, B>,
  document: &Document,
  session_date: Option<NaiveDate>,
  lesson_text: &str,
  patterns: &[GrammarPattern],
) -> ImportTally
where
  S: LessonStore,
  P: CompletionProvider,
{
  let analysis = match state.gateway.doc_import(lesson_text, patterns).await {
    Ok(analysis) => analysis,
    Err(e) => {
      warn!(
        document_id = %document.document_id,
        code = %e.code(),
        error = %e,
        "lesson analysis failed; skipping import"
      );
      return ImportTally::default();
    }
  };

  let request = ImportRequest {
    owner: document.owner,
    document_id: document.document_id,
    session_date,
    analysis,
    allow_provisional: true,
  };
  match state.store.import_analysis(request).await {
    Ok(tally) => tally,
    Err(e) => {
      let e: gongbu_core::Error = e.into();
      warn!(
        document_id = %document.document_id,
        code = e.code(),
        error = %e,
        "lesson import rolled back"
      );
      ImportTally::default()
    }
  }
}

/// Attach validations to `sentences` where the model produced them.
async fn validate<S, P, B>(
  state: &AppState<S, P, B>,
  sentences: &mut [PracticeSentence],
  gloss_lang: &str,
) where
  P: CompletionProvider,
{
  match state.gateway.validate_practice(sentences, gloss_lang).await {
    Ok(validations) => {
      let attached = merge_validations(sentences, &validations);
      if attached < sentences.len() {
        warn!(attached, total = sentences.len(), "validation covered only some sentences");
      }
    }
    Err(e) => {
      warn!(code = %e.code(), error = %e, "validation failed; returning unvalidated sentences");
    }
  }
}
