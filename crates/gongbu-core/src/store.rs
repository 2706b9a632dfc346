//! The `LessonStore` trait and its request/response types.
//!
//! The trait is implemented by storage backends (e.g. `gongbu-store-sqlite`).
//! The API layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  analysis::Analysis,
  model::{
    CefrLevel, ContentItem, ContentType, Document, GrammarPattern, ListItem,
    OwnerId, PracticeList, Snapshot, SourceKind, TeachingVocab,
  },
  practice::{CommitOutcome, CommitRequest},
};

// ─── Request types ───────────────────────────────────────────────────────────

/// A snapshot registry row. The blob itself is written by a
/// [`BlobStore`](crate::blob::BlobStore) before this is recorded.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
  pub asset_id: Uuid,
  pub owner:    OwnerId,
  pub blob_key: String,
  pub mime:     String,
  pub size:     u64,
  pub sha256:   String,
  pub title:    Option<String>,
}

/// Parameters for [`LessonStore::ensure_document`].
#[derive(Debug, Clone)]
pub struct EnsureDocument {
  pub owner:       OwnerId,
  pub source_kind: SourceKind,
  pub source_uri:  String,
  /// Required only when no document exists yet for the source.
  pub asset_id:    Option<Uuid>,
  pub title:       Option<String>,
}

/// Parameters for [`LessonStore::import_analysis`].
#[derive(Debug, Clone)]
pub struct ImportRequest {
  pub owner:             OwnerId,
  pub document_id:       Uuid,
  pub session_date:      Option<NaiveDate>,
  pub analysis:          Analysis,
  /// Create provisional teaching vocab for headwords with no curated entry.
  pub allow_provisional: bool,
}

/// Counters returned by the import writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTally {
  pub sentences_created:     usize,
  pub patterns_created:      usize,
  pub vocab_touched:         usize,
  pub fragments_created:     usize,
  pub sentence_vocab_linked: usize,
}

/// A canonical grammar pattern to add to the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGrammarPattern {
  pub id:           String,
  pub display_name: String,
  #[serde(default)]
  pub aliases:      Vec<String>,
  #[serde(default = "default_true")]
  pub active:       bool,
}

fn default_true() -> bool { true }

/// A curated teaching-vocab headword to add to the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeachingVocab {
  pub lemma:          String,
  #[serde(default)]
  pub part_of_speech: Option<String>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store behind the lesson pipeline.
///
/// Multi-row writes ([`import_analysis`](Self::import_analysis),
/// [`commit_practice`](Self::commit_practice)) are atomic: either every row
/// is written or none is.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait LessonStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Snapshots & documents ─────────────────────────────────────────────

  /// Record the registry row for a snapshot blob that has been written.
  fn register_snapshot(
    &self,
    input: NewSnapshot,
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + '_;

  /// Retrieve a snapshot owned by `owner`. Returns `None` if not found.
  fn get_snapshot(
    &self,
    owner: OwnerId,
    asset_id: Uuid,
  ) -> impl Future<Output = Result<Option<Snapshot>, Self::Error>> + Send + '_;

  /// Return the document for `(owner, source_kind, source_uri)`, creating it
  /// with `ingest_status = verified` if it does not exist.
  ///
  /// Fails with [`Error::SnapshotRequired`](crate::Error::SnapshotRequired)
  /// when no row exists and no owned snapshot `asset_id` was supplied.
  fn ensure_document(
    &self,
    input: EnsureDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  // ── Learner profile ───────────────────────────────────────────────────

  fn learner_cefr(
    &self,
    owner: OwnerId,
  ) -> impl Future<Output = Result<Option<CefrLevel>, Self::Error>> + Send + '_;

  fn set_learner_cefr(
    &self,
    owner: OwnerId,
    level: CefrLevel,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Catalog (pattern & vocabulary registries) ─────────────────────────

  /// All active canonical grammar patterns with their aliases.
  fn grammar_patterns(
    &self,
  ) -> impl Future<Output = Result<Vec<GrammarPattern>, Self::Error>> + Send + '_;

  /// Align a surface form to a canonical pattern id by whitespace-stripped
  /// equality against the alias table. No fuzzy matching.
  fn match_pattern_surface<'a>(
    &'a self,
    surface: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn add_grammar_pattern(
    &self,
    input: NewGrammarPattern,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Look up a teaching-vocab headword by lemma, preferring curated entries.
  fn find_teaching_vocab<'a>(
    &'a self,
    lemma: &'a str,
  ) -> impl Future<Output = Result<Option<TeachingVocab>, Self::Error>> + Send + 'a;

  /// Add a curated headword. An existing `(lemma, part_of_speech)` row is
  /// reused and promoted to curated if it was provisional.
  fn add_teaching_vocab(
    &self,
    input: NewTeachingVocab,
  ) -> impl Future<Output = Result<TeachingVocab, Self::Error>> + Send + '_;

  // ── Pipeline writes ───────────────────────────────────────────────────

  /// Fan an analysis payload out into content items, links, registry rows,
  /// per-user vocab and fragments, in one transaction.
  fn import_analysis(
    &self,
    input: ImportRequest,
  ) -> impl Future<Output = Result<ImportTally, Self::Error>> + Send + '_;

  /// Materialise reviewed practice sentences as a new named list, in one
  /// transaction.
  fn commit_practice(
    &self,
    input: CommitRequest,
  ) -> impl Future<Output = Result<CommitOutcome, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn find_content_item<'a>(
    &'a self,
    owner: OwnerId,
    content_type: ContentType,
    text: &'a str,
  ) -> impl Future<Output = Result<Option<ContentItem>, Self::Error>> + Send + 'a;

  fn get_list(
    &self,
    owner: OwnerId,
    list_id: Uuid,
  ) -> impl Future<Output = Result<Option<PracticeList>, Self::Error>> + Send + '_;

  /// Items of a list ordered by position.
  fn list_items(
    &self,
    list_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ListItem>, Self::Error>> + Send + '_;
}
