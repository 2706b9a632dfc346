//! Persisted entities and their enumerated attributes.
//!
//! Every row is owner-scoped. Enumerations round-trip through their
//! snake_case string form (`strum`) for storage and through serde for the
//! wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// The authenticated user that owns a row.
pub type OwnerId = Uuid;

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Where a lesson document came from.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
  GoogleDoc,
  Pdf,
  Text,
  Manual,
  Other,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IngestStatus {
  Pending,
  Verified,
  Failed,
}

/// The kind of a content item. Also used as the `link_kind` of a
/// document-to-content link, which has the same two values.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
  Sentence,
  Pattern,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Audience {
  Personal,
  Global,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationalStatus {
  Active,
  Inactive,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GrammarRole {
  Primary,
  Component,
}

/// Curation state of a teaching-vocab headword.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VocabStatus {
  Curated,
  /// Created by the import path because no curated entry existed.
  Provisional,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListItemType {
  Sentence,
  Pattern,
  Vocabulary,
}

/// Origin of a list. Only generated practice lists are created by this
/// crate family; hand-made lists carry `Manual`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListSourceKind {
  PracticeGeneration,
  Manual,
}

/// CEFR proficiency band.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize,
  Deserialize, AsRefStr, Display, EnumString, IntoStaticStr,
)]
pub enum CefrLevel {
  #[default]
  A1,
  A2,
  B1,
  B2,
  C1,
  C2,
}

/// Grammatical person the generated sentences are written in.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Perspective {
  #[default]
  FirstPerson,
  ThirdPerson,
}

/// Korean speech level.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
  AsRefStr, Display, EnumString, IntoStaticStr,
)]
pub enum Register {
  /// Polite informal.
  #[default]
  #[serde(rename = "해요체")]
  #[strum(serialize = "해요체")]
  Haeyo,
  /// Formal polite.
  #[serde(rename = "합니다체")]
  #[strum(serialize = "합니다체")]
  Hamnida,
  /// Plain / intimate.
  #[serde(rename = "반말")]
  #[strum(serialize = "반말")]
  Banmal,
}

// ─── Entities ────────────────────────────────────────────────────────────────

/// The exact text the pipeline analysed. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
  pub asset_id:   Uuid,
  pub owner:      OwnerId,
  pub blob_key:   String,
  pub mime:       String,
  pub size:       u64,
  pub sha256:     String,
  pub title:      Option<String>,
  pub created_at: DateTime<Utc>,
}

/// A lesson document, unique per `(owner, source_kind, source_uri)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
  pub document_id:   Uuid,
  pub owner:         OwnerId,
  pub asset_id:      Uuid,
  pub source_kind:   SourceKind,
  pub source_uri:    String,
  pub title:         Option<String>,
  pub ingest_status: IngestStatus,
  pub created_at:    DateTime<Utc>,
}

/// A canonical grammar pattern together with its surface-form aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarPattern {
  pub id:           String,
  pub display_name: String,
  pub aliases:      Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingVocab {
  pub id:             Uuid,
  pub lemma:          String,
  pub part_of_speech: Option<String>,
  pub status:         VocabStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeList {
  pub list_id:            Uuid,
  pub owner:              OwnerId,
  pub name:               String,
  pub description:        Option<String>,
  pub global_weight:      u8,
  pub is_active:          bool,
  pub source_kind:        Option<ListSourceKind>,
  pub source_document_id: Option<Uuid>,
  pub created_at:         DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItem {
  pub id:        Uuid,
  pub list_id:   Uuid,
  pub item_type: ListItemType,
  pub item_id:   Uuid,
  pub position:  i64,
}

/// A content item as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
  pub content_item_id:    Uuid,
  pub owner:              OwnerId,
  pub content_type:       ContentType,
  pub text:               String,
  pub language:           String,
  pub notes:              Option<String>,
  pub cefr_level:         Option<String>,
  pub topic:              Option<String>,
  pub politeness:         Option<String>,
  pub tense:              Option<String>,
  pub naturalness_score:  Option<f64>,
  pub grammar_pattern_id: Option<String>,
}
