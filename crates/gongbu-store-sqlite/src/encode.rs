//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that lexical comparison in SQL matches
//! chronological order. Session dates are `YYYY-MM-DD`. UUIDs are hyphenated
//! lowercase strings. Enumerations use their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use gongbu_core::model::{
  ContentItem, Document, ListItem, PracticeList, Snapshot, TeachingVocab,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

// ─── Enumerations ────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(s: &str, what: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

fn non_empty(s: String) -> Option<String> {
  if s.is_empty() { None } else { Some(s) }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `snapshots` row.
pub struct RawSnapshot {
  pub asset_id:   String,
  pub owner:      String,
  pub blob_key:   String,
  pub mime:       String,
  pub size:       i64,
  pub sha256:     String,
  pub title:      Option<String>,
  pub created_at: String,
}

impl RawSnapshot {
  pub const COLUMNS: &'static str =
    "asset_id, owner, blob_key, mime, size, sha256, title, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      asset_id:   row.get(0)?,
      owner:      row.get(1)?,
      blob_key:   row.get(2)?,
      mime:       row.get(3)?,
      size:       row.get(4)?,
      sha256:     row.get(5)?,
      title:      row.get(6)?,
      created_at: row.get(7)?,
    })
  }

  pub fn into_snapshot(self) -> Result<Snapshot> {
    Ok(Snapshot {
      asset_id:   decode_uuid(&self.asset_id)?,
      owner:      decode_uuid(&self.owner)?,
      blob_key:   self.blob_key,
      mime:       self.mime,
      size:       u64::try_from(self.size)
        .map_err(|_| Error::Decode(format!("negative snapshot size {}", self.size)))?,
      sha256:     self.sha256,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub document_id:   String,
  pub owner:         String,
  pub asset_id:      String,
  pub source_kind:   String,
  pub source_uri:    String,
  pub title:         Option<String>,
  pub ingest_status: String,
  pub created_at:    String,
}

impl RawDocument {
  pub const COLUMNS: &'static str = "document_id, owner, asset_id, source_kind, \
     source_uri, title, ingest_status, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:   row.get(0)?,
      owner:         row.get(1)?,
      asset_id:      row.get(2)?,
      source_kind:   row.get(3)?,
      source_uri:    row.get(4)?,
      title:         row.get(5)?,
      ingest_status: row.get(6)?,
      created_at:    row.get(7)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      document_id:   decode_uuid(&self.document_id)?,
      owner:         decode_uuid(&self.owner)?,
      asset_id:      decode_uuid(&self.asset_id)?,
      source_kind:   decode_enum(&self.source_kind, "source kind")?,
      source_uri:    self.source_uri,
      title:         self.title,
      ingest_status: decode_enum(&self.ingest_status, "ingest status")?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `teaching_vocab` row.
pub struct RawTeachingVocab {
  pub id:             String,
  pub lemma:          String,
  pub part_of_speech: String,
  pub status:         String,
}

impl RawTeachingVocab {
  pub const COLUMNS: &'static str = "id, lemma, part_of_speech, status";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:             row.get(0)?,
      lemma:          row.get(1)?,
      part_of_speech: row.get(2)?,
      status:         row.get(3)?,
    })
  }

  pub fn into_vocab(self) -> Result<TeachingVocab> {
    Ok(TeachingVocab {
      id:             decode_uuid(&self.id)?,
      lemma:          self.lemma,
      part_of_speech: non_empty(self.part_of_speech),
      status:         decode_enum(&self.status, "vocab status")?,
    })
  }
}

/// Raw strings read directly from a `content_items` row.
pub struct RawContentItem {
  pub content_item_id:    String,
  pub owner:              String,
  pub content_type:       String,
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

impl RawContentItem {
  pub const COLUMNS: &'static str = "content_item_id, owner, content_type, text, \
     language, notes, cefr_level, topic, politeness, tense, naturalness_score, \
     grammar_pattern_id";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      content_item_id:    row.get(0)?,
      owner:              row.get(1)?,
      content_type:       row.get(2)?,
      text:               row.get(3)?,
      language:           row.get(4)?,
      notes:              row.get(5)?,
      cefr_level:         row.get(6)?,
      topic:              row.get(7)?,
      politeness:         row.get(8)?,
      tense:              row.get(9)?,
      naturalness_score:  row.get(10)?,
      grammar_pattern_id: row.get(11)?,
    })
  }

  pub fn into_item(self) -> Result<ContentItem> {
    Ok(ContentItem {
      content_item_id:    decode_uuid(&self.content_item_id)?,
      owner:              decode_uuid(&self.owner)?,
      content_type:       decode_enum(&self.content_type, "content type")?,
      text:               self.text,
      language:           self.language,
      notes:              self.notes,
      cefr_level:         self.cefr_level,
      topic:              self.topic,
      politeness:         self.politeness,
      tense:              self.tense,
      naturalness_score:  self.naturalness_score,
      grammar_pattern_id: self.grammar_pattern_id,
    })
  }
}

/// Raw strings read directly from a `lists` row.
pub struct RawList {
  pub list_id:            String,
  pub owner:              String,
  pub name:               String,
  pub description:        Option<String>,
  pub global_weight:      i64,
  pub is_active:          bool,
  pub source_kind:        Option<String>,
  pub source_document_id: Option<String>,
  pub created_at:         String,
}

impl RawList {
  pub const COLUMNS: &'static str = "list_id, owner, name, description, \
     global_weight, is_active, source_kind, source_document_id, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      list_id:            row.get(0)?,
      owner:              row.get(1)?,
      name:               row.get(2)?,
      description:        row.get(3)?,
      global_weight:      row.get(4)?,
      is_active:          row.get(5)?,
      source_kind:        row.get(6)?,
      source_document_id: row.get(7)?,
      created_at:         row.get(8)?,
    })
  }

  pub fn into_list(self) -> Result<PracticeList> {
    Ok(PracticeList {
      list_id:            decode_uuid(&self.list_id)?,
      owner:              decode_uuid(&self.owner)?,
      name:               self.name,
      description:        self.description,
      global_weight:      u8::try_from(self.global_weight)
        .map_err(|_| Error::Decode(format!("global weight {}", self.global_weight)))?,
      is_active:          self.is_active,
      source_kind:        self
        .source_kind
        .as_deref()
        .map(|s| decode_enum(s, "list source kind"))
        .transpose()?,
      source_document_id: self
        .source_document_id
        .as_deref()
        .map(decode_uuid)
        .transpose()?,
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `list_items` row.
pub struct RawListItem {
  pub id:        String,
  pub list_id:   String,
  pub item_type: String,
  pub item_id:   String,
  pub position:  i64,
}

impl RawListItem {
  pub const COLUMNS: &'static str = "id, list_id, item_type, item_id, position";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      list_id:   row.get(1)?,
      item_type: row.get(2)?,
      item_id:   row.get(3)?,
      position:  row.get(4)?,
    })
  }

  pub fn into_item(self) -> Result<ListItem> {
    Ok(ListItem {
      id:        decode_uuid(&self.id)?,
      list_id:   decode_uuid(&self.list_id)?,
      item_type: decode_enum(&self.item_type, "list item type")?,
      item_id:   decode_uuid(&self.item_id)?,
      position:  self.position,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2026-03-01T09:00:00.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn session_dates_use_iso_format() {
    let d = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
    assert_eq!(encode_date(d), "2026-01-07");
  }
}
