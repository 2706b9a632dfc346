//! Row-level writers shared by the import writer and the practice committer.
//!
//! Every function takes a plain `&Connection` so it can run on a
//! [`rusqlite::Transaction`] (which derefs to one). Dedup is structural:
//! inserts use `ON CONFLICT` against the schema's unique constraints and
//! fall back to reading the winner's row.

use std::time::Instant;

use gongbu_core::model::{
  Audience, ContentType, GrammarRole, ListItemType, OperationalStatus, VocabStatus,
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, params};
use uuid::Uuid;

use crate::encode::encode_uuid;

// ─── Closure plumbing ────────────────────────────────────────────────────────

/// Wrap a domain error so it can leave a `call` closure.
pub fn fail(e: gongbu_core::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

/// Abort the enclosing transaction once `deadline` has passed.
pub fn check_deadline(deadline: Instant) -> tokio_rusqlite::Result<()> {
  if Instant::now() >= deadline {
    return Err(fail(gongbu_core::Error::DbTimeout));
  }
  Ok(())
}

/// Ensure `document_id` exists and belongs to `owner`.
pub fn require_owned_document(
  conn: &Connection,
  document_id: &str,
  owner: &str,
) -> tokio_rusqlite::Result<()> {
  let found = conn
    .query_row(
      "SELECT 1 FROM documents WHERE document_id = ?1 AND owner = ?2",
      params![document_id, owner],
      |_| Ok(()),
    )
    .optional()?;
  match found {
    Some(()) => Ok(()),
    None => Err(fail(gongbu_core::Error::NotFound(format!("document {document_id}")))),
  }
}

// ─── Content items ───────────────────────────────────────────────────────────

/// Column values for a new `content_items` row.
#[derive(Default)]
pub struct NewContentItem<'a> {
  pub notes:              Option<&'a str>,
  pub cefr_level:         Option<&'a str>,
  pub topic:              Option<&'a str>,
  pub politeness:         Option<&'a str>,
  pub tense:              Option<&'a str>,
  pub naturalness_score:  Option<f64>,
  pub grammar_pattern_id: Option<&'a str>,
}

pub fn find_content_item_id(
  conn: &Connection,
  owner: &str,
  content_type: ContentType,
  text: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT content_item_id FROM content_items
       WHERE owner = ?1 AND content_type = ?2 AND text = ?3",
      params![owner, content_type.as_ref(), text],
      |r| r.get(0),
    )
    .optional()
}

/// Insert a content item. Returns its id and whether this call created it
/// (`false` when a concurrent writer won the `(owner, content_type, text)`
/// slot first).
pub fn insert_content_item(
  conn: &Connection,
  owner: &str,
  content_type: ContentType,
  text: &str,
  item: &NewContentItem<'_>,
  now: &str,
) -> rusqlite::Result<(String, bool)> {
  let id = encode_uuid(Uuid::new_v4());
  let inserted = conn.execute(
    "INSERT INTO content_items (
       content_item_id, owner, content_type, text, language, notes,
       cefr_level, topic, politeness, tense, naturalness_score,
       grammar_pattern_id, created_at
     ) VALUES (?1, ?2, ?3, ?4, 'ko', ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
     ON CONFLICT (owner, content_type, text) DO NOTHING",
    params![
      id,
      owner,
      content_type.as_ref(),
      text,
      item.notes,
      item.cefr_level,
      item.topic,
      item.politeness,
      item.tense,
      item.naturalness_score,
      item.grammar_pattern_id,
      now,
    ],
  )?;

  if inserted == 1 {
    return Ok((id, true));
  }
  let existing = find_content_item_id(conn, owner, content_type, text)?
    .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
  Ok((existing, false))
}

/// Register a content item in the owner's library (audience `personal`).
pub fn register_library_item(
  conn: &Connection,
  content_type: ContentType,
  content_id: &str,
  owner: &str,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO library_registry_items (
       id, content_type, content_id, owner, audience, operational_status, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT (content_type, content_id) DO NOTHING",
    params![
      encode_uuid(Uuid::new_v4()),
      content_type.as_ref(),
      content_id,
      owner,
      Audience::Personal.as_ref(),
      OperationalStatus::Active.as_ref(),
      now,
    ],
  )?;
  Ok(())
}

// ─── Links ───────────────────────────────────────────────────────────────────

/// SQL fragment merging an incoming `excluded.session_date` into the stored
/// one, keeping the latest non-null date.
const MERGE_SESSION_DATE: &str = "session_date = CASE
       WHEN excluded.session_date IS NULL THEN session_date
       WHEN session_date IS NULL OR excluded.session_date > session_date
         THEN excluded.session_date
       ELSE session_date
     END";

pub fn upsert_document_link(
  conn: &Connection,
  document_id: &str,
  content_item_id: &str,
  link_kind: ContentType,
  session_date: Option<&str>,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO document_content_item_links (
         document_id, content_item_id, link_kind, session_date, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5)
       ON CONFLICT (document_id, content_item_id, link_kind) DO UPDATE SET
       {MERGE_SESSION_DATE}"
    ),
    params![document_id, content_item_id, link_kind.as_ref(), session_date, now],
  )?;
  Ok(())
}

pub fn upsert_document_vocab_link(
  conn: &Connection,
  document_id: &str,
  owner: &str,
  lemma: &str,
  session_date: Option<&str>,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO document_vocab_links (document_id, owner, lemma, session_date, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5)
       ON CONFLICT (document_id, owner, lemma) DO UPDATE SET
       {MERGE_SESSION_DATE}"
    ),
    params![document_id, owner, lemma, session_date, now],
  )?;
  Ok(())
}

pub fn link_grammar(
  conn: &Connection,
  content_item_id: &str,
  grammar_pattern_id: &str,
  role: GrammarRole,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO content_item_grammar_links (content_item_id, grammar_pattern_id, role)
     VALUES (?1, ?2, ?3)
     ON CONFLICT DO NOTHING",
    params![content_item_id, grammar_pattern_id, role.as_ref()],
  )?;
  Ok(())
}

pub fn insert_list_item(
  conn: &Connection,
  list_id: &str,
  item_type: ListItemType,
  item_id: &str,
  position: i64,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO list_items (id, list_id, item_type, item_id, position)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    params![encode_uuid(Uuid::new_v4()), list_id, item_type.as_ref(), item_id, position],
  )?;
  Ok(())
}

/// Insert a document fragment unless the document already holds the same
/// text. Returns whether a row was created.
pub fn insert_fragment(
  conn: &Connection,
  document_id: &str,
  owner: &str,
  session_date: Option<&str>,
  text: &str,
  label: Option<&str>,
  now: &str,
) -> rusqlite::Result<bool> {
  let inserted = conn.execute(
    "INSERT INTO document_fragments (
       fragment_id, document_id, owner, session_date, text, label, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT (document_id, text) DO NOTHING",
    params![encode_uuid(Uuid::new_v4()), document_id, owner, session_date, text, label, now],
  )?;
  Ok(inserted == 1)
}

// ─── Registries ──────────────────────────────────────────────────────────────

/// Canonical pattern id for an alias-normalised surface, if any active
/// pattern claims it.
pub fn match_alias(conn: &Connection, alias_norm: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT a.grammar_pattern_id
       FROM grammar_pattern_aliases a
       JOIN grammar_patterns p ON p.id = a.grammar_pattern_id
       WHERE a.alias_norm = ?1 AND p.active = 1
       ORDER BY a.grammar_pattern_id
       LIMIT 1",
      params![alias_norm],
      |r| r.get(0),
    )
    .optional()
}

/// Which teaching-vocab rows a lookup may return.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum VocabLookup {
  CuratedOnly,
  /// Curated first, then provisional.
  Any,
}

pub fn lookup_vocab_id(
  conn: &Connection,
  lemma: &str,
  lookup: VocabLookup,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT id FROM teaching_vocab
       WHERE lemma = ?1 AND (?2 = 0 OR status = 'curated')
       ORDER BY status = 'provisional', part_of_speech, id
       LIMIT 1",
      params![lemma, lookup == VocabLookup::CuratedOnly],
      |r| r.get(0),
    )
    .optional()
}

/// Return the id of a provisional headword for `lemma`, creating it if
/// needed.
pub fn ensure_provisional_vocab(
  conn: &Connection,
  lemma: &str,
  part_of_speech: Option<&str>,
  now: &str,
) -> rusqlite::Result<String> {
  let pos = part_of_speech.map(str::trim).unwrap_or_default();
  conn.execute(
    "INSERT INTO teaching_vocab (id, lemma, part_of_speech, status, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (lemma, part_of_speech) DO NOTHING",
    params![encode_uuid(Uuid::new_v4()), lemma, pos, VocabStatus::Provisional.as_ref(), now],
  )?;
  conn.query_row(
    "SELECT id FROM teaching_vocab WHERE lemma = ?1 AND part_of_speech = ?2",
    params![lemma, pos],
    |r| r.get(0),
  )
}

/// Link a sentence to each headword it uses. Headwords without a teaching
/// vocab entry are created as provisional when `allow_provisional` is set and
/// skipped otherwise. Returns the number of new links.
pub fn link_sentence_vocab<'a>(
  conn: &Connection,
  sentence_id: &str,
  headwords: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
  allow_provisional: bool,
  now: &str,
) -> rusqlite::Result<usize> {
  let mut linked = 0;
  for (lemma, pos) in headwords {
    let Some(lemma) = gongbu_core::text::canonical_lemma(lemma) else {
      continue;
    };
    let vocab_id = match lookup_vocab_id(conn, &lemma, VocabLookup::Any)? {
      Some(id) => id,
      None if allow_provisional => ensure_provisional_vocab(conn, &lemma, pos, now)?,
      None => continue,
    };
    linked += conn.execute(
      "INSERT INTO sentence_vocab_links (sentence_content_item_id, teaching_vocab_id)
       VALUES (?1, ?2)
       ON CONFLICT DO NOTHING",
      params![sentence_id, vocab_id],
    )?;
  }
  Ok(linked)
}

pub fn upsert_user_vocab(
  conn: &Connection,
  owner: &str,
  lemma: &str,
  vocab_id: Option<&str>,
  now: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO user_vocab_items (owner, lemma, vocab_id, first_seen_at, last_seen_at)
     VALUES (?1, ?2, ?3, ?4, ?4)
     ON CONFLICT (owner, lemma) DO UPDATE SET
       vocab_id     = COALESCE(user_vocab_items.vocab_id, excluded.vocab_id),
       last_seen_at = CASE
         WHEN excluded.last_seen_at > last_seen_at THEN excluded.last_seen_at
         ELSE last_seen_at
       END",
    params![owner, lemma, vocab_id, now],
  )?;
  Ok(())
}

// ─── Best-effort staging ─────────────────────────────────────────────────────

/// Record a surface the pattern registry did not recognise.
///
/// Runs under a savepoint: any failure (including a missing staging table)
/// is rolled back to the savepoint and discarded, leaving the enclosing
/// transaction usable.
pub fn stage_unmatched(
  tx: &mut Transaction<'_>,
  owner: &str,
  surface: &str,
  alias_norm: &str,
  context_span: Option<&str>,
  now: &str,
) {
  if let Err(e) = try_stage(tx, owner, surface, alias_norm, context_span, now) {
    tracing::debug!(error = %e, surface, "unmatched-pattern staging discarded");
  }
}

fn try_stage(
  tx: &mut Transaction<'_>,
  owner: &str,
  surface: &str,
  alias_norm: &str,
  context_span: Option<&str>,
  now: &str,
) -> rusqlite::Result<()> {
  // Dropping an uncommitted savepoint rolls it back.
  let sp = tx.savepoint()?;
  sp.execute(
    "INSERT INTO unmatched_grammar_staging (
       owner, surface_form, alias_norm, context_span, count, first_seen_at, last_seen_at
     ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
     ON CONFLICT (owner, alias_norm) DO UPDATE SET
       count        = count + 1,
       context_span = COALESCE(excluded.context_span, context_span),
       last_seen_at = CASE
         WHEN excluded.last_seen_at > last_seen_at THEN excluded.last_seen_at
         ELSE last_seen_at
       END",
    params![owner, surface, alias_norm, context_span, now],
  )?;
  sp.commit()
}
