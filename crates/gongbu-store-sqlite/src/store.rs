//! [`SqliteStore`]: the SQLite implementation of [`LessonStore`].

use std::{
  path::Path,
  time::{Duration, Instant},
};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, params};
use uuid::Uuid;

use gongbu_core::{
  model::{
    CefrLevel, ContentItem, ContentType, Document, GrammarPattern, IngestStatus,
    ListItem, OwnerId, PracticeList, Snapshot, TeachingVocab, VocabStatus,
  },
  practice::{CommitOutcome, CommitRequest},
  store::{
    EnsureDocument, ImportRequest, ImportTally, LessonStore, NewGrammarPattern,
    NewSnapshot, NewTeachingVocab,
  },
  text::{alias_norm, canonical_lemma},
};

use crate::{
  Error, Result, commit,
  encode::{
    RawContentItem, RawDocument, RawList, RawListItem, RawSnapshot,
    RawTeachingVocab, decode_enum, encode_dt, encode_uuid,
  },
  import,
  schema::SCHEMA,
  write::{self, check_deadline, fail},
};

/// Deadline applied to every relational operation unless overridden.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(8);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Gongbu lesson store backed by a single SQLite file.
///
/// Clones share the inner connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  op_timeout: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, op_timeout: DEFAULT_OP_TIMEOUT };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests and local runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, op_timeout: DEFAULT_OP_TIMEOUT };
    store.init_schema().await?;
    Ok(store)
  }

  /// Replace the per-operation deadline.
  pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
    self.op_timeout = op_timeout;
    self
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the database thread under the operation deadline.
  ///
  /// The deadline is enforced twice: `f` receives it to check between
  /// statements (so an open transaction rolls back), and the await itself is
  /// bounded so the caller never waits past it.
  async fn run<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection, Instant) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    let deadline = Instant::now() + self.op_timeout;
    let call = self.conn.call(move |conn| f(conn, deadline));
    match tokio::time::timeout(self.op_timeout, call).await {
      Ok(result) => result.map_err(Error::from_call),
      Err(_) => Err(Error::Core(gongbu_core::Error::DbTimeout)),
    }
  }
}

fn now_str() -> String { encode_dt(Utc::now()) }

fn select_document(
  conn: &rusqlite::Connection,
  owner: &str,
  source_kind: &str,
  source_uri: &str,
) -> rusqlite::Result<Option<RawDocument>> {
  conn
    .query_row(
      &format!(
        "SELECT {} FROM documents
         WHERE owner = ?1 AND source_kind = ?2 AND source_uri = ?3",
        RawDocument::COLUMNS
      ),
      params![owner, source_kind, source_uri],
      RawDocument::from_row,
    )
    .optional()
}

// ─── LessonStore impl ────────────────────────────────────────────────────────

impl LessonStore for SqliteStore {
  type Error = Error;

  // ── Snapshots & documents ─────────────────────────────────────────────────

  async fn register_snapshot(&self, input: NewSnapshot) -> Result<Snapshot> {
    let created_at = Utc::now();
    let size = i64::try_from(input.size)
      .map_err(|_| gongbu_core::Error::InvalidInput(format!("snapshot size {}", input.size)))?;
    let asset_id = encode_uuid(input.asset_id);
    let owner = encode_uuid(input.owner);
    let blob_key = input.blob_key.clone();
    let mime = input.mime.clone();
    let sha256 = input.sha256.clone();
    let title = input.title.clone();
    let created_str = encode_dt(created_at);

    self
      .run(move |conn, deadline| {
        check_deadline(deadline)?;
        conn.execute(
          "INSERT INTO snapshots (
             asset_id, owner, blob_key, mime, size, sha256, title, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          params![asset_id, owner, blob_key, mime, size, sha256, title, created_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(Snapshot {
      asset_id: input.asset_id,
      owner: input.owner,
      blob_key: input.blob_key,
      mime: input.mime,
      size: input.size,
      sha256: input.sha256,
      title: input.title,
      created_at,
    })
  }

  async fn get_snapshot(&self, owner: OwnerId, asset_id: Uuid) -> Result<Option<Snapshot>> {
    let owner = encode_uuid(owner);
    let asset_id = encode_uuid(asset_id);

    let raw = self
      .run(move |conn, _| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM snapshots WHERE asset_id = ?1 AND owner = ?2",
                RawSnapshot::COLUMNS
              ),
              params![asset_id, owner],
              RawSnapshot::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSnapshot::into_snapshot).transpose()
  }

  async fn ensure_document(&self, input: EnsureDocument) -> Result<Document> {
    let owner = encode_uuid(input.owner);
    let source_kind = input.source_kind.as_ref().to_owned();
    let source_uri = input.source_uri.trim().to_owned();
    let asset_id = input.asset_id.map(encode_uuid);
    let title = input.title.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty());
    let now = now_str();

    let raw = self
      .run(move |conn, deadline| {
        check_deadline(deadline)?;
        if let Some(existing) = select_document(conn, &owner, &source_kind, &source_uri)? {
          return Ok(existing);
        }

        let Some(asset_id) = asset_id else {
          return Err(fail(gongbu_core::Error::SnapshotRequired));
        };
        let owned = conn
          .query_row(
            "SELECT 1 FROM snapshots WHERE asset_id = ?1 AND owner = ?2",
            params![asset_id, owner],
            |_| Ok(()),
          )
          .optional()?;
        if owned.is_none() {
          return Err(fail(gongbu_core::Error::SnapshotRequired));
        }

        // A concurrent writer may claim the slot first; either way the
        // reread returns the winner's row.
        conn.execute(
          "INSERT INTO documents (
             document_id, owner, asset_id, source_kind, source_uri, title,
             ingest_status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (owner, source_kind, source_uri) DO NOTHING",
          params![
            encode_uuid(Uuid::new_v4()),
            owner,
            asset_id,
            source_kind,
            source_uri,
            title,
            IngestStatus::Verified.as_ref(),
            now,
          ],
        )?;
        Ok(
          select_document(conn, &owner, &source_kind, &source_uri)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?,
        )
      })
      .await?;

    raw.into_document()
  }

  // ── Learner profile ───────────────────────────────────────────────────────

  async fn learner_cefr(&self, owner: OwnerId) -> Result<Option<CefrLevel>> {
    let owner = encode_uuid(owner);
    let level: Option<String> = self
      .run(move |conn, _| {
        Ok(
          conn
            .query_row(
              "SELECT cefr_level FROM learner_profiles WHERE owner = ?1",
              params![owner],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    level.as_deref().map(|l| decode_enum(l, "cefr level")).transpose()
  }

  async fn set_learner_cefr(&self, owner: OwnerId, level: CefrLevel) -> Result<()> {
    let owner = encode_uuid(owner);
    let level = level.as_ref().to_owned();
    let now = now_str();
    self
      .run(move |conn, deadline| {
        check_deadline(deadline)?;
        conn.execute(
          "INSERT INTO learner_profiles (owner, cefr_level, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (owner) DO UPDATE SET
             cefr_level = excluded.cefr_level,
             updated_at = excluded.updated_at",
          params![owner, level, now],
        )?;
        Ok(())
      })
      .await
  }

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn grammar_patterns(&self) -> Result<Vec<GrammarPattern>> {
    let rows: Vec<(String, String, Option<String>)> = self
      .run(|conn, _| {
        let mut stmt = conn.prepare(
          "SELECT p.id, p.display_name, a.alias_raw
           FROM grammar_patterns p
           LEFT JOIN grammar_pattern_aliases a ON a.grammar_pattern_id = p.id
           WHERE p.active = 1
           ORDER BY p.id, a.alias_raw",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut patterns: Vec<GrammarPattern> = Vec::new();
    for (id, display_name, alias) in rows {
      match patterns.last_mut() {
        Some(last) if last.id == id => last.aliases.extend(alias),
        _ => patterns.push(GrammarPattern {
          id,
          display_name,
          aliases: alias.into_iter().collect(),
        }),
      }
    }
    Ok(patterns)
  }

  async fn match_pattern_surface<'a>(&'a self, surface: &'a str) -> Result<Option<String>> {
    let norm = alias_norm(surface);
    if norm.is_empty() {
      return Ok(None);
    }
    self
      .run(move |conn, _| Ok(write::match_alias(conn, &norm)?))
      .await
  }

  async fn add_grammar_pattern(&self, input: NewGrammarPattern) -> Result<()> {
    let id = input.id.trim().to_owned();
    let display_name = input.display_name.trim().to_owned();
    if id.is_empty() || display_name.is_empty() {
      return Err(
        gongbu_core::Error::InvalidInput("grammar pattern needs an id and a display name".into())
          .into(),
      );
    }

    // The display name is itself an alias.
    let aliases: Vec<(String, String)> = std::iter::once(display_name.as_str())
      .chain(input.aliases.iter().map(String::as_str))
      .map(str::trim)
      .filter_map(|raw| {
        let norm = alias_norm(raw);
        (!norm.is_empty()).then(|| (raw.to_owned(), norm))
      })
      .collect();
    let active = input.active;

    self
      .run(move |conn, deadline| {
        check_deadline(deadline)?;
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO grammar_patterns (id, display_name, active)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (id) DO UPDATE SET
             display_name = excluded.display_name,
             active       = excluded.active",
          params![id, display_name, active],
        )?;
        for (raw, norm) in &aliases {
          tx.execute(
            "INSERT INTO grammar_pattern_aliases (alias_raw, alias_norm, grammar_pattern_id)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (alias_norm, grammar_pattern_id) DO NOTHING",
            params![raw, norm, id],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
  }

  async fn find_teaching_vocab<'a>(&'a self, lemma: &'a str) -> Result<Option<TeachingVocab>> {
    let Some(lemma) = canonical_lemma(lemma) else {
      return Ok(None);
    };
    let raw = self
      .run(move |conn, _| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM teaching_vocab
                 WHERE lemma = ?1
                 ORDER BY status = 'provisional', part_of_speech, id
                 LIMIT 1",
                RawTeachingVocab::COLUMNS
              ),
              params![lemma],
              RawTeachingVocab::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawTeachingVocab::into_vocab).transpose()
  }

  async fn add_teaching_vocab(&self, input: NewTeachingVocab) -> Result<TeachingVocab> {
    let Some(lemma) = canonical_lemma(&input.lemma) else {
      return Err(gongbu_core::Error::InvalidInput("empty lemma".into()).into());
    };
    let pos = input
      .part_of_speech
      .as_deref()
      .map(str::trim)
      .unwrap_or_default()
      .to_owned();
    let now = now_str();

    let raw = self
      .run(move |conn, deadline| {
        check_deadline(deadline)?;
        conn.execute(
          "INSERT INTO teaching_vocab (id, lemma, part_of_speech, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (lemma, part_of_speech) DO UPDATE SET status = excluded.status",
          params![
            encode_uuid(Uuid::new_v4()),
            lemma,
            pos,
            VocabStatus::Curated.as_ref(),
            now,
          ],
        )?;
        Ok(conn.query_row(
          &format!(
            "SELECT {} FROM teaching_vocab WHERE lemma = ?1 AND part_of_speech = ?2",
            RawTeachingVocab::COLUMNS
          ),
          params![lemma, pos],
          RawTeachingVocab::from_row,
        )?)
      })
      .await?;

    raw.into_vocab()
  }

  // ── Pipeline writes ───────────────────────────────────────────────────────

  async fn import_analysis(&self, input: ImportRequest) -> Result<ImportTally> {
    let owner = input.owner;
    let document_id = input.document_id;
    let now = now_str();

    let tally = self
      .run(move |conn, deadline| import::import_analysis(conn, &input, &now, deadline))
      .await?;

    tracing::info!(
      %owner,
      %document_id,
      sentences_created = tally.sentences_created,
      patterns_created = tally.patterns_created,
      vocab_touched = tally.vocab_touched,
      fragments_created = tally.fragments_created,
      sentence_vocab_linked = tally.sentence_vocab_linked,
      "analysis imported"
    );
    Ok(tally)
  }

  async fn commit_practice(&self, input: CommitRequest) -> Result<CommitOutcome> {
    // Reject out-of-bounds requests before borrowing the connection.
    input.check_bounds()?;
    let owner = input.owner;
    let now = now_str();

    let outcome = self
      .run(move |conn, deadline| commit::commit_practice(conn, &input, &now, deadline))
      .await?;

    tracing::info!(
      %owner,
      list_id = %outcome.list_id,
      items_created = outcome.items_created,
      "practice list committed"
    );
    Ok(outcome)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn find_content_item<'a>(
    &'a self,
    owner: OwnerId,
    content_type: ContentType,
    text: &'a str,
  ) -> Result<Option<ContentItem>> {
    let owner = encode_uuid(owner);
    let text = text.trim().to_owned();
    let raw = self
      .run(move |conn, _| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM content_items
                 WHERE owner = ?1 AND content_type = ?2 AND text = ?3",
                RawContentItem::COLUMNS
              ),
              params![owner, content_type.as_ref(), text],
              RawContentItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContentItem::into_item).transpose()
  }

  async fn get_list(&self, owner: OwnerId, list_id: Uuid) -> Result<Option<PracticeList>> {
    let owner = encode_uuid(owner);
    let list_id = encode_uuid(list_id);
    let raw = self
      .run(move |conn, _| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM lists WHERE list_id = ?1 AND owner = ?2",
                RawList::COLUMNS
              ),
              params![list_id, owner],
              RawList::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawList::into_list).transpose()
  }

  async fn list_items(&self, list_id: Uuid) -> Result<Vec<ListItem>> {
    let list_id = encode_uuid(list_id);
    let raws: Vec<RawListItem> = self
      .run(move |conn, _| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM list_items WHERE list_id = ?1 ORDER BY position",
          RawListItem::COLUMNS
        ))?;
        let rows = stmt
          .query_map(params![list_id], RawListItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawListItem::into_item).collect()
  }
}

// ─── Test support ────────────────────────────────────────────────────────────

#[cfg(test)]
impl SqliteStore {
  /// Number of rows in `table`.
  pub(crate) async fn count_rows(&self, table: &'static str) -> Result<i64> {
    self
      .run(move |conn, _| {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
      })
      .await
  }

  /// Run arbitrary SQL, for tests that need to break the schema.
  pub(crate) async fn execute_batch(&self, sql: &'static str) -> Result<()> {
    self
      .run(move |conn, _| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await
  }

  /// Run a single-row query returning one nullable text column.
  pub(crate) async fn query_text(
    &self,
    sql: &'static str,
    arg: String,
  ) -> Result<Option<String>> {
    self
      .run(move |conn, _| {
        let value = conn
          .query_row(sql, params![arg], |r| r.get::<_, Option<String>>(0))
          .optional()?;
        Ok(value.flatten())
      })
      .await
  }
}
