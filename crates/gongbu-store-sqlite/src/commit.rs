//! The practice committer: turns reviewed sentences into a new list.

use std::{collections::HashSet, time::Instant};

use gongbu_core::{
  model::{ContentType, ListItemType, ListSourceKind},
  practice::{
    CommitOutcome, CommitRequest, DEFAULT_LIST_WEIGHT, LIST_POSITION_GAP,
    default_list_name,
  },
  text::canonical_sentence,
};
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::{
  encode::{encode_date, encode_uuid},
  write::{self, NewContentItem, check_deadline, fail},
};

pub fn commit_practice(
  conn: &mut Connection,
  req: &CommitRequest,
  now: &str,
  deadline: Instant,
) -> tokio_rusqlite::Result<CommitOutcome> {
  req.check_bounds().map_err(fail)?;

  let owner = encode_uuid(req.owner);
  let document_id = req.document_id.map(encode_uuid);
  let session_date = req.session_date.map(encode_date);
  let allow_provisional = req.allow_provisional_vocab();

  let tx = conn.transaction()?;
  if let Some(document_id) = &document_id {
    write::require_owned_document(&tx, document_id, &owner)?;
  }

  let list_name = match req.list_name.as_deref().map(str::trim) {
    Some(name) if !name.is_empty() => name.to_owned(),
    _ => {
      let prior: i64 = tx.query_row(
        "SELECT COUNT(*) FROM lists WHERE owner = ?1 AND source_kind = ?2",
        params![owner, ListSourceKind::PracticeGeneration.as_ref()],
        |r| r.get(0),
      )?;
      default_list_name(usize::try_from(prior).unwrap_or(0) + 1)
    }
  };

  let list_id = Uuid::new_v4();
  let list_id_str = encode_uuid(list_id);
  tx.execute(
    "INSERT INTO lists (
       list_id, owner, name, description, global_weight, is_active,
       source_kind, source_document_id, created_at
     ) VALUES (?1, ?2, ?3, NULL, ?4, 1, ?5, ?6, ?7)",
    params![
      list_id_str,
      owner,
      list_name,
      DEFAULT_LIST_WEIGHT,
      ListSourceKind::PracticeGeneration.as_ref(),
      document_id,
      now,
    ],
  )?;

  let mut position = 0;
  let mut items_created = 0;
  let mut listed: HashSet<String> = HashSet::new();
  for sentence in &req.sentences {
    check_deadline(deadline)?;
    let Some(ko) = canonical_sentence(&sentence.ko) else {
      continue;
    };

    let id = match write::find_content_item_id(&tx, &owner, ContentType::Sentence, &ko)? {
      Some(id) => id,
      None => {
        let item = NewContentItem {
          notes:             sentence.en.as_deref().map(str::trim).filter(|e| !e.is_empty()),
          cefr_level:        sentence.cefr_level.as_deref(),
          topic:             sentence.topic.as_deref(),
          politeness:        sentence.politeness.as_deref(),
          tense:             sentence.tense.as_deref(),
          naturalness_score: sentence.naturalness_score,
          grammar_pattern_id: None,
        };
        let (id, created) =
          write::insert_content_item(&tx, &owner, ContentType::Sentence, &ko, &item, now)?;
        if created {
          write::register_library_item(&tx, ContentType::Sentence, &id, &owner, now)?;
        }
        id
      }
    };

    if let Some(document_id) = &document_id {
      write::upsert_document_link(
        &tx,
        document_id,
        &id,
        ContentType::Sentence,
        session_date.as_deref(),
        now,
      )?;
    }

    write::link_sentence_vocab(
      &tx,
      &id,
      sentence.vocabulary.iter().map(|v| (v.lemma_ko.as_str(), v.pos_ko.as_deref())),
      allow_provisional,
      now,
    )?;

    // A sentence repeated within one commit lands on the list once.
    if !listed.insert(id.clone()) {
      continue;
    }
    position += LIST_POSITION_GAP;
    write::insert_list_item(&tx, &list_id_str, ListItemType::Sentence, &id, position)?;
    items_created += 1;
  }

  check_deadline(deadline)?;
  tx.commit()?;
  Ok(CommitOutcome { list_id, list_name, items_created })
}
