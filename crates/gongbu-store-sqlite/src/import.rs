//! The import writer: fans an analysis payload out into the store.
//!
//! Everything runs in one transaction. Only the unmatched-pattern staging
//! side channel is allowed to fail, and it does so under its own savepoint.

use std::{
  collections::{HashMap, HashSet},
  time::Instant,
};

use gongbu_core::{
  model::{ContentType, GrammarRole},
  store::{ImportRequest, ImportTally},
  text::{
    MAX_FRAGMENT_CHARS, alias_norm, bounded, canonical_lemma, canonical_sentence,
    pattern_text,
  },
};
use rusqlite::Connection;

use crate::{
  encode::{encode_date, encode_uuid},
  write::{self, NewContentItem, VocabLookup, check_deadline},
};

pub fn import_analysis(
  conn: &mut Connection,
  req: &ImportRequest,
  now: &str,
  deadline: Instant,
) -> tokio_rusqlite::Result<ImportTally> {
  let owner = encode_uuid(req.owner);
  let document_id = encode_uuid(req.document_id);
  let session_date = req.session_date.map(encode_date);
  let session_date = session_date.as_deref();
  let analysis = &req.analysis;

  let mut tally = ImportTally::default();
  let mut tx = conn.transaction()?;
  write::require_owned_document(&tx, &document_id, &owner)?;

  // ── 1. Sentences ─────────────────────────────────────────────────────────

  let mut sentence_ids: HashMap<String, String> = HashMap::new();
  for sentence in &analysis.sentences {
    check_deadline(deadline)?;
    let Some(ko) = canonical_sentence(&sentence.ko) else {
      continue;
    };
    if sentence_ids.contains_key(&ko) {
      continue;
    }

    let id = match write::find_content_item_id(&tx, &owner, ContentType::Sentence, &ko)? {
      Some(id) => id,
      None => {
        let item = NewContentItem {
          notes: sentence.gloss.as_deref().map(str::trim).filter(|g| !g.is_empty()),
          ..Default::default()
        };
        let (id, created) =
          write::insert_content_item(&tx, &owner, ContentType::Sentence, &ko, &item, now)?;
        if created {
          write::register_library_item(&tx, ContentType::Sentence, &id, &owner, now)?;
          tally.sentences_created += 1;
        }
        id
      }
    };
    write::upsert_document_link(&tx, &document_id, &id, ContentType::Sentence, session_date, now)?;
    sentence_ids.insert(ko, id);
  }

  // ── 2. Patterns ──────────────────────────────────────────────────────────

  let mut seen_patterns: HashSet<String> = HashSet::new();
  let mut staged: HashSet<String> = HashSet::new();
  for pattern in &analysis.patterns {
    check_deadline(deadline)?;
    let surface = pattern.surface_form.trim();
    if surface.is_empty() {
      continue;
    }
    let context = pattern.context_span.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let text = pattern_text(surface, context);
    if !seen_patterns.insert(text.clone()) {
      continue;
    }

    let norm = alias_norm(surface);
    let matched = write::match_alias(&tx, &norm)?;
    // Staging counts imports, not citations within one import.
    if matched.is_none() && staged.insert(norm.clone()) {
      write::stage_unmatched(&mut tx, &owner, surface, &norm, context, now);
    }

    let id = match write::find_content_item_id(&tx, &owner, ContentType::Pattern, &text)? {
      Some(id) => id,
      None => {
        let item = NewContentItem {
          notes: pattern.kind.as_deref(),
          grammar_pattern_id: matched.as_deref(),
          ..Default::default()
        };
        let (id, created) =
          write::insert_content_item(&tx, &owner, ContentType::Pattern, &text, &item, now)?;
        if created {
          write::register_library_item(&tx, ContentType::Pattern, &id, &owner, now)?;
          if let Some(pattern_id) = &matched {
            write::link_grammar(&tx, &id, pattern_id, GrammarRole::Primary)?;
          }
          tally.patterns_created += 1;
        }
        id
      }
    };
    write::upsert_document_link(&tx, &document_id, &id, ContentType::Pattern, session_date, now)?;
  }

  // ── 3. Sentence → vocab edges ────────────────────────────────────────────

  for sentence in &analysis.sentences {
    if sentence.vocabulary.is_empty() {
      continue;
    }
    check_deadline(deadline)?;
    let Some(sentence_id) =
      canonical_sentence(&sentence.ko).and_then(|ko| sentence_ids.get(&ko))
    else {
      continue;
    };
    tally.sentence_vocab_linked += write::link_sentence_vocab(
      &tx,
      sentence_id,
      sentence.vocabulary.iter().map(|v| (v.lemma.as_str(), v.pos.as_deref())),
      req.allow_provisional,
      now,
    )?;
  }

  // ── 4. Per-user vocabulary ───────────────────────────────────────────────

  let mut seen_lemmas: HashSet<String> = HashSet::new();
  for entry in &analysis.vocabulary {
    check_deadline(deadline)?;
    let Some(lemma) = canonical_lemma(&entry.lemma) else {
      continue;
    };
    if !seen_lemmas.insert(lemma.clone()) {
      continue;
    }
    let vocab_id = write::lookup_vocab_id(&tx, &lemma, VocabLookup::CuratedOnly)?;
    write::upsert_user_vocab(&tx, &owner, &lemma, vocab_id.as_deref(), now)?;
    write::upsert_document_vocab_link(&tx, &document_id, &owner, &lemma, session_date, now)?;
    tally.vocab_touched += 1;
  }

  // ── 5. Fragments ─────────────────────────────────────────────────────────

  for fragment in &analysis.fragments {
    check_deadline(deadline)?;
    let Some(text) = bounded(&fragment.text, MAX_FRAGMENT_CHARS) else {
      continue;
    };
    let label = fragment.label.as_deref().map(str::trim).filter(|l| !l.is_empty());
    if write::insert_fragment(&tx, &document_id, &owner, session_date, &text, label, now)? {
      tally.fragments_created += 1;
    }
  }

  check_deadline(deadline)?;
  tx.commit()?;
  Ok(tally)
}
