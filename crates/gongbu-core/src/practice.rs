//! Practice generation, validation and commit payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
  Error, Result,
  model::{CefrLevel, OwnerId, Perspective, Register},
  text::canonical_sentence,
};

/// Upper bound on sentences accepted by a single commit.
pub const MAX_COMMIT_SENTENCES: usize = 100;

/// Upper bound on sentences requested from a single generation pass.
pub const MAX_PRACTICE_COUNT: u8 = 20;

pub const DEFAULT_PRACTICE_COUNT: u8 = 5;

/// Gap between consecutive list-item positions, leaving room to reorder
/// without renumbering.
pub const LIST_POSITION_GAP: i64 = 100;

pub const DEFAULT_LIST_WEIGHT: u8 = 3;

// ─── Generation ──────────────────────────────────────────────────────────────

/// Inputs to the practice generation pass.
#[derive(Debug, Clone)]
pub struct GenerateParams {
  pub lesson_text: String,
  pub cefr:        CefrLevel,
  pub count:       u8,
  pub perspective: Perspective,
  pub register:    Register,
  /// Language of the `en` gloss and validation explanations.
  pub gloss_lang:  String,
}

impl GenerateParams {
  /// Clamp `count` into `1..=MAX_PRACTICE_COUNT`.
  pub fn clamped_count(&self) -> u8 { self.count.clamp(1, MAX_PRACTICE_COUNT) }
}

/// A headword used by a generated sentence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PracticeVocab {
  pub lemma_ko: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pos_ko:   Option<String>,
  #[serde(flatten)]
  pub extra:    Map<String, Value>,
}

/// One generated sentence, with validation fields attached when the
/// validation pass produced a result for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PracticeSentence {
  pub ko:                 String,
  #[serde(default)]
  pub en:                 String,
  #[serde(default)]
  pub cefr_level:         Option<String>,
  #[serde(default)]
  pub topic:              Option<String>,
  #[serde(default)]
  pub politeness:         Option<String>,
  #[serde(default)]
  pub tense:              Option<String>,
  #[serde(default)]
  pub vocabulary:         Vec<PracticeVocab>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub validation_score:   Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub validation_natural: Option<bool>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub issues:             Option<Vec<String>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suggested_fix:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation:        Option<String>,
  #[serde(flatten)]
  pub extra:              Map<String, Value>,
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// A naturalness judgement for the generated sentence at `index` (1-based).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
  pub index:             usize,
  #[serde(default)]
  pub naturalness_score: Option<f64>,
  #[serde(default)]
  pub natural:           Option<bool>,
  #[serde(default)]
  pub issues:            Vec<String>,
  #[serde(default)]
  pub suggested_fix:     Option<String>,
  #[serde(default)]
  pub explanation:       Option<String>,
  #[serde(flatten)]
  pub extra:             Map<String, Value>,
}

/// Attach each validation to the sentence at `index - 1`.
///
/// Out-of-range and zero indices are ignored; sentences without a matching
/// validation keep their validation fields absent. Returns the number of
/// sentences that received a validation.
pub fn merge_validations(
  sentences: &mut [PracticeSentence],
  validations: &[Validation],
) -> usize {
  let mut attached = 0;
  for v in validations {
    let Some(slot) = v.index.checked_sub(1).and_then(|i| sentences.get_mut(i))
    else {
      continue;
    };
    slot.validation_score = v.naturalness_score;
    slot.validation_natural = v.natural;
    slot.issues = Some(v.issues.clone());
    slot.suggested_fix = v.suggested_fix.clone();
    slot.explanation = v.explanation.clone();
    attached += 1;
  }
  attached
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// A reviewed (possibly edited) generated sentence submitted for commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitSentence {
  pub ko:                String,
  #[serde(default)]
  pub en:                Option<String>,
  #[serde(default)]
  pub cefr_level:        Option<String>,
  #[serde(default)]
  pub topic:             Option<String>,
  #[serde(default)]
  pub naturalness_score: Option<f64>,
  #[serde(default)]
  pub politeness:        Option<String>,
  #[serde(default)]
  pub tense:             Option<String>,
  #[serde(default)]
  pub vocabulary:        Vec<PracticeVocab>,
}

/// Parameters for [`LessonStore::commit_practice`](crate::store::LessonStore::commit_practice).
#[derive(Debug, Clone)]
pub struct CommitRequest {
  pub owner:        OwnerId,
  pub document_id:  Option<Uuid>,
  pub session_date: Option<NaiveDate>,
  pub list_name:    Option<String>,
  pub sentences:    Vec<CommitSentence>,
}

impl CommitRequest {
  /// Enforce `1 ..= MAX_COMMIT_SENTENCES` entries, at least one of which
  /// has a non-blank `ko`.
  pub fn check_bounds(&self) -> Result<()> {
    match self.sentences.len() {
      0 => Err(Error::NoSentences),
      n if n > MAX_COMMIT_SENTENCES => Err(Error::TooManySentences(n)),
      _ if !self.has_usable_sentence() => Err(Error::NoSentences),
      _ => Ok(()),
    }
  }

  fn has_usable_sentence(&self) -> bool {
    self
      .sentences
      .iter()
      .any(|s| canonical_sentence(&s.ko).is_some())
  }

  /// Vocab linking may create provisional headwords only for sentences tied
  /// to an imported document.
  pub fn allow_provisional_vocab(&self) -> bool { self.document_id.is_some() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
  pub list_id:       Uuid,
  pub list_name:     String,
  pub items_created: usize,
}

/// The default name for the `n`th generated practice list (1-based).
pub fn default_list_name(n: usize) -> String { format!("Practice List {n}") }

#[cfg(test)]
mod tests {
  use super::*;

  fn sentence(ko: &str) -> PracticeSentence {
    PracticeSentence { ko: ko.into(), ..Default::default() }
  }

  fn validation(index: usize, score: f64) -> Validation {
    Validation {
      index,
      naturalness_score: Some(score),
      natural: Some(score >= 0.7),
      issues: vec!["spacing".into()],
      ..Default::default()
    }
  }

  #[test]
  fn validation_attaches_to_previous_index() {
    let mut sentences = vec![sentence("하나"), sentence("둘"), sentence("셋")];
    let attached = merge_validations(&mut sentences, &[validation(2, 0.9)]);

    assert_eq!(attached, 1);
    assert!(sentences[0].validation_score.is_none());
    assert_eq!(sentences[1].validation_score, Some(0.9));
    assert_eq!(sentences[1].validation_natural, Some(true));
    assert_eq!(sentences[1].issues.as_deref(), Some(&["spacing".to_string()][..]));
    assert!(sentences[2].validation_natural.is_none());
  }

  #[test]
  fn out_of_range_indices_are_ignored() {
    let mut sentences = vec![sentence("하나")];
    let attached =
      merge_validations(&mut sentences, &[validation(0, 0.2), validation(5, 0.4)]);
    assert_eq!(attached, 0);
    assert!(sentences[0].validation_score.is_none());
  }

  #[test]
  fn absent_validation_fields_are_not_serialised() {
    let json = serde_json::to_value(sentence("하나")).unwrap();
    assert!(json.get("validation_score").is_none());
    assert!(json.get("issues").is_none());
    assert_eq!(json["ko"], "하나");
  }

  #[test]
  fn commit_bounds() {
    let mut req = CommitRequest {
      owner:        Uuid::new_v4(),
      document_id:  None,
      session_date: None,
      list_name:    None,
      sentences:    vec![],
    };
    assert!(matches!(req.check_bounds(), Err(Error::NoSentences)));

    req.sentences = vec![CommitSentence::default(); MAX_COMMIT_SENTENCES + 1];
    assert!(matches!(req.check_bounds(), Err(Error::TooManySentences(101))));

    req.sentences.truncate(MAX_COMMIT_SENTENCES);
    assert!(matches!(req.check_bounds(), Err(Error::NoSentences)));

    req.sentences[MAX_COMMIT_SENTENCES - 1].ko = "빵을 먹었어요.".into();
    assert!(req.check_bounds().is_ok());
    assert!(!req.allow_provisional_vocab());
  }

  #[test]
  fn count_is_clamped() {
    let params = GenerateParams {
      lesson_text: String::new(),
      cefr:        CefrLevel::A1,
      count:       40,
      perspective: Perspective::FirstPerson,
      register:    Register::Haeyo,
      gloss_lang:  "en".into(),
    };
    assert_eq!(params.clamped_count(), MAX_PRACTICE_COUNT);
    assert_eq!(GenerateParams { count: 0, ..params }.clamped_count(), 1);
  }
}
