//! The `doc_import` analysis payload.
//!
//! These types are decoded from LLM output only after the gateway has
//! normalised its shape, so every collection defaults to empty and unknown
//! keys survive in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Everything the analysis pass extracted from a piece of lesson text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
  #[serde(default)]
  pub vocabulary: Vec<VocabEntry>,
  #[serde(default)]
  pub sentences:  Vec<AnalysisSentence>,
  #[serde(default)]
  pub patterns:   Vec<PatternSurface>,
  #[serde(default)]
  pub fragments:  Vec<Fragment>,
  #[serde(flatten)]
  pub extra:      Map<String, Value>,
}

/// A vocabulary headword.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
  pub lemma: String,
  #[serde(default)]
  pub pos:   Option<String>,
  #[serde(default)]
  pub gloss: Option<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// An example sentence from the lesson, optionally carrying the headwords it
/// uses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSentence {
  pub ko:         String,
  #[serde(default)]
  pub gloss:      Option<String>,
  #[serde(default)]
  pub vocabulary: Vec<VocabEntry>,
  #[serde(flatten)]
  pub extra:      Map<String, Value>,
}

/// A grammar pattern as it surfaced in the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternSurface {
  pub surface_form: String,
  #[serde(default)]
  pub context_span: Option<String>,
  #[serde(default)]
  pub confidence:   Option<f64>,
  #[serde(default)]
  pub kind:         Option<String>,
  #[serde(flatten)]
  pub extra:        Map<String, Value>,
}

/// Free text worth keeping with the document but not a practice item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fragment {
  pub text:  String,
  #[serde(default)]
  pub label: Option<String>,
}

impl Analysis {
  pub fn is_empty(&self) -> bool {
    self.vocabulary.is_empty()
      && self.sentences.is_empty()
      && self.patterns.is_empty()
      && self.fragments.is_empty()
  }
}
