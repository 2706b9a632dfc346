//! JSON extraction and shape-only normalisation of model output.
//!
//! Model output is untrusted. Everything downstream of the gateway decodes
//! the values produced here, never the raw text. Normalisation never invents
//! content: arrays default to empty, strings are trimmed, numbers are coerced
//! or dropped, and unrecognised keys are passed through untouched.

use gongbu_core::{
  analysis::Analysis,
  practice::{PracticeSentence, Validation},
};
use serde_json::{Map, Value};

use crate::{LlmError, Result};

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Parse the JSON object in `text`, tolerating markdown fences and prose
/// around it.
pub fn extract_json(text: &str) -> Result<Value> {
  let text = strip_fences(text.trim());
  if text.is_empty() {
    return Err(LlmError::InvalidJson("empty output".into()));
  }

  match serde_json::from_str(text) {
    Ok(value) => Ok(value),
    Err(direct) => {
      let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(LlmError::InvalidJson(direct.to_string()));
      };
      if end <= start {
        return Err(LlmError::InvalidJson(direct.to_string()));
      }
      serde_json::from_str(&text[start..=end]).map_err(|e| LlmError::InvalidJson(e.to_string()))
    }
  }
}

fn strip_fences(text: &str) -> &str {
  let Some(rest) = text.strip_prefix("```") else {
    return text;
  };
  // Drop the info string (`json`) on the opening fence line.
  let body = rest.split_once('\n').map_or("", |(_, body)| body);
  body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

// ─── Field helpers ───────────────────────────────────────────────────────────

fn as_object(value: Value, what: &str) -> Result<Map<String, Value>> {
  match value {
    Value::Object(map) => Ok(map),
    other => Err(LlmError::InvalidShape(format!("{what}: expected an object, got {}", kind(&other)))),
  }
}

fn kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

/// Remove `key` and return its items; anything but an array yields none.
fn take_array(obj: &mut Map<String, Value>, key: &str) -> Vec<Value> {
  match obj.remove(key) {
    Some(Value::Array(items)) => items,
    _ => Vec::new(),
  }
}

fn scalar_string(value: &Value) -> Option<String> {
  let s = match value {
    Value::String(s) => s.trim().to_owned(),
    Value::Number(n) => n.to_string(),
    _ => return None,
  };
  (!s.is_empty()).then_some(s)
}

/// Normalise `key` to a trimmed non-empty string, falling back to the first
/// present alias. Returns whether the key survived.
fn string_field(obj: &mut Map<String, Value>, key: &str, aliases: &[&str]) -> bool {
  let mut found = obj.remove(key).as_ref().and_then(scalar_string);
  for alias in aliases {
    let candidate = obj.remove(*alias);
    if found.is_none() {
      found = candidate.as_ref().and_then(scalar_string);
    }
  }
  match found {
    Some(s) => {
      obj.insert(key.to_owned(), Value::String(s));
      true
    }
    None => false,
  }
}

fn coerce_number(value: &Value) -> Option<f64> {
  let n: f64 = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().parse().ok()?,
    _ => return None,
  };
  n.is_finite().then_some(n)
}

fn number_field(obj: &mut Map<String, Value>, key: &str) {
  if let Some(n) = obj.remove(key).as_ref().and_then(coerce_number) {
    if let Some(number) = serde_json::Number::from_f64(n) {
      obj.insert(key.to_owned(), Value::Number(number));
    }
  }
}

fn bool_field(obj: &mut Map<String, Value>, key: &str) {
  let value = match obj.remove(key) {
    Some(Value::Bool(b)) => Some(b),
    Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
      "true" | "yes" => Some(true),
      "false" | "no" => Some(false),
      _ => None,
    },
    _ => None,
  };
  if let Some(b) = value {
    obj.insert(key.to_owned(), Value::Bool(b));
  }
}

fn string_list_field(obj: &mut Map<String, Value>, key: &str) {
  let items: Vec<Value> = match obj.remove(key) {
    Some(Value::Array(items)) => items
      .iter()
      .filter_map(scalar_string)
      .map(Value::String)
      .collect(),
    Some(single) => scalar_string(&single).map(Value::String).into_iter().collect(),
    None => Vec::new(),
  };
  obj.insert(key.to_owned(), Value::Array(items));
}

/// Normalise each item of an array with `f`, accepting a bare string as
/// shorthand for `{ key: string }` and dropping items `f` rejects.
fn normalize_items(
  items: Vec<Value>,
  key: &str,
  f: impl Fn(Map<String, Value>) -> Option<Map<String, Value>>,
) -> Value {
  let normalized = items
    .into_iter()
    .filter_map(|item| match item {
      Value::Object(obj) => Some(obj),
      Value::String(s) => Some(Map::from_iter([(key.to_owned(), Value::String(s))])),
      _ => None,
    })
    .filter_map(f)
    .map(Value::Object)
    .collect();
  Value::Array(normalized)
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
  serde_json::from_value(value).map_err(|e| LlmError::InvalidShape(format!("{what}: {e}")))
}

// ─── doc_import ──────────────────────────────────────────────────────────────

fn analysis_vocab(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  if !string_field(&mut obj, "lemma", &["lemma_ko", "word"]) {
    return None;
  }
  string_field(&mut obj, "pos", &["pos_ko", "part_of_speech"]);
  string_field(&mut obj, "gloss", &["en", "meaning"]);
  Some(obj)
}

fn analysis_sentence(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  if !string_field(&mut obj, "ko", &["text", "sentence"]) {
    return None;
  }
  string_field(&mut obj, "gloss", &["en", "translation"]);
  let vocab = take_array(&mut obj, "vocabulary");
  obj.insert("vocabulary".into(), normalize_items(vocab, "lemma", analysis_vocab));
  Some(obj)
}

fn analysis_pattern(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  if !string_field(&mut obj, "surface_form", &["surface", "pattern"]) {
    return None;
  }
  string_field(&mut obj, "context_span", &["context"]);
  string_field(&mut obj, "kind", &[]);
  number_field(&mut obj, "confidence");
  Some(obj)
}

fn analysis_fragment(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  if !string_field(&mut obj, "text", &[]) {
    return None;
  }
  string_field(&mut obj, "label", &[]);
  // Fragments carry no extension keys.
  obj.retain(|k, _| k == "text" || k == "label");
  Some(obj)
}

/// Normalise a `doc_import` response into an [`Analysis`].
pub fn analysis(value: Value) -> Result<Analysis> {
  let mut obj = as_object(value, "doc_import")?;

  let vocabulary = take_array(&mut obj, "vocabulary");
  let sentences = take_array(&mut obj, "sentences");
  let patterns = take_array(&mut obj, "patterns");
  let fragments = take_array(&mut obj, "fragments");

  obj.insert("vocabulary".into(), normalize_items(vocabulary, "lemma", analysis_vocab));
  obj.insert("sentences".into(), normalize_items(sentences, "ko", analysis_sentence));
  obj.insert("patterns".into(), normalize_items(patterns, "surface_form", analysis_pattern));
  obj.insert("fragments".into(), normalize_items(fragments, "text", analysis_fragment));

  decode(Value::Object(obj), "doc_import")
}

// ─── practice_generation ─────────────────────────────────────────────────────

fn practice_vocab(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  if !string_field(&mut obj, "lemma_ko", &["lemma", "word"]) {
    return None;
  }
  string_field(&mut obj, "pos_ko", &["pos", "part_of_speech"]);
  Some(obj)
}

/// Keys the generation pass must not set; they are filled by validation.
const VALIDATION_KEYS: [&str; 5] =
  ["validation_score", "validation_natural", "issues", "suggested_fix", "explanation"];

fn practice_sentence(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  if !string_field(&mut obj, "ko", &["sentence", "text"]) {
    return None;
  }
  if !string_field(&mut obj, "en", &["gloss", "translation"]) {
    obj.insert("en".into(), Value::String(String::new()));
  }
  for key in ["cefr_level", "topic", "politeness", "tense"] {
    string_field(&mut obj, key, &[]);
  }
  let vocab = take_array(&mut obj, "vocabulary");
  obj.insert("vocabulary".into(), normalize_items(vocab, "lemma_ko", practice_vocab));
  for key in VALIDATION_KEYS {
    obj.remove(key);
  }
  Some(obj)
}

/// Items under `key`, accepting a bare top-level array as well.
fn top_level_items(value: Value, key: &str, what: &str) -> Result<Vec<Value>> {
  match value {
    Value::Array(items) => Ok(items),
    other => Ok(take_array(&mut as_object(other, what)?, key)),
  }
}

/// Normalise a `practice_generation` response.
pub fn generated_sentences(value: Value) -> Result<Vec<PracticeSentence>> {
  let items = top_level_items(value, "sentences", "practice_generation")?;
  decode(normalize_items(items, "ko", practice_sentence), "practice_generation")
}

// ─── practice_validation ─────────────────────────────────────────────────────

fn validation(mut obj: Map<String, Value>) -> Option<Map<String, Value>> {
  let index = obj
    .remove("index")
    .as_ref()
    .and_then(coerce_number)
    .filter(|n| *n >= 1.0 && n.fract() == 0.0)?;
  obj.insert("index".into(), Value::from(index as u64));

  number_field(&mut obj, "naturalness_score");
  bool_field(&mut obj, "natural");
  string_list_field(&mut obj, "issues");
  string_field(&mut obj, "suggested_fix", &[]);
  string_field(&mut obj, "explanation", &[]);
  Some(obj)
}

/// Normalise a `practice_validation` response.
pub fn validations(value: Value) -> Result<Vec<Validation>> {
  let items = top_level_items(value, "validations", "practice_validation")?;
  let normalized = items
    .into_iter()
    .filter_map(|item| match item {
      Value::Object(obj) => validation(obj),
      _ => None,
    })
    .map(Value::Object)
    .collect();
  decode(Value::Array(normalized), "practice_validation")
}
