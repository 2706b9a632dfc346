//! The three prompt profiles and their prompt builders.

use gongbu_core::{
  model::{GrammarPattern, Perspective},
  practice::{GenerateParams, PracticeSentence},
};
use serde_json::json;
use strum::{AsRefStr, Display};

use crate::Prompt;

/// A named prompt/response contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Profile {
  DocImport,
  PracticeGeneration,
  PracticeValidation,
}

/// Appended to every system prompt.
const JSON_ONLY: &str = "\
Output rules:
- Respond with exactly one JSON object and nothing else.
- Do not use markdown. No code fences, headings, bullet lists or commentary.
- Use empty arrays when nothing applies; never omit a required key.";

// ─── doc_import ──────────────────────────────────────────────────────────────

const DOC_IMPORT_SYSTEM: &str = r#"You analyse Korean lesson notes for a language learner.
Extract study material from the lesson text and return JSON in this exact schema:
{ "vocabulary": [ {"lemma": "...", "pos": "...", "gloss": "..."} ],
  "sentences":  [ {"ko": "...", "gloss": "...", "vocabulary": [ {"lemma": "...", "pos": "..."} ]} ],
  "patterns":   [ {"surface_form": "...", "context_span": "...", "confidence": 0.0, "kind": "..."} ],
  "fragments":  [ {"text": "...", "label": "..."} ] }
Rules:
- lemma is the dictionary form of a Korean word (e.g. 먹다, not 먹었어요); pos is its part of speech in Korean.
- sentences are complete Korean sentences taken from the text; gloss is an English translation.
- Each sentence lists the lemmas it uses in its own vocabulary array.
- surface_form is a grammar pattern as a teacher would write it (e.g. -았/었어요); context_span is the shortest span of the text that shows it in use.
- When a pattern matches one of the known_patterns, use its display name as surface_form.
- kind is one of: ending, particle, connective, expression.
- confidence is between 0 and 1.
- fragments keep notes worth remembering that are neither sentences nor vocabulary."#;

/// Build the `doc_import` prompt, grounding pattern names in the catalog.
pub fn doc_import_prompt(lesson_text: &str, patterns: &[GrammarPattern]) -> Prompt {
  let known: Vec<_> = patterns
    .iter()
    .map(|p| json!({ "name": p.display_name, "aliases": p.aliases }))
    .collect();
  Prompt {
    system: format!("{DOC_IMPORT_SYSTEM}\n{JSON_ONLY}"),
    user:   json!({ "lesson_text": lesson_text, "known_patterns": known }).to_string(),
  }
}

// ─── practice_generation ─────────────────────────────────────────────────────

const GENERATION_SYSTEM: &str = r#"You write new Korean practice sentences for a learner, based on their lesson notes.
Return JSON in this exact schema:
{ "sentences": [ {"ko": "...", "en": "...", "cefr_level": "A1", "topic": "...",
                  "politeness": "...", "tense": "...",
                  "vocabulary": [ {"lemma_ko": "...", "pos_ko": "..."} ]} ] }
Rules:
- Write exactly the requested count of sentences, each different from the lesson's own sentences.
- Reuse the lesson's vocabulary and grammar; stay within the target CEFR level.
- Every sentence uses the requested politeness register; politeness echoes it.
- en is a natural translation in the requested gloss language.
- tense is one of: past, present, future.
- vocabulary lists the dictionary form (lemma_ko) and Korean part of speech (pos_ko) of each content word."#;

fn perspective_rule(perspective: Perspective) -> &'static str {
  match perspective {
    Perspective::FirstPerson => "Write from the learner's own point of view (저/나).",
    Perspective::ThirdPerson => "Write about other people (친구, 선생님, 민수 ...), not the learner.",
  }
}

pub fn generation_prompt(params: &GenerateParams) -> Prompt {
  let user = json!({
    "lesson_text": params.lesson_text,
    "target_cefr": params.cefr,
    "count": params.clamped_count(),
    "perspective": params.perspective,
    "politeness": params.register,
    "gloss_language": params.gloss_lang,
  });
  Prompt {
    system: format!(
      "{GENERATION_SYSTEM}\n- {}\n{JSON_ONLY}",
      perspective_rule(params.perspective)
    ),
    user:   user.to_string(),
  }
}

// ─── practice_validation ─────────────────────────────────────────────────────

const VALIDATION_SYSTEM: &str = r#"You are a native Korean teacher reviewing machine-written practice sentences.
Judge each sentence for naturalness and correctness and return JSON in this exact schema:
{ "validations": [ {"index": 1, "naturalness_score": 0.0, "natural": true,
                    "issues": ["..."], "suggested_fix": "...", "explanation": "..."} ] }
Rules:
- One entry per sentence; index is the sentence's 1-based index from the input.
- naturalness_score is between 0 and 1; natural is true when a native speaker would say it as written.
- issues lists concrete problems (particles, conjugation, word choice, register); empty when none.
- suggested_fix is a corrected Korean sentence, only when natural is false.
- explanation is short and written in the requested gloss language."#;

pub fn validation_prompt(sentences: &[PracticeSentence], gloss_lang: &str) -> Prompt {
  let numbered: Vec<_> = sentences
    .iter()
    .enumerate()
    .map(|(i, s)| json!({ "index": i + 1, "ko": s.ko, "en": s.en }))
    .collect();
  Prompt {
    system: format!("{VALIDATION_SYSTEM}\n{JSON_ONLY}"),
    user:   json!({ "gloss_language": gloss_lang, "sentences": numbered }).to_string(),
  }
}
