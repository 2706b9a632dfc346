//! The practice generator and validator.
//!
//! Neither persists anything. Generation failure is the caller's problem;
//! validation is advisory and callers are expected to carry on without it.

use gongbu_core::practice::{GenerateParams, PracticeSentence, Validation};
use tracing::info;

use crate::{
  CompletionProvider, LlmError, LlmGateway, Profile, Result, normalize,
  profile::{generation_prompt, validation_prompt},
};

impl<P: CompletionProvider> LlmGateway<P> {
  /// `practice_generation`: write new sentences from the lesson text.
  ///
  /// Fails with [`LlmError::InvalidShape`] when the model returns no usable
  /// sentence. Extra sentences beyond the requested count are dropped.
  pub async fn generate_practice(&self, params: &GenerateParams) -> Result<Vec<PracticeSentence>> {
    let value = self
      .call(Profile::PracticeGeneration, generation_prompt(params))
      .await?;
    let mut sentences = normalize::generated_sentences(value)?;
    if sentences.is_empty() {
      return Err(LlmError::InvalidShape("no practice sentences".into()));
    }

    let wanted = usize::from(params.clamped_count());
    sentences.truncate(wanted);
    info!(requested = wanted, generated = sentences.len(), cefr = %params.cefr, "practice generated");
    Ok(sentences)
  }

  /// `practice_validation`: score each sentence for naturalness.
  ///
  /// Returns validations keyed by 1-based index, in whatever order and
  /// coverage the model produced.
  pub async fn validate_practice(
    &self,
    sentences: &[PracticeSentence],
    gloss_lang: &str,
  ) -> Result<Vec<Validation>> {
    if sentences.is_empty() {
      return Ok(Vec::new());
    }
    let value = self
      .call(Profile::PracticeValidation, validation_prompt(sentences, gloss_lang))
      .await?;
    normalize::validations(value)
  }
}
