//! Text canonicalisation shared by the import and commit paths.

/// Longest sentence text kept, in characters.
pub const MAX_SENTENCE_CHARS: usize = 500;

/// Longest fragment text kept, in characters.
pub const MAX_FRAGMENT_CHARS: usize = 4000;

/// Longest lemma kept, in characters.
pub const MAX_LEMMA_CHARS: usize = 64;

/// Trim `s` and cut it to at most `max` characters. Returns `None` when
/// nothing remains.
pub fn bounded(s: &str, max: usize) -> Option<String> {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    return None;
  }
  match trimmed.char_indices().nth(max) {
    Some((cut, _)) => Some(trimmed[..cut].trim_end().to_owned()),
    None => Some(trimmed.to_owned()),
  }
}

/// The canonical stored form of a sentence.
pub fn canonical_sentence(s: &str) -> Option<String> { bounded(s, MAX_SENTENCE_CHARS) }

pub fn canonical_lemma(s: &str) -> Option<String> { bounded(s, MAX_LEMMA_CHARS) }

/// Pattern alias normal form: the surface with every whitespace character
/// removed.
pub fn alias_norm(surface: &str) -> String {
  surface.chars().filter(|c| !c.is_whitespace()).collect()
}

/// The stored text of a pattern item: `surface`, or `surface\ncontext` when
/// a non-empty context span is present.
pub fn pattern_text(surface: &str, context_span: Option<&str>) -> String {
  let surface = surface.trim();
  match context_span.map(str::trim).filter(|c| !c.is_empty()) {
    Some(context) => format!("{surface}\n{context}"),
    None => surface.to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pattern_text_without_context_is_surface() {
    assert_eq!(pattern_text("-았/었어요", None), "-았/었어요");
    assert_eq!(pattern_text("-았/었어요", Some("   ")), "-았/었어요");
  }

  #[test]
  fn pattern_text_with_context_joins_on_newline() {
    assert_eq!(
      pattern_text(" -고 싶다 ", Some("집에 가고 싶어요")),
      "-고 싶다\n집에 가고 싶어요"
    );
  }

  #[test]
  fn alias_norm_strips_all_whitespace() {
    assert_eq!(alias_norm(" -고 싶다\t"), "-고싶다");
    assert_eq!(alias_norm("-(으)ㄹ 수 있다"), "-(으)ㄹ수있다");
  }

  #[test]
  fn bounded_respects_char_boundaries() {
    assert_eq!(bounded("  사과를 먹었어요  ", 3).as_deref(), Some("사과를"));
    assert_eq!(bounded("   ", 10), None);
    assert_eq!(canonical_sentence(" 학교에 갔어요. ").as_deref(), Some("학교에 갔어요."));
  }
}
