//! Source-document references.
//!
//! A Google Doc can be reached through many URL shapes (`/edit`, `/view`,
//! `?usp=sharing`, `#heading=...`). They are folded into one canonical URI so
//! the document registry keeps a single row per doc.

const GOOGLE_DOC_MARKER: &str = "docs.google.com/document/";

/// Extract the document id from a Google Docs URL.
///
/// Accepts `.../document/d/<id>/...` and `.../document/u/<n>/d/<id>/...`.
pub fn google_doc_id(url: &str) -> Option<&str> {
  let rest = &url[url.find(GOOGLE_DOC_MARKER)? + GOOGLE_DOC_MARKER.len()..];
  let mut segments = rest.split(['/', '?', '#']);
  while let Some(segment) = segments.next() {
    if segment == "d" {
      return segments
        .next()
        .filter(|id| !id.is_empty() && id.chars().all(is_doc_id_char));
    }
  }
  None
}

fn is_doc_id_char(c: char) -> bool { c.is_ascii_alphanumeric() || c == '-' || c == '_' }

/// The canonical source URI for a user-supplied Google Docs URL.
///
/// Unrecognised URLs are returned trimmed and otherwise untouched.
pub fn canonical_google_doc_uri(url: &str) -> String {
  let url = url.trim();
  match google_doc_id(url) {
    Some(id) => format!("https://docs.google.com/document/d/{id}"),
    None => url.to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_variants_share_a_canonical_uri() {
    let expected = "https://docs.google.com/document/d/1AbC-x_9";
    for url in [
      "https://docs.google.com/document/d/1AbC-x_9/edit",
      "https://docs.google.com/document/d/1AbC-x_9/edit?usp=sharing",
      "https://docs.google.com/document/d/1AbC-x_9#heading=h.1",
      "  https://docs.google.com/document/u/0/d/1AbC-x_9/view ",
    ] {
      assert_eq!(canonical_google_doc_uri(url), expected, "{url}");
    }
  }

  #[test]
  fn unrecognised_urls_pass_through_trimmed() {
    assert_eq!(canonical_google_doc_uri(" https://example.com/notes "), "https://example.com/notes");
    assert_eq!(google_doc_id("https://docs.google.com/document/d/"), None);
  }
}
