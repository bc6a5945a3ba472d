//! Plain-text alternative derived from an HTML body.

use crate::error::{Error, Result};

/// Output width handed to the renderer.
///
/// Matches the SMTP line limit so the renderer never wraps paragraphs
/// itself; line length is handled by the quoted-printable stage.
const TEXT_WIDTH: usize = 998;

/// Converts an HTML document into its plain-text alternative.
pub trait TextReducer {
    /// Reduces `html` to plain text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reduction`] if the document cannot be converted.
    fn reduce(&self, html: &str) -> Result<String>;
}

impl<F> TextReducer for F
where
    F: Fn(&str) -> Result<String>,
{
    fn reduce(&self, html: &str) -> Result<String> {
        self(html)
    }
}

/// Default reducer backed by `html2text`.
///
/// Markup is stripped and entities are decoded. Tables are flattened to
/// one cell per line, without borders or column layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlToText;

impl TextReducer for HtmlToText {
    fn reduce(&self, html: &str) -> Result<String> {
        let text = html2text::config::plain()
            .raw_mode(true)
            .string_from_read(html.as_bytes(), TEXT_WIDTH)
            .map_err(|e| Error::Reduction(e.to_string()))?;

        Ok(text.trim_matches(['\r', '\n']).to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup() {
        let text = HtmlToText
            .reduce("<html><body><p>Hello <b>Bob</b></p></body></html>")
            .unwrap();
        assert!(text.contains("Hello"));
        assert!(text.contains("Bob"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_decodes_entities() {
        let text = HtmlToText.reduce("<p>Fish &amp; Chips</p>").unwrap();
        assert!(text.contains("Fish & Chips"));
    }

    #[test]
    fn test_keeps_paragraphs_apart() {
        let text = HtmlToText.reduce("<p>first</p><p>second</p>").unwrap();
        let first = text.find("first").unwrap();
        let second = text.find("second").unwrap();
        assert!(text[first..second].contains('\n'));
    }

    #[test]
    fn test_no_surrounding_blank_lines() {
        let text = HtmlToText.reduce("<div><p>only</p></div>").unwrap();
        assert!(!text.starts_with('\n'));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_closure_reducer() {
        let upper = |html: &str| -> Result<String> { Ok(html.to_uppercase()) };
        assert_eq!(upper.reduce("abc").unwrap(), "ABC");
    }
}
