//! Fixed multipart/alternative message template.

use crate::error::{Error, Result};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Boundary used when no other boundary is configured.
pub const DEFAULT_BOUNDARY: &str = "boundary42";

/// Longest boundary allowed by RFC 2046.
const MAX_BOUNDARY_LENGTH: usize = 70;

/// Finished header values and encoded bodies for one message.
///
/// Every field is inserted into the template exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    /// `From` header value.
    pub from: String,
    /// `To` header value.
    pub to: String,
    /// `Subject` header value.
    pub subject: String,
    /// `Date` header value.
    pub date: String,
    /// `List-Unsubscribe` header value; omitted when empty.
    pub list_unsubscribe: String,
    /// Quoted-printable HTML body.
    pub html_qp: String,
    /// Quoted-printable plain-text body.
    pub text_qp: String,
}

/// The message layout: headers, then a text part and an HTML part.
///
/// The boundary is only required to be unique within one message, so a
/// single constant is shared by every message. It is not checked against
/// the encoded bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    boundary: Cow<'static, str>,
}

impl Default for MessageTemplate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl MessageTemplate {
    /// Template using [`DEFAULT_BOUNDARY`].
    pub const DEFAULT: Self = Self {
        boundary: Cow::Borrowed(DEFAULT_BOUNDARY),
    };

    /// Creates a template with a custom multipart boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBoundary`] if the boundary is empty, longer than
    /// 70 characters, ends in a space, or contains characters outside the
    /// RFC 2046 `bchars` set.
    pub fn with_boundary(boundary: impl Into<Cow<'static, str>>) -> Result<Self> {
        let boundary = boundary.into();
        validate_boundary(&boundary)?;
        Ok(Self { boundary })
    }

    /// Returns the multipart boundary.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Renders the message.
    ///
    /// Template lines end in LF while the encoded bodies keep their own
    /// line endings, so the result still needs CRLF normalization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if formatting fails.
    pub fn render(&self, ctx: &RenderContext) -> Result<Vec<u8>> {
        let mut out = String::with_capacity(512 + ctx.text_qp.len() + ctx.html_qp.len());
        self.write_message(&mut out, ctx)
            .map_err(|e| Error::Render(e.to_string()))?;
        Ok(out.into_bytes())
    }

    fn write_message(&self, out: &mut String, ctx: &RenderContext) -> std::fmt::Result {
        let boundary = self.boundary();

        writeln!(out, "Subject: {}", ctx.subject)?;
        writeln!(out, "From: {}", ctx.from)?;
        writeln!(out, "To: {}", ctx.to)?;
        writeln!(out, "Date: {}", ctx.date)?;
        if !ctx.list_unsubscribe.is_empty() {
            writeln!(out, "List-Unsubscribe: {}", ctx.list_unsubscribe)?;
        }
        writeln!(out, "MIME-Version: 1.0")?;
        if boundary.chars().all(is_token_char) {
            writeln!(out, "Content-Type: multipart/alternative; boundary={boundary}")?;
        } else {
            writeln!(out, "Content-Type: multipart/alternative; boundary=\"{boundary}\"")?;
        }
        writeln!(out)?;

        write_part(out, boundary, "text/plain", &ctx.text_qp)?;
        write_part(out, boundary, "text/html", &ctx.html_qp)?;

        writeln!(out, "--{boundary}--")
    }
}

fn write_part(out: &mut String, boundary: &str, mime_type: &str, body: &str) -> std::fmt::Result {
    writeln!(out, "--{boundary}")?;
    writeln!(out, "Content-Type: {mime_type}; charset=utf-8")?;
    writeln!(out, "Content-Transfer-Encoding: quoted-printable")?;
    writeln!(out)?;
    writeln!(out, "{body}")?;
    writeln!(out)
}

const fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '\'' | '+' | '_' | '-' | '.')
}

fn validate_boundary(boundary: &str) -> Result<()> {
    if boundary.is_empty() {
        return Err(Error::InvalidBoundary("boundary cannot be empty".into()));
    }
    if boundary.len() > MAX_BOUNDARY_LENGTH {
        return Err(Error::InvalidBoundary(format!(
            "boundary exceeds {MAX_BOUNDARY_LENGTH} characters"
        )));
    }
    if boundary.ends_with(' ') {
        return Err(Error::InvalidBoundary(
            "boundary cannot end with a space".into(),
        ));
    }
    if let Some(c) = boundary
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(*c)))
    {
        return Err(Error::InvalidBoundary(format!("invalid character {c:?}")));
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn context() -> RenderContext {
        RenderContext {
            from: "\"A\" <a@example.com>".into(),
            to: "\"B\" <b@example.com>".into(),
            subject: "Hi".into(),
            date: "Tue, 10 Nov 2009 23:00:00 +0000".into(),
            list_unsubscribe: String::new(),
            html_qp: "<p>hi</p>".into(),
            text_qp: "hi".into(),
        }
    }

    #[test]
    fn test_render_layout() {
        let rendered = MessageTemplate::DEFAULT.render(&context()).unwrap();
        let expected = "Subject: Hi\n\
From: \"A\" <a@example.com>\n\
To: \"B\" <b@example.com>\n\
Date: Tue, 10 Nov 2009 23:00:00 +0000\n\
MIME-Version: 1.0\n\
Content-Type: multipart/alternative; boundary=boundary42\n\
\n\
--boundary42\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
hi\n\
\n\
--boundary42\n\
Content-Type: text/html; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
<p>hi</p>\n\
\n\
--boundary42--\n";
        assert_eq!(String::from_utf8(rendered).unwrap(), expected);
    }

    #[test]
    fn test_list_unsubscribe_follows_date() {
        let mut ctx = context();
        ctx.list_unsubscribe = "<mailto:unsubscribe@example.com>".into();
        let rendered = String::from_utf8(MessageTemplate::DEFAULT.render(&ctx).unwrap()).unwrap();
        assert!(rendered.contains(
            "Date: Tue, 10 Nov 2009 23:00:00 +0000\nList-Unsubscribe: <mailto:unsubscribe@example.com>\nMIME-Version: 1.0\n"
        ));
    }

    #[test]
    fn test_list_unsubscribe_omitted_when_empty() {
        let rendered =
            String::from_utf8(MessageTemplate::DEFAULT.render(&context()).unwrap()).unwrap();
        assert!(!rendered.contains("List-Unsubscribe"));
    }

    #[test]
    fn test_custom_boundary() {
        let template = MessageTemplate::with_boundary("=_part_7f3a").unwrap();
        let rendered = String::from_utf8(template.render(&context()).unwrap()).unwrap();
        assert!(rendered.contains("boundary=\"=_part_7f3a\"\n"));
        assert!(rendered.ends_with("--=_part_7f3a--\n"));
        assert_eq!(rendered.matches("--=_part_7f3a\n").count(), 2);
    }

    #[test]
    fn test_invalid_boundaries() {
        assert!(MessageTemplate::with_boundary("").is_err());
        assert!(MessageTemplate::with_boundary("x".repeat(71)).is_err());
        assert!(MessageTemplate::with_boundary("trailing ").is_err());
        assert!(MessageTemplate::with_boundary("semi;colon").is_err());
        assert!(MessageTemplate::with_boundary("x".repeat(70)).is_ok());
    }

    #[test]
    fn test_default_template() {
        assert_eq!(MessageTemplate::default().boundary(), DEFAULT_BOUNDARY);
    }
}
