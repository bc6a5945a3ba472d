//! Turns an HTML email into a wire-ready multipart/alternative message.

use crate::encoding::{encode_quoted_printable, normalize_crlf};
use crate::error::Result;
use crate::template::{MessageTemplate, RenderContext};
use crate::text::{HtmlToText, TextReducer};
use chrono::{DateTime, FixedOffset, Local, TimeZone};

/// RFC 1123 date with a numeric zone, e.g. `Tue, 10 Nov 2009 23:00:00 +0000`.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Content and addressing for a single email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// Recipient address.
    pub to_address: String,
    /// Recipient display name.
    pub to_name: String,
    /// Subject line.
    pub subject: String,
    /// HTML body; the plain-text part is derived from it.
    pub html: String,
    /// Value of the `Date` header.
    pub date: DateTime<FixedOffset>,
    /// Value of the `List-Unsubscribe` header, e.g.
    /// `<mailto:unsubscribe@example.com?subject=unsubscribe-request>`.
    /// Left out of the message when empty.
    pub list_unsubscribe: String,
}

impl Email {
    /// Creates an email dated now, without a `List-Unsubscribe` header.
    #[must_use]
    pub fn new(
        to_address: impl Into<String>,
        to_name: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            to_address: to_address.into(),
            to_name: to_name.into(),
            subject: subject.into(),
            html: html.into(),
            date: Local::now().fixed_offset(),
            list_unsubscribe: String::new(),
        }
    }

    /// Sets the `Date` header.
    #[must_use]
    pub fn date<Tz: TimeZone>(mut self, date: &DateTime<Tz>) -> Self {
        self.date = date.fixed_offset();
        self
    }

    /// Sets the `List-Unsubscribe` header.
    #[must_use]
    pub fn list_unsubscribe(mut self, value: impl Into<String>) -> Self {
        self.list_unsubscribe = value.into();
        self
    }
}

/// Name and address used in the `From` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderIdentity {
    /// Display name.
    pub name: String,
    /// Email address.
    pub address: String,
}

impl SenderIdentity {
    /// Creates a sender identity.
    #[must_use]
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// A finished message with CRLF line endings throughout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedMessage(Vec<u8>);

impl ComposedMessage {
    /// Returns the message bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the message and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Returns the message length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the message has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for ComposedMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<ComposedMessage> for Vec<u8> {
    fn from(message: ComposedMessage) -> Self {
        message.0
    }
}

/// Formats a header mailbox as `"Name" <address>`.
///
/// Backslashes and double quotes in the name are escaped. An empty name
/// yields `<address>`.
#[must_use]
pub fn format_address(name: &str, address: &str) -> String {
    if name.is_empty() {
        return format!("<{address}>");
    }

    let mut out = String::with_capacity(name.len() + address.len() + 5);
    out.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("\" <");
    out.push_str(address);
    out.push('>');
    out
}

/// Formats a `Date` header value.
#[must_use]
pub fn format_date<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format(DATE_FORMAT).to_string()
}

/// Composes messages from HTML emails.
///
/// Composition is a pure pipeline: the plain text is derived, both bodies
/// are quoted-printable encoded, the template is rendered, and the line
/// endings are normalized to CRLF. Any failure aborts the whole message.
#[derive(Debug, Clone, Default)]
pub struct Composer<R = HtmlToText> {
    reducer: R,
    template: MessageTemplate,
}

impl Composer {
    /// Creates a composer using [`HtmlToText`] and the default template.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            reducer: HtmlToText,
            template: MessageTemplate::DEFAULT,
        }
    }
}

impl<R: TextReducer> Composer<R> {
    /// Creates a composer with a custom HTML-to-text reducer.
    #[must_use]
    pub const fn with_reducer(reducer: R) -> Self {
        Self {
            reducer,
            template: MessageTemplate::DEFAULT,
        }
    }

    /// Replaces the message template.
    #[must_use]
    pub fn template(mut self, template: MessageTemplate) -> Self {
        self.template = template;
        self
    }

    /// Composes `email` as sent by `sender`.
    ///
    /// # Errors
    ///
    /// Returns the reducer, encoder or renderer error unchanged.
    pub fn compose(&self, email: &Email, sender: &SenderIdentity) -> Result<ComposedMessage> {
        let text = self.reducer.reduce(&email.html)?;

        let text_qp = encode_quoted_printable(text.as_bytes())?;
        let html_qp = encode_quoted_printable(email.html.as_bytes())?;

        let ctx = RenderContext {
            from: format_address(&sender.name, &sender.address),
            to: format_address(&email.to_name, &email.to_address),
            subject: email.subject.clone(),
            date: format_date(&email.date),
            list_unsubscribe: email.list_unsubscribe.clone(),
            html_qp,
            text_qp,
        };

        let mixed = self.template.render(&ctx)?;
        Ok(ComposedMessage(normalize_crlf(&mixed)))
    }
}

/// Composes `email` with the default [`Composer`].
///
/// # Errors
///
/// Returns the reducer, encoder or renderer error unchanged.
pub fn compose(email: &Email, sender: &SenderIdentity) -> Result<ComposedMessage> {
    Composer::new().compose(email, sender)
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
    use crate::error::Error;
    use chrono::Utc;

    fn email() -> Email {
        Email::new("bob@example.com", "Bob Smith", "Hello", "<p>Hi Bob</p>")
            .date(&Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0).unwrap())
    }

    fn sender() -> SenderIdentity {
        SenderIdentity::new("Alice", "alice@example.com")
    }

    #[test]
    fn test_format_address() {
        assert_eq!(
            format_address("Test Recipient", "test@example.com"),
            "\"Test Recipient\" <test@example.com>"
        );
        assert_eq!(
            format_address("Say \"Hi\" \\o/", "a@example.com"),
            "\"Say \\\"Hi\\\" \\\\o/\" <a@example.com>"
        );
        assert_eq!(format_address("", "a@example.com"), "<a@example.com>");
    }

    #[test]
    fn test_format_date() {
        let utc = Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0).unwrap();
        assert_eq!(format_date(&utc), "Tue, 10 Nov 2009 23:00:00 +0000");

        let offset = FixedOffset::east_opt(-5 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 3, 5, 8, 7, 6).unwrap();
        assert_eq!(format_date(&local), "Tue, 05 Mar 2024 08:07:06 -0500");
    }

    #[test]
    fn test_email_builder() {
        let email = email().list_unsubscribe("<mailto:u@example.com>");
        assert_eq!(email.list_unsubscribe, "<mailto:u@example.com>");
        assert_eq!(email.date.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_reducer_error_propagates() {
        let composer = Composer::with_reducer(|_: &str| -> Result<String> {
            Err(Error::Reduction("unparseable".into()))
        });
        let err = composer.compose(&email(), &sender()).unwrap_err();
        assert!(matches!(err, Error::Reduction(msg) if msg == "unparseable"));
    }

    #[test]
    fn test_headers_in_order() {
        let composer = Composer::with_reducer(|_: &str| -> Result<String> { Ok("Hi Bob".into()) });
        let message = composer.compose(&email(), &sender()).unwrap();
        let text = String::from_utf8(message.into_bytes()).unwrap();
        assert!(text.starts_with(
            "Subject: Hello\r\n\
From: \"Alice\" <alice@example.com>\r\n\
To: \"Bob Smith\" <bob@example.com>\r\n\
Date: Tue, 10 Nov 2009 23:00:00 +0000\r\n\
MIME-Version: 1.0\r\n"
        ));
    }

    #[test]
    fn test_custom_template() {
        let template = MessageTemplate::with_boundary("alt-7f3a").unwrap();
        let composer = Composer::new().template(template);
        let message = composer.compose(&email(), &sender()).unwrap();
        let text = String::from_utf8(message.into_bytes()).unwrap();
        assert!(text.contains("boundary=alt-7f3a\r\n"));
        assert!(text.ends_with("--alt-7f3a--\r\n"));
    }

    #[test]
    fn test_composed_message_accessors() {
        let message = compose(&email(), &sender()).unwrap();
        assert!(!message.is_empty());
        assert_eq!(message.len(), message.as_bytes().len());
        assert_eq!(message.as_ref(), message.as_bytes());
    }
}
