//! SMTP replies and their parsing.

use crate::error::{Error, Result};

/// SMTP reply from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines, without code and separator.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Parses a reply from its lines (CRLF already stripped).
    ///
    /// SMTP replies can be single-line or multi-line:
    /// - Single: `250 OK`
    /// - Multi: `250-First line`, `250-Second line`, `250 Last line`
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is empty, a line is malformed, or the
    /// lines do not share one code.
    pub fn parse(lines: &[String]) -> Result<Self> {
        let first = lines
            .first()
            .ok_or_else(|| Error::Protocol("Empty reply".into()))?;
        let code = parse_code(first)?;

        let mut message = Vec::with_capacity(lines.len());
        for line in lines {
            if parse_code(line)? != code {
                return Err(Error::Protocol(format!(
                    "Reply code changed mid-reply: {line}"
                )));
            }
            match line.get(3..) {
                Some("") => message.push(String::new()),
                Some(rest) if rest.starts_with([' ', '-']) => message.push(rest[1..].to_string()),
                _ => return Err(Error::Protocol(format!("Malformed reply line: {line}"))),
            }
        }

        Ok(Self::new(code, message))
    }

    /// Returns true if `line` ends a (possibly multi-line) reply.
    ///
    /// Continuation lines use `-` after the code; the last line uses a space
    /// or nothing at all.
    #[must_use]
    pub fn is_last_line(line: &str) -> bool {
        match line.as_bytes() {
            [_, _, _] => true,
            [_, _, _, sep, ..] => *sep == b' ',
            _ => false,
        }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Converts the reply into an error carrying its code and text.
    #[must_use]
    pub fn into_error(self) -> Error {
        Error::smtp_error(self.code.as_u16(), self.message_text())
    }
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    line.get(..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse::<u16>().ok())
        .map(ReplyCode::new)
        .ok_or_else(|| Error::Protocol(format!("Invalid reply code: {line}")))
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication succeeded
    pub const AUTH_SUCCESS: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);

    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_single_line_reply() {
        let reply = Reply::parse(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let reply = Reply::parse(&lines(&[
            "250-smtp.example.com",
            "250-AUTH PLAIN LOGIN",
            "250 SIZE 35882577",
        ]))
        .unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.message,
            vec!["smtp.example.com", "AUTH PLAIN LOGIN", "SIZE 35882577"]
        );
        assert_eq!(
            reply.message_text(),
            "smtp.example.com\nAUTH PLAIN LOGIN\nSIZE 35882577"
        );
    }

    #[test]
    fn test_parse_code_only() {
        let reply = Reply::parse(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Reply::parse(&[]).is_err());
        assert!(Reply::parse(&lines(&["25"])).is_err());
        assert!(Reply::parse(&lines(&["ABC OK"])).is_err());
        assert!(Reply::parse(&lines(&["250xOK"])).is_err());
        assert!(Reply::parse(&lines(&["250-one", "251 two"])).is_err());
        assert!(Reply::parse(&lines(&["2é0 OK"])).is_err());
    }

    #[test]
    fn test_is_last_line() {
        assert!(Reply::is_last_line("250 OK"));
        assert!(Reply::is_last_line("250"));
        assert!(!Reply::is_last_line("250-Continuing"));
        assert!(!Reply::is_last_line("25"));
    }

    #[test]
    fn test_into_error() {
        let reply = Reply::parse(&lines(&["550 No such user"])).unwrap();
        let err = reply.into_error();
        assert!(err.is_permanent());
        assert_eq!(err.to_string(), "SMTP error 550: No such user");
    }

    #[test]
    fn test_code_classes() {
        assert!(ReplyCode::OK.is_success());
        assert!(ReplyCode::AUTH_SUCCESS.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(ReplyCode::AUTH_CONTINUE.is_intermediate());
        assert!(!ReplyCode::new(550).is_success());
        assert_eq!(ReplyCode::CLOSING.to_string(), "221");
    }
}
