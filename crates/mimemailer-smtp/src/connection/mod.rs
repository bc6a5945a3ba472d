//! SMTP connection management.

mod client;
mod stream;

pub use client::{Client, dot_stuff};
pub use stream::{SmtpStream, connect, connect_tls};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;
use std::mem::discriminant;

/// Server capabilities from the greeting and EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    ///
    /// Only the kind of extension is compared, so `Extension::Size(None)`
    /// matches any advertised SIZE.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions
            .iter()
            .any(|known| discriminant(known) == discriminant(ext))
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised.
    ///
    /// `SIZE 0` means no fixed limit.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(Some(size)) if *size > 0 => Some(*size),
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms in advertised order.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(lines: &[&str]) -> ServerInfo {
        ServerInfo {
            hostname: "smtp.example.com".into(),
            extensions: lines.iter().map(|line| Extension::parse(line)).collect(),
        }
    }

    #[test]
    fn test_supports_matches_kind() {
        let info = info(&["SIZE 1024", "STARTTLS"]);
        assert!(info.supports(&Extension::Size(None)));
        assert!(info.supports_starttls());
        assert!(!info.supports(&Extension::Pipelining));
    }

    #[test]
    fn test_max_message_size() {
        assert_eq!(info(&["SIZE 1024"]).max_message_size(), Some(1024));
        assert_eq!(info(&["SIZE 0"]).max_message_size(), None);
        assert_eq!(info(&["SIZE"]).max_message_size(), None);
        assert_eq!(info(&[]).max_message_size(), None);
    }

    #[test]
    fn test_auth_mechanisms() {
        let info = info(&["AUTH LOGIN PLAIN CRAM-MD5"]);
        assert_eq!(
            info.auth_mechanisms(),
            vec![AuthMechanism::Login, AuthMechanism::Plain]
        );
        assert!(ServerInfo::default().auth_mechanisms().is_empty());
    }
}
