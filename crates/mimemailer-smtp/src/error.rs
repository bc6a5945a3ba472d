//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS setup failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Server returned error response.
    #[error("SMTP error {code}: {message}")]
    SmtpError {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message exceeds the size advertised by the server.
    #[error("Message exceeds size limit: {size} bytes (limit {limit})")]
    MessageTooLarge {
        /// Message size in bytes.
        size: usize,
        /// Limit advertised in the EHLO `SIZE` extension.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// The server did not answer in time.
    #[error("Timed out waiting for the server")]
    Timeout,
}

impl Error {
    /// Creates an SMTP error from a reply code and message.
    #[must_use]
    pub fn smtp_error(code: u16, message: impl Into<String>) -> Self {
        Self::SmtpError {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::SmtpError { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::smtp_error(550, "no such user").is_permanent());
        assert!(Error::smtp_error(451, "try later").is_transient());
        assert!(!Error::Timeout.is_permanent());
        assert!(!Error::Timeout.is_transient());
    }

    #[test]
    fn test_display() {
        let err = Error::smtp_error(535, "bad credentials");
        assert_eq!(err.to_string(), "SMTP error 535: bad credentials");
    }
}
