//! Error types for message composition.

use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
///
/// The first three variants are the composition failures. Each one is fatal
/// for the message being composed, and no partial output is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The quoted-printable encoder could not write to its output sink.
    #[error("Quoted-printable encoding failed: {0}")]
    Encoding(String),

    /// The HTML body could not be reduced to plain text.
    #[error("HTML to text conversion failed: {0}")]
    Reduction(String),

    /// The message template could not be rendered.
    #[error("Template rendering failed: {0}")]
    Render(String),

    /// Malformed quoted-printable input.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// UTF-8 decode error.
    #[error("UTF-8 decode error: {0}")]
    Utf8Decode(#[from] FromUtf8Error),

    /// The multipart boundary is not usable.
    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),
}
