//! Error types for the mailer.

use crate::config::ValidationError;
use thiserror::Error;

/// Errors that can occur while composing or sending.
#[derive(Debug, Error)]
pub enum Error {
    /// Message composition failed.
    #[error("Compose error: {0}")]
    Compose(#[from] mimemailer_mime::Error),

    /// SMTP operation failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mimemailer_smtp::Error),

    /// Configuration is incomplete or invalid.
    #[error("Invalid configuration: {}", join_messages(.0))]
    Config(Vec<ValidationError>),

    /// Configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ValidationError::message)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_every_problem() {
        let err = Error::Config(vec![
            ValidationError::EmptyHost,
            ValidationError::EmptyPassword,
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid configuration: SMTP server is required; SMTP password is required"
        );
    }

    #[test]
    fn test_smtp_error_passes_through() {
        let err = Error::from(mimemailer_smtp::Error::smtp_error(550, "No such user"));
        assert_eq!(err.to_string(), "SMTP error: SMTP error 550: No such user");
    }
}
