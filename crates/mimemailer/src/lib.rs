//! # mimemailer
//!
//! Turns one HTML body into a multipart/alternative message and delivers it
//! over an authenticated, encrypted SMTP session.
//!
//! ## Architecture
//!
//! - [`mimemailer_mime`]: pure message composition (text reduction,
//!   Quoted-Printable, template, CRLF normalization)
//! - [`mimemailer_smtp`]: the SMTP client
//! - this crate: configuration, the [`Mailer`] and its [`Session`] handle
//!
//! ## Quick Start
//!
//! ```ignore
//! use mimemailer::{Config, Email, Mailer, Security};
//!
//! #[tokio::main]
//! async fn main() -> mimemailer::Result<()> {
//!     let config = Config::builder("smtp.example.com")
//!         .security(Security::StartTls)
//!         .credentials("user@example.com", "password")
//!         .sender("Example Sender", "user@example.com")
//!         .build();
//!     let mailer = Mailer::new(config)?;
//!
//!     let email = Email::new(
//!         "rcpt@example.com",
//!         "Recipient",
//!         "Welcome",
//!         "<h1>Hello</h1><p>Thanks for signing up.</p>",
//!     );
//!
//!     let mut session = mailer.connect().await?;
//!     session.send(&email).await?;
//!     session.disconnect().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
mod mailer;

pub use config::{Config, ConfigBuilder, Security, ValidationError};
pub use error::{Error, Result};
pub use mailer::{Mailer, Session};

pub use mimemailer_mime::{ComposedMessage, Email, MessageTemplate, SenderIdentity};
