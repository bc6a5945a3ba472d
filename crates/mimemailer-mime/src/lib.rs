//! # mimemailer-mime
//!
//! Builds RFC 2045/2046 multipart/alternative messages from an HTML body.
//!
//! ## Features
//!
//! - **Plain-text alternative**: derived from the HTML body with `html2text`
//! - **Quoted-Printable**: both parts are encoded per RFC 2045 §6.7
//! - **Line endings**: the final message uses CRLF throughout
//! - **Pure**: composition performs no I/O and keeps no shared state
//!
//! ## Quick Start
//!
//! ```ignore
//! use chrono::{TimeZone, Utc};
//! use mimemailer_mime::{compose, Email, SenderIdentity};
//!
//! let email = Email::new(
//!     "test@example.com",
//!     "Test Recipient",
//!     "Test Email",
//!     "<html><p>Hello 🌍</p></html>",
//! )
//! .date(&Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0).unwrap());
//!
//! let sender = SenderIdentity::new("Sender Name", "sender@example.com");
//! let message = compose(&email, &sender)?;
//! ```
//!
//! The message above starts like this:
//!
//! ```text
//! Subject: Test Email
//! From: "Sender Name" <sender@example.com>
//! To: "Test Recipient" <test@example.com>
//! Date: Tue, 10 Nov 2009 23:00:00 +0000
//! MIME-Version: 1.0
//! Content-Type: multipart/alternative; boundary=boundary42
//!
//! --boundary42
//! Content-Type: text/plain; charset=utf-8
//! Content-Transfer-Encoding: quoted-printable
//!
//! Hello =F0=9F=8C=8D
//! ```
//!
//! ## Modules
//!
//! - [`encoding`]: Quoted-Printable and CRLF normalization
//! - [`template`]: The fixed message layout
//! - [`text`]: HTML to plain-text reduction

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod compose;
mod error;

pub mod encoding;
pub mod template;
pub mod text;

pub use compose::{
    ComposedMessage, Composer, Email, SenderIdentity, compose, format_address, format_date,
};
pub use error::{Error, Result};
pub use template::{DEFAULT_BOUNDARY, MessageTemplate, RenderContext};
pub use text::{HtmlToText, TextReducer};
