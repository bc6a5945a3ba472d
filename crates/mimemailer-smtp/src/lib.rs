//! # mimemailer-smtp
//!
//! An async SMTP client implementing the part of RFC 5321 needed to deliver
//! one composed message at a time.
//!
//! ## Features
//!
//! - **Protocol**: EHLO, AUTH, MAIL FROM, RCPT TO, DATA, RSET, NOOP, QUIT
//! - **TLS**: implicit TLS (port 465) and STARTTLS, verified against the
//!   Mozilla root store
//! - **Authentication**: PLAIN and LOGIN
//! - **Extensions**: SIZE is announced and enforced before DATA
//! - **Timeouts**: every connect, read and write is bounded
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::time::Duration;
//! use mimemailer_smtp::{Address, Client};
//! use mimemailer_smtp::connection::connect;
//!
//! #[tokio::main]
//! async fn main() -> mimemailer_smtp::Result<()> {
//!     let timeout = Duration::from_secs(30);
//!     let stream = connect("smtp.example.com", 587, timeout).await?;
//!     let mut client = Client::from_stream(stream, timeout).await?;
//!     client.ehlo("client.example.com").await?;
//!
//!     let mut client = client
//!         .starttls("smtp.example.com", "client.example.com")
//!         .await?;
//!     client.authenticate("user@example.com", "password").await?;
//!
//!     let from = Address::new("sender@example.com")?;
//!     let to = Address::new("recipient@example.com")?;
//!     client
//!         .send_mail(&from, &to, b"Subject: Test\r\n\r\nHello, World!\r\n")
//!         .await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP commands and their wire form
//! - [`connection`]: Streams, the client and server capabilities
//! - [`types`]: Addresses, extensions and replies

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod types;

pub use connection::{Client, ServerInfo, SmtpStream, dot_stuff};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
