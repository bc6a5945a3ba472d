#![allow(clippy::doc_markdown, clippy::uninlined_format_args)]
//! Example: send one HTML email
//!
//! ## Running
//!
//! ```bash
//! export SMTP_HOST="smtp.example.com"
//! export SMTP_SECURITY="starttls"        # tls (default), starttls or none
//! export SMTP_USERNAME="user@example.com"
//! export SMTP_PASSWORD="app-password"
//! export MAIL_TO="someone@example.com"
//! RUST_LOG=mimemailer=debug cargo run --package mimemailer --example send_html
//! ```
//!
//! Set `MAILER_CONFIG` to the path of a JSON config file to use it instead of
//! the `SMTP_*` variables.

use anyhow::{Context, bail};
use mimemailer::{Config, Email, Mailer, Security};
use std::env;
use tracing_subscriber::EnvFilter;

const HTML: &str = r#"<html>
<body>
  <h1>Hello from mimemailer</h1>
  <p>This message has an HTML part and a plain-text part.</p>
  <p>Caf&eacute; &amp; cr&egrave;me, and a <a href="https://example.com">link</a>.</p>
</body>
</html>"#;

fn config_from_env() -> anyhow::Result<Config> {
    if let Ok(path) = env::var("MAILER_CONFIG") {
        let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
        return Ok(Config::from_json(&json)?);
    }

    let security = match env::var("SMTP_SECURITY").as_deref() {
        Ok("none") => Security::None,
        Ok("starttls") => Security::StartTls,
        Ok("tls") | Err(_) => Security::Tls,
        Ok(other) => bail!("unknown SMTP_SECURITY: {other}"),
    };
    let username = env::var("SMTP_USERNAME").context("SMTP_USERNAME not set")?;

    Ok(Config::builder(env::var("SMTP_HOST").context("SMTP_HOST not set")?)
        .security(security)
        .credentials(
            &username,
            env::var("SMTP_PASSWORD").context("SMTP_PASSWORD not set")?,
        )
        .sender("mimemailer example", &username)
        .build())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mailer = Mailer::new(config_from_env()?)?;
    let to = env::var("MAIL_TO").context("MAIL_TO not set")?;

    let email = Email::new(&to, "", "mimemailer example", HTML)
        .list_unsubscribe("<mailto:unsubscribe@example.com>");

    let preview = mailer.compose(&email)?;
    println!("Composed {} bytes, sending to {}...", preview.len(), to);

    mailer.send_email(&email).await?;
    println!("Sent.");
    Ok(())
}
