//! Composing and sending through an SMTP session.

use crate::config::{Config, Security};
use crate::error::{Error, Result};
use mimemailer_mime::{ComposedMessage, Composer, Email, MessageTemplate, SenderIdentity};
use mimemailer_smtp::connection::{connect, connect_tls};
use mimemailer_smtp::{Address, Client, SmtpStream};
use tokio::io::{AsyncRead, AsyncWrite};

/// Sends HTML email through one configured SMTP server.
///
/// The sender identity is fixed when the mailer is created. Connections are
/// opened explicitly with [`connect`](Self::connect), or per message with
/// [`send_email`](Self::send_email).
#[derive(Debug, Clone)]
pub struct Mailer {
    config: Config,
    sender: SenderIdentity,
    envelope_from: Address,
    composer: Composer,
}

impl Mailer {
    /// Creates a mailer from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] with every problem found in `config`.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        let envelope_from = Address::new(&config.sender_address)?;
        let sender = SenderIdentity::new(&config.sender_name, &config.sender_address);

        Ok(Self {
            config,
            sender,
            envelope_from,
            composer: Composer::new(),
        })
    }

    /// Uses a different message template.
    #[must_use]
    pub fn template(mut self, template: MessageTemplate) -> Self {
        self.composer = self.composer.template(template);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Composes `email` without sending it.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTML cannot be reduced to text or the message
    /// cannot be rendered.
    pub fn compose(&self, email: &Email) -> Result<ComposedMessage> {
        Ok(self.composer.compose(email, &self.sender)?)
    }

    /// Opens an authenticated session.
    ///
    /// Connects with the configured security mode, sends EHLO, upgrades with
    /// STARTTLS when configured, then authenticates.
    ///
    /// # Errors
    ///
    /// Returns an error if any of those steps fail.
    pub async fn connect(&self) -> Result<Session<'_>> {
        let Config {
            host,
            port,
            security,
            helo_name,
            connect_timeout,
            io_timeout,
            ..
        } = &self.config;

        let stream = match security {
            Security::Tls => connect_tls(host, *port, *connect_timeout).await?,
            Security::StartTls | Security::None => connect(host, *port, *connect_timeout).await?,
        };

        let mut client = Client::from_stream(stream, *io_timeout).await?;
        client.ehlo(helo_name).await?;
        if *security == Security::StartTls {
            client = client.starttls(host, helo_name).await?;
        }

        self.login(client).await
    }

    /// Opens an authenticated session over a stream the caller has already
    /// connected and, if needed, secured.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting, EHLO or authentication fails.
    pub async fn connect_stream<S>(&self, stream: S) -> Result<Session<'_, S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut client = Client::from_stream(stream, self.config.io_timeout).await?;
        client.ehlo(&self.config.helo_name).await?;
        self.login(client).await
    }

    async fn login<S>(&self, mut client: Client<S>) -> Result<Session<'_, S>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        client
            .authenticate(&self.config.username, &self.config.password)
            .await?;
        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            security = ?self.config.security,
            "SMTP session established"
        );

        Ok(Session {
            mailer: self,
            client,
        })
    }

    /// Sends one email over a session opened for this message alone.
    ///
    /// # Errors
    ///
    /// Returns an error if composing, connecting or sending fails.
    pub async fn send_email(&self, email: &Email) -> Result<()> {
        // Compose first so a bad message never opens a connection.
        let message = self.compose(email)?;
        let mut session = self.connect().await?;
        let result = session.send_composed(&email.to_address, &message).await;
        let closed = session.disconnect().await;
        result.and(closed)
    }
}

/// An authenticated SMTP session.
///
/// Messages are sent one after another. [`disconnect`](Self::disconnect)
/// consumes the session, so a closed session cannot be used.
#[derive(Debug)]
pub struct Session<'a, S = SmtpStream> {
    mailer: &'a Mailer,
    client: Client<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<'_, S> {
    /// Composes `email` and sends it.
    ///
    /// # Errors
    ///
    /// Returns an error if composing fails or the server rejects the
    /// message. After a rejection the session can still be used.
    pub async fn send(&mut self, email: &Email) -> Result<()> {
        let message = self.mailer.compose(email)?;
        self.send_composed(&email.to_address, &message).await
    }

    /// Sends an already composed message to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if `to` is not a valid address or the server
    /// rejects the message.
    pub async fn send_composed(&mut self, to: &str, message: &ComposedMessage) -> Result<()> {
        let recipient = Address::new(to)?;
        self.client
            .send_mail(&self.mailer.envelope_from, &recipient, message.as_bytes())
            .await?;
        tracing::info!(to = %recipient, bytes = message.len(), "Email sent");
        Ok(())
    }

    /// Checks that the server is still answering.
    ///
    /// # Errors
    ///
    /// Returns an error if the NOOP command fails.
    pub async fn noop(&mut self) -> Result<()> {
        Ok(self.client.noop().await?)
    }

    /// Sends QUIT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn disconnect(self) -> Result<()> {
        self.client.quit().await?;
        tracing::info!(host = %self.mailer.config.host, "SMTP session closed");
        Ok(())
    }
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
    use crate::config::ValidationError;
    use chrono::{TimeZone, Utc};
    use tokio_test::io::{Builder, Mock};

    const GREETING: &[u8] = b"220 smtp.example.com ESMTP\r\n";
    const EHLO: &[u8] = b"EHLO localhost\r\n";
    const EHLO_REPLY: &[u8] = b"250-smtp.example.com\r\n250 AUTH PLAIN\r\n";
    // "\0user\0secret"
    const AUTH: &[u8] = b"AUTH PLAIN AHVzZXIAc2VjcmV0\r\n";

    fn mailer() -> Mailer {
        Mailer::new(
            Config::builder("smtp.example.com")
                .credentials("user", "secret")
                .sender("Sender Name", "sender@example.com")
                .build(),
        )
        .unwrap()
    }

    fn email() -> Email {
        Email::new(
            "rcpt@example.com",
            "Recipient",
            "Hello",
            "<p>Hello there</p>",
        )
        .date(&Utc.with_ymd_and_hms(2009, 11, 10, 23, 0, 0).unwrap())
    }

    fn logged_in(builder: &mut Builder) -> &mut Builder {
        builder
            .read(GREETING)
            .write(EHLO)
            .read(EHLO_REPLY)
            .write(AUTH)
            .read(b"235 ok\r\n")
    }

    fn data_block(message: &ComposedMessage) -> Vec<u8> {
        let mut data = message.as_bytes().to_vec();
        data.extend_from_slice(b".\r\n");
        data
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let err = Mailer::new(Config::builder("").build()).unwrap_err();
        match err {
            Error::Config(errors) => {
                assert!(errors.contains(&ValidationError::EmptyHost));
                assert!(errors.contains(&ValidationError::EmptyUsername));
                assert!(errors.contains(&ValidationError::EmptySenderAddress));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compose_uses_configured_sender() {
        let message = mailer().compose(&email()).unwrap();
        let text = String::from_utf8(message.into_bytes()).unwrap();
        assert!(text.starts_with(
            "Subject: Hello\r\nFrom: \"Sender Name\" <sender@example.com>\r\n\
             To: \"Recipient\" <rcpt@example.com>\r\n"
        ));
    }

    #[tokio::test]
    async fn test_session_send_and_disconnect() {
        let mailer = mailer();
        let message = mailer.compose(&email()).unwrap();
        let data = data_block(&message);

        let mock = logged_in(&mut Builder::new())
            .write(b"MAIL FROM:<sender@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<rcpt@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(&data)
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let mut session: Session<'_, Mock> = mailer.connect_stream(mock).await.unwrap();
        session.send(&email()).await.unwrap();
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_session_survives_rejected_recipient() {
        let mailer = mailer();
        let message = mailer.compose(&email()).unwrap();

        let mock = logged_in(&mut Builder::new())
            .write(b"MAIL FROM:<sender@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 No such user\r\n")
            .write(b"RSET\r\n")
            .read(b"250 OK\r\n")
            .write(b"NOOP\r\n")
            .read(b"250 OK\r\n")
            .build();

        let mut session = mailer.connect_stream(mock).await.unwrap();
        let err = session
            .send_composed("nobody@example.com", &message)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Smtp(mimemailer_smtp::Error::SmtpError { code: 550, .. })
        ));
        session.noop().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_recipient_sends_nothing() {
        let mailer = mailer();
        let message = mailer.compose(&email()).unwrap();

        let mock = logged_in(&mut Builder::new()).build();
        let mut session = mailer.connect_stream(mock).await.unwrap();
        let err = session
            .send_composed("rcpt@example.com>\r\nDATA", &message)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Smtp(mimemailer_smtp::Error::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_authentication_failure() {
        let mailer = mailer();
        let mock = Builder::new()
            .read(GREETING)
            .write(EHLO)
            .read(EHLO_REPLY)
            .write(AUTH)
            .read(b"535 Authentication failed\r\n")
            .build();

        let err = mailer.connect_stream(mock).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Smtp(mimemailer_smtp::Error::SmtpError { code: 535, .. })
        ));
    }
}
