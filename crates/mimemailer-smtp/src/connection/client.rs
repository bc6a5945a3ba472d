//! SMTP client over an established stream.

use super::{ServerInfo, SmtpStream};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};

/// Longest reply line accepted from the server.
const MAX_REPLY_LINE: usize = 4096;

/// SMTP client.
///
/// One mail transaction runs at a time. After [`send_mail`](Self::send_mail)
/// returns, successfully or not, the client is ready for the next message.
#[derive(Debug)]
pub struct Client<S> {
    stream: BufReader<S>,
    server_info: ServerInfo,
    io_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// Every later read and write must complete within `io_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(stream: S, io_timeout: Duration) -> Result<Self> {
        let mut client = Self {
            stream: BufReader::new(stream),
            server_info: ServerInfo::default(),
            io_timeout,
        };

        let greeting = client.read_reply().await?;
        if greeting.code != ReplyCode::SERVICE_READY {
            return Err(greeting.into_error());
        }

        client.server_info.hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();
        tracing::debug!(server = %client.server_info.hostname, "Greeting received");

        Ok(client)
    }

    /// Returns what the server announced about itself.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the EHLO command fails.
    pub async fn ehlo(&mut self, client_hostname: &str) -> Result<()> {
        let reply = self
            .expect_success(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        // First line is the greeting, the rest are extensions.
        self.server_info.extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect::<HashSet<_>>();
        tracing::debug!(extensions = ?self.server_info.extensions, "EHLO accepted");
        Ok(())
    }

    /// Authenticates with the best mechanism both sides support.
    ///
    /// PLAIN is preferred. LOGIN is used only when the server advertises it
    /// without PLAIN.
    ///
    /// # Errors
    ///
    /// Returns an error if neither mechanism is available or the server
    /// rejects the credentials.
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        let mechanisms = self.server_info.auth_mechanisms();
        if mechanisms.is_empty() || mechanisms.contains(&AuthMechanism::Plain) {
            self.auth_plain(username, password).await
        } else if mechanisms.contains(&AuthMechanism::Login) {
            self.auth_login(username, password).await
        } else {
            Err(Error::NotSupported("AUTH PLAIN or LOGIN".into()))
        }
    }

    /// Authenticates using the PLAIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_plain(&mut self, username: &str, password: &str) -> Result<()> {
        let credentials = format!("\0{username}\0{password}");
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some(STANDARD.encode(credentials.as_bytes())),
        };

        let reply = self.send_command(&cmd).await?;
        if reply.code != ReplyCode::AUTH_SUCCESS {
            return Err(reply.into_error());
        }
        tracing::debug!(mechanism = "PLAIN", "Authenticated");
        Ok(())
    }

    /// Authenticates using the LOGIN mechanism.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<()> {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Login,
            initial_response: None,
        };
        self.expect_code(&cmd, ReplyCode::AUTH_CONTINUE).await?;

        let cmd = Command::AuthResponse(STANDARD.encode(username.as_bytes()));
        self.expect_code(&cmd, ReplyCode::AUTH_CONTINUE).await?;

        let cmd = Command::AuthResponse(STANDARD.encode(password.as_bytes()));
        self.expect_code(&cmd, ReplyCode::AUTH_SUCCESS).await?;

        tracing::debug!(mechanism = "LOGIN", "Authenticated");
        Ok(())
    }

    /// Sends one message to one recipient.
    ///
    /// Runs MAIL FROM, RCPT TO and DATA, then writes `message` with
    /// dot-stuffing applied. If the server rejects any step, the transaction
    /// is reset with RSET so the connection can carry the next message, and
    /// the rejection is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the message exceeds the advertised size limit,
    /// the server rejects the transaction, or the connection fails.
    pub async fn send_mail(&mut self, from: &Address, to: &Address, message: &[u8]) -> Result<()> {
        if let Some(limit) = self.server_info.max_message_size()
            && message.len() > limit
        {
            return Err(Error::MessageTooLarge {
                size: message.len(),
                limit,
            });
        }

        match self.transaction(from, to, message).await {
            Err(err @ Error::SmtpError { .. }) => {
                tracing::debug!(error = %err, "Transaction rejected, resetting");
                if let Err(reset_err) = self.reset().await {
                    tracing::warn!(error = %reset_err, "RSET after failed transaction failed");
                }
                Err(err)
            }
            result => result,
        }
    }

    async fn transaction(&mut self, from: &Address, to: &Address, message: &[u8]) -> Result<()> {
        let size = self
            .server_info
            .supports(&Extension::Size(None))
            .then_some(message.len());
        self.expect_success(Command::MailFrom {
            from: from.clone(),
            size,
        })
        .await?;
        self.expect_success(Command::RcptTo { to: to.clone() }).await?;
        self.expect_code(&Command::Data, ReplyCode::START_DATA).await?;

        let mut data = dot_stuff(message);
        if !data.ends_with(b"\r\n") {
            data.extend_from_slice(b"\r\n");
        }
        data.extend_from_slice(b".\r\n");
        self.write_all(&data).await?;

        let reply = self.read_reply().await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        tracing::debug!(bytes = message.len(), "Message accepted");
        Ok(())
    }

    /// Aborts the current mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RSET command fails.
    pub async fn reset(&mut self) -> Result<()> {
        self.expect_success(Command::Rset).await.map(drop)
    }

    /// Checks that the connection is alive.
    ///
    /// # Errors
    ///
    /// Returns an error if the NOOP command fails.
    pub async fn noop(&mut self) -> Result<()> {
        self.expect_success(Command::Noop).await.map(drop)
    }

    /// Sends QUIT and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply.into_error());
        }
        // The server may already have closed its side.
        let _ = self.stream.get_mut().shutdown().await;
        Ok(())
    }

    async fn expect_success(&mut self, cmd: Command) -> Result<Reply> {
        let reply = self.send_command(&cmd).await?;
        if reply.is_success() {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn expect_code(&mut self, cmd: &Command, code: ReplyCode) -> Result<Reply> {
        let reply = self.send_command(cmd).await?;
        if reply.code == code {
            Ok(reply)
        } else {
            Err(reply.into_error())
        }
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        tracing::trace!(command = cmd.name(), "C:");
        self.write_all(&cmd.serialize()).await?;
        self.read_reply().await
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.get_mut();
        tokio::time::timeout(self.io_timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout)??;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                continue;
            }

            let is_last = Reply::is_last_line(&line);
            lines.push(line);
            if is_last {
                break;
            }
        }

        let reply = Reply::parse(&lines)?;
        tracing::trace!(code = %reply.code, "S:");
        Ok(reply)
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(
            self.io_timeout,
            (&mut self.stream)
                .take(MAX_REPLY_LINE as u64)
                .read_line(&mut line),
        )
        .await
        .map_err(|_| Error::Timeout)??;

        if read == 0 {
            return Err(Error::Protocol("Connection closed by server".into()));
        }
        if !line.ends_with('\n') {
            return Err(Error::Protocol("Reply line too long".into()));
        }
        Ok(line.trim_end().to_string())
    }
}

impl Client<SmtpStream> {
    /// Upgrades the connection to TLS using STARTTLS and repeats EHLO.
    ///
    /// # Errors
    ///
    /// Returns an error if STARTTLS is not supported or if the upgrade fails.
    pub async fn starttls(mut self, hostname: &str, client_hostname: &str) -> Result<Self> {
        if !self.server_info.supports_starttls() {
            return Err(Error::NotSupported("STARTTLS".into()));
        }

        self.expect_success(Command::StartTls).await?;

        let Self {
            stream,
            server_info,
            io_timeout,
        } = self;
        let stream = tokio::time::timeout(io_timeout, stream.into_inner().upgrade_to_tls(hostname))
            .await
            .map_err(|_| Error::Timeout)??;

        let mut client = Self {
            stream: BufReader::new(stream),
            server_info,
            io_timeout,
        };
        // Extensions may differ once the channel is encrypted.
        client.ehlo(client_hostname).await?;
        Ok(client)
    }

    /// Returns true if the connection is encrypted.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }
}

/// Applies SMTP transparency (RFC 5321 §4.5.2) to message data.
///
/// Every line starting with `.` gets one extra leading `.`. No other bytes
/// are changed and no terminator is added.
#[must_use]
pub fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 16);
    let mut line_start = true;
    for &byte in message {
        if line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        line_start = byte == b'\n';
    }
    out
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
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn address(addr: &str) -> Address {
        Address::new(addr).unwrap()
    }

    async fn ready_client(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock> {
        let mut client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        client.ehlo("client.example.com").await.unwrap();
        client
    }

    fn greeting_and_ehlo(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"220 smtp.example.com ESMTP ready\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-smtp.example.com\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n")
    }

    #[test]
    fn test_dot_stuff() {
        assert_eq!(dot_stuff(b".hidden\r\nok\r\n.\r\n"), b"..hidden\r\nok\r\n..\r\n");
        assert_eq!(dot_stuff(b"a.b\r\n"), b"a.b\r\n");
        assert_eq!(dot_stuff(b""), b"");
    }

    #[tokio::test]
    async fn test_greeting_and_ehlo() {
        let mock = greeting_and_ehlo(&mut Builder::new()).build();
        let client = ready_client(mock).await;

        assert_eq!(client.server_info().hostname, "smtp.example.com");
        assert!(client.server_info().supports(&Extension::EightBitMime));
        assert_eq!(
            client.server_info().auth_mechanisms(),
            vec![AuthMechanism::Plain, AuthMechanism::Login]
        );
    }

    #[tokio::test]
    async fn test_rejected_greeting() {
        let mock = Builder::new().read(b"554 go away\r\n").build();
        let err = Client::from_stream(mock, TIMEOUT).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_auth_plain() {
        let mock = greeting_and_ehlo(&mut Builder::new())
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 2.7.0 Authentication successful\r\n")
            .build();
        let mut client = ready_client(mock).await;
        client.authenticate("user", "pass").await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_login() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"AUTH LOGIN\r\n")
            .read(b"334 VXNlcm5hbWU6\r\n")
            .write(b"dXNlcg==\r\n")
            .read(b"334 UGFzc3dvcmQ6\r\n")
            .write(b"cGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .build();
        let mut client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        client.auth_login("user", "pass").await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_rejected() {
        let mock = greeting_and_ehlo(&mut Builder::new())
            .write(b"AUTH PLAIN AHVzZXIAd3Jvbmc=\r\n")
            .read(b"535 5.7.8 Bad credentials\r\n")
            .build();
        let mut client = ready_client(mock).await;
        let err = client.authenticate("user", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::SmtpError { code: 535, .. }));
    }

    #[tokio::test]
    async fn test_send_mail() {
        let mock = greeting_and_ehlo(&mut Builder::new())
            .write(b"MAIL FROM:<sender@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<rcpt@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
            .write(b"Subject: hi\r\n\r\n..dot\r\n.\r\n")
            .read(b"250 2.0.0 queued\r\n")
            .build();
        let mut client = ready_client(mock).await;
        client
            .send_mail(
                &address("sender@example.com"),
                &address("rcpt@example.com"),
                b"Subject: hi\r\n\r\n.dot\r\n",
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_mail_resets_after_rejected_recipient() {
        let mock = greeting_and_ehlo(&mut Builder::new())
            .write(b"MAIL FROM:<sender@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 5.1.1 No such user\r\n")
            .write(b"RSET\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut client = ready_client(mock).await;
        let err = client
            .send_mail(
                &address("sender@example.com"),
                &address("nobody@example.com"),
                b"body\r\n",
            )
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_send_mail_announces_size() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-smtp.example.com\r\n250 SIZE 1000\r\n")
            .write(b"MAIL FROM:<a@example.com> SIZE=6\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<b@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"body\r\n.\r\n")
            .read(b"250 OK\r\n")
            .build();
        let mut client = ready_client(mock).await;
        client
            .send_mail(&address("a@example.com"), &address("b@example.com"), b"body\r\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_send_mail_too_large() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"EHLO client.example.com\r\n")
            .read(b"250-smtp.example.com\r\n250 SIZE 4\r\n")
            .build();
        let mut client = ready_client(mock).await;
        let err = client
            .send_mail(&address("a@example.com"), &address("b@example.com"), b"too big")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { size: 7, limit: 4 }));
    }

    #[tokio::test]
    async fn test_quit() {
        let mock = Builder::new()
            .read(b"220 smtp.example.com ESMTP\r\n")
            .write(b"NOOP\r\n")
            .read(b"250 OK\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let mut client = Client::from_stream(mock, TIMEOUT).await.unwrap();
        client.noop().await.unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_closed() {
        let mock = Builder::new().build();
        let err = Client::from_stream(mock, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
