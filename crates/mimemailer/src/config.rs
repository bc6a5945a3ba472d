//! Mailer configuration.

use crate::error::{Error, Result};
use mimemailer_smtp::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const DEFAULT_HELO_NAME: &str = "localhost";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption. **Credentials travel in the clear.**
    None,
    /// TLS from the start (port 465). **Recommended.**
    #[default]
    Tls,
    /// Start with plaintext, upgrade with STARTTLS (port 587).
    StartTls,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::Tls => 465,
            Self::StartTls => 587,
        }
    }
}

/// SMTP server and sender settings.
///
/// A `port` of 0 in a JSON document means "the default port for
/// `security`".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    #[serde(default)]
    pub port: u16,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Username for AUTH.
    pub username: String,
    /// Password for AUTH.
    pub password: String,
    /// Display name used in the `From` header.
    #[serde(default)]
    pub sender_name: String,
    /// Address used in the `From` header and as envelope sender.
    pub sender_address: String,
    /// Name announced in EHLO.
    #[serde(default = "default_helo_name")]
    pub helo_name: String,
    /// Connection timeout.
    #[serde(default = "default_connect_timeout", with = "seconds")]
    pub connect_timeout: Duration,
    /// Read/write timeout.
    #[serde(default = "default_io_timeout", with = "seconds")]
    pub io_timeout: Duration,
}

fn default_helo_name() -> String {
    DEFAULT_HELO_NAME.to_string()
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_io_timeout() -> Duration {
    DEFAULT_IO_TIMEOUT
}

impl Config {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Loads a configuration from JSON.
    ///
    /// Missing optional fields take their defaults. The result is not
    /// validated; [`Mailer::new`](crate::Mailer::new) does that.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json).map_err(Error::Json)?;
        if config.port == 0 {
            config.port = config.security.default_port();
        }
        Ok(config)
    }

    /// Checks every field and reports all problems at once.
    ///
    /// # Errors
    ///
    /// Returns every [`ValidationError`] found.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost);
        }
        if self.port == 0 {
            errors.push(ValidationError::InvalidPort);
        }
        if self.username.trim().is_empty() {
            errors.push(ValidationError::EmptyUsername);
        }
        if self.password.is_empty() {
            errors.push(ValidationError::EmptyPassword);
        }

        if self.sender_address.trim().is_empty() {
            errors.push(ValidationError::EmptySenderAddress);
        } else if Address::new(&self.sender_address).is_err() {
            errors.push(ValidationError::InvalidSenderAddress);
        }

        if self.helo_name.trim().is_empty() || self.helo_name.contains(char::is_whitespace) {
            errors.push(ValidationError::InvalidHeloName);
        }
        if self.connect_timeout.is_zero() || self.io_timeout.is_zero() {
            errors.push(ValidationError::ZeroTimeout);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("sender_name", &self.sender_name)
            .field("sender_address", &self.sender_address)
            .field("helo_name", &self.helo_name)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

/// Builder for [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    username: String,
    password: String,
    sender_name: String,
    sender_address: String,
    helo_name: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Tls,
            username: String::new(),
            password: String::new(),
            sender_name: String::new(),
            sender_address: String::new(),
            helo_name: default_helo_name(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the AUTH credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the sender shown in `From` and used as envelope sender.
    #[must_use]
    pub fn sender(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self.sender_address = address.into();
        self
    }

    /// Sets the name announced in EHLO.
    #[must_use]
    pub fn helo_name(mut self, name: impl Into<String>) -> Self {
        self.helo_name = name.into();
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            host: self.host,
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            security: self.security,
            username: self.username,
            password: self.password,
            sender_name: self.sender_name,
            sender_address: self.sender_address,
            helo_name: self.helo_name,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
        }
    }
}

/// Validation error for a [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// SMTP host is empty.
    EmptyHost,
    /// SMTP port is invalid.
    InvalidPort,
    /// SMTP username is empty.
    EmptyUsername,
    /// SMTP password is empty.
    EmptyPassword,
    /// Sender address is empty.
    EmptySenderAddress,
    /// Sender address cannot be used as envelope sender.
    InvalidSenderAddress,
    /// EHLO name is empty or contains whitespace.
    InvalidHeloName,
    /// A timeout is zero.
    ZeroTimeout,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyHost => "SMTP server is required",
            Self::InvalidPort => "SMTP port must be 1-65535",
            Self::EmptyUsername => "SMTP username is required",
            Self::EmptyPassword => "SMTP password is required",
            Self::EmptySenderAddress => "Sender address is required",
            Self::InvalidSenderAddress => "Invalid sender address format",
            Self::InvalidHeloName => "EHLO name must be a single word",
            Self::ZeroTimeout => "Timeouts must be greater than zero",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
            Self::EmptyPassword => "password",
            Self::EmptySenderAddress | Self::InvalidSenderAddress => "sender_address",
            Self::InvalidHeloName => "helo_name",
            Self::ZeroTimeout => "timeout",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Durations as whole seconds.
mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
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

    fn complete() -> Config {
        Config::builder("smtp.example.com")
            .credentials("user", "secret")
            .sender("Sender Name", "sender@example.com")
            .build()
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 25);
        assert_eq!(Security::Tls.default_port(), 465);
        assert_eq!(Security::StartTls.default_port(), 587);
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder("smtp.example.com")
            .port(2525)
            .security(Security::StartTls)
            .helo_name("mailer.example.com")
            .connect_timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.helo_name, "mailer.example.com");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.io_timeout, DEFAULT_IO_TIMEOUT);
    }

    #[test]
    fn test_config_builder_default_port() {
        let config = Config::builder("smtp.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 587);
        assert_eq!(Config::builder("smtp.example.com").build().port, 465);
    }

    #[test]
    fn test_validate_complete_config() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_error() {
        let config = Config::builder("")
            .port(0)
            .helo_name("")
            .io_timeout(Duration::ZERO)
            .build();
        let errors = config.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost,
                ValidationError::InvalidPort,
                ValidationError::EmptyUsername,
                ValidationError::EmptyPassword,
                ValidationError::EmptySenderAddress,
                ValidationError::InvalidHeloName,
                ValidationError::ZeroTimeout,
            ]
        );
    }

    #[test]
    fn test_validate_sender_address() {
        let mut config = complete();
        config.sender_address = "not an address".into();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors, vec![ValidationError::InvalidSenderAddress]);
        assert_eq!(errors[0].field(), "sender_address");
        assert_eq!(errors[0].to_string(), "Invalid sender address format");
    }

    #[test]
    fn test_from_json_defaults() {
        let config = Config::from_json(
            r#"{
                "host": "smtp.example.com",
                "security": "starttls",
                "username": "user",
                "password": "secret",
                "sender_address": "sender@example.com"
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 587);
        assert_eq!(config.security, Security::StartTls);
        assert_eq!(config.sender_name, "");
        assert_eq!(config.helo_name, "localhost");
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.io_timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_explicit_values() {
        let config = Config::from_json(
            r#"{
                "host": "smtp.example.com",
                "port": 2525,
                "security": "none",
                "username": "user",
                "password": "secret",
                "sender_name": "Sender",
                "sender_address": "sender@example.com",
                "helo_name": "mailer.example.com",
                "connect_timeout": 5,
                "io_timeout": 15
            }"#,
        )
        .unwrap();

        assert_eq!(config.port, 2525);
        assert_eq!(config.security, Security::None);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.io_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(Config::from_json("{"), Err(Error::Json(_))));
        assert!(matches!(
            Config::from_json(r#"{"host": "smtp.example.com"}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_json_round_trip_keeps_seconds() {
        let json = serde_json::to_string(&complete()).unwrap();
        assert!(json.contains(r#""connect_timeout":30"#));
        assert!(json.contains(r#""security":"tls""#));
        assert_eq!(Config::from_json(&json).unwrap(), complete());
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", complete());
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
