//! Submission endpoint configuration.

use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption. Only for local test servers.
    None,
    /// Plaintext greeting, then STARTTLS (port 587).
    StartTls,
    /// TLS from the start (port 465).
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default submission port for this mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Implicit => 465,
        }
    }
}

/// SMTP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Name sent with EHLO.
    pub client_hostname: String,
}

impl Config {
    /// Creates a configuration for `host` with the given security and its
    /// default port.
    #[must_use]
    pub fn new(host: impl Into<String>, security: Security) -> Self {
        Self {
            host: host.into(),
            port: security.default_port(),
            security,
            connect_timeout: Duration::from_secs(30),
            client_hostname: "localhost".to_string(),
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
