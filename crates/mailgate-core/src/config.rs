//! Gateway configuration loaded from the environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::account::{Endpoint, Security};
use crate::pool::PoolConfig;
use crate::{Error, Result};

const DEFAULT_APP_ENC_KEY: &str = "dev-app-enc-key";

/// Process-wide settings for the gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Secret the credential vault key is derived from.
    pub app_enc_key: String,
    /// Path of the `SQLite` database file.
    pub database_path: PathBuf,
    /// IMAP endpoint offered when an account does not name one.
    pub default_imap: Endpoint,
    /// SMTP endpoint offered when an account does not name one.
    pub default_smtp: Endpoint,
    /// How long a pooled connection may sit unused.
    pub idle_timeout: Duration,
    /// Bound on TCP connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on waiting for the IMAP greeting.
    pub greeting_timeout: Duration,
}

impl GatewayConfig {
    /// Loads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let database_path = var("DATABASE_URL").map_or_else(default_database_path, |url| {
            PathBuf::from(url.strip_prefix("file:").unwrap_or(&url))
        });

        Ok(Self {
            app_enc_key: var("APP_ENC_KEY").unwrap_or_else(|| DEFAULT_APP_ENC_KEY.to_string()),
            database_path,
            default_imap: Endpoint {
                host: var("IMAP_HOST").unwrap_or_default(),
                port: parse_number(var("IMAP_PORT"), "IMAP_PORT", 993)?,
                security: parse_secure(var("IMAP_SECURE")),
            },
            default_smtp: Endpoint {
                host: var("SMTP_HOST").unwrap_or_default(),
                port: parse_number(var("SMTP_PORT"), "SMTP_PORT", 465)?,
                security: parse_secure(var("SMTP_SECURE")),
            },
            idle_timeout: Duration::from_secs(parse_number(
                var("MAILGATE_IDLE_TIMEOUT_SECS"),
                "MAILGATE_IDLE_TIMEOUT_SECS",
                300,
            )?),
            connect_timeout: Duration::from_secs(parse_number(
                var("MAILGATE_CONNECT_TIMEOUT_SECS"),
                "MAILGATE_CONNECT_TIMEOUT_SECS",
                30,
            )?),
            greeting_timeout: Duration::from_secs(parse_number(
                var("MAILGATE_GREETING_TIMEOUT_SECS"),
                "MAILGATE_GREETING_TIMEOUT_SECS",
                15,
            )?),
        })
    }

    /// Pool settings derived from this configuration.
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            idle_timeout: self.idle_timeout,
            connect_timeout: self.connect_timeout,
            greeting_timeout: self.greeting_timeout,
            ..PoolConfig::default()
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("app_enc_key", &"<redacted>")
            .field("database_path", &self.database_path)
            .field("default_imap", &self.default_imap)
            .field("default_smtp", &self.default_smtp)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("greeting_timeout", &self.greeting_timeout)
            .finish()
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("data"))
        .join("mailgate")
        .join("app.db")
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, name: &str, default: T) -> Result<T> {
    value.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} must be a number, got {v:?}")))
    })
}

/// Anything but the literal `false` keeps implicit TLS.
fn parse_secure(value: Option<String>) -> Security {
    match value.as_deref() {
        Some("false") => Security::StartTls,
        _ => Security::Tls,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        GatewayConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.app_enc_key, "dev-app-enc-key");
        assert_eq!(config.default_imap.port, 993);
        assert_eq!(config.default_imap.security, Security::Tls);
        assert_eq!(config.default_smtp.port, 465);
        assert!(config.default_smtp.host.is_empty());
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.greeting_timeout, Duration::from_secs(15));
        assert!(config.database_path.ends_with("mailgate/app.db"));
    }

    #[test]
    fn values_override_defaults() {
        let config = load(&[
            ("APP_ENC_KEY", "s3cret"),
            ("DATABASE_URL", "file:/var/lib/mailgate.db"),
            ("IMAP_HOST", "imap.example.com"),
            ("IMAP_PORT", "143"),
            ("IMAP_SECURE", "false"),
            ("SMTP_SECURE", "no"),
            ("MAILGATE_IDLE_TIMEOUT_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/mailgate.db"));
        assert_eq!(config.default_imap.host, "imap.example.com");
        assert_eq!(config.default_imap.port, 143);
        assert_eq!(config.default_imap.security, Security::StartTls);
        // Only the literal "false" turns TLS off
        assert_eq!(config.default_smtp.security, Security::Tls);
        assert_eq!(config.pool_config().idle_timeout, Duration::from_secs(60));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = load(&[("APP_ENC_KEY", ""), ("IMAP_PORT", "")]).unwrap();
        assert_eq!(config.app_enc_key, "dev-app-enc-key");
        assert_eq!(config.default_imap.port, 993);
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = load(&[("SMTP_PORT", "smtp")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("SMTP_PORT")));
    }

    #[test]
    fn debug_hides_the_secret() {
        let config = load(&[("APP_ENC_KEY", "hunter2")]).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
