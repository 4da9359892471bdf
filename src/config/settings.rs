//! Application settings loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DEFAULT_PORT;

/// Bot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Bot API token issued by `@BotFather`.
    pub token: String,

    /// Public base URL for webhook mode. Empty means long polling.
    #[serde(default)]
    pub webhook_url: String,

    /// Optional secret echoed by Telegram in the webhook header.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Port the webhook listener binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the workbook, the lock file and session files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How long to wait for the workbook lock in seconds.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

const fn default_lock_timeout() -> u64 {
    30
}

impl BotSettings {
    /// Creates settings with defaults for everything but the token.
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token,
            webhook_url: String::new(),
            webhook_secret: None,
            port: default_port(),
            data_dir: default_data_dir(),
            lock_timeout_secs: default_lock_timeout(),
        }
    }

    /// Creates settings from process environment variables.
    ///
    /// Expects `TELEGRAM_TOKEN` to be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("TELEGRAM_TOKEN")
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingEnvVar("TELEGRAM_TOKEN"))?;

        let webhook_url = lookup("WEBHOOK_URL")
            .map(|u| u.trim().trim_end_matches('/').to_owned())
            .unwrap_or_default();

        let webhook_secret = lookup("WEBHOOK_SECRET").filter(|s| !s.is_empty());

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => default_port(),
        };

        let data_dir = lookup("DATA_DIR")
            .filter(|d| !d.is_empty())
            .map_or_else(default_data_dir, PathBuf::from);

        let lock_timeout_secs = lookup("LOCK_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_lock_timeout);

        Ok(Self {
            token,
            webhook_url,
            webhook_secret,
            port,
            data_dir,
            lock_timeout_secs,
        })
    }

    /// Returns true when updates should arrive through the webhook.
    #[must_use]
    pub fn uses_webhook(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    /// Full URL Telegram should post updates to.
    #[must_use]
    pub fn webhook_endpoint(&self) -> String {
        format!("{}/{}", self.webhook_url, self.token)
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid PORT value '{0}' (must be 0-65535)")]
    InvalidPort(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = BotSettings::from_lookup(lookup_from(&[("TELEGRAM_TOKEN", "123:abc")])).unwrap();
        assert_eq!(settings.token, "123:abc");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.data_dir, PathBuf::from("."));
        assert_eq!(settings.lock_timeout_secs, 30);
        assert!(!settings.uses_webhook());
        assert!(settings.webhook_secret.is_none());
    }

    #[test]
    fn test_port_override() {
        let settings = BotSettings::from_lookup(lookup_from(&[
            ("TELEGRAM_TOKEN", "t"),
            ("PORT", "9090"),
        ]))
        .unwrap();
        assert_eq!(settings.port, 9090);
    }

    #[test]
    fn test_invalid_port() {
        let result = BotSettings::from_lookup(lookup_from(&[
            ("TELEGRAM_TOKEN", "t"),
            ("PORT", "eighty"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidPort(p)) if p == "eighty"));
    }

    #[test]
    fn test_missing_token() {
        let result = BotSettings::from_lookup(lookup_from(&[("PORT", "8080")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar("TELEGRAM_TOKEN"))));

        let blank = BotSettings::from_lookup(lookup_from(&[("TELEGRAM_TOKEN", "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn test_webhook_url_trailing_slash() {
        let settings = BotSettings::from_lookup(lookup_from(&[
            ("TELEGRAM_TOKEN", "42:xyz"),
            ("WEBHOOK_URL", "https://bot.example.com/"),
        ]))
        .unwrap();
        assert!(settings.uses_webhook());
        assert_eq!(settings.webhook_url, "https://bot.example.com");
        assert_eq!(settings.webhook_endpoint(), "https://bot.example.com/42:xyz");
    }

    #[test]
    fn test_new_uses_defaults() {
        let settings = BotSettings::new("tok".to_owned());
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.lock_timeout(), Duration::from_secs(30));
    }
}
