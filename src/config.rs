//! Start-up configuration.
//!
//! Read once from the process environment (after an optional `.env` file is
//! loaded by `main`) and then passed explicitly to everything that needs a
//! credential, an identity or a tunable.  The only other environment
//! variable the crate reads is `RUST_LOG`, consulted by `logging`.
//!
//! | Variable               | Default                    |
//! |------------------------|----------------------------|
//! | `BOT_TOKEN`            | required                   |
//! | `ADMIN_ID`             | required                   |
//! | `OPERATOR_ID`          | `ADMIN_ID`                 |
//! | `GITHUB_TOKEN`         | unset                      |
//! | `STORE_PATH`           | `relay_feeds.json`         |
//! | `POLL_INTERVAL_SECS`   | `1800`                     |
//! | `REQUEST_TIMEOUT_SECS` | `30`                       |
//! | `TRANSFER_TIMEOUT_SECS`| `300`                      |
//! | `MAX_CONCURRENT_FEEDS` | `4`                        |
//! | `GITHUB_API_URL`       | `https://api.github.com`   |
//! | `TELEGRAM_API_URL`     | `https://api.telegram.org` |
//! | `LOG_DIR`              | `logs`                     |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::feed::RecipientId;

#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_id: RecipientId,
    /// Identity the terminal console acts as.
    pub operator_id: RecipientId,
    pub github_token: Option<String>,
    pub store_path: PathBuf,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub transfer_timeout: Duration,
    pub max_concurrent_feeds: usize,
    pub github_api_url: String,
    pub telegram_api_url: String,
    pub log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup.  Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = get("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?;
        let admin_id = parse(
            "ADMIN_ID",
            get("ADMIN_ID").ok_or(ConfigError::Missing("ADMIN_ID"))?,
        )?;
        let operator_id = match get("OPERATOR_ID") {
            Some(v) => parse("OPERATOR_ID", v)?,
            None => admin_id,
        };

        let secs = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            let value: u64 = get(key).map(|v| parse(key, v)).transpose()?.unwrap_or(default);
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    value: value.to_string(),
                    reason: "must be greater than zero".into(),
                });
            }
            Ok(Duration::from_secs(value))
        };

        let max_concurrent_feeds: usize = get("MAX_CONCURRENT_FEEDS")
            .map(|v| parse("MAX_CONCURRENT_FEEDS", v))
            .transpose()?
            .unwrap_or(4);

        Ok(Self {
            bot_token,
            admin_id,
            operator_id,
            github_token: get("GITHUB_TOKEN"),
            store_path: get("STORE_PATH")
                .unwrap_or_else(|| "relay_feeds.json".into())
                .into(),
            poll_interval: secs("POLL_INTERVAL_SECS", 1800)?,
            request_timeout: secs("REQUEST_TIMEOUT_SECS", 30)?,
            transfer_timeout: secs("TRANSFER_TIMEOUT_SECS", 300)?,
            max_concurrent_feeds: max_concurrent_feeds.max(1),
            github_api_url: get("GITHUB_API_URL").unwrap_or_else(|| "https://api.github.com".into()),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".into()),
            log_dir: get("LOG_DIR").unwrap_or_else(|| "logs".into()).into(),
        })
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("admin_id", &self.admin_id)
            .field("operator_id", &self.operator_id)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("store_path", &self.store_path)
            .field("poll_interval", &self.poll_interval)
            .field("request_timeout", &self.request_timeout)
            .field("transfer_timeout", &self.transfer_timeout)
            .field("max_concurrent_feeds", &self.max_concurrent_feeds)
            .field("github_api_url", &self.github_api_url)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("log_dir", &self.log_dir)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_with_required_keys_only() {
        let cfg = load(&[("BOT_TOKEN", "123:abc"), ("ADMIN_ID", "777")]).unwrap();
        assert_eq!(cfg.admin_id, 777);
        assert_eq!(cfg.operator_id, 777);
        assert!(cfg.github_token.is_none());
        assert_eq!(cfg.store_path, PathBuf::from("relay_feeds.json"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(1800));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(cfg.transfer_timeout, Duration::from_secs(300));
        assert_eq!(cfg.max_concurrent_feeds, 4);
        assert_eq!(cfg.github_api_url, "https://api.github.com");
    }

    #[test]
    fn missing_required_keys() {
        assert_eq!(load(&[("ADMIN_ID", "1")]).unwrap_err(), ConfigError::Missing("BOT_TOKEN"));
        assert_eq!(
            load(&[("BOT_TOKEN", "t"), ("ADMIN_ID", "  ")]).unwrap_err(),
            ConfigError::Missing("ADMIN_ID")
        );
    }

    #[test]
    fn invalid_numbers_are_reported_with_key() {
        let err = load(&[("BOT_TOKEN", "t"), ("ADMIN_ID", "admin")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "ADMIN_ID", .. }));

        let err = load(&[("BOT_TOKEN", "t"), ("ADMIN_ID", "1"), ("POLL_INTERVAL_SECS", "0")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POLL_INTERVAL_SECS", .. }));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = load(&[
            ("BOT_TOKEN", "t"),
            ("ADMIN_ID", "1"),
            ("OPERATOR_ID", "2"),
            ("GITHUB_TOKEN", "ghp_x"),
            ("POLL_INTERVAL_SECS", "60"),
            ("MAX_CONCURRENT_FEEDS", "0"),
            ("STORE_PATH", "/var/lib/relay/feeds.json"),
        ])
        .unwrap();
        assert_eq!(cfg.operator_id, 2);
        assert_eq!(cfg.github_token.as_deref(), Some("ghp_x"));
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.max_concurrent_feeds, 1);
        assert_eq!(cfg.store_path, PathBuf::from("/var/lib/relay/feeds.json"));
    }

    #[test]
    fn debug_redacts_tokens() {
        let cfg = load(&[("BOT_TOKEN", "secret-bot"), ("ADMIN_ID", "1"), ("GITHUB_TOKEN", "secret-gh")])
            .unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("secret"));
    }
}
