use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::retry::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://aiproxy.sanand.workers.dev/openai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_DATA_DIR: &str = "/data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process-wide settings, read once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the LLM proxy. `None` sends unauthenticated requests.
    pub api_token: Option<String>,
    pub api_base: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub bind_addr: SocketAddr,
    /// Sandbox prefix for the read endpoint; also where downloaded scripts land.
    pub data_dir: PathBuf,
    /// Lowercase substrings that cause a task to be refused outright.
    pub denylist: Vec<String>,
    pub retry: RetryPolicy,
    pub user_email: String,
    pub prettier_bin: String,
    pub jq_bin: String,
    pub uv_bin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: None,
            api_base: DEFAULT_API_BASE.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            bind_addr: ([127, 0, 0, 1], 8000).into(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            denylist: vec!["delete".to_string()],
            retry: RetryPolicy::default(),
            user_email: "user@example.com".to_string(),
            prettier_bin: "prettier".to_string(),
            jq_bin: "jq".to_string(),
            uv_bin: "uv".to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if config.api_token.is_none() {
            warn!("AIPROXY_TOKEN is not set; LLM requests will be sent unauthenticated");
        }
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup. Missing or empty keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let bind_addr = match get("OPSGATE_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "OPSGATE_BIND_ADDR",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.bind_addr,
        };

        let mut retry = defaults.retry.clone();
        if let Some(raw) = get("OPSGATE_TIMEOUT_SECS") {
            let secs = parse_number::<u64>("OPSGATE_TIMEOUT_SECS", &raw)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "OPSGATE_TIMEOUT_SECS",
                    value: raw,
                    reason: "must be greater than zero".to_string(),
                });
            }
            retry.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("OPSGATE_MAX_RETRIES") {
            retry.max_retries = parse_number::<u32>("OPSGATE_MAX_RETRIES", &raw)?;
        }

        let denylist = match get("OPSGATE_DENYLIST") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.denylist,
        };

        Ok(Self {
            api_token: get("AIPROXY_TOKEN"),
            api_base: get("OPSGATE_API_BASE").unwrap_or(defaults.api_base),
            chat_model: get("OPSGATE_CHAT_MODEL").unwrap_or(defaults.chat_model),
            embedding_model: get("OPSGATE_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            bind_addr,
            data_dir: get("OPSGATE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            denylist,
            retry,
            user_email: get("OPSGATE_USER_EMAIL").unwrap_or(defaults.user_email),
            prettier_bin: get("OPSGATE_PRETTIER_BIN").unwrap_or(defaults.prettier_bin),
            jq_bin: get("OPSGATE_JQ_BIN").unwrap_or(defaults.jq_bin),
            uv_bin: get("OPSGATE_UV_BIN").unwrap_or(defaults.uv_bin),
        })
    }

    /// Whether the task text contains any denylisted substring (case-insensitive).
    pub fn is_denied(&self, task: &str) -> bool {
        let task = task.to_lowercase();
        self.denylist.iter().any(|word| task.contains(word.as_str()))
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_token.is_none());
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.denylist, vec!["delete".to_string()]);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("AIPROXY_TOKEN", "secret"),
            ("OPSGATE_BIND_ADDR", "0.0.0.0:3000"),
            ("OPSGATE_DATA_DIR", "/srv/data"),
            ("OPSGATE_DENYLIST", "Delete, rm -rf ,"),
            ("OPSGATE_TIMEOUT_SECS", "5"),
            ("OPSGATE_MAX_RETRIES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.denylist, vec!["delete", "rm -rf"]);
        assert_eq!(config.retry.attempt_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn empty_token_counts_as_unset() {
        let config = Config::from_lookup(lookup(&[("AIPROXY_TOKEN", "  ")])).unwrap();
        assert!(config.api_token.is_none());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("OPSGATE_MAX_RETRIES", "many")])).unwrap_err();
        assert!(err.to_string().contains("OPSGATE_MAX_RETRIES"));

        let err = Config::from_lookup(lookup(&[("OPSGATE_TIMEOUT_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn denylist_match_is_case_insensitive() {
        let config = Config::default();
        assert!(config.is_denied("Please DELETE the logs"));
        assert!(!config.is_denied("count the wednesdays"));
    }
}
