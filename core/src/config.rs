//! Client configuration read from the environment.
//!
//! Unset variables fall back to defaults; only a malformed timeout is an
//! error.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

const API_URL_VAR: &str = "TASKDESK_API_URL";
const TOKEN_FILE_VAR: &str = "TASKDESK_TOKEN_FILE";
const TIMEOUT_VAR: &str = "TASKDESK_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Where the access token is persisted. `None` keeps it in memory.
    pub token_file: Option<PathBuf>,
    /// Applied to every request when set. Unset means no timeout.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token_file: None,
            timeout: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(API_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&base_url);
        config.token_file = lookup(TOKEN_FILE_VAR)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        config.timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidTimeout {
                    name: TIMEOUT_VAR,
                    value: raw.clone(),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };
        Ok(config)
    }
}
