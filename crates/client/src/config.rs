//! Client configuration, read from the environment with local-dev defaults.

use std::path::PathBuf;
use std::time::Duration;

use pomgmt_core::query::DEFAULT_PAGE_SIZE;

/// Default API base URL for local development.
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// File name of the persisted session inside the data directory.
const SESSION_FILE_NAME: &str = "session.json";

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("No data directory available for the session file; set SESSION_FILE")]
    NoDataDir,
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote API, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout. Expiry surfaces as a transient error.
    pub request_timeout: Duration,
    /// Rows per page for the merged-data view.
    pub page_size: u32,
    /// Where the credential is persisted between runs.
    pub session_file: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                  |
    /// |------------------------|------------------------------------------|
    /// | `API_BASE_URL`         | `http://localhost:8000`                  |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                                     |
    /// | `PAGE_SIZE`            | `50`                                     |
    /// | `SESSION_FILE`         | `<data-local-dir>/pomgmt/session.json`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) but reading from an arbitrary
    /// source, so tests do not have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout_secs: u64 = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "REQUEST_TIMEOUT_SECS",
                expected: "a whole number of seconds",
                value: raw,
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let page_size: u32 = match lookup("PAGE_SIZE") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "PAGE_SIZE",
                        expected: "a positive integer",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_PAGE_SIZE,
        };

        let session_file = match lookup("SESSION_FILE") {
            Some(path) => PathBuf::from(path),
            None => dirs::data_local_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join("pomgmt")
                .join(SESSION_FILE_NAME),
        };

        Ok(Self {
            base_url,
            request_timeout: Duration::from_secs(request_timeout_secs),
            page_size,
            session_file,
        })
    }
}
