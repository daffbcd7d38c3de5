//! Provisioning configuration

use std::fmt;
use std::time::Duration;

use crate::error::ProvisionError;
use crate::types::MAX_KEYS;

pub const DEFAULT_HSM_URL: &str = "http://hsm:80";
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Values consumed by the provisioning core for one run.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the HSM REST API
    pub hsm_url: String,
    /// Bearer token for the HSM REST API
    pub api_token: String,
    /// Number of keys to provision
    pub key_count: usize,
    /// Label prefix; keys are named `<prefix>_<index>`
    pub key_prefix: String,
    pub max_keys: usize,
    pub retry: RetryPolicy,
    /// Per-attempt transport timeout (`None` leaves it to the transport)
    pub request_timeout: Option<Duration>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("hsm_url", &self.hsm_url)
            .field("api_token", &"<redacted>")
            .field("key_count", &self.key_count)
            .field("key_prefix", &self.key_prefix)
            .field("max_keys", &self.max_keys)
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    pub fn new(hsm_url: &str, api_token: &str, key_count: usize, key_prefix: &str) -> Self {
        Self {
            hsm_url: hsm_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            key_count,
            key_prefix: key_prefix.to_string(),
            max_keys: MAX_KEYS,
            retry: RetryPolicy::default(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Reject anything that would make the run meaningless before touching the network.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        if self.api_token.trim().is_empty() {
            return Err(ProvisionError::Config(
                "HSM_API_TOKEN is required".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.hsm_url)
            .map_err(|e| ProvisionError::Config(format!("Invalid HSM_URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProvisionError::Config(format!(
                "HSM_URL must be http or https, got {}",
                url.scheme()
            )));
        }

        validate_prefix(&self.key_prefix)?;
        validate_count(self.key_count, self.max_keys)?;

        if self.retry.max_attempts == 0 {
            return Err(ProvisionError::Config(
                "HSM_RETRY_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

pub(crate) fn validate_prefix(prefix: &str) -> Result<(), ProvisionError> {
    if prefix.is_empty() {
        return Err(ProvisionError::Config("KEY_PREFIX is required".to_string()));
    }
    if prefix.chars().any(char::is_whitespace) {
        return Err(ProvisionError::Config(format!(
            "KEY_PREFIX must not contain whitespace: {:?}",
            prefix
        )));
    }
    Ok(())
}

pub(crate) fn validate_count(count: usize, max_keys: usize) -> Result<(), ProvisionError> {
    if count == 0 {
        return Err(ProvisionError::Config(
            "NUM_KEYS must be greater than 0".to_string(),
        ));
    }
    if count > max_keys {
        return Err(ProvisionError::Config(format!(
            "NUM_KEYS must be at most {}, got {}",
            max_keys, count
        )));
    }
    Ok(())
}
