//! Provisioning Error Types

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single call attempt did not produce a terminal response.
#[derive(Error, Debug)]
pub enum CallFailure {
    #[error("Rate limited by HSM (HTTP 429)")]
    RateLimited,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: CallFailure },

    #[error("HSM rejected request ({status}): {body}")]
    Business { status: StatusCode, body: String },

    #[error("Recovered addresses disagree for key {label}")]
    Consistency { label: String },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid HSM response: {0}")]
    InvalidResponse(String),

    #[error("Provisioning task failed: {0}")]
    TaskFailed(String),
}

impl ProvisionError {
    /// True for failures that indicate a possible integrity problem rather than a transient one.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            ProvisionError::Consistency { .. } | ProvisionError::InvalidSignature(_)
        )
    }
}
