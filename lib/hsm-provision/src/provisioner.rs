//! Key pair creation

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::{info, warn};

use crate::caller::{Method, ResilientCaller};
use crate::error::ProvisionError;
use crate::types::{CreateKeyRequest, KEY_PAIR_SPEC, KeyLabel};

/// Asks the HSM to create one secp256k1 key pair per label.
#[derive(Debug, Clone)]
pub struct KeyProvisioner {
    caller: Arc<ResilientCaller>,
    base_url: String,
    headers: HeaderMap,
}

impl KeyProvisioner {
    pub fn new(caller: Arc<ResilientCaller>, base_url: &str, headers: HeaderMap) -> Self {
        Self {
            caller,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        }
    }

    /// Create the key pair named `label`. Only HTTP 201 counts as success.
    pub async fn create_key_pair(&self, label: &KeyLabel) -> Result<(), ProvisionError> {
        let url = format!("{}/v1/key", self.base_url);
        let request = CreateKeyRequest::new(label, &KEY_PAIR_SPEC);

        let result = self
            .caller
            .execute(&url, Some(&request), &self.headers, Method::Post)
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Key creation for {} failed: {}", label, e);
                return Err(e);
            }
        };

        let status = response.status();
        if status == StatusCode::CREATED {
            info!("Created key pair {}", label);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("HSM refused key creation for {} ({}): {}", label, status, body);
        Err(ProvisionError::Business { status, body })
    }
}
