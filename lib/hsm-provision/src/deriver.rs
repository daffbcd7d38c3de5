//! Address derivation from HSM signatures
//!
//! The HSM never exports public keys through this API, so the address is recovered from
//! signatures over two distinct challenges. Both recoveries must agree; a disagreement
//! means the key or the signature scheme cannot be trusted and no address is returned.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::{error, warn};

use crate::caller::{Method, ResilientCaller};
use crate::error::ProvisionError;
use crate::recovery::{challenge_digest, challenge_payload, recover_address};
use crate::types::{
    CHALLENGE_A, CHALLENGE_B, ETH_SIGNATURE_SCHEME, KeyLabel, RecoveredAddress, SignChallenge,
    SignRequest, SignResponse, SynchronousSignRequest,
};

#[derive(Debug, Clone)]
pub struct AddressDeriver {
    caller: Arc<ResilientCaller>,
    base_url: String,
    headers: HeaderMap,
}

impl AddressDeriver {
    pub fn new(caller: Arc<ResilientCaller>, base_url: &str, headers: HeaderMap) -> Self {
        Self {
            caller,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
        }
    }

    /// Derive the address of key `label`, checked across both challenges.
    pub async fn derive_address(
        &self,
        label: &KeyLabel,
    ) -> Result<RecoveredAddress, ProvisionError> {
        let first = self.recover_for_challenge(label, &CHALLENGE_A).await?;
        let second = self.recover_for_challenge(label, &CHALLENGE_B).await?;

        if first != second {
            error!(
                "Address mismatch for {}: challenge A recovered {}, challenge B recovered {}",
                label, first, second
            );
            return Err(ProvisionError::Consistency {
                label: label.to_string(),
            });
        }

        Ok(first)
    }

    async fn recover_for_challenge(
        &self,
        label: &KeyLabel,
        challenge: &SignChallenge,
    ) -> Result<RecoveredAddress, ProvisionError> {
        let signature = self.sign(label, challenge).await.inspect_err(|e| {
            warn!("Signing challenge {} with {} failed: {}", challenge.name, label, e);
        })?;

        recover_address(&challenge_digest(challenge), &signature).inspect_err(|e| {
            error!(
                "Recovering address for {} from challenge {} failed: {}",
                label, challenge.name, e
            );
        })
    }

    async fn sign(
        &self,
        label: &KeyLabel,
        challenge: &SignChallenge,
    ) -> Result<Vec<u8>, ProvisionError> {
        let url = format!("{}/v1/synchronousSign", self.base_url);
        let request = SynchronousSignRequest {
            sign_request: SignRequest {
                payload: BASE64.encode(challenge_payload(challenge)),
                payload_type: ETH_SIGNATURE_SCHEME.payload_type,
                sign_key_name: label.as_str(),
                signature_type: ETH_SIGNATURE_SCHEME.signature_type,
                signature_algorithm: ETH_SIGNATURE_SCHEME.signature_algorithm,
            },
        };

        let response = self
            .caller
            .execute(&url, Some(&request), &self.headers, Method::Post)
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Business { status, body });
        }

        let resp: SignResponse = response.json().await.map_err(|e| {
            ProvisionError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        BASE64.decode(resp.signature.as_bytes()).map_err(|e| {
            ProvisionError::InvalidSignature(format!("Invalid base64 signature: {}", e))
        })
    }
}
