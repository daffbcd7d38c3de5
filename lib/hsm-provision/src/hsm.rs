//! HSM Client
//!
//! REST client for the HSM, implementing the HsmOperations trait the orchestrator drives.

use async_trait::async_trait;
use std::sync::Arc;

use crate::caller::{ResilientCaller, bearer_headers};
use crate::config::Config;
use crate::deriver::AddressDeriver;
use crate::error::ProvisionError;
use crate::provisioner::KeyProvisioner;
use crate::types::{KeyLabel, RecoveredAddress};

/// Operations one label's pipeline needs from the HSM.
#[async_trait]
pub trait HsmOperations: Send + Sync {
    /// Create a key pair under `label`.
    async fn create_key_pair(&self, label: &KeyLabel) -> Result<(), ProvisionError>;

    /// Derive the address of the key under `label`.
    async fn derive_address(&self, label: &KeyLabel) -> Result<RecoveredAddress, ProvisionError>;
}

/// HTTP client for the HSM REST API.
#[derive(Debug, Clone)]
pub struct HsmClient {
    provisioner: KeyProvisioner,
    deriver: AddressDeriver,
}

impl HsmClient {
    pub fn new(
        caller: ResilientCaller,
        base_url: &str,
        api_token: &str,
    ) -> Result<Self, ProvisionError> {
        let headers = bearer_headers(api_token)?;
        let caller = Arc::new(caller);
        Ok(Self {
            provisioner: KeyProvisioner::new(caller.clone(), base_url, headers.clone()),
            deriver: AddressDeriver::new(caller, base_url, headers),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProvisionError> {
        let caller = ResilientCaller::from_config(config)?;
        Self::new(caller, &config.hsm_url, &config.api_token)
    }
}

#[async_trait]
impl HsmOperations for HsmClient {
    async fn create_key_pair(&self, label: &KeyLabel) -> Result<(), ProvisionError> {
        self.provisioner.create_key_pair(label).await
    }

    async fn derive_address(&self, label: &KeyLabel) -> Result<RecoveredAddress, ProvisionError> {
        self.deriver.derive_address(label).await
    }
}
