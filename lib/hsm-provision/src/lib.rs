//! HSM key provisioning library
//!
//! Creates secp256k1 key pairs inside a remote HSM and derives each key's address from
//! signatures the HSM produces, so private key material never leaves the device.
//!
//! Each label runs an independent pipeline:
//! 1. `KeyProvisioner` asks the HSM to create the key pair
//! 2. `AddressDeriver` has the HSM sign two distinct challenges and recovers the signer
//!    address from each signature; both must agree
//!
//! `BatchOrchestrator` runs one pipeline per label concurrently and keeps only the labels
//! that made it through both steps. All network traffic goes through `ResilientCaller`,
//! which retries rate limits and transport errors with a bounded, fixed backoff.

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

pub mod caller;
pub mod config;
pub mod deriver;
pub mod error;
pub mod hsm;
pub mod orchestrator;
pub mod provisioner;
pub mod recovery;
pub mod types;

pub use caller::{Method, ResilientCaller, bearer_headers};
pub use config::{Config, RetryPolicy};
pub use deriver::AddressDeriver;
pub use error::{CallFailure, ProvisionError};
pub use hsm::{HsmClient, HsmOperations};
pub use orchestrator::{BatchOrchestrator, BatchReport, FailureStage, LabelFailure};
pub use provisioner::KeyProvisioner;
pub use recovery::{address_from_key, challenge_digest, challenge_payload, recover_address};
pub use types::{
    CHALLENGE_A, CHALLENGE_B, KEY_PAIR_SPEC, KeyLabel, MAX_KEYS, ProvisioningResult,
    RecoveredAddress, SignChallenge,
};
