//! Challenge hashing and signer address recovery
//!
//! The HSM signs `keccak256(payload)` where the payload is the EIP-191 framed challenge.
//! Addresses are the last 20 bytes of `keccak256` over the uncompressed public key.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::error::ProvisionError;
use crate::types::{RecoveredAddress, SignChallenge};

/// Length of an `r || s || v` signature.
pub const ETH_SIGNATURE_LEN: usize = 65;

const EIP191_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Bytes sent to the HSM for signing.
pub fn challenge_payload(challenge: &SignChallenge) -> Vec<u8> {
    let length = challenge.message.len().to_string();
    let mut payload =
        Vec::with_capacity(EIP191_PREFIX.len() + length.len() + challenge.message.len());
    payload.extend_from_slice(EIP191_PREFIX);
    payload.extend_from_slice(length.as_bytes());
    payload.extend_from_slice(challenge.message);
    payload
}

/// Digest the HSM signs for `challenge`.
pub fn challenge_digest(challenge: &SignChallenge) -> [u8; 32] {
    keccak256(&challenge_payload(challenge))
}

pub fn address_from_key(key: &VerifyingKey) -> RecoveredAddress {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    RecoveredAddress::from_bytes(&address)
}

/// Recover the signer's address from a 65-byte `r || s || v` signature over `digest`.
pub fn recover_address(
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<RecoveredAddress, ProvisionError> {
    if signature.len() != ETH_SIGNATURE_LEN {
        return Err(ProvisionError::InvalidSignature(format!(
            "Expected {}-byte signature, got {} bytes",
            ETH_SIGNATURE_LEN,
            signature.len()
        )));
    }

    let recovery_id = parse_recovery_id(signature[64])?;
    let signature = Signature::from_slice(&signature[..64])
        .map_err(|e| ProvisionError::InvalidSignature(format!("Invalid (r, s): {}", e)))?;

    // Recovery only accepts low-S; negating s mirrors the recovered point's y parity
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => (
            normalized,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|e| ProvisionError::InvalidSignature(format!("Recovery failed: {}", e)))?;

    Ok(address_from_key(&key))
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, ProvisionError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => {
            return Err(ProvisionError::InvalidSignature(format!(
                "Invalid recovery id: {}",
                v
            )));
        }
    };

    RecoveryId::from_byte(id)
        .ok_or_else(|| ProvisionError::InvalidSignature(format!("Invalid recovery id: {}", v)))
}
