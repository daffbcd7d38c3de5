//! Provisioning data model and HSM wire types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ceiling on the number of keys provisioned in one batch.
pub const MAX_KEYS: usize = 100;

// ==================== Key Labels ====================

/// Identifier of a key inside the HSM, `<prefix>_<index>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyLabel(String);

impl KeyLabel {
    /// Label for position `index` of a batch named by `prefix`.
    pub fn indexed(prefix: &str, index: usize) -> Self {
        Self(format!("{}_{}", prefix, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyLabel {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ==================== Key Pair Spec ====================

/// Attribute set applied to every generated key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAttributes {
    pub encrypt: bool,
    pub decrypt: bool,
    pub verify: bool,
    pub sign: bool,
    pub wrap: bool,
    pub unwrap: bool,
    pub derive: bool,
    pub bip32: bool,
    pub extractable: bool,
    pub modifiable: bool,
    pub destroyable: bool,
    pub sensitive: bool,
    pub copyable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPairSpec {
    pub algorithm: &'static str,
    pub curve_oid: &'static str,
    pub attributes: KeyAttributes,
}

/// secp256k1 signing key that never leaves the HSM.
pub const KEY_PAIR_SPEC: KeyPairSpec = KeyPairSpec {
    algorithm: "EC",
    curve_oid: "1.3.132.0.10",
    attributes: KeyAttributes {
        encrypt: false,
        decrypt: false,
        verify: true,
        sign: true,
        wrap: false,
        unwrap: false,
        derive: false,
        bip32: false,
        extractable: false,
        modifiable: false,
        destroyable: false,
        sensitive: true,
        copyable: false,
    },
};

// ==================== Sign Challenges ====================

/// Signature scheme identifiers sent with every sign request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme {
    pub payload_type: &'static str,
    pub signature_type: &'static str,
    pub signature_algorithm: &'static str,
}

pub const ETH_SIGNATURE_SCHEME: SignatureScheme = SignatureScheme {
    payload_type: "UNSPECIFIED",
    signature_type: "ETH",
    signature_algorithm: "KECCAK256_WITH_ECDSA",
};

/// A fixed message the HSM is asked to sign so the key's address can be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignChallenge {
    pub name: &'static str,
    pub message: &'static [u8],
}

pub const CHALLENGE_A: SignChallenge = SignChallenge {
    name: "A",
    message: b"hsm-provision address challenge A",
};

pub const CHALLENGE_B: SignChallenge = SignChallenge {
    name: "B",
    message: b"hsm-provision address challenge B",
};

// ==================== Results ====================

/// Lowercase, `0x`-prefixed 20-byte hex address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecoveredAddress(String);

impl RecoveredAddress {
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecoveredAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningResult {
    pub label: KeyLabel,
    pub address: RecoveredAddress,
}

impl fmt::Display for ProvisioningResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HSM Key Name: {}, Address: {}", self.label, self.address)
    }
}

// ==================== HSM Service API Types ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateKeyRequest<'a> {
    pub label: &'a str,
    pub algorithm: &'static str,
    pub curve_oid: &'static str,
    pub attributes: KeyAttributes,
}

impl<'a> CreateKeyRequest<'a> {
    pub fn new(label: &'a KeyLabel, spec: &KeyPairSpec) -> Self {
        Self {
            label: label.as_str(),
            algorithm: spec.algorithm,
            curve_oid: spec.curve_oid,
            attributes: spec.attributes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SynchronousSignRequest<'a> {
    pub sign_request: SignRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignRequest<'a> {
    pub payload: String, // base64 encoded
    pub payload_type: &'static str,
    pub sign_key_name: &'a str,
    pub signature_type: &'static str,
    pub signature_algorithm: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignResponse {
    pub signature: String, // base64 encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_label_format() {
        assert_eq!(KeyLabel::indexed("batch", 0).as_str(), "batch_0");
        assert_eq!(KeyLabel::indexed("batch", 99).to_string(), "batch_99");
    }

    #[test]
    fn test_challenges_differ() {
        assert_ne!(CHALLENGE_A.message, CHALLENGE_B.message);
    }

    #[test]
    fn test_address_is_lowercase_hex() {
        let address = RecoveredAddress::from_bytes(&[0xAB; 20]);
        assert_eq!(address.as_str(), format!("0x{}", "ab".repeat(20)));
        assert_eq!(address.as_str().len(), 42);
    }

    #[test]
    fn test_result_report_line() {
        let result = ProvisioningResult {
            label: KeyLabel::from("batch_0"),
            address: RecoveredAddress::from_bytes(&[0x01; 20]),
        };
        assert_eq!(
            result.to_string(),
            format!("HSM Key Name: batch_0, Address: 0x{}", "01".repeat(20))
        );
    }

    #[test]
    fn test_create_key_request_wire_shape() {
        let label = KeyLabel::from("batch_0");
        let request = CreateKeyRequest::new(&label, &KEY_PAIR_SPEC);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["label"], "batch_0");
        assert_eq!(json["algorithm"], "EC");
        assert_eq!(json["curveOid"], "1.3.132.0.10");
        assert_eq!(json["attributes"]["sign"], true);
        assert_eq!(json["attributes"]["verify"], true);
        assert_eq!(json["attributes"]["sensitive"], true);
        assert_eq!(json["attributes"]["extractable"], false);
        assert_eq!(json["attributes"]["bip32"], false);
        assert_eq!(json["attributes"].as_object().unwrap().len(), 13);
    }

    #[test]
    fn test_sign_request_wire_shape() {
        let request = SynchronousSignRequest {
            sign_request: SignRequest {
                payload: "AAEC".to_string(),
                payload_type: ETH_SIGNATURE_SCHEME.payload_type,
                sign_key_name: "batch_1",
                signature_type: ETH_SIGNATURE_SCHEME.signature_type,
                signature_algorithm: ETH_SIGNATURE_SCHEME.signature_algorithm,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        let inner = &json["signRequest"];

        assert_eq!(inner["payload"], "AAEC");
        assert_eq!(inner["payloadType"], "UNSPECIFIED");
        assert_eq!(inner["signKeyName"], "batch_1");
        assert_eq!(inner["signatureType"], "ETH");
        assert_eq!(inner["signatureAlgorithm"], "KECCAK256_WITH_ECDSA");
    }

    #[test]
    fn test_sign_response_ignores_extra_fields() {
        let response: SignResponse =
            serde_json::from_str(r#"{"signature":"c2ln","signatureType":"ETH"}"#).unwrap();
        assert_eq!(response.signature, "c2ln");
    }
}
