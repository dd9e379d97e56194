//! EIP-712 user-decryption authorization.
//!
//! The relayer only honours a decryption request whose signature recovers to the
//! requesting account over exactly this struct. Field names, field order and types
//! must match the relayer's schema byte for byte.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use keccak_hash::keccak;
use serde_json::{Value, json};

use crate::abi::uint_word;
use crate::types::Address;

pub const PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const REQUEST_TYPE: &str = "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays)";

const SECONDS_PER_DAY: u64 = 86_400;

/// Validity period of a decryption authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationWindow {
    /// Unix seconds
    pub start_timestamp: u64,
    pub duration_days: u32,
}

impl AuthorizationWindow {
    pub fn new(start_timestamp: u64, duration_days: u32) -> Self {
        Self {
            start_timestamp,
            duration_days,
        }
    }

    /// Window opening now
    pub fn starting_now(duration_days: u32) -> Self {
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::new(start, duration_days)
    }

    pub fn expires_at(&self) -> u64 {
        self.start_timestamp + self.duration_days as u64 * SECONDS_PER_DAY
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl Eip712Domain {
    pub fn separator(&self) -> [u8; 32] {
        let mut enc = Vec::with_capacity(32 * 5);
        enc.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
        enc.extend_from_slice(&keccak256(self.name.as_bytes()));
        enc.extend_from_slice(&keccak256(self.version.as_bytes()));
        enc.extend_from_slice(&uint_word(self.chain_id as u128));
        enc.extend_from_slice(&self.verifying_contract.to_word());
        keccak256(&enc)
    }
}

/// The signed message: session public key bound to contracts and a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDecryptRequest {
    pub public_key: Vec<u8>,
    pub contract_addresses: Vec<Address>,
    pub window: AuthorizationWindow,
}

impl UserDecryptRequest {
    pub fn type_hash() -> [u8; 32] {
        keccak256(REQUEST_TYPE.as_bytes())
    }

    pub fn struct_hash(&self) -> [u8; 32] {
        // address[] is encoded as keccak of the concatenated padded words
        let mut addresses = Vec::with_capacity(32 * self.contract_addresses.len());
        for addr in &self.contract_addresses {
            addresses.extend_from_slice(&addr.to_word());
        }

        let mut enc = Vec::with_capacity(32 * 5);
        enc.extend_from_slice(&Self::type_hash());
        enc.extend_from_slice(&keccak256(&self.public_key));
        enc.extend_from_slice(&keccak256(&addresses));
        enc.extend_from_slice(&uint_word(self.window.start_timestamp as u128));
        enc.extend_from_slice(&uint_word(self.window.duration_days as u128));
        keccak256(&enc)
    }
}

/// Typed payload handed to the wallet for `eth_signTypedData_v4`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedPayload {
    pub domain: Eip712Domain,
    pub message: UserDecryptRequest,
}

impl TypedPayload {
    pub fn new(domain: Eip712Domain, message: UserDecryptRequest) -> Self {
        Self { domain, message }
    }

    /// keccak256(0x1901 || domainSeparator || hashStruct(message))
    pub fn signing_digest(&self) -> [u8; 32] {
        let mut enc = Vec::with_capacity(2 + 32 + 32);
        enc.extend_from_slice(&[0x19, 0x01]);
        enc.extend_from_slice(&self.domain.separator());
        enc.extend_from_slice(&self.message.struct_hash());
        keccak256(&enc)
    }

    /// JSON document in the `eth_signTypedData_v4` layout
    pub fn to_json(&self) -> Value {
        let addresses: Vec<String> = self
            .message
            .contract_addresses
            .iter()
            .map(|a| a.to_string())
            .collect();

        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                    { "name": "verifyingContract", "type": "address" },
                ],
                PRIMARY_TYPE: [
                    { "name": "publicKey", "type": "bytes" },
                    { "name": "contractAddresses", "type": "address[]" },
                    { "name": "startTimestamp", "type": "uint256" },
                    { "name": "durationDays", "type": "uint256" },
                ],
            },
            "primaryType": PRIMARY_TYPE,
            "domain": {
                "name": self.domain.name,
                "version": self.domain.version,
                "chainId": self.domain.chain_id,
                "verifyingContract": self.domain.verifying_contract.to_string(),
            },
            "message": {
                "publicKey": format!("0x{}", hex::encode(&self.message.public_key)),
                "contractAddresses": addresses,
                "startTimestamp": self.message.window.start_timestamp.to_string(),
                "durationDays": self.message.window.duration_days.to_string(),
            },
        })
    }
}

/// 65-byte secp256k1 signature (r || s || v) produced by the wallet
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Hex without the `0x` prefix, as the relayer expects it
    pub fn to_bare_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

fn keccak256(data: &[u8]) -> [u8; 32] {
    keccak(data).to_fixed_bytes()
}
