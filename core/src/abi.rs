//! Minimal Solidity ABI encoding for the calls the engine makes.

use keccak_hash::keccak;
use thiserror::Error;

use crate::types::Address;

/// `ZaSwap.quote(uint256) returns (uint64)`
pub const QUOTE: &str = "quote(uint256)";
/// `ZaSwap.swap()` payable
pub const SWAP: &str = "swap()";
/// `ConfidentialUSDT.confidentialBalanceOf(address) returns (euint64)`
pub const CONFIDENTIAL_BALANCE_OF: &str = "confidentialBalanceOf(address)";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("return data is {0} bytes, expected 32")]
    Length(usize),
    #[error("uint256 value does not fit in 128 bits")]
    Overflow,
}

/// First four bytes of keccak256(signature)
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes()).to_fixed_bytes();
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A static ABI argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {
    Uint(u128),
    Address(Address),
}

impl Word {
    pub fn encode(&self) -> [u8; 32] {
        match self {
            Word::Uint(v) => uint_word(*v),
            Word::Address(a) => a.to_word(),
        }
    }
}

pub fn uint_word(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// A contract function invocation: target, signature and static arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub signature: &'static str,
    pub args: Vec<Word>,
}

impl ContractCall {
    pub fn new(to: Address, signature: &'static str, args: Vec<Word>) -> Self {
        Self {
            to,
            signature,
            args,
        }
    }

    pub fn selector(&self) -> [u8; 4] {
        selector(self.signature)
    }

    /// selector || arg words
    pub fn calldata(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 32 * self.args.len());
        data.extend_from_slice(&self.selector());
        for arg in &self.args {
            data.extend_from_slice(&arg.encode());
        }
        data
    }
}

/// Decodes a single `uint256` return value
pub fn decode_uint(data: &[u8]) -> Result<u128, AbiError> {
    let word = decode_bytes32(data)?;
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Decodes a single `bytes32`-sized return value
pub fn decode_bytes32(data: &[u8]) -> Result<[u8; 32], AbiError> {
    data.try_into().map_err(|_| AbiError::Length(data.len()))
}
