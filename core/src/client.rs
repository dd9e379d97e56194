//! Interfaces to the external collaborators the engine composes.
//!
//! The engine owns no transport. A front end supplies a [`ChainReader`], a
//! [`WalletSigner`] and a [`Relayer`]; every method is a suspension point.

use std::collections::HashMap;

use thiserror::Error;

use crate::abi::ContractCall;
use crate::amount::NativeAmount;
use crate::authorization::{AuthorizationWindow, Signature, TypedPayload};
use crate::handle::{BoundHandle, EncryptedHandle};
use crate::session::EphemeralKeypair;
use crate::types::{Address, TxHash};

/// Failure reported by an adapter. Components map these into
/// [`EngineError`](crate::error::EngineError) kinds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The holder declined in the wallet
    #[error("rejected: {0}")]
    Rejected(String),

    /// Network, node or relayer failure
    #[error("transport: {0}")]
    Transport(String),

    /// The call or transaction reverted
    #[error("reverted{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { reason: Option<String> },
}

impl ClientError {
    /// Message without the kind prefix
    pub fn message(&self) -> String {
        match self {
            ClientError::Rejected(m) | ClientError::Transport(m) => m.clone(),
            ClientError::Reverted { reason } => reason.clone().unwrap_or_else(|| "reverted".into()),
        }
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub revert_reason: Option<String>,
}

/// Read-only contract calls
pub trait ChainReader {
    async fn read(&self, call: &ContractCall) -> Result<Vec<u8>, ClientError>;
}

/// The connected wallet: account, chain, transactions and typed-data signatures
pub trait WalletSigner {
    /// Connected account, if any
    fn account(&self) -> Option<Address>;

    async fn chain_id(&self) -> Result<u64, ClientError>;

    /// Sends `call` carrying `value` and returns the hash once the node accepted it
    async fn submit(&self, call: &ContractCall, value: NativeAmount)
    -> Result<TxHash, ClientError>;

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Receipt, ClientError>;

    async fn sign_typed_data(&self, payload: &TypedPayload) -> Result<Signature, ClientError>;
}

/// Everything the relayer needs to release clear values for a set of handles
#[derive(Debug, Clone, Copy)]
pub struct DecryptionRequest<'a> {
    pub handles: &'a [BoundHandle],
    pub keypair: &'a EphemeralKeypair,
    pub signature: &'a Signature,
    pub contract_addresses: &'a [Address],
    pub account: Address,
    pub window: AuthorizationWindow,
}

/// User-decryption relayer
pub trait Relayer {
    /// Builds the typed payload the wallet signs
    async fn build_authorization(
        &self,
        public_key: &[u8; 32],
        contract_addresses: &[Address],
        window: AuthorizationWindow,
    ) -> Result<TypedPayload, ClientError>;

    /// Clear values keyed by handle. A handle may be missing from the map.
    async fn request_decryption(
        &self,
        request: DecryptionRequest<'_>,
    ) -> Result<HashMap<EncryptedHandle, u128>, ClientError>;
}

impl<T: ChainReader + ?Sized> ChainReader for &T {
    async fn read(&self, call: &ContractCall) -> Result<Vec<u8>, ClientError> {
        (**self).read(call).await
    }
}

impl<T: WalletSigner + ?Sized> WalletSigner for &T {
    fn account(&self) -> Option<Address> {
        (**self).account()
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        (**self).chain_id().await
    }

    async fn submit(&self, call: &ContractCall, value: NativeAmount)
    -> Result<TxHash, ClientError> {
        (**self).submit(call, value).await
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Receipt, ClientError> {
        (**self).await_confirmation(tx_hash).await
    }

    async fn sign_typed_data(&self, payload: &TypedPayload) -> Result<Signature, ClientError> {
        (**self).sign_typed_data(payload).await
    }
}

impl<T: Relayer + ?Sized> Relayer for &T {
    async fn build_authorization(
        &self,
        public_key: &[u8; 32],
        contract_addresses: &[Address],
        window: AuthorizationWindow,
    ) -> Result<TypedPayload, ClientError> {
        (**self)
            .build_authorization(public_key, contract_addresses, window)
            .await
    }

    async fn request_decryption(
        &self,
        request: DecryptionRequest<'_>,
    ) -> Result<HashMap<EncryptedHandle, u128>, ClientError> {
        (**self).request_decryption(request).await
    }
}
