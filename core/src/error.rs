//! Caller-facing error taxonomy.
//!
//! Every failure of an external collaborator is converted into one of these kinds at
//! the component boundary. The `Display` text is the message a front end shows as-is.

use thiserror::Error;

use crate::amount::AmountError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Non-positive or non-numeric amount, rejected before any external call
    #[error("Enter an ETH amount greater than zero.")]
    InputInvalid(#[source] AmountError),

    /// The quote read call failed
    #[error("Unable to fetch quote for this amount.")]
    QuoteUnavailable,

    /// Connected chain differs from the configured one
    #[error("Wrong network: connect to {expected_name} (chain {expected}) instead of chain {actual}.")]
    WrongNetwork {
        expected: u64,
        expected_name: String,
        actual: u64,
    },

    /// Holder declined a transaction or signature request
    #[error("Request rejected in wallet.")]
    UserRejected,

    /// The wallet failed to produce a signature for a reason other than rejection
    #[error("Wallet could not sign: {0}")]
    SigningFailed(String),

    /// RPC or node error before the transaction was included
    #[error("Swap submission failed: {0}")]
    SubmissionFailed(String),

    /// The transaction was mined but reverted
    #[error("Swap reverted on-chain{}", .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    ExecutionReverted { reason: Option<String> },

    /// The relayer answered without a value for the requested handle
    #[error("Decryption failed. Please retry.")]
    DecryptionIncomplete,

    /// Relayer or network failure, relayer message kept verbatim
    #[error("{0}")]
    RelayerUnavailable(String),

    /// No wallet account connected
    #[error("Connect a wallet to continue.")]
    WalletDisconnected,

    /// The encrypted balance handle could not be read
    #[error("Could not read encrypted balance.")]
    BalanceUnavailable,

    #[error("A swap is already in progress.")]
    SwapInProgress,

    #[error("A decryption for this balance is already in progress.")]
    DecryptInProgress,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<AmountError> for EngineError {
    fn from(err: AmountError) -> Self {
        EngineError::InputInvalid(err)
    }
}
