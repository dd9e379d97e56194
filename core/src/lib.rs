//! ZaSwap engine: quotes, swaps and user decryption of a confidential balance.
#![allow(async_fn_in_trait)]

pub mod abi;
pub mod amount;
pub mod authorization;
pub mod client;
pub mod config;
pub mod error;
pub mod freshness;
pub mod handle;
pub mod handle_cache;
pub mod orchestrator;
pub mod quote;
pub mod session;
pub mod swap;
pub mod types;
pub mod view;

pub use amount::{AmountError, FixedRate, NativeAmount, TokenAmount};
pub use authorization::{AuthorizationWindow, Eip712Domain, Signature, TypedPayload};
pub use client::{ChainReader, ClientError, DecryptionRequest, Receipt, Relayer, WalletSigner};
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use freshness::Settled;
pub use handle::{BoundHandle, EncryptedHandle};
pub use orchestrator::Orchestrator;
pub use session::{DecryptionSession, EphemeralKeypair, SessionState};
pub use swap::{SwapRequest, SwapState};
pub use types::{Address, TxHash};
pub use view::View;
