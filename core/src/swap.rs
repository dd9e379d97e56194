//! Value-bearing swap transactions.

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::abi::{self, ContractCall};
use crate::amount::{AmountError, NativeAmount};
use crate::client::{ClientError, WalletSigner};
use crate::error::EngineError;
use crate::freshness::Settled;
use crate::handle_cache::HandleCache;
use crate::types::{Address, TxHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    Pending,
    Confirmed { block_number: u64 },
    Failed,
}

/// One user swap. Moves `Pending` to `Confirmed` or `Failed` and never back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    amount: NativeAmount,
    state: SwapState,
    tx_hash: Option<TxHash>,
    error: Option<EngineError>,
    invalidated: bool,
}

impl SwapRequest {
    pub fn new(amount: NativeAmount) -> Self {
        Self {
            amount,
            state: SwapState::Pending,
            tx_hash: None,
            error: None,
            invalidated: false,
        }
    }

    pub fn amount(&self) -> NativeAmount {
        self.amount
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    pub fn error(&self) -> Option<&EngineError> {
        self.error.as_ref()
    }

    /// Whether confirmation dropped the cached handle of the initiating account.
    /// False when that account was no longer connected by then.
    pub fn invalidated_balance(&self) -> bool {
        self.invalidated
    }

    pub fn is_terminal(&self) -> bool {
        self.state != SwapState::Pending
    }

    fn submitted(&mut self, tx_hash: TxHash) {
        if self.state == SwapState::Pending && self.tx_hash.is_none() {
            self.tx_hash = Some(tx_hash);
        }
    }

    fn confirm(&mut self, block_number: u64) {
        if self.state == SwapState::Pending {
            self.state = SwapState::Confirmed { block_number };
        }
    }

    fn fail(&mut self, error: EngineError) {
        if self.state == SwapState::Pending {
            self.state = SwapState::Failed;
            self.error = Some(error);
        }
    }

    /// One-line status for display
    pub fn status_line(&self) -> String {
        match (&self.state, &self.tx_hash, &self.error) {
            (SwapState::Pending, Some(hash), _) => format!("Swapping... tx: {hash}"),
            (SwapState::Pending, None, _) => "Swapping...".to_string(),
            (SwapState::Confirmed { block_number }, _, _) => {
                format!("Swap confirmed in block {block_number}")
            }
            (SwapState::Failed, _, Some(err)) => err.to_string(),
            (SwapState::Failed, _, None) => "Swap failed".to_string(),
        }
    }
}

pub struct SwapExecutor {
    swap_contract: Address,
    expected_chain_id: u64,
    chain_name: String,
}

impl SwapExecutor {
    pub fn new(swap_contract: Address, expected_chain_id: u64, chain_name: impl Into<String>) -> Self {
        Self {
            swap_contract,
            expected_chain_id,
            chain_name: chain_name.into(),
        }
    }

    /// Submits `swap()` with `amount` attached and follows it to a terminal state.
    ///
    /// `on_submitted` runs once the transaction hash is known, before waiting for
    /// confirmation. A confirmed swap invalidates `cache` for the initiating account.
    /// Nothing is retried. `Stale` means the flow was cancelled and its effects were
    /// dropped; a transaction already submitted at that point stays on chain.
    pub async fn execute<W: WalletSigner>(
        &self,
        wallet: &W,
        amount: NativeAmount,
        cache: &HandleCache,
        cancel: &CancellationToken,
        on_submitted: impl FnOnce(&SwapRequest),
    ) -> Settled<SwapRequest> {
        let mut request = SwapRequest::new(amount);
        if cancel.is_cancelled() {
            return Settled::Stale;
        }
        if amount.is_zero() {
            request.fail(EngineError::InputInvalid(AmountError::Zero));
            return Settled::Current(request);
        }

        let Some(account) = wallet.account() else {
            request.fail(EngineError::WalletDisconnected);
            return Settled::Current(request);
        };

        debug!("swap: checking chain for {}", account);
        let chain_id = wallet.chain_id().await;
        if cancel.is_cancelled() {
            return Settled::Stale;
        }
        match chain_id {
            Ok(id) if id == self.expected_chain_id => {}
            Ok(actual) => {
                warn!("swap: wallet on chain {}, expected {}", actual, self.expected_chain_id);
                request.fail(EngineError::WrongNetwork {
                    expected: self.expected_chain_id,
                    expected_name: self.chain_name.clone(),
                    actual,
                });
                return Settled::Current(request);
            }
            Err(e) => {
                warn!("swap: chain id unavailable: {}", e);
                request.fail(EngineError::SubmissionFailed(e.message()));
                return Settled::Current(request);
            }
        }

        let call = ContractCall::new(self.swap_contract, abi::SWAP, vec![]);
        info!("swap: submitting {} from {}", amount, account);
        let submitted = wallet.submit(&call, amount).await;
        if cancel.is_cancelled() {
            if let Ok(hash) = submitted {
                info!("swap: {} submitted after teardown, not tracking it", hash);
            }
            return Settled::Stale;
        }
        let tx_hash = match submitted {
            Ok(hash) => hash,
            Err(e) => {
                warn!("swap: submission failed: {}", e);
                request.fail(submission_error(e));
                return Settled::Current(request);
            }
        };
        request.submitted(tx_hash);
        info!("swap: {}", request.status_line());
        on_submitted(&request);

        let receipt = wallet.await_confirmation(tx_hash).await;
        if cancel.is_cancelled() {
            debug!("swap: {} settled after teardown", tx_hash);
            return Settled::Stale;
        }
        match receipt {
            Ok(receipt) if receipt.success => {
                request.confirm(receipt.block_number);
                info!("swap: {}", request.status_line());
                request.invalidated = cache.invalidate_for(account);
            }
            Ok(receipt) => {
                warn!("swap: {} reverted in block {}", tx_hash, receipt.block_number);
                request.fail(EngineError::ExecutionReverted {
                    reason: receipt.revert_reason,
                });
            }
            Err(e) => {
                warn!("swap: waiting for {} failed: {}", tx_hash, e);
                request.fail(submission_error(e));
            }
        }

        Settled::Current(request)
    }
}

fn submission_error(err: ClientError) -> EngineError {
    match err {
        ClientError::Rejected(_) => EngineError::UserRejected,
        ClientError::Transport(msg) => EngineError::SubmissionFailed(msg),
        ClientError::Reverted { reason } => EngineError::ExecutionReverted { reason },
    }
}
