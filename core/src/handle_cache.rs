//! Latest encrypted balance handle for the connected account.

use std::cell::{Cell, RefCell};

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::abi::{self, ContractCall, Word};
use crate::client::ChainReader;
use crate::error::{EngineError, Result};
use crate::freshness::{Generation, Settled};
use crate::handle::{BoundHandle, EncryptedHandle};
use crate::types::Address;

#[derive(Debug, Default)]
struct Entry {
    account: Option<Address>,
    handle: Option<EncryptedHandle>,
}

/// Holds at most one handle, always bound to the token contract it was read from.
///
/// Refreshes and invalidations share one generation counter: a refresh that completes
/// after a newer refresh or an invalidation was issued leaves the cache untouched.
pub struct HandleCache {
    token_contract: Address,
    generation: Generation,
    state: RefCell<Entry>,
    invalidations: Cell<u64>,
}

impl HandleCache {
    pub fn new(token_contract: Address) -> Self {
        Self {
            token_contract,
            generation: Generation::new(),
            state: RefCell::new(Entry::default()),
            invalidations: Cell::new(0),
        }
    }

    pub fn contract(&self) -> Address {
        self.token_contract
    }

    pub fn account(&self) -> Option<Address> {
        self.state.borrow().account
    }

    /// The cached handle, or `None` when invalidated or never read
    pub fn current(&self) -> Option<BoundHandle> {
        self.state
            .borrow()
            .handle
            .map(|h| BoundHandle::new(h, self.token_contract))
    }

    /// Switches the cache to `account`. A change of account invalidates.
    pub fn set_account(&self, account: Option<Address>) {
        if self.state.borrow().account == account {
            return;
        }
        self.state.borrow_mut().account = account;
        self.invalidate();
    }

    /// Drops the handle and makes in-flight refreshes stale
    pub fn invalidate(&self) {
        self.generation.advance();
        self.state.borrow_mut().handle = None;
        self.invalidations.set(self.invalidations.get() + 1);
        debug!("handle cache invalidated (#{})", self.invalidations.get());
    }

    /// Invalidates only if `account` is still the cached account.
    /// Returns whether an invalidation happened.
    pub fn invalidate_for(&self, account: Address) -> bool {
        if self.account() != Some(account) {
            debug!("skipping invalidation for {}: no longer the connected account", account);
            return false;
        }
        self.invalidate();
        true
    }

    /// Number of invalidations since creation
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.get()
    }

    /// Reads the handle for the current account
    pub async fn refresh<R: ChainReader>(
        &self,
        reader: &R,
        cancel: &CancellationToken,
    ) -> Result<Settled<BoundHandle>> {
        let account = self.account().ok_or(EngineError::WalletDisconnected)?;
        let ticket = self.generation.issue();

        let call = ContractCall::new(
            self.token_contract,
            abi::CONFIDENTIAL_BALANCE_OF,
            vec![Word::Address(account)],
        );
        debug!("handle refresh #{}: reading balance handle of {}", ticket.value(), account);
        let result = reader.read(&call).await;

        if !self.generation.admits(ticket, cancel) {
            debug!("handle refresh #{}: discarding stale result", ticket.value());
            return Ok(Settled::Stale);
        }

        let bytes = result
            .map_err(|e| e.to_string())
            .and_then(|data| abi::decode_bytes32(&data).map_err(|e| e.to_string()))
            .map_err(|e| {
                warn!("handle refresh #{}: {}", ticket.value(), e);
                EngineError::BalanceUnavailable
            })?;

        let handle = EncryptedHandle(bytes);
        self.state.borrow_mut().handle = Some(handle);
        Ok(Settled::Current(BoundHandle::new(handle, self.token_contract)))
    }

    /// The cached handle, reading it first when absent
    pub async fn get_or_refresh<R: ChainReader>(
        &self,
        reader: &R,
        cancel: &CancellationToken,
    ) -> Result<Settled<BoundHandle>> {
        match self.current() {
            Some(bound) => Ok(Settled::Current(bound)),
            None => self.refresh(reader, cancel).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;

    struct Returns(std::result::Result<[u8; 32], ClientError>);

    impl ChainReader for Returns {
        async fn read(&self, _call: &ContractCall) -> std::result::Result<Vec<u8>, ClientError> {
            self.0.clone().map(|w| w.to_vec())
        }
    }

    const ALICE: Address = Address([0xa1; 20]);
    const BOB: Address = Address([0xb0; 20]);

    #[tokio::test]
    async fn test_refresh_binds_token_contract() {
        let cache = HandleCache::new(Address([7u8; 20]));
        cache.set_account(Some(ALICE));

        let bound = cache
            .refresh(&Returns(Ok([3u8; 32])), &CancellationToken::new())
            .await
            .unwrap()
            .current()
            .unwrap();
        assert_eq!(bound.contract, Address([7u8; 20]));
        assert_eq!(bound.handle, EncryptedHandle([3u8; 32]));
        assert_eq!(cache.current(), Some(bound));
    }

    #[tokio::test]
    async fn test_refresh_without_account() {
        let cache = HandleCache::new(Address::ZERO);
        let err = cache
            .refresh(&Returns(Ok([3u8; 32])), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::WalletDisconnected);
    }

    #[tokio::test]
    async fn test_read_failure_is_balance_unavailable() {
        let cache = HandleCache::new(Address::ZERO);
        cache.set_account(Some(ALICE));
        let err = cache
            .refresh(
                &Returns(Err(ClientError::Transport("timeout".into()))),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::BalanceUnavailable);
        assert_eq!(cache.current(), None);
    }

    #[test]
    fn test_account_change_invalidates() {
        let cache = HandleCache::new(Address::ZERO);
        cache.set_account(Some(ALICE));
        cache.state.borrow_mut().handle = Some(EncryptedHandle([1u8; 32]));
        let before = cache.invalidation_count();

        cache.set_account(Some(ALICE));
        assert_eq!(cache.invalidation_count(), before);
        assert!(cache.current().is_some());

        cache.set_account(Some(BOB));
        assert_eq!(cache.invalidation_count(), before + 1);
        assert_eq!(cache.current(), None);
    }

    #[test]
    fn test_invalidate_for_other_account_is_noop() {
        let cache = HandleCache::new(Address::ZERO);
        cache.set_account(Some(BOB));
        let before = cache.invalidation_count();
        assert!(!cache.invalidate_for(ALICE));
        assert_eq!(cache.invalidation_count(), before);
        assert!(cache.invalidate_for(BOB));
        assert_eq!(cache.invalidation_count(), before + 1);
    }
}
