//! Composes quotes, swaps, the handle cache and decryption sessions.
//!
//! The orchestrator is driven from a single thread. Its entry points may run
//! concurrently (for example under `tokio::join!` or a `LocalSet`); each one is
//! independently cancellable and applies its result to the [`View`] only while it is
//! still fresh:
//!
//! - quotes: last settled input wins
//! - swaps: at most one in flight
//! - decryptions: at most one in flight per handle, applied only while that handle
//!   is still the cached one
//!
//! Each action runs under its own child of the root cancellation token.
//! [`cancel_quote`](Orchestrator::cancel_quote), [`cancel_swap`](Orchestrator::cancel_swap)
//! and [`cancel_decrypt`](Orchestrator::cancel_decrypt) drop one kind of flow;
//! [`teardown`](Orchestrator::teardown) cancels everything. Results arriving later are
//! dropped. Account changes and chain disconnects cancel only the balance flows.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::amount::{AmountError, NativeAmount, TokenAmount};
use crate::authorization::AuthorizationWindow;
use crate::client::{ChainReader, Relayer, WalletSigner};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::freshness::Settled;
use crate::handle::{BoundHandle, EncryptedHandle};
use crate::handle_cache::HandleCache;
use crate::quote::{Quote, QuoteFetcher};
use crate::session::DecryptionSession;
use crate::swap::{SwapExecutor, SwapRequest};
use crate::types::Address;
use crate::view::View;

pub struct Orchestrator<R, W, L> {
    config: EngineConfig,
    reader: R,
    wallet: W,
    relayer: L,
    quotes: QuoteFetcher,
    swaps: SwapExecutor,
    handles: HandleCache,
    root: CancellationToken,
    /// Child of `root`, replaced on every account change or disconnect
    account_scope: RefCell<CancellationToken>,
    quote_scope: RefCell<CancellationToken>,
    swap_scope: RefCell<CancellationToken>,
    /// Child of the account scope
    decrypt_scope: RefCell<CancellationToken>,
    swap_busy: Cell<bool>,
    decrypting: RefCell<HashSet<EncryptedHandle>>,
    view: RefCell<View>,
}

impl<R: ChainReader, W: WalletSigner, L: Relayer> Orchestrator<R, W, L> {
    pub fn new(config: EngineConfig, reader: R, wallet: W, relayer: L) -> Self {
        let quotes = QuoteFetcher::new(config.swap_address, config.quote_debounce);
        let swaps = SwapExecutor::new(config.swap_address, config.chain_id, config.chain_name.clone());
        let handles = HandleCache::new(config.token_address);
        handles.set_account(wallet.account());

        let root = CancellationToken::new();
        let account = root.child_token();
        let decrypt_scope = RefCell::new(account.child_token());
        let quote_scope = RefCell::new(root.child_token());
        let swap_scope = RefCell::new(root.child_token());

        Self {
            config,
            reader,
            wallet,
            relayer,
            quotes,
            swaps,
            handles,
            root,
            account_scope: RefCell::new(account),
            quote_scope,
            swap_scope,
            decrypt_scope,
            swap_busy: Cell::new(false),
            decrypting: RefCell::new(HashSet::new()),
            view: RefCell::new(View::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn relayer(&self) -> &L {
        &self.relayer
    }

    pub fn handles(&self) -> &HandleCache {
        &self.handles
    }

    /// Snapshot of what a front end should display
    pub fn view(&self) -> View {
        self.view.borrow().clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.root.is_cancelled()
    }

    fn scope(&self) -> CancellationToken {
        self.account_scope.borrow().clone()
    }

    fn renew_scope(&self) {
        renew(&self.account_scope, &self.root);
        renew(&self.decrypt_scope, &self.scope());
    }

    /// Drops any quote still in flight. Later inputs quote as usual.
    pub fn cancel_quote(&self) {
        debug!("cancelling pending quote");
        renew(&self.quote_scope, &self.root);
    }

    /// Stops tracking the swap in flight. A submitted transaction stays on chain.
    pub fn cancel_swap(&self) {
        debug!("cancelling pending swap");
        renew(&self.swap_scope, &self.root);
        self.view.borrow_mut().swapping = false;
    }

    /// Discards every decryption session in flight
    pub fn cancel_decrypt(&self) {
        debug!("cancelling pending decryptions");
        renew(&self.decrypt_scope, &self.scope());
        self.view.borrow_mut().decrypting = false;
    }

    /// Offline preview of `input` at the configured rate, without a chain read
    pub fn preview(&self, input: &str) -> Result<TokenAmount> {
        let amount = NativeAmount::parse_ether(input)?;
        self.config
            .rate
            .convert(amount)
            .ok_or(EngineError::InputInvalid(AmountError::Overflow))
    }

    /// Re-quotes for a new input value
    pub async fn on_amount_change(&self, input: &str) -> Settled<Result<Option<Quote>>> {
        let scope = self.quote_scope.borrow().clone();
        if scope.is_cancelled() {
            return Settled::Stale;
        }
        match self.quotes.fetch(&self.reader, input, &scope).await {
            Ok(Settled::Stale) => Settled::Stale,
            Ok(Settled::Current(quote)) => {
                let mut view = self.view.borrow_mut();
                view.reset_quote();
                view.quote = quote;
                Settled::Current(Ok(quote))
            }
            Err(e) => {
                let mut view = self.view.borrow_mut();
                view.reset_quote();
                view.quote_error = Some(e.to_string());
                Settled::Current(Err(e))
            }
        }
    }

    /// Swaps `input` ether. A confirmed swap is followed by a balance refresh.
    ///
    /// `Err` means the swap was never started; failures after that are carried by
    /// the returned [`SwapRequest`].
    pub async fn on_swap(&self, input: &str) -> Settled<Result<SwapRequest>> {
        let scope = self.swap_scope.borrow().clone();
        if scope.is_cancelled() {
            return Settled::Stale;
        }
        let Some(busy) = BusyFlag::acquire(&self.swap_busy) else {
            return Settled::Current(Err(EngineError::SwapInProgress));
        };
        let amount = match NativeAmount::parse_ether(input) {
            Ok(amount) => amount,
            Err(e) => {
                let err = EngineError::from(e);
                self.view.borrow_mut().swap_status = Some(err.to_string());
                return Settled::Current(Err(err));
            }
        };

        {
            let mut view = self.view.borrow_mut();
            view.swapping = true;
            view.swap_status = Some(SwapRequest::new(amount).status_line());
        }

        let settled = self
            .swaps
            .execute(&self.wallet, amount, &self.handles, &scope, |request| {
                self.view.borrow_mut().swap_status = Some(request.status_line());
            })
            .await;
        drop(busy);

        let request = match settled {
            Settled::Stale => return Settled::Stale,
            Settled::Current(request) => request,
        };
        {
            let mut view = self.view.borrow_mut();
            view.swapping = false;
            view.swap_status = Some(request.status_line());
        }

        // skipped when the account changed while the swap was pending
        if request.invalidated_balance() {
            self.view.borrow_mut().reset_balance();
            self.refresh_balance().await;
        }
        Settled::Current(Ok(request))
    }

    /// Reads the encrypted balance handle for the connected account
    pub async fn refresh_balance(&self) -> Settled<Result<BoundHandle>> {
        let scope = self.scope();
        if scope.is_cancelled() {
            return Settled::Stale;
        }
        match self.handles.refresh(&self.reader, &scope).await {
            Ok(Settled::Stale) => Settled::Stale,
            Ok(Settled::Current(bound)) => {
                let mut view = self.view.borrow_mut();
                view.reset_balance();
                view.handle = Some(bound.handle);
                Settled::Current(Ok(bound))
            }
            Err(e) => {
                let mut view = self.view.borrow_mut();
                view.reset_balance();
                view.balance_status = Some(e.to_string());
                Settled::Current(Err(e))
            }
        }
    }

    /// Reveals the clear value behind the cached handle with a fresh session.
    /// An invalidated cache is read again first.
    pub async fn on_decrypt(&self) -> Settled<Result<TokenAmount>> {
        let scope = self.decrypt_scope.borrow().clone();
        if scope.is_cancelled() {
            return Settled::Stale;
        }
        let Some(account) = self.wallet.account() else {
            return self.decrypt_rejected(EngineError::WalletDisconnected);
        };
        let bound = match self.handles.get_or_refresh(&self.reader, &scope).await {
            Ok(Settled::Current(bound)) => bound,
            Ok(Settled::Stale) => return Settled::Stale,
            Err(e) => return self.decrypt_rejected(e),
        };
        {
            let mut view = self.view.borrow_mut();
            if view.handle != Some(bound.handle) {
                view.reset_balance();
                view.handle = Some(bound.handle);
            }
        }
        let Some(in_flight) = InFlight::acquire(&self.decrypting, bound.handle) else {
            return Settled::Current(Err(EngineError::DecryptInProgress));
        };

        self.view.borrow_mut().decrypting = true;
        let window = AuthorizationWindow::starting_now(self.config.decrypt_window_days);
        let mut session =
            DecryptionSession::new(bound, account, window, self.config.sentinel_shortcut);
        let outcome = session.run(&self.wallet, &self.relayer, &scope).await;
        drop(in_flight);

        if scope.is_cancelled() {
            return Settled::Stale;
        }
        self.view.borrow_mut().decrypting = !self.decrypting.borrow().is_empty();

        let result = match outcome {
            Settled::Stale => return Settled::Stale,
            Settled::Current(result) => result,
        };
        if self.handles.current() != Some(bound) {
            debug!("decrypt: {:?} is no longer the cached handle, dropping result", bound.handle);
            return Settled::Stale;
        }

        let mut view = self.view.borrow_mut();
        match &result {
            Ok(value) => {
                view.clear_balance = Some(*value);
                view.balance_status = None;
            }
            Err(e) => view.balance_status = Some(e.to_string()),
        }
        Settled::Current(result)
    }

    fn decrypt_rejected(&self, err: EngineError) -> Settled<Result<TokenAmount>> {
        self.view.borrow_mut().balance_status = Some(err.to_string());
        Settled::Current(Err(err))
    }

    /// Switches to another account (or none) and reads its handle
    pub async fn on_account_change(&self, account: Option<Address>) -> Settled<Result<BoundHandle>> {
        if self.is_torn_down() {
            return Settled::Stale;
        }
        info!(
            "account changed to {}",
            account.map(|a| a.to_string()).unwrap_or_else(|| "none".into())
        );
        self.renew_scope();
        self.handles.set_account(account);
        {
            let mut view = self.view.borrow_mut();
            view.reset_balance();
            view.decrypting = false;
        }
        if account.is_none() {
            return Settled::Current(Err(EngineError::WalletDisconnected));
        }
        self.refresh_balance().await
    }

    /// Drops the handle and cancels balance flows
    pub fn on_chain_disconnect(&self) {
        if self.is_torn_down() {
            return;
        }
        info!("chain disconnected");
        self.renew_scope();
        self.handles.invalidate();
        let mut view = self.view.borrow_mut();
        view.reset_balance();
        view.decrypting = false;
    }

    /// Cancels every flow. Later completions mutate nothing.
    pub fn teardown(&self) {
        info!("tearing down");
        self.root.cancel();
    }
}

/// Swaps in a fresh child of `parent` and cancels the token it replaces
fn renew(slot: &RefCell<CancellationToken>, parent: &CancellationToken) {
    let previous = slot.replace(parent.child_token());
    previous.cancel();
}

/// Holds the single swap slot until dropped
struct BusyFlag<'a>(&'a Cell<bool>);

impl<'a> BusyFlag<'a> {
    fn acquire(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            return None;
        }
        Some(Self(flag))
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Marks one handle as being decrypted until dropped
struct InFlight<'a> {
    set: &'a RefCell<HashSet<EncryptedHandle>>,
    handle: EncryptedHandle,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a RefCell<HashSet<EncryptedHandle>>, handle: EncryptedHandle) -> Option<Self> {
        if !set.borrow_mut().insert(handle) {
            return None;
        }
        Some(Self { set, handle })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.handle);
    }
}
