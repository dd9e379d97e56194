//! Scripted in-memory chain, wallet and relayer.
//!
//! Every collaborator counts its calls. Any call can be held open with a gate so a
//! test decides the completion order.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use zaswap_core::abi::{self, ContractCall, Word};
use zaswap_core::{
    Address, AuthorizationWindow, ChainReader, ClientError, DecryptionRequest, Eip712Domain,
    EncryptedHandle, EngineConfig, FixedRate, NativeAmount, Orchestrator, Receipt, Relayer,
    Signature, TxHash, TypedPayload, WalletSigner,
};

pub const SEPOLIA: u64 = 11155111;
pub const TOKEN: Address = Address([0x70; 20]);
pub const SWAP: Address = Address([0x5a; 20]);
pub const DECRYPTION: Address = Address([0xb6; 20]);
pub const ALICE: Address = Address([0xa1; 20]);
pub const BOB: Address = Address([0xb0; 20]);

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        chain_id: SEPOLIA,
        chain_name: "Sepolia".into(),
        token_address: TOKEN,
        swap_address: SWAP,
        decryption_domain: Eip712Domain {
            name: "Decryption".into(),
            version: "1".into(),
            chain_id: SEPOLIA,
            verifying_contract: DECRYPTION,
        },
        quote_debounce: Duration::ZERO,
        decrypt_window_days: 7,
        sentinel_shortcut: true,
        rate: FixedRate::new(3300),
    }
}

pub type TestOrchestrator<'a> = Orchestrator<&'a MockChain, &'a MockWallet<'a>, &'a MockRelayer>;

pub fn orchestrator<'a>(
    chain: &'a MockChain,
    wallet: &'a MockWallet<'a>,
    relayer: &'a MockRelayer,
) -> TestOrchestrator<'a> {
    Orchestrator::new(engine_config(), chain, wallet, relayer)
}

pub fn wei(ether: &str) -> u128 {
    NativeAmount::parse_ether(ether).unwrap().raw()
}

// ============================================================================
// Gates
// ============================================================================

/// Named one-shot barriers. The first call passing a held gate waits for release.
#[derive(Default)]
pub struct Gates {
    held: RefCell<HashMap<String, oneshot::Receiver<()>>>,
}

impl Gates {
    pub fn hold(&self, key: impl Into<String>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.held.borrow_mut().insert(key.into(), rx);
        tx
    }

    pub async fn pass(&self, key: &str) {
        let rx = self.held.borrow_mut().remove(key);
        if let Some(rx) = rx {
            let _ = rx.await;
        }
    }
}

// ============================================================================
// Chain
// ============================================================================

pub struct MockChain {
    pub rate: FixedRate,
    pub quote_reads: Cell<usize>,
    pub handle_reads: Cell<usize>,
    pub fail_quotes: Cell<bool>,
    pub fail_handles: Cell<bool>,
    balances: RefCell<HashMap<Address, EncryptedHandle>>,
    next_handle: Cell<u8>,
    pub gates: Gates,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            rate: FixedRate::new(3300),
            quote_reads: Cell::new(0),
            handle_reads: Cell::new(0),
            fail_quotes: Cell::new(false),
            fail_handles: Cell::new(false),
            balances: RefCell::new(HashMap::new()),
            next_handle: Cell::new(1),
            gates: Gates::default(),
        }
    }
}

impl MockChain {
    /// Never-funded accounts read as the empty handle
    pub fn handle_of(&self, account: Address) -> EncryptedHandle {
        self.balances
            .borrow()
            .get(&account)
            .copied()
            .unwrap_or(EncryptedHandle::EMPTY)
    }

    /// Gives `account` a new ciphertext, as a mined swap would
    pub fn credit(&self, account: Address) -> EncryptedHandle {
        let n = self.next_handle.get();
        self.next_handle.set(n.wrapping_add(1));
        let handle = EncryptedHandle([n; 32]);
        self.balances.borrow_mut().insert(account, handle);
        handle
    }

    /// Holds the quote read for `ether`
    pub fn hold_quote(&self, ether: &str) -> oneshot::Sender<()> {
        self.gates.hold(format!("quote:{}", wei(ether)))
    }

    /// Holds the next balance handle read
    pub fn hold_balance(&self) -> oneshot::Sender<()> {
        self.gates.hold("balance")
    }
}

impl ChainReader for MockChain {
    async fn read(&self, call: &ContractCall) -> Result<Vec<u8>, ClientError> {
        match (call.signature, call.args.as_slice()) {
            (abi::QUOTE, [Word::Uint(value)]) => {
                assert_eq!(call.to, SWAP);
                self.quote_reads.set(self.quote_reads.get() + 1);
                self.gates.pass(&format!("quote:{value}")).await;
                if self.fail_quotes.get() {
                    return Err(ClientError::Transport("execution reverted".into()));
                }
                let out = self
                    .rate
                    .convert(NativeAmount::from_raw(*value))
                    .ok_or_else(|| ClientError::Reverted { reason: None })?;
                Ok(abi::uint_word(out.raw()).to_vec())
            }
            (abi::CONFIDENTIAL_BALANCE_OF, [Word::Address(account)]) => {
                assert_eq!(call.to, TOKEN);
                self.handle_reads.set(self.handle_reads.get() + 1);
                // state as of the call, like a read pinned to a block
                let handle = self.handle_of(*account);
                self.gates.pass("balance").await;
                if self.fail_handles.get() {
                    return Err(ClientError::Transport("header not found".into()));
                }
                Ok(handle.0.to_vec())
            }
            _ => Err(ClientError::Transport(format!("unexpected call {}", call.signature))),
        }
    }
}

// ============================================================================
// Wallet
// ============================================================================

#[derive(Debug, Clone)]
pub enum ReceiptMode {
    Success,
    Revert(Option<String>),
    Lost,
}

pub struct MockWallet<'a> {
    chain: &'a MockChain,
    pub account: Cell<Option<Address>>,
    pub chain_id: Cell<u64>,
    pub submits: Cell<usize>,
    pub signatures: Cell<usize>,
    pub submit_error: RefCell<Option<ClientError>>,
    pub receipt: RefCell<ReceiptMode>,
    pub reject_signature: Cell<bool>,
    pub signed: RefCell<Vec<TypedPayload>>,
    pub block: Cell<u64>,
    pub gates: Gates,
}

impl<'a> MockWallet<'a> {
    pub fn new(chain: &'a MockChain, account: Option<Address>) -> Self {
        Self {
            chain,
            account: Cell::new(account),
            chain_id: Cell::new(SEPOLIA),
            submits: Cell::new(0),
            signatures: Cell::new(0),
            submit_error: RefCell::new(None),
            receipt: RefCell::new(ReceiptMode::Success),
            reject_signature: Cell::new(false),
            signed: RefCell::new(Vec::new()),
            block: Cell::new(4_200_000),
            gates: Gates::default(),
        }
    }
}

impl WalletSigner for MockWallet<'_> {
    fn account(&self) -> Option<Address> {
        self.account.get()
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        Ok(self.chain_id.get())
    }

    async fn submit(&self, call: &ContractCall, value: NativeAmount) -> Result<TxHash, ClientError> {
        assert_eq!(call.to, SWAP);
        assert_eq!(call.signature, abi::SWAP);
        assert!(!value.is_zero());
        self.submits.set(self.submits.get() + 1);
        self.gates.pass("submit").await;
        if let Some(err) = self.submit_error.borrow().clone() {
            return Err(err);
        }
        Ok(TxHash([self.submits.get() as u8; 32]))
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Receipt, ClientError> {
        self.gates.pass("confirm").await;
        let block_number = self.block.get() + 1;
        self.block.set(block_number);
        let mode = self.receipt.borrow().clone();
        match mode {
            ReceiptMode::Success => {
                if let Some(account) = self.account.get() {
                    self.chain.credit(account);
                }
                Ok(Receipt {
                    tx_hash,
                    block_number,
                    success: true,
                    revert_reason: None,
                })
            }
            ReceiptMode::Revert(reason) => Ok(Receipt {
                tx_hash,
                block_number,
                success: false,
                revert_reason: reason,
            }),
            ReceiptMode::Lost => Err(ClientError::Transport("transaction dropped".into())),
        }
    }

    async fn sign_typed_data(&self, payload: &TypedPayload) -> Result<Signature, ClientError> {
        self.signatures.set(self.signatures.get() + 1);
        self.gates.pass("sign").await;
        if self.reject_signature.get() {
            return Err(ClientError::Rejected("User denied message signature".into()));
        }
        self.signed.borrow_mut().push(payload.clone());
        Ok(Signature(vec![0x11; 65]))
    }
}

// ============================================================================
// Relayer
// ============================================================================

pub struct MockRelayer {
    pub domain: Eip712Domain,
    pub authorizations: Cell<usize>,
    pub requests: Cell<usize>,
    pub public_keys: RefCell<Vec<[u8; 32]>>,
    pub windows: RefCell<Vec<AuthorizationWindow>>,
    /// Clear values the relayer knows; the empty handle always decrypts to 0
    pub values: RefCell<HashMap<EncryptedHandle, u128>>,
    pub omit_values: Cell<bool>,
    pub failure: RefCell<Option<String>>,
    pub gates: Gates,
}

impl Default for MockRelayer {
    fn default() -> Self {
        Self {
            domain: engine_config().decryption_domain,
            authorizations: Cell::new(0),
            requests: Cell::new(0),
            public_keys: RefCell::new(Vec::new()),
            windows: RefCell::new(Vec::new()),
            values: RefCell::new(HashMap::new()),
            omit_values: Cell::new(false),
            failure: RefCell::new(None),
            gates: Gates::default(),
        }
    }
}

impl MockRelayer {
    pub fn knows(&self, handle: EncryptedHandle, value: u128) {
        self.values.borrow_mut().insert(handle, value);
    }
}

impl Relayer for MockRelayer {
    async fn build_authorization(
        &self,
        public_key: &[u8; 32],
        contract_addresses: &[Address],
        window: AuthorizationWindow,
    ) -> Result<TypedPayload, ClientError> {
        self.authorizations.set(self.authorizations.get() + 1);
        Ok(TypedPayload::new(
            self.domain.clone(),
            zaswap_core::authorization::UserDecryptRequest {
                public_key: public_key.to_vec(),
                contract_addresses: contract_addresses.to_vec(),
                window,
            },
        ))
    }

    async fn request_decryption(
        &self,
        request: DecryptionRequest<'_>,
    ) -> Result<HashMap<EncryptedHandle, u128>, ClientError> {
        self.requests.set(self.requests.get() + 1);
        self.public_keys
            .borrow_mut()
            .push(request.keypair.public_key_bytes());
        self.windows.borrow_mut().push(request.window);
        self.gates.pass("decrypt").await;

        if let Some(message) = self.failure.borrow().clone() {
            return Err(ClientError::Transport(message));
        }
        if self.omit_values.get() {
            return Ok(HashMap::new());
        }
        let values = self.values.borrow();
        Ok(request
            .handles
            .iter()
            .filter_map(|bound| {
                if bound.handle.is_empty() {
                    return Some((bound.handle, 0));
                }
                values.get(&bound.handle).map(|v| (bound.handle, *v))
            })
            .collect())
    }
}
