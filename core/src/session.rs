//! One-shot user decryption.
//!
//! A [`DecryptionSession`] reveals the clear value behind exactly one handle. It
//! generates a fresh X25519 keypair, has the relayer build the typed authorization,
//! collects the wallet signature over it and asks the relayer for the value sealed
//! to the session key. The secret half of the keypair never leaves [`run`] and is
//! dropped when the session reaches a terminal state.
//!
//! [`run`]: DecryptionSession::run

use std::fmt;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::amount::TokenAmount;
use crate::authorization::{AuthorizationWindow, Signature, TypedPayload};
use crate::client::{ClientError, DecryptionRequest, Relayer, WalletSigner};
use crate::error::{EngineError, Result};
use crate::freshness::Settled;
use crate::handle::BoundHandle;
use crate::types::Address;

/// Single-use X25519 keypair
pub struct EphemeralKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random();
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Shared secret with a peer public key
    pub fn diffie_hellman(&self, peer: &[u8; 32]) -> [u8; 32] {
        self.secret
            .diffie_hellman(&PublicKey::from(*peer))
            .to_bytes()
    }
}

impl fmt::Debug for EphemeralKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeypair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    KeyGenerated,
    AuthorizationBuilt,
    Signed,
    Requested,
    Resolved(TokenAmount),
    Failed(EngineError),
    /// Cancelled or interrupted before reaching an outcome
    Discarded,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Resolved(_) | SessionState::Failed(_) | SessionState::Discarded
        )
    }
}

#[derive(Debug)]
pub struct DecryptionSession {
    target: BoundHandle,
    account: Address,
    window: AuthorizationWindow,
    sentinel_shortcut: bool,
    public_key: Option<[u8; 32]>,
    payload: Option<TypedPayload>,
    signature: Option<Signature>,
    state: SessionState,
}

impl DecryptionSession {
    pub fn new(
        target: BoundHandle,
        account: Address,
        window: AuthorizationWindow,
        sentinel_shortcut: bool,
    ) -> Self {
        Self {
            target,
            account,
            window,
            sentinel_shortcut,
            public_key: None,
            payload: None,
            signature: None,
            state: SessionState::Idle,
        }
    }

    pub fn target(&self) -> BoundHandle {
        self.target
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn window(&self) -> AuthorizationWindow {
        self.window
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Public half of the session keypair, once generated
    pub fn public_key(&self) -> Option<[u8; 32]> {
        self.public_key
    }

    pub fn payload(&self) -> Option<&TypedPayload> {
        self.payload.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Drives the session to a terminal state.
    ///
    /// Calling it again after a terminal state returns the same outcome without any
    /// external call. A session whose earlier run was interrupted is discarded.
    pub async fn run<W: WalletSigner, L: Relayer>(
        &mut self,
        wallet: &W,
        relayer: &L,
        cancel: &CancellationToken,
    ) -> Settled<Result<TokenAmount>> {
        match &self.state {
            SessionState::Idle => {}
            SessionState::Resolved(value) => return Settled::Current(Ok(*value)),
            SessionState::Failed(err) => return Settled::Current(Err(err.clone())),
            SessionState::Discarded => return Settled::Stale,
            _ => return self.discard(),
        }
        if cancel.is_cancelled() {
            return self.discard();
        }

        if self.sentinel_shortcut && self.target.handle.is_empty() {
            debug!("decrypt: empty handle resolves to zero");
            return self.resolve(TokenAmount::ZERO);
        }

        let keypair = EphemeralKeypair::generate();
        let public_key = keypair.public_key_bytes();
        self.public_key = Some(public_key);
        self.state = SessionState::KeyGenerated;

        let contracts = [self.target.contract];
        debug!("decrypt: building authorization for {:?}", self.target.handle);
        let payload = relayer
            .build_authorization(&public_key, &contracts, self.window)
            .await;
        if cancel.is_cancelled() {
            return self.discard();
        }
        let payload = match payload {
            Ok(p) => p,
            Err(e) => return self.fail(relayer_error(e)),
        };
        if payload.message.public_key != public_key
            || payload.message.contract_addresses != contracts
            || payload.message.window != self.window
        {
            warn!("decrypt: relayer authorization does not match the request");
            return self.fail(EngineError::RelayerUnavailable(
                "Relayer returned an authorization for a different request.".into(),
            ));
        }
        self.state = SessionState::AuthorizationBuilt;

        debug!("decrypt: requesting signature from {}", self.account);
        let signed = wallet.sign_typed_data(&payload).await;
        self.payload = Some(payload);
        if cancel.is_cancelled() {
            return self.discard();
        }
        let signature = match signed {
            Ok(sig) => sig,
            Err(ClientError::Rejected(_)) => return self.fail(EngineError::UserRejected),
            Err(e) => return self.fail(EngineError::SigningFailed(e.message())),
        };
        self.state = SessionState::Signed;

        let handles = [self.target];
        let request = DecryptionRequest {
            handles: &handles,
            keypair: &keypair,
            signature: &signature,
            contract_addresses: &contracts,
            account: self.account,
            window: self.window,
        };
        self.state = SessionState::Requested;
        debug!("decrypt: requesting clear value from relayer");
        let response = relayer.request_decryption(request).await;
        self.signature = Some(signature);
        drop(keypair);
        if cancel.is_cancelled() {
            return self.discard();
        }

        match response {
            Ok(values) => match values.get(&self.target.handle) {
                Some(raw) => self.resolve(TokenAmount::from_raw(*raw)),
                None => self.fail(EngineError::DecryptionIncomplete),
            },
            Err(e) => self.fail(relayer_error(e)),
        }
    }

    fn resolve(&mut self, value: TokenAmount) -> Settled<Result<TokenAmount>> {
        info!("decrypt: resolved {:?} to {}", self.target.handle, value);
        self.state = SessionState::Resolved(value);
        Settled::Current(Ok(value))
    }

    fn fail(&mut self, err: EngineError) -> Settled<Result<TokenAmount>> {
        warn!("decrypt: {}", err);
        self.state = SessionState::Failed(err.clone());
        Settled::Current(Err(err))
    }

    fn discard(&mut self) -> Settled<Result<TokenAmount>> {
        debug!("decrypt: session for {:?} discarded", self.target.handle);
        self.state = SessionState::Discarded;
        Settled::Stale
    }
}

fn relayer_error(err: ClientError) -> EngineError {
    match err {
        ClientError::Rejected(_) => EngineError::UserRejected,
        other => EngineError::RelayerUnavailable(other.message()),
    }
}
