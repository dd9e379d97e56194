//! HTTP user-decryption relayer.
//!
//! ```text
//! POST {url}/v1/user-decrypt   body: UserDecryptBody
//!                              reply: ApiResponse<UserDecryptReply>
//! ```
//!
//! The typed authorization is built locally from the configured EIP-712 domain. Only
//! the session public key and the wallet signature are sent; replies are sealed to
//! the session key and opened here.

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use zaswap_core::authorization::UserDecryptRequest;
use zaswap_core::{
    Address, AuthorizationWindow, ClientError, DecryptionRequest, Eip712Domain,
    EncryptedHandle, EphemeralKeypair, Relayer, TypedPayload,
};

use crate::sealed::{SealedValue, open_clear_value};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpRelayerConfig {
    /// Base URL, e.g. "https://relayer.testnet.zama.cloud"
    pub url: String,
    /// Domain the wallet signs the authorization under
    pub domain: Eip712Domain,
    pub timeout: Duration,
}

impl HttpRelayerConfig {
    pub fn new(url: impl Into<String>, domain: Eip712Domain) -> Self {
        Self {
            url: url.into(),
            domain,
            timeout: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleContractPair {
    pub handle: EncryptedHandle,
    pub contract_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestValidity {
    pub start_timestamp: String,
    pub duration_days: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDecryptBody {
    pub handle_contract_pairs: Vec<HandleContractPair>,
    pub request_validity: RequestValidity,
    pub contracts_chain_id: u64,
    pub contract_addresses: Vec<Address>,
    pub user_address: Address,
    /// Hex without `0x`
    pub signature: String,
    /// Hex without `0x`
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedEntry {
    pub handle: EncryptedHandle,
    #[serde(with = "hex::serde")]
    pub relayer_public_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub nonce: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub ciphertext: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDecryptReply {
    pub values: Vec<SealedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Success { data: T },
    Error { message: String },
}

// ============================================================================
// Client
// ============================================================================

pub struct HttpRelayer {
    config: HttpRelayerConfig,
    client: reqwest::Client,
}

impl HttpRelayer {
    pub fn new(config: HttpRelayerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpRelayerConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/user-decrypt", self.config.url.trim_end_matches('/'))
    }

    async fn post(&self, body: &UserDecryptBody) -> Result<UserDecryptReply, ClientError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("Relayer unreachable: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("Relayer response unreadable: {e}")))?;
        parse_reply(status.as_u16(), &text)
    }
}

impl Relayer for HttpRelayer {
    async fn build_authorization(
        &self,
        public_key: &[u8; 32],
        contract_addresses: &[Address],
        window: AuthorizationWindow,
    ) -> Result<TypedPayload, ClientError> {
        Ok(TypedPayload::new(
            self.config.domain.clone(),
            UserDecryptRequest {
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
        let body = request_body(&request, self.config.domain.chain_id);
        info!(
            "Requesting user decryption of {} handle(s) for {}",
            body.handle_contract_pairs.len(),
            body.user_address
        );
        let reply = self.post(&body).await?;
        open_reply(reply, request.handles.iter().map(|b| b.handle), request.keypair)
    }
}

/// Wire body for a decryption request
pub fn request_body(request: &DecryptionRequest<'_>, chain_id: u64) -> UserDecryptBody {
    UserDecryptBody {
        handle_contract_pairs: request
            .handles
            .iter()
            .map(|b| HandleContractPair {
                handle: b.handle,
                contract_address: b.contract,
            })
            .collect(),
        request_validity: RequestValidity {
            start_timestamp: request.window.start_timestamp.to_string(),
            duration_days: request.window.duration_days.to_string(),
        },
        contracts_chain_id: chain_id,
        contract_addresses: request.contract_addresses.to_vec(),
        user_address: request.account,
        signature: request.signature.to_bare_hex(),
        public_key: hex::encode(request.keypair.public_key_bytes()),
    }
}

/// Maps an HTTP status and body to a reply, keeping relayer messages verbatim
pub fn parse_reply(status: u16, text: &str) -> Result<UserDecryptReply, ClientError> {
    match serde_json::from_str::<ApiResponse<UserDecryptReply>>(text) {
        Ok(ApiResponse::Success { data }) if (200..300).contains(&status) => Ok(data),
        Ok(ApiResponse::Error { message }) => {
            warn!("Relayer error ({}): {}", status, message);
            Err(ClientError::Transport(message))
        }
        _ if !(200..300).contains(&status) => Err(ClientError::Transport(format!(
            "Relayer didn't respond correctly. Bad status {status}"
        ))),
        _ => Err(ClientError::Transport(
            "Relayer didn't respond correctly. Bad JSON.".into(),
        )),
    }
}

/// Opens the sealed values for the requested handles. Unrequested entries are ignored.
pub fn open_reply(
    reply: UserDecryptReply,
    requested: impl IntoIterator<Item = EncryptedHandle>,
    keypair: &EphemeralKeypair,
) -> Result<HashMap<EncryptedHandle, u128>, ClientError> {
    let requested: Vec<EncryptedHandle> = requested.into_iter().collect();
    let mut values = HashMap::new();

    for entry in reply.values {
        if !requested.contains(&entry.handle) {
            debug!("Ignoring unrequested handle {:?}", entry.handle);
            continue;
        }
        let sealed = to_sealed(&entry)?;
        let value = open_clear_value(keypair, &entry.handle, &sealed).map_err(|e| {
            warn!("Could not open value for {:?}: {}", entry.handle, e);
            ClientError::Transport(format!("Relayer returned an unreadable value: {e}"))
        })?;
        values.insert(entry.handle, value);
    }
    Ok(values)
}

fn to_sealed(entry: &SealedEntry) -> Result<SealedValue, ClientError> {
    let malformed = |field: &str| {
        ClientError::Transport(format!("Relayer returned a malformed {field}"))
    };
    Ok(SealedValue {
        relayer_public_key: entry
            .relayer_public_key
            .as_slice()
            .try_into()
            .map_err(|_| malformed("public key"))?,
        nonce: entry.nonce.as_slice().try_into().map_err(|_| malformed("nonce"))?,
        ciphertext: entry.ciphertext.clone(),
    })
}
