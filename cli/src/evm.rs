//! JSON-RPC adapters for the engine, backed by `ethers`.

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{H160, H256, TransactionRequest, U256};
use log::debug;
use zaswap_core::abi::ContractCall;
use zaswap_core::{
    Address, ChainReader, ClientError, NativeAmount, Receipt, Signature, TxHash, TypedPayload,
    WalletSigner,
};

type Client = SignerMiddleware<Provider<Http>, LocalWallet>;

pub fn provider(rpc_url: &str) -> anyhow::Result<Provider<Http>> {
    Provider::<Http>::try_from(rpc_url)
        .map_err(|e| anyhow::anyhow!("Invalid RPC URL {}: {}", rpc_url, e))
}

fn call_request(call: &ContractCall) -> TransactionRequest {
    TransactionRequest::new()
        .to(H160(call.to.0))
        .data(call.calldata())
}

/// Maps a node error, recognising reverts by their JSON-RPC message
fn classify(err: impl std::fmt::Display) -> ClientError {
    let message = err.to_string();
    if message.contains("execution reverted") {
        let reason = message
            .split_once("execution reverted:")
            .map(|(_, r)| r.trim().to_string())
            .filter(|r| !r.is_empty());
        return ClientError::Reverted { reason };
    }
    ClientError::Transport(message)
}

// ============================================================================
// Reader
// ============================================================================

pub struct EvmReader {
    provider: Provider<Http>,
}

impl EvmReader {
    pub fn new(provider: Provider<Http>) -> Self {
        Self { provider }
    }
}

impl ChainReader for EvmReader {
    async fn read(&self, call: &ContractCall) -> Result<Vec<u8>, ClientError> {
        let tx: TypedTransaction = call_request(call).into();
        debug!("eth_call {} on {}", call.signature, call.to);
        self.provider
            .call(&tx, None)
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(classify)
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Local-key wallet. Without a key it is a disconnected wallet.
pub struct EvmWallet {
    provider: Provider<Http>,
    client: Option<Client>,
}

impl EvmWallet {
    pub fn disconnected(provider: Provider<Http>) -> Self {
        Self {
            provider,
            client: None,
        }
    }

    pub fn with_key(provider: Provider<Http>, private_key: &str, chain_id: u64) -> anyhow::Result<Self> {
        let wallet: LocalWallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid private key: {}", e))?;
        let client = SignerMiddleware::new(provider.clone(), wallet.with_chain_id(chain_id));
        Ok(Self {
            provider,
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&Client, ClientError> {
        self.client
            .as_ref()
            .ok_or_else(|| ClientError::Transport("No signer configured".into()))
    }
}

impl WalletSigner for EvmWallet {
    fn account(&self) -> Option<Address> {
        self.client.as_ref().map(|c| Address(c.address().0))
    }

    async fn chain_id(&self) -> Result<u64, ClientError> {
        self.provider
            .get_chainid()
            .await
            .map(|id| id.as_u64())
            .map_err(classify)
    }

    async fn submit(&self, call: &ContractCall, value: NativeAmount) -> Result<TxHash, ClientError> {
        let client = self.client()?;
        let tx = call_request(call).value(U256::from(value.raw()));
        let pending = client.send_transaction(tx, None).await.map_err(classify)?;
        Ok(TxHash(pending.tx_hash().0))
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Result<Receipt, ClientError> {
        let receipt = PendingTransaction::new(H256(tx_hash.0), &self.provider)
            .await
            .map_err(classify)?
            .ok_or_else(|| ClientError::Transport("Transaction dropped from mempool".into()))?;

        Ok(Receipt {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()).unwrap_or_default(),
            success: receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false),
            revert_reason: None,
        })
    }

    async fn sign_typed_data(&self, payload: &TypedPayload) -> Result<Signature, ClientError> {
        let client = self.client()?;
        let signature = client
            .signer()
            .sign_hash(H256(payload.signing_digest()))
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Signature(signature.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_revert_reason() {
        assert_eq!(
            classify("(code: 3, message: execution reverted: Insufficient liquidity)"),
            ClientError::Reverted {
                reason: Some("Insufficient liquidity)".into())
            }
        );
        assert_eq!(
            classify("execution reverted"),
            ClientError::Reverted { reason: None }
        );
        assert_eq!(
            classify("connection refused"),
            ClientError::Transport("connection refused".into())
        );
    }

    #[test]
    fn test_wallet_account_from_key() {
        let provider = provider("http://127.0.0.1:8545").unwrap();
        // well-known development key #0
        let wallet = EvmWallet::with_key(
            provider,
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            11155111,
        )
        .unwrap();
        assert_eq!(
            wallet.account().unwrap().to_string(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_disconnected_wallet_has_no_account() {
        let wallet = EvmWallet::disconnected(provider("http://127.0.0.1:8545").unwrap());
        assert_eq!(wallet.account(), None);
    }
}
