// src/provider/local.rs
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider, RpcError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionRequest};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{ProviderError, CHAIN_UNREGISTERED_CODE};
use crate::provider::{ChainId, Eip1193, EventStream, ListenerRegistry, ProviderEvent};

/// [`Eip1193`] capability backed by a JSON-RPC node and a local private key.
///
/// Stands in for a browser wallet: reads go to the node, account and signing
/// requests are answered by the key. The node's chain is fixed, so switching
/// to any other chain fails as unregistered. No events are ever emitted.
pub struct LocalProvider {
    wallet: LocalWallet,
    client: Provider<Http>,
    chain_id: u64,
    listeners: ListenerRegistry,
}

impl LocalProvider {
    pub async fn connect(private_key: &str, eth_rpc_url: &str) -> Result<Self, ProviderError> {
        let client = Provider::<Http>::try_from(eth_rpc_url).map_err(ProviderError::internal)?;

        let chain_id = client
            .get_chainid()
            .await
            .map_err(|e| from_ethers(&e))?
            .as_u64();

        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(ProviderError::internal)?;

        let provider = Self::new(wallet, client, chain_id);
        info!(
            "Initialized local provider for {:?} on chain {}",
            provider.address(),
            chain_id
        );
        Ok(provider)
    }

    /// Uses `chain_id` as the node's chain without asking the node.
    pub fn new(wallet: LocalWallet, client: Provider<Http>, chain_id: u64) -> Self {
        Self {
            wallet: wallet.with_chain_id(chain_id),
            client,
            chain_id,
            listeners: ListenerRegistry::default(),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    fn switch_chain(&self, params: &Value) -> Result<Value, ProviderError> {
        let requested: ChainId = serde_json::from_value(params[0]["chainId"].clone())
            .map_err(|e| ProviderError::invalid_response("wallet_switchEthereumChain", e))?;
        let own = ChainId::Numeric(self.chain_id);

        if requested.to_hex_lower() == own.to_hex_lower() {
            Ok(Value::Null)
        } else {
            Err(ProviderError::new(
                CHAIN_UNREGISTERED_CODE,
                format!("Unrecognized chain ID \"{}\"", requested),
            ))
        }
    }

    async fn personal_sign(&self, params: &Value) -> Result<Value, ProviderError> {
        let message: Bytes = serde_json::from_value(params[0].clone())
            .map_err(|e| ProviderError::invalid_response("personal_sign", e))?;

        let signature = self
            .wallet
            .sign_message(message.as_ref())
            .await
            .map_err(ProviderError::internal)?;

        Ok(json!(Bytes::from(signature.to_vec())))
    }

    async fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        let tx: TransactionRequest = serde_json::from_value(params[0].clone())
            .map_err(|e| ProviderError::invalid_response("eth_sendTransaction", e))?;

        let signer = SignerMiddleware::new(self.client.clone(), self.wallet.clone());
        let pending = signer
            .send_transaction(tx, None)
            .await
            .map_err(ProviderError::internal)?;

        Ok(json!(pending.tx_hash()))
    }
}

#[async_trait]
impl Eip1193 for LocalProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([self.wallet.address()])),
            "eth_chainId" => Ok(json!(ChainId::Numeric(self.chain_id).to_hex_lower())),
            "wallet_switchEthereumChain" => self.switch_chain(&params),
            "wallet_addEthereumChain" | "wallet_revokePermissions" => Ok(Value::Null),
            "personal_sign" => self.personal_sign(&params).await,
            "eth_sendTransaction" => self.send_transaction(&params).await,
            _ => {
                debug!("forwarding {} to node", method);
                self.client
                    .request::<Value, Value>(method, params)
                    .await
                    .map_err(|e| from_ethers(&e))
            }
        }
    }

    fn subscribe(&self, event: ProviderEvent) -> EventStream {
        self.listeners.add(event)
    }

    fn remove_all_listeners(&self, event: ProviderEvent) {
        self.listeners.clear(event);
    }
}

fn from_ethers(err: &ethers::providers::ProviderError) -> ProviderError {
    match err.as_error_response() {
        Some(rpc) => ProviderError::new(rpc.code, rpc.message.clone()),
        None => ProviderError::internal(err),
    }
}
