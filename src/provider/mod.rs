// src/provider/mod.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, FeeHistory, H256, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::AddChainParams;
use crate::error::ProviderError;

pub mod local;

/// Receiving end of a provider event subscription. Closes when the provider
/// drops its listeners.
pub type EventStream = mpsc::UnboundedReceiver<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEvent {
    ChainChanged,
    AccountsChanged,
}

impl ProviderEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChainChanged => "chainChanged",
            Self::AccountsChanged => "accountsChanged",
        }
    }
}

/// An injected EIP-1193 wallet capability.
#[async_trait]
pub trait Eip1193: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn subscribe(&self, event: ProviderEvent) -> EventStream;

    fn remove_all_listeners(&self, event: ProviderEvent);
}

/// Per-event listener bookkeeping for [`Eip1193`] implementations.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: Mutex<HashMap<ProviderEvent, Vec<mpsc::UnboundedSender<Value>>>>,
}

impl ListenerRegistry {
    pub fn add(&self, event: ProviderEvent) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event)
            .or_default()
            .push(tx);
        rx
    }

    pub fn emit(&self, event: ProviderEvent, payload: Value) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(senders) = listeners.get_mut(&event) {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
        }
    }

    pub fn clear(&self, event: ProviderEvent) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&event);
    }

    pub fn count(&self, event: ProviderEvent) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event)
            .map_or(0, Vec::len)
    }
}

/// Chain identifier as reported by a wallet: usually a hex string, sometimes a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainId {
    Hex(String),
    Numeric(u64),
}

impl ChainId {
    pub fn to_hex_lower(&self) -> String {
        match self {
            Self::Hex(value) => value.to_lowercase(),
            Self::Numeric(value) => format!("{:#x}", value),
        }
    }

    pub fn to_u256(&self) -> Result<U256, ProviderError> {
        match self {
            Self::Numeric(value) => Ok(U256::from(*value)),
            Self::Hex(value) => {
                let lower = value.to_lowercase();
                let digits = lower.strip_prefix("0x").unwrap_or(&lower);
                U256::from_str_radix(digits, 16)
                    .map_err(|e| ProviderError::invalid_response("eth_chainId", e))
            }
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_lower())
    }
}

/// Typed pass-through over an optional [`Eip1193`] capability.
///
/// Every method is a single request; nothing is retried or cached. When no
/// capability is installed each method fails with a `NotInstalled` error.
#[derive(Clone, Default)]
pub struct Wallet {
    provider: Option<Arc<dyn Eip1193>>,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl Wallet {
    pub fn new(provider: Arc<dyn Eip1193>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn not_installed() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    fn provider(&self) -> Result<&Arc<dyn Eip1193>, ProviderError> {
        self.provider.as_ref().ok_or_else(ProviderError::not_installed)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        debug!("provider request {}", method);
        let value = self.provider()?.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| ProviderError::invalid_response(method, e))
    }

    pub async fn get_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request("eth_accounts", json!([])).await
    }

    pub async fn get_chain_id(&self) -> Result<ChainId, ProviderError> {
        self.request("eth_chainId", json!([])).await
    }

    pub async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request("eth_requestAccounts", json!([])).await
    }

    pub async fn switch_chain(&self, chain_id: &str) -> Result<(), ProviderError> {
        self.request::<Value>("wallet_switchEthereumChain", json!([{ "chainId": chain_id }]))
            .await
            .map(drop)
    }

    pub async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
        self.request::<Value>("wallet_addEthereumChain", json!([params]))
            .await
            .map(drop)
    }

    pub async fn revoke_permissions(&self) -> Result<(), ProviderError> {
        self.request::<Value>("wallet_revokePermissions", json!([{ "eth_accounts": {} }]))
            .await
            .map(drop)
    }

    pub fn on_chain_changed(&self) -> Result<EventStream, ProviderError> {
        Ok(self.provider()?.subscribe(ProviderEvent::ChainChanged))
    }

    pub fn on_accounts_changed(&self) -> Result<EventStream, ProviderError> {
        Ok(self.provider()?.subscribe(ProviderEvent::AccountsChanged))
    }

    pub fn remove_all_listeners(&self) {
        if let Some(provider) = &self.provider {
            provider.remove_all_listeners(ProviderEvent::ChainChanged);
            provider.remove_all_listeners(ProviderEvent::AccountsChanged);
        }
    }

    pub async fn call_contract(&self, to: Address, data: &Bytes) -> Result<Bytes, ProviderError> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    pub async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: &Bytes,
    ) -> Result<H256, ProviderError> {
        self.request(
            "eth_sendTransaction",
            json!([{ "from": from, "to": to, "data": data }]),
        )
        .await
    }

    pub async fn get_balance(&self, address: Address) -> Result<U256, ProviderError> {
        self.request("eth_getBalance", json!([address, "latest"])).await
    }

    pub async fn get_fee_history(
        &self,
        block_count: &str,
        reward_percentiles: &[f64],
    ) -> Result<FeeHistory, ProviderError> {
        self.request(
            "eth_feeHistory",
            json!([block_count, "latest", reward_percentiles]),
        )
        .await
    }

    /// `personal_sign`; the wallet applies the EIP-191 prefix.
    pub async fn personal_sign(
        &self,
        message: &Bytes,
        address: Address,
    ) -> Result<Bytes, ProviderError> {
        self.request("personal_sign", json!([message, address])).await
    }
}
