// src/executor.rs
use ethers::types::{Address, Bytes, H256};
use tracing::info;

use crate::builder::OperationBuilder;
use crate::bundler::BundlerClient;
use crate::config::RelayConfig;
use crate::error::ExecutionError;
use crate::provider::Wallet;
use crate::relayer::OperationRelayer;

/// Runs the full pipeline for one smart-account call: balance, nonce, call
/// data, fees, chain id, hash, signature, submission. Each step waits on the
/// previous one and nothing is retried.
///
/// The bundler client is only created once an operation has been assembled,
/// so an unfunded account never touches the bundler URL.
pub struct SmartAccountExecutor {
    wallet: Wallet,
    builder: OperationBuilder,
    bundler_url: String,
    entry_point: Address,
}

impl SmartAccountExecutor {
    pub fn new(wallet: Wallet, config: &RelayConfig) -> Self {
        Self {
            builder: OperationBuilder::new(wallet.clone(), config.gas_limits, config.fee_floors),
            bundler_url: config.bundler_url.clone(),
            entry_point: config.entry_point,
            wallet,
        }
    }

    pub async fn execute(
        &self,
        smart_account: Address,
        eoa: Address,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<H256, ExecutionError> {
        if !self.wallet.is_installed() {
            return Err(ExecutionError::ProviderUnavailable);
        }

        let unsigned = self
            .builder
            .build(smart_account, target, target_call_data)
            .await?;

        let chain_id = self.wallet.get_chain_id().await?.to_u256()?;

        // Before the signature request: a bad URL must not cost the user a prompt.
        let bundler = BundlerClient::new(&self.bundler_url)?;
        let relayer = OperationRelayer::new(self.wallet.clone(), bundler, self.entry_point);
        let signed = relayer.sign(unsigned, eoa, chain_id).await?;

        info!(
            "Submitting user operation for {:?} (nonce {}) on chain {}",
            smart_account, signed.nonce, chain_id
        );
        relayer.submit(&signed).await
    }
}

pub async fn execute_smart_account_transaction(
    wallet: &Wallet,
    config: &RelayConfig,
    smart_account: Address,
    eoa: Address,
    target: Address,
    target_call_data: Bytes,
) -> Result<H256, ExecutionError> {
    SmartAccountExecutor::new(wallet.clone(), config)
        .execute(smart_account, eoa, target, target_call_data)
        .await
}
