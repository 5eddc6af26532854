// src/builder.rs
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::contract::abigen;
use ethers::types::{Address, Bytes, U256};
use tracing::{debug, info};

use crate::config::{FeeFloors, GasLimits};
use crate::error::{ExecutionError, ProviderError};
use crate::fees::{estimate_fees, FeeHistoryReading, GasFees, FEE_HISTORY_BLOCKS, REWARD_PERCENTILE};
use crate::provider::Wallet;
use crate::user_op::UnsignedUserOperation;

abigen!(
    SmartAccount,
    r#"[
        function execute(address dest, uint256 value, bytes func)
        function nonce() external view returns (uint256)
    ]"#,
);

/// `execute(target, 0, target_call_data)` on the smart account.
pub fn encode_execute(target: Address, target_call_data: Bytes) -> Bytes {
    ExecuteCall {
        dest: target,
        value: U256::zero(),
        func: target_call_data,
    }
    .encode()
    .into()
}

/// Assembles unsigned user operations for a smart account.
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    wallet: Wallet,
    gas_limits: GasLimits,
    fee_floors: FeeFloors,
}

impl OperationBuilder {
    pub fn new(wallet: Wallet, gas_limits: GasLimits, fee_floors: FeeFloors) -> Self {
        Self {
            wallet,
            gas_limits,
            fee_floors,
        }
    }

    /// Fails fast on an empty account; an unfunded operation can only revert.
    pub async fn ensure_funded(&self, sender: Address) -> Result<U256, ExecutionError> {
        let balance = self.wallet.get_balance(sender).await?;
        if balance.is_zero() {
            return Err(ExecutionError::InsufficientFunds(sender));
        }
        debug!("smart account {:?} balance {}", sender, balance);
        Ok(balance)
    }

    pub async fn read_nonce(&self, sender: Address) -> Result<U256, ExecutionError> {
        let data: Bytes = NonceCall.encode().into();
        let result = self.wallet.call_contract(sender, &data).await?;
        let NonceReturn(nonce) = NonceReturn::decode(result.as_ref())
            .map_err(|e| ProviderError::invalid_response("eth_call", e))?;
        Ok(nonce)
    }

    pub async fn read_fees(&self) -> Result<GasFees, ExecutionError> {
        let history = self
            .wallet
            .get_fee_history(FEE_HISTORY_BLOCKS, &[REWARD_PERCENTILE])
            .await?;
        let reading = FeeHistoryReading::from_fee_history(&history)?;
        let fees = estimate_fees(&reading, &self.fee_floors);
        debug!(
            "fees: base {} sample {} -> priority {} max {}",
            reading.base_fee_per_gas,
            reading.priority_fee_sample,
            fees.max_priority_fee_per_gas,
            fees.max_fee_per_gas
        );
        Ok(fees)
    }

    /// Balance check, one nonce read, call data, one fee read. Strictly in that order.
    pub async fn build(
        &self,
        sender: Address,
        target: Address,
        target_call_data: Bytes,
    ) -> Result<UnsignedUserOperation, ExecutionError> {
        self.ensure_funded(sender).await?;

        let nonce = self.read_nonce(sender).await?;
        let call_data = encode_execute(target, target_call_data);
        let fees = self.read_fees().await?;

        info!(
            "Built user operation for {:?} with nonce {} targeting {:?}",
            sender, nonce, target
        );

        Ok(UnsignedUserOperation {
            sender,
            nonce,
            call_data,
            call_gas_limit: self.gas_limits.call_gas_limit,
            verification_gas_limit: self.gas_limits.verification_gas_limit,
            pre_verification_gas: self.gas_limits.pre_verification_gas,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        })
    }
}
