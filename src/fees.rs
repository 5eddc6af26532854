// src/fees.rs
use ethers::types::{FeeHistory, U256};

use crate::config::FeeFloors;
use crate::error::ProviderError;

/// Fee history is read for the latest block only.
pub const FEE_HISTORY_BLOCKS: &str = "0x1";
/// Reward percentile sampled from that block.
pub const REWARD_PERCENTILE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeHistoryReading {
    pub base_fee_per_gas: U256,
    pub priority_fee_sample: U256,
}

impl FeeHistoryReading {
    pub fn from_fee_history(history: &FeeHistory) -> Result<Self, ProviderError> {
        let base_fee_per_gas = history
            .base_fee_per_gas
            .first()
            .copied()
            .ok_or_else(|| ProviderError::invalid_response("eth_feeHistory", "no baseFeePerGas"))?;
        let priority_fee_sample = history
            .reward
            .first()
            .and_then(|rewards| rewards.first())
            .copied()
            .ok_or_else(|| ProviderError::invalid_response("eth_feeHistory", "no reward sample"))?;

        Ok(Self {
            base_fee_per_gas,
            priority_fee_sample,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasFees {
    pub max_priority_fee_per_gas: U256,
    pub max_fee_per_gas: U256,
}

/// Priority fee is the sampled reward, max fee is base fee plus priority fee;
/// each is raised to its floor so near-zero network data never under-prices
/// an operation.
pub fn estimate_fees(reading: &FeeHistoryReading, floors: &FeeFloors) -> GasFees {
    let max_priority_fee_per_gas = reading
        .priority_fee_sample
        .max(floors.min_priority_fee_per_gas);
    let max_fee_per_gas = reading
        .base_fee_per_gas
        .saturating_add(max_priority_fee_per_gas)
        .max(floors.min_max_fee_per_gas);

    GasFees {
        max_priority_fee_per_gas,
        max_fee_per_gas,
    }
}
