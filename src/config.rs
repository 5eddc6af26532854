// src/config.rs
use ethers::types::{Address, H160, U256};
use serde::{Deserialize, Serialize};

/// ERC-4337 entry point v0.7 (0x0000000071727De22E5E9d8BAf0edAc6f37da032).
pub const ENTRY_POINT_V07: Address = H160([
    0x00, 0x00, 0x00, 0x00, 0x71, 0x72, 0x7d, 0xe2, 0x2e, 0x5e, 0x9d, 0x8b, 0xaf, 0x0e, 0xda, 0xc6,
    0xf3, 0x7d, 0xa0, 0x32,
]);

pub const BUNDLER_URL: &str = "https://public.pimlico.io/v2/11155111/rpc";

pub const SEPOLIA_CHAIN_ID: &str = "0xaa36a7";
pub const MAINNET_CHAIN_ID: &str = "0x1";

pub const CALL_GAS_LIMIT: u64 = 0x70000;
pub const VERIFICATION_GAS_LIMIT: u64 = 0x20000;
pub const PRE_VERIFICATION_GAS: u64 = 0x10000;

pub const MIN_PRIORITY_FEE_PER_GAS: u64 = 100_000_000;
pub const MIN_MAX_FEE_PER_GAS: u64 = 100_000_025;

/// Gas limits attached to every user operation. Not estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasLimits {
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            call_gas_limit: U256::from(CALL_GAS_LIMIT),
            verification_gas_limit: U256::from(VERIFICATION_GAS_LIMIT),
            pre_verification_gas: U256::from(PRE_VERIFICATION_GAS),
        }
    }
}

/// Lower bounds applied to fees derived from fee history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeFloors {
    pub min_priority_fee_per_gas: U256,
    pub min_max_fee_per_gas: U256,
}

impl Default for FeeFloors {
    fn default() -> Self {
        Self {
            min_priority_fee_per_gas: U256::from(MIN_PRIORITY_FEE_PER_GAS),
            min_max_fee_per_gas: U256::from(MIN_MAX_FEE_PER_GAS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub entry_point: Address,
    pub bundler_url: String,
    pub gas_limits: GasLimits,
    pub fee_floors: FeeFloors,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            entry_point: ENTRY_POINT_V07,
            bundler_url: BUNDLER_URL.to_string(),
            gas_limits: GasLimits::default(),
            fee_floors: FeeFloors::default(),
        }
    }
}

impl RelayConfig {
    pub fn with_bundler_url(mut self, url: impl Into<String>) -> Self {
        self.bundler_url = url.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// `wallet_addEthereumChain` payload (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    pub chain_id: String,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    pub block_explorer_urls: Vec<String>,
}

impl AddChainParams {
    pub fn sepolia() -> Self {
        Self {
            chain_id: SEPOLIA_CHAIN_ID.to_string(),
            chain_name: "Sepolia".to_string(),
            native_currency: NativeCurrency {
                name: "ETH".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc.sepolia.org".to_string()],
            block_explorer_urls: vec!["https://sepolia.etherscan.io".to_string()],
        }
    }
}
