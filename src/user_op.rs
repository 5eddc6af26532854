// src/user_op.rs
use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

/// A user operation before signing. Never deploys the account and carries no
/// paymaster, so `initCode` and `paymasterAndData` are always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

impl UnsignedUserOperation {
    /// Entry point v0.7 user operation hash, bound to `entry_point` and `chain_id`.
    pub fn hash(&self, entry_point: Address, chain_id: U256) -> H256 {
        let empty_hash = keccak256(b"");
        let account_gas_limits = pack_u128_pair(self.verification_gas_limit, self.call_gas_limit);
        let gas_fees = pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas);

        let packed = abi::encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::FixedBytes(empty_hash.to_vec()),
            Token::FixedBytes(keccak256(&self.call_data).to_vec()),
            Token::FixedBytes(account_gas_limits.to_vec()),
            Token::Uint(self.pre_verification_gas),
            Token::FixedBytes(gas_fees.to_vec()),
            Token::FixedBytes(empty_hash.to_vec()),
        ]);

        let encoded = abi::encode(&[
            Token::FixedBytes(keccak256(packed).to_vec()),
            Token::Address(entry_point),
            Token::Uint(chain_id),
        ]);

        H256::from(keccak256(encoded))
    }

    pub fn into_signed(self, signature: Bytes) -> SignedUserOperation {
        SignedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            call_data: self.call_data,
            call_gas_limit: self.call_gas_limit,
            verification_gas_limit: self.verification_gas_limit,
            pre_verification_gas: self.pre_verification_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            signature,
        }
    }
}

/// Wire form sent to the bundler. Integer fields serialize as `0x` hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUserOperation {
    pub sender: Address,
    pub nonce: U256,
    pub call_data: Bytes,
    pub call_gas_limit: U256,
    pub verification_gas_limit: U256,
    pub pre_verification_gas: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub signature: Bytes,
}

impl SignedUserOperation {
    pub fn unsigned(&self) -> UnsignedUserOperation {
        UnsignedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            call_data: self.call_data.clone(),
            call_gas_limit: self.call_gas_limit,
            verification_gas_limit: self.verification_gas_limit,
            pre_verification_gas: self.pre_verification_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        }
    }
}

/// Packs two 128-bit values into one word: `high << 128 | low`.
fn pack_u128_pair(high: U256, low: U256) -> [u8; 32] {
    let mut high_bytes = [0u8; 32];
    high.to_big_endian(&mut high_bytes);
    let mut low_bytes = [0u8; 32];
    low.to_big_endian(&mut low_bytes);

    let mut packed = [0u8; 32];
    packed[..16].copy_from_slice(&high_bytes[16..]);
    packed[16..].copy_from_slice(&low_bytes[16..]);
    packed
}
