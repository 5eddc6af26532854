// src/relayer.rs
use ethers::types::{Address, Bytes, H256, U256};
use tracing::info;

use crate::bundler::BundlerClient;
use crate::error::ExecutionError;
use crate::provider::Wallet;
use crate::user_op::{SignedUserOperation, UnsignedUserOperation};

/// Hashes, signs through the wallet, and hands the operation to the bundler.
pub struct OperationRelayer {
    wallet: Wallet,
    bundler: BundlerClient,
    entry_point: Address,
}

impl OperationRelayer {
    pub fn new(wallet: Wallet, bundler: BundlerClient, entry_point: Address) -> Self {
        Self {
            wallet,
            bundler,
            entry_point,
        }
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// The signed operation carries exactly the fields that were hashed.
    pub async fn sign(
        &self,
        user_operation: UnsignedUserOperation,
        signer: Address,
        chain_id: U256,
    ) -> Result<SignedUserOperation, ExecutionError> {
        let hash = user_operation.hash(self.entry_point, chain_id);
        info!("User operation hash {:?}, requesting signature from {:?}", hash, signer);

        let message = Bytes::from(hash.as_bytes().to_vec());
        let signature = self.wallet.personal_sign(&message, signer).await?;

        Ok(user_operation.into_signed(signature))
    }

    /// Single best-effort submission. No retry, no receipt polling.
    pub async fn submit(&self, user_operation: &SignedUserOperation) -> Result<H256, ExecutionError> {
        let hash = self
            .bundler
            .send_user_operation(user_operation, self.entry_point)
            .await?;
        info!("Bundler accepted user operation {:?}", hash);
        Ok(hash)
    }
}
