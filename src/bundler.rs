// src/bundler.rs
use ethers::types::{Address, H256};
use jsonrpsee::core::{ClientError, RpcResult};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::proc_macros::rpc;
use tracing::{debug, error};

use crate::error::ExecutionError;
use crate::user_op::SignedUserOperation;

/// Bundler JSON-RPC surface used by the relayer.
#[rpc(client, server, namespace = "eth")]
pub trait BundlerApi {
    /// Submits a signed user operation; returns the bundler-assigned operation hash.
    #[method(name = "sendUserOperation")]
    async fn send_user_operation(
        &self,
        user_operation: SignedUserOperation,
        entry_point: Address,
    ) -> RpcResult<H256>;
}

pub struct BundlerClient {
    client: HttpClient,
    url: String,
}

impl BundlerClient {
    pub fn new(url: &str) -> Result<Self, ExecutionError> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One `eth_sendUserOperation` call. Bundler errors are surfaced verbatim.
    pub async fn send_user_operation(
        &self,
        user_operation: &SignedUserOperation,
        entry_point: Address,
    ) -> Result<H256, ExecutionError> {
        debug!("eth_sendUserOperation to {}", self.url);

        match BundlerApiClient::send_user_operation(
            &self.client,
            user_operation.clone(),
            entry_point,
        )
        .await
        {
            Ok(hash) => Ok(hash),
            Err(ClientError::Call(err)) => {
                error!("Bundler rejected operation: {}", err.message());
                Err(ExecutionError::BundlerRejected(err.message().to_string()))
            }
            Err(err) => Err(ExecutionError::Transport(err.to_string())),
        }
    }
}
