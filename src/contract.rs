// src/contract.rs
use ethers::abi::{Function, Token};
use ethers::types::{Address, Bytes, H256};
use tracing::debug;

use crate::error::ExecutionError;
use crate::provider::Wallet;

/// Read-only call of `function` on `contract`, decoded into output tokens.
pub async fn call_contract_function(
    wallet: &Wallet,
    contract: Address,
    function: &Function,
    args: &[Token],
) -> Result<Vec<Token>, ExecutionError> {
    let data = Bytes::from(function.encode_input(args)?);
    debug!("eth_call {} on {:?}", function.name, contract);

    let result = wallet.call_contract(contract, &data).await?;
    Ok(function.decode_output(result.as_ref())?)
}

/// Sends `function` as a direct transaction from the wallet's account.
pub async fn send_contract_tx(
    wallet: &Wallet,
    from: Address,
    contract: Address,
    function: &Function,
    args: &[Token],
) -> Result<H256, ExecutionError> {
    let data = Bytes::from(function.encode_input(args)?);
    debug!("eth_sendTransaction {} on {:?} from {:?}", function.name, contract, from);

    Ok(wallet.send_transaction(from, contract, &data).await?)
}
