// tests/pipeline.rs
mod common;

use ethers::abi::{parse_abi, Token};
use ethers::types::{Bytes, H256, U256};
use serde_json::json;

use common::{address, spawn_bundler, uint_word, FakeProvider, EOA, SMART_ACCOUNT, TARGET};
use smart_account_relay::config::{RelayConfig, ENTRY_POINT_V07};
use smart_account_relay::contract::{call_contract_function, send_contract_tx};
use smart_account_relay::{
    execute_smart_account_transaction, ExecutionError, ProviderError, Wallet,
};

const OP_HASH: &str = "0x9c1b0b3c6e7a55b7a8f2f36d9d1c5b1b8ad7a0d1e0a7a3cfe7d2f0e5c4b3a291";

fn funded_provider() -> std::sync::Arc<FakeProvider> {
    let provider = FakeProvider::new();
    provider
        .respond("eth_getBalance", json!("0xde0b6b3a7640000"))
        .respond("eth_call", uint_word(7))
        .respond(
            "eth_feeHistory",
            json!({
                "oldestBlock": "0x5b8d80",
                "baseFeePerGas": ["0x2faf080", "0x2faf080"],
                "gasUsedRatio": [0.42],
                "reward": [["0x989680"]]
            }),
        )
        .respond("eth_chainId", json!("0xaa36a7"))
        .respond("personal_sign", json!(format!("0x{}", "ab".repeat(65))));
    provider
}

fn target_call() -> Bytes {
    Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])
}

#[tokio::test]
async fn zero_balance_fails_before_nonce_read() {
    let provider = FakeProvider::new();
    provider.respond("eth_getBalance", json!("0x0"));
    let wallet = Wallet::new(provider.clone());
    let config = RelayConfig::default().with_bundler_url("http://127.0.0.1:9");

    let err = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecutionError::InsufficientFunds(_)));
    assert_eq!(
        err.to_string(),
        format!("Smart account {} has no funds", SMART_ACCOUNT)
    );
    assert_eq!(provider.call_count("eth_call"), 0);
    assert_eq!(provider.call_count("eth_feeHistory"), 0);
    assert_eq!(provider.call_count("personal_sign"), 0);
}

#[tokio::test]
async fn balance_gate_runs_before_bundler_setup() {
    let provider = FakeProvider::new();
    provider.respond("eth_getBalance", json!("0x0"));
    let wallet = Wallet::new(provider.clone());
    let config = RelayConfig::default().with_bundler_url("not a url");

    let err = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecutionError::InsufficientFunds(_)));
}

#[tokio::test]
async fn malformed_bundler_url_fails_before_signing() {
    let provider = funded_provider();
    let wallet = Wallet::new(provider.clone());
    let config = RelayConfig::default().with_bundler_url("not a url");

    let err = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecutionError::Transport(_)));
    assert_eq!(provider.call_count("personal_sign"), 0);
}

#[tokio::test]
async fn submits_signed_operation_to_bundler() {
    let provider = funded_provider();
    let wallet = Wallet::new(provider.clone());
    let (url, _handle, received) = spawn_bundler(Ok(OP_HASH.parse().unwrap())).await;
    let config = RelayConfig::default().with_bundler_url(url);

    let hash = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap();

    assert_eq!(hash, OP_HASH.parse::<H256>().unwrap());
    assert_eq!(
        provider.methods(),
        vec![
            "eth_getBalance",
            "eth_call",
            "eth_feeHistory",
            "eth_chainId",
            "personal_sign"
        ]
    );

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (op, entry_point) = &received[0];
    assert_eq!(*entry_point, ENTRY_POINT_V07);
    assert_eq!(op.sender, address(SMART_ACCOUNT));
    assert_eq!(op.nonce, U256::from(7));
    assert_eq!(op.call_gas_limit, U256::from(0x70000));
    assert_eq!(op.verification_gas_limit, U256::from(0x20000));
    assert_eq!(op.pre_verification_gas, U256::from(0x10000));
    assert_eq!(op.max_priority_fee_per_gas, U256::from(100_000_000u64));
    assert_eq!(op.max_fee_per_gas, U256::from(150_000_000u64));
    assert_eq!(op.signature, Bytes::from(vec![0xab; 65]));
    assert_eq!(&op.call_data[..4], &[0xb6, 0x1d, 0x27, 0xf6]);

    let sign_params = &provider.calls("personal_sign")[0];
    assert_eq!(sign_params[1], json!(address(EOA)));
}

#[tokio::test]
async fn signed_hash_covers_the_submitted_nonce() {
    let provider = funded_provider();
    // A second read would see a different counter.
    provider.respond("eth_call", uint_word(8));
    let wallet = Wallet::new(provider.clone());
    let (url, _handle, received) = spawn_bundler(Ok(OP_HASH.parse().unwrap())).await;
    let config = RelayConfig::default().with_bundler_url(url);

    execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap();

    assert_eq!(provider.call_count("eth_call"), 1);

    let received = received.lock().unwrap();
    let (op, _) = &received[0];
    assert_eq!(op.nonce, U256::from(7));

    let signed_message: H256 =
        serde_json::from_value(provider.calls("personal_sign")[0][0].clone()).unwrap();
    let expected = op
        .unsigned()
        .hash(ENTRY_POINT_V07, U256::from(11_155_111u64));
    assert_eq!(signed_message, expected);
}

#[tokio::test]
async fn bundler_error_message_is_surfaced() {
    let provider = funded_provider();
    let wallet = Wallet::new(provider.clone());
    let (url, _handle, received) = spawn_bundler(Err("already known".to_string())).await;
    let config = RelayConfig::default().with_bundler_url(url);

    let err = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecutionError::BundlerRejected(ref message) if message == "already known"));
    assert!(err.to_string().contains("already known"));
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn declined_signature_is_reported_as_rejection() {
    let provider = funded_provider();
    provider.replace(
        "personal_sign",
        Err(ProviderError::new(4001, "User denied message signature.")),
    );
    let wallet = Wallet::new(provider.clone());
    let (url, _handle, received) = spawn_bundler(Ok(OP_HASH.parse().unwrap())).await;
    let config = RelayConfig::default().with_bundler_url(url);

    let err = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecutionError::UserRejected));
    assert_eq!(provider.call_count("personal_sign"), 1);
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn provider_failure_stops_the_pipeline() {
    let provider = FakeProvider::new();
    provider.fail("eth_getBalance", -32000, "header not found");
    let wallet = Wallet::new(provider.clone());
    let config = RelayConfig::default().with_bundler_url("http://127.0.0.1:9");

    let err = execute_smart_account_transaction(
        &wallet,
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.to_string(), "Ethereum provider error: header not found");
    assert_eq!(provider.call_count("eth_call"), 0);
}

#[tokio::test]
async fn missing_provider_is_unavailable() {
    let config = RelayConfig::default().with_bundler_url("http://127.0.0.1:9");

    let err = execute_smart_account_transaction(
        &Wallet::not_installed(),
        &config,
        address(SMART_ACCOUNT),
        address(EOA),
        address(TARGET),
        target_call(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ExecutionError::ProviderUnavailable));
}

#[tokio::test]
async fn contract_helpers_encode_and_decode() {
    let abi = parse_abi(&[
        "function balanceOf(address owner) view returns (uint256)",
        "function transfer(address to, uint256 amount) returns (bool)",
    ])
    .unwrap();
    let provider = FakeProvider::new();
    provider
        .respond("eth_call", uint_word(1_000))
        .respond("eth_sendTransaction", json!(OP_HASH));
    let wallet = Wallet::new(provider.clone());

    let balance = call_contract_function(
        &wallet,
        address(TARGET),
        abi.function("balanceOf").unwrap(),
        &[Token::Address(address(EOA))],
    )
    .await
    .unwrap();
    assert_eq!(balance, vec![Token::Uint(U256::from(1_000))]);

    let call_params = &provider.calls("eth_call")[0];
    assert_eq!(call_params[0]["to"], json!(address(TARGET)));
    assert_eq!(call_params[1], "latest");

    let tx_hash = send_contract_tx(
        &wallet,
        address(EOA),
        address(TARGET),
        abi.function("transfer").unwrap(),
        &[Token::Address(address(SMART_ACCOUNT)), Token::Uint(U256::from(5))],
    )
    .await
    .unwrap();
    assert_eq!(tx_hash, OP_HASH.parse::<H256>().unwrap());

    let tx_params = &provider.calls("eth_sendTransaction")[0];
    assert_eq!(tx_params[0]["from"], json!(address(EOA)));
    let data: Bytes = serde_json::from_value(tx_params[0]["data"].clone()).unwrap();
    assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
}
