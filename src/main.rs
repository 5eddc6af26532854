// src/main.rs
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use ethers::types::{Address, Bytes};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use smart_account_relay::config::{RelayConfig, BUNDLER_URL};
use smart_account_relay::provider::local::LocalProvider;
use smart_account_relay::{ConnectionEvent, SmartAccountExecutor, Wallet, WalletConnector};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(short, long, env = "ETH_RPC_URL")]
    eth_rpc_url: String,

    #[clap(short, long, env = "PRIVATE_KEY")]
    private_key: String,

    /// Smart account that executes the call
    #[clap(short, long, env = "SMART_ACCOUNT")]
    smart_account: Address,

    /// Contract the smart account calls
    #[clap(short, long)]
    target: Address,

    /// ABI-encoded call for the target contract
    #[clap(short = 'd', long, default_value = "0x")]
    call_data: Bytes,

    #[clap(short, long, env = "BUNDLER_URL", default_value = BUNDLER_URL)]
    bundler_url: String,

    /// Ask the wallet for Sepolia instead of mainnet
    #[clap(long)]
    testnet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let provider = LocalProvider::connect(&args.private_key, &args.eth_rpc_url).await?;
    let eoa = provider.address();
    let wallet = Wallet::new(Arc::new(provider));

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let connector = WalletConnector::new(wallet.clone(), events_tx);
    connector.initialize().await;
    connector.connect(args.testnet).await;

    while let Ok(event) = events_rx.try_recv() {
        match event {
            ConnectionEvent::Connected {
                account,
                is_testnet,
                partial,
            } => info!(
                "Wallet {:?} connected (testnet: {}, requested chain: {})",
                account, is_testnet, !partial
            ),
            ConnectionEvent::Error(message) => anyhow::bail!(message),
            other => warn!("Unexpected connection event: {:?}", other),
        }
    }

    let config = RelayConfig::default().with_bundler_url(args.bundler_url);
    let executor = SmartAccountExecutor::new(wallet, &config);
    let op_hash = executor
        .execute(args.smart_account, eoa, args.target, args.call_data)
        .await?;

    info!("User operation submitted: {:?}", op_hash);
    println!("{:?}", op_hash);

    connector.disconnect().await;
    Ok(())
}
