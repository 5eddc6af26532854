// src/lib.rs
//! Smart-account user operations relayed through an ERC-4337 bundler.
//!
//! [`connection::WalletConnector`] keeps the link to an injected wallet
//! provider; [`executor::SmartAccountExecutor`] builds, prices, signs and
//! submits a user operation through that same provider.

pub mod builder;
pub mod bundler;
pub mod config;
pub mod connection;
pub mod contract;
pub mod error;
pub mod executor;
pub mod fees;
pub mod provider;
pub mod relayer;
pub mod user_op;

pub use connection::{ConnectionEvent, ConnectionState, WalletConnection, WalletConnector};
pub use error::{ExecutionError, ProviderError, ProviderErrorKind};
pub use executor::{execute_smart_account_transaction, SmartAccountExecutor};
pub use provider::{ChainId, Eip1193, Wallet};
