// src/error.rs
use ethers::types::Address;
use ethers::utils::to_checksum;
use thiserror::Error;

/// EIP-1193 code for a request the user declined in the wallet.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-1193 / MetaMask code for a chain the wallet does not know about.
pub const CHAIN_UNREGISTERED_CODE: i64 = 4902;

/// Closed set of provider failures the connection and execution flows branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    UserRejected,
    ChainUnregistered,
    NotInstalled,
    InvalidResponse,
    Unknown(i64),
}

impl ProviderErrorKind {
    pub fn from_code(code: i64) -> Self {
        match code {
            USER_REJECTED_CODE => Self::UserRejected,
            CHAIN_UNREGISTERED_CODE => Self::ChainUnregistered,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            Self::UserRejected => Some(USER_REJECTED_CODE),
            Self::ChainUnregistered => Some(CHAIN_UNREGISTERED_CODE),
            Self::Unknown(code) => Some(*code),
            Self::NotInstalled | Self::InvalidResponse => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::from_code(code),
            message: message.into(),
        }
    }

    pub fn not_installed() -> Self {
        Self {
            kind: ProviderErrorKind::NotInstalled,
            message: "wallet provider not installed".to_string(),
        }
    }

    pub fn invalid_response(method: &str, detail: impl std::fmt::Display) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidResponse,
            message: format!("invalid {} response: {}", method, detail),
        }
    }

    /// JSON-RPC internal error (-32603) wrapping a failure with no wallet code.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(-32603, detail.to_string())
    }

    pub fn is_user_rejection(&self) -> bool {
        self.kind == ProviderErrorKind::UserRejected
    }
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Wallet provider not detected")]
    ProviderUnavailable,

    #[error("Smart account {} has no funds", to_checksum(.0, None))]
    InsufficientFunds(Address),

    #[error("Request cancelled by user")]
    UserRejected,

    #[error("Bundler error: {0}")]
    BundlerRejected(String),

    #[error("Ethereum provider error: {0}")]
    Provider(ProviderError),

    #[error("Bundler transport error: {0}")]
    Transport(String),

    #[error("ABI error: {0}")]
    Abi(#[from] ethers::abi::Error),
}

impl From<ProviderError> for ExecutionError {
    fn from(err: ProviderError) -> Self {
        match err.kind {
            ProviderErrorKind::NotInstalled => Self::ProviderUnavailable,
            ProviderErrorKind::UserRejected => Self::UserRejected,
            _ => Self::Provider(err),
        }
    }
}
