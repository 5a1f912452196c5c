use std::fmt::Display;

use thiserror::Error;

pub type ChainResult<T> = std::result::Result<T, ChainError>;

pub const INSTALL_WALLET_MESSAGE: &str =
    "MetaMask is not installed. Please install it to use this app: https://metamask.io/download.html";

/// Failures surfaced by the contract, token and wallet seams.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// No injected wallet provider is reachable.
    #[error("{}", INSTALL_WALLET_MESSAGE)]
    WalletUnavailable,

    /// The interactive wallet prompt was declined.
    #[error("request rejected by user")]
    UserRejected,

    /// A state-changing call was attempted on a read-only binding.
    #[error("{operation} requires a connected signer; contract is bound read-only")]
    ReadOnly { operation: String },

    /// A view call failed or reverted.
    #[error("contract call {method} failed: {message}")]
    Call { method: String, message: String },

    /// A transaction could not be submitted or its receipt could not be obtained.
    #[error("transaction {method} failed: {message}")]
    Transaction { method: String, message: String },

    /// The transaction was mined with a failure status.
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ChainError {
    pub fn call(method: &str, err: impl Display) -> Self {
        Self::Call {
            method: method.to_owned(),
            message: err.to_string(),
        }
    }

    pub fn transaction(method: &str, err: impl Display) -> Self {
        Self::Transaction {
            method: method.to_owned(),
            message: err.to_string(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::UserRejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wallet_unavailable_carries_install_instruction() {
        assert_eq!(ChainError::WalletUnavailable.to_string(), INSTALL_WALLET_MESSAGE);
    }

    #[test]
    fn helpers_record_method_name() {
        let err = ChainError::call("getHubInfo", "execution reverted");
        assert_eq!(
            err.to_string(),
            "contract call getHubInfo failed: execution reverted"
        );
        assert!(!err.is_user_rejection());
        assert!(ChainError::UserRejected.is_user_rejection());
    }
}
