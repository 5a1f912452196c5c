//! Chain connection settings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTRACT_ADDRESS: &str = "0xEF44C6f3b11cEacA73D1C7e7bF2C26e1D311212B";
pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvmConfig {
    /// Read-only endpoint used when no signer is bound.
    pub rpc_url: String,

    /// JSON-RPC endpoint of the injected wallet. Answers `eth_accounts`,
    /// `eth_requestAccounts` and signs `eth_sendTransaction` for its accounts.
    pub wallet_url: Option<String>,

    /// Local signing key (0x + 64 hex). Takes precedence over `wallet_url` for signing.
    pub private_key: Option<String>,

    pub contract_address: String,

    /// Confirmations awaited for every submitted transaction.
    pub confirmation_blocks: u64,
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_owned(),
            wallet_url: None,
            private_key: None,
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_owned(),
            confirmation_blocks: 1,
        }
    }
}

impl EvmConfig {
    /// Overlay `AGRIHUB_*` values from `lookup` (the environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("AGRIHUB_RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(url) = lookup("AGRIHUB_WALLET_URL") {
            self.wallet_url = Some(url);
        }
        if let Some(address) = lookup("AGRIHUB_CONTRACT_ADDRESS") {
            self.contract_address = address;
        }
        if let Some(key) = lookup("AGRIHUB_PRIVATE_KEY") {
            self.private_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_http_url("rpc_url", &self.rpc_url)?;
        if let Some(ref url) = self.wallet_url {
            validate_http_url("wallet_url", url)?;
        }

        if !self.contract_address.starts_with("0x") {
            return Err("contract_address must start with 0x".to_string());
        }
        if self.contract_address.len() != 42 {
            return Err(format!(
                "contract_address must be 42 characters (0x + 40 hex), got {}",
                self.contract_address.len()
            ));
        }
        if !self.contract_address[2..]
            .chars()
            .all(|c| c.is_ascii_hexdigit())
        {
            return Err("contract_address must contain only hex characters after 0x".to_string());
        }

        if let Some(ref pk) = self.private_key {
            if !pk.starts_with("0x") {
                return Err("private_key must start with 0x".to_string());
            }
            if pk.len() != 66 {
                return Err(format!(
                    "private_key must be 66 characters (0x + 64 hex), got {}",
                    pk.len()
                ));
            }
            if !pk[2..].chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("private_key must contain only hex characters after 0x".to_string());
            }
        }

        if self.confirmation_blocks == 0 {
            return Err("confirmation_blocks must be > 0".to_string());
        }
        if self.confirmation_blocks > 100 {
            return Err("confirmation_blocks too large (max 100)".to_string());
        }

        Ok(())
    }

    /// Whether writes can be signed at all.
    pub fn can_sign(&self) -> bool {
        self.private_key.is_some() || self.wallet_url.is_some()
    }
}

fn validate_http_url(field: &str, url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Err(format!("{field} cannot be empty"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!("{field} must start with http:// or https://"));
    }
    Ok(())
}
