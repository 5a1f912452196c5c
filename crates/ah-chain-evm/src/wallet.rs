//! Wallet providers: an injected wallet reached over JSON-RPC, or a local key.

use ah_api_types::Address;
use ah_chain_client::{ChainError, ChainResult, WalletProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// EIP-1193 code for a prompt the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Talks to a wallet's JSON-RPC endpoint.
///
/// Reads `AGRIHUB_WALLET_URL` from environment when no endpoint is given.
pub struct JsonRpcWallet {
    endpoint: String,
    http: reqwest::Client,
}

impl JsonRpcWallet {
    pub fn new(endpoint: Option<String>) -> Option<Self> {
        let endpoint = endpoint.or_else(|| std::env::var("AGRIHUB_WALLET_URL").ok())?;
        Some(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        })
    }

    async fn request(&self, method: &str) -> ChainResult<Vec<Address>> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params: Vec::new(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    warn!("wallet endpoint {} unreachable: {}", self.endpoint, e);
                    ChainError::WalletUnavailable
                } else {
                    ChainError::Rpc(format!("{method} transport: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::Rpc(format!("{method} HTTP {status}: {text}")));
        }

        let reply: RpcResponse = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("{method} parse: {e}")))?;

        let accounts = reply.into_accounts(method)?;
        debug!("{} returned {} account(s)", method, accounts.len());
        Ok(accounts)
    }
}

#[async_trait]
impl WalletProvider for JsonRpcWallet {
    async fn accounts(&self) -> ChainResult<Vec<Address>> {
        self.request("eth_accounts").await
    }

    async fn request_accounts(&self) -> ChainResult<Vec<Address>> {
        self.request("eth_requestAccounts").await
    }
}

/// Always-authorised wallet for a locally held signing key.
pub struct LocalKeyWallet {
    address: Address,
}

impl LocalKeyWallet {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    async fn accounts(&self) -> ChainResult<Vec<Address>> {
        Ok(vec![self.address])
    }

    async fn request_accounts(&self) -> ChainResult<Vec<Address>> {
        Ok(vec![self.address])
    }
}

// ── JSON-RPC envelope ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Vec<String>>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_accounts(self, method: &str) -> ChainResult<Vec<Address>> {
        if let Some(err) = self.error {
            if err.code == USER_REJECTED_CODE {
                return Err(ChainError::UserRejected);
            }
            return Err(ChainError::Rpc(format!(
                "{method} error {}: {}",
                err.code, err.message
            )));
        }

        self.result
            .unwrap_or_default()
            .iter()
            .map(|raw| {
                raw.parse::<Address>()
                    .map_err(|_| ChainError::InvalidAddress(raw.clone()))
            })
            .collect()
    }
}
