//! alloy-backed implementation of the chain seams.
//!
//! Reads go through the read-only endpoint unless a signer is bound. Writes
//! are signed by the configured local key when present, otherwise they are
//! forwarded to the wallet endpoint as `eth_sendTransaction` from the
//! session account.

pub mod abi;
pub mod config;
pub mod marketplace;
pub mod pending;
pub mod token;
pub mod wallet;

use std::sync::Arc;

use ah_api_types::Address;
use ah_chain_client::{
    Binding, ChainError, ChainResult, ContractBinder, MarketplaceContract, PaymentToken,
    WalletProvider,
};
use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use tracing::info;

pub use config::EvmConfig;
pub use marketplace::EvmMarketplace;
pub use token::EvmToken;
pub use wallet::{JsonRpcWallet, LocalKeyWallet};

enum Signing {
    LocalKey {
        provider: DynProvider,
        address: Address,
    },
    Injected {
        provider: DynProvider,
    },
    Unavailable,
}

pub struct EvmBinder {
    marketplace: Address,
    read_provider: DynProvider,
    signing: Signing,
    confirmations: u64,
}

impl EvmBinder {
    pub fn from_config(config: &EvmConfig) -> ChainResult<Self> {
        config.validate().map_err(ChainError::Configuration)?;

        let marketplace = config
            .contract_address
            .parse::<Address>()
            .map_err(|_| ChainError::InvalidAddress(config.contract_address.clone()))?;

        let rpc_url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Configuration(format!("Invalid RPC URL: {e}")))?;
        let read_provider = ProviderBuilder::new().connect_http(rpc_url).erased();

        let signing = if let Some(ref key) = config.private_key {
            let signer = key.parse::<PrivateKeySigner>().map_err(|e| {
                ChainError::Configuration(format!("Invalid private key: {e}"))
            })?;
            let address = signer.address();
            let rpc_url = config
                .rpc_url
                .parse()
                .map_err(|e| ChainError::Configuration(format!("Invalid RPC URL: {e}")))?;
            let provider = ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(rpc_url)
                .erased();
            info!("signing with local key for {}", address);
            Signing::LocalKey { provider, address }
        } else if let Some(ref wallet_url) = config.wallet_url {
            let url = wallet_url
                .parse()
                .map_err(|e| ChainError::Configuration(format!("Invalid wallet URL: {e}")))?;
            info!("signing through wallet endpoint {}", wallet_url);
            Signing::Injected {
                provider: ProviderBuilder::new().connect_http(url).erased(),
            }
        } else {
            info!("no signer configured; contract bindings are read-only");
            Signing::Unavailable
        };

        Ok(Self {
            marketplace,
            read_provider,
            signing,
            confirmations: config.confirmation_blocks,
        })
    }

    /// The wallet that authorises accounts for this binder's signer, if any.
    pub fn wallet(&self, config: &EvmConfig) -> Option<Arc<dyn WalletProvider>> {
        match self.signing {
            Signing::LocalKey { address, .. } => Some(Arc::new(LocalKeyWallet::new(address))),
            Signing::Injected { .. } => JsonRpcWallet::new(config.wallet_url.clone())
                .map(|wallet| Arc::new(wallet) as Arc<dyn WalletProvider>),
            Signing::Unavailable => None,
        }
    }

    fn provider_for(&self, binding: Binding) -> ChainResult<DynProvider> {
        match (binding, &self.signing) {
            (Binding::ReadOnly, _) => Ok(self.read_provider.clone()),
            (Binding::Signer(account), Signing::LocalKey { provider, address }) => {
                if account != *address {
                    return Err(ChainError::Configuration(format!(
                        "local key signs for {address}, not {account}"
                    )));
                }
                Ok(provider.clone())
            }
            (Binding::Signer(_), Signing::Injected { provider }) => Ok(provider.clone()),
            (Binding::Signer(_), Signing::Unavailable) => Err(ChainError::Configuration(
                "no signer configured".to_owned(),
            )),
        }
    }
}

impl ContractBinder for EvmBinder {
    fn bind_marketplace(&self, binding: Binding) -> ChainResult<Arc<dyn MarketplaceContract>> {
        let provider = self.provider_for(binding)?;
        Ok(Arc::new(EvmMarketplace::new(
            self.marketplace,
            provider,
            binding,
            self.confirmations,
        )))
    }

    fn bind_token(&self, token: Address, binding: Binding) -> ChainResult<Arc<dyn PaymentToken>> {
        let provider = self.provider_for(binding)?;
        Ok(Arc::new(EvmToken::new(
            token,
            provider,
            binding,
            self.confirmations,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_api_types::U256;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn read_only_config_refuses_signer_binding() {
        let binder = EvmBinder::from_config(&EvmConfig::default()).unwrap();
        assert!(binder.bind_marketplace(Binding::ReadOnly).is_ok());
        assert!(matches!(
            binder.bind_marketplace(Binding::Signer(Address::ZERO)),
            Err(ChainError::Configuration(_))
        ));
        assert!(binder.wallet(&EvmConfig::default()).is_none());
    }

    #[test]
    fn local_key_binds_only_its_own_account() {
        let config = EvmConfig {
            private_key: Some(TEST_KEY.to_owned()),
            ..EvmConfig::default()
        };
        let binder = EvmBinder::from_config(&config).unwrap();
        let own = TEST_KEY.parse::<PrivateKeySigner>().unwrap().address();

        assert!(binder.bind_marketplace(Binding::Signer(own)).is_ok());
        assert!(binder
            .bind_token(Address::repeat_byte(1), Binding::Signer(Address::repeat_byte(2)))
            .is_err());
        assert!(binder.wallet(&config).is_some());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = EvmConfig {
            contract_address: "0xnothex".to_owned(),
            ..EvmConfig::default()
        };
        assert!(matches!(
            EvmBinder::from_config(&config),
            Err(ChainError::Configuration(_))
        ));
    }

    /// Header end and declared body length reached.
    fn request_complete(buf: &[u8]) -> Option<usize> {
        let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
        let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        (buf.len() >= header_end + length).then_some(header_end)
    }

    fn rejection_for(request: &serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": request.get("id").cloned().unwrap_or(serde_json::Value::Null),
            "error": { "code": 4001, "message": "User rejected the request." }
        })
    }

    /// A wallet endpoint that declines every request.
    async fn declining_wallet() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let header_end = loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        if let Some(end) = request_complete(&buf) {
                            break end;
                        }
                    };

                    let request: serde_json::Value =
                        serde_json::from_slice(&buf[header_end..]).unwrap_or_default();
                    let reply = match &request {
                        serde_json::Value::Array(batch) => {
                            serde_json::Value::Array(batch.iter().map(rejection_for).collect())
                        }
                        single => rejection_for(single),
                    }
                    .to_string();

                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                        reply.len(),
                        reply
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn wallet_declining_a_write_is_user_rejected() {
        let config = EvmConfig {
            wallet_url: Some(declining_wallet().await),
            ..EvmConfig::default()
        };
        let binder = EvmBinder::from_config(&config).unwrap();
        let account = Address::repeat_byte(0x31);

        let market = binder.bind_marketplace(Binding::Signer(account)).unwrap();
        let err = market.register_as_farmer().await.err();
        assert_eq!(err, Some(ChainError::UserRejected));

        let err = market
            .purchase_product(Address::repeat_byte(1), U256::from(1u64), U256::from(2u64))
            .await
            .err();
        assert_eq!(err, Some(ChainError::UserRejected));

        let token = binder
            .bind_token(Address::repeat_byte(0xBB), Binding::Signer(account))
            .unwrap();
        let err = token.approve(binder.marketplace, U256::from(5u64)).await.err();
        assert_eq!(err, Some(ChainError::UserRejected));
    }
}
