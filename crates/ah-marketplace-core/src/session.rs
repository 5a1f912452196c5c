use std::sync::Arc;

use ah_api_types::Session;
use ah_chain_client::{ChainError, ChainResult, WalletProvider};
use tracing::{info, warn};

/// Connection state against the injected wallet.
///
/// Holds at most one session. Disconnecting forgets it locally; the wallet's
/// own authorisation is untouched.
pub struct WalletSessionManager {
    provider: Option<Arc<dyn WalletProvider>>,
    session: Option<Session>,
}

impl WalletSessionManager {
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            provider,
            session: None,
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Adopt an account the wallet already authorised, without prompting.
    pub async fn check_existing(&mut self) -> Option<Session> {
        let provider = self.provider.as_ref()?;

        let accounts = match provider.accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!("error checking for an authorised wallet account: {}", err);
                return None;
            }
        };

        let session = Session {
            address: *accounts.first()?,
        };
        info!("found authorised account {}", session.address);
        self.session = Some(session);
        Some(session)
    }

    /// Prompt the wallet for authorisation. The first account becomes the session.
    pub async fn connect(&mut self) -> ChainResult<Session> {
        let provider = self.provider.as_ref().ok_or(ChainError::WalletUnavailable)?;

        let accounts = provider.request_accounts().await?;
        let Some(address) = accounts.first().copied() else {
            return Err(ChainError::UserRejected);
        };

        let session = Session { address };
        info!("wallet connected: {}", address);
        self.session = Some(session);
        Ok(session)
    }

    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            info!("wallet disconnected: {}", session.address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_api_types::Address;
    use ah_chain_client::INSTALL_WALLET_MESSAGE;
    use ah_chain_client::memory::InMemoryWallet;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[tokio::test]
    async fn check_existing_without_provider_is_none() {
        let mut manager = WalletSessionManager::new(None);
        assert_eq!(manager.check_existing().await, None);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn check_existing_does_not_prompt() {
        let wallet = InMemoryWallet::new(vec![addr(1)]);
        let mut manager = WalletSessionManager::new(Some(Arc::new(wallet)));
        assert_eq!(manager.check_existing().await, None);

        let wallet = InMemoryWallet::authorized(vec![addr(1), addr(2)]);
        let mut manager = WalletSessionManager::new(Some(Arc::new(wallet)));
        let session = manager.check_existing().await.unwrap();
        assert_eq!(session.address, addr(1));
        assert_eq!(manager.session(), Some(session));
    }

    #[tokio::test]
    async fn connect_without_wallet_asks_for_install() {
        let mut manager = WalletSessionManager::new(None);
        let err = manager.connect().await.unwrap_err();
        assert_eq!(err, ChainError::WalletUnavailable);
        assert_eq!(err.to_string(), INSTALL_WALLET_MESSAGE);
    }

    #[tokio::test]
    async fn rejected_prompt_leaves_no_session() {
        let wallet = InMemoryWallet::new(vec![addr(1)]);
        wallet.reject_prompts();
        let mut manager = WalletSessionManager::new(Some(Arc::new(wallet)));

        assert_eq!(manager.connect().await, Err(ChainError::UserRejected));
        assert!(!manager.is_connected());

        let mut empty = WalletSessionManager::new(Some(Arc::new(InMemoryWallet::new(vec![]))));
        assert_eq!(empty.connect().await, Err(ChainError::UserRejected));
    }

    #[tokio::test]
    async fn disconnect_clears_local_session_only() {
        let wallet = InMemoryWallet::new(vec![addr(9)]);
        let mut manager = WalletSessionManager::new(Some(Arc::new(wallet.clone())));

        manager.connect().await.unwrap();
        manager.disconnect();
        assert!(!manager.is_connected());

        // the wallet still remembers the authorisation
        let restored = manager.check_existing().await.unwrap();
        assert_eq!(restored.address, addr(9));
    }
}
