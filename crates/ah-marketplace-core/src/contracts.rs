use std::sync::Arc;

use ah_api_types::{Address, Session};
use ah_chain_client::{
    Binding, ChainResult, ContractBinder, MarketplaceContract, PaymentToken,
};
use tracing::{debug, info, warn};

/// Marketplace and payment-token handles sharing one binding.
#[derive(Clone)]
pub struct ContractSession {
    marketplace: Arc<dyn MarketplaceContract>,
    token: Option<Arc<dyn PaymentToken>>,
    binding: Binding,
}

impl ContractSession {
    pub fn marketplace(&self) -> &Arc<dyn MarketplaceContract> {
        &self.marketplace
    }

    /// `None` when the token address could not be resolved.
    pub fn token(&self) -> Option<&Arc<dyn PaymentToken>> {
        self.token.as_ref()
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn signer(&self) -> Option<Address> {
        self.binding.account()
    }

    pub fn is_read_only(&self) -> bool {
        self.binding == Binding::ReadOnly
    }

    #[cfg(test)]
    pub(crate) fn without_token(self) -> Self {
        Self {
            token: None,
            ..self
        }
    }
}

pub struct ContractSessionFactory {
    binder: Arc<dyn ContractBinder>,
}

impl ContractSessionFactory {
    pub fn new(binder: Arc<dyn ContractBinder>) -> Self {
        Self { binder }
    }

    /// Bind with the session's signer, or read-only when there is no session.
    ///
    /// Any failure while binding a signer falls back to read-only.
    pub async fn open(&self, session: Option<&Session>) -> ChainResult<ContractSession> {
        if let Some(session) = session {
            match self.open_signer(session.address).await {
                Ok(contracts) => return Ok(contracts),
                Err(err) => warn!(
                    "signer binding for {} failed, falling back to read-only: {}",
                    session.address, err
                ),
            }
        }
        self.open_read_only().await
    }

    async fn open_signer(&self, account: Address) -> ChainResult<ContractSession> {
        let binding = Binding::Signer(account);
        let marketplace = self.binder.bind_marketplace(binding)?;
        let token_address = marketplace.payment_token().await?;
        let token = self.binder.bind_token(token_address, binding)?;

        info!(
            "contracts bound for {} (marketplace {}, token {})",
            account,
            marketplace.address(),
            token_address
        );
        Ok(ContractSession {
            marketplace,
            token: Some(token),
            binding,
        })
    }

    async fn open_read_only(&self) -> ChainResult<ContractSession> {
        let binding = Binding::ReadOnly;
        let marketplace = self.binder.bind_marketplace(binding)?;

        let token = match marketplace.payment_token().await {
            Ok(address) => match self.binder.bind_token(address, binding) {
                Ok(token) => Some(token),
                Err(err) => {
                    warn!("binding payment token {} failed: {}", address, err);
                    None
                }
            },
            Err(err) => {
                warn!("payment token unresolved in read-only mode: {}", err);
                None
            }
        };

        debug!(
            "contracts bound read-only (marketplace {}, token resolved: {})",
            marketplace.address(),
            token.is_some()
        );
        Ok(ContractSession {
            marketplace,
            token,
            binding,
        })
    }
}
