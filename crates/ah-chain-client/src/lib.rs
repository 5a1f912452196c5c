//! Seams to everything this workspace does not own: the marketplace contract,
//! its ERC-20 payment token and the wallet that authorises accounts.
//!
//! Writes are two-phase. Submitting returns a [`PendingTransaction`]; nothing
//! is final until [`PendingTransaction::confirm`] resolves.

pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;

use ah_api_types::{
    Address, CatalogProduct, Contribution, Hub, HubProduct, HubProductDetails, HubStatistics,
    RequestRecord, Transaction, U256,
};
use async_trait::async_trait;
use std::sync::Arc;

pub use error::{ChainError, ChainResult, INSTALL_WALLET_MESSAGE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait PendingTransaction: Send {
    fn tx_hash(&self) -> &str;

    /// Block until the configured number of confirmations is reached.
    async fn confirm(self: Box<Self>) -> ChainResult<TxReceipt>;
}

pub type PendingTx = Box<dyn PendingTransaction>;

#[async_trait]
pub trait MarketplaceContract: Send + Sync {
    fn address(&self) -> Address;

    async fn farmer_exists(&self, farmer: Address) -> ChainResult<bool>;
    async fn farmer_earnings(&self, farmer: Address) -> ChainResult<U256>;
    async fn farmer_transactions(&self, farmer: Address) -> ChainResult<Vec<Transaction>>;
    async fn farmer_contributions(&self, farmer: Address) -> ChainResult<Vec<Contribution>>;

    async fn all_hubs(&self) -> ChainResult<Vec<Address>>;
    async fn hub_info(&self, hub: Address) -> ChainResult<Hub>;
    async fn hub_products(&self, hub: Address) -> ChainResult<Vec<HubProduct>>;
    async fn hub_product_details(
        &self,
        hub: Address,
        product_id: U256,
    ) -> ChainResult<HubProductDetails>;
    async fn hub_transactions(&self, hub: Address) -> ChainResult<Vec<Transaction>>;
    async fn hub_statistics(&self, hub: Address) -> ChainResult<HubStatistics>;
    async fn product_requests(
        &self,
        from_hub: Address,
        to_hub: Address,
        product_id: U256,
    ) -> ChainResult<Vec<RequestRecord>>;

    async fn all_products(&self) -> ChainResult<Vec<CatalogProduct>>;
    async fn product_name(&self, product_id: U256) -> ChainResult<String>;
    async fn payment_token(&self) -> ChainResult<Address>;

    async fn register_as_farmer(&self) -> ChainResult<PendingTx>;
    async fn contribute_product(
        &self,
        hub: Address,
        product_id: U256,
        quantity: U256,
        price: U256,
    ) -> ChainResult<PendingTx>;
    async fn register_as_hub(&self, name: &str, location: &str) -> ChainResult<PendingTx>;
    async fn create_product(&self, name: &str) -> ChainResult<PendingTx>;
    async fn add_product_to_hub(&self, product_id: U256) -> ChainResult<PendingTx>;
    async fn toggle_product_status(&self, product_id: U256, active: bool)
    -> ChainResult<PendingTx>;
    async fn request_product_from_hub(
        &self,
        to_hub: Address,
        product_id: U256,
        quantity: U256,
    ) -> ChainResult<PendingTx>;
    async fn fulfill_product_request(
        &self,
        from_hub: Address,
        product_id: U256,
        request_index: U256,
    ) -> ChainResult<PendingTx>;
    async fn deny_product_request(
        &self,
        from_hub: Address,
        product_id: U256,
        request_index: U256,
    ) -> ChainResult<PendingTx>;
    async fn purchase_product(
        &self,
        hub: Address,
        product_id: U256,
        quantity: U256,
    ) -> ChainResult<PendingTx>;
}

#[async_trait]
pub trait PaymentToken: Send + Sync {
    fn address(&self) -> Address;

    async fn balance_of(&self, owner: Address) -> ChainResult<U256>;
    async fn allowance(&self, owner: Address, spender: Address) -> ChainResult<U256>;
    async fn symbol(&self) -> ChainResult<String>;
    async fn decimals(&self) -> ChainResult<u8>;
    async fn approve(&self, spender: Address, amount: U256) -> ChainResult<PendingTx>;
}

/// Request/response pair exposed by an injected wallet.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Accounts already authorised, without prompting (`eth_accounts`).
    async fn accounts(&self) -> ChainResult<Vec<Address>>;

    /// Prompt the user to authorise accounts (`eth_requestAccounts`).
    async fn request_accounts(&self) -> ChainResult<Vec<Address>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Signer(Address),
    ReadOnly,
}

impl Binding {
    pub fn account(&self) -> Option<Address> {
        match self {
            Self::Signer(account) => Some(*account),
            Self::ReadOnly => None,
        }
    }
}

/// Builds contract handles for a binding mode.
pub trait ContractBinder: Send + Sync {
    fn bind_marketplace(&self, binding: Binding) -> ChainResult<Arc<dyn MarketplaceContract>>;
    fn bind_token(&self, token: Address, binding: Binding) -> ChainResult<Arc<dyn PaymentToken>>;
}
