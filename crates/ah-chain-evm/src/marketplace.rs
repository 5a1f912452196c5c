//! Marketplace contract handle over an alloy provider.

use ah_api_types::{
    Address, CatalogProduct, Contribution, Hub, HubProduct, HubProductDetails, HubStatistics,
    RequestRecord, Transaction, TransactionDetail, U256,
};
use ah_chain_client::{Binding, ChainError, ChainResult, MarketplaceContract, PendingTx};
use alloy::network::Ethereum;
use alloy::providers::{DynProvider, PendingTransactionBuilder};
use async_trait::async_trait;
use tracing::debug;

use crate::abi::AgriHubV3;
use crate::pending::{EvmPendingTx, send_error};

pub struct EvmMarketplace {
    address: Address,
    provider: DynProvider,
    binding: Binding,
    confirmations: u64,
}

impl EvmMarketplace {
    pub fn new(
        address: Address,
        provider: DynProvider,
        binding: Binding,
        confirmations: u64,
    ) -> Self {
        Self {
            address,
            provider,
            binding,
            confirmations,
        }
    }

    fn contract(&self) -> AgriHubV3::AgriHubV3Instance<&DynProvider> {
        AgriHubV3::new(self.address, &self.provider)
    }

    fn signer(&self, method: &str) -> ChainResult<Address> {
        self.binding.account().ok_or_else(|| ChainError::ReadOnly {
            operation: method.to_owned(),
        })
    }

    fn track(&self, method: &'static str, pending: PendingTransactionBuilder<Ethereum>) -> PendingTx {
        debug!("{} submitted: {}", method, pending.tx_hash());
        Box::new(EvmPendingTx::new(method, pending, self.confirmations))
    }
}

fn timestamp(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl MarketplaceContract for EvmMarketplace {
    fn address(&self) -> Address {
        self.address
    }

    async fn farmer_exists(&self, farmer: Address) -> ChainResult<bool> {
        self.contract()
            .farmerExists(farmer)
            .call()
            .await
            .map_err(|e| ChainError::call("farmerExists", e))
    }

    async fn farmer_earnings(&self, farmer: Address) -> ChainResult<U256> {
        self.contract()
            .getFarmerEarnings(farmer)
            .call()
            .await
            .map_err(|e| ChainError::call("getFarmerEarnings", e))
    }

    async fn farmer_transactions(&self, farmer: Address) -> ChainResult<Vec<Transaction>> {
        let rows = self
            .contract()
            .getFarmerTransactionsStructured(farmer)
            .call()
            .await
            .map_err(|e| ChainError::call("getFarmerTransactionsStructured", e))?;

        Ok(rows
            .into_iter()
            .map(|tx| Transaction {
                timestamp: timestamp(tx.timestamp),
                product_id: tx.productId,
                product_name: tx.productName,
                quantity: tx.quantity,
                buyer: tx.buyer,
                total_amount: tx.totalAmount,
                detail: TransactionDetail::Farmer {
                    share_percentage: tx.sharePercentage,
                    share_amount: tx.shareAmount,
                },
            })
            .collect())
    }

    async fn farmer_contributions(&self, farmer: Address) -> ChainResult<Vec<Contribution>> {
        let rows = self
            .contract()
            .getFarmerContributions(farmer)
            .call()
            .await
            .map_err(|e| ChainError::call("getFarmerContributions", e))?;

        Ok(rows
            .into_iter()
            .map(|c| Contribution {
                hub: c.hubAddress,
                product_id: c.productId,
                quantity: c.quantity,
                price: c.price,
            })
            .collect())
    }

    async fn all_hubs(&self) -> ChainResult<Vec<Address>> {
        self.contract()
            .getAllHubs()
            .call()
            .await
            .map_err(|e| ChainError::call("getAllHubs", e))
    }

    async fn hub_info(&self, hub: Address) -> ChainResult<Hub> {
        let info = self
            .contract()
            .getHubInfo(hub)
            .call()
            .await
            .map_err(|e| ChainError::call("getHubInfo", e))?;

        Ok(Hub {
            address: hub,
            name: info.name,
            location: info.location,
        })
    }

    async fn hub_products(&self, hub: Address) -> ChainResult<Vec<HubProduct>> {
        let rows = self
            .contract()
            .getHubProducts(hub)
            .call()
            .await
            .map_err(|e| ChainError::call("getHubProducts", e))?;

        Ok(rows
            .into_iter()
            .map(|p| HubProduct {
                product_id: p.productId,
                name: p.name,
                total_quantity: p.totalQuantity,
                weighted_price: p.weightedPrice,
                active: p.active,
            })
            .collect())
    }

    async fn hub_product_details(
        &self,
        hub: Address,
        product_id: U256,
    ) -> ChainResult<HubProductDetails> {
        let details = self
            .contract()
            .getHubProductDetails(hub, product_id)
            .call()
            .await
            .map_err(|e| ChainError::call("getHubProductDetails", e))?;

        Ok(HubProductDetails {
            name: details.name,
            total_quantity: details.totalQuantity,
            weighted_price: details.weightedPrice,
            active: details.active,
        })
    }

    async fn hub_transactions(&self, hub: Address) -> ChainResult<Vec<Transaction>> {
        let rows = self
            .contract()
            .getHubTransactionsStructured(hub)
            .call()
            .await
            .map_err(|e| ChainError::call("getHubTransactionsStructured", e))?;

        Ok(rows
            .into_iter()
            .map(|tx| Transaction {
                timestamp: timestamp(tx.timestamp),
                product_id: tx.productId,
                product_name: tx.productName,
                quantity: tx.quantity,
                buyer: tx.buyer,
                total_amount: tx.totalAmount,
                detail: TransactionDetail::Hub {
                    price: tx.price,
                    farmer: tx.farmer,
                },
            })
            .collect())
    }

    async fn hub_statistics(&self, hub: Address) -> ChainResult<HubStatistics> {
        let stats = self
            .contract()
            .getHubStatistics(hub)
            .call()
            .await
            .map_err(|e| ChainError::call("getHubStatistics", e))?;

        Ok(HubStatistics {
            active_listings: stats.activeListings,
            total_transactions: stats.totalTransactions,
            transaction_volume: stats.transactionVolume,
            pending_requests: stats.pendingRequests,
        })
    }

    async fn product_requests(
        &self,
        from_hub: Address,
        to_hub: Address,
        product_id: U256,
    ) -> ChainResult<Vec<RequestRecord>> {
        let result = self
            .contract()
            .getAllProductRequests(from_hub, to_hub, product_id)
            .call()
            .await
            .map_err(|e| ChainError::call("getAllProductRequests", e))?;

        Ok(result
            .requestIndices
            .into_iter()
            .zip(result.quantities)
            .zip(result.statuses)
            .map(|((request_index, quantity), status_code)| RequestRecord {
                request_index,
                quantity,
                status_code,
            })
            .collect())
    }

    async fn all_products(&self) -> ChainResult<Vec<CatalogProduct>> {
        let result = self
            .contract()
            .getAllProducts()
            .call()
            .await
            .map_err(|e| ChainError::call("getAllProducts", e))?;

        Ok(result
            .productIds
            .into_iter()
            .zip(result.productNames)
            .map(|(id, name)| CatalogProduct { id, name })
            .collect())
    }

    async fn product_name(&self, product_id: U256) -> ChainResult<String> {
        self.contract()
            .getProductDetails(product_id)
            .call()
            .await
            .map_err(|e| ChainError::call("getProductDetails", e))
    }

    async fn payment_token(&self) -> ChainResult<Address> {
        self.contract()
            .paymentToken()
            .call()
            .await
            .map_err(|e| ChainError::call("paymentToken", e))
    }

    // ===== Writes =====

    async fn register_as_farmer(&self) -> ChainResult<PendingTx> {
        let from = self.signer("registerAsFarmer")?;
        let pending = self
            .contract()
            .registerAsFarmer()
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("registerAsFarmer", e))?;
        Ok(self.track("registerAsFarmer", pending))
    }

    async fn contribute_product(
        &self,
        hub: Address,
        product_id: U256,
        quantity: U256,
        price: U256,
    ) -> ChainResult<PendingTx> {
        let from = self.signer("contributeProduct")?;
        let pending = self
            .contract()
            .contributeProduct(hub, product_id, quantity, price)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("contributeProduct", e))?;
        Ok(self.track("contributeProduct", pending))
    }

    async fn register_as_hub(&self, name: &str, location: &str) -> ChainResult<PendingTx> {
        let from = self.signer("registerAsHub")?;
        let pending = self
            .contract()
            .registerAsHub(name.to_owned(), location.to_owned())
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("registerAsHub", e))?;
        Ok(self.track("registerAsHub", pending))
    }

    async fn create_product(&self, name: &str) -> ChainResult<PendingTx> {
        let from = self.signer("createProduct")?;
        let pending = self
            .contract()
            .createProduct(name.to_owned())
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("createProduct", e))?;
        Ok(self.track("createProduct", pending))
    }

    async fn add_product_to_hub(&self, product_id: U256) -> ChainResult<PendingTx> {
        let from = self.signer("addProductToHub")?;
        let pending = self
            .contract()
            .addProductToHub(product_id)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("addProductToHub", e))?;
        Ok(self.track("addProductToHub", pending))
    }

    async fn toggle_product_status(
        &self,
        product_id: U256,
        active: bool,
    ) -> ChainResult<PendingTx> {
        let from = self.signer("toggleProductStatus")?;
        let pending = self
            .contract()
            .toggleProductStatus(product_id, active)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("toggleProductStatus", e))?;
        Ok(self.track("toggleProductStatus", pending))
    }

    async fn request_product_from_hub(
        &self,
        to_hub: Address,
        product_id: U256,
        quantity: U256,
    ) -> ChainResult<PendingTx> {
        let from = self.signer("requestProductFromHub")?;
        let pending = self
            .contract()
            .requestProductFromHub(to_hub, product_id, quantity)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("requestProductFromHub", e))?;
        Ok(self.track("requestProductFromHub", pending))
    }

    async fn fulfill_product_request(
        &self,
        from_hub: Address,
        product_id: U256,
        request_index: U256,
    ) -> ChainResult<PendingTx> {
        let from = self.signer("fulfillProductRequest")?;
        let pending = self
            .contract()
            .fulfillProductRequest(from_hub, product_id, request_index)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("fulfillProductRequest", e))?;
        Ok(self.track("fulfillProductRequest", pending))
    }

    async fn deny_product_request(
        &self,
        from_hub: Address,
        product_id: U256,
        request_index: U256,
    ) -> ChainResult<PendingTx> {
        let from = self.signer("denyProductRequest")?;
        let pending = self
            .contract()
            .denyProductRequest(from_hub, product_id, request_index)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("denyProductRequest", e))?;
        Ok(self.track("denyProductRequest", pending))
    }

    async fn purchase_product(
        &self,
        hub: Address,
        product_id: U256,
        quantity: U256,
    ) -> ChainResult<PendingTx> {
        let from = self.signer("purchaseProduct")?;
        let pending = self
            .contract()
            .purchaseProduct(hub, product_id, quantity)
            .from(from)
            .send()
            .await
            .map_err(|e| send_error("purchaseProduct", e))?;
        Ok(self.track("purchaseProduct", pending))
    }
}
