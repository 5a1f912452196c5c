//! In-memory stand-ins for the contract, token and wallet seams.
//!
//! Submitting a transaction validates it against current state; its effect is
//! applied only when the transaction is confirmed. Every read, submit and
//! confirm is appended to a call log so callers can assert on ordering.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use ah_api_types::{
    Address, CatalogProduct, Contribution, Hub, HubProduct, HubProductDetails, HubStatistics,
    RequestRecord, Transaction, U256,
};
use async_trait::async_trait;

use crate::{
    Binding, ChainError, ChainResult, ContractBinder, MarketplaceContract, PaymentToken,
    PendingTransaction, PendingTx, TxReceipt, WalletProvider,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainCall {
    Read { method: &'static str, args: String },
    Submit { method: &'static str, args: String },
    Confirm { method: &'static str },
}

impl ChainCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Read { method, .. } | Self::Submit { method, .. } | Self::Confirm { method } => {
                method
            }
        }
    }
}

type Effect = Box<dyn FnOnce(&mut ChainState, Address) -> ChainResult<()> + Send>;

#[derive(Default)]
struct ChainState {
    marketplace: Address,
    payment_token: Option<Address>,
    hubs: Vec<Hub>,
    hub_products: HashMap<Address, Vec<HubProduct>>,
    hub_transactions: HashMap<Address, Vec<Transaction>>,
    hub_statistics: HashMap<Address, HubStatistics>,
    catalog: Vec<CatalogProduct>,
    farmers: HashSet<Address>,
    earnings: HashMap<Address, U256>,
    farmer_transactions: HashMap<Address, Vec<Transaction>>,
    contributions: HashMap<Address, Vec<Contribution>>,
    requests: HashMap<(Address, Address, U256), Vec<RequestRecord>>,
    token_symbol: String,
    token_decimals: u8,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    read_failures: HashMap<(&'static str, Option<Address>), ChainError>,
    submit_failures: HashMap<&'static str, ChainError>,
    reject_signer_binding: bool,
    tx_counter: u64,
    block_number: u64,
    log: Vec<ChainCall>,
}

impl ChainState {
    fn read_failure(&self, method: &'static str, target: Option<Address>) -> Option<ChainError> {
        self.read_failures
            .get(&(method, target))
            .or_else(|| self.read_failures.get(&(method, None)))
            .cloned()
    }

    fn is_hub(&self, address: Address) -> bool {
        self.hubs.iter().any(|hub| hub.address == address)
    }

    fn listed(&self, hub: Address, product_id: U256) -> Option<&HubProduct> {
        self.hub_products
            .get(&hub)?
            .iter()
            .find(|product| product.product_id == product_id)
    }

    fn listed_mut(&mut self, hub: Address, product_id: U256) -> Option<&mut HubProduct> {
        self.hub_products
            .get_mut(&hub)?
            .iter_mut()
            .find(|product| product.product_id == product_id)
    }
}

fn rejected(method: &str, reason: &str) -> ChainError {
    ChainError::transaction(method, format!("execution reverted: {reason}"))
}

/// Shared handle onto one simulated deployment.
#[derive(Clone, Default)]
pub struct InMemoryChain {
    state: Arc<Mutex<ChainState>>,
}

impl InMemoryChain {
    pub fn new(marketplace: Address, payment_token: Address) -> Self {
        let chain = Self::default();
        {
            let mut state = chain.state();
            state.marketplace = marketplace;
            state.payment_token = Some(payment_token);
            state.token_symbol = "AGRI".to_owned();
            state.token_decimals = 18;
        }
        chain
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn binder(&self) -> InMemoryBinder {
        InMemoryBinder {
            chain: self.clone(),
        }
    }

    pub fn marketplace_address(&self) -> Address {
        self.state().marketplace
    }

    // ── seeding ──

    pub fn add_hub(&self, address: Address, name: &str, location: &str) {
        let mut state = self.state();
        state.hubs.push(Hub {
            address,
            name: name.to_owned(),
            location: location.to_owned(),
        });
        state.hub_products.entry(address).or_default();
    }

    pub fn add_catalog_product(&self, name: &str) -> U256 {
        let mut state = self.state();
        let id = U256::from(state.catalog.len() as u64 + 1);
        state.catalog.push(CatalogProduct {
            id,
            name: name.to_owned(),
        });
        id
    }

    pub fn list_product(&self, hub: Address, product: HubProduct) {
        self.state()
            .hub_products
            .entry(hub)
            .or_default()
            .push(product);
    }

    pub fn register_farmer(&self, farmer: Address, earnings: U256) {
        let mut state = self.state();
        state.farmers.insert(farmer);
        state.earnings.insert(farmer, earnings);
    }

    pub fn push_farmer_transaction(&self, farmer: Address, tx: Transaction) {
        self.state()
            .farmer_transactions
            .entry(farmer)
            .or_default()
            .push(tx);
    }

    pub fn push_hub_transaction(&self, hub: Address, tx: Transaction) {
        self.state()
            .hub_transactions
            .entry(hub)
            .or_default()
            .push(tx);
    }

    pub fn set_hub_statistics(&self, hub: Address, stats: HubStatistics) {
        self.state().hub_statistics.insert(hub, stats);
    }

    pub fn add_contribution(&self, farmer: Address, contribution: Contribution) {
        self.state()
            .contributions
            .entry(farmer)
            .or_default()
            .push(contribution);
    }

    pub fn add_request(
        &self,
        from_hub: Address,
        to_hub: Address,
        product_id: U256,
        quantity: U256,
        status_code: u8,
    ) {
        let mut state = self.state();
        let entries = state
            .requests
            .entry((from_hub, to_hub, product_id))
            .or_default();
        let request_index = U256::from(entries.len() as u64);
        entries.push(RequestRecord {
            request_index,
            quantity,
            status_code,
        });
    }

    pub fn set_balance(&self, owner: Address, amount: U256) {
        self.state().balances.insert(owner, amount);
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: U256) {
        self.state().allowances.insert((owner, spender), amount);
    }

    pub fn set_token_metadata(&self, symbol: &str, decimals: u8) {
        let mut state = self.state();
        state.token_symbol = symbol.to_owned();
        state.token_decimals = decimals;
    }

    /// Make `method` fail, for one target address or for every call when `target` is `None`.
    pub fn fail_read(&self, method: &'static str, target: Option<Address>, err: ChainError) {
        self.state().read_failures.insert((method, target), err);
    }

    pub fn fail_submit(&self, method: &'static str, err: ChainError) {
        self.state().submit_failures.insert(method, err);
    }

    pub fn reject_signer_binding(&self, reject: bool) {
        self.state().reject_signer_binding = reject;
    }

    // ── inspection ──

    pub fn calls(&self) -> Vec<ChainCall> {
        self.state().log.clone()
    }

    pub fn clear_calls(&self) {
        self.state().log.clear();
    }

    pub fn reads_of(&self, method: &str) -> usize {
        self.state()
            .log
            .iter()
            .filter(|call| matches!(call, ChainCall::Read { method: m, .. } if *m == method))
            .count()
    }

    /// Submits and confirms in order, rendered as `submit name(args)` / `confirm name`.
    pub fn write_log(&self) -> Vec<String> {
        self.state()
            .log
            .iter()
            .filter_map(|call| match call {
                ChainCall::Read { .. } => None,
                ChainCall::Submit { method, args } => Some(format!("submit {method}({args})")),
                ChainCall::Confirm { method } => Some(format!("confirm {method}")),
            })
            .collect()
    }

    pub fn balance(&self, owner: Address) -> U256 {
        self.state()
            .balances
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_farmer(&self, address: Address) -> bool {
        self.state().farmers.contains(&address)
    }

    pub fn request_status(
        &self,
        from_hub: Address,
        to_hub: Address,
        product_id: U256,
        request_index: usize,
    ) -> Option<u8> {
        self.state()
            .requests
            .get(&(from_hub, to_hub, product_id))?
            .get(request_index)
            .map(|record| record.status_code)
    }

    // ── plumbing ──

    fn read<T>(
        &self,
        method: &'static str,
        target: Option<Address>,
        args: String,
        f: impl FnOnce(&ChainState) -> ChainResult<T>,
    ) -> ChainResult<T> {
        let mut state = self.state();
        state.log.push(ChainCall::Read { method, args });
        if let Some(err) = state.read_failure(method, target) {
            return Err(err);
        }
        f(&state)
    }

    fn submit(
        &self,
        binding: Binding,
        method: &'static str,
        args: String,
        check: impl FnOnce(&ChainState, Address) -> ChainResult<()>,
        effect: impl FnOnce(&mut ChainState, Address) -> ChainResult<()> + Send + 'static,
    ) -> ChainResult<PendingTx> {
        let Some(from) = binding.account() else {
            return Err(ChainError::ReadOnly {
                operation: method.to_owned(),
            });
        };

        let mut state = self.state();
        state.log.push(ChainCall::Submit { method, args });
        if let Some(err) = state.submit_failures.get(method).cloned() {
            return Err(err);
        }
        check(&state, from)?;

        state.tx_counter += 1;
        let tx_hash = format!("0x{:064x}", state.tx_counter);

        Ok(Box::new(MemoryPendingTx {
            chain: self.clone(),
            method,
            tx_hash,
            from,
            effect: Box::new(effect),
        }))
    }
}

struct MemoryPendingTx {
    chain: InMemoryChain,
    method: &'static str,
    tx_hash: String,
    from: Address,
    effect: Effect,
}

impl MemoryPendingTx {
    fn apply(self) -> ChainResult<TxReceipt> {
        let mut state = self.chain.state();
        state.log.push(ChainCall::Confirm {
            method: self.method,
        });
        state.block_number += 1;
        let block_number = state.block_number;

        match (self.effect)(&mut state, self.from) {
            Ok(()) => Ok(TxReceipt {
                tx_hash: self.tx_hash,
                block_number: Some(block_number),
            }),
            Err(_) => Err(ChainError::Reverted {
                tx_hash: self.tx_hash,
            }),
        }
    }
}

#[async_trait]
impl PendingTransaction for MemoryPendingTx {
    fn tx_hash(&self) -> &str {
        &self.tx_hash
    }

    async fn confirm(self: Box<Self>) -> ChainResult<TxReceipt> {
        (*self).apply()
    }
}

// ── binder ──

#[derive(Clone)]
pub struct InMemoryBinder {
    chain: InMemoryChain,
}

impl ContractBinder for InMemoryBinder {
    fn bind_marketplace(&self, binding: Binding) -> ChainResult<Arc<dyn MarketplaceContract>> {
        let (address, reject_signer) = {
            let state = self.chain.state();
            (state.marketplace, state.reject_signer_binding)
        };
        if reject_signer && matches!(binding, Binding::Signer(_)) {
            return Err(ChainError::Configuration(
                "wallet signer unavailable".to_owned(),
            ));
        }
        Ok(Arc::new(MemoryMarketplace {
            chain: self.chain.clone(),
            address,
            binding,
        }))
    }

    fn bind_token(&self, token: Address, binding: Binding) -> ChainResult<Arc<dyn PaymentToken>> {
        Ok(Arc::new(MemoryToken {
            chain: self.chain.clone(),
            address: token,
            binding,
        }))
    }
}

// ── marketplace ──

struct MemoryMarketplace {
    chain: InMemoryChain,
    address: Address,
    binding: Binding,
}

#[async_trait]
impl MarketplaceContract for MemoryMarketplace {
    fn address(&self) -> Address {
        self.address
    }

    async fn farmer_exists(&self, farmer: Address) -> ChainResult<bool> {
        self.chain
            .read("farmerExists", Some(farmer), farmer.to_string(), |s| {
                Ok(s.farmers.contains(&farmer))
            })
    }

    async fn farmer_earnings(&self, farmer: Address) -> ChainResult<U256> {
        self.chain
            .read("getFarmerEarnings", Some(farmer), farmer.to_string(), |s| {
                Ok(s.earnings.get(&farmer).copied().unwrap_or_default())
            })
    }

    async fn farmer_transactions(&self, farmer: Address) -> ChainResult<Vec<Transaction>> {
        self.chain.read(
            "getFarmerTransactionsStructured",
            Some(farmer),
            farmer.to_string(),
            |s| Ok(s.farmer_transactions.get(&farmer).cloned().unwrap_or_default()),
        )
    }

    async fn farmer_contributions(&self, farmer: Address) -> ChainResult<Vec<Contribution>> {
        self.chain
            .read("getFarmerContributions", Some(farmer), farmer.to_string(), |s| {
                Ok(s.contributions.get(&farmer).cloned().unwrap_or_default())
            })
    }

    async fn all_hubs(&self) -> ChainResult<Vec<Address>> {
        self.chain.read("getAllHubs", None, String::new(), |s| {
            Ok(s.hubs.iter().map(|hub| hub.address).collect())
        })
    }

    async fn hub_info(&self, hub: Address) -> ChainResult<Hub> {
        self.chain
            .read("getHubInfo", Some(hub), hub.to_string(), |s| {
                s.hubs
                    .iter()
                    .find(|entry| entry.address == hub)
                    .cloned()
                    .ok_or_else(|| ChainError::call("getHubInfo", "execution reverted: hub not found"))
            })
    }

    async fn hub_products(&self, hub: Address) -> ChainResult<Vec<HubProduct>> {
        self.chain
            .read("getHubProducts", Some(hub), hub.to_string(), |s| {
                Ok(s.hub_products.get(&hub).cloned().unwrap_or_default())
            })
    }

    async fn hub_product_details(
        &self,
        hub: Address,
        product_id: U256,
    ) -> ChainResult<HubProductDetails> {
        self.chain.read(
            "getHubProductDetails",
            Some(hub),
            format!("{hub},{product_id}"),
            |s| {
                s.listed(hub, product_id)
                    .map(|product| HubProductDetails {
                        name: product.name.clone(),
                        total_quantity: product.total_quantity,
                        weighted_price: product.weighted_price,
                        active: product.active,
                    })
                    .ok_or_else(|| {
                        ChainError::call(
                            "getHubProductDetails",
                            "execution reverted: product not offered by hub",
                        )
                    })
            },
        )
    }

    async fn hub_transactions(&self, hub: Address) -> ChainResult<Vec<Transaction>> {
        self.chain
            .read("getHubTransactionsStructured", Some(hub), hub.to_string(), |s| {
                Ok(s.hub_transactions.get(&hub).cloned().unwrap_or_default())
            })
    }

    async fn hub_statistics(&self, hub: Address) -> ChainResult<HubStatistics> {
        self.chain
            .read("getHubStatistics", Some(hub), hub.to_string(), |s| {
                Ok(s.hub_statistics.get(&hub).cloned().unwrap_or_default())
            })
    }

    async fn product_requests(
        &self,
        from_hub: Address,
        to_hub: Address,
        product_id: U256,
    ) -> ChainResult<Vec<RequestRecord>> {
        self.chain.read(
            "getAllProductRequests",
            Some(from_hub),
            format!("{from_hub},{to_hub},{product_id}"),
            |s| {
                Ok(s.requests
                    .get(&(from_hub, to_hub, product_id))
                    .cloned()
                    .unwrap_or_default())
            },
        )
    }

    async fn all_products(&self) -> ChainResult<Vec<CatalogProduct>> {
        self.chain
            .read("getAllProducts", None, String::new(), |s| Ok(s.catalog.clone()))
    }

    async fn product_name(&self, product_id: U256) -> ChainResult<String> {
        self.chain
            .read("getProductDetails", None, product_id.to_string(), |s| {
                s.catalog
                    .iter()
                    .find(|product| product.id == product_id)
                    .map(|product| product.name.clone())
                    .ok_or_else(|| {
                        ChainError::call("getProductDetails", "execution reverted: unknown product")
                    })
            })
    }

    async fn payment_token(&self) -> ChainResult<Address> {
        self.chain.read("paymentToken", None, String::new(), |s| {
            s.payment_token
                .ok_or_else(|| ChainError::call("paymentToken", "payment token not set"))
        })
    }

    async fn register_as_farmer(&self) -> ChainResult<PendingTx> {
        self.chain.submit(
            self.binding,
            "registerAsFarmer",
            String::new(),
            |s, from| {
                if s.farmers.contains(&from) {
                    return Err(rejected("registerAsFarmer", "farmer already registered"));
                }
                Ok(())
            },
            |s, from| {
                s.farmers.insert(from);
                s.earnings.entry(from).or_default();
                Ok(())
            },
        )
    }

    async fn contribute_product(
        &self,
        hub: Address,
        product_id: U256,
        quantity: U256,
        price: U256,
    ) -> ChainResult<PendingTx> {
        self.chain.submit(
            self.binding,
            "contributeProduct",
            format!("{hub},{product_id},{quantity},{price}"),
            move |s, from| {
                if !s.farmers.contains(&from) {
                    return Err(rejected("contributeProduct", "farmer not registered"));
                }
                if quantity.is_zero() {
                    return Err(rejected("contributeProduct", "quantity must be positive"));
                }
                if s.listed(hub, product_id).is_none() {
                    return Err(rejected("contributeProduct", "product not offered by hub"));
                }
                Ok(())
            },
            move |s, from| {
                let product = s
                    .listed_mut(hub, product_id)
                    .ok_or_else(|| rejected("contributeProduct", "product not offered by hub"))?;
                let new_quantity = product.total_quantity + quantity;
                let weighted = product.total_quantity * product.weighted_price + quantity * price;
                product.weighted_price = weighted / new_quantity;
                product.total_quantity = new_quantity;
                s.contributions.entry(from).or_default().push(Contribution {
                    hub,
                    product_id,
                    quantity,
                    price,
                });
                Ok(())
            },
        )
    }

    async fn register_as_hub(&self, name: &str, location: &str) -> ChainResult<PendingTx> {
        let hub_name = name.to_owned();
        let hub_location = location.to_owned();
        self.chain.submit(
            self.binding,
            "registerAsHub",
            format!("{name},{location}"),
            |s, from| {
                if s.is_hub(from) {
                    return Err(rejected("registerAsHub", "hub already registered"));
                }
                Ok(())
            },
            move |s, from| {
                s.hubs.push(Hub {
                    address: from,
                    name: hub_name,
                    location: hub_location,
                });
                s.hub_products.entry(from).or_default();
                Ok(())
            },
        )
    }

    async fn create_product(&self, name: &str) -> ChainResult<PendingTx> {
        let product_name = name.to_owned();
        self.chain.submit(
            self.binding,
            "createProduct",
            name.to_owned(),
            |_, _| Ok(()),
            move |s, _| {
                let id = U256::from(s.catalog.len() as u64 + 1);
                s.catalog.push(CatalogProduct {
                    id,
                    name: product_name,
                });
                Ok(())
            },
        )
    }

    async fn add_product_to_hub(&self, product_id: U256) -> ChainResult<PendingTx> {
        self.chain.submit(
            self.binding,
            "addProductToHub",
            product_id.to_string(),
            move |s, from| {
                if !s.is_hub(from) {
                    return Err(rejected("addProductToHub", "caller is not a hub"));
                }
                if !s.catalog.iter().any(|product| product.id == product_id) {
                    return Err(rejected("addProductToHub", "unknown product"));
                }
                if s.listed(from, product_id).is_some() {
                    return Err(rejected("addProductToHub", "product already listed"));
                }
                Ok(())
            },
            move |s, from| {
                let name = s
                    .catalog
                    .iter()
                    .find(|product| product.id == product_id)
                    .map(|product| product.name.clone())
                    .unwrap_or_default();
                s.hub_products.entry(from).or_default().push(HubProduct {
                    product_id,
                    name,
                    total_quantity: U256::ZERO,
                    weighted_price: U256::ZERO,
                    active: true,
                });
                Ok(())
            },
        )
    }

    async fn toggle_product_status(
        &self,
        product_id: U256,
        active: bool,
    ) -> ChainResult<PendingTx> {
        self.chain.submit(
            self.binding,
            "toggleProductStatus",
            format!("{product_id},{active}"),
            move |s, from| {
                if s.listed(from, product_id).is_none() {
                    return Err(rejected("toggleProductStatus", "product not offered by hub"));
                }
                Ok(())
            },
            move |s, from| {
                let product = s
                    .listed_mut(from, product_id)
                    .ok_or_else(|| rejected("toggleProductStatus", "product not offered by hub"))?;
                product.active = active;
                Ok(())
            },
        )
    }

    async fn request_product_from_hub(
        &self,
        to_hub: Address,
        product_id: U256,
        quantity: U256,
    ) -> ChainResult<PendingTx> {
        self.chain.submit(
            self.binding,
            "requestProductFromHub",
            format!("{to_hub},{product_id},{quantity}"),
            move |s, from| {
                if !s.is_hub(from) || !s.is_hub(to_hub) {
                    return Err(rejected("requestProductFromHub", "both parties must be hubs"));
                }
                Ok(())
            },
            move |s, from| {
                let entries = s.requests.entry((from, to_hub, product_id)).or_default();
                let request_index = U256::from(entries.len() as u64);
                entries.push(RequestRecord {
                    request_index,
                    quantity,
                    status_code: 0,
                });
                Ok(())
            },
        )
    }

    async fn fulfill_product_request(
        &self,
        from_hub: Address,
        product_id: U256,
        request_index: U256,
    ) -> ChainResult<PendingTx> {
        settle_request(
            &self.chain,
            self.binding,
            "fulfillProductRequest",
            from_hub,
            product_id,
            request_index,
            1,
        )
    }

    async fn deny_product_request(
        &self,
        from_hub: Address,
        product_id: U256,
        request_index: U256,
    ) -> ChainResult<PendingTx> {
        settle_request(
            &self.chain,
            self.binding,
            "denyProductRequest",
            from_hub,
            product_id,
            request_index,
            2,
        )
    }

    async fn purchase_product(
        &self,
        hub: Address,
        product_id: U256,
        quantity: U256,
    ) -> ChainResult<PendingTx> {
        let marketplace = self.address;
        let cost_of = move |s: &ChainState| -> ChainResult<U256> {
            let product = s
                .listed(hub, product_id)
                .ok_or_else(|| rejected("purchaseProduct", "product not offered by hub"))?;
            if !product.active || product.total_quantity < quantity {
                return Err(rejected("purchaseProduct", "insufficient stock"));
            }
            Ok(product.weighted_price * quantity)
        };

        self.chain.submit(
            self.binding,
            "purchaseProduct",
            format!("{hub},{product_id},{quantity}"),
            move |s, from| {
                let cost = cost_of(s)?;
                let allowance = s
                    .allowances
                    .get(&(from, marketplace))
                    .copied()
                    .unwrap_or_default();
                if allowance < cost {
                    return Err(rejected("purchaseProduct", "ERC20: insufficient allowance"));
                }
                let balance = s.balances.get(&from).copied().unwrap_or_default();
                if balance < cost {
                    return Err(rejected("purchaseProduct", "ERC20: transfer amount exceeds balance"));
                }
                Ok(())
            },
            move |s, from| {
                let cost = cost_of(s)?;
                let allowance = s.allowances.entry((from, marketplace)).or_default();
                *allowance = allowance
                    .checked_sub(cost)
                    .ok_or_else(|| rejected("purchaseProduct", "ERC20: insufficient allowance"))?;
                let balance = s.balances.entry(from).or_default();
                *balance = balance
                    .checked_sub(cost)
                    .ok_or_else(|| rejected("purchaseProduct", "ERC20: transfer amount exceeds balance"))?;
                if let Some(product) = s.listed_mut(hub, product_id) {
                    product.total_quantity -= quantity;
                }
                Ok(())
            },
        )
    }
}

fn settle_request(
    chain: &InMemoryChain,
    binding: Binding,
    method: &'static str,
    from_hub: Address,
    product_id: U256,
    request_index: U256,
    status_code: u8,
) -> ChainResult<PendingTx> {
    let index = usize::try_from(request_index).unwrap_or(usize::MAX);
    chain.submit(
        binding,
        method,
        format!("{from_hub},{product_id},{request_index}"),
        move |s, to_hub| {
            let pending = s
                .requests
                .get(&(from_hub, to_hub, product_id))
                .and_then(|entries| entries.get(index))
                .is_some_and(|record| record.status_code == 0);
            if !pending {
                return Err(rejected(method, "request is not pending"));
            }
            Ok(())
        },
        move |s, to_hub| {
            let record = s
                .requests
                .get_mut(&(from_hub, to_hub, product_id))
                .and_then(|entries| entries.get_mut(index))
                .ok_or_else(|| rejected(method, "unknown request"))?;
            record.status_code = status_code;
            Ok(())
        },
    )
}

// ── token ──

struct MemoryToken {
    chain: InMemoryChain,
    address: Address,
    binding: Binding,
}

#[async_trait]
impl PaymentToken for MemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, owner: Address) -> ChainResult<U256> {
        self.chain
            .read("balanceOf", Some(owner), owner.to_string(), |s| {
                Ok(s.balances.get(&owner).copied().unwrap_or_default())
            })
    }

    async fn allowance(&self, owner: Address, spender: Address) -> ChainResult<U256> {
        self.chain
            .read("allowance", Some(owner), format!("{owner},{spender}"), |s| {
                Ok(s.allowances
                    .get(&(owner, spender))
                    .copied()
                    .unwrap_or_default())
            })
    }

    async fn symbol(&self) -> ChainResult<String> {
        self.chain
            .read("symbol", None, String::new(), |s| Ok(s.token_symbol.clone()))
    }

    async fn decimals(&self) -> ChainResult<u8> {
        self.chain
            .read("decimals", None, String::new(), |s| Ok(s.token_decimals))
    }

    async fn approve(&self, spender: Address, amount: U256) -> ChainResult<PendingTx> {
        self.chain.submit(
            self.binding,
            "approve",
            format!("{spender},{amount}"),
            |_, _| Ok(()),
            move |s, from| {
                s.allowances.insert((from, spender), amount);
                Ok(())
            },
        )
    }
}

// ── wallet ──

#[derive(Default)]
struct WalletState {
    accounts: Vec<Address>,
    authorized: bool,
    reject_prompts: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryWallet {
    state: Arc<Mutex<WalletState>>,
}

impl InMemoryWallet {
    /// A wallet holding `accounts` that has not yet authorised this site.
    pub fn new(accounts: Vec<Address>) -> Self {
        Self {
            state: Arc::new(Mutex::new(WalletState {
                accounts,
                authorized: false,
                reject_prompts: false,
            })),
        }
    }

    /// A wallet that already authorised this site in an earlier visit.
    pub fn authorized(accounts: Vec<Address>) -> Self {
        let wallet = Self::new(accounts);
        wallet.state().authorized = true;
        wallet
    }

    pub fn reject_prompts(&self) {
        self.state().reject_prompts = true;
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WalletProvider for InMemoryWallet {
    async fn accounts(&self) -> ChainResult<Vec<Address>> {
        let state = self.state();
        if state.authorized {
            Ok(state.accounts.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn request_accounts(&self) -> ChainResult<Vec<Address>> {
        let mut state = self.state();
        if state.reject_prompts {
            return Err(ChainError::UserRejected);
        }
        state.authorized = true;
        Ok(state.accounts.clone())
    }
}
