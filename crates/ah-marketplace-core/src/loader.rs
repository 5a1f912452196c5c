//! Read-side orchestration: one snapshot per viewer role.
//!
//! Each view is rebuilt from scratch on every load. Calls are independent, so
//! a snapshot can straddle on-chain state changes.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ah_api_types::units::{to_display, to_display_ether};
use ah_api_types::{
    Address, CatalogProduct, Contribution, DroppedItem, FarmerHubProducts, FarmerView, Hub, HubProduct,
    HubSummary, HubView, MarketProduct, MarketplaceView, Request, RequestStatus, Session,
    TokenHoldings, U256,
};
use ah_chain_client::{ChainError, ChainResult, MarketplaceContract, PaymentToken};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::contracts::ContractSession;
use crate::fanout::{Aggregate, fan_out};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Upper bound on concurrent reads in any fan-out.
    pub request_fanout_limit: usize,
    /// Hubs, in contract order, whose listings feed the marketplace product sample.
    pub featured_hub_limit: usize,
    pub featured_product_limit: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            request_fanout_limit: 8,
            featured_hub_limit: 3,
            featured_product_limit: 4,
        }
    }
}

/// Display rating shown next to a hub. Not sourced from the contract.
pub trait RatingSource: Send + Sync {
    fn rating(&self, hub: &Hub) -> f32;
}

/// Placeholder rating drawn uniformly from [4.5, 5.0], one decimal.
pub struct PlaceholderRating;

impl RatingSource for PlaceholderRating {
    fn rating(&self, _hub: &Hub) -> f32 {
        let raw: f32 = rand::thread_rng().gen_range(4.5..=5.0);
        (raw * 10.0).round() / 10.0
    }
}

pub struct FixedRating(pub f32);

impl RatingSource for FixedRating {
    fn rating(&self, _hub: &Hub) -> f32 {
        self.0
    }
}

pub struct DataLoader {
    config: LoaderConfig,
    rating: Arc<dyn RatingSource>,
}

impl DataLoader {
    pub fn new(config: LoaderConfig, rating: Arc<dyn RatingSource>) -> Self {
        Self { config, rating }
    }

    // ── farmer ──

    pub async fn load_farmer_view(
        &self,
        contracts: &ContractSession,
        account: Address,
        selected_hub: Option<Address>,
    ) -> ChainResult<FarmerView> {
        let market = contracts.marketplace();
        let registered = market.farmer_exists(account).await?;
        debug!("farmer {} registered: {}", account, registered);

        let (earnings, transactions) = if registered {
            let earnings = market.farmer_earnings(account).await?;
            let transactions = market.farmer_transactions(account).await?;
            (Some(earnings), transactions)
        } else {
            (None, Vec::new())
        };

        let hubs = self.load_hubs(market, None).await?;
        let mut dropped = hubs.dropped;

        let hub_products = match selected_hub {
            Some(hub) => {
                let products = self.load_farmer_hub_products(market, account, hub).await?;
                dropped.extend(products.dropped);
                Some(FarmerHubProducts {
                    hub,
                    products: products.items,
                })
            }
            None => None,
        };

        Ok(FarmerView {
            account,
            registered,
            earnings_display: earnings.map(to_display_ether),
            earnings,
            transactions,
            hubs: hubs.items,
            hub_products,
            dropped,
        })
    }

    /// The farmer's own contributions at `hub`, priced at the hub's weighted price.
    async fn load_farmer_hub_products(
        &self,
        market: &Arc<dyn MarketplaceContract>,
        farmer: Address,
        hub: Address,
    ) -> ChainResult<Aggregate<HubProduct>> {
        let contributions: Vec<ContributionRef> = market
            .farmer_contributions(farmer)
            .await?
            .into_iter()
            .filter(|contribution| contribution.hub == hub)
            .map(ContributionRef)
            .collect();

        Ok(fan_out(
            contributions,
            self.config.request_fanout_limit,
            |ContributionRef(contribution)| async move {
                let name = market.product_name(contribution.product_id).await?;
                let details = market
                    .hub_product_details(hub, contribution.product_id)
                    .await?;
                Ok::<_, ChainError>(HubProduct {
                    product_id: contribution.product_id,
                    name,
                    total_quantity: contribution.quantity,
                    weighted_price: details.weighted_price,
                    active: true,
                })
            },
        )
        .await)
    }

    // ── hub ──

    pub async fn load_hub_view(
        &self,
        contracts: &ContractSession,
        account: Address,
    ) -> ChainResult<HubView> {
        let market = contracts.marketplace();

        let registration = match market.hub_info(account).await {
            Ok(hub) if !hub.name.is_empty() => Some(hub),
            Ok(_) => None,
            Err(err) => {
                debug!("no hub record for {}: {}", account, err);
                None
            }
        };

        let Some(registration) = registration else {
            info!("{} is not a registered hub", account);
            return Ok(HubView {
                account,
                registration: None,
                products: Vec::new(),
                transactions: Vec::new(),
                statistics: None,
                other_hubs: Vec::new(),
                catalog: Vec::new(),
                requests: Vec::new(),
                dropped: Vec::new(),
            });
        };

        let products = market.hub_products(account).await?;
        let transactions = market.hub_transactions(account).await?;
        let statistics = market.hub_statistics(account).await?;

        let addresses = hub_addresses(market, Some(account)).await?;
        let other_hubs = self.hub_infos(market, addresses.clone()).await;
        let catalog = market.all_products().await?;
        let requests = self
            .scan_requests(market, account, &addresses, &other_hubs.items, &catalog)
            .await;

        let mut dropped = other_hubs.dropped;
        dropped.extend(requests.dropped);

        Ok(HubView {
            account,
            registration: Some(registration),
            products,
            transactions,
            statistics: Some(statistics),
            other_hubs: other_hubs.items,
            catalog,
            requests: requests.items,
            dropped,
        })
    }

    /// Requests addressed to `hub`, one read per (other hub, catalog product) pair.
    ///
    /// Every other hub is scanned, named or not. Names come from `known`,
    /// then from one `getHubInfo` per requesting hub, then the address itself.
    async fn scan_requests(
        &self,
        market: &Arc<dyn MarketplaceContract>,
        hub: Address,
        other_hubs: &[Address],
        known: &[Hub],
        catalog: &[CatalogProduct],
    ) -> Aggregate<Request> {
        let pairs: Vec<RequestPair> = other_hubs
            .iter()
            .flat_map(|from| {
                catalog.iter().map(move |product| RequestPair {
                    from_hub: *from,
                    product_id: product.id,
                    product_name: product.name.clone(),
                })
            })
            .collect();
        debug!("scanning {} hub/product pairs for requests to {}", pairs.len(), hub);

        let batches = fan_out(pairs, self.config.request_fanout_limit, |pair| async move {
            let records = market
                .product_requests(pair.from_hub, hub, pair.product_id)
                .await?;
            Ok::<_, ChainError>(records
                .into_iter()
                .filter_map(|record| {
                    let Some(status) = RequestStatus::from_code(record.status_code) else {
                        debug!(
                            "skipping request {} from {} with unknown status {}",
                            record.request_index, pair.from_hub, record.status_code
                        );
                        return None;
                    };
                    Some(Request {
                        from_hub: pair.from_hub,
                        from_hub_name: String::new(),
                        product_id: pair.product_id,
                        product_name: pair.product_name.clone(),
                        quantity: record.quantity,
                        status,
                        request_index: record.request_index,
                    })
                })
                .collect::<Vec<_>>())
        })
        .await;

        let mut names: HashMap<Address, String> = known
            .iter()
            .filter(|h| !h.name.is_empty())
            .map(|h| (h.address, h.name.clone()))
            .collect();

        let mut items: Vec<Request> = batches.items.into_iter().flatten().collect();
        for request in &mut items {
            request.from_hub_name = match names.get(&request.from_hub) {
                Some(name) => name.clone(),
                None => {
                    let name = requester_name(market, request.from_hub).await;
                    names.insert(request.from_hub, name.clone());
                    name
                }
            };
        }

        Aggregate {
            items,
            dropped: batches.dropped,
        }
    }

    // ── marketplace ──

    pub async fn load_marketplace_view(
        &self,
        contracts: &ContractSession,
        session: Option<&Session>,
    ) -> ChainResult<MarketplaceView> {
        let market = contracts.marketplace();
        let addresses = market.all_hubs().await?;

        let snapshots = fan_out(
            addresses.clone(),
            self.config.request_fanout_limit,
            |hub| async move {
                let info = market.hub_info(hub).await?;
                let products = market.hub_products(hub).await?;
                Ok::<_, ChainError>((info, products))
            },
        )
        .await;

        let hubs = snapshots
            .items
            .iter()
            .map(|(info, products)| HubSummary {
                hub: info.clone(),
                rating: self.rating.rating(info),
                active_products: products.iter().filter(|p| p.is_available()).count(),
            })
            .collect();

        let sampled: Vec<Address> = addresses
            .iter()
            .copied()
            .take(self.config.featured_hub_limit)
            .collect();
        let products: Vec<MarketProduct> = snapshots
            .items
            .iter()
            .filter(|(info, _)| sampled.contains(&info.address))
            .flat_map(|(info, products)| {
                products
                    .iter()
                    .filter(|p| p.is_available())
                    .map(move |p| MarketProduct {
                        id: p.product_id,
                        name: p.name.clone(),
                        price: p.weighted_price,
                        price_display: to_display_ether(p.weighted_price),
                        hub_name: info.name.clone(),
                        hub_address: info.address,
                        quantity: p.total_quantity,
                    })
            })
            .collect();
        let featured = products
            .iter()
            .take(self.config.featured_product_limit)
            .cloned()
            .collect();

        let mut dropped = snapshots.dropped;
        let token = match (session, contracts.token()) {
            (Some(session), Some(token)) => match load_holdings(token, session.address).await {
                Ok(holdings) => Some(holdings),
                Err(err) => {
                    warn!("token holdings for {} unavailable: {}", session.address, err);
                    dropped.push(DroppedItem {
                        id: "token holdings".to_owned(),
                        reason: err.to_string(),
                    });
                    None
                }
            },
            _ => None,
        };

        Ok(MarketplaceView {
            read_only: contracts.is_read_only(),
            hubs,
            products,
            featured,
            token,
            dropped,
        })
    }

    async fn load_hubs(
        &self,
        market: &Arc<dyn MarketplaceContract>,
        exclude: Option<Address>,
    ) -> ChainResult<Aggregate<Hub>> {
        let addresses = hub_addresses(market, exclude).await?;
        Ok(self.hub_infos(market, addresses).await)
    }

    async fn hub_infos(
        &self,
        market: &Arc<dyn MarketplaceContract>,
        addresses: Vec<Address>,
    ) -> Aggregate<Hub> {
        fan_out(addresses, self.config.request_fanout_limit, |hub| async move {
            market.hub_info(hub).await
        })
        .await
    }
}

async fn hub_addresses(
    market: &Arc<dyn MarketplaceContract>,
    exclude: Option<Address>,
) -> ChainResult<Vec<Address>> {
    Ok(market
        .all_hubs()
        .await?
        .into_iter()
        .filter(|hub| Some(*hub) != exclude)
        .collect())
}

/// Display name of a requesting hub; its address when the record is missing or unnamed.
async fn requester_name(market: &Arc<dyn MarketplaceContract>, hub: Address) -> String {
    match market.hub_info(hub).await {
        Ok(info) if !info.name.is_empty() => info.name,
        Ok(_) => hub.to_string(),
        Err(err) => {
            debug!("no name for requesting hub {}: {}", hub, err);
            hub.to_string()
        }
    }
}

async fn load_holdings(token: &Arc<dyn PaymentToken>, owner: Address) -> ChainResult<TokenHoldings> {
    let symbol = token.symbol().await?;
    let decimals = token.decimals().await?;
    let balance = token.balance_of(owner).await?;
    Ok(TokenHoldings {
        formatted: to_display(balance, decimals),
        symbol,
        decimals,
        balance,
    })
}

#[derive(Clone)]
struct ContributionRef(Contribution);

impl fmt::Display for ContributionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contribution {} at {}", self.0.product_id, self.0.hub)
    }
}

#[derive(Clone)]
struct RequestPair {
    from_hub: Address,
    product_id: U256,
    product_name: String,
}

impl fmt::Display for RequestPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requests from {} for product {}", self.from_hub, self.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractSessionFactory;
    use ah_api_types::units::parse_amount;
    use ah_chain_client::memory::{ChainCall, InMemoryChain};

    const MARKET: u8 = 0xAA;
    const TOKEN: u8 = 0xBB;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn loader() -> DataLoader {
        DataLoader::new(LoaderConfig::default(), Arc::new(FixedRating(4.8)))
    }

    fn listing(id: u64, name: &str, quantity: u64, price: &str, active: bool) -> HubProduct {
        HubProduct {
            product_id: U256::from(id),
            name: name.to_owned(),
            total_quantity: U256::from(quantity),
            weighted_price: parse_amount(price).unwrap(),
            active,
        }
    }

    async fn open(chain: &InMemoryChain, session: Option<&Session>) -> ContractSession {
        ContractSessionFactory::new(Arc::new(chain.binder()))
            .open(session)
            .await
            .unwrap()
    }

    fn market_with_hubs(count: u8) -> InMemoryChain {
        let chain = InMemoryChain::new(addr(MARKET), addr(TOKEN));
        for n in 1..=count {
            chain.add_hub(addr(n), &format!("Hub {n}"), "Nairobi");
            chain.list_product(addr(n), listing(n as u64, "Maize", 10, "2.5", true));
        }
        chain
    }

    #[tokio::test]
    async fn failed_hub_detail_is_dropped_not_fatal() {
        let chain = market_with_hubs(3);
        chain.fail_read(
            "getHubInfo",
            Some(addr(2)),
            ChainError::call("getHubInfo", "execution reverted"),
        );
        let contracts = open(&chain, None).await;

        let view = loader()
            .load_marketplace_view(&contracts, None)
            .await
            .unwrap();

        let listed: Vec<Address> = view.hubs.iter().map(|h| h.hub.address).collect();
        assert_eq!(listed, vec![addr(1), addr(3)]);
        assert_eq!(view.dropped.len(), 1);
        assert_eq!(view.dropped[0].id, addr(2).to_string());
        assert!(view.read_only);
        assert!(view.hubs.iter().all(|h| h.rating == 4.8));
    }

    #[tokio::test]
    async fn product_sample_covers_first_hubs_and_available_stock() {
        let chain = market_with_hubs(4);
        chain.list_product(addr(1), listing(7, "Beans", 0, "1", true));
        chain.list_product(addr(2), listing(8, "Kale", 5, "1", false));
        chain.list_product(addr(3), listing(9, "Rice", 3, "4", true));
        let contracts = open(&chain, None).await;

        let view = loader()
            .load_marketplace_view(&contracts, None)
            .await
            .unwrap();

        let sampled: Vec<(Address, U256)> = view
            .products
            .iter()
            .map(|p| (p.hub_address, p.id))
            .collect();
        assert_eq!(
            sampled,
            vec![
                (addr(1), U256::from(1u64)),
                (addr(2), U256::from(2u64)),
                (addr(3), U256::from(3u64)),
                (addr(3), U256::from(9u64)),
            ]
        );
        assert_eq!(view.featured.len(), 4);
        assert_eq!(view.products[0].price_display, "2.5");
        assert_eq!(view.products[0].hub_name, "Hub 1");
        // hub 1 has one sold-out listing, hub 2 one inactive listing
        assert_eq!(view.hubs[0].active_products, 1);
        assert_eq!(view.hubs[1].active_products, 1);
        assert_eq!(view.hubs.len(), 4);
    }

    #[tokio::test]
    async fn featured_is_capped() {
        let chain = market_with_hubs(1);
        for id in 10..16u64 {
            chain.list_product(addr(1), listing(id, "Tea", 1, "1", true));
        }
        let contracts = open(&chain, None).await;
        let view = loader()
            .load_marketplace_view(&contracts, None)
            .await
            .unwrap();
        assert_eq!(view.products.len(), 7);
        assert_eq!(view.featured.len(), 4);
        assert_eq!(view.featured, view.products[..4].to_vec());
    }

    #[tokio::test]
    async fn token_holdings_need_session_and_token() {
        let chain = market_with_hubs(1);
        let buyer = addr(0x42);
        chain.set_balance(buyer, parse_amount("12.5").unwrap());
        chain.set_token_metadata("AGRI", 18);

        let anonymous = open(&chain, None).await;
        let view = loader()
            .load_marketplace_view(&anonymous, None)
            .await
            .unwrap();
        assert!(view.token.is_none());
        assert_eq!(chain.reads_of("balanceOf"), 0);

        let session = Session { address: buyer };
        let connected = open(&chain, Some(&session)).await;
        let view = loader()
            .load_marketplace_view(&connected, Some(&session))
            .await
            .unwrap();
        let holdings = view.token.unwrap();
        assert_eq!(holdings.symbol, "AGRI");
        assert_eq!(holdings.formatted, "12.5");
        assert!(!view.read_only);
    }

    #[tokio::test]
    async fn farmer_view_joins_contributions_at_selected_hub() {
        let chain = market_with_hubs(2);
        let farmer = addr(0x31);
        let maize = chain.add_catalog_product("Maize");
        chain.register_farmer(farmer, parse_amount("3").unwrap());
        chain.add_contribution(
            farmer,
            Contribution {
                hub: addr(1),
                product_id: maize,
                quantity: U256::from(4u64),
                price: parse_amount("2").unwrap(),
            },
        );
        chain.add_contribution(
            farmer,
            Contribution {
                hub: addr(2),
                product_id: maize,
                quantity: U256::from(9u64),
                price: parse_amount("2").unwrap(),
            },
        );
        let contracts = open(&chain, None).await;

        let view = loader()
            .load_farmer_view(&contracts, farmer, Some(addr(1)))
            .await
            .unwrap();

        assert!(view.registered);
        assert_eq!(view.earnings_display.as_deref(), Some("3"));
        assert_eq!(view.hubs.len(), 2);
        let selected = view.hub_products.unwrap();
        assert_eq!(selected.hub, addr(1));
        assert_eq!(selected.products.len(), 1);
        let row = &selected.products[0];
        assert_eq!(row.name, "Maize");
        assert_eq!(row.total_quantity, U256::from(4u64));
        assert_eq!(row.weighted_price, parse_amount("2.5").unwrap());
        assert!(row.active);
    }

    #[tokio::test]
    async fn unregistered_farmer_skips_earnings() {
        let chain = market_with_hubs(1);
        let contracts = open(&chain, None).await;

        let view = loader()
            .load_farmer_view(&contracts, addr(0x31), None)
            .await
            .unwrap();

        assert!(!view.registered);
        assert_eq!(view.earnings, None);
        assert!(view.hub_products.is_none());
        assert_eq!(chain.reads_of("getFarmerEarnings"), 0);
        assert_eq!(chain.reads_of("getFarmerTransactionsStructured"), 0);
    }

    #[tokio::test]
    async fn unregistered_hub_skips_dependent_reads() {
        let chain = market_with_hubs(2);
        let contracts = open(&chain, None).await;

        let view = loader()
            .load_hub_view(&contracts, addr(0x50))
            .await
            .unwrap();

        assert!(view.registration.is_none());
        assert_eq!(chain.reads_of("getHubProducts"), 0);
        assert_eq!(chain.reads_of("getHubStatistics"), 0);
        assert_eq!(chain.reads_of("getAllProductRequests"), 0);
    }

    #[tokio::test]
    async fn hub_view_scans_requests_after_catalog() {
        let chain = market_with_hubs(3);
        let me = addr(1);
        let maize = chain.add_catalog_product("Maize");
        let beans = chain.add_catalog_product("Beans");
        chain.add_request(addr(2), me, maize, U256::from(5u64), 0);
        chain.add_request(addr(2), me, maize, U256::from(6u64), 1);
        chain.add_request(addr(3), me, beans, U256::from(7u64), 2);
        chain.add_request(addr(3), me, beans, U256::from(8u64), 9);
        // addressed to someone else
        chain.add_request(addr(3), addr(2), maize, U256::from(1u64), 0);
        let contracts = open(&chain, None).await;

        let view = loader().load_hub_view(&contracts, me).await.unwrap();

        assert_eq!(view.registration.unwrap().name, "Hub 1");
        let others: Vec<Address> = view.other_hubs.iter().map(|h| h.address).collect();
        assert_eq!(others, vec![addr(2), addr(3)]);
        assert_eq!(view.catalog.len(), 2);

        let summary: Vec<(Address, &str, RequestStatus, U256)> = view
            .requests
            .iter()
            .map(|r| (r.from_hub, r.from_hub_name.as_str(), r.status, r.quantity))
            .collect();
        assert_eq!(
            summary,
            vec![
                (addr(2), "Hub 2", RequestStatus::Pending, U256::from(5u64)),
                (addr(2), "Hub 2", RequestStatus::Accepted, U256::from(6u64)),
                (addr(3), "Hub 3", RequestStatus::Denied, U256::from(7u64)),
            ]
        );
        assert_eq!(view.requests[0].product_name, "Maize");
        // 2 other hubs x 2 catalog products
        assert_eq!(chain.reads_of("getAllProductRequests"), 4);

        let calls = chain.calls();
        let catalog_at = calls
            .iter()
            .position(|c| c.method() == "getAllProducts")
            .unwrap();
        let first_scan = calls
            .iter()
            .position(|c| matches!(c, ChainCall::Read { method: "getAllProductRequests", .. }))
            .unwrap();
        assert!(catalog_at < first_scan);
    }

    #[tokio::test]
    async fn failed_request_pair_is_dropped() {
        let chain = market_with_hubs(3);
        let me = addr(1);
        let maize = chain.add_catalog_product("Maize");
        chain.add_request(addr(3), me, maize, U256::from(2u64), 0);
        chain.fail_read(
            "getAllProductRequests",
            Some(addr(2)),
            ChainError::call("getAllProductRequests", "timeout"),
        );
        let contracts = open(&chain, None).await;

        let view = loader().load_hub_view(&contracts, me).await.unwrap();
        assert_eq!(view.requests.len(), 1);
        assert_eq!(view.requests[0].from_hub, addr(3));
        assert_eq!(view.dropped.len(), 1);
        assert!(view.dropped[0].reason.contains("timeout"));
    }

    #[tokio::test]
    async fn requests_from_unnamed_or_unreadable_hubs_are_kept() {
        let chain = market_with_hubs(3);
        chain.add_hub(addr(4), "", "Mombasa");
        let me = addr(1);
        let maize = chain.add_catalog_product("Maize");
        chain.add_request(addr(2), me, maize, U256::from(5u64), 0);
        chain.add_request(addr(3), me, maize, U256::from(6u64), 0);
        chain.add_request(addr(4), me, maize, U256::from(7u64), 0);
        chain.fail_read(
            "getHubInfo",
            Some(addr(2)),
            ChainError::call("getHubInfo", "execution reverted"),
        );
        let contracts = open(&chain, None).await;

        let view = loader().load_hub_view(&contracts, me).await.unwrap();

        // 3 other hubs x 1 catalog product
        assert_eq!(chain.reads_of("getAllProductRequests"), 3);
        let summary: Vec<(Address, String, U256)> = view
            .requests
            .iter()
            .map(|r| (r.from_hub, r.from_hub_name.clone(), r.quantity))
            .collect();
        assert_eq!(
            summary,
            vec![
                (addr(2), addr(2).to_string(), U256::from(5u64)),
                (addr(3), "Hub 3".to_owned(), U256::from(6u64)),
                (addr(4), addr(4).to_string(), U256::from(7u64)),
            ]
        );
        assert_eq!(view.dropped.len(), 1);
        assert!(view.dropped[0].reason.contains("execution reverted"));
    }

    #[test]
    fn placeholder_rating_stays_in_range() {
        let hub = Hub {
            address: addr(1),
            name: "Hub".to_owned(),
            location: "Eldoret".to_owned(),
        };
        for _ in 0..100 {
            let rating = PlaceholderRating.rating(&hub);
            assert!((4.5..=5.0).contains(&rating));
        }
    }
}
