pub mod units;

pub use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub address: Address,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Farmer,
    Hub,
    Shopper,
}

// ── Contract projections ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hub {
    pub address: Address,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: U256,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubProduct {
    pub product_id: U256,
    pub name: String,
    pub total_quantity: U256,
    /// Quantity-weighted average unit price, computed on-chain.
    pub weighted_price: U256,
    pub active: bool,
}

impl HubProduct {
    /// Listed for sale: active with stock left.
    pub fn is_available(&self) -> bool {
        self.active && !self.total_quantity.is_zero()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubProductDetails {
    pub name: String,
    pub total_quantity: U256,
    pub weighted_price: U256,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contribution {
    pub hub: Address,
    pub product_id: U256,
    pub quantity: U256,
    pub price: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetail {
    /// Farmer's share of a sale.
    Farmer {
        share_percentage: U256,
        share_amount: U256,
    },
    /// Sale as recorded by the selling hub.
    Hub { price: U256, farmer: Address },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub timestamp: u64,
    pub product_id: U256,
    pub product_name: String,
    pub quantity: U256,
    pub buyer: Address,
    pub total_amount: U256,
    #[serde(flatten)]
    pub detail: TransactionDetail,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Denied,
}

impl RequestStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Accepted),
            2 => Some(Self::Denied),
            _ => None,
        }
    }
}

/// One entry of `getAllProductRequests(from, to, product)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestRecord {
    pub request_index: U256,
    pub quantity: U256,
    pub status_code: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub from_hub: Address,
    pub from_hub_name: String,
    pub product_id: U256,
    pub product_name: String,
    pub quantity: U256,
    pub status: RequestStatus,
    pub request_index: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HubStatistics {
    pub active_listings: U256,
    pub total_transactions: U256,
    pub transaction_volume: U256,
    pub pending_requests: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHoldings {
    pub symbol: String,
    pub decimals: u8,
    pub balance: U256,
    pub formatted: String,
}

// ── View snapshots ───────────────────────────────────────────────────

/// An item left out of an aggregated read, with the reason it failed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DroppedItem {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FarmerHubProducts {
    pub hub: Address,
    pub products: Vec<HubProduct>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FarmerView {
    pub account: Address,
    pub registered: bool,
    pub earnings: Option<U256>,
    pub earnings_display: Option<String>,
    pub transactions: Vec<Transaction>,
    pub hubs: Vec<Hub>,
    pub hub_products: Option<FarmerHubProducts>,
    pub dropped: Vec<DroppedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HubView {
    pub account: Address,
    /// `None` when the account has no hub record.
    pub registration: Option<Hub>,
    pub products: Vec<HubProduct>,
    pub transactions: Vec<Transaction>,
    pub statistics: Option<HubStatistics>,
    pub other_hubs: Vec<Hub>,
    pub catalog: Vec<CatalogProduct>,
    pub requests: Vec<Request>,
    pub dropped: Vec<DroppedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubSummary {
    #[serde(flatten)]
    pub hub: Hub,
    /// Display-only placeholder, not sourced from the contract.
    pub rating: f32,
    pub active_products: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketProduct {
    pub id: U256,
    pub name: String,
    pub price: U256,
    pub price_display: String,
    pub hub_name: String,
    pub hub_address: Address,
    pub quantity: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarketplaceView {
    pub read_only: bool,
    pub hubs: Vec<HubSummary>,
    pub products: Vec<MarketProduct>,
    pub featured: Vec<MarketProduct>,
    pub token: Option<TokenHoldings>,
    pub dropped: Vec<DroppedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ViewSnapshot {
    Farmer(FarmerView),
    Hub(HubView),
    Marketplace(MarketplaceView),
}

// ── Actions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    RegisterFarmer,
    ContributeProduct {
        hub: Address,
        product_id: u64,
        quantity: u64,
        /// Decimal unit price in tokens, e.g. "2.5".
        price: String,
    },
    WithdrawEarnings,
    RegisterHub {
        name: String,
        location: String,
    },
    CreateProduct {
        name: String,
    },
    AddProductToHub {
        product_id: u64,
    },
    ToggleProductStatus {
        product_id: u64,
    },
    SendRequest {
        to_hub: Address,
        product_id: u64,
        quantity: u64,
    },
    AcceptRequest {
        from_hub: Address,
        product_id: u64,
        request_index: u64,
    },
    DenyRequest {
        from_hub: Address,
        product_id: u64,
        request_index: u64,
    },
    Purchase {
        hub: Address,
        product_id: u64,
        quantity: u64,
        /// Decimal unit price in tokens as displayed to the buyer.
        unit_price: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterFarmer => "register_farmer",
            Self::ContributeProduct { .. } => "contribute_product",
            Self::WithdrawEarnings => "withdraw_earnings",
            Self::RegisterHub { .. } => "register_hub",
            Self::CreateProduct { .. } => "create_product",
            Self::AddProductToHub { .. } => "add_product_to_hub",
            Self::ToggleProductStatus { .. } => "toggle_product_status",
            Self::SendRequest { .. } => "send_request",
            Self::AcceptRequest { .. } => "accept_request",
            Self::DenyRequest { .. } => "deny_request",
            Self::Purchase { .. } => "purchase",
        }
    }

    /// Which dashboard the action belongs to, and so which view is reloaded.
    pub fn role(&self) -> Role {
        match self {
            Self::RegisterFarmer | Self::ContributeProduct { .. } | Self::WithdrawEarnings => {
                Role::Farmer
            }
            Self::Purchase { .. } => Role::Shopper,
            _ => Role::Hub,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation,
    Reloading,
}

/// The only signal handed to the view layer: success flag plus an optional alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionReport {
    pub action_id: Uuid,
    pub action: String,
    pub success: bool,
    pub message: Option<String>,
    pub tx_hashes: Vec<String>,
}

// ── HTTP DTOs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionStatusResponse {
    pub connected: bool,
    pub address: Option<Address>,
    pub read_only: bool,
    pub token_resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse {
    pub report: ActionReport,
    pub view: Option<ViewSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionPhaseResponse {
    pub phase: ActionPhase,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_status_codes_map_to_variants() {
        assert_eq!(RequestStatus::from_code(0), Some(RequestStatus::Pending));
        assert_eq!(RequestStatus::from_code(1), Some(RequestStatus::Accepted));
        assert_eq!(RequestStatus::from_code(2), Some(RequestStatus::Denied));
        assert_eq!(RequestStatus::from_code(7), None);
    }

    #[test]
    fn hub_product_availability_needs_stock_and_active_flag() {
        let mut product = HubProduct {
            product_id: U256::from(1u64),
            name: "Tomatoes".to_owned(),
            total_quantity: U256::from(5u64),
            weighted_price: U256::from(10u64),
            active: true,
        };
        assert!(product.is_available());

        product.total_quantity = U256::ZERO;
        assert!(!product.is_available());

        product.total_quantity = U256::from(5u64);
        product.active = false;
        assert!(!product.is_available());
    }

    #[test]
    fn actions_are_tagged_by_name() {
        let raw = r#"{"action":"create_product","name":"Maize"}"#;
        let action: Action = serde_json::from_str(raw).unwrap();
        assert_eq!(
            action,
            Action::CreateProduct {
                name: "Maize".to_owned()
            }
        );
        assert_eq!(action.name(), "create_product");
        assert_eq!(action.role(), Role::Hub);

        let withdraw: Action = serde_json::from_str(r#"{"action":"withdraw_earnings"}"#).unwrap();
        assert_eq!(withdraw.role(), Role::Farmer);
    }
}
