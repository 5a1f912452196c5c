mod actions;
mod config;
mod session;
mod views;

use ah_chain_client::{ChainError, ContractBinder};
use ah_chain_evm::EvmBinder;
use ah_marketplace_core::{
    ActionDispatcher, AppError, ContractSessionFactory, DataLoader, MarketplaceApp,
    PlaceholderRating, WalletSessionManager,
};
use axum::{
    Json, Router,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::config::ServiceConfig;

const SERVICE_NAME: &str = "marketplace-service";

#[derive(Debug, Serialize)]
struct HealthResponse {
    service: &'static str,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

pub(crate) type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Session and contract handles are swapped on connect/disconnect, so the
/// app sits behind a lock; reads and actions share it.
pub(crate) struct AppState {
    pub(crate) app: RwLock<MarketplaceApp>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::load()?;
    let binder = EvmBinder::from_config(&config.chain)?;
    let wallet = WalletSessionManager::new(binder.wallet(&config.chain));
    if !wallet.has_provider() {
        warn!("no wallet provider configured; serving read-only views");
    }

    let binder: Arc<dyn ContractBinder> = Arc::new(binder);
    let mut app = MarketplaceApp::start(
        wallet,
        ContractSessionFactory::new(binder),
        DataLoader::new(config.loader_config(), Arc::new(PlaceholderRating)),
        ActionDispatcher::new(config.dispatch_config()),
    )
    .await?;

    if let Some(session) = app.check_existing().await? {
        info!("resumed wallet session for {}", session.address);
    }

    let state = Arc::new(AppState {
        app: RwLock::new(app),
    });

    let addr = config.listen_addr()?;
    info!(
        "{} listening on {} (contract {})",
        SERVICE_NAME, addr, config.chain.contract_address
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/session", get(session::session_status))
        .route("/session/check", post(session::session_check))
        .route("/session/connect", post(session::session_connect))
        .route("/session/disconnect", post(session::session_disconnect))
        .route("/views/marketplace", get(views::marketplace_view))
        .route("/views/farmer", get(views::farmer_view))
        .route("/views/hub", get(views::hub_view))
        .route("/actions", post(actions::perform_action))
        .route("/actions/phase", get(actions::action_phase))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: SERVICE_NAME,
        status: "ok",
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub(crate) fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn conflict(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: message.to_owned(),
        }),
    )
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

pub(crate) fn chain_error(err: ChainError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        ChainError::WalletUnavailable => bad_request(&err.to_string()),
        ChainError::UserRejected => conflict(&err.to_string()),
        other => {
            warn!("chain error: {}", other);
            internal_error(other)
        }
    }
}

pub(crate) fn app_error(err: AppError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        AppError::NotConnected => conflict("no wallet connected"),
        AppError::Chain(err) => chain_error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ah_api_types::units::parse_amount;
    use ah_api_types::{
        ActionPhaseResponse, ActionResponse, Address, HubProduct, MarketplaceView,
        SessionStatusResponse, U256, ViewSnapshot,
    };
    use ah_chain_client::memory::{InMemoryChain, InMemoryWallet};
    use ah_chain_client::{INSTALL_WALLET_MESSAGE, WalletProvider};
    use ah_marketplace_core::{DispatchConfig, FixedRating, LoaderConfig};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn seeded_chain() -> InMemoryChain {
        let chain = InMemoryChain::new(addr(0xAA), addr(0xBB));
        chain.add_hub(addr(1), "Green Valley", "Nakuru");
        chain.list_product(
            addr(1),
            HubProduct {
                product_id: U256::from(1u64),
                name: "Tomatoes".to_owned(),
                total_quantity: U256::from(10u64),
                weighted_price: parse_amount("2.5").unwrap(),
                active: true,
            },
        );
        chain
    }

    async fn test_router(chain: &InMemoryChain, wallet: Option<InMemoryWallet>) -> Router {
        let wallet =
            WalletSessionManager::new(wallet.map(|w| Arc::new(w) as Arc<dyn WalletProvider>));
        let app = MarketplaceApp::start(
            wallet,
            ContractSessionFactory::new(Arc::new(chain.binder())),
            DataLoader::new(LoaderConfig::default(), Arc::new(FixedRating(4.8))),
            ActionDispatcher::new(DispatchConfig::default()),
        )
        .await
        .unwrap();

        router(Arc::new(AppState {
            app: RwLock::new(app),
        }))
    }

    async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_owned())
            }
            None => Body::empty(),
        };

        let response = router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn json<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    #[tokio::test]
    async fn health_and_version_name_the_service() {
        let router = test_router(&seeded_chain(), None).await;

        let (status, body) = send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = json(&body);
        assert_eq!(body["service"], "marketplace-service");
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&router, Method::GET, "/version", None).await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = json(&body);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn marketplace_is_browsable_without_a_wallet() {
        let router = test_router(&seeded_chain(), None).await;

        let (status, body) = send(&router, Method::GET, "/session", None).await;
        assert_eq!(status, StatusCode::OK);
        let session: SessionStatusResponse = json(&body);
        assert!(!session.connected);
        assert!(session.read_only);

        let (status, body) = send(&router, Method::GET, "/views/marketplace", None).await;
        assert_eq!(status, StatusCode::OK);
        let view: MarketplaceView = json(&body);
        assert!(view.read_only);
        assert_eq!(view.hubs.len(), 1);
        assert_eq!(view.products[0].price_display, "2.5");
    }

    #[tokio::test]
    async fn connect_without_wallet_returns_install_message() {
        let router = test_router(&seeded_chain(), None).await;

        let (status, body) = send(&router, Method::POST, "/session/connect", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: serde_json::Value = json(&body);
        assert_eq!(body["error"], INSTALL_WALLET_MESSAGE);
    }

    #[tokio::test]
    async fn rejected_prompt_is_a_conflict() {
        let wallet = InMemoryWallet::new(vec![addr(0x42)]);
        wallet.reject_prompts();
        let router = test_router(&seeded_chain(), Some(wallet)).await;

        let (status, _) = send(&router, Method::POST, "/session/connect", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn role_views_require_a_session() {
        let router = test_router(&seeded_chain(), None).await;

        let (status, body) = send(&router, Method::GET, "/views/hub", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let body: serde_json::Value = json(&body);
        assert_eq!(body["error"], "no wallet connected");

        let (status, _) = send(&router, Method::GET, "/views/farmer", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn farmer_view_rejects_malformed_hub() {
        let farmer = addr(0x31);
        let router = test_router(&seeded_chain(), Some(InMemoryWallet::new(vec![farmer]))).await;
        send(&router, Method::POST, "/session/connect", None).await;

        let (status, _) = send(&router, Method::GET, "/views/farmer?hub=not-a-hub", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/views/farmer?hub={}", addr(1));
        let (status, _) = send(&router, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn purchase_through_http_reloads_marketplace() {
        let chain = seeded_chain();
        let buyer = addr(0x42);
        chain.set_balance(buyer, parse_amount("10").unwrap());
        let router = test_router(&chain, Some(InMemoryWallet::new(vec![buyer]))).await;

        let (status, body) = send(&router, Method::POST, "/session/connect", None).await;
        assert_eq!(status, StatusCode::OK);
        let session: SessionStatusResponse = json(&body);
        assert_eq!(session.address, Some(buyer));
        assert!(!session.read_only);

        let purchase = format!(
            r#"{{"action":"purchase","hub":"{}","product_id":1,"quantity":4,"unit_price":"2.5"}}"#,
            addr(1)
        );
        let (status, body) = send(&router, Method::POST, "/actions", Some(&purchase)).await;
        assert_eq!(status, StatusCode::OK);
        let response: ActionResponse = json(&body);
        assert!(response.report.success);
        assert_eq!(response.report.tx_hashes.len(), 2);
        match response.view {
            Some(ViewSnapshot::Marketplace(view)) => {
                assert_eq!(view.products[0].quantity, U256::from(6u64));
            }
            other => panic!("expected marketplace view, got {other:?}"),
        }
        assert_eq!(chain.balance(buyer), U256::ZERO);

        let (_, body) = send(&router, Method::GET, "/actions/phase", None).await;
        let phase: ActionPhaseResponse = json(&body);
        assert_eq!(phase.phase, ah_api_types::ActionPhase::Idle);
    }

    #[tokio::test]
    async fn failed_action_is_reported_not_raised() {
        let chain = seeded_chain();
        let buyer = addr(0x42);
        chain.set_balance(buyer, parse_amount("1").unwrap());
        let router = test_router(&chain, Some(InMemoryWallet::new(vec![buyer]))).await;
        send(&router, Method::POST, "/session/connect", None).await;

        let purchase = format!(
            r#"{{"action":"purchase","hub":"{}","product_id":1,"quantity":4,"unit_price":"2.5"}}"#,
            addr(1)
        );
        let (status, body) = send(&router, Method::POST, "/actions", Some(&purchase)).await;
        assert_eq!(status, StatusCode::OK);
        let response: ActionResponse = json(&body);
        assert!(!response.report.success);
        assert!(response.report.message.is_some());
        assert!(response.view.is_none());
        assert!(chain.write_log().is_empty());
    }

    #[tokio::test]
    async fn disconnect_returns_to_read_only() {
        let buyer = addr(0x42);
        let router =
            test_router(&seeded_chain(), Some(InMemoryWallet::authorized(vec![buyer]))).await;

        let (_, body) = send(&router, Method::POST, "/session/check", None).await;
        let session: SessionStatusResponse = json(&body);
        assert!(session.connected);

        let (status, body) = send(&router, Method::POST, "/session/disconnect", None).await;
        assert_eq!(status, StatusCode::OK);
        let session: SessionStatusResponse = json(&body);
        assert!(!session.connected);
        assert!(session.read_only);
    }
}
