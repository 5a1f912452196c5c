use ah_api_types::{Address, FarmerView, HubView, MarketplaceView};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::{AppState, ApiResult, app_error, bad_request, chain_error};

#[derive(Debug, Deserialize)]
pub(crate) struct FarmerViewQuery {
    hub: Option<String>,
}

pub(crate) async fn marketplace_view(
    State(state): State<Arc<AppState>>,
) -> ApiResult<MarketplaceView> {
    let app = state.app.read().await;
    let view = app.marketplace_view().await.map_err(chain_error)?;
    Ok(Json(view))
}

pub(crate) async fn farmer_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FarmerViewQuery>,
) -> ApiResult<FarmerView> {
    let selected_hub = match query.hub.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            Some(Address::from_str(raw).map_err(|_| bad_request("hub must be a valid address"))?)
        }
    };

    let app = state.app.read().await;
    let view = app.farmer_view(selected_hub).await.map_err(app_error)?;
    Ok(Json(view))
}

pub(crate) async fn hub_view(State(state): State<Arc<AppState>>) -> ApiResult<HubView> {
    let app = state.app.read().await;
    let view = app.hub_view().await.map_err(app_error)?;
    Ok(Json(view))
}
