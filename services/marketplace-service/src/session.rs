use ah_api_types::SessionStatusResponse;
use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::info;

use crate::{AppState, ApiResult, chain_error};

pub(crate) async fn session_status(State(state): State<Arc<AppState>>) -> Json<SessionStatusResponse> {
    Json(state.app.read().await.status())
}

/// Resume a session the wallet already authorised, without prompting.
pub(crate) async fn session_check(
    State(state): State<Arc<AppState>>,
) -> ApiResult<SessionStatusResponse> {
    let mut app = state.app.write().await;
    app.check_existing().await.map_err(chain_error)?;
    Ok(Json(app.status()))
}

pub(crate) async fn session_connect(
    State(state): State<Arc<AppState>>,
) -> ApiResult<SessionStatusResponse> {
    let mut app = state.app.write().await;
    let session = app.connect().await.map_err(chain_error)?;
    info!("wallet connected: {}", session.address);
    Ok(Json(app.status()))
}

pub(crate) async fn session_disconnect(
    State(state): State<Arc<AppState>>,
) -> ApiResult<SessionStatusResponse> {
    let mut app = state.app.write().await;
    app.disconnect().await.map_err(chain_error)?;
    info!("wallet disconnected");
    Ok(Json(app.status()))
}
