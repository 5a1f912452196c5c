use ah_api_types::{Action, ActionPhaseResponse, ActionResponse};
use axum::{Json, extract::State};
use std::sync::Arc;
use tracing::info;

use crate::AppState;

/// Failures come back inside the report; the request itself still succeeds.
pub(crate) async fn perform_action(
    State(state): State<Arc<AppState>>,
    Json(action): Json<Action>,
) -> Json<ActionResponse> {
    let app = state.app.read().await;
    let response = app.perform(&action).await;
    info!(
        "action {} ({}) finished: success={}",
        response.report.action, response.report.action_id, response.report.success
    );
    Json(response)
}

pub(crate) async fn action_phase(State(state): State<Arc<AppState>>) -> Json<ActionPhaseResponse> {
    Json(ActionPhaseResponse {
        phase: state.app.read().await.phase(),
    })
}
