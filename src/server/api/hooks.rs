use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAdmin;
use crate::engine::EngineEvent;
use crate::server::AppState;
use crate::server::dto::ApiJson;
use crate::server::response::{ApiError, ApiResponse};

/// Receives lifecycle events from the identity and file services.
pub async fn receive_event(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    ApiJson(event): ApiJson<EngineEvent>,
) -> impl IntoResponse {
    tracing::debug!(?event, "Received lifecycle event");
    state.events.dispatch(&event)?;

    Ok::<_, ApiError>(Json(ApiResponse::message("Event processed")))
}
