use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::auth::{RequireAdmin, RequireAuth};
use crate::engine::apply_changes;
use crate::error::Error;
use crate::schema::{self, Entity, Mode};
use crate::server::AppState;
use crate::server::dto::{ApiJson, ApiQuery, ListParams};
use crate::server::guards::{can_edit, verbose_for};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::{Document, UserMeta};

pub async fn get_details(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let meta = state
        .store
        .get_user_meta(&user)
        .api_err("Failed to get user details")?
        .or_not_found(format!(
            "Could not find details for target '{user}' : User does not exist"
        ))?;

    let verbose = verbose_for(Some(&auth.0), &user, params.verbose());
    Ok::<_, ApiError>(Json(ApiResponse::success(
        format!("Found details for user '{user}'"),
        meta.to_view(verbose)?,
    )))
}

/// Creates details with the configured allowance. Existing details are kept.
pub async fn create_details(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> impl IntoResponse {
    let meta = UserMeta::new(&user, state.config.quota.default_max_projects);
    state
        .store
        .create_user_meta(&meta)
        .api_err("Failed to create user details")?;

    let meta = state
        .store
        .get_user_meta(&user)
        .api_err("Failed to get user details")?
        .or_not_found("User details not found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(
        format!("Created user details for target {user}"),
        meta.to_view(true)?,
    )))
}

/// Plan, quota and customer id only change when an elevated caller sends them.
pub async fn update_details(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;

    let mut changes = state
        .validator
        .validate(Entity::UserMeta, &payload, Mode::Update)
        .map_err(Error::from)?;
    if !auth.0.is_elevated() {
        for field in schema::for_entity(Entity::UserMeta).restricted_fields() {
            changes.remove(field);
        }
    }

    let meta = state
        .store
        .get_user_meta(&user)
        .api_err("Failed to get user details")?
        .or_not_found("User details not found")?;

    let updated = apply_changes(&meta, changes)?;
    state
        .store
        .update_user_meta(&updated)
        .api_err("Failed to update user details")?;

    Ok::<_, ApiError>(Json(ApiResponse::message("Details updated")))
}
