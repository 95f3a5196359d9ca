use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::Value;

use crate::auth::{MaybeCaller, RequireAdmin};
use crate::engine::{apply_changes, touched};
use crate::error::Error;
use crate::schema::{Entity, Mode};
use crate::server::AppState;
use crate::server::dto::{ApiJson, ApiQuery, ListParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::store::{Page, PluginQuery};
use crate::types::{Document, Plugin, is_valid_id};

const NOT_FOUND: &str = "Could not find a plugin with that ID";

/// Plugin views always include every field; `minimal` drops the bulky ones.
fn plugin_view(plugin: &Plugin, minimal: bool) -> Result<Value, ApiError> {
    let mut view = plugin.to_view(true)?;
    if minimal {
        if let Value::Object(map) = &mut view {
            map.remove("description");
            map.remove("deployables");
        }
    }
    Ok(view)
}

pub async fn list_plugins(
    MaybeCaller(caller): MaybeCaller,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let query = PluginQuery {
        public_only: !caller.as_ref().is_some_and(|c| c.is_elevated()),
        id: None,
        search: params.search(),
    };
    let listing = state
        .store
        .list_plugins(&query, params.page())
        .api_err("Failed to list plugins")?;

    let minimal = params.minimal.unwrap_or(false);
    let data = listing
        .items
        .iter()
        .map(|p| plugin_view(p, minimal))
        .collect::<Result<Vec<_>, _>>()?;

    Ok::<_, ApiError>(Json(ApiResponse::list(
        format!("Found {} plugins", listing.total),
        data,
        listing.total,
    )))
}

pub async fn get_plugin(
    MaybeCaller(caller): MaybeCaller,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    if !is_valid_id(&id) {
        return Err(ApiError::failure("Please use a valid plugin ID"));
    }

    let query = PluginQuery {
        public_only: !caller.as_ref().is_some_and(|c| c.is_elevated()),
        id: Some(id),
        search: None,
    };
    let plugin = state
        .store
        .list_plugins(&query, Page::default())
        .api_err("Failed to get plugin")?
        .items
        .into_iter()
        .next()
        .or_not_found("No plugin found")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(
        "Found plugin",
        plugin_view(&plugin, params.minimal.unwrap_or(false))?,
    )))
}

pub async fn create_plugin(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    let changes = state
        .validator
        .validate(Entity::Plugin, &payload, Mode::Create)
        .map_err(Error::from)?;
    let plugin = apply_changes(&Plugin::new("", Utc::now()), changes)?;

    state
        .store
        .create_plugin(&plugin)
        .api_err("Failed to create plugin")?;
    tracing::info!(plugin = %plugin.id, "Created plugin");

    Ok::<_, ApiError>(Json(ApiResponse::success(
        format!("Created new plugin '{}'", plugin.name),
        plugin.to_view(true)?,
    )))
}

pub async fn update_plugin(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    if !is_valid_id(&id) {
        return Err(ApiError::failure(NOT_FOUND));
    }

    let changes = state
        .validator
        .validate(Entity::Plugin, &payload, Mode::Update)
        .map_err(Error::from)?;

    let plugin = state
        .store
        .get_plugin(&id)
        .api_err("Failed to get plugin")?
        .or_not_found(NOT_FOUND)?;

    let mut updated = apply_changes(&plugin, changes)?;
    updated.last_modified = touched(updated.created_on);
    state
        .store
        .update_plugin(&updated)
        .api_err("Failed to update plugin")?;

    Ok::<_, ApiError>(Json(ApiResponse::message("Plugin Updated")))
}

pub async fn delete_plugin(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !is_valid_id(&id) {
        return Err(ApiError::failure(NOT_FOUND));
    }

    let removed = state
        .store
        .delete_plugin(&id)
        .api_err("Failed to delete plugin")?;
    if !removed {
        return Err(ApiError::failure(NOT_FOUND));
    }

    Ok::<_, ApiError>(Json(ApiResponse::message(
        "Plugin has been successfully removed",
    )))
}
