use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::auth::{RequireAdmin, RequireAuth};
use crate::server::AppState;
use crate::server::dto::{ApiJson, ApiQuery, ListParams};
use crate::server::guards::{can_edit, verbose_for, views};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{Caller, Document, ResourceKind};

fn list(
    state: &AppState,
    kind: ResourceKind,
    caller: &Caller,
    user: &str,
    project: &str,
    id: Option<&str>,
    params: &ListParams,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    can_edit(caller, user)?;

    let listing = state.resources.list(
        caller,
        user,
        project,
        kind,
        id,
        params.search(),
        params.page(),
    )?;
    let data = views(&listing.items, verbose_for(Some(caller), user, params.verbose()))?;

    Ok(ApiResponse::list(
        format!("Found {} {}", listing.total, kind.collection()),
        data,
        listing.total,
    ))
}

pub async fn list_all_resources(
    _admin: RequireAdmin,
    Extension(kind): Extension<ResourceKind>,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let listing = state
        .resources
        .list_all(kind, params.search(), params.page())?;
    let data = views(&listing.items, params.verbose())?;

    Ok::<_, ApiError>(Json(ApiResponse::list(
        format!("Found {} {}", listing.total, kind.collection()),
        data,
        listing.total,
    )))
}

pub async fn list_resources(
    auth: RequireAuth,
    Extension(kind): Extension<ResourceKind>,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let response = list(&state, kind, &auth.0, &user, &project, None, &params)?;
    Ok::<_, ApiError>(Json(response))
}

pub async fn get_resource(
    auth: RequireAuth,
    Extension(kind): Extension<ResourceKind>,
    State(state): State<Arc<AppState>>,
    Path((user, project, id)): Path<(String, String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let response = list(&state, kind, &auth.0, &user, &project, Some(&id), &params)?;
    Ok::<_, ApiError>(Json(response))
}

pub async fn create_resource(
    auth: RequireAuth,
    Extension(kind): Extension<ResourceKind>,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    let resource = state
        .resources
        .create(&auth.0, &user, &project, kind, &payload)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(
        format!("New resource '{}' created", resource.base.name),
        resource.to_view(true)?,
    )))
}

pub async fn update_resource(
    auth: RequireAuth,
    Extension(kind): Extension<ResourceKind>,
    State(state): State<Arc<AppState>>,
    Path((user, project, id)): Path<(String, String, String)>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    let updated = state
        .resources
        .edit(&auth.0, &user, &project, kind, &id, &payload)?;

    Ok::<_, ApiError>(Json(ApiResponse::message(format!(
        "[{updated}] Resources updated"
    ))))
}

pub async fn delete_resources(
    auth: RequireAuth,
    Extension(kind): Extension<ResourceKind>,
    State(state): State<Arc<AppState>>,
    Path((user, project, ids)): Path<(String, String, String)>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    let removed = state.resources.remove(&auth.0, &user, &project, kind, &ids)?;

    Ok::<_, ApiError>(Json(ApiResponse::message(format!(
        "[{removed}] resources have been removed"
    ))))
}
