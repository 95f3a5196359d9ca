use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::auth::{MaybeCaller, RequireAdmin, RequireAuth};
use crate::server::AppState;
use crate::server::dto::{ApiJson, ApiQuery, ListParams};
use crate::server::guards::{can_edit, verbose_for, views};
use crate::server::response::{ApiError, ApiResponse, RemoveResponse};
use crate::types::Document;

pub async fn list_all_projects(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let listing = state.projects.list_all(params.search(), params.page())?;
    let data = views(&listing.items, params.verbose())?;

    Ok::<_, ApiError>(Json(ApiResponse::list(
        format!("Found {} projects", listing.total),
        data,
        listing.total,
    )))
}

pub async fn create_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    let project = state.projects.create(&auth.0, &payload)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(
        format!("Created project '{}'", project.name),
        project.to_view(true)?,
    )))
}

pub async fn list_user_projects(
    MaybeCaller(caller): MaybeCaller,
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let verbose = verbose_for(caller.as_ref(), &user, params.verbose());
    let listing = state
        .projects
        .list_by_user(&user, params.search(), params.page())?;
    let data = views(&listing.items, verbose)?;

    Ok::<_, ApiError>(Json(ApiResponse::list(
        format!("Found {} projects", listing.total),
        data,
        listing.total,
    )))
}

pub async fn get_project(
    MaybeCaller(caller): MaybeCaller,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let verbose = verbose_for(caller.as_ref(), &user, params.verbose());
    let listing = state.projects.get(caller.as_ref(), &user, &project)?;
    let data = views(&listing.items, verbose)?;

    Ok::<_, ApiError>(Json(ApiResponse::list(
        format!("Found {} projects", listing.total),
        data,
        listing.total,
    )))
}

pub async fn update_project(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    let updated = state.projects.update(&auth.0, &user, &project, &payload)?;

    Ok::<_, ApiError>(Json(ApiResponse::message(format!(
        "[{updated}] Projects updated"
    ))))
}

pub async fn delete_projects(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, ids)): Path<(String, String)>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    let outcome = state.projects.remove(&auth.0, &user, &ids)?;

    Ok::<_, ApiError>(Json(RemoveResponse::from(outcome)))
}
