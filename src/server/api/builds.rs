use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::auth::RequireAuth;
use crate::server::AppState;
use crate::server::dto::{ApiJson, ApiQuery, ListParams};
use crate::server::guards::{can_edit, verbose_for, views};
use crate::server::response::{ApiError, ApiResponse};
use crate::types::{Caller, Document};

fn list(
    state: &AppState,
    caller: &Caller,
    user: &str,
    project: &str,
    id: Option<&str>,
    params: &ListParams,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    can_edit(caller, user)?;
    state
        .permissions
        .can_read(Some(caller), user, project)?
        .require()?;

    let verbose = verbose_for(Some(caller), user, params.verbose());
    let listing = state
        .builds
        .list(user, project, id, params.page())
        .map_err(|e| ApiError::from(e).context(format!("Could not get builds for '{user}'")))?;
    let data = views(&listing.items, verbose)?;

    Ok(ApiResponse::list(
        format!("Found [{}] builds for user '{user}'", listing.total),
        data,
        listing.total,
    ))
}

pub async fn list_builds(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let response = list(&state, &auth.0, &user, &project, None, &params)?;
    Ok::<_, ApiError>(Json(response))
}

pub async fn get_build(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, project, id)): Path<(String, String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    let response = list(&state, &auth.0, &user, &project, Some(&id), &params)?;
    Ok::<_, ApiError>(Json(response))
}

pub async fn create_build(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    state
        .permissions
        .can_write(Some(&auth.0), &user, &project)?
        .require()?;

    let build = state
        .builds
        .create_for_project(&user, &project, params.set_current.unwrap_or(false))
        .map_err(|e| ApiError::from(e).context(format!("Could not create build for '{user}'")))?;

    Ok::<_, ApiError>(Json(ApiResponse::list(
        format!("Created new build for user '{user}'"),
        vec![build.to_view(true)?],
        1,
    )))
}

pub async fn update_build(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, project, id)): Path<(String, String, String)>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    state
        .permissions
        .can_write(Some(&auth.0), &user, &project)?
        .require()?;

    let updated = state.builds.edit(&project, &id, &payload)?;
    Ok::<_, ApiError>(Json(ApiResponse::message(format!(
        "[{updated}] Build updated"
    ))))
}
