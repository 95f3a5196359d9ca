use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::Value;

use crate::auth::RequireAuth;
use crate::engine::{apply_changes, touched};
use crate::error::Error;
use crate::schema::{Entity, Mode};
use crate::server::AppState;
use crate::server::dto::{ApiJson, ApiQuery, ListParams};
use crate::server::guards::{can_edit, verbose_for, views};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::store::FileQuery;
use crate::types::{Caller, is_valid_id};

fn list(
    state: &AppState,
    caller: &Caller,
    user: &str,
    project: Option<String>,
    params: &ListParams,
) -> Result<ApiResponse<Vec<Value>>, ApiError> {
    let query = FileQuery {
        user: user.to_string(),
        project_id: project,
        search: params.search(),
        favourite_only: params.favourite.unwrap_or(false),
        global_only: params.global.unwrap_or(false),
        bucket: params.bucket.clone().filter(|b| !b.is_empty()),
    };

    let listing = state
        .store
        .list_files(&query, params.page())
        .api_err("Failed to list files")?;
    let data = views(&listing.items, verbose_for(Some(caller), user, params.verbose()))?;

    Ok(ApiResponse::list(
        format!("Found {} files", listing.total),
        data,
        listing.total,
    ))
}

pub async fn list_user_files(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    let response = list(&state, &auth.0, &user, None, &params)?;
    Ok::<_, ApiError>(Json(response))
}

pub async fn list_project_files(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, project)): Path<(String, String)>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    state
        .permissions
        .can_read(Some(&auth.0), &user, &project)?
        .require()?;

    let response = list(&state, &auth.0, &user, Some(project), &params)?;
    Ok::<_, ApiError>(Json(response))
}

pub async fn update_file(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((user, id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<Value>,
) -> impl IntoResponse {
    can_edit(&auth.0, &user)?;
    if !is_valid_id(&id) {
        return Err(ApiError::failure("Please use a valid file ID"));
    }

    let changes = state
        .validator
        .validate(Entity::File, &payload, Mode::Update)
        .map_err(Error::from)?;

    let file = state
        .store
        .get_file(&id)
        .api_err("Failed to get file")?
        .filter(|f| f.user == user);

    let updated = match file {
        Some(file) => {
            let mut updated = apply_changes(&file, changes)?;
            updated.last_modified = touched(updated.created_on);
            usize::from(state.store.update_file(&updated).api_err("Failed to update file")?)
        }
        None => 0,
    };

    Ok::<_, ApiError>(Json(ApiResponse::message(format!(
        "[{updated}] Files updated"
    ))))
}
