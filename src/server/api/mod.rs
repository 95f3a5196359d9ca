mod builds;
mod files;
mod hooks;
mod plugins;
mod projects;
mod resources;
mod user_details;

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post, put},
};

use crate::server::AppState;
use crate::types::ResourceKind;

pub fn api_router() -> Router<Arc<AppState>> {
    let router = Router::new()
        // Projects
        .route(
            "/projects",
            get(projects::list_all_projects).post(projects::create_project),
        )
        .route("/users/{user}/projects", get(projects::list_user_projects))
        .route(
            "/users/{user}/projects/{project}",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_projects),
        )
        // Builds
        .route(
            "/users/{user}/projects/{project}/builds",
            get(builds::list_builds).post(builds::create_build),
        )
        .route(
            "/users/{user}/projects/{project}/builds/{id}",
            get(builds::get_build).put(builds::update_build),
        )
        // Files
        .route("/users/{user}/files", get(files::list_user_files))
        .route("/users/{user}/files/{id}", put(files::update_file))
        .route(
            "/users/{user}/projects/{project}/files",
            get(files::list_project_files),
        )
        // Plugins
        .route(
            "/plugins",
            get(plugins::list_plugins).post(plugins::create_plugin),
        )
        .route(
            "/plugins/{id}",
            get(plugins::get_plugin)
                .put(plugins::update_plugin)
                .delete(plugins::delete_plugin),
        )
        // User details
        .route(
            "/user-details/{user}",
            get(user_details::get_details)
                .post(user_details::create_details)
                .put(user_details::update_details),
        )
        // Lifecycle events
        .route("/hooks/events", post(hooks::receive_event));

    ResourceKind::ALL
        .into_iter()
        .fold(router, |router, kind| router.merge(resource_router(kind)))
}

/// Routes of one resource collection. Handlers read the kind from the
/// request extensions.
fn resource_router(kind: ResourceKind) -> Router<Arc<AppState>> {
    let collection = kind.collection();
    Router::new()
        .route(&format!("/{collection}"), get(resources::list_all_resources))
        .route(
            &format!("/users/{{user}}/projects/{{project}}/{collection}"),
            get(resources::list_resources).post(resources::create_resource),
        )
        .route(
            &format!("/users/{{user}}/projects/{{project}}/{collection}/{{id}}"),
            get(resources::get_resource)
                .put(resources::update_resource)
                .delete(resources::delete_resources),
        )
        .layer(Extension(kind))
}
