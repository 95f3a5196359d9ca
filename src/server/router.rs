use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::api::api_router;
use crate::config::ServerConfig;
use crate::engine::{
    BuildLifecycle, BuildManager, EventDispatcher, PermissionEvaluator, ProjectOrchestrator,
    QuotaChecker, ResourceService,
};
use crate::schema::{SchemaValidator, Validator};
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub validator: Arc<dyn Validator>,
    pub permissions: PermissionEvaluator,
    pub projects: Arc<ProjectOrchestrator>,
    pub builds: Arc<BuildManager>,
    pub resources: ResourceService,
    pub events: EventDispatcher,
    pub config: ServerConfig,
}

impl AppState {
    /// Wires the engine services around `store`.
    pub fn new(store: Arc<dyn Store>, config: ServerConfig) -> Self {
        let validator: Arc<dyn Validator> = Arc::new(SchemaValidator);
        let builds = Arc::new(BuildManager::new(store.clone(), validator.clone()));
        let lifecycle: Arc<dyn BuildLifecycle> = builds.clone();

        let projects = Arc::new(ProjectOrchestrator::new(
            store.clone(),
            lifecycle.clone(),
            Arc::new(QuotaChecker::new(store.clone())),
            validator.clone(),
        ));
        let resources = ResourceService::new(store.clone(), validator.clone());
        let events = EventDispatcher::new(
            store.clone(),
            projects.clone(),
            lifecycle,
            config.quota.default_max_projects,
        );

        Self {
            permissions: PermissionEvaluator::new(store.clone()),
            store,
            validator,
            projects,
            builds,
            resources,
            events,
            config,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/app-engine", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
