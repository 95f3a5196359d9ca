use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use appengine::auth::{TokenGenerator, issue_token};
use appengine::config::ServerConfig;
use appengine::server::{AppState, create_router};
use appengine::store::{SqliteStore, Store};
use appengine::types::{PrivilegeTier, UserMeta};

/// A server bound to an ephemeral port, backed by a database in a temp dir.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub admin_token: String,
    pub store: Arc<SqliteStore>,
    client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = ServerConfig::load(temp_dir.path()).expect("load config");

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");

        let admin_token = create_account(&store, "admin", PrivilegeTier::SuperAdmin, 5);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let base_url = format!("http://127.0.0.1:{port}");

        let app = create_router(Arc::new(AppState::new(store.clone(), config)));
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let server = Self {
            temp_dir,
            base_url,
            admin_token,
            store,
            client: reqwest::Client::new(),
            handle,
        };
        server.wait_for_ready().await;
        server
    }

    async fn wait_for_ready(&self) {
        for _ in 0..50 {
            if self
                .client
                .get(format!("{}/health", self.base_url))
                .send()
                .await
                .is_ok()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
        panic!("Server did not become ready");
    }

    /// Creates a regular user with details and returns their token.
    pub fn add_user(&self, username: &str) -> String {
        create_account(&self.store, username, PrivilegeTier::Regular, 5)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/app-engine{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, token: Option<&str>) -> Value {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request
            .send()
            .await
            .expect("send request")
            .json()
            .await
            .expect("parse envelope")
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Value {
        self.send(self.client.get(self.url(path)), token).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Value {
        self.send(self.client.post(self.url(path)).json(&body), token)
            .await
    }

    pub async fn put(&self, path: &str, token: Option<&str>, body: Value) -> Value {
        self.send(self.client.put(self.url(path)).json(&body), token)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Value {
        self.send(self.client.delete(self.url(path)), token).await
    }

    /// Posts `body` as is, returning the status alongside the envelope.
    pub async fn post_raw(&self, path: &str, token: &str, body: &str) -> (u16, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .expect("send request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("parse envelope"))
    }
}

fn create_account(
    store: &SqliteStore,
    username: &str,
    tier: PrivilegeTier,
    max_projects: i64,
) -> String {
    let (token, raw_token) =
        issue_token(&TokenGenerator::new(), username, tier).expect("issue token");
    store.create_token(&token).expect("store token");
    store
        .create_user_meta(&UserMeta::new(username, max_projects))
        .expect("create user details");
    raw_token
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
