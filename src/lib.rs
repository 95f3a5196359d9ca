//! # App Engine
//!
//! A REST server for projects, their builds and their resources (assets,
//! groups, containers and scripts), together with plugins, user details and
//! file metadata. Usable both as a standalone binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! appengine = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::Path;
//! use appengine::config::ServerConfig;
//! use appengine::server::{AppState, create_router};
//! use appengine::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::load(Path::new("./data")).unwrap();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), config));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! Lifecycle notifications from an identity service can be applied directly
//! through [`engine::EventDispatcher::dispatch`] or posted to
//! `/app-engine/hooks/events`.
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `appengine` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod schema;
pub mod server;
pub mod store;
pub mod types;
