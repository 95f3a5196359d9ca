mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Offset pagination. A missing limit returns everything after `index`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub index: i64,
    pub limit: Option<i64>,
}

/// One page of matches plus the number of matches overall.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub user: Option<String>,
    pub id: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BuildQuery {
    pub user: String,
    pub project_id: String,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResourceQuery {
    pub kind: ResourceKind,
    pub project_id: Option<String>,
    pub id: Option<String>,
    pub search: Option<String>,
}

impl ResourceQuery {
    pub fn all(kind: ResourceKind) -> Self {
        Self {
            kind,
            project_id: None,
            id: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PluginQuery {
    pub public_only: bool,
    pub id: Option<String>,
    pub search: Option<String>,
}

/// Only browsable files are ever listed.
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    pub user: String,
    pub project_id: Option<String>,
    /// Matches the name or any tag.
    pub search: Option<String>,
    pub favourite_only: bool,
    pub global_only: bool,
    pub bucket: Option<String>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Project operations

    /// Inserts `project`. With `max_owned` set, the owner's project count is
    /// checked in the same transaction and `Error::QuotaExceeded` returned when
    /// the owner already has that many.
    fn create_project(&self, project: &Project, max_owned: Option<i64>) -> Result<()>;
    fn get_project(&self, id: &str) -> Result<Option<Project>>;
    fn get_user_project(&self, id: &str, user: &str) -> Result<Option<Project>>;
    fn list_projects(&self, query: &ProjectQuery, page: Page) -> Result<Listing<Project>>;
    fn count_user_projects(&self, user: &str) -> Result<i64>;
    fn list_user_project_ids(&self, user: &str) -> Result<Vec<String>>;
    /// Replaces the document of the project with the same id and owner.
    fn update_project(&self, project: &Project) -> Result<bool>;
    fn set_project_build(&self, project_id: &str, build_id: &str) -> Result<bool>;
    fn delete_project(&self, id: &str, user: &str) -> Result<bool>;

    // Build operations
    fn create_build(&self, build: &Build) -> Result<()>;
    fn get_build(&self, id: &str) -> Result<Option<Build>>;
    fn list_builds(&self, query: &BuildQuery, page: Page) -> Result<Listing<Build>>;
    fn update_build(&self, build: &Build) -> Result<bool>;
    fn set_build_project(&self, build_id: &str, project_id: &str) -> Result<bool>;
    fn delete_builds(&self, ids: &[String], user: &str) -> Result<usize>;
    fn delete_builds_by_project(&self, project_id: &str, user: &str) -> Result<usize>;
    fn delete_builds_by_user(&self, user: &str) -> Result<usize>;

    // Resource operations

    /// Inserts `resource`, assigning the next shallow id of its kind within the project.
    fn create_resource(&self, resource: &mut Resource) -> Result<()>;
    fn get_resource(&self, kind: ResourceKind, id: &str) -> Result<Option<Resource>>;
    fn list_resources(&self, query: &ResourceQuery, page: Page) -> Result<Listing<Resource>>;
    fn update_resource(&self, resource: &Resource) -> Result<bool>;
    fn delete_resources(
        &self,
        kind: ResourceKind,
        project_id: &str,
        user: &str,
        ids: &[String],
    ) -> Result<usize>;
    fn delete_resources_by_project(&self, project_id: &str) -> Result<usize>;
    fn delete_resources_by_user(&self, user: &str) -> Result<usize>;

    // Plugin operations
    fn create_plugin(&self, plugin: &Plugin) -> Result<()>;
    fn get_plugin(&self, id: &str) -> Result<Option<Plugin>>;
    fn list_plugins(&self, query: &PluginQuery, page: Page) -> Result<Listing<Plugin>>;
    fn update_plugin(&self, plugin: &Plugin) -> Result<bool>;
    fn delete_plugin(&self, id: &str) -> Result<bool>;

    // User details operations

    /// Returns false if details for the user already exist.
    fn create_user_meta(&self, meta: &UserMeta) -> Result<bool>;
    fn get_user_meta(&self, user: &str) -> Result<Option<UserMeta>>;
    fn update_user_meta(&self, meta: &UserMeta) -> Result<bool>;
    fn delete_user_meta(&self, user: &str) -> Result<bool>;

    // File operations
    fn create_file(&self, file: &FileEntry) -> Result<()>;
    fn get_file(&self, id: &str) -> Result<Option<FileEntry>>;
    fn get_file_by_identifier(&self, identifier: &str) -> Result<Option<FileEntry>>;
    fn list_files(&self, query: &FileQuery, page: Page) -> Result<Listing<FileEntry>>;
    fn update_file(&self, file: &FileEntry) -> Result<bool>;
    fn delete_files_by_identifier(&self, identifier: &str) -> Result<usize>;
    fn delete_files_by_user(&self, user: &str) -> Result<usize>;

    // Token operations
    fn create_token(&self, token: &Token) -> Result<()>;
    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>>;
    fn update_token_last_used(&self, id: &str) -> Result<()>;
    fn delete_user_tokens(&self, username: &str) -> Result<usize>;
    fn has_admin_token(&self) -> Result<bool>;
}
