use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{BuildLifecycle, ProjectOrchestrator};
use crate::error::Result;
use crate::store::Store;
use crate::types::{FileEntry, UserMeta, new_id};

/// A file the file service has finished storing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub bucket_id: String,
    pub bucket_name: String,
    pub user: String,
    pub public_url: String,
    #[serde(default)]
    pub mime_type: String,
    pub name: String,
    pub identifier: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default = "default_browsable")]
    pub browsable: bool,
}

fn default_browsable() -> bool {
    true
}

/// Notifications from the identity and file services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    UserActivated { username: String },
    UserRemoved { username: String },
    FileUploaded { file: UploadedFile },
    FileRemoved { identifier: String },
}

/// Applies lifecycle events. Every handler may safely run more than once for
/// the same event.
pub struct EventDispatcher {
    store: Arc<dyn Store>,
    projects: Arc<ProjectOrchestrator>,
    builds: Arc<dyn BuildLifecycle>,
    default_max_projects: i64,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        projects: Arc<ProjectOrchestrator>,
        builds: Arc<dyn BuildLifecycle>,
        default_max_projects: i64,
    ) -> Self {
        Self {
            store,
            projects,
            builds,
            default_max_projects,
        }
    }

    pub fn dispatch(&self, event: &EngineEvent) -> Result<()> {
        match event {
            EngineEvent::UserActivated { username } => {
                let meta = UserMeta::new(username, self.default_max_projects);
                if self.store.create_user_meta(&meta)? {
                    tracing::info!(user = %username, "Created user details");
                }
            }
            EngineEvent::UserRemoved { username } => self.remove_user(username)?,
            EngineEvent::FileUploaded { file } => {
                if self.store.get_file_by_identifier(&file.identifier)?.is_some() {
                    return Ok(());
                }
                self.store.create_file(&file_entry(file))?;
            }
            EngineEvent::FileRemoved { identifier } => {
                self.store.delete_files_by_identifier(identifier)?;
            }
        }
        Ok(())
    }

    fn remove_user(&self, username: &str) -> Result<()> {
        self.store.delete_user_meta(username)?;
        let projects = self.projects.remove_by_user(username)?;
        let builds = self.builds.remove_by_user(username)?;
        let resources = self.store.delete_resources_by_user(username)?;
        let files = self.store.delete_files_by_user(username)?;
        self.store.delete_user_tokens(username)?;

        tracing::info!(
            user = %username,
            projects,
            builds,
            resources,
            files,
            "Removed user data"
        );
        Ok(())
    }
}

fn file_entry(file: &UploadedFile) -> FileEntry {
    let now = Utc::now();
    let extension = Path::new(&file.name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    FileEntry {
        id: new_id(),
        name: file.name.clone(),
        bucket_id: file.bucket_id.clone(),
        bucket_name: file.bucket_name.clone(),
        size: file.size,
        favourite: false,
        global: false,
        browsable: file.browsable,
        user: file.user.clone(),
        identifier: file.identifier.clone(),
        extension,
        url: file.public_url.clone(),
        tags: Vec::new(),
        preview_url: String::new(),
        project_id: None,
        created_on: now,
        last_modified: now,
    }
}
