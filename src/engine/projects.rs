use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{BuildLifecycle, PermissionEvaluator, QuotaPolicy, apply_changes, touched};
use crate::error::Result;
use crate::schema::{Entity, Mode, Validator};
use crate::store::{Listing, Page, ProjectQuery, Store};
use crate::types::{Caller, Project};

/// Result of deleting one project in a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedItem {
    pub id: String,
    pub error: bool,
    pub error_msg: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub error: bool,
    pub message: String,
    pub items: Vec<RemovedItem>,
}

/// Coordinates project creation, update and deletion across the project,
/// build and resource collections.
///
/// Creation is a saga: the build is created first, then the project, then the
/// build is linked to it. A failure at any later step undoes the earlier ones
/// before the error is returned.
pub struct ProjectOrchestrator {
    store: Arc<dyn Store>,
    builds: Arc<dyn BuildLifecycle>,
    quota: Arc<dyn QuotaPolicy>,
    validator: Arc<dyn Validator>,
    permissions: PermissionEvaluator,
}

impl ProjectOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        builds: Arc<dyn BuildLifecycle>,
        quota: Arc<dyn QuotaPolicy>,
        validator: Arc<dyn Validator>,
    ) -> Self {
        let permissions = PermissionEvaluator::new(store.clone());
        Self {
            store,
            builds,
            quota,
            validator,
            permissions,
        }
    }

    pub fn create(&self, caller: &Caller, payload: &Value) -> Result<Project> {
        let changes = self
            .validator
            .validate(Entity::Project, payload, Mode::Create)?;
        self.quota.within_limits(caller)?;

        let build = self.builds.create_build(&caller.username, None)?;

        let project = match self.insert_project(caller, changes, &build.id) {
            Ok(project) => project,
            Err(e) => {
                self.compensate(&caller.username, &build.id, None);
                return Err(e);
            }
        };

        if let Err(e) = self.builds.link_project(&build.id, &project.id) {
            self.compensate(&caller.username, &build.id, Some(&project.id));
            return Err(e);
        }

        tracing::info!(project = %project.id, user = %caller.username, "Created project");
        Ok(project)
    }

    fn insert_project(
        &self,
        caller: &Caller,
        changes: Map<String, Value>,
        build_id: &str,
    ) -> Result<Project> {
        let now = Utc::now();
        let mut project = apply_changes(&Project::new(&caller.username, "", now), changes)?;

        project.admin_privileges = vec![caller.username.clone()];
        project.read_privileges.clear();
        project.write_privileges.clear();
        project.build = Some(build_id.to_string());
        project.created_on = now;
        project.last_modified = now;

        let limit = self.quota.project_limit(caller)?;
        self.store.create_project(&project, limit)?;
        Ok(project)
    }

    /// Undoes a partial create. Failures here are logged only.
    fn compensate(&self, user: &str, build_id: &str, project_id: Option<&str>) {
        if let Err(e) = self.builds.remove_by_ids(&[build_id.to_string()], user) {
            tracing::error!(
                pid = std::process::id(),
                build = %build_id,
                "Failed to remove orphaned build: {e}"
            );
        }

        if let Some(project_id) = project_id {
            if let Err(e) = self.store.delete_project(project_id, user) {
                tracing::error!(
                    pid = std::process::id(),
                    project = %project_id,
                    "Failed to remove partially created project: {e}"
                );
            }
        }
    }

    /// Deletes a comma separated list of projects owned by `path_user`.
    ///
    /// Every id is checked for admin access before anything is deleted; the
    /// first refusal is returned as the error.
    pub fn remove(&self, caller: &Caller, path_user: &str, ids: &str) -> Result<RemoveOutcome> {
        let ids: Vec<&str> = ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        for id in &ids {
            self.permissions
                .can_admin(Some(caller), path_user, id)?
                .require()?;
        }

        let mut items = Vec::new();
        let mut failed: Option<String> = None;

        for id in ids {
            let removed = match self.store.get_user_project(id, path_user) {
                Ok(None) => continue,
                Ok(Some(_)) => self.remove_one(id, path_user),
                Err(e) => Err(e),
            };

            match removed {
                Ok(()) => items.push(RemovedItem {
                    id: id.to_string(),
                    error: false,
                    error_msg: String::new(),
                }),
                Err(e) => {
                    tracing::error!(
                        pid = std::process::id(),
                        project = %id,
                        "Failed to delete project: {e}"
                    );
                    failed.get_or_insert_with(|| id.to_string());
                    items.push(RemovedItem {
                        id: id.to_string(),
                        error: true,
                        error_msg: e.to_string(),
                    });
                }
            }
        }

        let outcome = match failed {
            Some(id) => RemoveOutcome {
                error: true,
                message: format!("An error occurred when deleting project {id}"),
                items,
            },
            None => RemoveOutcome {
                error: false,
                message: format!("{} items have been removed", items.len()),
                items,
            },
        };
        Ok(outcome)
    }

    fn remove_one(&self, id: &str, user: &str) -> Result<()> {
        self.builds.remove_by_project(id, user)?;
        self.store.delete_resources_by_project(id)?;
        self.store.delete_project(id, user)?;
        Ok(())
    }

    /// Merges a validated partial update into a project. Returns the number of
    /// projects changed.
    pub fn update(
        &self,
        caller: &Caller,
        path_user: &str,
        id: &str,
        payload: &Value,
    ) -> Result<usize> {
        self.permissions
            .can_admin(Some(caller), path_user, id)?
            .require()?;

        let changes = self
            .validator
            .validate(Entity::Project, payload, Mode::Update)?;

        let Some(project) = self.store.get_user_project(id, path_user)? else {
            return Ok(0);
        };

        let mut updated = apply_changes(&project, changes)?;
        updated.ensure_owner_is_admin();
        updated.last_modified = touched(updated.created_on);

        Ok(usize::from(self.store.update_project(&updated)?))
    }

    pub fn get(
        &self,
        caller: Option<&Caller>,
        path_user: &str,
        id: &str,
    ) -> Result<Listing<Project>> {
        self.permissions.can_read(caller, path_user, id)?.require()?;

        let query = ProjectQuery {
            user: Some(path_user.to_string()),
            id: Some(id.to_string()),
            search: None,
        };
        self.store.list_projects(&query, Page::default())
    }

    pub fn list_by_user(
        &self,
        user: &str,
        search: Option<String>,
        page: Page,
    ) -> Result<Listing<Project>> {
        let query = ProjectQuery {
            user: Some(user.to_string()),
            id: None,
            search,
        };
        self.store.list_projects(&query, page)
    }

    pub fn list_all(&self, search: Option<String>, page: Page) -> Result<Listing<Project>> {
        let query = ProjectQuery {
            search,
            ..ProjectQuery::default()
        };
        self.store.list_projects(&query, page)
    }

    /// Deletes every project of `user` with its builds and resources.
    pub fn remove_by_user(&self, user: &str) -> Result<usize> {
        let ids = self.store.list_user_project_ids(user)?;
        for id in &ids {
            self.remove_one(id, user)?;
        }
        Ok(ids.len())
    }
}
