use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::{apply_changes, touched};
use crate::error::{Error, Result};
use crate::schema::{Entity, Mode, Validator};
use crate::store::{BuildQuery, Listing, Page, Store};
use crate::types::{Build, is_valid_id};

/// Build operations the project workflows depend on.
pub trait BuildLifecycle: Send + Sync {
    fn create_build(&self, user: &str, project_id: Option<&str>) -> Result<Build>;

    /// Points the build at its project. Fails with `Error::LinkFailure`.
    fn link_project(&self, build_id: &str, project_id: &str) -> Result<()>;

    fn remove_by_project(&self, project_id: &str, user: &str) -> Result<usize>;
    fn remove_by_user(&self, user: &str) -> Result<usize>;
    fn remove_by_ids(&self, ids: &[String], user: &str) -> Result<usize>;
}

pub struct BuildManager {
    store: Arc<dyn Store>,
    validator: Arc<dyn Validator>,
}

impl BuildManager {
    pub fn new(store: Arc<dyn Store>, validator: Arc<dyn Validator>) -> Self {
        Self { store, validator }
    }

    /// Builds of `project_id` created by `user`, optionally narrowed to one id.
    /// A malformed `id` is ignored rather than rejected.
    pub fn list(
        &self,
        user: &str,
        project_id: &str,
        id: Option<&str>,
        page: Page,
    ) -> Result<Listing<Build>> {
        if !is_valid_id(project_id) {
            return Err(Error::BadRequest("Please use a valid project ID".to_string()));
        }

        let query = BuildQuery {
            user: user.to_string(),
            project_id: project_id.to_string(),
            id: id.filter(|i| is_valid_id(i)).map(str::to_string),
        };
        self.store.list_builds(&query, page)
    }

    /// Creates a build for an existing project and, with `set_current`, makes
    /// it the project's current build.
    pub fn create_for_project(
        &self,
        user: &str,
        project_id: &str,
        set_current: bool,
    ) -> Result<Build> {
        if !is_valid_id(project_id) {
            return Err(Error::BadRequest("Please use a valid project ID".to_string()));
        }

        let build = self.create_build(user, Some(project_id))?;

        if set_current && !self.store.set_project_build(project_id, &build.id)? {
            return Err(Error::NotFound("No project exists with that ID".to_string()));
        }

        Ok(build)
    }

    /// Applies a validated partial update to one build of a project. Returns
    /// the number of builds changed.
    pub fn edit(&self, project_id: &str, id: &str, payload: &Value) -> Result<usize> {
        if !is_valid_id(id) {
            return Err(Error::BadRequest("Please use a valid resource ID".to_string()));
        }
        if !is_valid_id(project_id) {
            return Err(Error::BadRequest("Please use a valid project ID".to_string()));
        }

        let changes = self.validator.validate(Entity::Build, payload, Mode::Update)?;

        let Some(build) = self
            .store
            .get_build(id)?
            .filter(|b| b.project_id.as_deref() == Some(project_id))
        else {
            return Ok(0);
        };

        let mut updated = apply_changes(&build, changes)?;
        updated.last_modified = touched(updated.created_on);
        Ok(usize::from(self.store.update_build(&updated)?))
    }
}

impl BuildLifecycle for BuildManager {
    fn create_build(&self, user: &str, project_id: Option<&str>) -> Result<Build> {
        let build = Build::new(user, project_id.map(str::to_string), Utc::now());
        self.store.create_build(&build)?;
        Ok(build)
    }

    fn link_project(&self, build_id: &str, project_id: &str) -> Result<()> {
        match self.store.set_build_project(build_id, project_id) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::LinkFailure),
            Err(e) => {
                tracing::error!(pid = std::process::id(), "Failed to link build {build_id}: {e}");
                Err(Error::LinkFailure)
            }
        }
    }

    fn remove_by_project(&self, project_id: &str, user: &str) -> Result<usize> {
        self.store.delete_builds_by_project(project_id, user)
    }

    fn remove_by_user(&self, user: &str) -> Result<usize> {
        self.store.delete_builds_by_user(user)
    }

    fn remove_by_ids(&self, ids: &[String], user: &str) -> Result<usize> {
        self.store.delete_builds(ids, user)
    }
}
