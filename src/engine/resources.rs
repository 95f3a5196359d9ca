use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::{PermissionEvaluator, parse_id_list, touched};
use crate::error::{Error, Result};
use crate::schema::{Mode, Validator};
use crate::store::{Listing, Page, ResourceQuery, Store};
use crate::types::{
    Caller, Resource, ResourceBase, ResourceBody, ResourceKind, is_valid_id, new_id,
};

/// CRUD over the project-scoped collections, one code path for every
/// [`ResourceKind`]. Writes need write access to the project, reads need
/// read access.
pub struct ResourceService {
    store: Arc<dyn Store>,
    validator: Arc<dyn Validator>,
    permissions: PermissionEvaluator,
}

impl ResourceService {
    pub fn new(store: Arc<dyn Store>, validator: Arc<dyn Validator>) -> Self {
        let permissions = PermissionEvaluator::new(store.clone());
        Self {
            store,
            validator,
            permissions,
        }
    }

    pub fn create(
        &self,
        caller: &Caller,
        path_user: &str,
        project_id: &str,
        kind: ResourceKind,
        payload: &Value,
    ) -> Result<Resource> {
        self.permissions
            .can_write(Some(caller), path_user, project_id)?
            .require()?;

        let changes = self.validator.validate(kind.entity(), payload, Mode::Create)?;
        let name = changes
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let body = ResourceBody::from_value(kind, Value::Object(changes))?;

        let now = Utc::now();
        let mut resource = Resource {
            kind,
            base: ResourceBase {
                id: new_id(),
                project_id: project_id.to_string(),
                user: path_user.to_string(),
                shallow_id: 0,
                name,
                created_on: now,
                last_modified: now,
            },
            body,
        };
        self.store.create_resource(&mut resource)?;

        tracing::debug!(kind = kind.as_str(), id = %resource.base.id, "Created resource");
        Ok(resource)
    }

    pub fn edit(
        &self,
        caller: &Caller,
        path_user: &str,
        project_id: &str,
        kind: ResourceKind,
        id: &str,
        payload: &Value,
    ) -> Result<usize> {
        self.permissions
            .can_write(Some(caller), path_user, project_id)?
            .require()?;

        if !is_valid_id(id) {
            return Err(Error::BadRequest("Please use a valid resource ID".to_string()));
        }

        let changes = self.validator.validate(kind.entity(), payload, Mode::Update)?;

        let Some(resource) = self
            .store
            .get_resource(kind, id)?
            .filter(|r| r.base.project_id == project_id)
        else {
            return Ok(0);
        };

        let mut doc = serde_json::to_value(&resource)?;
        if let Value::Object(map) = &mut doc {
            map.extend(changes);
        }
        let mut updated = Resource::from_document(kind, doc)?;
        updated.base.last_modified = touched(updated.base.created_on);

        Ok(usize::from(self.store.update_resource(&updated)?))
    }

    /// Deletes a comma separated list of resources. No id is deleted if any
    /// of them is malformed.
    pub fn remove(
        &self,
        caller: &Caller,
        path_user: &str,
        project_id: &str,
        kind: ResourceKind,
        ids: &str,
    ) -> Result<usize> {
        self.permissions
            .can_write(Some(caller), path_user, project_id)?
            .require()?;

        let ids = parse_id_list(ids)?;
        self.store.delete_resources(kind, project_id, path_user, &ids)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn list(
        &self,
        caller: &Caller,
        path_user: &str,
        project_id: &str,
        kind: ResourceKind,
        id: Option<&str>,
        search: Option<String>,
        page: Page,
    ) -> Result<Listing<Resource>> {
        self.permissions
            .can_read(Some(caller), path_user, project_id)?
            .require()?;

        let query = ResourceQuery {
            kind,
            project_id: Some(project_id.to_string()),
            id: id.filter(|i| is_valid_id(i)).map(str::to_string),
            search,
        };
        self.store.list_resources(&query, page)
    }

    /// Every resource of `kind` across all projects.
    pub fn list_all(
        &self,
        kind: ResourceKind,
        search: Option<String>,
        page: Page,
    ) -> Result<Listing<Resource>> {
        let query = ResourceQuery {
            search,
            ..ResourceQuery::all(kind)
        };
        self.store.list_resources(&query, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaValidator;
    use crate::store::SqliteStore;
    use crate::types::{PrivilegeTier, Project};
    use serde_json::json;

    struct Fixture {
        store: Arc<SqliteStore>,
        resources: ResourceService,
        project: Project,
    }

    impl Fixture {
        /// Creates a resource in the fixture project as `caller`.
        fn create_as(&self, caller: &Caller, kind: ResourceKind, body: Value) -> Result<Resource> {
            let pid = &self.project.id;
            self.resources.create(caller, "george", pid, kind, &body)
        }

        fn create(&self, kind: ResourceKind, body: Value) -> Resource {
            self.create_as(&george(), kind, body).unwrap()
        }
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.initialize().unwrap();

        let mut project = Project::new("george", "Test", Utc::now());
        project.read_privileges = vec!["reader".to_string()];
        store.create_project(&project, None).unwrap();

        let resources = ResourceService::new(store.clone(), Arc::new(SchemaValidator));
        Fixture {
            store,
            resources,
            project,
        }
    }

    fn george() -> Caller {
        Caller::new("george", PrivilegeTier::Regular)
    }

    #[test]
    fn test_shallow_ids_per_kind() {
        let f = fixture();

        let first = f.create(ResourceKind::Asset, json!({ "name": "a", "className": "A" }));
        let second = f.create(ResourceKind::Asset, json!({ "name": "b", "className": "B" }));
        let group = f.create(ResourceKind::Group, json!({ "name": "g" }));

        assert_eq!(first.base.shallow_id, 1);
        assert_eq!(second.base.shallow_id, 2);
        assert_eq!(group.base.shallow_id, 1);
        assert_eq!(first.base.user, "george");
    }

    #[test]
    fn test_shallow_ids_per_project() {
        let f = fixture();
        let other = Project::new("george", "Other", Utc::now());
        f.store.create_project(&other, None).unwrap();

        let in_other = |name: &str| {
            f.resources
                .create(
                    &george(),
                    "george",
                    &other.id,
                    ResourceKind::Container,
                    &json!({ "name": name }),
                )
                .unwrap()
                .base
                .shallow_id
        };

        let mut ids = Vec::new();
        ids.push(f.create(ResourceKind::Container, json!({ "name": "a" })).base.shallow_id);
        ids.push(in_other("x"));
        ids.push(f.create(ResourceKind::Container, json!({ "name": "b" })).base.shallow_id);
        ids.push(in_other("y"));
        ids.push(f.create(ResourceKind::Container, json!({ "name": "c" })).base.shallow_id);

        assert_eq!(ids, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn test_create_requires_write_access() {
        let f = fixture();
        let reader = Caller::new("reader", PrivilegeTier::Regular);
        let err = f
            .create_as(&reader, ResourceKind::Container, json!({ "name": "c" }))
            .unwrap_err();
        assert_eq!(err.to_string(), "User does not have permissions for project");

        let listing = f
            .resources
            .list(
                &reader,
                "george",
                &f.project.id,
                ResourceKind::Container,
                None,
                None,
                Page::default(),
            )
            .unwrap();
        assert_eq!(listing.total, 0);
    }

    #[test]
    fn test_create_validates_payload() {
        let f = fixture();
        let err = f
            .create_as(&george(), ResourceKind::Asset, json!({ "name": "a" }))
            .unwrap_err();
        assert_eq!(err.to_string(), "className is required");
    }

    #[test]
    fn test_edit_merges_body() {
        let f = fixture();
        let pid = &f.project.id;
        let script = f.create(ResourceKind::Script, json!({ "name": "s", "onEnter": "go()" }));

        let changed = f
            .resources
            .edit(
                &george(),
                "george",
                pid,
                ResourceKind::Script,
                &script.base.id,
                &json!({ "onFrame": "tick()" }),
            )
            .unwrap();
        assert_eq!(changed, 1);

        let stored = f
            .store
            .get_resource(ResourceKind::Script, &script.base.id)
            .unwrap()
            .unwrap();
        let ResourceBody::Script(body) = stored.body else {
            panic!("expected a script body");
        };
        assert_eq!(body.on_enter, "go()");
        assert_eq!(body.on_frame, "tick()");
        assert!(stored.base.last_modified > stored.base.created_on);

        let err = f
            .resources
            .edit(&george(), "george", pid, ResourceKind::Script, "bad", &json!({}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Please use a valid resource ID");
    }

    #[test]
    fn test_remove_rejects_bad_ids_before_deleting() {
        let f = fixture();
        let pid = &f.project.id;
        let asset = f.create(ResourceKind::Asset, json!({ "name": "a", "className": "A" }));

        let ids = format!("{},oops", asset.base.id);
        let err = f
            .resources
            .remove(&george(), "george", pid, ResourceKind::Asset, &ids)
            .unwrap_err();
        assert_eq!(err.to_string(), "ID 'oops' is not a valid ID");
        let listing = f
            .resources
            .list_all(ResourceKind::Asset, None, Page::default())
            .unwrap();
        assert_eq!(listing.total, 1);

        let removed = f
            .resources
            .remove(&george(), "george", pid, ResourceKind::Asset, &asset.base.id)
            .unwrap();
        assert_eq!(removed, 1);
    }
}
