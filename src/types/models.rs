use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Plan, PrivilegeTier};
use crate::error::Result;
use crate::schema::{self, Entity};

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// True if `id` has the shape of an identifier issued by this server.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// A stored document that can be rendered with or without its sensitive fields.
pub trait Document: Serialize {
    fn entity(&self) -> Entity;

    fn to_view(&self, verbose: bool) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if !verbose {
            if let Value::Object(map) = &mut value {
                for field in schema::for_entity(self.entity()).sensitive_fields() {
                    map.remove(field);
                }
            }
        }
        Ok(value)
    }
}

fn default_category() -> i64 {
    1
}

fn default_version() -> String {
    "0.0.1".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_category")]
    pub category: i64,
    #[serde(default)]
    pub sub_category: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub cur_file: Option<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub num_raters: i64,
    #[serde(default)]
    pub suspicious: bool,
    #[serde(default)]
    pub deleted: bool,
    pub user: String,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default, rename = "type")]
    pub project_type: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub read_privileges: Vec<String>,
    #[serde(default)]
    pub write_privileges: Vec<String>,
    #[serde(default)]
    pub admin_privileges: Vec<String>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(with = "ts_milliseconds")]
    pub created_on: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl Project {
    /// A blank project owned by `owner`, who is its only admin.
    pub fn new(owner: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description: String::new(),
            image: String::new(),
            category: default_category(),
            sub_category: String::new(),
            public: false,
            cur_file: None,
            rating: 0.0,
            score: 0.0,
            num_raters: 0,
            suspicious: false,
            deleted: false,
            user: owner.to_string(),
            build: None,
            project_type: 0,
            tags: Vec::new(),
            read_privileges: Vec::new(),
            write_privileges: Vec::new(),
            admin_privileges: vec![owner.to_string()],
            plugins: Vec::new(),
            files: Vec::new(),
            created_on: now,
            last_modified: now,
        }
    }

    /// Re-adds the owner to the admin list if an edit dropped it.
    pub fn ensure_owner_is_admin(&mut self) {
        if !self.admin_privileges.iter().any(|u| u == &self.user) {
            self.admin_privileges.insert(0, self.user.clone());
        }
    }
}

impl Document for Project {
    fn entity(&self) -> Entity {
        Entity::Project
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub user: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub css: String,
    #[serde(default, rename = "liveHTML")]
    pub live_html: String,
    #[serde(default)]
    pub live_link: String,
    #[serde(default)]
    pub live_token: String,
    #[serde(default)]
    pub total_votes: i64,
    #[serde(default)]
    pub total_voters: i64,
    #[serde(with = "ts_milliseconds")]
    pub created_on: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl Build {
    /// A build with blank content.
    pub fn new(user: &str, project_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: String::new(),
            user: user.to_string(),
            project_id,
            notes: String::new(),
            version: default_version(),
            html: String::new(),
            public: false,
            css: String::new(),
            live_html: String::new(),
            live_link: String::new(),
            live_token: String::new(),
            total_votes: 0,
            total_voters: 0,
            created_on: now,
            last_modified: now,
        }
    }
}

impl Document for Build {
    fn entity(&self) -> Entity {
        Entity::Build
    }
}

/// The project-scoped resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Asset,
    Group,
    Container,
    Script,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Asset, Self::Group, Self::Container, Self::Script];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Group => "group",
            Self::Container => "container",
            Self::Script => "script",
        }
    }

    /// URL segment of the collection, e.g. `assets`.
    #[must_use]
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Asset => "assets",
            Self::Group => "groups",
            Self::Container => "containers",
            Self::Script => "scripts",
        }
    }

    #[must_use]
    pub const fn entity(self) -> Entity {
        match self {
            Self::Asset => Entity::Asset,
            Self::Group => Entity::Group,
            Self::Container => Entity::Container,
            Self::Script => Entity::Script,
        }
    }
}

/// Fields shared by every resource kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceBase {
    #[serde(rename = "_id")]
    pub id: String,
    pub project_id: String,
    pub user: String,
    pub shallow_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(with = "ts_milliseconds")]
    pub created_on: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBody {
    #[serde(default)]
    pub class_name: String,
    #[serde(default = "empty_array")]
    pub json: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupBody {
    #[serde(default)]
    pub items: Vec<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerBody {
    #[serde(default = "empty_object")]
    pub json: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptBody {
    #[serde(default)]
    pub on_enter: String,
    #[serde(default)]
    pub on_initialize: String,
    #[serde(default)]
    pub on_dispose: String,
    #[serde(default)]
    pub on_frame: String,
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Kind-specific payload of a resource.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceBody {
    Asset(AssetBody),
    Group(GroupBody),
    Container(ContainerBody),
    Script(ScriptBody),
}

impl ResourceBody {
    /// Reads the payload of `kind` out of a document; unrelated keys are ignored.
    pub fn from_value(kind: ResourceKind, value: Value) -> Result<Self> {
        Ok(match kind {
            ResourceKind::Asset => Self::Asset(serde_json::from_value(value)?),
            ResourceKind::Group => Self::Group(serde_json::from_value(value)?),
            ResourceKind::Container => Self::Container(serde_json::from_value(value)?),
            ResourceKind::Script => Self::Script(serde_json::from_value(value)?),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    #[serde(skip)]
    pub kind: ResourceKind,
    #[serde(flatten)]
    pub base: ResourceBase,
    #[serde(flatten)]
    pub body: ResourceBody,
}

impl Resource {
    pub fn from_document(kind: ResourceKind, doc: Value) -> Result<Self> {
        let base: ResourceBase = serde_json::from_value(doc.clone())?;
        let body = ResourceBody::from_value(kind, doc)?;
        Ok(Self { kind, base, body })
    }
}

impl Document for Resource {
    fn entity(&self) -> Entity {
        self.kind.entity()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMeta {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub customer_id: String,
    pub max_projects: i64,
}

impl UserMeta {
    pub fn new(user: &str, max_projects: i64) -> Self {
        Self {
            id: new_id(),
            user: user.to_string(),
            bio: String::new(),
            image: String::new(),
            plan: Plan::Free,
            website: String::new(),
            customer_id: String::new(),
            max_projects,
        }
    }
}

impl Document for UserMeta {
    fn entity(&self) -> Entity {
        Entity::UserMeta
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub deployables: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(with = "ts_milliseconds")]
    pub created_on: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl Plugin {
    /// A private plugin with default settings.
    pub fn new(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            name: name.to_string(),
            description: String::new(),
            plan: Plan::Free,
            url: String::new(),
            deployables: Vec::new(),
            image: String::new(),
            author: String::new(),
            version: default_version(),
            is_public: false,
            created_on: now,
            last_modified: now,
        }
    }
}

impl Document for Plugin {
    fn entity(&self) -> Entity {
        Entity::Plugin
    }
}

/// Metadata of a file held by the external file service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub bucket_id: String,
    pub bucket_name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub favourite: bool,
    #[serde(default)]
    pub global: bool,
    #[serde(default = "default_true")]
    pub browsable: bool,
    pub user: String,
    pub identifier: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(with = "ts_milliseconds")]
    pub created_on: DateTime<Utc>,
    #[serde(with = "ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl Document for FileEntry {
    fn entity(&self) -> Entity {
        Entity::File
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    #[serde(skip)]
    pub token_hash: String,
    #[serde(skip)]
    pub token_lookup: String,
    pub username: String,
    pub privileges: PrivilegeTier,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_serializes_camel_case_with_millis() {
        let now = Utc::now();
        let project = Project::new("george", "Test", now);
        let json = serde_json::to_value(&project).unwrap();

        assert_eq!(json["_id"], project.id);
        assert_eq!(json["adminPrivileges"][0], "george");
        assert_eq!(json["createdOn"], now.timestamp_millis());
        assert!(json["curFile"].is_null());
    }

    #[test]
    fn test_project_view_hides_sensitive_fields() {
        let project = Project::new("george", "Test", Utc::now());

        let public = project.to_view(false).unwrap();
        assert!(public.get("readPrivileges").is_none());
        assert!(public.get("build").is_none());
        assert_eq!(public["name"], "Test");

        let verbose = project.to_view(true).unwrap();
        assert!(verbose["readPrivileges"].is_array());
    }

    #[test]
    fn test_resource_document_flattens_body() {
        let now = Utc::now();
        let resource = Resource {
            kind: ResourceKind::Asset,
            base: ResourceBase {
                id: new_id(),
                project_id: new_id(),
                user: "george".to_string(),
                shallow_id: 1,
                name: "chicken".to_string(),
                created_on: now,
                last_modified: now,
            },
            body: ResourceBody::Asset(AssetBody {
                class_name: "Classy".to_string(),
                json: Value::Array(Vec::new()),
            }),
        };

        let doc = serde_json::to_value(&resource).unwrap();
        assert_eq!(doc["className"], "Classy");
        assert_eq!(doc["shallowId"], 1);

        let parsed = Resource::from_document(ResourceKind::Asset, doc).unwrap();
        assert_eq!(parsed.base.name, "chicken");
        assert!(matches!(parsed.body, ResourceBody::Asset(ref a) if a.class_name == "Classy"));
    }

    #[test]
    fn test_owner_restored_as_admin() {
        let mut project = Project::new("george", "Test", Utc::now());
        project.admin_privileges = vec!["jane".to_string()];
        project.ensure_owner_is_admin();
        assert_eq!(project.admin_privileges, vec!["george", "jane"]);
    }
}
