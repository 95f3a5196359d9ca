//! Domain workflows behind the HTTP surface.
//!
//! Services hold only `Arc` handles to the store and to each other, so they
//! can be shared across request tasks. Collaborators are injected as trait
//! objects at construction.

pub mod builds;
pub mod events;
pub mod permission;
pub mod projects;
pub mod quota;
pub mod resources;

pub use builds::{BuildLifecycle, BuildManager};
pub use events::{EngineEvent, EventDispatcher, UploadedFile};
pub use permission::{Access, PermissionEvaluator};
pub use projects::{ProjectOrchestrator, RemoveOutcome, RemovedItem};
pub use quota::{QuotaChecker, QuotaPolicy};
pub use resources::ResourceService;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::types::is_valid_id;

/// Writes validated `changes` over the serialized form of `doc`.
pub(crate) fn apply_changes<T>(doc: &T, changes: Map<String, Value>) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut value = serde_json::to_value(doc)?;
    if let Value::Object(map) = &mut value {
        map.extend(changes);
    }
    serde_json::from_value(value).map_err(Error::from)
}

/// A modification time that is never earlier than, or equal to, `created`.
pub(crate) fn touched(created: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    let floor = created + Duration::milliseconds(1);
    if now < floor { floor } else { now }
}

/// Splits a comma separated id list. The first malformed id fails the whole list.
pub fn parse_id_list(ids: &str) -> Result<Vec<String>> {
    ids.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|id| {
            if is_valid_id(id) {
                Ok(id.to_string())
            } else {
                Err(Error::BadRequest(format!("ID '{id}' is not a valid ID")))
            }
        })
        .collect()
}
