use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Caller;

pub trait QuotaPolicy: Send + Sync {
    /// Fails with `Error::QuotaExceeded` once the caller owns as many projects
    /// as their plan allows.
    fn within_limits(&self, caller: &Caller) -> Result<()>;

    /// The caller's project ceiling, or `None` when unlimited.
    fn project_limit(&self, caller: &Caller) -> Result<Option<i64>>;
}

/// Project quota backed by each user's `maxProjects`. Elevated callers are
/// never limited.
pub struct QuotaChecker {
    store: Arc<dyn Store>,
}

impl QuotaChecker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

impl QuotaPolicy for QuotaChecker {
    fn within_limits(&self, caller: &Caller) -> Result<()> {
        let Some(max) = self.project_limit(caller)? else {
            return Ok(());
        };

        let owned = self.store.count_user_projects(&caller.username)?;
        if owned < max {
            Ok(())
        } else {
            Err(Error::QuotaExceeded)
        }
    }

    fn project_limit(&self, caller: &Caller) -> Result<Option<i64>> {
        if caller.is_elevated() {
            return Ok(None);
        }

        let meta = self
            .store
            .get_user_meta(&caller.username)?
            .ok_or_else(|| Error::NotFound("User details not found".to_string()))?;
        Ok(Some(meta.max_projects))
    }
}
