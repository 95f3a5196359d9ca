use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{AccessLevel, Caller, Project, is_valid_id};

/// Outcome of a project permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied(String),
    NotFound(String),
    Unauthenticated,
}

impl Access {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }

    /// Converts any refusal into the matching error.
    pub fn require(self) -> Result<()> {
        match self {
            Access::Allowed => Ok(()),
            Access::Denied(reason) => Err(Error::Forbidden(reason)),
            Access::NotFound(reason) => Err(Error::NotFound(reason)),
            Access::Unauthenticated => Err(Error::Unauthenticated),
        }
    }
}

/// Decides whether `caller` may act on `project_id` under `path_user` at `level`.
///
/// Checks run in a fixed order: caller present, project id present and well
/// formed, elevated callers pass, project exists for the path user, and
/// finally membership in a privilege list that satisfies `level`. The owner
/// always passes the membership check.
///
/// `lookup` fetches a project by id and owner and is called at most once.
pub fn evaluate<F>(
    caller: Option<&Caller>,
    path_user: &str,
    project_id: Option<&str>,
    level: AccessLevel,
    lookup: F,
) -> Result<Access>
where
    F: FnOnce(&str, &str) -> Result<Option<Project>>,
{
    let Some(caller) = caller else {
        return Ok(Access::Unauthenticated);
    };

    let Some(project_id) = project_id.filter(|p| !p.is_empty()) else {
        return Ok(Access::Denied("Project not specified".to_string()));
    };

    if !is_valid_id(project_id) {
        return Ok(Access::Denied("Please use a valid project ID".to_string()));
    }

    if caller.is_elevated() {
        return Ok(Access::Allowed);
    }

    let Some(project) = lookup(project_id, path_user)? else {
        return Ok(Access::NotFound("No project exists with that ID".to_string()));
    };

    if level.permits(&project, &caller.username) {
        Ok(Access::Allowed)
    } else {
        Ok(Access::Denied(
            "User does not have permissions for project".to_string(),
        ))
    }
}

/// Store-backed front end to [`evaluate`].
#[derive(Clone)]
pub struct PermissionEvaluator {
    store: Arc<dyn Store>,
}

impl PermissionEvaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn check(
        &self,
        caller: Option<&Caller>,
        path_user: &str,
        project_id: Option<&str>,
        level: AccessLevel,
    ) -> Result<Access> {
        evaluate(caller, path_user, project_id, level, |id, user| {
            self.store.get_user_project(id, user)
        })
    }

    pub fn can_read(
        &self,
        caller: Option<&Caller>,
        path_user: &str,
        project_id: &str,
    ) -> Result<Access> {
        self.check(caller, path_user, Some(project_id), AccessLevel::Read)
    }

    pub fn can_write(
        &self,
        caller: Option<&Caller>,
        path_user: &str,
        project_id: &str,
    ) -> Result<Access> {
        self.check(caller, path_user, Some(project_id), AccessLevel::Write)
    }

    pub fn can_admin(
        &self,
        caller: Option<&Caller>,
        path_user: &str,
        project_id: &str,
    ) -> Result<Access> {
        self.check(caller, path_user, Some(project_id), AccessLevel::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrivilegeTier, new_id};
    use chrono::Utc;

    fn regular(name: &str) -> Caller {
        Caller::new(name, PrivilegeTier::Regular)
    }

    fn shared_project() -> Project {
        let mut project = Project::new("george", "Test", Utc::now());
        project.read_privileges = vec!["reader".to_string()];
        project.write_privileges = vec!["writer".to_string()];
        project
    }

    fn run(
        caller: Option<&Caller>,
        project_id: Option<&str>,
        level: AccessLevel,
        project: &Project,
    ) -> Access {
        evaluate(caller, "george", project_id, level, |id, user| {
            Ok((id == project.id && user == project.user).then(|| project.clone()))
        })
        .unwrap()
    }

    #[test]
    fn test_missing_caller() {
        let project = shared_project();
        assert_eq!(
            run(None, Some(&project.id), AccessLevel::Read, &project),
            Access::Unauthenticated
        );
    }

    #[test]
    fn test_project_id_checks_come_first() {
        let project = shared_project();
        let admin = Caller::new("root", PrivilegeTier::Admin);

        assert_eq!(
            run(Some(&admin), None, AccessLevel::Read, &project),
            Access::Denied("Project not specified".to_string())
        );
        assert_eq!(
            run(Some(&admin), Some("not-an-id"), AccessLevel::Read, &project),
            Access::Denied("Please use a valid project ID".to_string())
        );
    }

    #[test]
    fn test_elevated_bypasses_existence() {
        let project = shared_project();
        let admin = Caller::new("root", PrivilegeTier::SuperAdmin);
        let missing = new_id();

        assert_eq!(
            run(Some(&admin), Some(&missing), AccessLevel::Admin, &project),
            Access::Allowed
        );
    }

    #[test]
    fn test_unknown_project() {
        let project = shared_project();
        let missing = new_id();
        assert_eq!(
            run(Some(&regular("george")), Some(&missing), AccessLevel::Read, &project),
            Access::NotFound("No project exists with that ID".to_string())
        );
    }

    #[test]
    fn test_cascade() {
        let project = shared_project();
        let id = Some(project.id.as_str());

        assert!(run(Some(&regular("reader")), id, AccessLevel::Read, &project).is_allowed());
        assert!(!run(Some(&regular("reader")), id, AccessLevel::Write, &project).is_allowed());
        assert!(run(Some(&regular("writer")), id, AccessLevel::Write, &project).is_allowed());
        assert!(!run(Some(&regular("writer")), id, AccessLevel::Admin, &project).is_allowed());
        assert!(run(Some(&regular("george")), id, AccessLevel::Admin, &project).is_allowed());
        assert_eq!(
            run(Some(&regular("jane")), id, AccessLevel::Read, &project),
            Access::Denied("User does not have permissions for project".to_string())
        );
    }

    #[test]
    fn test_owner_passes_even_when_removed_from_admins() {
        let mut project = shared_project();
        project.admin_privileges.clear();
        assert!(
            run(Some(&regular("george")), Some(&project.id.clone()), AccessLevel::Admin, &project)
                .is_allowed()
        );
    }

    #[test]
    fn test_require_maps_errors() {
        assert!(Access::Allowed.require().is_ok());
        assert!(matches!(
            Access::Denied("x".into()).require(),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(Access::Unauthenticated.require(), Err(Error::Unauthenticated)));
    }
}
