use std::fmt;

use serde::{Deserialize, Serialize};

use super::Project;

/// Global role of a caller, as assigned by the identity service.
/// Lower numbers carry more authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum PrivilegeTier {
    SuperAdmin = 1,
    Admin = 2,
    Regular = 3,
}

impl PrivilegeTier {
    /// Tiers strictly below this value bypass every per-project check.
    pub const ELEVATED_THRESHOLD: i64 = 3;

    #[must_use]
    pub const fn is_elevated(self) -> bool {
        (self as i64) < Self::ELEVATED_THRESHOLD
    }

    pub fn parse(s: &str) -> Option<PrivilegeTier> {
        match s {
            "super" | "superadmin" | "1" => Some(Self::SuperAdmin),
            "admin" | "2" => Some(Self::Admin),
            "regular" | "3" => Some(Self::Regular),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super",
            Self::Admin => "admin",
            Self::Regular => "regular",
        }
    }
}

impl fmt::Display for PrivilegeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for PrivilegeTier {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::SuperAdmin),
            2 => Ok(Self::Admin),
            3 => Ok(Self::Regular),
            other => Err(format!("unknown privilege tier {other}")),
        }
    }
}

impl From<PrivilegeTier> for i64 {
    fn from(tier: PrivilegeTier) -> Self {
        tier as i64
    }
}

/// An authenticated identity making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub username: String,
    pub privileges: PrivilegeTier,
}

impl Caller {
    pub fn new(username: impl Into<String>, privileges: PrivilegeTier) -> Self {
        Self {
            username: username.into(),
            privileges,
        }
    }

    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.privileges.is_elevated()
    }

    /// True if the caller acts on their own path segment or is elevated.
    #[must_use]
    pub fn can_act_for(&self, user: &str) -> bool {
        self.is_elevated() || self.username == user
    }
}

/// Per-project access tiers. Each tier accepts the privilege lists of the
/// tiers above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Read,
    Write,
    Admin,
}

impl AccessLevel {
    /// Checks list membership on an already loaded project. The owner always passes.
    #[must_use]
    pub fn permits(self, project: &Project, user: &str) -> bool {
        if project.user == user {
            return true;
        }
        let contains = |list: &[String]| list.iter().any(|u| u == user);
        match self {
            Self::Read => {
                contains(&project.read_privileges)
                    || contains(&project.write_privileges)
                    || contains(&project.admin_privileges)
            }
            Self::Write => {
                contains(&project.write_privileges) || contains(&project.admin_privileges)
            }
            Self::Admin => contains(&project.admin_privileges),
        }
    }
}

/// Subscription plan of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Plan {
    #[default]
    Free = 1,
    Bronze = 2,
    Silver = 3,
    Gold = 4,
    Platinum = 5,
    Custom = 6,
}

impl TryFrom<i64> for Plan {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Free),
            2 => Ok(Self::Bronze),
            3 => Ok(Self::Silver),
            4 => Ok(Self::Gold),
            5 => Ok(Self::Platinum),
            6 => Ok(Self::Custom),
            other => Err(format!("unknown plan {other}")),
        }
    }
}

impl From<Plan> for i64 {
    fn from(plan: Plan) -> Self {
        plan as i64
    }
}
