//! Roles and the permission table

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Vendor,
    Recruiter,
    HiringManager,
    Admin,
}

impl Role {
    /// All roles, least privileged first
    pub const ALL: [Role; 4] = [Role::Vendor, Role::Recruiter, Role::HiringManager, Role::Admin];

    /// Numeric rank used for minimum-role checks
    pub fn rank(self) -> u8 {
        match self {
            Role::Vendor => 0,
            Role::Recruiter => 1,
            Role::HiringManager => 2,
            Role::Admin => 3,
        }
    }

    /// True when this role is `min` or more privileged
    pub fn at_least(self, min: Role) -> bool {
        self.rank() >= min.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Vendor => "vendor",
            Role::Recruiter => "recruiter",
            Role::HiringManager => "hiring_manager",
            Role::Admin => "admin",
        }
    }

    pub fn is_vendor(self) -> bool {
        self == Role::Vendor
    }

    /// Check a permission, returning `Forbidden` when not granted
    pub fn require(self, permission: Permission) -> Result<()> {
        if permission.is_granted_to(self) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "role '{}' lacks permission {:?}",
                self.as_str(),
                permission
            )))
        }
    }

    /// Minimum-role check, returning `Forbidden` when the role ranks lower
    pub fn require_min(self, min: Role) -> Result<()> {
        if self.at_least(min) {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "requires role '{}' or higher",
                min.as_str()
            )))
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "vendor" => Ok(Role::Vendor),
            "recruiter" => Ok(Role::Recruiter),
            "hiring_manager" => Ok(Role::HiringManager),
            "admin" => Ok(Role::Admin),
            other => Err(Error::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

/// Actions guarded by the permission table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageCompany,
    ManageUsers,
    ManageSla,
    ManageJobs,
    ManagePipeline,
    ManageVendors,
    ManageCandidates,
    MoveCandidates,
    BulkOperations,
    ManageInterviews,
    ViewAnalytics,
    SearchCandidates,
    ViewJobs,
    SubmitCandidates,
}

const ADMIN_ONLY: &[Role] = &[Role::Admin];
const MANAGERS: &[Role] = &[Role::Admin, Role::HiringManager];
const STAFF: &[Role] = &[Role::Admin, Role::HiringManager, Role::Recruiter];
const EVERYONE: &[Role] = &[Role::Admin, Role::HiringManager, Role::Recruiter, Role::Vendor];

impl Permission {
    /// Roles granted this permission
    pub fn allowed_roles(self) -> &'static [Role] {
        use Permission::*;
        match self {
            ManageCompany | ManageUsers | ManageSla => ADMIN_ONLY,
            ManageJobs | ManagePipeline | ManageVendors => MANAGERS,
            ManageCandidates | MoveCandidates | BulkOperations | ManageInterviews
            | ViewAnalytics | SearchCandidates => STAFF,
            ViewJobs | SubmitCandidates => EVERYONE,
        }
    }

    pub fn is_granted_to(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}
