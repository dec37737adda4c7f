//! Affiliation model - organization→user edges carrying a role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a user holds within one organization.
///
/// The ordered variants are the single source of truth for role comparison;
/// call sites go through [`Permission::meets_or_exceeds`] instead of
/// comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    User,
    Admin,
    SuperAdmin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::User => "user",
            Permission::Admin => "admin",
            Permission::SuperAdmin => "super_admin",
        }
    }

    /// True when this role grants at least what `required` grants.
    pub fn meets_or_exceeds(&self, required: Permission) -> bool {
        *self >= required
    }
}

/// Affiliation entity. At most one exists per (organization, user) pair;
/// absence means no permission at all, which is distinct from an explicit
/// `user` role. Read-only to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affiliation {
    pub affiliation_id: Uuid,
    pub org_id: Uuid,
    pub user_key: Uuid,
    pub permission: Permission,
    pub created_utc: DateTime<Utc>,
}

impl Affiliation {
    pub fn new(org_id: Uuid, user_key: Uuid, permission: Permission) -> Self {
        Self {
            affiliation_id: Uuid::new_v4(),
            org_id,
            user_key,
            permission,
            created_utc: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_order() {
        assert!(Permission::User < Permission::Admin);
        assert!(Permission::Admin < Permission::SuperAdmin);
    }

    #[test]
    fn test_meets_or_exceeds() {
        assert!(Permission::Admin.meets_or_exceeds(Permission::User));
        assert!(Permission::Admin.meets_or_exceeds(Permission::Admin));
        assert!(!Permission::Admin.meets_or_exceeds(Permission::SuperAdmin));
        assert!(Permission::SuperAdmin.meets_or_exceeds(Permission::User));
    }

    #[test]
    fn test_role_strings() {
        assert_eq!(Permission::User.as_str(), "user");
        assert_eq!(Permission::Admin.as_str(), "admin");
        assert_eq!(Permission::SuperAdmin.as_str(), "super_admin");
    }
}
