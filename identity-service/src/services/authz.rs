//! Authorization policy engine.
//!
//! Pure, read-only predicates over Affiliation and Claim edges. The engine
//! itself never logs or mutates state; a call site that turns a denial into
//! a response is expected to log it once with the acting user key and the
//! attempted action. Role comparison goes through
//! [`Permission::meets_or_exceeds`] exclusively.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{IdentityStore, StoreError};
use crate::models::{Permission, User};

use super::error::ServiceError;

pub struct PolicyEngine {
    store: Arc<dyn IdentityStore>,
}

impl PolicyEngine {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    /// The caller must resolve to a real user record.
    pub fn user_required<'a>(&self, caller: Option<&'a User>) -> Result<&'a User, ServiceError> {
        caller.ok_or(ServiceError::AuthenticationRequired)
    }

    /// The caller must be a real user with a verified email address.
    pub fn verified_required<'a>(
        &self,
        caller: Option<&'a User>,
    ) -> Result<&'a User, ServiceError> {
        let user = self.user_required(caller)?;
        if !user.email_verified {
            return Err(ServiceError::AuthenticationRequired);
        }
        Ok(user)
    }

    /// Role the user holds on the organization. `None` means no permission
    /// at all, which is distinct from an explicit low role.
    pub async fn check_permission(
        &self,
        user_key: Uuid,
        org_id: Uuid,
    ) -> Result<Option<Permission>, StoreError> {
        Ok(self
            .store
            .find_affiliation(org_id, user_key)
            .await?
            .map(|a| a.permission))
    }

    /// True iff any affiliation of the user carries `super_admin`. Super
    /// admins are effectively global by policy convention.
    pub async fn check_super_admin(&self, user_key: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .store
            .affiliations_for_user(user_key)
            .await?
            .iter()
            .any(|a| a.permission == Permission::SuperAdmin))
    }

    /// True iff the organization claims the domain.
    pub async fn check_domain_ownership(
        &self,
        org_id: Uuid,
        domain_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.store.find_claim(org_id, domain_id).await?.is_some())
    }

    /// True iff the user holds admin-or-above on the organization.
    pub async fn check_org_owner(&self, user_key: Uuid, org_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .check_permission(user_key, org_id)
            .await?
            .is_some_and(|p| p.meets_or_exceeds(Permission::Admin)))
    }

    /// True iff the user has any affiliation with the organization.
    pub async fn check_user_belongs_to_org(
        &self,
        user_key: Uuid,
        org_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.check_permission(user_key, org_id).await?.is_some())
    }

    /// True iff the acting user holds admin-or-above on some organization
    /// the subject user belongs to.
    pub async fn check_user_is_admin_for_user(
        &self,
        admin_key: Uuid,
        subject_key: Uuid,
    ) -> Result<bool, StoreError> {
        let admin_orgs: HashSet<Uuid> = self
            .store
            .affiliations_for_user(admin_key)
            .await?
            .into_iter()
            .filter(|a| a.permission.meets_or_exceeds(Permission::Admin))
            .map(|a| a.org_id)
            .collect();

        if admin_orgs.is_empty() {
            return Ok(false);
        }

        Ok(self
            .store
            .affiliations_for_user(subject_key)
            .await?
            .iter()
            .any(|a| admin_orgs.contains(&a.org_id)))
    }

    /// Pass iff the caller's role on the organization meets `required`, with
    /// the super-admin global bypass. Returns the effective role.
    pub async fn require_permission(
        &self,
        user_key: Uuid,
        org_id: Uuid,
        required: Permission,
    ) -> Result<Permission, ServiceError> {
        let held = self
            .check_permission(user_key, org_id)
            .await
            .map_err(|_| ServiceError::OperationFailed {
                operation: "check permissions",
            })?;

        if let Some(permission) = held {
            if permission.meets_or_exceeds(required) {
                return Ok(permission);
            }
        }

        let is_super = self.check_super_admin(user_key).await.map_err(|_| {
            ServiceError::OperationFailed {
                operation: "check permissions",
            }
        })?;
        if is_super {
            return Ok(Permission::SuperAdmin);
        }

        Err(ServiceError::Forbidden)
    }
}
