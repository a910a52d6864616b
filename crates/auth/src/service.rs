//! Role administration surface.
//!
//! Composes the authorization gates with store writes. For every mutation of
//! an existing role the order is fixed:
//!
//! 1. system-role guard (structural, independent of the actor's grants)
//! 2. `rbac:manage`
//! 3. catalog validation of referenced permissions
//! 4. grant ceiling: the actor must already hold every permission it hands out
//! 5. a single store write, serialized per role id

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use nexhire_core::{OrganizationId, RoleId, UserId};

use crate::authorize::{AuthorizationEngine, AuthzError};
use crate::catalog::PermissionCatalog;
use crate::permissions::keys;
use crate::roles::{RoleChanges, RoleDefinition, SYSTEM_ROLES, UserRoleAssignment};
use crate::store::{RoleStore, StoreError};
use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RbacError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("role not found")]
    RoleNotFound,

    #[error("role name '{0}' already exists in this organization")]
    DuplicateName(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("role store unavailable: {0}")]
    Store(String),
}

impl From<StoreError> for RbacError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::RoleNotFound => RbacError::RoleNotFound,
            StoreError::DuplicateName(name) => RbacError::DuplicateName(name),
            StoreError::Unavailable(msg) => RbacError::Store(msg),
        }
    }
}

impl RbacError {
    fn from_authz(err: AuthzError) -> Self {
        match err {
            AuthzError::Store(e) => e.into(),
            other => RbacError::Authz(other),
        }
    }
}

/// Input for creating a custom role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
}

/// Per-role async locks. An entry lives while some caller holds or waits on
/// it and is evicted by the last guard to drop.
#[derive(Debug, Default)]
struct RoleLocks {
    inner: Mutex<HashMap<RoleId, Arc<AsyncMutex<()>>>>,
}

impl RoleLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<RoleId, Arc<AsyncMutex<()>>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn acquire(&self, role_id: RoleId) -> RoleLockGuard<'_> {
        let lock = self.map().entry(role_id).or_default().clone();
        RoleLockGuard {
            guard: Some(lock.lock_owned().await),
            role_id,
            locks: self,
        }
    }
}

struct RoleLockGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    role_id: RoleId,
    locks: &'a RoleLocks,
}

impl Drop for RoleLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.map();
        // Only the map's own reference left: nobody holds or awaits this lock.
        if map.get(&self.role_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(&self.role_id);
        }
    }
}

/// Role administration service for one process (all organizations).
pub struct RoleService<S> {
    engine: AuthorizationEngine<S>,
    catalog: PermissionCatalog,
    locks: RoleLocks,
}

impl<S> RoleService<S>
where
    S: RoleStore,
{
    pub fn new(store: S) -> Self {
        Self {
            engine: AuthorizationEngine::new(store),
            catalog: PermissionCatalog,
            locks: RoleLocks::default(),
        }
    }

    pub fn engine(&self) -> &AuthorizationEngine<S> {
        &self.engine
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    fn store(&self) -> &S {
        self.engine.store()
    }

    async fn require(&self, principal: &Principal, permission: &Permission) -> Result<(), RbacError> {
        self.engine
            .require_permission(Some(principal), permission)
            .await
            .map_err(RbacError::from_authz)
    }

    async fn guard_system_role(&self, principal: &Principal, role_id: RoleId) -> Result<(), RbacError> {
        self.engine
            .prevent_system_role_modification(principal.organization_id, role_id)
            .await
            .map_err(RbacError::from_authz)
    }

    fn validate_permissions(&self, permissions: &[Permission]) -> Result<(), RbacError> {
        self.catalog.validate(permissions).map_err(RbacError::Authz)
    }

    /// Refuse to hand out permissions the actor does not hold itself, so
    /// `rbac:manage` alone cannot be widened into `"all"`.
    async fn require_grantable(&self, principal: &Principal, permissions: &[Permission]) -> Result<(), RbacError> {
        let held = self
            .engine
            .effective_permissions(principal.user_id, principal.organization_id)
            .await
            .map_err(RbacError::from_authz)?;
        match permissions.iter().find(|p| !held.grants(p)) {
            None => Ok(()),
            Some(missing) => {
                tracing::info!(
                    actor = %principal.user_id,
                    organization_id = %principal.organization_id,
                    permission = %missing,
                    "blocked grant of unheld permission"
                );
                Err(RbacError::Authz(AuthzError::Forbidden(format!(
                    "cannot grant '{missing}' without holding it"
                ))))
            }
        }
    }

    fn validate_name(name: &str) -> Result<(), RbacError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RbacError::Validation("role name must not be empty".to_string()));
        }
        if trimmed.chars().count() > 100 {
            return Err(RbacError::Validation("role name must be at most 100 characters".to_string()));
        }
        Ok(())
    }

    pub async fn list_roles(&self, principal: &Principal) -> Result<Vec<RoleDefinition>, RbacError> {
        self.require(principal, &keys::RBAC_VIEW).await?;
        Ok(self.store().list_roles(principal.organization_id).await?)
    }

    pub async fn get_role(&self, principal: &Principal, role_id: RoleId) -> Result<RoleDefinition, RbacError> {
        self.require(principal, &keys::RBAC_VIEW).await?;
        self.store()
            .get_role(principal.organization_id, role_id)
            .await?
            .ok_or(RbacError::RoleNotFound)
    }

    pub async fn create_role(&self, principal: &Principal, input: NewRole) -> Result<RoleDefinition, RbacError> {
        self.require(principal, &keys::RBAC_MANAGE).await?;
        Self::validate_name(&input.name)?;
        self.validate_permissions(&input.permissions)?;
        self.require_grantable(principal, &input.permissions).await?;

        let role = RoleDefinition::new(
            principal.organization_id,
            input.name.trim(),
            input.description,
            input.permissions,
            false,
            Utc::now(),
        );
        let role = self.store().insert_role(role).await?;
        tracing::info!(
            role_id = %role.id,
            organization_id = %role.organization_id,
            actor = %principal.user_id,
            "role created"
        );
        Ok(role)
    }

    pub async fn update_role(
        &self,
        principal: &Principal,
        role_id: RoleId,
        mut changes: RoleChanges,
    ) -> Result<RoleDefinition, RbacError> {
        let _serial = self.locks.acquire(role_id).await;
        self.guard_system_role(principal, role_id).await?;
        self.require(principal, &keys::RBAC_MANAGE).await?;

        if let Some(name) = changes.name.as_mut() {
            Self::validate_name(name)?;
            *name = name.trim().to_string();
        }
        if let Some(permissions) = &changes.permissions {
            self.validate_permissions(permissions)?;
            self.require_grantable(principal, permissions).await?;
        }
        if changes.is_empty() {
            return self
                .store()
                .get_role(principal.organization_id, role_id)
                .await?
                .ok_or(RbacError::RoleNotFound);
        }

        let role = self
            .store()
            .update_role(principal.organization_id, role_id, changes)
            .await?;
        tracing::info!(%role_id, actor = %principal.user_id, "role updated");
        Ok(role)
    }

    pub async fn delete_role(&self, principal: &Principal, role_id: RoleId) -> Result<(), RbacError> {
        let _serial = self.locks.acquire(role_id).await;
        self.guard_system_role(principal, role_id).await?;
        self.require(principal, &keys::RBAC_MANAGE).await?;

        self.store().delete_role(principal.organization_id, role_id).await?;
        tracing::info!(%role_id, actor = %principal.user_id, "role deleted");
        Ok(())
    }

    /// Replace the role's permission set with exactly `permissions` (deduplicated).
    pub async fn assign_permissions(
        &self,
        principal: &Principal,
        role_id: RoleId,
        permissions: Vec<Permission>,
    ) -> Result<RoleDefinition, RbacError> {
        let _serial = self.locks.acquire(role_id).await;
        self.guard_system_role(principal, role_id).await?;
        self.require(principal, &keys::RBAC_MANAGE).await?;
        self.validate_permissions(&permissions)?;
        self.require_grantable(principal, &permissions).await?;

        let role = self
            .store()
            .replace_permissions(principal.organization_id, role_id, permissions)
            .await?;
        tracing::info!(
            %role_id,
            actor = %principal.user_id,
            permissions = role.permissions.len(),
            "role permissions replaced"
        );
        Ok(role)
    }

    /// Grant a role to a user. Holding a system role is membership, not a
    /// mutation of the role, so the system-role guard does not apply. The
    /// actor must hold every permission the role carries.
    pub async fn assign_user(
        &self,
        principal: &Principal,
        role_id: RoleId,
        user_id: UserId,
    ) -> Result<UserRoleAssignment, RbacError> {
        self.require(principal, &keys::RBAC_MANAGE).await?;
        let role = self
            .store()
            .get_role(principal.organization_id, role_id)
            .await?
            .ok_or(RbacError::RoleNotFound)?;
        self.require_grantable(principal, &role.permissions).await?;
        let assignment = self
            .store()
            .assign_user(principal.organization_id, user_id, role_id)
            .await?;
        tracing::info!(%role_id, %user_id, actor = %principal.user_id, "role assigned to user");
        Ok(assignment)
    }

    pub async fn revoke_user(
        &self,
        principal: &Principal,
        role_id: RoleId,
        user_id: UserId,
    ) -> Result<(), RbacError> {
        self.require(principal, &keys::RBAC_MANAGE).await?;
        if self.store().get_role(principal.organization_id, role_id).await?.is_none() {
            return Err(RbacError::RoleNotFound);
        }
        let removed = self
            .store()
            .revoke_user(principal.organization_id, user_id, role_id)
            .await?;
        tracing::info!(%role_id, %user_id, removed, actor = %principal.user_id, "role revoked from user");
        Ok(())
    }

    /// Seed the system roles into an organization. Idempotent; not gated
    /// (called by organization provisioning, before any user holds a role).
    pub async fn seed_system_roles(&self, organization_id: OrganizationId) -> Result<Vec<RoleDefinition>, RbacError> {
        let existing = self.store().list_roles(organization_id).await?;
        let now = Utc::now();
        let mut seeded = Vec::with_capacity(SYSTEM_ROLES.len());

        for template in SYSTEM_ROLES {
            if let Some(role) = existing.iter().find(|r| r.system && r.name == template.name) {
                seeded.push(role.clone());
                continue;
            }
            let role = RoleDefinition::new(
                organization_id,
                template.name,
                Some(template.description.to_string()),
                template.permissions.iter().map(|k| Permission::from_static(*k)).collect(),
                true,
                now,
            );
            seeded.push(self.store().insert_role(role).await?);
        }

        tracing::info!(%organization_id, roles = seeded.len(), "system roles seeded");
        Ok(seeded)
    }

    /// Find a seeded system role by name.
    pub async fn system_role(
        &self,
        organization_id: OrganizationId,
        name: &str,
    ) -> Result<Option<RoleDefinition>, RbacError> {
        Ok(self
            .store()
            .list_roles(organization_id)
            .await?
            .into_iter()
            .find(|r| r.system && r.name == name))
    }
}
