//! Tenant-scoped role / assignment persistence.
//!
//! The relational implementation lives with the schema (outside this crate);
//! `InMemoryRoleStore` backs tests and single-process deployments.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use thiserror::Error;

use nexhire_core::{OrganizationId, RoleId, UserId};

use crate::roles::{RoleChanges, RoleDefinition, UserRoleAssignment, dedup_permissions};
use crate::Permission;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("role not found")]
    RoleNotFound,

    #[error("role name '{0}' already exists in this organization")]
    DuplicateName(String),

    #[error("role store unavailable: {0}")]
    Unavailable(String),
}

/// Role / assignment storage, always addressed by organization.
///
/// Every write is all-or-nothing: readers observe either the previous or the
/// next full role, never a partially-applied permission set.
#[async_trait::async_trait]
pub trait RoleStore: Send + Sync {
    async fn list_roles(&self, organization_id: OrganizationId) -> Result<Vec<RoleDefinition>, StoreError>;

    async fn get_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> Result<Option<RoleDefinition>, StoreError>;

    async fn insert_role(&self, role: RoleDefinition) -> Result<RoleDefinition, StoreError>;

    async fn update_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> Result<RoleDefinition, StoreError>;

    /// Replace the whole permission set of a role in one write.
    async fn replace_permissions(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permissions: Vec<Permission>,
    ) -> Result<RoleDefinition, StoreError>;

    /// Delete a role together with its user assignments.
    async fn delete_role(&self, organization_id: OrganizationId, role_id: RoleId) -> Result<(), StoreError>;

    async fn assign_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<UserRoleAssignment, StoreError>;

    /// Returns whether an assignment was removed.
    async fn revoke_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, StoreError>;

    /// All roles assigned to `user_id` inside `organization_id` (point-in-time snapshot).
    async fn roles_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<RoleDefinition>, StoreError>;
}

#[async_trait::async_trait]
impl<S> RoleStore for Arc<S>
where
    S: RoleStore + ?Sized,
{
    async fn list_roles(&self, organization_id: OrganizationId) -> Result<Vec<RoleDefinition>, StoreError> {
        (**self).list_roles(organization_id).await
    }

    async fn get_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> Result<Option<RoleDefinition>, StoreError> {
        (**self).get_role(organization_id, role_id).await
    }

    async fn insert_role(&self, role: RoleDefinition) -> Result<RoleDefinition, StoreError> {
        (**self).insert_role(role).await
    }

    async fn update_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> Result<RoleDefinition, StoreError> {
        (**self).update_role(organization_id, role_id, changes).await
    }

    async fn replace_permissions(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permissions: Vec<Permission>,
    ) -> Result<RoleDefinition, StoreError> {
        (**self).replace_permissions(organization_id, role_id, permissions).await
    }

    async fn delete_role(&self, organization_id: OrganizationId, role_id: RoleId) -> Result<(), StoreError> {
        (**self).delete_role(organization_id, role_id).await
    }

    async fn assign_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<UserRoleAssignment, StoreError> {
        (**self).assign_user(organization_id, user_id, role_id).await
    }

    async fn revoke_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, StoreError> {
        (**self).revoke_user(organization_id, user_id, role_id).await
    }

    async fn roles_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<RoleDefinition>, StoreError> {
        (**self).roles_for_user(organization_id, user_id).await
    }
}

#[derive(Debug, Default)]
struct Tables {
    roles: HashMap<(OrganizationId, RoleId), RoleDefinition>,
    assignments: Vec<UserRoleAssignment>,
}

impl Tables {
    fn name_taken(&self, organization_id: OrganizationId, name: &str, except: Option<RoleId>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.roles.values().any(|r| {
            r.organization_id == organization_id
                && Some(r.id) != except
                && r.name.trim().to_lowercase() == wanted
        })
    }
}

/// In-memory, tenant-isolated role store.
///
/// Roles and assignments share one lock so deleting a role and dropping its
/// assignments is a single atomic write.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    inner: RwLock<Tables>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn list_roles(&self, organization_id: OrganizationId) -> Result<Vec<RoleDefinition>, StoreError> {
        let tables = self.read()?;
        let mut roles: Vec<RoleDefinition> = tables
            .roles
            .values()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn get_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> Result<Option<RoleDefinition>, StoreError> {
        Ok(self.read()?.roles.get(&(organization_id, role_id)).cloned())
    }

    async fn insert_role(&self, role: RoleDefinition) -> Result<RoleDefinition, StoreError> {
        let mut tables = self.write()?;
        if tables.name_taken(role.organization_id, &role.name, None) {
            return Err(StoreError::DuplicateName(role.name));
        }
        tables.roles.insert((role.organization_id, role.id), role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        changes: RoleChanges,
    ) -> Result<RoleDefinition, StoreError> {
        let mut tables = self.write()?;
        if let Some(name) = &changes.name {
            if tables.name_taken(organization_id, name, Some(role_id)) {
                return Err(StoreError::DuplicateName(name.clone()));
            }
        }

        let role = tables
            .roles
            .get_mut(&(organization_id, role_id))
            .ok_or(StoreError::RoleNotFound)?;

        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(description) = changes.description {
            role.description = Some(description);
        }
        if let Some(permissions) = changes.permissions {
            role.permissions = dedup_permissions(permissions);
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn replace_permissions(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
        permissions: Vec<Permission>,
    ) -> Result<RoleDefinition, StoreError> {
        let mut tables = self.write()?;
        let role = tables
            .roles
            .get_mut(&(organization_id, role_id))
            .ok_or(StoreError::RoleNotFound)?;
        role.permissions = dedup_permissions(permissions);
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, organization_id: OrganizationId, role_id: RoleId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.roles.remove(&(organization_id, role_id)).is_none() {
            return Err(StoreError::RoleNotFound);
        }
        tables
            .assignments
            .retain(|a| !(a.organization_id == organization_id && a.role_id == role_id));
        Ok(())
    }

    async fn assign_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<UserRoleAssignment, StoreError> {
        let mut tables = self.write()?;
        if !tables.roles.contains_key(&(organization_id, role_id)) {
            return Err(StoreError::RoleNotFound);
        }

        if let Some(existing) = tables.assignments.iter().find(|a| {
            a.organization_id == organization_id && a.user_id == user_id && a.role_id == role_id
        }) {
            return Ok(existing.clone());
        }

        let assignment = UserRoleAssignment {
            organization_id,
            user_id,
            role_id,
            assigned_at: Utc::now(),
        };
        tables.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn revoke_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<bool, StoreError> {
        let mut tables = self.write()?;
        let before = tables.assignments.len();
        tables.assignments.retain(|a| {
            !(a.organization_id == organization_id && a.user_id == user_id && a.role_id == role_id)
        });
        Ok(tables.assignments.len() != before)
    }

    async fn roles_for_user(
        &self,
        organization_id: OrganizationId,
        user_id: UserId,
    ) -> Result<Vec<RoleDefinition>, StoreError> {
        let tables = self.read()?;
        let mut seen: HashSet<RoleId> = HashSet::new();
        Ok(tables
            .assignments
            .iter()
            .filter(|a| a.organization_id == organization_id && a.user_id == user_id)
            .filter(|a| seen.insert(a.role_id))
            // Lookup key carries the organization, so a role from another tenant can never resolve.
            .filter_map(|a| tables.roles.get(&(organization_id, a.role_id)).cloned())
            .collect())
    }
}
