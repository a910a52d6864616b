use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use nexhire_core::{OrganizationId, RoleId, UserId};

use crate::permissions::grants;
use crate::store::{RoleStore, StoreError};
use crate::{ActorRole, Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("role {0} is a system role and cannot be modified")]
    SystemRoleProtected(RoleId),

    #[error("unknown permission '{0}'")]
    UnknownPermission(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolved permissions of a user inside one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectivePermissions {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub roles: Vec<String>,
    /// Sorted union of every assigned role's permissions.
    pub permissions: Vec<Permission>,
    pub has_wildcard: bool,
}

impl EffectivePermissions {
    pub fn grants(&self, required: &Permission) -> bool {
        grants(&self.permissions, required)
    }
}

/// Tenant-scoped permission resolution and request gates.
///
/// - One logical read per check (point-in-time snapshot of assignments)
/// - Union semantics across all assigned roles; no role priority
/// - Exact string comparison; `"all"` short-circuits
#[derive(Debug, Clone)]
pub struct AuthorizationEngine<S> {
    store: S,
}

impl<S> AuthorizationEngine<S>
where
    S: RoleStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn effective_permissions(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
    ) -> Result<EffectivePermissions, AuthzError> {
        let roles = self.store.roles_for_user(organization_id, user_id).await?;

        let mut union: BTreeSet<Permission> = BTreeSet::new();
        let mut names = Vec::with_capacity(roles.len());
        for role in roles {
            // The store is organization-addressed; re-check so a faulty backend cannot leak grants.
            if role.organization_id != organization_id {
                tracing::warn!(
                    role_id = %role.id,
                    expected = %organization_id,
                    found = %role.organization_id,
                    "ignoring role from foreign organization"
                );
                continue;
            }
            names.push(role.name);
            union.extend(role.permissions);
        }

        let has_wildcard = union.iter().any(Permission::is_wildcard);
        Ok(EffectivePermissions {
            user_id,
            organization_id,
            roles: names,
            permissions: union.into_iter().collect(),
            has_wildcard,
        })
    }

    pub async fn has_permission(
        &self,
        user_id: UserId,
        organization_id: OrganizationId,
        permission: &Permission,
    ) -> Result<bool, AuthzError> {
        let effective = self.effective_permissions(user_id, organization_id).await?;
        Ok(effective.grants(permission))
    }

    /// Gate: fail unless the principal holds `permission` in its organization.
    pub async fn require_permission(
        &self,
        principal: Option<&Principal>,
        permission: &Permission,
    ) -> Result<(), AuthzError> {
        let principal = principal.ok_or(AuthzError::Unauthenticated)?;
        if self
            .has_permission(principal.user_id, principal.organization_id, permission)
            .await?
        {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %principal.user_id,
                organization_id = %principal.organization_id,
                permission = %permission,
                "permission denied"
            );
            Err(AuthzError::Forbidden(format!("missing permission '{permission}'")))
        }
    }

    /// Gate: fail unless the role exists in the principal's organization and
    /// is not a system role. A missing role passes; the caller reports not-found.
    ///
    /// Independent of any permission the actor holds.
    pub async fn prevent_system_role_modification(
        &self,
        organization_id: OrganizationId,
        role_id: RoleId,
    ) -> Result<(), AuthzError> {
        match self.store.get_role(organization_id, role_id).await? {
            Some(role) if role.system => {
                tracing::info!(%role_id, %organization_id, "blocked mutation of system role");
                Err(AuthzError::SystemRoleProtected(role_id))
            }
            _ => Ok(()),
        }
    }
}

/// Gate on the principal's direct role labels (exact match against `allowed`).
pub fn require_role(principal: Option<&Principal>, allowed: &[ActorRole]) -> Result<(), AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthenticated)?;
    if principal.roles.iter().any(|r| allowed.contains(r)) {
        Ok(())
    } else {
        let allowed: Vec<&str> = allowed.iter().map(ActorRole::as_str).collect();
        Err(AuthzError::Forbidden(format!("requires one of roles {allowed:?}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use proptest::prelude::*;

    use super::*;
    use crate::permissions::keys;
    use crate::roles::RoleDefinition;
    use crate::store::InMemoryRoleStore;

    fn perms(keys: &[&'static str]) -> Vec<Permission> {
        keys.iter().map(|k| Permission::from_static(*k)).collect()
    }

    async fn grant(
        store: &InMemoryRoleStore,
        org: OrganizationId,
        user: UserId,
        name: &str,
        keys: &[&'static str],
        system: bool,
    ) -> RoleDefinition {
        let role = store
            .insert_role(RoleDefinition::new(org, name, None, perms(keys), system, Utc::now()))
            .await
            .unwrap();
        store.assign_user(org, user, role.id).await.unwrap();
        role
    }

    #[tokio::test]
    async fn union_across_all_assigned_roles() {
        let store = Arc::new(InMemoryRoleStore::new());
        let engine = AuthorizationEngine::new(store.clone());
        let (org, user) = (OrganizationId::new(), UserId::new());

        grant(&store, org, user, "Viewer", &["rbac:view"], false).await;
        grant(&store, org, user, "Recruiter", &["jobs:view", "jobs:manage"], false).await;

        for p in ["rbac:view", "jobs:view", "jobs:manage"] {
            assert!(engine.has_permission(user, org, &Permission::new(p)).await.unwrap(), "{p}");
        }
        assert!(!engine.has_permission(user, org, &keys::RBAC_MANAGE).await.unwrap());

        let effective = engine.effective_permissions(user, org).await.unwrap();
        assert_eq!(effective.roles.len(), 2);
        assert_eq!(effective.permissions, perms(&["jobs:manage", "jobs:view", "rbac:view"]));
        assert!(!effective.has_wildcard);
    }

    #[tokio::test]
    async fn wildcard_role_grants_any_permission() {
        let store = Arc::new(InMemoryRoleStore::new());
        let engine = AuthorizationEngine::new(store.clone());
        let (org, user) = (OrganizationId::new(), UserId::new());
        grant(&store, org, user, "Owner", &["all"], true).await;

        assert!(engine.has_permission(user, org, &keys::RBAC_MANAGE).await.unwrap());
        assert!(engine.has_permission(user, org, &Permission::new("payroll:approve")).await.unwrap());
        assert!(engine.effective_permissions(user, org).await.unwrap().has_wildcard);
    }

    #[tokio::test]
    async fn grants_never_cross_organizations() {
        let store = Arc::new(InMemoryRoleStore::new());
        let engine = AuthorizationEngine::new(store.clone());
        let (org_a, org_b, user) = (OrganizationId::new(), OrganizationId::new(), UserId::new());

        grant(&store, org_a, user, "Owner", &["all"], true).await;
        grant(&store, org_b, user, "Employee", &["core:view"], true).await;

        let in_b = engine.effective_permissions(user, org_b).await.unwrap();
        assert_eq!(in_b.permissions, perms(&["core:view"]));
        assert!(!engine.has_permission(user, org_b, &keys::RBAC_VIEW).await.unwrap());
        assert!(engine.has_permission(user, org_a, &keys::RBAC_VIEW).await.unwrap());

        // A user with no assignments in an organization holds nothing there.
        let org_c = OrganizationId::new();
        assert!(engine.effective_permissions(user, org_c).await.unwrap().permissions.is_empty());
    }

    #[tokio::test]
    async fn require_permission_distinguishes_unauthenticated_and_forbidden() {
        let store = Arc::new(InMemoryRoleStore::new());
        let engine = AuthorizationEngine::new(store.clone());
        let (org, user) = (OrganizationId::new(), UserId::new());
        grant(&store, org, user, "Viewer", &["rbac:view"], false).await;
        let principal = Principal::new(user, org, vec![]);

        assert_eq!(
            engine.require_permission(None, &keys::RBAC_VIEW).await,
            Err(AuthzError::Unauthenticated)
        );
        assert!(engine.require_permission(Some(&principal), &keys::RBAC_VIEW).await.is_ok());
        assert!(matches!(
            engine.require_permission(Some(&principal), &keys::RBAC_MANAGE).await,
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn system_role_guard_ignores_actor_permissions() {
        let store = Arc::new(InMemoryRoleStore::new());
        let engine = AuthorizationEngine::new(store.clone());
        let (org, user) = (OrganizationId::new(), UserId::new());
        let owner = grant(&store, org, user, "Owner", &["all"], true).await;
        let custom = grant(&store, org, user, "Recruiter", &["jobs:view"], false).await;

        assert_eq!(
            engine.prevent_system_role_modification(org, owner.id).await,
            Err(AuthzError::SystemRoleProtected(owner.id))
        );
        assert!(engine.prevent_system_role_modification(org, custom.id).await.is_ok());
        assert!(engine.prevent_system_role_modification(org, RoleId::new()).await.is_ok());
    }

    #[test]
    fn require_role_matches_labels_exactly() {
        let principal = Principal::new(
            UserId::new(),
            OrganizationId::new(),
            vec![ActorRole::new("hr")],
        );
        assert!(require_role(Some(&principal), &[ActorRole::new("admin"), ActorRole::new("hr")]).is_ok());
        assert!(matches!(
            require_role(Some(&principal), &[ActorRole::new("HR")]),
            Err(AuthzError::Forbidden(_))
        ));
        assert_eq!(require_role(None, &[ActorRole::new("hr")]), Err(AuthzError::Unauthenticated));
    }

    const KEYS: &[&str] = &[
        "all",
        "rbac:view",
        "rbac:manage",
        "jobs:view",
        "jobs:manage",
        "payroll:run",
    ];

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a role set grants `rbac:view` iff the union contains it or the wildcard.
        #[test]
        fn has_permission_iff_union_contains_key_or_wildcard(
            role_sets in prop::collection::vec(
                prop::collection::vec(prop::sample::select(KEYS), 0..4),
                0..4,
            )
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = Arc::new(InMemoryRoleStore::new());
            let engine = AuthorizationEngine::new(store.clone());
            let (org, user) = (OrganizationId::new(), UserId::new());

            let has = rt.block_on(async {
                for (i, set) in role_sets.iter().enumerate() {
                    grant(&store, org, user, &format!("role-{i}"), set, false).await;
                }
                engine.has_permission(user, org, &keys::RBAC_VIEW).await.unwrap()
            });

            let expected = role_sets
                .iter()
                .flatten()
                .any(|k| *k == "rbac:view" || *k == "all");
            prop_assert_eq!(has, expected);
        }
    }
}
