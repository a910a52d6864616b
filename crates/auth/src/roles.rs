use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nexhire_core::{OrganizationId, RoleId, UserId};

use crate::Permission;

/// A role stored for one organization.
///
/// # Invariants
/// - `organization_id` never changes after creation.
/// - `permissions` holds no duplicates and only catalog keys.
/// - `system` roles are seeded, never created or mutated through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub id: RoleId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
    pub system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleDefinition {
    pub fn new(
        organization_id: OrganizationId,
        name: impl Into<String>,
        description: Option<String>,
        permissions: Vec<Permission>,
        system: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RoleId::new(),
            organization_id,
            name: name.into(),
            description,
            permissions: dedup_permissions(permissions),
            system,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user holding a role within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    pub organization_id: OrganizationId,
    pub user_id: UserId,
    pub role_id: RoleId,
    pub assigned_at: DateTime<Utc>,
}

/// Partial update of a role's descriptive fields and permission set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoleChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permissions: Option<Vec<Permission>>,
}

impl RoleChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.permissions.is_none()
    }
}

/// Order-preserving de-duplication (first occurrence wins).
pub fn dedup_permissions(permissions: Vec<Permission>) -> Vec<Permission> {
    let mut seen: HashSet<Permission> = HashSet::with_capacity(permissions.len());
    permissions
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// System roles seeded into every organization.
pub struct SystemRoleTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub permissions: &'static [&'static str],
}

pub const SYSTEM_ROLES: &[SystemRoleTemplate] = &[
    SystemRoleTemplate {
        name: "Owner",
        description: "Organization owner with every permission",
        permissions: &["all"],
    },
    SystemRoleTemplate {
        name: "Administrator",
        description: "Manages access control and integrations",
        permissions: &[
            "rbac:view",
            "rbac:manage",
            "integrations:view",
            "integrations:manage",
            "core:view",
            "core:settings",
        ],
    },
    SystemRoleTemplate {
        name: "Employee",
        description: "Self-service access for staff",
        permissions: &["core:view", "payroll:view"],
    },
];
