use serde::Deserialize;

use nexhire_auth::{Permission, Principal, RoleDefinition};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct AssignPermissionsRequest {
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Deserialize)]
pub struct AssignUserRequest {
    pub user_id: String,
}

// -------------------------
// Response mapping
// -------------------------

pub fn role_to_json(role: &RoleDefinition) -> serde_json::Value {
    serde_json::json!({
        "id": role.id.to_string(),
        "name": role.name,
        "description": role.description,
        "permissions": role.permissions,
        "system": role.system,
        "created_at": role.created_at,
        "updated_at": role.updated_at,
    })
}

/// Payload carried by every `rbac.role.*` event.
pub fn role_event_payload(role: &RoleDefinition, actor: &Principal) -> serde_json::Value {
    serde_json::json!({
        "organization_id": role.organization_id.to_string(),
        "role_id": role.id.to_string(),
        "name": role.name,
        "permissions": role.permissions,
        "actor_id": actor.user_id.to_string(),
    })
}
