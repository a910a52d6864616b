use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use nexhire_auth::{NewRole, Principal, RoleChanges};
use nexhire_core::{RoleId, UserId};
use nexhire_events::names;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).patch(update_role).delete(delete_role))
        .route("/:id/permissions", post(assign_permissions))
        .route("/:id/users", post(assign_user))
        .route("/:id/users/:user_id", delete(revoke_user))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services.roles.list_roles(&principal).await {
        Ok(roles) => {
            let items = roles.iter().map(dto::role_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.roles.get_role(&principal, role_id).await {
        Ok(role) => (StatusCode::OK, Json(dto::role_to_json(&role))).into_response(),
        Err(e) => errors::rbac_error_to_response(e),
    }
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<dto::CreateRoleRequest>,
) -> axum::response::Response {
    let input = NewRole {
        name: body.name,
        description: body.description,
        permissions: body.permissions,
    };
    let role = match services.roles.create_role(&principal, input).await {
        Ok(role) => role,
        Err(e) => return errors::rbac_error_to_response(e),
    };

    services
        .publish(names::RBAC_ROLE_CREATED, dto::role_event_payload(&role, &principal))
        .await;

    (StatusCode::CREATED, Json(dto::role_to_json(&role))).into_response()
}

pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<RoleChanges>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role = match services.roles.update_role(&principal, role_id, body).await {
        Ok(role) => role,
        Err(e) => return errors::rbac_error_to_response(e),
    };

    services
        .publish(names::RBAC_ROLE_UPDATED, dto::role_event_payload(&role, &principal))
        .await;

    (StatusCode::OK, Json(dto::role_to_json(&role))).into_response()
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(e) = services.roles.delete_role(&principal, role_id).await {
        return errors::rbac_error_to_response(e);
    }

    services
        .publish(
            names::RBAC_ROLE_DELETED,
            serde_json::json!({
                "organization_id": principal.organization_id.to_string(),
                "role_id": role_id.to_string(),
                "actor_id": principal.user_id.to_string(),
            }),
        )
        .await;

    StatusCode::NO_CONTENT.into_response()
}

/// POST /roles/:id/permissions - replace the role's permission set.
pub async fn assign_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignPermissionsRequest>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let role = match services
        .roles
        .assign_permissions(&principal, role_id, body.permissions)
        .await
    {
        Ok(role) => role,
        Err(e) => return errors::rbac_error_to_response(e),
    };

    services
        .publish(
            names::RBAC_ROLE_PERMISSIONS_ASSIGNED,
            dto::role_event_payload(&role, &principal),
        )
        .await;

    (StatusCode::OK, Json(dto::role_to_json(&role))).into_response()
}

pub async fn assign_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignUserRequest>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let user_id: UserId = match errors::parse_id(&body.user_id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let assignment = match services.roles.assign_user(&principal, role_id, user_id).await {
        Ok(a) => a,
        Err(e) => return errors::rbac_error_to_response(e),
    };

    services
        .publish(
            names::RBAC_USER_ROLE_ASSIGNED,
            serde_json::json!({
                "organization_id": assignment.organization_id.to_string(),
                "role_id": role_id.to_string(),
                "user_id": user_id.to_string(),
                "actor_id": principal.user_id.to_string(),
            }),
        )
        .await;

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "role_id": role_id.to_string(),
            "user_id": user_id.to_string(),
            "assigned_at": assignment.assigned_at,
        })),
    )
        .into_response()
}

pub async fn revoke_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path((id, user_id)): Path<(String, String)>,
) -> axum::response::Response {
    let role_id: RoleId = match errors::parse_id(&id, "role") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let user_id: UserId = match errors::parse_id(&user_id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if let Err(e) = services.roles.revoke_user(&principal, role_id, user_id).await {
        return errors::rbac_error_to_response(e);
    }

    services
        .publish(
            names::RBAC_USER_ROLE_REVOKED,
            serde_json::json!({
                "organization_id": principal.organization_id.to_string(),
                "role_id": role_id.to_string(),
                "user_id": user_id.to_string(),
                "actor_id": principal.user_id.to_string(),
            }),
        )
        .await;

    StatusCode::NO_CONTENT.into_response()
}
