use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use nexhire_auth::{AuthzError, RbacError};

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::Unauthenticated => json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "authentication required"),
        AuthzError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
        e @ AuthzError::SystemRoleProtected(_) => {
            json_error(StatusCode::FORBIDDEN, "system_role_protected", e.to_string())
        }
        e @ AuthzError::UnknownPermission(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "unknown_permission", e.to_string())
        }
        AuthzError::Store(e) => store_error(e.to_string()),
    }
}

pub fn rbac_error_to_response(err: RbacError) -> axum::response::Response {
    match err {
        RbacError::Authz(e) => authz_error_to_response(e),
        RbacError::RoleNotFound => json_error(StatusCode::NOT_FOUND, "not_found", "role not found"),
        e @ RbacError::DuplicateName(_) => json_error(StatusCode::CONFLICT, "conflict", e.to_string()),
        RbacError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        RbacError::Store(msg) => store_error(msg),
    }
}

fn store_error(message: String) -> axum::response::Response {
    tracing::error!(error = %message, "role store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "role store unavailable")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr,
{
    raw.parse::<T>()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
