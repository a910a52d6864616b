use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use nexhire_auth::Principal;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<Principal>) -> impl IntoResponse {
    Json(serde_json::json!({
        "organization_id": principal.organization_id.to_string(),
        "user_id": principal.user_id.to_string(),
        "roles": principal.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}
