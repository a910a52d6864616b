use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use nexhire_auth::{Principal, keys};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_permissions))
        .route("/grouped", get(grouped_permissions))
        .route("/product/:product", get(product_permissions))
        .route("/me", get(my_permissions))
}

// Catalog browsing is gated on `rbac:view` like the roles it feeds.
async fn require_view(services: &AppServices, principal: &Principal) -> Result<(), axum::response::Response> {
    services
        .roles
        .engine()
        .require_permission(Some(principal), &keys::RBAC_VIEW)
        .await
        .map_err(errors::authz_error_to_response)
}

pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    if let Err(resp) = require_view(&services, &principal).await {
        return resp;
    }
    let items = services.roles.catalog().all();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn grouped_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    if let Err(resp) = require_view(&services, &principal).await {
        return resp;
    }
    let groups = services.roles.catalog().grouped();
    (StatusCode::OK, Json(serde_json::json!({ "groups": groups }))).into_response()
}

pub async fn product_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(product): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require_view(&services, &principal).await {
        return resp;
    }
    let items = services.roles.catalog().for_product(&product);
    if items.is_empty() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("unknown product '{product}'"));
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({ "product": product, "items": items })),
    )
        .into_response()
}

/// GET /permissions/me - the caller's resolved permissions (any authenticated user).
pub async fn my_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    match services
        .roles
        .engine()
        .effective_permissions(principal.user_id, principal.organization_id)
        .await
    {
        Ok(effective) => (StatusCode::OK, Json(effective)).into_response(),
        Err(e) => errors::authz_error_to_response(e),
    }
}
