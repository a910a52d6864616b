use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use nexhire_auth::{Principal, keys};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health_report))
        .route("/health/reset-all", post(reset_all))
        .route("/health/:name", get(integration_health))
        .route("/health/:name/reset", post(reset_integration))
}

async fn require_manage(services: &AppServices, principal: &Principal) -> Result<(), axum::response::Response> {
    services
        .roles
        .engine()
        .require_permission(Some(principal), &keys::INTEGRATIONS_MANAGE)
        .await
        .map_err(errors::authz_error_to_response)
}

pub async fn health_report(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    (StatusCode::OK, Json(services.monitor.get_health())).into_response()
}

pub async fn integration_health(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    match services.monitor.get_integration_health(&name) {
        Some(health) => (StatusCode::OK, Json(health)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("integration '{name}' is not tracked")),
    }
}

pub async fn reset_integration(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(name): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require_manage(&services, &principal).await {
        return resp;
    }
    if !services.monitor.reset_metrics(&name) {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("integration '{name}' is not tracked"));
    }
    tracing::info!(integration = %name, actor = %principal.user_id, "integration metrics reset by operator");
    (StatusCode::OK, Json(serde_json::json!({ "reset": [name] }))).into_response()
}

pub async fn reset_all(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
) -> axum::response::Response {
    if let Err(resp) = require_manage(&services, &principal).await {
        return resp;
    }
    services.monitor.reset_all();
    tracing::info!(actor = %principal.user_id, "all integration metrics reset by operator");
    (
        StatusCode::OK,
        Json(serde_json::json!({ "reset": services.monitor.integrations() })),
    )
        .into_response()
}
