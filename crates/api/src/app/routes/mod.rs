use axum::{routing::get, Router};

pub mod integrations;
pub mod permissions;
pub mod roles;
pub mod system;

/// Router for all authenticated (organization-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/roles", roles::router())
        .nest("/permissions", permissions::router())
        .nest("/integrations", integrations::router())
}
