use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use nexhire_api::app::AppServices;
use nexhire_auth::{ActorRole, SessionClaims};
use nexhire_core::{OrganizationId, UserId};
use nexhire_integrations::HealthConfig;
use reqwest::StatusCode;
use serde_json::json;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    services: Arc<AppServices>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        let services = Arc::new(AppServices::new(HealthConfig::default(), Duration::from_secs(2)));

        // Same router as prod, bound to an ephemeral port.
        let app = nexhire_api::app::build_app(services.clone(), JWT_SECRET);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            services,
            client: reqwest::Client::new(),
            handle,
        }
    }

    /// Provision a fresh organization and return it with an Owner token.
    async fn organization(&self) -> (OrganizationId, String) {
        let (org, owner) = (OrganizationId::new(), UserId::new());
        self.services.provision_organization(org, owner).await.unwrap();
        (org, mint_jwt(org, owner, vec![ActorRole::new("owner")]))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn post(&self, token: &str, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn patch(&self, token: &str, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .patch(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, token: &str, path: &str) -> reqwest::Response {
        self.client.delete(self.url(path)).bearer_auth(token).send().await.unwrap()
    }

    async fn role_id(&self, token: &str, name: &str) -> String {
        let body: serde_json::Value = self.get(token, "/roles").await.json().await.unwrap();
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .find(|r| r["name"] == name)
            .unwrap_or_else(|| panic!("role {name} not listed"))["id"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(organization_id: OrganizationId, sub: UserId, roles: Vec<ActorRole>) -> String {
    let now = Utc::now();
    let claims = SessionClaims {
        sub,
        organization_id,
        roles,
        iat: now - ChronoDuration::seconds(5),
        exp: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn error_code(res: reqwest::Response) -> String {
    let body: serde_json::Value = res.json().await.unwrap();
    body["error"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(res).await, "unauthenticated");

    let res = srv.get("garbage", "/roles").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn organization_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let (org, token) = srv.organization().await;

    let res = srv.get(&token, "/whoami").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["organization_id"].as_str().unwrap(), org.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "owner"));
}

#[tokio::test]
async fn recruiter_permissions_are_replaced_not_merged() {
    let srv = TestServer::spawn().await;
    let (_org, token) = srv.organization().await;

    let res = srv
        .post(&token, "/roles", json!({ "name": "Recruiter", "permissions": ["jobs:view"] }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    assert_eq!(created["system"], false);
    let id = created["id"].as_str().unwrap().to_string();

    let res = srv
        .post(
            &token,
            &format!("/roles/{id}/permissions"),
            json!({ "permissions": ["jobs:view", "jobs:manage", "jobs:view"] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let role: serde_json::Value = res.json().await.unwrap();
    assert_eq!(role["permissions"], json!(["jobs:view", "jobs:manage"]));

    let res = srv.get(&token, &format!("/roles/{id}")).await;
    let role: serde_json::Value = res.json().await.unwrap();
    assert_eq!(role["permissions"], json!(["jobs:view", "jobs:manage"]));

    let res = srv
        .post(&token, "/roles", json!({ "name": "recruiter ", "permissions": [] }))
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = srv.delete(&token, &format!("/roles/{id}")).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = srv.get(&token, &format!("/roles/{id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn system_roles_reject_every_mutation_even_for_the_owner() {
    let srv = TestServer::spawn().await;
    let (_org, token) = srv.organization().await;
    let owner_role = srv.role_id(&token, "Owner").await;

    let res = srv
        .patch(&token, &format!("/roles/{owner_role}"), json!({ "name": "Boss" }))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(res).await, "system_role_protected");

    let res = srv
        .post(
            &token,
            &format!("/roles/{owner_role}/permissions"),
            json!({ "permissions": ["core:view"] }),
        )
        .await;
    assert_eq!(error_code(res).await, "system_role_protected");

    let res = srv.delete(&token, &format!("/roles/{owner_role}")).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(res).await, "system_role_protected");

    let res = srv.get(&token, &format!("/roles/{owner_role}")).await;
    let role: serde_json::Value = res.json().await.unwrap();
    assert_eq!(role["name"], "Owner");
    assert_eq!(role["permissions"], json!(["all"]));
}

#[tokio::test]
async fn unknown_permissions_are_rejected() {
    let srv = TestServer::spawn().await;
    let (_org, token) = srv.organization().await;

    let res = srv
        .post(&token, "/roles", json!({ "name": "Pilot", "permissions": ["jobs:view", "jobs:fly"] }))
        .await;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_code(res).await, "unknown_permission");
}

#[tokio::test]
async fn employees_can_read_their_permissions_but_not_manage_roles() {
    let srv = TestServer::spawn().await;
    let (org, owner_token) = srv.organization().await;
    let employee_role = srv.role_id(&owner_token, "Employee").await;

    let employee = UserId::new();
    let res = srv
        .post(
            &owner_token,
            &format!("/roles/{employee_role}/users"),
            json!({ "user_id": employee.to_string() }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let token = mint_jwt(org, employee, vec![ActorRole::new("employee")]);
    let res = srv.get(&token, "/permissions/me").await;
    assert_eq!(res.status(), StatusCode::OK);
    let me: serde_json::Value = res.json().await.unwrap();
    assert_eq!(me["permissions"], json!(["core:view", "payroll:view"]));
    assert_eq!(me["has_wildcard"], false);

    let res = srv.get(&token, "/roles").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(res).await, "forbidden");

    let res = srv.get(&token, "/permissions").await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Revocation takes effect on the next request.
    let res = srv
        .delete(&owner_token, &format!("/roles/{employee_role}/users/{employee}"))
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let me: serde_json::Value = srv.get(&token, "/permissions/me").await.json().await.unwrap();
    assert_eq!(me["permissions"], json!([]));
}

#[tokio::test]
async fn organizations_are_isolated() {
    let srv = TestServer::spawn().await;
    let (org_a, token_a) = srv.organization().await;
    let (_org_b, token_b) = srv.organization().await;

    let res = srv
        .post(&token_a, "/roles", json!({ "name": "Recruiter", "permissions": ["jobs:view"] }))
        .await;
    let id = res.json::<serde_json::Value>().await.unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Org B's owner cannot see or touch org A's role.
    assert_eq!(srv.get(&token_b, &format!("/roles/{id}")).await.status(), StatusCode::NOT_FOUND);
    let res = srv
        .post(&token_b, &format!("/roles/{id}/permissions"), json!({ "permissions": ["jobs:manage"] }))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // A user with no assignment in org A holds nothing there.
    let stranger = mint_jwt(org_a, UserId::new(), vec![ActorRole::new("owner")]);
    assert_eq!(srv.get(&stranger, "/roles").await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn catalog_browsing() {
    let srv = TestServer::spawn().await;
    let (_org, token) = srv.organization().await;

    let res = srv.get(&token, "/permissions/grouped").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["groups"]["Access Control"].as_array().unwrap().len() >= 2);

    let res = srv.get(&token, "/permissions/product/payroll").await;
    let body: serde_json::Value = res.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().iter().all(|p| p["product"] == "payroll"));

    let res = srv.get(&token, "/permissions/product/spaceships").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn integration_health_and_operator_resets() {
    let srv = TestServer::spawn().await;
    let (org, token) = srv.organization().await;

    let res = srv
        .post(&token, "/roles", json!({ "name": "Auditor", "permissions": ["rbac:view"] }))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = srv.get(&token, "/integrations/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    let report: serde_json::Value = res.json().await.unwrap();
    assert_eq!(report["status"], "healthy");
    assert_eq!(report["integrations"]["audit"]["succeeded"], 1);
    assert_eq!(report["integrations"]["rbac"]["attempted"], 1);

    let res = srv.get(&token, "/integrations/health/unknown").await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Resets need integrations:manage, which the Employee role lacks.
    let employee_role = srv.role_id(&token, "Employee").await;
    let employee = UserId::new();
    srv.post(
        &token,
        &format!("/roles/{employee_role}/users"),
        json!({ "user_id": employee.to_string() }),
    )
    .await;
    let employee_token = mint_jwt(org, employee, vec![]);
    let res = srv.post(&employee_token, "/integrations/health/audit/reset", json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = srv.post(&employee_token, "/integrations/health/reset-all", json!({})).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = srv.post(&token, "/integrations/health/audit/reset", json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let audit: serde_json::Value = srv.get(&token, "/integrations/health/audit").await.json().await.unwrap();
    assert_eq!(audit["attempted"], 0);
    let rbac: serde_json::Value = srv.get(&token, "/integrations/health/rbac").await.json().await.unwrap();
    assert!(rbac["attempted"].as_u64().unwrap() >= 1);

    let res = srv.post(&token, "/integrations/health/reset-all", json!({})).await;
    assert_eq!(res.status(), StatusCode::OK);
    let rbac: serde_json::Value = srv.get(&token, "/integrations/health/rbac").await.json().await.unwrap();
    assert_eq!(rbac["attempted"], 0);
}
