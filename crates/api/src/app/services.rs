//! Process-wide service wiring: role administration, event bus, health monitor.

use std::sync::Arc;
use std::time::Duration;

use nexhire_auth::{InMemoryRoleStore, RbacError, RoleDefinition, RoleService, RoleStore};
use nexhire_core::{OrganizationId, UserId};
use nexhire_events::{EventBus, SubscriptionHandle};
use nexhire_integrations::{HealthConfig, HealthMonitor, MonitoredPublisher};

use crate::config::ApiConfig;
use crate::modules;

pub type RoleAdmin = RoleService<Arc<InMemoryRoleStore>>;

/// Integration name under which API-originated emissions are tracked.
pub const RBAC_INTEGRATION: &str = "rbac";

pub const OWNER_ROLE: &str = "Owner";

pub struct AppServices {
    pub roles: RoleAdmin,
    pub bus: Arc<EventBus>,
    pub monitor: Arc<HealthMonitor>,
    pub publisher: MonitoredPublisher,
    subscriptions: Vec<SubscriptionHandle>,
}

impl AppServices {
    pub fn new(health: HealthConfig, delivery_timeout: Duration) -> Self {
        let bus = Arc::new(EventBus::new());
        let monitor = Arc::new(HealthMonitor::new(health));
        let subscriptions = modules::register(&bus, &monitor);
        let publisher = MonitoredPublisher::new(bus.clone(), monitor.clone(), delivery_timeout);

        Self {
            roles: RoleService::new(Arc::new(InMemoryRoleStore::new())),
            bus,
            monitor,
            publisher,
            subscriptions,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(config.health, config.delivery_timeout)
    }

    /// Seed the system roles of an organization and make `owner` its Owner.
    ///
    /// Provisioning runs outside any request, so it is not permission-gated.
    pub async fn provision_organization(
        &self,
        organization_id: OrganizationId,
        owner: UserId,
    ) -> Result<Vec<RoleDefinition>, RbacError> {
        let roles = self.roles.seed_system_roles(organization_id).await?;
        let owner_role = roles
            .iter()
            .find(|r| r.name == OWNER_ROLE)
            .ok_or(RbacError::RoleNotFound)?;
        self.roles
            .engine()
            .store()
            .assign_user(organization_id, owner, owner_role.id)
            .await?;
        tracing::info!(%organization_id, %owner, "organization provisioned");
        Ok(roles)
    }

    /// Emit on behalf of the API. Delivery problems are recorded by the
    /// monitor and logged; they never fail the caller's operation.
    pub async fn publish(&self, event_name: &str, payload: serde_json::Value) {
        if let Err(e) = self.publisher.publish(RBAC_INTEGRATION, event_name, payload).await {
            tracing::warn!(event = event_name, error = %e, "event delivery incomplete");
        }
    }

    /// Detach every listener. Called once at shutdown.
    pub fn shutdown(&self) {
        tracing::info!(subscriptions = self.subscriptions.len(), "detaching event listeners");
        self.bus.clear_all();
    }
}
