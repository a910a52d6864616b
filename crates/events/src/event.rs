use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A transient cross-module notification.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **not persisted** (delivery is in-process only)
/// - named `"<domain>.<entity>.<verb>"`; the name is the producer/consumer contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,
    payload: serde_json::Value,
    occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            occurred_at: Utc::now(),
        }
    }

    /// Build an event from any serializable payload.
    pub fn from_serializable<T: Serialize>(name: impl Into<String>, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(name, serde_json::to_value(payload)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Decode the payload into a typed view.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Well-known event names shared between product modules.
///
/// Renaming any of these is a breaking change for every subscriber.
pub mod names {
    pub const EMPLOYEE_CREATED: &str = "employee.created";
    pub const EMPLOYEE_TERMINATED: &str = "employee.terminated";
    pub const PAYROLL_RUN_COMPLETED: &str = "payroll.run.completed";

    pub const RBAC_ROLE_CREATED: &str = "rbac.role.created";
    pub const RBAC_ROLE_UPDATED: &str = "rbac.role.updated";
    pub const RBAC_ROLE_DELETED: &str = "rbac.role.deleted";
    pub const RBAC_ROLE_PERMISSIONS_ASSIGNED: &str = "rbac.role.permissions_assigned";
    pub const RBAC_USER_ROLE_ASSIGNED: &str = "rbac.user_role.assigned";
    pub const RBAC_USER_ROLE_REVOKED: &str = "rbac.user_role.revoked";
}
