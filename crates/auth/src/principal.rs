use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use nexhire_core::{OrganizationId, UserId};

/// Direct role label carried by the authenticated principal (e.g. `"owner"`,
/// `"admin"`, `"employee"`).
///
/// These labels come from the session, not from the role store, and are only
/// used by coarse `require_role` gates for simple actor classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorRole(Cow<'static, str>);

impl ActorRole {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An already-authenticated actor acting within exactly one organization.
///
/// Construction is decoupled from transport: the API derives it from token
/// claims, workers can build it from a service identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub organization_id: OrganizationId,
    pub roles: Vec<ActorRole>,
}

impl Principal {
    pub fn new(user_id: UserId, organization_id: OrganizationId, roles: Vec<ActorRole>) -> Self {
        Self {
            user_id,
            organization_id,
            roles,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.as_str() == role)
    }
}
