use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// The reserved wildcard permission. A permission set containing it grants
/// every permission.
pub const WILDCARD: &str = "all";

/// Permission identifier.
///
/// Permissions are opaque `"<product>:<action>"` strings (e.g. `"rbac:view"`)
/// compared by exact equality. The literal `"all"` is the universal wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == WILDCARD
    }

    /// Product namespace (the part before `:`), or `None` for the wildcard and
    /// malformed keys.
    pub fn product(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(product, _)| product)
    }

    pub fn action(&self) -> Option<&str> {
        self.as_str().split_once(':').map(|(_, action)| action)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Well-known permission keys referenced from code.
pub mod keys {
    use super::Permission;

    pub const ALL: Permission = Permission::from_static(super::WILDCARD);

    pub const RBAC_VIEW: Permission = Permission::from_static("rbac:view");
    pub const RBAC_MANAGE: Permission = Permission::from_static("rbac:manage");

    pub const INTEGRATIONS_VIEW: Permission = Permission::from_static("integrations:view");
    pub const INTEGRATIONS_MANAGE: Permission = Permission::from_static("integrations:manage");
}

/// Canonical grant check: does `granted` satisfy `required`?
///
/// The wildcard always short-circuits. Every gate in the crate goes through
/// this function so there is exactly one definition of "holds a permission".
pub fn grants<'a, I>(granted: I, required: &Permission) -> bool
where
    I: IntoIterator<Item = &'a Permission>,
{
    granted
        .into_iter()
        .any(|p| p.is_wildcard() || p.as_str() == required.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_product_and_action() {
        let p = Permission::new("payroll:run");
        assert_eq!(p.product(), Some("payroll"));
        assert_eq!(p.action(), Some("run"));
        assert_eq!(keys::ALL.product(), None);
    }

    #[test]
    fn grants_is_exact_not_prefix() {
        let granted = vec![Permission::new("rbac:manage")];
        assert!(!grants(&granted, &keys::RBAC_VIEW));
        assert!(!grants(&granted, &Permission::new("rbac:man")));
        assert!(!grants(&granted, &Permission::new("rbac")));
        assert!(grants(&granted, &keys::RBAC_MANAGE));
    }

    #[test]
    fn wildcard_grants_everything() {
        let granted = vec![keys::ALL];
        assert!(grants(&granted, &keys::RBAC_MANAGE));
        assert!(grants(&granted, &Permission::new("anything:at-all")));
    }

    #[test]
    fn empty_set_grants_nothing() {
        let granted: Vec<Permission> = Vec::new();
        assert!(!grants(&granted, &keys::RBAC_VIEW));
    }
}
