//! Static permission catalog.
//!
//! Every permission a role may reference is declared here, grouped by product
//! namespace and display category. Writes that reference a key outside this
//! list are rejected (`AuthzError::UnknownPermission`).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{AuthzError, Permission};

/// Permission definition (for browsing and validation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub key: &'static str,
    pub product: &'static str,
    pub category: &'static str,
    pub description: &'static str,
}

impl PermissionDefinition {
    pub fn permission(&self) -> Permission {
        Permission::from_static(self.key)
    }
}

const fn def(
    key: &'static str,
    product: &'static str,
    category: &'static str,
    description: &'static str,
) -> PermissionDefinition {
    PermissionDefinition {
        key,
        product,
        category,
        description,
    }
}

static CATALOG: &[PermissionDefinition] = &[
    def("all", "system", "System", "Wildcard: grants every permission"),
    // Access control
    def("rbac:view", "rbac", "Access Control", "View roles and permissions"),
    def("rbac:manage", "rbac", "Access Control", "Create, edit and delete roles; assign permissions"),
    // Integrations
    def("integrations:view", "integrations", "Integrations", "View integration health"),
    def("integrations:manage", "integrations", "Integrations", "Reset integration health metrics"),
    // Core
    def("core:view", "core", "Organization", "View organization profile"),
    def("core:settings", "core", "Organization", "Manage organization settings"),
    def("employees:view", "core", "Employees", "View employee records"),
    def("employees:manage", "core", "Employees", "Create, edit and terminate employees"),
    // Recruiting
    def("jobs:view", "recruiting", "Jobs", "View job postings"),
    def("jobs:manage", "recruiting", "Jobs", "Create, edit and close job postings"),
    def("candidates:view", "recruiting", "Candidates", "View candidates and applications"),
    def("candidates:manage", "recruiting", "Candidates", "Move candidates through the pipeline"),
    // Payroll
    def("payroll:view", "payroll", "Payroll", "View payroll runs and payslips"),
    def("payroll:run", "payroll", "Payroll", "Prepare and execute payroll runs"),
    def("payroll:approve", "payroll", "Payroll", "Approve payroll runs"),
];

/// Read-only view over the static catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionCatalog;

impl PermissionCatalog {
    pub fn all(&self) -> &'static [PermissionDefinition] {
        CATALOG
    }

    pub fn get(&self, key: &str) -> Option<&'static PermissionDefinition> {
        CATALOG.iter().find(|d| d.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Definitions grouped by display category, in catalog order within a group.
    pub fn grouped(&self) -> BTreeMap<&'static str, Vec<&'static PermissionDefinition>> {
        let mut groups: BTreeMap<&'static str, Vec<&'static PermissionDefinition>> = BTreeMap::new();
        for d in CATALOG {
            groups.entry(d.category).or_default().push(d);
        }
        groups
    }

    pub fn for_product(&self, product: &str) -> Vec<&'static PermissionDefinition> {
        CATALOG.iter().filter(|d| d.product == product).collect()
    }

    pub fn products(&self) -> Vec<&'static str> {
        let mut products: Vec<&'static str> = CATALOG.iter().map(|d| d.product).collect();
        products.dedup();
        products
    }

    /// Reject the first permission that is not declared in the catalog.
    pub fn validate<'a, I>(&self, permissions: I) -> Result<(), AuthzError>
    where
        I: IntoIterator<Item = &'a Permission>,
    {
        for p in permissions {
            if !self.contains(p.as_str()) {
                return Err(AuthzError::UnknownPermission(p.as_str().to_string()));
            }
        }
        Ok(())
    }
}
