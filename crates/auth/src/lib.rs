//! `nexhire-auth`: tenant-scoped authorization core.
//!
//! Permission catalog, role storage seam, the authorization engine and the
//! role administration service. Decoupled from HTTP; authentication happens
//! upstream and arrives here as a [`Principal`].

pub mod authorize;
pub mod catalog;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod service;
pub mod store;

pub use authorize::{AuthorizationEngine, AuthzError, EffectivePermissions, require_role};
pub use catalog::{PermissionCatalog, PermissionDefinition};
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use permissions::{Permission, WILDCARD, grants, keys};
pub use principal::{ActorRole, Principal};
pub use roles::{RoleChanges, RoleDefinition, SYSTEM_ROLES, UserRoleAssignment};
pub use service::{NewRole, RbacError, RoleService};
pub use store::{InMemoryRoleStore, RoleStore, StoreError};
