//! # Access Module
//!
//! The role/permission model gating rule and price mutations.
//!
//! ## How Authorization Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Authorization Flow                               │
//! │                                                                     │
//! │  Identity service supplies the acting user's role (out of scope)    │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  Actor { user_id, role } ← explicit parameter, NEVER ambient state  │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  RoleGrants::authorize(role, resource, action) ← THIS MODULE        │
//! │       │                                                             │
//! │       ├── role unknown?        → false (uniform "forbidden")        │
//! │       ├── no matching grant?   → false                              │
//! │       └── grant found          → true                               │
//! │                                                                     │
//! │  Pure query: no side effects, no exceptions, never aborts caller    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No wildcard matching - a permission names exactly one (resource, action)
//! pair, and a role with no linked permissions is authorized for nothing.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

// =============================================================================
// Resource & Action
// =============================================================================

/// A protected resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Products,
    Sites,
    Users,
    Settings,
    Transactions,
}

impl Resource {
    pub const fn name(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Sites => "sites",
            Resource::Users => "users",
            Resource::Settings => "settings",
            Resource::Transactions => "transactions",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An action on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    Update,
    /// Editing monetary fields on a product (stricter than plain Update).
    PriceUpdate,
    /// Managing distribution rules.
    Distribution,
}

impl Action {
    pub const fn name(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::PriceUpdate => "price_update",
            Action::Distribution => "distribution",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Permission
// =============================================================================

/// A named permission: exactly one (resource, action) pair.
///
/// The set is closed; the stable names below are what the `permissions`
/// table seeds and what audit readers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ProductCreate,
    ProductRead,
    ProductUpdate,
    PriceUpdate,
    SiteCreate,
    SiteRead,
    SiteUpdate,
    UserRead,
    UserUpdate,
    SettingsDistribution,
    TransactionCreate,
    TransactionRead,
}

impl Permission {
    /// Every permission, for seeding and iteration.
    pub const ALL: [Permission; 12] = [
        Permission::ProductCreate,
        Permission::ProductRead,
        Permission::ProductUpdate,
        Permission::PriceUpdate,
        Permission::SiteCreate,
        Permission::SiteRead,
        Permission::SiteUpdate,
        Permission::UserRead,
        Permission::UserUpdate,
        Permission::SettingsDistribution,
        Permission::TransactionCreate,
        Permission::TransactionRead,
    ];

    /// Stable unique name, as stored in the `permissions` table.
    pub const fn name(&self) -> &'static str {
        match self {
            Permission::ProductCreate => "product_create",
            Permission::ProductRead => "product_read",
            Permission::ProductUpdate => "product_update",
            Permission::PriceUpdate => "price_update",
            Permission::SiteCreate => "site_create",
            Permission::SiteRead => "site_read",
            Permission::SiteUpdate => "site_update",
            Permission::UserRead => "user_read",
            Permission::UserUpdate => "user_update",
            Permission::SettingsDistribution => "settings_distribution",
            Permission::TransactionCreate => "transaction_create",
            Permission::TransactionRead => "transaction_read",
        }
    }

    /// The resource this permission protects.
    pub const fn resource(&self) -> Resource {
        match self {
            Permission::ProductCreate | Permission::ProductRead | Permission::ProductUpdate => {
                Resource::Products
            }
            Permission::PriceUpdate => Resource::Products,
            Permission::SiteCreate | Permission::SiteRead | Permission::SiteUpdate => {
                Resource::Sites
            }
            Permission::UserRead | Permission::UserUpdate => Resource::Users,
            Permission::SettingsDistribution => Resource::Settings,
            Permission::TransactionCreate | Permission::TransactionRead => Resource::Transactions,
        }
    }

    /// The action this permission allows.
    pub const fn action(&self) -> Action {
        match self {
            Permission::ProductCreate | Permission::SiteCreate | Permission::TransactionCreate => {
                Action::Create
            }
            Permission::ProductRead
            | Permission::SiteRead
            | Permission::UserRead
            | Permission::TransactionRead => Action::Read,
            Permission::ProductUpdate | Permission::SiteUpdate | Permission::UserUpdate => {
                Action::Update
            }
            Permission::PriceUpdate => Action::PriceUpdate,
            Permission::SettingsDistribution => Action::Distribution,
        }
    }

    /// Looks a permission up by its stable name (used when loading the
    /// role/permission tables). Unknown names return `None` so a stale
    /// row can be skipped with a warning instead of corrupting the model.
    pub fn from_name(name: &str) -> Option<Permission> {
        Permission::ALL.iter().copied().find(|p| p.name() == name)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Actor
// =============================================================================

/// The acting user for a mutating call: identity plus role.
///
/// Supplied explicitly on every authorization-checked operation - the
/// engine never consults ambient session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

// =============================================================================
// Role Grants
// =============================================================================

/// The role → permissions mapping.
///
/// Built either from [`RoleGrants::builtin`] (the seeded defaults) or by
/// loading the `roles`/`permissions`/`role_permissions` tables.
///
/// ## Failure Mode
/// An unknown role is simply unauthorized for everything. `authorize`
/// returns a boolean so calling code can produce a uniform "forbidden"
/// response - it never panics or errors.
#[derive(Debug, Clone, Default)]
pub struct RoleGrants {
    grants: HashMap<String, HashSet<Permission>>,
}

impl RoleGrants {
    /// An empty mapping (no role can do anything).
    pub fn new() -> Self {
        RoleGrants::default()
    }

    /// The built-in role set seeded at initialization.
    ///
    /// ## Roles
    /// - `hq_admin`          - every permission
    /// - `regional_manager`  - catalog reads, site updates, transactions,
    ///                         price edits
    /// - `branch_operator`   - catalog reads, transaction recording
    /// - `site_coordinator`  - catalog and transaction reads
    /// - `viewer`            - catalog reads only
    pub fn builtin() -> Self {
        let mut grants = RoleGrants::new();

        for permission in Permission::ALL {
            grants.grant("hq_admin", permission);
        }

        for permission in [
            Permission::ProductRead,
            Permission::SiteRead,
            Permission::SiteUpdate,
            Permission::TransactionCreate,
            Permission::TransactionRead,
            Permission::PriceUpdate,
        ] {
            grants.grant("regional_manager", permission);
        }

        for permission in [
            Permission::ProductRead,
            Permission::SiteRead,
            Permission::TransactionCreate,
            Permission::TransactionRead,
        ] {
            grants.grant("branch_operator", permission);
        }

        for permission in [
            Permission::ProductRead,
            Permission::SiteRead,
            Permission::TransactionRead,
        ] {
            grants.grant("site_coordinator", permission);
        }

        for permission in [Permission::ProductRead, Permission::SiteRead] {
            grants.grant("viewer", permission);
        }

        grants
    }

    /// Links a permission to a role. Idempotent.
    pub fn grant(&mut self, role: &str, permission: Permission) {
        self.grants
            .entry(role.to_string())
            .or_default()
            .insert(permission);
    }

    /// Answers "can role R perform action A on resource X".
    ///
    /// Exact (resource, action) matching over the role's linked
    /// permissions; unknown roles are unauthorized.
    pub fn authorize(&self, role: &str, resource: Resource, action: Action) -> bool {
        match self.grants.get(role) {
            Some(permissions) => permissions
                .iter()
                .any(|p| p.resource() == resource && p.action() == action),
            None => false,
        }
    }

    /// Checks a named permission directly.
    pub fn is_granted(&self, role: &str, permission: Permission) -> bool {
        self.grants
            .get(role)
            .map(|permissions| permissions.contains(&permission))
            .unwrap_or(false)
    }

    /// Role names present in the mapping.
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.grants.keys().map(String::as_str)
    }

    /// Permissions linked to a role (empty for unknown roles).
    pub fn permissions_for(&self, role: &str) -> Vec<Permission> {
        self.grants
            .get(role)
            .map(|permissions| {
                let mut list: Vec<Permission> = permissions.iter().copied().collect();
                list.sort_by_key(|p| p.name());
                list
            })
            .unwrap_or_default()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_names_are_unique() {
        let mut names: Vec<&str> = Permission::ALL.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Permission::ALL.len());
    }

    #[test]
    fn test_permission_from_name() {
        assert_eq!(Permission::from_name("price_update"), Some(Permission::PriceUpdate));
        assert_eq!(
            Permission::from_name("settings_distribution"),
            Some(Permission::SettingsDistribution)
        );
        assert_eq!(Permission::from_name("launch_missiles"), None);
    }

    #[test]
    fn test_authorize_exact_pair() {
        let grants = RoleGrants::builtin();

        assert!(grants.authorize("hq_admin", Resource::Products, Action::PriceUpdate));
        assert!(grants.authorize("hq_admin", Resource::Settings, Action::Distribution));
        assert!(grants.authorize("regional_manager", Resource::Products, Action::PriceUpdate));

        // No wildcard matching: branch_operator may create transactions
        // but not touch prices or rules
        assert!(grants.authorize("branch_operator", Resource::Transactions, Action::Create));
        assert!(!grants.authorize("branch_operator", Resource::Products, Action::PriceUpdate));
        assert!(!grants.authorize("branch_operator", Resource::Settings, Action::Distribution));
    }

    #[test]
    fn test_unknown_role_is_unauthorized() {
        let grants = RoleGrants::builtin();
        assert!(!grants.authorize("intruder", Resource::Products, Action::Read));
        assert!(!grants.is_granted("intruder", Permission::ProductRead));
        assert!(grants.permissions_for("intruder").is_empty());
    }

    #[test]
    fn test_role_with_no_grants_is_authorized_for_nothing() {
        let mut grants = RoleGrants::new();
        grants.grants.insert("empty_role".to_string(), HashSet::new());
        assert!(!grants.authorize("empty_role", Resource::Products, Action::Read));
    }

    #[test]
    fn test_only_hq_admin_manages_rules_by_default() {
        let grants = RoleGrants::builtin();
        let can_manage: Vec<&str> = grants
            .roles()
            .filter(|role| grants.is_granted(role, Permission::SettingsDistribution))
            .collect();
        assert_eq!(can_manage, vec!["hq_admin"]);
    }
}
