//! # Repository Layer
//!
//! Database access organized by domain area.
//!
//! ## Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Repository Pattern                                 │
//! │                                                                         │
//! │  Application code                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Repository (this layer)                                               │
//! │  ├── Owns SQL and row ↔ domain mapping                                 │
//! │  ├── Enforces authorization on mutations (explicit Actor + grants)     │
//! │  ├── Bundles data + audit writes into single transactions              │
//! │  └── Delegates business decisions to revshare-core                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqlitePool                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Mutating methods take the acting user and the role grants explicitly;
//! repositories never consult ambient session state.

use revshare_core::access::{Actor, Permission};
use revshare_core::error::CoreError;

use crate::error::DbError;

pub mod access;
pub mod audit;
pub mod catalog;
pub mod ledger;
pub mod rule;

/// Uniform "forbidden" error for a denied mutation. Unknown roles get
/// the same response as known roles lacking the permission.
pub(crate) fn unauthorized(actor: &Actor, permission: Permission) -> DbError {
    DbError::Domain(CoreError::Unauthorized {
        role: actor.role.clone(),
        permission: permission.name().to_string(),
    })
}
