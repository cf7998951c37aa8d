//! # revshare-db: Store Layer for the Revenue-Distribution Engine
//!
//! This crate provides database access for the revenue-distribution and
//! pricing-rule engine. It uses SQLite for storage with sqlx for async
//! operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Revenue Engine Data Flow                           │
//! │                                                                         │
//! │  Application layer (HTTP / UI, outside this repo)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   revshare-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ rules, ledger │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ catalog,      │    │ 001_init.sql │  │   │
//! │  │   │ WAL, bounded  │    │ access, audit │    │ 002_seed.sql │  │   │
//! │  │   │ timeouts      │    │               │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                               │ resolve / compute_split       │   │
//! │  │                               ▼                               │   │
//! │  │                        revshare-core (pure logic)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store error types (including retryable `Unavailable`)
//! - [`repository`] - Repositories (access, catalog, rules, ledger, audit)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use revshare_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/revshare.db")).await?;
//!
//! let grants = db.access().load_grants().await?;
//! let rule = db.rules().create(new_rule, &actor, &grants).await?;
//! let recorded = db.ledger().record(input, &actor).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::access::AccessRepository;
pub use repository::audit::AuditRepository;
pub use repository::catalog::CatalogRepository;
pub use repository::ledger::{LedgerRepository, NewTransaction, TransactionFilter};
pub use repository::rule::RuleRepository;
