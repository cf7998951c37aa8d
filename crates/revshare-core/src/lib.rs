//! # revshare-core: Pure Business Logic for the Revenue-Distribution Engine
//!
//! This crate is the heart of the revenue-distribution and pricing-rule
//! engine. It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    revshare Architecture                            │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │        Application Layer (HTTP / dashboards, out of repo)     │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                  │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │             ★ revshare-core (THIS CRATE) ★                    │ │
//! │  │                                                               │ │
//! │  │  ┌────────┐ ┌────────┐ ┌──────────┐ ┌────────┐ ┌──────────┐  │ │
//! │  │  │ money  │ │  tier  │ │  rules   │ │resolver│ │  split   │  │ │
//! │  │  │ Money  │ │ Shares │ │ validity │ │ 4-tier │ │ residual │  │ │
//! │  │  │ cents  │ │  bps   │ │  window  │ │ preced.│ │  exact Σ │  │ │
//! │  │  └────────┘ └────────┘ └──────────┘ └────────┘ └──────────┘  │ │
//! │  │                                                               │ │
//! │  │  NO I/O • NO DATABASE • NO AMBIENT STATE • PURE FUNCTIONS     │ │
//! │  └───────────────────────────────┬───────────────────────────────┘ │
//! │                                  │                                  │
//! │  ┌───────────────────────────────▼───────────────────────────────┐ │
//! │  │               revshare-db (Rule Store + Ledger)               │ │
//! │  │         SQLite queries, migrations, audit trail               │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`tier`] - Closed tier enumeration, per-tier shares and amounts
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`access`] - Role/permission model (`authorize`, built-in roles)
//! - [`types`] - Domain types (Site, Product, RevenueTransaction, audit)
//! - [`rules`] - Distribution rules with scopes and validity windows
//! - [`resolver`] - Picks the single applicable rule for a transaction
//! - [`split`] - Splits gross profit across tiers with an exact-sum invariant
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Actors**: Authorization takes the acting role as a parameter,
//!    never an ambient "current user"
//! 5. **Closed Tier Set**: The tier enumeration is fixed; an unknown tier name
//!    is a validation-time error, not a silent no-op
//!
//! ## Example Usage
//!
//! ```rust
//! use revshare_core::money::Money;
//! use revshare_core::tier::{Share, TierShares};
//! use revshare_core::split::compute_split;
//!
//! let shares = TierShares {
//!     factory: Share::from_bps(3200),
//!     hq: Share::from_bps(300),
//!     regional: Share::from_bps(2500),
//!     branch: Share::from_bps(200),
//!     nationwide: Share::from_bps(200),
//!     local: Share::from_bps(300),
//!     area: Share::from_bps(500),
//!     hospital: Share::from_bps(3000),
//! };
//!
//! let split = compute_split(&shares, Money::from_cents(1_000_000));
//!
//! // Tier amounts always sum back to gross profit exactly
//! assert_eq!(split.amounts.total(), Money::from_cents(1_000_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod money;
pub mod resolver;
pub mod rules;
pub mod split;
pub mod tier;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use revshare_core::Money` instead of
// `use revshare_core::money::Money`

pub use access::{Action, Actor, Permission, Resource, RoleGrants};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use resolver::resolve;
pub use rules::{DistributionRule, NewRule};
pub use split::{compute_split, Split};
pub use tier::{Share, Tier, TierAmounts, TierShares};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// One whole (100%) expressed in basis points.
///
/// ## Why Basis Points?
/// Tier fractions are money-critical. Storing them as integers
/// (3200 = 32.00%) keeps share arithmetic exact and lets serialization
/// round-trip without floating-point drift.
pub const FULL_SHARE_BPS: u32 = 10_000;

/// Maximum quantity accepted on a single revenue transaction.
///
/// ## Business Reason
/// Prevents fat-finger entries (e.g. typing 1000000 instead of 100)
/// from flowing into the ledger. Can be made configurable later.
pub const MAX_QUANTITY: i64 = 1_000_000;

/// Maximum monetary input, in cents (10 billion currency units).
///
/// ## Why a Cap?
/// `MAX_CENTS × MAX_QUANTITY` is 10^18, inside i64 range (~9.2 × 10^18),
/// so every derived total (`quantity × unit price`, revenue − cost) is
/// computable with plain integer arithmetic. Input validation enforces
/// the cap before any total is formed.
pub const MAX_CENTS: i64 = 1_000_000_000_000;
