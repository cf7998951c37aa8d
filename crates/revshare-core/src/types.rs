//! # Domain Types
//!
//! Core domain types used throughout the revenue-distribution engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌─────────────────────┐   │
//! │  │    Product    │   │     Site      │   │ RevenueTransaction  │   │
//! │  │ ───────────── │   │ ───────────── │   │ ─────────────────── │   │
//! │  │ id (UUID)     │   │ id (UUID)     │   │ id (UUID)           │   │
//! │  │ code          │   │ code          │   │ kind                │   │
//! │  │ pricing cents │   │ site_type     │   │ totals + breakdown  │   │
//! │  │ cost_total    │   │ contract      │   │ rule_id (applied)   │   │
//! │  └───────────────┘   └───────────────┘   └─────────────────────┘   │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────────┐   ┌────────────────┐    │
//! │  │  SiteProduct  │   │ProductPriceHistory│   │   AuditEntry   │    │
//! │  │  overrides    │   │  append-only      │   │  before/after  │    │
//! │  └───────────────┘   └───────────────────┘   └────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (code, email, ...) - human-readable, potentially mutable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::access::Actor;
use crate::error::ValidationError;
use crate::money::Money;
use crate::tier::TierAmounts;

// =============================================================================
// Site Type / Status / Region
// =============================================================================

/// The kind of site a product is sold through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    CareFacility,
    SeniorCenter,
    Hospital,
    Other,
}

impl SiteType {
    pub const fn name(&self) -> &'static str {
        match self {
            SiteType::CareFacility => "care_facility",
            SiteType::SeniorCenter => "senior_center",
            SiteType::Hospital => "hospital",
            SiteType::Other => "other",
        }
    }
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Site contract status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Active,
    Inactive,
    Suspended,
}

impl Default for SiteStatus {
    fn default() -> Self {
        SiteStatus::Active
    }
}

/// Regional granularity of a distribution rule's scope.
///
/// Ordered broadest-first: a broader region covers every narrower one,
/// so a nationwide rule is a candidate for a branch-level transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    Nationwide,
    Region,
    District,
    Branch,
}

impl RegionType {
    pub const fn name(&self) -> &'static str {
        match self {
            RegionType::Nationwide => "nationwide",
            RegionType::Region => "region",
            RegionType::District => "district",
            RegionType::Branch => "branch",
        }
    }

    /// Breadth rank: 0 is broadest.
    const fn rank(&self) -> u8 {
        match self {
            RegionType::Nationwide => 0,
            RegionType::Region => 1,
            RegionType::District => 2,
            RegionType::Branch => 3,
        }
    }

    /// Whether a rule scoped at `self` applies to a transaction in
    /// `other` (equal granularity, or `self` is broader).
    pub const fn covers(&self, other: RegionType) -> bool {
        self.rank() <= other.rank()
    }
}

impl Default for RegionType {
    fn default() -> Self {
        RegionType::Nationwide
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Role & User
// =============================================================================

/// A built-in role. The set is seeded at initialization and not created
/// dynamically by end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Role {
    pub id: String,
    /// Unique slug, e.g. `hq_admin`.
    pub name: String,
    pub display_name: String,
    pub is_active: bool,
}

/// A user of the surrounding application.
///
/// Authentication is out of scope; the engine only ever sees a user's
/// role via an explicit [`Actor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: String,
    pub email: String,
    /// Role slug; `None` until a role is assigned.
    pub role: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Site
// =============================================================================

/// A customer site (care facility, senior center, hospital, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Site {
    pub id: String,
    /// Unique business code.
    pub code: String,
    pub name: String,
    pub site_type: SiteType,
    pub address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    /// Resident/patient population, if known.
    pub population: Option<i64>,
    pub rooms: Option<i64>,
    pub beds: Option<i64>,
    pub contract_start: Option<NaiveDate>,
    pub contract_end: Option<NaiveDate>,
    pub status: SiteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    /// Validates the contract window: the end date, if present, must not
    /// precede the start date.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.contract_start, self.contract_end) {
            if end < start {
                return Err(ValidationError::DateOrder {
                    field: "contract".to_string(),
                    from: start,
                    to: end,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the supply-chain catalog with its pricing fields.
///
/// ## Invariants
/// - All monetary fields are non-negative
/// - `cost_total_cents` is DERIVED: `cost_qty × cost_unit_cents`,
///   recomputed on every write and never trusted from input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    /// Business product code.
    pub code: String,
    pub name: String,
    /// Units per cost lot.
    pub cost_qty: i64,
    /// Cost per unit, in cents.
    pub cost_unit_cents: i64,
    /// Derived: `cost_qty × cost_unit_cents`.
    pub cost_total_cents: i64,
    /// Price charged to the distribution partner, in cents.
    pub supply_cents: i64,
    /// Price charged to the end customer, in cents.
    pub sale_cents: i64,
    pub deposit_cents: i64,
    pub one_time_fee: bool,
    /// Default distribution rule, if one is pinned to this product.
    pub default_rule_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Recomputes the derived cost total from quantity × unit price.
    pub fn recompute_cost_total(&mut self) {
        self.cost_total_cents = self.cost_qty * self.cost_unit_cents;
    }

    /// Validates monetary invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, cents) in [
            ("cost_unit_price", self.cost_unit_cents),
            ("supply_price", self.supply_cents),
            ("sale_price", self.sale_cents),
            ("deposit", self.deposit_cents),
        ] {
            crate::validation::validate_cents(field, cents)?;
        }
        if self.cost_qty < 0 {
            return Err(ValidationError::MustBePositive {
                field: "cost_qty".to_string(),
            });
        }
        Ok(())
    }

    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_cents)
    }

    #[inline]
    pub fn supply_price(&self) -> Money {
        Money::from_cents(self.supply_cents)
    }

    #[inline]
    pub fn unit_cost(&self) -> Money {
        Money::from_cents(self.cost_unit_cents)
    }
}

// =============================================================================
// Site Product Assignment
// =============================================================================

/// Assignment of a product to a site, with optional per-site price
/// overrides. Unique per (site, product).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SiteProduct {
    pub id: String,
    pub site_id: String,
    pub product_id: String,
    pub default_quantity: i64,
    pub sale_override_cents: Option<i64>,
    pub supply_override_cents: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SiteProduct {
    /// Sale price for this site: the override if set, else the product's.
    pub fn effective_sale_cents(&self, product: &Product) -> i64 {
        self.sale_override_cents.unwrap_or(product.sale_cents)
    }

    /// Supply price for this site: the override if set, else the product's.
    pub fn effective_supply_cents(&self, product: &Product) -> i64 {
        self.supply_override_cents.unwrap_or(product.supply_cents)
    }
}

// =============================================================================
// Revenue Transaction
// =============================================================================

/// Kind of revenue event flowing into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// An actual sale at a site.
    Sale,
    /// A what-if computation; recorded for comparison, carries no revenue.
    Simulation,
    /// A correction. Adjustments are NEW rows - transactions are never
    /// edited in place.
    Adjustment,
}

/// A recorded revenue event with its computed tier breakdown.
///
/// Immutable once created: this is the system of record for reporting.
/// Corrections are recorded as [`TransactionKind::Adjustment`] rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueTransaction {
    pub id: String,
    pub kind: TransactionKind,
    /// Absent for simulations not tied to a site.
    pub site_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    pub unit_sale_cents: i64,
    /// Recorded for reporting; NOT part of the gross-profit formula
    /// (it represents the partner-facing value stream).
    pub unit_supply_cents: i64,
    pub unit_cost_cents: i64,
    /// `quantity × unit_sale_cents`.
    pub total_revenue_cents: i64,
    /// `quantity × unit_cost_cents`.
    pub total_cost_cents: i64,
    /// `total_revenue - total_cost`.
    pub gross_profit_cents: i64,
    /// The distribution rule actually applied.
    pub rule_id: String,
    /// Amount per tier; sums exactly to `gross_profit_cents`.
    pub breakdown: TierAmounts,
    /// True when the applied rule's shares deviate from 100% - the split
    /// was still computed, but flagged for downstream human review.
    pub out_of_balance: bool,
    pub transaction_date: NaiveDate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl RevenueTransaction {
    #[inline]
    pub fn gross_profit(&self) -> Money {
        Money::from_cents(self.gross_profit_cents)
    }

    #[inline]
    pub fn total_revenue(&self) -> Money {
        Money::from_cents(self.total_revenue_cents)
    }
}

// =============================================================================
// Product Price History
// =============================================================================

/// A monetary field on [`Product`] that can be edited through the
/// price-update path. One history row is written per changed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    CostUnitPrice,
    SupplyPrice,
    SalePrice,
    Deposit,
}

impl PriceField {
    pub const fn name(&self) -> &'static str {
        match self {
            PriceField::CostUnitPrice => "cost_unit_price",
            PriceField::SupplyPrice => "supply_price",
            PriceField::SalePrice => "sale_price",
            PriceField::Deposit => "deposit",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Append-only audit of product price-field changes: one row per changed
/// monetary field per edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductPriceHistory {
    pub id: String,
    pub product_id: String,
    pub field: PriceField,
    pub old_cents: i64,
    pub new_cents: i64,
    pub changed_by: String,
    /// Free-text reason supplied by the operator.
    pub reason: String,
    pub changed_at: DateTime<Utc>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// What a mutation did, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Supersede,
    PriceChange,
}

/// Generic append-only record of a mutation on a protected resource.
///
/// Before/after snapshots are built from the typed domain structs via
/// serde at the call site, so readers get structured JSON rather than a
/// parse-and-hope text blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub user_id: String,
    pub action: AuditAction,
    /// Logical entity name, e.g. `distribution_rules`.
    pub entity: String,
    pub record_id: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Audit row for a freshly created record (before = null).
    pub fn created<T: Serialize>(actor: &Actor, entity: &str, record_id: &str, after: &T) -> Self {
        AuditEntry {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            action: AuditAction::Create,
            entity: entity.to_string(),
            record_id: record_id.to_string(),
            before: None,
            after: Some(serde_json::to_value(after).unwrap_or(Value::Null)),
            created_at: Utc::now(),
        }
    }

    /// Audit row for a mutated record with full before/after snapshots.
    pub fn changed<T: Serialize>(
        actor: &Actor,
        action: AuditAction,
        entity: &str,
        record_id: &str,
        before: &T,
        after: &T,
    ) -> Self {
        AuditEntry {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            action,
            entity: entity.to_string(),
            record_id: record_id.to_string(),
            before: Some(serde_json::to_value(before).unwrap_or(Value::Null)),
            after: Some(serde_json::to_value(after).unwrap_or(Value::Null)),
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product() -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4().to_string(),
            code: "MAT-100".to_string(),
            name: "Pressure Mattress".to_string(),
            cost_qty: 10,
            cost_unit_cents: 45_000,
            cost_total_cents: 0,
            supply_cents: 70_000,
            sale_cents: 95_000,
            deposit_cents: 20_000,
            one_time_fee: false,
            default_rule_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_region_covers() {
        assert!(RegionType::Nationwide.covers(RegionType::Branch));
        assert!(RegionType::Nationwide.covers(RegionType::Nationwide));
        assert!(RegionType::Region.covers(RegionType::District));
        assert!(!RegionType::Branch.covers(RegionType::Nationwide));
        assert!(!RegionType::District.covers(RegionType::Region));
    }

    #[test]
    fn test_product_cost_total_is_recomputed() {
        let mut product = sample_product();
        // Whatever the input claimed, the derived field is recomputed
        product.cost_total_cents = 1;
        product.recompute_cost_total();
        assert_eq!(product.cost_total_cents, 450_000);
    }

    #[test]
    fn test_product_validate_rejects_out_of_range_money() {
        let mut product = sample_product();
        product.sale_cents = -1;
        assert!(product.validate().is_err());

        product.sale_cents = crate::MAX_CENTS + 1;
        assert!(product.validate().is_err());
    }

    #[test]
    fn test_site_contract_window() {
        let now = Utc::now();
        let mut site = Site {
            id: Uuid::new_v4().to_string(),
            code: "SITE-01".to_string(),
            name: "Sunrise Care".to_string(),
            site_type: SiteType::CareFacility,
            address: None,
            contact_name: None,
            contact_phone: None,
            population: Some(120),
            rooms: Some(60),
            beds: Some(80),
            contract_start: NaiveDate::from_ymd_opt(2024, 1, 1),
            contract_end: NaiveDate::from_ymd_opt(2024, 12, 31),
            status: SiteStatus::Active,
            created_at: now,
            updated_at: now,
        };
        assert!(site.validate().is_ok());

        site.contract_end = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert!(site.validate().is_err());

        // Open-ended contracts are fine
        site.contract_end = None;
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_site_product_overrides() {
        let product = sample_product();
        let now = Utc::now();
        let mut assignment = SiteProduct {
            id: Uuid::new_v4().to_string(),
            site_id: "site-1".to_string(),
            product_id: product.id.clone(),
            default_quantity: 5,
            sale_override_cents: None,
            supply_override_cents: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(assignment.effective_sale_cents(&product), 95_000);

        assignment.sale_override_cents = Some(89_000);
        assert_eq!(assignment.effective_sale_cents(&product), 89_000);
        assert_eq!(assignment.effective_supply_cents(&product), 70_000);
    }

    #[test]
    fn test_audit_entry_snapshots() {
        let actor = Actor::new("user-1", "hq_admin");
        let before = sample_product();
        let mut after = before.clone();
        after.sale_cents = 99_000;

        let entry = AuditEntry::changed(
            &actor,
            AuditAction::PriceChange,
            "products",
            &before.id,
            &before,
            &after,
        );

        assert_eq!(entry.user_id, "user-1");
        assert_eq!(entry.before.as_ref().unwrap()["sale_cents"], 95_000);
        assert_eq!(entry.after.as_ref().unwrap()["sale_cents"], 99_000);

        let created = AuditEntry::created(&actor, "distribution_rules", "rule-1", &after);
        assert!(created.before.is_none());
        assert!(created.after.is_some());
    }
}
