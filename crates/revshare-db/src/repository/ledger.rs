//! # Ledger Repository
//!
//! The pricing & profit ledger: records revenue transactions with their
//! computed tier breakdowns, manages audited price updates, and serves
//! reporting queries.
//!
//! ## Recording a Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     record() Pipeline                                   │
//! │                                                                         │
//! │  NewTransaction (validated input)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN TRANSACTION                                                      │
//! │       │                                                                 │
//! │       ├── fetch candidate rules (scope + window, SQL)                  │
//! │       ├── resolve()        ← revshare-core precedence                  │
//! │       │     └── no match? → NoApplicableRule, NOTHING persisted        │
//! │       ├── compute_split()  ← revshare-core, sums exactly to gross      │
//! │       ├── INSERT revenue_transactions (breakdown JSON + flags)         │
//! │       └── INSERT distribution_lines (one row per tier)                 │
//! │       │                                                                 │
//! │  COMMIT ← parent row and lines land together or not at all             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recording is not permission-gated (any authenticated caller of the
//! surrounding application can record); the actor is captured on the row.
//! Price updates ARE gated and write history + audit in one transaction.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::{rule, unauthorized};
use revshare_core::access::{Actor, Permission, RoleGrants};
use revshare_core::money::Money;
use revshare_core::split::compute_split;
use revshare_core::tier::TierAmounts;
use revshare_core::types::{
    AuditAction, AuditEntry, PriceField, Product, ProductPriceHistory, RegionType,
    RevenueTransaction, SiteType, TransactionKind,
};
use revshare_core::validation::{validate_cents, validate_quantity};
use revshare_core::{resolve, ValidationError};

use super::audit;

// =============================================================================
// Input Types
// =============================================================================

/// Input for recording a revenue transaction.
///
/// Unit prices arrive resolved (site overrides already applied - see
/// [`LedgerRepository::record_site_sale`] for the catalog-driven path).
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    /// Required for sales; optional for simulations and adjustments.
    pub site_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    pub unit_sale_cents: i64,
    pub unit_supply_cents: i64,
    pub unit_cost_cents: i64,
    /// Site type of the transaction context (drives rule scope matching).
    pub site_type: SiteType,
    /// Regional granularity of the transaction context.
    pub region_type: RegionType,
    pub transaction_date: NaiveDate,
}

impl NewTransaction {
    /// Validates quantities and unit prices before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_quantity(self.quantity)?;
        validate_cents("unit_sale_price", self.unit_sale_cents)?;
        validate_cents("unit_supply_price", self.unit_supply_cents)?;
        validate_cents("unit_cost_price", self.unit_cost_cents)?;

        if self.kind == TransactionKind::Sale && self.site_id.is_none() {
            return Err(ValidationError::Required {
                field: "site_id".to_string(),
            });
        }

        Ok(())
    }
}

/// Optional filters for transaction listing.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub site_id: Option<String>,
    pub product_id: Option<String>,
    pub kind: Option<TransactionKind>,
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw transaction row; the breakdown column is JSON TEXT.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    kind: TransactionKind,
    site_id: Option<String>,
    product_id: String,
    quantity: i64,
    unit_sale_cents: i64,
    unit_supply_cents: i64,
    unit_cost_cents: i64,
    total_revenue_cents: i64,
    total_cost_cents: i64,
    gross_profit_cents: i64,
    rule_id: String,
    breakdown: String,
    out_of_balance: bool,
    transaction_date: NaiveDate,
    created_by: String,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<TransactionRow> for RevenueTransaction {
    type Error = DbError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let breakdown: TierAmounts = serde_json::from_str(&row.breakdown)
            .map_err(|e| DbError::Decode(format!("transaction {} breakdown: {e}", row.id)))?;

        Ok(RevenueTransaction {
            breakdown,
            id: row.id,
            kind: row.kind,
            site_id: row.site_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_sale_cents: row.unit_sale_cents,
            unit_supply_cents: row.unit_supply_cents,
            unit_cost_cents: row.unit_cost_cents,
            total_revenue_cents: row.total_revenue_cents,
            total_cost_cents: row.total_cost_cents,
            gross_profit_cents: row.gross_profit_cents,
            rule_id: row.rule_id,
            out_of_balance: row.out_of_balance,
            transaction_date: row.transaction_date,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

const TX_COLUMNS: &str = r#"
    id, kind, site_id, product_id, quantity,
    unit_sale_cents, unit_supply_cents, unit_cost_cents,
    total_revenue_cents, total_cost_cents, gross_profit_cents,
    rule_id, breakdown, out_of_balance, transaction_date,
    created_by, created_at
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for the revenue ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records a revenue transaction: resolves the applicable rule,
    /// computes the split, and persists the row plus its per-tier lines
    /// atomically.
    ///
    /// ## Guarantees
    /// - The persisted breakdown sums EXACTLY to the gross profit
    /// - An out-of-balance rule is flagged on the row, never rejected
    /// - `NoApplicableRule` persists nothing
    pub async fn record(
        &self,
        input: NewTransaction,
        actor: &Actor,
    ) -> DbResult<RevenueTransaction> {
        input.validate()?;

        let mut tx = self.pool.begin().await?;

        let candidates = rule::fetch_candidates(
            &mut tx,
            &input.product_id,
            input.site_type,
            input.transaction_date,
        )
        .await?;
        let applied = resolve(
            &candidates,
            &input.product_id,
            input.site_type,
            input.region_type,
            input.transaction_date,
        )
        .map_err(DbError::Domain)?;

        let total_revenue_cents = input.quantity * input.unit_sale_cents;
        let total_cost_cents = input.quantity * input.unit_cost_cents;
        let gross_profit_cents = total_revenue_cents - total_cost_cents;

        let split = compute_split(&applied.shares, Money::from_cents(gross_profit_cents));

        let transaction = RevenueTransaction {
            id: Uuid::new_v4().to_string(),
            kind: input.kind,
            site_id: input.site_id,
            product_id: input.product_id,
            quantity: input.quantity,
            unit_sale_cents: input.unit_sale_cents,
            unit_supply_cents: input.unit_supply_cents,
            unit_cost_cents: input.unit_cost_cents,
            total_revenue_cents,
            total_cost_cents,
            gross_profit_cents,
            rule_id: applied.id.clone(),
            breakdown: split.amounts.clone(),
            out_of_balance: split.out_of_balance,
            transaction_date: input.transaction_date,
            created_by: actor.user_id.clone(),
            created_at: Utc::now(),
        };

        let breakdown_json = serde_json::to_string(&transaction.breakdown)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO revenue_transactions (
                id, kind, site_id, product_id, quantity,
                unit_sale_cents, unit_supply_cents, unit_cost_cents,
                total_revenue_cents, total_cost_cents, gross_profit_cents,
                rule_id, breakdown, out_of_balance, transaction_date,
                created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.kind)
        .bind(&transaction.site_id)
        .bind(&transaction.product_id)
        .bind(transaction.quantity)
        .bind(transaction.unit_sale_cents)
        .bind(transaction.unit_supply_cents)
        .bind(transaction.unit_cost_cents)
        .bind(transaction.total_revenue_cents)
        .bind(transaction.total_cost_cents)
        .bind(transaction.gross_profit_cents)
        .bind(&transaction.rule_id)
        .bind(breakdown_json)
        .bind(transaction.out_of_balance)
        .bind(transaction.transaction_date)
        .bind(&transaction.created_by)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await?;

        for (tier, amount) in transaction.breakdown.iter() {
            sqlx::query(
                "INSERT INTO distribution_lines (transaction_id, tier, amount_cents) VALUES (?1, ?2, ?3)",
            )
            .bind(&transaction.id)
            .bind(tier)
            .bind(amount.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            id = %transaction.id,
            rule_id = %transaction.rule_id,
            gross_profit_cents = transaction.gross_profit_cents,
            out_of_balance = transaction.out_of_balance,
            "Revenue transaction recorded"
        );
        Ok(transaction)
    }

    /// Records a sale at a site, deriving unit prices from the catalog:
    /// site-product overrides win over the product's list prices.
    pub async fn record_site_sale(
        &self,
        site_id: &str,
        product_id: &str,
        quantity: i64,
        region: RegionType,
        on: NaiveDate,
        actor: &Actor,
    ) -> DbResult<RevenueTransaction> {
        let catalog = crate::repository::catalog::CatalogRepository::new(self.pool.clone());

        let site = catalog
            .get_site(site_id)
            .await?
            .ok_or_else(|| DbError::not_found("Site", site_id))?;
        let product = catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product_id))?;
        let assignment = catalog.get_assignment(site_id, product_id).await?;

        let (unit_sale_cents, unit_supply_cents) = match &assignment {
            Some(a) => (
                a.effective_sale_cents(&product),
                a.effective_supply_cents(&product),
            ),
            None => (product.sale_cents, product.supply_cents),
        };

        self.record(
            NewTransaction {
                kind: TransactionKind::Sale,
                site_id: Some(site.id),
                product_id: product.id.clone(),
                quantity,
                unit_sale_cents,
                unit_supply_cents,
                unit_cost_cents: product.cost_unit_cents,
                site_type: site.site_type,
                region_type: region,
                transaction_date: on,
            },
            actor,
        )
        .await
    }

    /// Gets a transaction by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<RevenueTransaction>> {
        let row: Option<TransactionRow> = sqlx::query_as(&format!(
            "SELECT {TX_COLUMNS} FROM revenue_transactions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(RevenueTransaction::try_from).transpose()
    }

    /// Transactions in a date range (inclusive), optionally filtered.
    pub async fn transactions_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        filter: &TransactionFilter,
    ) -> DbResult<Vec<RevenueTransaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM revenue_transactions
            WHERE transaction_date >= ?1 AND transaction_date <= ?2
              AND (?3 IS NULL OR site_id = ?3)
              AND (?4 IS NULL OR product_id = ?4)
              AND (?5 IS NULL OR kind = ?5)
            ORDER BY transaction_date, created_at
            "#
        ))
        .bind(from)
        .bind(to)
        .bind(&filter.site_id)
        .bind(&filter.product_id)
        .bind(filter.kind)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RevenueTransaction::try_from).collect()
    }

    /// Per-tier totals over a date range (inclusive), aggregated in SQL
    /// from the normalized distribution lines.
    pub async fn tier_totals_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<TierAmounts> {
        let rows: Vec<(revshare_core::tier::Tier, i64)> = sqlx::query_as(
            r#"
            SELECT l.tier, SUM(l.amount_cents)
            FROM distribution_lines l
            JOIN revenue_transactions t ON t.id = l.transaction_id
            WHERE t.transaction_date >= ?1 AND t.transaction_date <= ?2
            GROUP BY l.tier
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = TierAmounts::default();
        for (tier, cents) in rows {
            totals.set(tier, Money::from_cents(cents));
        }
        Ok(totals)
    }

    // =========================================================================
    // Price Updates
    // =========================================================================

    /// Updates one monetary field on a product.
    ///
    /// ## Authorization
    /// Requires the `price_update` permission. A denied call performs no
    /// write at all - no history row, no audit row, no product change.
    ///
    /// ## Atomicity
    /// Product update, price-history row, and audit row commit together.
    /// Editing the unit cost recomputes the derived cost total. A no-op
    /// edit (same value) writes nothing.
    pub async fn update_price_field(
        &self,
        product_id: &str,
        field: PriceField,
        new_cents: i64,
        reason: &str,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<Product> {
        if !grants.is_granted(&actor.role, Permission::PriceUpdate) {
            return Err(unauthorized(actor, Permission::PriceUpdate));
        }

        validate_cents(field.name(), new_cents)?;
        if reason.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "reason".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let before: Product = sqlx::query_as(
            r#"
            SELECT id, code, name,
                   cost_qty, cost_unit_cents, cost_total_cents,
                   supply_cents, sale_cents, deposit_cents, one_time_fee,
                   default_rule_id, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Product", product_id))?;

        let old_cents = match field {
            PriceField::CostUnitPrice => before.cost_unit_cents,
            PriceField::SupplyPrice => before.supply_cents,
            PriceField::SalePrice => before.sale_cents,
            PriceField::Deposit => before.deposit_cents,
        };
        if old_cents == new_cents {
            return Ok(before);
        }

        let mut after = before.clone();
        match field {
            PriceField::CostUnitPrice => after.cost_unit_cents = new_cents,
            PriceField::SupplyPrice => after.supply_cents = new_cents,
            PriceField::SalePrice => after.sale_cents = new_cents,
            PriceField::Deposit => after.deposit_cents = new_cents,
        }
        after.recompute_cost_total();
        after.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE products SET
                cost_unit_cents = ?2,
                cost_total_cents = ?3,
                supply_cents = ?4,
                sale_cents = ?5,
                deposit_cents = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(product_id)
        .bind(after.cost_unit_cents)
        .bind(after.cost_total_cents)
        .bind(after.supply_cents)
        .bind(after.sale_cents)
        .bind(after.deposit_cents)
        .bind(after.updated_at)
        .execute(&mut *tx)
        .await?;

        let history = ProductPriceHistory {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            field,
            old_cents,
            new_cents,
            changed_by: actor.user_id.clone(),
            reason: reason.trim().to_string(),
            changed_at: after.updated_at,
        };
        sqlx::query(
            r#"
            INSERT INTO product_price_history (
                id, product_id, field, old_cents, new_cents,
                changed_by, reason, changed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&history.id)
        .bind(&history.product_id)
        .bind(history.field)
        .bind(history.old_cents)
        .bind(history.new_cents)
        .bind(&history.changed_by)
        .bind(&history.reason)
        .bind(history.changed_at)
        .execute(&mut *tx)
        .await?;

        let entry = AuditEntry::changed(
            actor,
            AuditAction::PriceChange,
            "products",
            product_id,
            &before,
            &after,
        );
        audit::append(&mut tx, &entry).await?;

        tx.commit().await?;

        debug!(
            product_id = %product_id,
            field = %field,
            old_cents,
            new_cents,
            "Price field updated"
        );
        Ok(after)
    }

    /// Price-change history for a product, oldest first.
    pub async fn price_history(&self, product_id: &str) -> DbResult<Vec<ProductPriceHistory>> {
        let history: Vec<ProductPriceHistory> = sqlx::query_as(
            r#"
            SELECT id, product_id, field, old_cents, new_cents,
                   changed_by, reason, changed_at
            FROM product_price_history
            WHERE product_id = ?1
            ORDER BY changed_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
