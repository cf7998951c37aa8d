//! # Rule Repository
//!
//! Store operations for distribution rules: creation, supersession, and
//! candidate lookup for the resolver.
//!
//! ## Supersession
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Rule Supersession                                    │
//! │                                                                         │
//! │  old rule:  [2024-01-01 ............................ open)             │
//! │                                                                         │
//! │  supersede(old, effective = 2024-07-01, replacement)                   │
//! │                                                                         │
//! │  old rule:  [2024-01-01 ........ 2024-06-30]   ← closed, never deleted │
//! │  new rule:                 [2024-07-01 ...... open)                    │
//! │                                                                         │
//! │  No gap, no overlap. Both writes + both audit rows commit in ONE       │
//! │  SQLite transaction. A transaction dated 2024-06-15 still resolves     │
//! │  to the old rule forever.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! A unique index on (scope, applies_from) backs up the in-transaction
//! overlap check: two writers racing on the same scope collide on the
//! index, and the loser gets a retryable `Unavailable` error.

use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::unauthorized;
use revshare_core::access::{Actor, Permission, RoleGrants};
use revshare_core::rules::{DistributionRule, NewRule};
use revshare_core::types::{AuditAction, AuditEntry, RegionType, SiteType};
use revshare_core::{resolve, ValidationError};

use super::audit;

/// Sentinel for open-ended windows in SQL comparisons (ISO dates compare
/// lexicographically).
const OPEN_ENDED: &str = "9999-12-31";

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw rule row; the shares column is JSON TEXT.
#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    name: String,
    product_id: Option<String>,
    site_type: Option<SiteType>,
    region_type: RegionType,
    shares: String,
    applies_from: NaiveDate,
    applies_to: Option<NaiveDate>,
    is_active: bool,
    created_by: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl TryFrom<RuleRow> for DistributionRule {
    type Error = DbError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let shares = serde_json::from_str(&row.shares)
            .map_err(|e| DbError::Decode(format!("rule {} shares: {e}", row.id)))?;

        Ok(DistributionRule {
            shares,
            id: row.id,
            name: row.name,
            product_id: row.product_id,
            site_type: row.site_type,
            region_type: row.region_type,
            applies_from: row.applies_from,
            applies_to: row.applies_to,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const RULE_COLUMNS: &str = r#"
    id, name, product_id, site_type, region_type, shares,
    applies_from, applies_to, is_active, created_by, created_at, updated_at
"#;

// =============================================================================
// Shared Queries
// =============================================================================

/// Fetches candidate rules for (product, site type, date).
///
/// Scope filtering on product/site happens in SQL; window filtering too.
/// Region breadth and final precedence are the resolver's job - this
/// also runs inside the ledger's record transaction, so it takes a bare
/// connection.
pub(crate) async fn fetch_candidates(
    conn: &mut SqliteConnection,
    product_id: &str,
    site_type: SiteType,
    on: NaiveDate,
) -> DbResult<Vec<DistributionRule>> {
    let rows: Vec<RuleRow> = sqlx::query_as(&format!(
        r#"
        SELECT {RULE_COLUMNS}
        FROM distribution_rules
        WHERE is_active = 1
          AND applies_from <= ?1
          AND (applies_to IS NULL OR applies_to >= ?1)
          AND (product_id IS NULL OR product_id = ?2)
          AND (site_type IS NULL OR site_type = ?3)
        ORDER BY applies_from DESC
        "#
    ))
    .bind(on)
    .bind(product_id)
    .bind(site_type)
    .fetch_all(conn)
    .await?;

    rows.into_iter().map(DistributionRule::try_from).collect()
}

/// Counts active rules on the same scope whose window intersects
/// [from, to], excluding `exclude_id`.
async fn overlapping_count(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: Option<&str>,
    site_type: Option<SiteType>,
    region: RegionType,
    from: NaiveDate,
    to: Option<NaiveDate>,
    exclude_id: &str,
) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM distribution_rules
        WHERE COALESCE(product_id, '*') = ?1
          AND COALESCE(site_type, '*') = ?2
          AND region_type = ?3
          AND is_active = 1
          AND id <> ?4
          AND applies_from <= ?5
          AND COALESCE(applies_to, ?7) >= ?6
        "#,
    )
    .bind(product_id.unwrap_or("*"))
    .bind(site_type.map(|t| t.name()).unwrap_or("*"))
    .bind(region)
    .bind(exclude_id)
    .bind(to.map(|d| d.to_string()).unwrap_or_else(|| OPEN_ENDED.to_string()))
    .bind(from.to_string())
    .bind(OPEN_ENDED)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// Inserts a rule row inside an open transaction.
///
/// A unique-index collision here means another writer landed a rule on
/// the same scope and start date first - surfaced as retryable.
async fn insert_rule(tx: &mut Transaction<'_, Sqlite>, rule: &DistributionRule) -> DbResult<()> {
    let shares_json =
        serde_json::to_string(&rule.shares).map_err(|e| DbError::Internal(e.to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO distribution_rules (
            id, name, product_id, site_type, region_type, shares,
            applies_from, applies_to, is_active, created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&rule.id)
    .bind(&rule.name)
    .bind(&rule.product_id)
    .bind(rule.site_type)
    .bind(rule.region_type)
    .bind(shares_json)
    .bind(rule.applies_from)
    .bind(rule.applies_to)
    .bind(rule.is_active)
    .bind(&rule.created_by)
    .bind(rule.created_at)
    .bind(rule.updated_at)
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::Unavailable(format!(
                "concurrent rule write on scope {}",
                rule.scope_key()
            )),
            other => other,
        }),
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for distribution-rule operations.
#[derive(Debug, Clone)]
pub struct RuleRepository {
    pool: SqlitePool,
}

impl RuleRepository {
    /// Creates a new RuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RuleRepository { pool }
    }

    /// Gets a rule by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<DistributionRule>> {
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            "SELECT {RULE_COLUMNS} FROM distribution_rules WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DistributionRule::try_from).transpose()
    }

    /// Lists every rule, current and historical, newest first.
    pub async fn list_all(&self) -> DbResult<Vec<DistributionRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            "SELECT {RULE_COLUMNS} FROM distribution_rules ORDER BY applies_from DESC, created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DistributionRule::try_from).collect()
    }

    /// Candidate rules for a transaction context (scope + window match;
    /// precedence is applied by the resolver).
    pub async fn find_candidates(
        &self,
        product_id: &str,
        site_type: SiteType,
        on: NaiveDate,
    ) -> DbResult<Vec<DistributionRule>> {
        let mut conn = self.pool.acquire().await?;
        fetch_candidates(&mut conn, product_id, site_type, on).await
    }

    /// Resolves the single applicable rule for a transaction context.
    ///
    /// ## Errors
    /// `NoApplicableRule` (as a domain error) when nothing matches.
    pub async fn resolve_for(
        &self,
        product_id: &str,
        site_type: SiteType,
        region: RegionType,
        on: NaiveDate,
    ) -> DbResult<DistributionRule> {
        let candidates = self.find_candidates(product_id, site_type, on).await?;
        let rule = resolve(&candidates, product_id, site_type, region, on)
            .map_err(DbError::Domain)?;
        Ok(rule.clone())
    }

    /// Creates a distribution rule.
    ///
    /// ## Authorization
    /// Requires the `settings_distribution` permission. A denied call
    /// performs no write at all.
    ///
    /// ## Atomicity
    /// The rule and its audit row commit together or not at all. The
    /// validity window must not overlap an existing rule on the same
    /// (product, site type, region) scope.
    pub async fn create(
        &self,
        new_rule: NewRule,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<DistributionRule> {
        if !grants.is_granted(&actor.role, Permission::SettingsDistribution) {
            return Err(unauthorized(actor, Permission::SettingsDistribution));
        }

        new_rule.validate()?;

        let rule = new_rule.into_rule(actor);

        let mut tx = self.pool.begin().await?;

        let overlapping = overlapping_count(
            &mut tx,
            rule.product_id.as_deref(),
            rule.site_type,
            rule.region_type,
            rule.applies_from,
            rule.applies_to,
            &rule.id,
        )
        .await?;
        if overlapping > 0 {
            return Err(ValidationError::OverlappingWindow {
                scope: rule.scope_key(),
            }
            .into());
        }

        insert_rule(&mut tx, &rule).await?;

        let entry = AuditEntry::created(actor, "distribution_rules", &rule.id, &rule);
        audit::append(&mut tx, &entry).await?;

        tx.commit().await?;

        info!(id = %rule.id, scope = %rule.scope_key(), "Distribution rule created");
        Ok(rule)
    }

    /// Supersedes a rule: closes the old rule's window the day before
    /// `effective` and creates the replacement starting at `effective`.
    ///
    /// The replacement inherits the old rule's scope; its `applies_from`
    /// is forced to `effective`. Old rule, new rule, and both audit rows
    /// commit in one transaction - history stays resolvable with no gap
    /// and no overlap on the scope.
    ///
    /// Only an open-ended rule can be superseded: rewriting a closed
    /// rule's end date could stretch its window over a later rule on the
    /// same scope. Closed rules are history.
    pub async fn supersede(
        &self,
        rule_id: &str,
        effective: NaiveDate,
        replacement: NewRule,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<DistributionRule> {
        if !grants.is_granted(&actor.role, Permission::SettingsDistribution) {
            return Err(unauthorized(actor, Permission::SettingsDistribution));
        }

        let mut tx = self.pool.begin().await?;

        let old: DistributionRule = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM distribution_rules WHERE id = ?1"
        ))
        .bind(rule_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("DistributionRule", rule_id))?
        .try_into()?;

        // A closed rule's end date is never rewritten: moving it to
        // effective - 1 could overlap a later rule on the scope
        if let Some(until) = old.applies_to {
            return Err(ValidationError::AlreadyClosed {
                scope: old.scope_key(),
                until,
            }
            .into());
        }

        // The old rule must keep a non-empty window
        if effective <= old.applies_from {
            return Err(ValidationError::DateOrder {
                field: "effective date".to_string(),
                from: old.applies_from,
                to: effective,
            }
            .into());
        }

        // The replacement takes over the scope at the split point
        let mut replacement = replacement;
        replacement.product_id = old.product_id.clone();
        replacement.site_type = old.site_type;
        replacement.region_type = old.region_type;
        replacement.applies_from = effective;
        replacement.validate()?;

        let closed_to = effective
            .pred_opt()
            .ok_or_else(|| DbError::Internal("effective date underflow".to_string()))?;

        let now = Utc::now();
        sqlx::query("UPDATE distribution_rules SET applies_to = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(rule_id)
            .bind(closed_to)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let mut closed_old = old.clone();
        closed_old.applies_to = Some(closed_to);
        closed_old.updated_at = now;

        // The replacement window must be clear of everything except the
        // rule being closed
        let overlapping = overlapping_count(
            &mut tx,
            replacement.product_id.as_deref(),
            replacement.site_type,
            replacement.region_type,
            replacement.applies_from,
            replacement.applies_to,
            rule_id,
        )
        .await?;
        if overlapping > 0 {
            return Err(ValidationError::OverlappingWindow {
                scope: old.scope_key(),
            }
            .into());
        }

        let new_rule = replacement.into_rule(actor);
        insert_rule(&mut tx, &new_rule).await?;

        let supersede_entry = AuditEntry::changed(
            actor,
            AuditAction::Supersede,
            "distribution_rules",
            rule_id,
            &old,
            &closed_old,
        );
        audit::append(&mut tx, &supersede_entry).await?;

        let create_entry =
            AuditEntry::created(actor, "distribution_rules", &new_rule.id, &new_rule);
        audit::append(&mut tx, &create_entry).await?;

        tx.commit().await?;

        info!(
            old_id = %rule_id,
            new_id = %new_rule.id,
            effective = %effective,
            "Distribution rule superseded"
        );
        Ok(new_rule)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use revshare_core::tier::{Share, TierShares};
    use revshare_core::CoreError;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn admin() -> Actor {
        Actor::new("admin-1", "hq_admin")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn balanced_shares(factory_bps: u32, hospital_bps: u32) -> TierShares {
        TierShares {
            factory: Share::from_bps(factory_bps),
            hospital: Share::from_bps(hospital_bps),
            regional: Share::from_bps(10_000 - factory_bps - hospital_bps),
            ..TierShares::default()
        }
    }

    fn new_rule(name: &str, from: NaiveDate) -> NewRule {
        NewRule {
            name: name.to_string(),
            product_id: None,
            site_type: None,
            region_type: RegionType::Nationwide,
            shares: balanced_shares(3200, 3000),
            applies_from: from,
            applies_to: None,
        }
    }

    #[tokio::test]
    async fn test_create_persists_rule_and_audit_atomically() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();

        let rule = db
            .rules()
            .create(new_rule("company default", date(2024, 1, 1)), &admin(), &grants)
            .await
            .unwrap();

        let stored = db.rules().get(&rule.id).await.unwrap().unwrap();
        assert_eq!(stored, rule);

        let entries = db
            .audit()
            .for_record("distribution_rules", &rule.id)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[0].after.as_ref().unwrap()["name"], "company default");
    }

    #[tokio::test]
    async fn test_create_unauthorized_leaves_zero_trace() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();

        for role in ["regional_manager", "branch_operator", "viewer", "nobody"] {
            let err = db
                .rules()
                .create(
                    new_rule("rogue rule", date(2024, 1, 1)),
                    &Actor::new("user-x", role),
                    &grants,
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, DbError::Domain(CoreError::Unauthorized { .. })),
                "role {role}"
            );
        }

        assert!(db.rules().list_all().await.unwrap().is_empty());
        assert_eq!(db.audit().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_window_on_same_scope_rejected() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();

        db.rules()
            .create(new_rule("open ended", date(2024, 1, 1)), &admin(), &grants)
            .await
            .unwrap();

        let err = db
            .rules()
            .create(new_rule("intruder", date(2024, 6, 1)), &admin(), &grants)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OverlappingWindow { .. }))
        ));
    }

    #[tokio::test]
    async fn test_same_window_different_scope_allowed() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();
        let rules = db.rules();

        rules
            .create(new_rule("default", date(2024, 1, 1)), &admin(), &grants)
            .await
            .unwrap();

        let mut hospital_rule = new_rule("hospital split", date(2024, 1, 1));
        hospital_rule.site_type = Some(SiteType::Hospital);
        rules.create(hospital_rule, &admin(), &grants).await.unwrap();

        assert_eq!(rules.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_supersede_leaves_no_gap_and_no_overlap() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();
        let rules = db.rules();

        let old = rules
            .create(new_rule("2024 split", date(2024, 1, 1)), &admin(), &grants)
            .await
            .unwrap();

        let mut replacement = new_rule("2024 H2 split", date(2024, 7, 1));
        replacement.shares = balanced_shares(2500, 3500);
        let new = rules
            .supersede(&old.id, date(2024, 7, 1), replacement, &admin(), &grants)
            .await
            .unwrap();

        let closed = rules.get(&old.id).await.unwrap().unwrap();
        assert_eq!(closed.applies_to, Some(date(2024, 6, 30)));
        assert_eq!(new.applies_from, date(2024, 7, 1));
        assert_eq!(new.applies_to, None);

        // History resolves to the old split; current dates to the new one
        let before = rules
            .resolve_for("prod-1", SiteType::Hospital, RegionType::Nationwide, date(2024, 6, 15))
            .await
            .unwrap();
        assert_eq!(before.id, old.id);

        let boundary = rules
            .resolve_for("prod-1", SiteType::Hospital, RegionType::Nationwide, date(2024, 6, 30))
            .await
            .unwrap();
        assert_eq!(boundary.id, old.id);

        let after = rules
            .resolve_for("prod-1", SiteType::Hospital, RegionType::Nationwide, date(2024, 7, 1))
            .await
            .unwrap();
        assert_eq!(after.id, new.id);

        // Audit: create(old), supersede(old) on the old id; create on the new
        let old_history = db
            .audit()
            .for_record("distribution_rules", &old.id)
            .await
            .unwrap();
        assert_eq!(old_history.len(), 2);
        assert_eq!(old_history[1].action, AuditAction::Supersede);
        assert_eq!(
            old_history[1].after.as_ref().unwrap()["applies_to"],
            "2024-06-30"
        );

        let new_history = db
            .audit()
            .for_record("distribution_rules", &new.id)
            .await
            .unwrap();
        assert_eq!(new_history.len(), 1);
        assert_eq!(new_history[0].action, AuditAction::Create);
    }

    #[tokio::test]
    async fn test_supersede_inherits_scope_from_old_rule() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();
        let rules = db.rules();

        let mut scoped = new_rule("hospital split", date(2024, 1, 1));
        scoped.site_type = Some(SiteType::Hospital);
        let old = rules.create(scoped, &admin(), &grants).await.unwrap();

        // The replacement claims a different scope; the old scope wins
        let mut replacement = new_rule("replacement", date(2024, 7, 1));
        replacement.site_type = Some(SiteType::SeniorCenter);
        replacement.product_id = Some("prod-9".to_string());

        let new = rules
            .supersede(&old.id, date(2024, 7, 1), replacement, &admin(), &grants)
            .await
            .unwrap();
        assert_eq!(new.site_type, Some(SiteType::Hospital));
        assert_eq!(new.product_id, None);
    }

    #[tokio::test]
    async fn test_supersede_closed_rule_rejected() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();
        let rules = db.rules();

        // Two adjacent windows on the same scope: H1, then part of July
        let mut h1 = new_rule("2024 H1 split", date(2024, 1, 1));
        h1.applies_to = Some(date(2024, 6, 30));
        let old = rules.create(h1, &admin(), &grants).await.unwrap();

        let mut july = new_rule("july split", date(2024, 7, 1));
        july.applies_to = Some(date(2024, 7, 15));
        let neighbor = rules.create(july, &admin(), &grants).await.unwrap();

        // Superseding the closed H1 rule at a later effective date would
        // rewrite its end to 2024-07-31, stretching it over the July rule
        let err = rules
            .supersede(
                &old.id,
                date(2024, 8, 1),
                new_rule("august split", date(2024, 8, 1)),
                &admin(),
                &grants,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::AlreadyClosed { .. }))
        ));

        // Old window untouched, no third rule, no new audit rows
        let stored = rules.get(&old.id).await.unwrap().unwrap();
        assert_eq!(stored.applies_to, Some(date(2024, 6, 30)));
        assert_eq!(rules.list_all().await.unwrap().len(), 2);
        assert_eq!(db.audit().count().await.unwrap(), 2);

        // Mid-July still resolves to exactly the July rule
        let resolved = rules
            .resolve_for("prod-1", SiteType::Hospital, RegionType::Nationwide, date(2024, 7, 10))
            .await
            .unwrap();
        assert_eq!(resolved.id, neighbor.id);
    }

    #[tokio::test]
    async fn test_supersede_on_or_before_start_rejected() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();
        let rules = db.rules();

        let old = rules
            .create(new_rule("2024 split", date(2024, 1, 1)), &admin(), &grants)
            .await
            .unwrap();

        let err = rules
            .supersede(
                &old.id,
                date(2024, 1, 1),
                new_rule("bad", date(2024, 1, 1)),
                &admin(),
                &grants,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        // Old rule untouched
        let stored = rules.get(&old.id).await.unwrap().unwrap();
        assert_eq!(stored.applies_to, None);
    }

    #[tokio::test]
    async fn test_resolve_for_without_rules_is_a_domain_error() {
        let db = test_db().await;

        let err = db
            .rules()
            .resolve_for("prod-1", SiteType::Hospital, RegionType::Nationwide, date(2024, 1, 15))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NoApplicableRule { .. })
        ));
    }

    #[tokio::test]
    async fn test_shares_survive_storage_round_trip() {
        let db = test_db().await;
        let grants = RoleGrants::builtin();

        let mut rule = new_rule("precise shares", date(2024, 1, 1));
        rule.shares = TierShares {
            factory: Share::from_bps(3333),
            hq: Share::from_bps(3333),
            regional: Share::from_bps(3334),
            ..TierShares::default()
        };

        let created = db.rules().create(rule, &admin(), &grants).await.unwrap();
        let stored = db.rules().get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.shares.factory.bps(), 3333);
        assert_eq!(stored.shares.regional.bps(), 3334);
        assert!(stored.shares.is_balanced());
    }
}
