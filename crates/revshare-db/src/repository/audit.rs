//! # Audit Repository
//!
//! Append-only audit trail of mutations on protected resources.
//!
//! ## Writing vs Reading
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Audit Trail                                       │
//! │                                                                         │
//! │  WRITES happen inside OTHER repositories' transactions via              │
//! │  `append(&mut tx, entry)` - a rule create commits its audit row in     │
//! │  the same SQLite transaction as the rule itself, or neither lands.     │
//! │                                                                         │
//! │  READS go through AuditRepository:                                      │
//! │  ├── for_record(entity, id)  - history of one record                   │
//! │  └── recent(limit)           - latest entries across all entities      │
//! │                                                                         │
//! │  Rows are never updated or deleted.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::{DbError, DbResult};
use revshare_core::types::{AuditAction, AuditEntry};

/// Appends an audit entry inside an open transaction.
///
/// Called by mutating repository methods so the audit row shares the
/// caller's commit-or-rollback fate.
pub(crate) async fn append(tx: &mut Transaction<'_, Sqlite>, entry: &AuditEntry) -> DbResult<()> {
    let before_state = entry
        .before
        .as_ref()
        .map(|v| serde_json::to_string(v))
        .transpose()
        .map_err(|e| DbError::Internal(e.to_string()))?;
    let after_state = entry
        .after
        .as_ref()
        .map(|v| serde_json::to_string(v))
        .transpose()
        .map_err(|e| DbError::Internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO audit_log (
            id, user_id, action, entity, record_id,
            before_state, after_state, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.user_id)
    .bind(entry.action)
    .bind(&entry.entity)
    .bind(&entry.record_id)
    .bind(before_state)
    .bind(after_state)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw audit row; snapshots are JSON TEXT columns.
#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: String,
    user_id: String,
    action: AuditAction,
    entity: String,
    record_id: String,
    before_state: Option<String>,
    after_state: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let parse = |state: Option<String>| -> Result<Option<serde_json::Value>, DbError> {
            state
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| DbError::Decode(format!("audit snapshot: {e}")))
        };

        Ok(AuditEntry {
            before: parse(row.before_state)?,
            after: parse(row.after_state)?,
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            entity: row.entity,
            record_id: row.record_id,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for reading the audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Full history of one record, oldest first.
    pub async fn for_record(&self, entity: &str, record_id: &str) -> DbResult<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, action, entity, record_id,
                   before_state, after_state, created_at
            FROM audit_log
            WHERE entity = ?1 AND record_id = ?2
            ORDER BY created_at, id
            "#,
        )
        .bind(entity)
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    /// Latest entries across all entities, newest first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<AuditEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, action, entity, record_id,
                   before_state, after_state, created_at
            FROM audit_log
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    /// Total number of audit rows (diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
