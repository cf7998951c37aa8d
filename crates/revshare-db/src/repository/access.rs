//! # Access Repository
//!
//! Loads the role/permission model and manages user role assignment.
//!
//! ## Loading Grants
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Grant Loading                                        │
//! │                                                                         │
//! │  roles ──┐                                                              │
//! │          ├── role_permissions ──► permissions                           │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  RoleGrants (in-memory map, revshare-core)                             │
//! │                                                                         │
//! │  A permission name the code doesn't know is skipped with a warning     │
//! │  rather than corrupting the model - the closed permission set in       │
//! │  core is authoritative.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use crate::repository::unauthorized;
use revshare_core::access::{Actor, Permission, RoleGrants};
use revshare_core::types::{AuditAction, AuditEntry, Role, User};

use super::audit;

/// Repository for access-control operations.
#[derive(Debug, Clone)]
pub struct AccessRepository {
    pool: SqlitePool,
}

impl AccessRepository {
    /// Creates a new AccessRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AccessRepository { pool }
    }

    /// Loads the full role → permissions mapping from the store.
    ///
    /// Inactive roles are excluded entirely, so their users authorize
    /// as unknown roles (i.e. for nothing).
    pub async fn load_grants(&self) -> DbResult<RoleGrants> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT r.name, p.name
            FROM role_permissions rp
            JOIN roles r ON r.id = rp.role_id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE r.is_active = 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grants = RoleGrants::new();
        for (role, permission_name) in rows {
            match Permission::from_name(&permission_name) {
                Some(permission) => grants.grant(&role, permission),
                None => {
                    warn!(role = %role, permission = %permission_name, "Skipping unknown permission");
                }
            }
        }

        debug!("Role grants loaded");
        Ok(grants)
    }

    /// Lists all roles, active and inactive.
    pub async fn list_roles(&self) -> DbResult<Vec<Role>> {
        let roles: Vec<Role> =
            sqlx::query_as("SELECT id, name, display_name, is_active FROM roles ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(roles)
    }

    /// Gets a user by ID.
    pub async fn get_user(&self, id: &str) -> DbResult<Option<User>> {
        let user: Option<User> = sqlx::query_as(
            "SELECT id, email, role, is_active, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Inserts a user (used by seeding and the surrounding application's
    /// user provisioning).
    pub async fn insert_user(&self, user: &User) -> DbResult<()> {
        debug!(id = %user.id, email = %user.email, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, email, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Assigns a role to a user.
    ///
    /// ## Authorization
    /// Requires the `user_update` permission. A denied call performs no
    /// write at all - no user mutation, no audit row.
    ///
    /// ## Atomicity
    /// The role change and its audit row commit together.
    pub async fn assign_role(
        &self,
        user_id: &str,
        role_name: &str,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<User> {
        if !grants.is_granted(&actor.role, Permission::UserUpdate) {
            return Err(unauthorized(actor, Permission::UserUpdate));
        }

        let mut tx = self.pool.begin().await?;

        // The target role must exist and be active
        let role_exists: Option<(String,)> =
            sqlx::query_as("SELECT name FROM roles WHERE name = ?1 AND is_active = 1")
                .bind(role_name)
                .fetch_optional(&mut *tx)
                .await?;
        if role_exists.is_none() {
            return Err(DbError::not_found("Role", role_name));
        }

        let before: User = sqlx::query_as(
            "SELECT id, email, role, is_active, created_at FROM users WHERE id = ?1",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("User", user_id))?;

        sqlx::query("UPDATE users SET role = ?2 WHERE id = ?1")
            .bind(user_id)
            .bind(role_name)
            .execute(&mut *tx)
            .await?;

        let mut after = before.clone();
        after.role = Some(role_name.to_string());

        let entry = AuditEntry::changed(actor, AuditAction::Update, "users", user_id, &before, &after);
        audit::append(&mut tx, &entry).await?;

        tx.commit().await?;

        debug!(user_id = %user_id, role = %role_name, "Role assigned");
        Ok(after)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Utc;
    use revshare_core::access::{Action, Resource};
    use uuid::Uuid;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn test_user(role: Option<&str>) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: format!("{}@example.com", Uuid::new_v4()),
            role: role.map(String::from),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_loaded_grants_match_builtin_roles() {
        let db = test_db().await;
        let grants = db.access().load_grants().await.unwrap();

        // Seeded data mirrors RoleGrants::builtin()
        assert!(grants.authorize("hq_admin", Resource::Settings, Action::Distribution));
        assert!(grants.authorize("regional_manager", Resource::Products, Action::PriceUpdate));
        assert!(grants.authorize("branch_operator", Resource::Transactions, Action::Create));
        assert!(!grants.authorize("branch_operator", Resource::Settings, Action::Distribution));
        assert!(!grants.authorize("viewer", Resource::Transactions, Action::Create));
        assert!(!grants.authorize("unknown_role", Resource::Products, Action::Read));

        for role in RoleGrants::builtin().roles() {
            assert_eq!(
                grants.permissions_for(role),
                RoleGrants::builtin().permissions_for(role),
                "role {role}"
            );
        }
    }

    #[tokio::test]
    async fn test_assign_role_writes_user_and_audit_together() {
        let db = test_db().await;
        let access = db.access();

        let user = test_user(None);
        access.insert_user(&user).await.unwrap();

        let grants = RoleGrants::builtin();
        let actor = Actor::new("admin-1", "hq_admin");

        let updated = access
            .assign_role(&user.id, "viewer", &actor, &grants)
            .await
            .unwrap();
        assert_eq!(updated.role.as_deref(), Some("viewer"));

        let stored = access.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.role.as_deref(), Some("viewer"));

        let entries = db.audit().for_record("users", &user.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::Update);
        assert_eq!(entries[0].user_id, "admin-1");
    }

    #[tokio::test]
    async fn test_assign_role_unauthorized_leaves_no_trace() {
        let db = test_db().await;
        let access = db.access();

        let user = test_user(None);
        access.insert_user(&user).await.unwrap();

        let grants = RoleGrants::builtin();
        let actor = Actor::new("viewer-1", "viewer");

        let err = access
            .assign_role(&user.id, "hq_admin", &actor, &grants)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        // No mutation, no audit row
        let stored = access.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.role, None);
        let entries = db.audit().for_record("users", &user.id).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_assign_unknown_role_fails() {
        let db = test_db().await;
        let access = db.access();

        let user = test_user(None);
        access.insert_user(&user).await.unwrap();

        let err = access
            .assign_role(
                &user.id,
                "superuser",
                &Actor::new("admin-1", "hq_admin"),
                &RoleGrants::builtin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
