//! # Catalog Repository
//!
//! Products, sites, and site-product assignments.
//!
//! ## Pricing Fields
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Product Pricing                                     │
//! │                                                                         │
//! │  cost_qty × cost_unit_cents = cost_total_cents  (DERIVED, recomputed   │
//! │                                                  on every write)        │
//! │  supply_cents  ← price charged to the distribution partner             │
//! │  sale_cents    ← price charged to the end customer                     │
//! │  deposit_cents ← refundable deposit                                    │
//! │                                                                         │
//! │  Edits to these fields go through the LEDGER's price-update path,      │
//! │  which writes history + audit. This repository handles creation and    │
//! │  non-monetary reads/updates only.                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deactivation is a soft delete: historical transactions keep their
//! foreign keys, and inactive records drop out of the active listings.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::unauthorized;
use revshare_core::access::{Actor, Permission, RoleGrants};
use revshare_core::types::{Product, Site, SiteProduct};
use revshare_core::validation::{validate_code, validate_name};

/// Repository for catalog operations.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Inserts a product.
    ///
    /// Requires the `product_create` permission. The derived cost total
    /// is recomputed before the write regardless of the input value.
    pub async fn insert_product(
        &self,
        product: &Product,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<Product> {
        if !grants.is_granted(&actor.role, Permission::ProductCreate) {
            return Err(unauthorized(actor, Permission::ProductCreate));
        }

        validate_code(&product.code)?;
        validate_name(&product.name)?;
        product.validate()?;

        let mut product = product.clone();
        product.recompute_cost_total();

        debug!(id = %product.id, code = %product.code, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name,
                cost_qty, cost_unit_cents, cost_total_cents,
                supply_cents, sale_cents, deposit_cents, one_time_fee,
                default_rule_id, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(product.cost_qty)
        .bind(product.cost_unit_cents)
        .bind(product.cost_total_cents)
        .bind(product.supply_cents)
        .bind(product.sale_cents)
        .bind(product.deposit_cents)
        .bind(product.one_time_fee)
        .bind(&product.default_rule_id)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product: Option<Product> = sqlx::query_as(
            r#"
            SELECT id, code, name,
                   cost_qty, cost_unit_cents, cost_total_cents,
                   supply_cents, sale_cents, deposit_cents, one_time_fee,
                   default_rule_id, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Gets a product by business code.
    pub async fn get_product_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let product: Option<Product> = sqlx::query_as(
            r#"
            SELECT id, code, name,
                   cost_qty, cost_unit_cents, cost_total_cents,
                   supply_cents, sale_cents, deposit_cents, one_time_fee,
                   default_rule_id, is_active, created_at, updated_at
            FROM products
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    /// Lists active products, ordered by code.
    pub async fn list_active_products(&self) -> DbResult<Vec<Product>> {
        let products: Vec<Product> = sqlx::query_as(
            r#"
            SELECT id, code, name,
                   cost_qty, cost_unit_cents, cost_total_cents,
                   supply_cents, sale_cents, deposit_cents, one_time_fee,
                   default_rule_id, is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Soft-deactivates a product. Historical transactions keep their
    /// references; the product drops out of active listings.
    pub async fn deactivate_product(
        &self,
        id: &str,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<()> {
        if !grants.is_granted(&actor.role, Permission::ProductUpdate) {
            return Err(unauthorized(actor, Permission::ProductUpdate));
        }

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    // =========================================================================
    // Sites
    // =========================================================================

    /// Inserts a site.
    ///
    /// Requires the `site_create` permission; the contract window is
    /// validated before the write.
    pub async fn insert_site(
        &self,
        site: &Site,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<()> {
        if !grants.is_granted(&actor.role, Permission::SiteCreate) {
            return Err(unauthorized(actor, Permission::SiteCreate));
        }

        validate_code(&site.code)?;
        validate_name(&site.name)?;
        site.validate()?;

        debug!(id = %site.id, code = %site.code, "Inserting site");

        sqlx::query(
            r#"
            INSERT INTO sites (
                id, code, name, site_type,
                address, contact_name, contact_phone,
                population, rooms, beds,
                contract_start, contract_end, status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&site.id)
        .bind(&site.code)
        .bind(&site.name)
        .bind(site.site_type)
        .bind(&site.address)
        .bind(&site.contact_name)
        .bind(&site.contact_phone)
        .bind(site.population)
        .bind(site.rooms)
        .bind(site.beds)
        .bind(site.contract_start)
        .bind(site.contract_end)
        .bind(site.status)
        .bind(site.created_at)
        .bind(site.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a site by ID.
    pub async fn get_site(&self, id: &str) -> DbResult<Option<Site>> {
        let site: Option<Site> = sqlx::query_as(
            r#"
            SELECT id, code, name, site_type,
                   address, contact_name, contact_phone,
                   population, rooms, beds,
                   contract_start, contract_end, status,
                   created_at, updated_at
            FROM sites
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(site)
    }

    // =========================================================================
    // Site-Product Assignments
    // =========================================================================

    /// Assigns a product to a site with optional per-site price overrides.
    ///
    /// Requires the `site_update` permission. Unique per (site, product);
    /// a duplicate assignment surfaces as a `UniqueViolation`.
    pub async fn assign_product(
        &self,
        assignment: &SiteProduct,
        actor: &Actor,
        grants: &RoleGrants,
    ) -> DbResult<()> {
        if !grants.is_granted(&actor.role, Permission::SiteUpdate) {
            return Err(unauthorized(actor, Permission::SiteUpdate));
        }

        for (field, cents) in [
            ("sale_override", assignment.sale_override_cents),
            ("supply_override", assignment.supply_override_cents),
        ] {
            if let Some(cents) = cents {
                revshare_core::validation::validate_cents(field, cents)?;
            }
        }

        debug!(
            site_id = %assignment.site_id,
            product_id = %assignment.product_id,
            "Assigning product to site"
        );

        sqlx::query(
            r#"
            INSERT INTO site_products (
                id, site_id, product_id, default_quantity,
                sale_override_cents, supply_override_cents,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.site_id)
        .bind(&assignment.product_id)
        .bind(assignment.default_quantity)
        .bind(assignment.sale_override_cents)
        .bind(assignment.supply_override_cents)
        .bind(assignment.is_active)
        .bind(assignment.created_at)
        .bind(assignment.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets the assignment of a product to a site, if any.
    pub async fn get_assignment(
        &self,
        site_id: &str,
        product_id: &str,
    ) -> DbResult<Option<SiteProduct>> {
        let assignment: Option<SiteProduct> = sqlx::query_as(
            r#"
            SELECT id, site_id, product_id, default_quantity,
                   sale_override_cents, supply_override_cents,
                   is_active, created_at, updated_at
            FROM site_products
            WHERE site_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(site_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignment)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
