//! # Distribution Rules
//!
//! A distribution rule says how gross profit splits across tiers for a
//! given scope (product, site type, region) during a validity window.
//!
//! ## Rule Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Rule Lifecycle                                │
//! │                                                                     │
//! │  1. CREATE                                                          │
//! │     └── NewRule::validate() → store persists + audit row            │
//! │         (requires the settings_distribution permission)             │
//! │                                                                     │
//! │  2. SUPERSEDE (never hard-delete!)                                  │
//! │     └── old.applies_to = effective_date - 1 day                     │
//! │     └── new.applies_from = effective_date                           │
//! │         No gap, no overlap - both writes in ONE transaction         │
//! │                                                                     │
//! │  3. HISTORY                                                         │
//! │     └── closed rules stay queryable forever: a transaction dated    │
//! │         inside an old window still resolves to the old split        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Actor;
use crate::error::ValidationError;
use crate::tier::TierShares;
use crate::types::{RegionType, SiteType};

// =============================================================================
// Distribution Rule
// =============================================================================

/// A versioned, time-scoped distribution rule.
///
/// ## Scope Semantics
/// - `product_id = None`  → applies company-wide (any product)
/// - `site_type = None`   → applies to all site types
/// - `region_type`        → applies at this granularity and anything
///                          narrower (see [`RegionType::covers`])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRule {
    pub id: String,
    /// Human-readable name, e.g. "2024 hospital split".
    pub name: String,
    pub product_id: Option<String>,
    pub site_type: Option<SiteType>,
    pub region_type: RegionType,
    pub shares: TierShares,
    pub applies_from: NaiveDate,
    /// `None` = open-ended. Set (never deleted) when superseded.
    pub applies_to: Option<NaiveDate>,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DistributionRule {
    /// Whether the validity window contains `on`.
    pub fn is_active_on(&self, on: NaiveDate) -> bool {
        if !self.is_active || self.applies_from > on {
            return false;
        }
        match self.applies_to {
            Some(until) => until >= on,
            None => true,
        }
    }

    /// Whether this rule's scope covers the given transaction context.
    pub fn matches(&self, product_id: &str, site_type: SiteType, region: RegionType) -> bool {
        self.specificity(product_id, site_type).is_some() && self.region_type.covers(region)
    }

    /// Specificity score for resolver precedence, or `None` on a scope
    /// mismatch.
    ///
    /// ```text
    /// 3 = product AND site type match   (most specific)
    /// 2 = product match, any site type
    /// 1 = any product, site type match
    /// 0 = company-wide default          (least specific)
    /// ```
    pub fn specificity(&self, product_id: &str, site_type: SiteType) -> Option<u8> {
        let product_score = match &self.product_id {
            Some(scoped) if scoped == product_id => 2,
            Some(_) => return None,
            None => 0,
        };
        let site_score = match self.site_type {
            Some(scoped) if scoped == site_type => 1,
            Some(_) => return None,
            None => 0,
        };
        Some(product_score + site_score)
    }

    /// Stable textual scope key, for error messages and logging.
    pub fn scope_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.product_id.as_deref().unwrap_or("*"),
            self.site_type.map(|t| t.name()).unwrap_or("*"),
            self.region_type
        )
    }
}

// =============================================================================
// New Rule Input
// =============================================================================

/// Input for creating a distribution rule (id and timestamps assigned by
/// the store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRule {
    pub name: String,
    pub product_id: Option<String>,
    pub site_type: Option<SiteType>,
    pub region_type: RegionType,
    pub shares: TierShares,
    pub applies_from: NaiveDate,
    pub applies_to: Option<NaiveDate>,
}

impl NewRule {
    /// Validates tier shares and the validity window.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            });
        }

        self.shares.validate()?;

        if let Some(until) = self.applies_to {
            if until < self.applies_from {
                return Err(ValidationError::DateOrder {
                    field: "validity window".to_string(),
                    from: self.applies_from,
                    to: until,
                });
            }
        }

        Ok(())
    }

    /// Materializes the rule with a fresh id and timestamps.
    pub fn into_rule(self, actor: &Actor) -> DistributionRule {
        let now = Utc::now();
        DistributionRule {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            product_id: self.product_id,
            site_type: self.site_type,
            region_type: self.region_type,
            shares: self.shares,
            applies_from: self.applies_from,
            applies_to: self.applies_to,
            is_active: true,
            created_by: actor.user_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
