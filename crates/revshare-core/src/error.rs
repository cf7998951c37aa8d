//! # Error Types
//!
//! Domain-specific error types for revshare-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                 │
//! │                                                                     │
//! │  revshare-core errors (this file)                                   │
//! │  ├── CoreError        - Authorization and resolution failures       │
//! │  └── ValidationError  - Input validation failures                   │
//! │                                                                     │
//! │  revshare-db errors (separate crate)                                │
//! │  └── DbError          - Store failures (wraps CoreError)            │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → DbError → application layer    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (role, scope, dates)
//! 3. Errors are enum variants, never String
//! 4. `Unauthorized` and `NoApplicableRule` guarantee no side effect occurred

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::SiteType;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages by the
/// surrounding application layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The acting role lacks the permission required for a mutation.
    ///
    /// ## When This Occurs
    /// - A role without `settings_distribution` creates a rule
    /// - A role without `price_update` edits a product price field
    /// - The role name is unknown to the permission model (treated the
    ///   same as holding no permissions)
    ///
    /// ## Guarantee
    /// No side effect has occurred when this is returned: no audit row,
    /// no price history row, no rule or product mutation.
    #[error("role '{role}' lacks permission '{permission}'")]
    Unauthorized { role: String, permission: String },

    /// No distribution rule matched the transaction context.
    ///
    /// ## When This Occurs
    /// - The transaction date precedes every rule's `applies_from`
    /// - No rule's scope covers the (product, site type, region) triple
    ///
    /// ## Contract
    /// The caller must refuse to record the transaction rather than
    /// guess a distribution. Nothing is persisted.
    #[error("no distribution rule applies to product {product_id} ({site_type}) on {on}")]
    NoApplicableRule {
        product_id: String,
        site_type: SiteType,
        on: NaiveDate,
    },

    /// Validation error (wraps ValidationError).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet business requirements.
/// Used for early validation before any write happens.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, bad code characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// An end date precedes its start date.
    #[error("{field}: end date {to} precedes start date {from}")]
    DateOrder {
        field: String,
        from: NaiveDate,
        to: NaiveDate,
    },

    /// A rule's validity window collides with an existing rule on the
    /// same (product, site type, region) scope.
    #[error("scope {scope} already has a rule covering this window")]
    OverlappingWindow { scope: String },

    /// The target of a supersession is already closed. Rewriting a closed
    /// rule's end date could stretch it over a later rule on the same
    /// scope; only open-ended rules accept a supersession.
    #[error("rule on scope {scope} is already closed (until {until})")]
    AlreadyClosed { scope: String, until: NaiveDate },

    /// Duplicate value (e.g., duplicate site code).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_message() {
        let err = CoreError::Unauthorized {
            role: "viewer".to_string(),
            permission: "price_update".to_string(),
        };
        assert_eq!(err.to_string(), "role 'viewer' lacks permission 'price_update'");
    }

    #[test]
    fn test_no_applicable_rule_message() {
        let err = CoreError::NoApplicableRule {
            product_id: "prod-1".to_string(),
            site_type: SiteType::Hospital,
            on: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "no distribution rule applies to product prod-1 (hospital) on 2024-01-15"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_date_order_message() {
        let err = ValidationError::DateOrder {
            field: "validity window".to_string(),
            from: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            to: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "validity window: end date 2024-01-01 precedes start date 2024-06-01"
        );
    }
}
