//! # Rule Resolver
//!
//! Selects the single applicable distribution rule for a transaction
//! context out of a candidate set.
//!
//! ## Precedence (most specific wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Resolution Precedence                            │
//! │                                                                     │
//! │  1. product_id matches AND site_type matches   ← highest            │
//! │  2. product_id matches, site_type is null                           │
//! │  3. product_id null, site_type matches                              │
//! │  4. both null (company-wide default)           ← the fallback       │
//! │                                                                     │
//! │  Within one level: most recent applies_from <= transaction date     │
//! │  (defensive - the store enforces uniqueness per scope + window,     │
//! │  but overlapping candidates must still resolve deterministically)   │
//! │                                                                     │
//! │  Zero candidates at every level → NoApplicableRule, and the         │
//! │  ledger refuses to record rather than guess a distribution.         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;

use crate::error::{CoreError, CoreResult};
use crate::rules::DistributionRule;
use crate::types::{RegionType, SiteType};

/// Resolves the single applicable rule for (product, site type, region,
/// date) from a candidate slice.
///
/// The candidates typically come from the store's `find_candidates`
/// query, but the function re-checks windows and scopes so it is safe
/// to hand it any rule set.
///
/// ## Errors
/// [`CoreError::NoApplicableRule`] when no candidate's scope and window
/// cover the context.
pub fn resolve<'a>(
    candidates: &'a [DistributionRule],
    product_id: &str,
    site_type: SiteType,
    region: RegionType,
    on: NaiveDate,
) -> CoreResult<&'a DistributionRule> {
    let mut best: Option<(&DistributionRule, u8)> = None;

    for rule in candidates {
        if !rule.is_active_on(on) || !rule.region_type.covers(region) {
            continue;
        }
        let Some(specificity) = rule.specificity(product_id, site_type) else {
            continue;
        };

        best = match best {
            None => Some((rule, specificity)),
            Some((current, current_spec)) => {
                if specificity > current_spec
                    || (specificity == current_spec && rule.applies_from > current.applies_from)
                {
                    Some((rule, specificity))
                } else {
                    Some((current, current_spec))
                }
            }
        };
    }

    match best {
        Some((rule, _)) => Ok(rule),
        None => Err(CoreError::NoApplicableRule {
            product_id: product_id.to_string(),
            site_type,
            on,
        }),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Actor;
    use crate::rules::NewRule;
    use crate::tier::{Share, TierShares};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shares(factory_bps: u32) -> TierShares {
        TierShares {
            factory: Share::from_bps(factory_bps),
            ..TierShares::default()
        }
    }

    fn rule(
        name: &str,
        product_id: Option<&str>,
        site_type: Option<SiteType>,
        from: NaiveDate,
        to: Option<NaiveDate>,
        factory_bps: u32,
    ) -> DistributionRule {
        let actor = Actor::new("user-1", "hq_admin");
        NewRule {
            name: name.to_string(),
            product_id: product_id.map(String::from),
            site_type,
            region_type: RegionType::Nationwide,
            shares: shares(factory_bps),
            applies_from: from,
            applies_to: to,
        }
        .into_rule(&actor)
    }

    #[test]
    fn test_most_specific_rule_wins() {
        let candidates = vec![
            rule("default", None, None, date(2024, 1, 1), None, 1000),
            rule(
                "site scoped",
                None,
                Some(SiteType::Hospital),
                date(2024, 1, 1),
                None,
                2000,
            ),
            rule(
                "product scoped",
                Some("prod-1"),
                None,
                date(2024, 1, 1),
                None,
                3000,
            ),
            rule(
                "product+site",
                Some("prod-1"),
                Some(SiteType::Hospital),
                date(2024, 1, 1),
                None,
                4000,
            ),
        ];

        let resolved = resolve(
            &candidates,
            "prod-1",
            SiteType::Hospital,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(resolved.name, "product+site");
    }

    #[test]
    fn test_falls_through_to_broader_levels() {
        let candidates = vec![
            rule("default", None, None, date(2024, 1, 1), None, 1000),
            rule(
                "other product",
                Some("prod-9"),
                None,
                date(2024, 1, 1),
                None,
                3000,
            ),
        ];

        // prod-1 only matches the company-wide default
        let resolved = resolve(
            &candidates,
            "prod-1",
            SiteType::Hospital,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(resolved.name, "default");
    }

    #[test]
    fn test_never_returns_rule_outside_its_window() {
        let candidates = vec![
            rule(
                "expired specific",
                Some("prod-1"),
                Some(SiteType::Hospital),
                date(2023, 1, 1),
                Some(date(2023, 12, 31)),
                4000,
            ),
            rule("default", None, None, date(2024, 1, 1), None, 1000),
        ];

        let resolved = resolve(
            &candidates,
            "prod-1",
            SiteType::Hospital,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(resolved.name, "default");
    }

    #[test]
    fn test_within_level_most_recent_applies_from_wins() {
        let candidates = vec![
            rule("older", None, None, date(2023, 1, 1), None, 1000),
            rule("newer", None, None, date(2024, 1, 1), None, 2000),
        ];

        let resolved = resolve(
            &candidates,
            "prod-1",
            SiteType::Other,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(resolved.name, "newer");
    }

    #[test]
    fn test_no_rule_before_first_applies_from() {
        let candidates = vec![rule("default", None, None, date(2024, 1, 1), None, 1000)];

        let err = resolve(
            &candidates,
            "prod-1",
            SiteType::Hospital,
            RegionType::Nationwide,
            date(2023, 6, 1),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NoApplicableRule { .. }));
    }

    #[test]
    fn test_empty_candidate_set() {
        let err = resolve(
            &[],
            "prod-1",
            SiteType::Hospital,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::NoApplicableRule { .. }));
    }

    #[test]
    fn test_region_breadth_filters_candidates() {
        let mut narrow = rule("branch only", None, None, date(2024, 1, 1), None, 1000);
        narrow.region_type = RegionType::Branch;

        // A branch-scoped rule is not a candidate for a nationwide context
        let candidates = vec![narrow];
        assert!(resolve(
            &candidates,
            "prod-1",
            SiteType::Other,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .is_err());

        // ...but it is for a branch context
        assert!(resolve(
            &candidates,
            "prod-1",
            SiteType::Other,
            RegionType::Branch,
            date(2024, 6, 1),
        )
        .is_ok());
    }

    #[test]
    fn test_specific_beats_newer_broad_rule() {
        let candidates = vec![
            rule("new default", None, None, date(2024, 5, 1), None, 1000),
            rule(
                "old product rule",
                Some("prod-1"),
                None,
                date(2023, 1, 1),
                None,
                3000,
            ),
        ];

        // Specificity outranks recency across levels
        let resolved = resolve(
            &candidates,
            "prod-1",
            SiteType::Other,
            RegionType::Nationwide,
            date(2024, 6, 1),
        )
        .unwrap();
        assert_eq!(resolved.name, "old product rule");
    }
}
