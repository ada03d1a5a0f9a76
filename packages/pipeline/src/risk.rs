//! Risk classification stage.

use std::collections::BTreeMap;

use water_map_system_models::{RiskLevel, ViolationSummary};

/// Classifies a system from its violation aggregates.
///
/// Precedence, first match wins: any health-based violation is
/// [`RiskLevel::High`], then any unaddressed violation is
/// [`RiskLevel::Medium`], then any violation at all is [`RiskLevel::Low`].
/// Systems without violations are [`RiskLevel::Good`].
#[must_use]
pub const fn classify(summary: &ViolationSummary) -> RiskLevel {
    if summary.health > 0 {
        RiskLevel::High
    } else if summary.unaddressed > 0 {
        RiskLevel::Medium
    } else if summary.total > 0 {
        RiskLevel::Low
    } else {
        RiskLevel::Good
    }
}

/// Counts systems per risk tier. Every tier is present, possibly with zero.
#[must_use]
pub fn distribution<'a>(
    summaries: impl IntoIterator<Item = &'a ViolationSummary>,
) -> BTreeMap<RiskLevel, usize> {
    let mut counts: BTreeMap<RiskLevel, usize> =
        RiskLevel::all().iter().map(|level| (*level, 0)).collect();
    for summary in summaries {
        *counts.entry(classify(summary)).or_default() += 1;
    }
    counts
}

/// Logs the per-tier distribution.
pub fn log_distribution(counts: &BTreeMap<RiskLevel, usize>) {
    log::info!("Risk distribution:");
    for (level, count) in counts {
        log::info!("  {level} ({}): {count}", level.marker_color());
    }
}

#[cfg(test)]
mod tests {
    use water_map_system_models::MarkerColor;

    use super::*;

    const fn summary(total: u64, health: u64, unaddressed: u64) -> ViolationSummary {
        ViolationSummary {
            total,
            health,
            unaddressed,
        }
    }

    #[test]
    fn health_violation_is_high_regardless_of_other_counts() {
        let level = classify(&summary(3, 1, 0));
        assert_eq!(level, RiskLevel::High);
        assert_eq!(level.marker_color(), MarkerColor::Red);
        assert_eq!(classify(&summary(5, 2, 5)), RiskLevel::High);
    }

    #[test]
    fn unaddressed_without_health_is_medium() {
        assert_eq!(classify(&summary(2, 0, 1)), RiskLevel::Medium);
    }

    #[test]
    fn addressed_only_is_low() {
        assert_eq!(classify(&summary(4, 0, 0)), RiskLevel::Low);
    }

    #[test]
    fn no_violations_is_good() {
        let level = classify(&ViolationSummary::default());
        assert_eq!(level, RiskLevel::Good);
        assert_eq!(level.marker_color(), MarkerColor::Green);
    }

    #[test]
    fn distribution_includes_empty_tiers() {
        let summaries = [summary(1, 1, 0), summary(0, 0, 0), summary(2, 1, 1)];
        let counts = distribution(&summaries);
        assert_eq!(counts[&RiskLevel::High], 2);
        assert_eq!(counts[&RiskLevel::Medium], 0);
        assert_eq!(counts[&RiskLevel::Low], 0);
        assert_eq!(counts[&RiskLevel::Good], 1);
    }
}
