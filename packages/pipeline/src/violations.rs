//! Violation aggregation stage.

use std::collections::{BTreeMap, BTreeSet};

use water_map_system_models::{EnrichedSystem, Violation, ViolationSummary};

/// Values that decide how a violation row is counted.
#[derive(Debug, Clone, Copy)]
pub struct ViolationRules<'a> {
    /// Health-based flag value meaning "yes".
    pub health_based_flag: &'a str,
    /// Statuses counted as unaddressed.
    pub unaddressed_statuses: &'a BTreeSet<String>,
}

/// Groups the violations of `period` by system and counts them.
#[must_use]
pub fn aggregate_violations<'a>(
    violations: &'a [Violation],
    period: &str,
    rules: &ViolationRules<'_>,
) -> BTreeMap<&'a str, ViolationSummary> {
    let mut summaries: BTreeMap<&str, ViolationSummary> = BTreeMap::new();

    for violation in violations.iter().filter(|v| v.period == period) {
        let summary = summaries.entry(violation.pwsid.as_str()).or_default();
        summary.total += 1;
        if violation.health_based_flag == rules.health_based_flag {
            summary.health += 1;
        }
        if rules.unaddressed_statuses.contains(&violation.status) {
            summary.unaddressed += 1;
        }
    }

    summaries
}

/// Left-joins violation aggregates onto `systems`.
///
/// Systems with no violation rows keep all-zero aggregates, as does every
/// system when `violations` is `None`.
pub fn apply_violations(
    systems: &mut [EnrichedSystem],
    violations: Option<&[Violation]>,
    period: &str,
    rules: &ViolationRules<'_>,
) {
    let Some(violations) = violations else {
        log::warn!("No violation data available, all systems get zero violations");
        for enriched in systems.iter_mut() {
            enriched.violations = ViolationSummary::default();
        }
        return;
    };

    let summaries = aggregate_violations(violations, period, rules);

    let mut with_violations = 0_usize;
    for enriched in systems.iter_mut() {
        enriched.violations = summaries
            .get(enriched.system.pwsid.as_str())
            .copied()
            .unwrap_or_default();
        if enriched.violations.has_violations() {
            with_violations += 1;
        }
    }

    log::info!(
        "Added violation data: {with_violations} of {} systems have violations",
        systems.len()
    );
}
