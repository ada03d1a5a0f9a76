//! Filter stage: one reporting period, one jurisdiction, active systems.

use water_map_system_models::{WaterSystem, WaterSystemRecord};

use crate::config::PeriodPolicy;

/// Predicates a system must match exactly to be kept.
#[derive(Debug, Clone, Copy)]
pub struct FilterCriteria<'a> {
    /// Requested reporting period.
    pub period: &'a str,
    /// Jurisdiction code.
    pub jurisdiction: &'a str,
    /// Activity-status code meaning active.
    pub active_code: &'a str,
    /// Behavior when `period` is absent.
    pub policy: PeriodPolicy,
}

/// Result of the filter stage.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Systems matching all predicates, in extract order.
    pub systems: Vec<WaterSystem>,
    /// The period actually used.
    pub period: String,
    /// Whether `period` differs from the requested one.
    pub fell_back: bool,
}

/// Picks the period to filter on.
///
/// Under [`PeriodPolicy::Strict`] this is always the requested period.
/// Under [`PeriodPolicy::FallbackToLatest`], if no row of the jurisdiction
/// carries the requested period, the lexicographically last period of the
/// jurisdiction is used instead.
#[must_use]
pub fn resolve_period(records: &[WaterSystemRecord], criteria: &FilterCriteria<'_>) -> String {
    let in_jurisdiction = || {
        records
            .iter()
            .filter(|r| r.state_code == criteria.jurisdiction)
    };

    if in_jurisdiction().any(|r| r.period == criteria.period) {
        return criteria.period.to_string();
    }

    match criteria.policy {
        PeriodPolicy::Strict => {
            log::warn!(
                "Period {} not present for {}; strict policy keeps it",
                criteria.period,
                criteria.jurisdiction
            );
            criteria.period.to_string()
        }
        PeriodPolicy::FallbackToLatest => in_jurisdiction()
            .map(|r| r.period.as_str())
            .filter(|p| !p.is_empty())
            .max()
            .map_or_else(
                || criteria.period.to_string(),
                |latest| {
                    log::warn!(
                        "Period {} not present for {}; falling back to {latest}",
                        criteria.period,
                        criteria.jurisdiction
                    );
                    latest.to_string()
                },
            ),
    }
}

/// Keeps the systems matching the period, jurisdiction, and activity code,
/// projected to the fixed [`WaterSystem`] columns.
#[must_use]
pub fn filter_systems(records: Vec<WaterSystemRecord>, criteria: &FilterCriteria<'_>) -> FilterOutcome {
    let period = resolve_period(&records, criteria);
    let fell_back = period != criteria.period;

    let systems: Vec<WaterSystem> = records
        .into_iter()
        .filter(|r| {
            r.period == period
                && r.state_code == criteria.jurisdiction
                && r.activity_code == criteria.active_code
        })
        .map(WaterSystem::from)
        .collect();

    if systems.is_empty() {
        log::warn!(
            "No active {} systems found for {period}; output will be empty",
            criteria.jurisdiction
        );
    } else {
        log::info!(
            "Found {} active {} water systems for {period}",
            systems.len(),
            criteria.jurisdiction
        );
    }

    FilterOutcome {
        systems,
        period,
        fell_back,
    }
}
