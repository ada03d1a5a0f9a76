//! Read-only views over the cached artifact.
//!
//! These only filter, paginate, and count rows. Risk tiers and coordinates
//! come from the artifact as-is.

use std::collections::BTreeMap;

use water_map_server_models::{ApiStats, ApiSystemsPage, SystemQueryParams};
use water_map_system_models::{PolishedSystem, RiskLevel};

/// Which rows to keep by coordinate availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateFilter {
    /// Keep every row.
    Any,
    /// Only rows with a coordinate.
    Known,
    /// Only rows without a coordinate.
    Unknown,
}

impl CoordinateFilter {
    const fn keeps(self, system: &PolishedSystem) -> bool {
        match self {
            Self::Any => true,
            Self::Known => system.has_coordinates,
            Self::Unknown => !system.has_coordinates,
        }
    }
}

fn matches_search(system: &PolishedSystem, needle: &str) -> bool {
    [&system.pwsid, &system.name, &system.address]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Filters and paginates `systems`.
///
/// `params.mappable_only` narrows [`CoordinateFilter::Any`] to
/// [`CoordinateFilter::Known`].
#[must_use]
pub fn select_systems(
    systems: &[PolishedSystem],
    params: &SystemQueryParams,
    coordinates: CoordinateFilter,
) -> ApiSystemsPage {
    let coordinates = if coordinates == CoordinateFilter::Any && params.mappable_only == Some(true)
    {
        CoordinateFilter::Known
    } else {
        coordinates
    };

    let needle = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);

    let matching: Vec<&PolishedSystem> = systems
        .iter()
        .filter(|s| coordinates.keeps(s))
        .filter(|s| params.risk_level.is_none_or(|level| s.risk_level == level))
        .filter(|s| needle.as_deref().is_none_or(|n| matches_search(s, n)))
        .collect();

    let limit = params.limit();
    let offset = params.offset();

    ApiSystemsPage {
        total: matching.len(),
        offset,
        limit,
        systems: matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect(),
    }
}

/// Computes aggregate statistics over `systems`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_stats(systems: &[PolishedSystem]) -> ApiStats {
    let mut risk_levels: BTreeMap<RiskLevel, usize> =
        RiskLevel::all().iter().map(|level| (*level, 0)).collect();
    for system in systems {
        *risk_levels.entry(system.risk_level).or_default() += 1;
    }

    let systems_with_violations = systems.iter().filter(|s| s.total_violations > 0).count();
    let compliance_rate = if systems.is_empty() {
        100.0
    } else {
        (systems.len() - systems_with_violations) as f64 / systems.len() as f64 * 100.0
    };

    ApiStats {
        total_systems: systems.len(),
        systems_with_violations,
        population_served: systems
            .iter()
            .fold(0, |total, s| total.saturating_add(s.population)),
        risk_levels,
        with_coordinates: systems.iter().filter(|s| s.has_coordinates).count(),
        compliance_rate,
    }
}
