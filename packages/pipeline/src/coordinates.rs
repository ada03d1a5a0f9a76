//! Coordinate resolution stage.
//!
//! The reference-table lookup is the canonical source: deterministic, no
//! network, no randomness. Systems it cannot place keep `coordinate: None`
//! unless the optional geocoder finds them.

use water_map_geocoder::Geocode;
use water_map_geocoder::cache::CachedGeocoder;
use water_map_locations::{LocationMatch, LocationTable};
use water_map_system_models::EnrichedSystem;

/// How many systems each lookup step placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinateStats {
    /// Matched by served city.
    pub served_city: usize,
    /// Matched by served county.
    pub served_county: usize,
    /// Matched by registered city.
    pub registered_city: usize,
    /// Placed by the external geocoder.
    pub geocoded: usize,
    /// Left without a coordinate.
    pub unresolved: usize,
}

/// Resolves every system against `table`, overwriting any previous
/// coordinate.
pub fn resolve_coordinates(systems: &mut [EnrichedSystem], table: &LocationTable) -> CoordinateStats {
    let mut stats = CoordinateStats::default();

    for enriched in systems.iter_mut() {
        let resolved = table.resolve(
            &enriched.location.city_served,
            &enriched.location.county_served,
            &enriched.system.city_name,
        );

        match resolved.map(|r| r.matched_by) {
            Some(LocationMatch::ServedCity) => stats.served_city += 1,
            Some(LocationMatch::ServedCounty) => stats.served_county += 1,
            Some(LocationMatch::RegisteredCity) => stats.registered_city += 1,
            None => stats.unresolved += 1,
        }

        enriched.coordinate = resolved.map(|r| r.coordinate);
    }

    log::info!(
        "Resolved coordinates: {} by city, {} by county, {} by registered city, {} unresolved",
        stats.served_city,
        stats.served_county,
        stats.registered_city,
        stats.unresolved
    );

    stats
}

/// Builds the free-text geocoding query for a system.
///
/// Uses the most precise known place (ZIP code, then served city, then
/// served county) followed by the served state. Returns `None` when no
/// place is known.
#[must_use]
pub fn geocoding_query(enriched: &EnrichedSystem) -> Option<String> {
    let location = &enriched.location;

    let place = location
        .zip_served
        .as_deref()
        .map(str::trim)
        .filter(|zip| !zip.is_empty())
        .map(ToString::to_string)
        .or_else(|| {
            let city = location.city_served.trim();
            (!city.is_empty()).then(|| city.to_string())
        })
        .or_else(|| {
            let county = location.county_served.trim();
            (!county.is_empty()).then(|| format!("{county} County"))
        })?;

    let state = location.state_served.trim();
    if state.is_empty() {
        Some(place)
    } else {
        Some(format!("{place}, {state}"))
    }
}

/// Geocodes the systems the reference table left unresolved.
///
/// Failures are logged by the geocoder and leave the system unresolved.
pub async fn geocode_unresolved<G: Geocode>(
    systems: &mut [EnrichedSystem],
    geocoder: &mut CachedGeocoder<G>,
    stats: &mut CoordinateStats,
) {
    let pending = systems.iter().filter(|s| !s.has_coordinates()).count();
    if pending == 0 {
        return;
    }
    log::info!("Geocoding {pending} unresolved systems");

    for enriched in systems.iter_mut().filter(|s| !s.has_coordinates()) {
        let Some(query) = geocoding_query(enriched) else {
            continue;
        };

        if let Some(coordinate) = geocoder.lookup(&query).await {
            enriched.coordinate = Some(coordinate);
            stats.geocoded += 1;
            stats.unresolved = stats.unresolved.saturating_sub(1);
        }
    }

    let geocoder_stats = geocoder.stats();
    log::info!(
        "Geocoder placed {} systems ({} requests, {} cache hits, {} failures, {} queries cached)",
        stats.geocoded,
        geocoder_stats.requests,
        geocoder_stats.cache_hits,
        geocoder_stats.failures,
        geocoder.cached_len()
    );
}
