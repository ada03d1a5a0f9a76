//! Geographic enrichment stage.
//!
//! Joins service-area records onto each system and picks one served city,
//! county, and ZIP code per system. The join is left-outer: a system with
//! no area records keeps its registered city and gets an empty county.

use std::collections::BTreeMap;

use water_map_system_models::{
    AreaType, EnrichedSystem, GeographicArea, ServedLocation, WaterSystem,
};

use crate::config::TieBreak;

/// One representative area per system for a single area type.
type Representatives<'a> = BTreeMap<&'a str, &'a GeographicArea>;

/// Groups `areas` of one type by system and picks one record per system.
///
/// Records with an empty place name are never picked.
fn representatives<'a>(
    areas: &'a [GeographicArea],
    period: &str,
    area_type: AreaType,
    tie_break: TieBreak,
) -> Representatives<'a> {
    let mut picked: Representatives<'a> = BTreeMap::new();

    for area in areas
        .iter()
        .filter(|a| a.area_type == area_type && a.period == period && !a.place_name.is_empty())
    {
        picked
            .entry(area.pwsid.as_str())
            .and_modify(|current| {
                if tie_break == TieBreak::Lexicographic && area.place_name < current.place_name {
                    *current = area;
                }
            })
            .or_insert(area);
    }

    picked
}

/// Attaches a [`ServedLocation`] to each system.
///
/// When `areas` is `None` (the extract is unavailable), every system is
/// served by its registered city in its own jurisdiction.
#[must_use]
pub fn enrich_geography(
    systems: Vec<WaterSystem>,
    areas: Option<&[GeographicArea]>,
    period: &str,
    tie_break: TieBreak,
) -> Vec<EnrichedSystem> {
    let Some(areas) = areas else {
        log::warn!("No geographic data available, using system city names");
        return systems
            .into_iter()
            .map(|system| {
                let location = ServedLocation {
                    city_served: system.city_name.clone(),
                    county_served: String::new(),
                    state_served: system.state_code.clone(),
                    zip_served: None,
                };
                EnrichedSystem::new(system, location)
            })
            .collect();
    };

    let cities = representatives(areas, period, AreaType::City, tie_break);
    let counties = representatives(areas, period, AreaType::County, tie_break);
    let zips = representatives(areas, period, AreaType::Zip, tie_break);

    let mut matched = 0_usize;
    let enriched: Vec<EnrichedSystem> = systems
        .into_iter()
        .map(|system| {
            let city = cities.get(system.pwsid.as_str());
            let county = counties.get(system.pwsid.as_str());
            let zip = zips.get(system.pwsid.as_str());

            if city.is_some() || county.is_some() || zip.is_some() {
                matched += 1;
            }

            let location = ServedLocation {
                city_served: city.map_or_else(|| system.city_name.clone(), |a| a.place_name.clone()),
                county_served: county.map(|a| a.place_name.clone()).unwrap_or_default(),
                state_served: city
                    .map(|a| a.state_served.as_str())
                    .filter(|s| !s.is_empty())
                    .unwrap_or(system.state_code.as_str())
                    .to_string(),
                zip_served: zip.map(|a| a.place_name.clone()),
            };
            EnrichedSystem::new(system, location)
        })
        .collect();

    log::info!(
        "Added geographic data for {} systems ({matched} with service-area records)",
        enriched.len()
    );

    enriched
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(pwsid: &str, city: &str) -> WaterSystem {
        WaterSystem {
            pwsid: pwsid.to_string(),
            city_name: city.to_string(),
            state_code: "GA".to_string(),
            ..WaterSystem::default()
        }
    }

    fn area(pwsid: &str, area_type: AreaType, place: &str, period: &str) -> GeographicArea {
        GeographicArea {
            pwsid: pwsid.to_string(),
            area_type,
            place_name: place.to_string(),
            state_served: "GA".to_string(),
            period: period.to_string(),
        }
    }

    #[test]
    fn missing_extract_uses_registered_city() {
        let enriched = enrich_geography(
            vec![system("GA1", "BAXLEY"), system("GA2", "")],
            None,
            "2025Q1",
            TieBreak::FirstEncountered,
        );
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].location.city_served, "BAXLEY");
        assert_eq!(enriched[0].location.county_served, "");
        assert_eq!(enriched[0].location.state_served, "GA");
        assert_eq!(enriched[1].location.city_served, "");
    }

    #[test]
    fn joins_city_county_and_zip() {
        let areas = vec![
            area("GA1", AreaType::City, "SURRENCY", "2025Q1"),
            area("GA1", AreaType::County, "APPLING", "2025Q1"),
            area("GA1", AreaType::Zip, "31563", "2025Q1"),
        ];
        let enriched = enrich_geography(
            vec![system("GA1", "BAXLEY")],
            Some(areas.as_slice()),
            "2025Q1",
            TieBreak::FirstEncountered,
        );
        let location = &enriched[0].location;
        assert_eq!(location.city_served, "SURRENCY");
        assert_eq!(location.county_served, "APPLING");
        assert_eq!(location.zip_served.as_deref(), Some("31563"));
    }

    #[test]
    fn ignores_other_periods_and_keeps_unmatched_systems() {
        let areas = vec![area("GA1", AreaType::City, "SURRENCY", "2024Q4")];
        let enriched = enrich_geography(
            vec![system("GA1", "BAXLEY"), system("GA2", "MACON")],
            Some(areas.as_slice()),
            "2025Q1",
            TieBreak::FirstEncountered,
        );
        assert_eq!(enriched.len(), 2);
        assert_eq!(enriched[0].location.city_served, "BAXLEY");
        assert_eq!(enriched[1].location.city_served, "MACON");
        assert_eq!(enriched[1].location.zip_served, None);
    }

    #[test]
    fn first_encountered_tie_break_keeps_extract_order() {
        let areas = vec![
            area("GA1", AreaType::City, "VIDALIA", "2025Q1"),
            area("GA1", AreaType::City, "ALAMO", "2025Q1"),
        ];
        let enriched = enrich_geography(
            vec![system("GA1", "")],
            Some(areas.as_slice()),
            "2025Q1",
            TieBreak::FirstEncountered,
        );
        assert_eq!(enriched[0].location.city_served, "VIDALIA");
    }

    #[test]
    fn lexicographic_tie_break_picks_smallest_name() {
        let areas = vec![
            area("GA1", AreaType::City, "VIDALIA", "2025Q1"),
            area("GA1", AreaType::City, "ALAMO", "2025Q1"),
        ];
        let enriched = enrich_geography(
            vec![system("GA1", "")],
            Some(areas.as_slice()),
            "2025Q1",
            TieBreak::Lexicographic,
        );
        assert_eq!(enriched[0].location.city_served, "ALAMO");
    }

    #[test]
    fn empty_place_names_are_skipped() {
        let areas = vec![
            area("GA1", AreaType::City, "", "2025Q1"),
            area("GA1", AreaType::City, "ROME", "2025Q1"),
        ];
        let enriched = enrich_geography(
            vec![system("GA1", "")],
            Some(areas.as_slice()),
            "2025Q1",
            TieBreak::FirstEncountered,
        );
        assert_eq!(enriched[0].location.city_served, "ROME");
    }

    #[test]
    fn blank_served_state_falls_back_to_jurisdiction() {
        let mut city = area("GA1", AreaType::City, "ROME", "2025Q1");
        city.state_served = String::new();
        let enriched = enrich_geography(
            vec![system("GA1", "")],
            Some(std::slice::from_ref(&city)),
            "2025Q1",
            TieBreak::FirstEncountered,
        );
        assert_eq!(enriched[0].location.state_served, "GA");
    }
}
