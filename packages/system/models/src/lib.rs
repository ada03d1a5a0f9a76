#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Public water system types shared across the water map workspace.
//!
//! Covers the three raw regulatory extracts (systems, geographic areas,
//! violations), the enriched per-system record built by the pipeline, and
//! the flat output row that the serving layer consumes. Risk tiers and their
//! paired marker colors live here so every consumer agrees on the pairing.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from a latitude/longitude pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One row of the systems extract, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaterSystemRecord {
    /// Public water system identifier (e.g. `"GA0010000"`).
    pub pwsid: String,
    /// Display name.
    pub name: String,
    /// System type code (`CWS`, `NTNCWS`, `TNCWS`).
    pub type_code: String,
    /// Population served. Unparseable source values coerce to 0.
    pub population: u64,
    /// Owner type code.
    pub owner_type_code: String,
    /// Primary water source code.
    pub primary_source_code: String,
    /// City the system is registered in.
    pub city_name: String,
    /// Two-letter jurisdiction code.
    pub state_code: String,
    /// Reporting period tag (e.g. `"2025Q1"`).
    pub period: String,
    /// Activity status code (`A` for active).
    pub activity_code: String,
}

/// The fixed projection of a system that survives the filter stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WaterSystem {
    /// Public water system identifier.
    pub pwsid: String,
    /// Display name.
    pub name: String,
    /// System type code.
    pub type_code: String,
    /// Population served.
    pub population: u64,
    /// Owner type code.
    pub owner_type_code: String,
    /// Primary water source code.
    pub primary_source_code: String,
    /// Registered city.
    pub city_name: String,
    /// Jurisdiction code.
    pub state_code: String,
}

impl From<WaterSystemRecord> for WaterSystem {
    fn from(record: WaterSystemRecord) -> Self {
        Self {
            pwsid: record.pwsid,
            name: record.name,
            type_code: record.type_code,
            population: record.population,
            owner_type_code: record.owner_type_code,
            primary_source_code: record.primary_source_code,
            city_name: record.city_name,
            state_code: record.state_code,
        }
    }
}

/// Kind of service area a geographic-area record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
pub enum AreaType {
    /// `CT`: a served city.
    City,
    /// `CN`: a served county.
    County,
    /// `ZC`: a served ZIP code.
    Zip,
}

impl AreaType {
    /// Maps an `AREA_TYPE_CODE` value to an area type. Codes the pipeline
    /// does not use (tribal areas, etc.) return `None`.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "CT" => Some(Self::City),
            "CN" => Some(Self::County),
            "ZC" => Some(Self::Zip),
            _ => None,
        }
    }
}

/// One claimed service-area relationship from the geographic-areas extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeographicArea {
    /// System this area belongs to.
    pub pwsid: String,
    /// Which kind of place `place_name` is.
    pub area_type: AreaType,
    /// Served city, county, or ZIP code depending on `area_type`.
    pub place_name: String,
    /// Served state.
    pub state_served: String,
    /// Reporting period tag.
    pub period: String,
}

/// One row of the violations extract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Violation {
    /// System the violation was issued against.
    pub pwsid: String,
    /// Violation identifier.
    pub violation_id: String,
    /// Raw `IS_HEALTH_BASED_IND` value.
    pub health_based_flag: String,
    /// Raw `VIOLATION_STATUS` value.
    pub status: String,
    /// Reporting period tag.
    pub period: String,
}

/// Per-system violation aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViolationSummary {
    /// Count of all violations in the period.
    pub total: u64,
    /// Count flagged health-based.
    pub health: u64,
    /// Count whose status is in the unaddressed set.
    pub unaddressed: u64,
}

impl ViolationSummary {
    /// Whether the system had any violation in the period.
    #[must_use]
    pub const fn has_violations(&self) -> bool {
        self.total > 0
    }
}

/// The representative served location picked for a system.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServedLocation {
    /// Served city, defaulting to the registered city.
    pub city_served: String,
    /// Served county, empty when unknown.
    pub county_served: String,
    /// Served state, defaulting to the jurisdiction code.
    pub state_served: String,
    /// Served ZIP code, when the extract has one.
    pub zip_served: Option<String>,
}

/// A filtered system joined with its served location, violation
/// aggregates, and resolved coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedSystem {
    /// The filtered system.
    pub system: WaterSystem,
    /// Representative served location.
    pub location: ServedLocation,
    /// Violation aggregates; zeros when the system has none.
    pub violations: ViolationSummary,
    /// Resolved coordinate, `None` when unknown.
    pub coordinate: Option<Coordinate>,
}

impl EnrichedSystem {
    /// Wraps a system with its location and empty aggregates.
    #[must_use]
    pub fn new(system: WaterSystem, location: ServedLocation) -> Self {
        Self {
            system,
            location,
            violations: ViolationSummary::default(),
            coordinate: None,
        }
    }

    /// Whether a coordinate was resolved for this system.
    #[must_use]
    pub const fn has_coordinates(&self) -> bool {
        self.coordinate.is_some()
    }
}

/// Risk tier derived from violation aggregates.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum RiskLevel {
    /// At least one health-based violation.
    High,
    /// Unaddressed violations but none health-based.
    Medium,
    /// Only addressed, non-health violations.
    Low,
    /// No violations.
    Good,
}

impl RiskLevel {
    /// Returns the marker color paired with this tier.
    #[must_use]
    pub const fn marker_color(self) -> MarkerColor {
        match self {
            Self::High => MarkerColor::Red,
            Self::Medium => MarkerColor::Orange,
            Self::Low => MarkerColor::Yellow,
            Self::Good => MarkerColor::Green,
        }
    }

    /// Returns all tiers, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::High, Self::Medium, Self::Low, Self::Good]
    }
}

/// Map marker color. Always paired 1:1 with a [`RiskLevel`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarkerColor {
    /// High risk.
    Red,
    /// Medium risk.
    Orange,
    /// Low risk.
    Yellow,
    /// Good.
    Green,
}

/// One row of the output artifact.
///
/// Field order matches the artifact's column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolishedSystem {
    /// Public water system identifier.
    pub pwsid: String,
    /// Display name.
    pub name: String,
    /// System type code.
    #[serde(rename = "type")]
    pub system_type: String,
    /// Population served.
    pub population: u64,
    /// Owner type code.
    pub owner_type: String,
    /// Primary water source code.
    pub primary_source: String,
    /// Human-readable served location.
    pub address: String,
    /// Latitude, absent when unknown.
    pub lat: Option<f64>,
    /// Longitude, absent when unknown.
    pub lng: Option<f64>,
    /// Count of all violations in the period.
    pub total_violations: u64,
    /// Count of health-based violations.
    pub health_violations: u64,
    /// Count of unaddressed violations.
    pub unaddressed_violations: u64,
    /// Derived risk tier.
    pub risk_level: RiskLevel,
    /// Marker color paired with `risk_level`.
    pub marker_color: MarkerColor,
    /// Whether `lat`/`lng` hold a resolved coordinate.
    #[serde(default)]
    pub has_coordinates: bool,
}

impl PolishedSystem {
    /// Returns the row's coordinate when both halves are present.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        }
    }
}

/// Column names of the output artifact, in order.
pub const ARTIFACT_COLUMNS: &[&str] = &[
    "pwsid",
    "name",
    "type",
    "population",
    "owner_type",
    "primary_source",
    "address",
    "lat",
    "lng",
    "total_violations",
    "health_violations",
    "unaddressed_violations",
    "risk_level",
    "marker_color",
    "has_coordinates",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_pair_with_colors() {
        let colors: Vec<MarkerColor> = RiskLevel::all()
            .iter()
            .map(|level| level.marker_color())
            .collect();
        assert_eq!(
            colors,
            vec![
                MarkerColor::Red,
                MarkerColor::Orange,
                MarkerColor::Yellow,
                MarkerColor::Green
            ]
        );
    }

    #[test]
    fn risk_level_parses_case_insensitively() {
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert_eq!("Good".parse::<RiskLevel>().unwrap(), RiskLevel::Good);
        assert!("Severe".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn marker_color_displays_lowercase() {
        assert_eq!(MarkerColor::Orange.to_string(), "orange");
        assert_eq!(RiskLevel::Medium.to_string(), "Medium");
    }

    #[test]
    fn area_type_codes() {
        assert_eq!(AreaType::from_code("CT"), Some(AreaType::City));
        assert_eq!(AreaType::from_code(" CN "), Some(AreaType::County));
        assert_eq!(AreaType::from_code("ZC"), Some(AreaType::Zip));
        assert_eq!(AreaType::from_code("TR"), None);
    }

    #[test]
    fn artifact_row_with_unknown_coordinates_reads_back_as_none() {
        let data = "pwsid,name,type,population,owner_type,primary_source,address,lat,lng,\
                    total_violations,health_violations,unaddressed_violations,risk_level,\
                    marker_color,has_coordinates\n\
                    GA0000001,NOWHERE WATER,CWS,120,L,GW,\"NOWHERE, GA\",,,0,0,0,Good,green,false\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<PolishedSystem> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lat, None);
        assert_eq!(rows[0].coordinate(), None);
        assert_eq!(rows[0].system_type, "CWS");
        assert_eq!(rows[0].marker_color, MarkerColor::Green);
        assert!(!rows[0].has_coordinates);
    }

    #[test]
    fn artifact_without_has_coordinates_column_defaults_to_false() {
        let data = "pwsid,name,type,population,owner_type,primary_source,address,lat,lng,\
                    total_violations,health_violations,unaddressed_violations,risk_level,\
                    marker_color\n\
                    GA0000002,CITY OF ATLANTA,CWS,500000,L,SW,\"ATLANTA, GA\",33.749,-84.388,2,1,0,High,red\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<PolishedSystem> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert!(!rows[0].has_coordinates);
        assert_eq!(rows[0].coordinate(), Some(Coordinate::new(33.749, -84.388)));
        assert_eq!(rows[0].risk_level, RiskLevel::High);
    }
}
