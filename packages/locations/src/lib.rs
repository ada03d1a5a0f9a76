#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location reference tables for water system coordinates.
//!
//! Maps place names (cities and counties) to approximate center
//! coordinates. The Georgia tables under `data/` are baked into the binary
//! via [`include_str!`]; any other jurisdiction can be supplied as a pair of
//! `name,latitude,longitude` CSV files.
//!
//! Resolution follows a fixed chain, stopping at the first hit:
//!
//! 1. served city against the city table
//! 2. served county (trailing `County` stripped) against the county table
//! 3. registered city against the city table
//!
//! Lookups are case-insensitive exact matches. There is no fuzzy matching
//! and no synthetic fallback: a miss is reported as a miss.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use water_map_system_models::Coordinate;

const GEORGIA_CITIES: &str = include_str!("../data/ga_cities.csv");
const GEORGIA_COUNTIES: &str = include_str!("../data/ga_counties.csv");

/// Errors from loading a reference table.
#[derive(Debug, Error)]
pub enum LocationError {
    /// The table file could not be opened.
    #[error("Failed to open location table {path}: {source}")]
    Io {
        /// Path of the table file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A row could not be parsed.
    #[error("Invalid location table row: {0}")]
    Csv(#[from] csv::Error),

    /// A coordinate is outside the valid WGS84 range.
    #[error("Coordinate out of range for {name}: ({latitude}, {longitude})")]
    OutOfRange {
        /// Place name of the offending row.
        name: String,
        /// Latitude as read.
        latitude: f64,
        /// Longitude as read.
        longitude: f64,
    },
}

/// Which step of the lookup chain produced a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationMatch {
    /// The served city matched the city table.
    ServedCity,
    /// The served county matched the county table.
    ServedCounty,
    /// The registered city matched the city table.
    RegisteredCity,
}

/// A coordinate found by [`LocationTable::resolve`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    /// The table coordinate.
    pub coordinate: Coordinate,
    /// Which lookup step matched.
    pub matched_by: LocationMatch,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    name: String,
    latitude: f64,
    longitude: f64,
}

/// City and county coordinate tables for one jurisdiction.
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    cities: BTreeMap<String, Coordinate>,
    counties: BTreeMap<String, Coordinate>,
}

impl LocationTable {
    /// Returns the embedded Georgia tables.
    ///
    /// # Panics
    ///
    /// Panics if the embedded CSV data is malformed (a build-time asset, so
    /// this cannot happen for a released binary).
    #[must_use]
    pub fn georgia() -> Self {
        let cities = parse_table(GEORGIA_CITIES.as_bytes())
            .unwrap_or_else(|e| panic!("Embedded Georgia city table is invalid: {e}"));
        let counties = parse_table(GEORGIA_COUNTIES.as_bytes())
            .unwrap_or_else(|e| panic!("Embedded Georgia county table is invalid: {e}"));
        Self { cities, counties }
    }

    #[cfg(test)]
    fn from_entries<C, N>(cities: C, counties: N) -> Self
    where
        C: IntoIterator<Item = (String, Coordinate)>,
        N: IntoIterator<Item = (String, Coordinate)>,
    {
        Self {
            cities: cities
                .into_iter()
                .map(|(name, coord)| (normalize_place(&name), coord))
                .collect(),
            counties: counties
                .into_iter()
                .map(|(name, coord)| (normalize_county(&name), coord))
                .collect(),
        }
    }

    /// Loads a table, reading each half from the given CSV file or falling
    /// back to the embedded Georgia data when no path is given.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if a file cannot be opened or contains an
    /// invalid row.
    pub fn load(cities: Option<&Path>, counties: Option<&Path>) -> Result<Self, LocationError> {
        let mut table = Self::georgia();

        if let Some(path) = cities {
            table.cities = parse_table(open(path)?)?;
            log::info!(
                "Loaded {} city locations from {}",
                table.cities.len(),
                path.display()
            );
        }

        if let Some(path) = counties {
            table.counties = parse_table(open(path)?)?
                .into_iter()
                .map(|(name, coord)| (normalize_county(&name), coord))
                .collect();
            log::info!(
                "Loaded {} county locations from {}",
                table.counties.len(),
                path.display()
            );
        }

        Ok(table)
    }

    /// Number of cities in the table.
    #[must_use]
    pub fn city_count(&self) -> usize {
        self.cities.len()
    }

    /// Number of counties in the table.
    #[must_use]
    pub fn county_count(&self) -> usize {
        self.counties.len()
    }

    /// Looks up a city by name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn city_coordinates(&self, name: &str) -> Option<Coordinate> {
        let key = normalize_place(name);
        if key.is_empty() {
            return None;
        }
        self.cities.get(&key).copied()
    }

    /// Looks up a county by name, ignoring case and a trailing `County`.
    #[must_use]
    pub fn county_coordinates(&self, name: &str) -> Option<Coordinate> {
        let key = normalize_county(name);
        if key.is_empty() {
            return None;
        }
        self.counties.get(&key).copied()
    }

    /// Runs the lookup chain: served city, then served county, then the
    /// registered city. Returns `None` when nothing matches.
    #[must_use]
    pub fn resolve(
        &self,
        city: &str,
        county: &str,
        fallback_city: &str,
    ) -> Option<ResolvedLocation> {
        if let Some(coordinate) = self.city_coordinates(city) {
            return Some(ResolvedLocation {
                coordinate,
                matched_by: LocationMatch::ServedCity,
            });
        }

        if let Some(coordinate) = self.county_coordinates(county) {
            return Some(ResolvedLocation {
                coordinate,
                matched_by: LocationMatch::ServedCounty,
            });
        }

        self.city_coordinates(fallback_city)
            .map(|coordinate| ResolvedLocation {
                coordinate,
                matched_by: LocationMatch::RegisteredCity,
            })
    }
}

/// Uppercases and trims a place name for table lookup.
#[must_use]
pub fn normalize_place(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Normalizes a county name, dropping a trailing `County` suffix.
#[must_use]
pub fn normalize_county(name: &str) -> String {
    let upper = normalize_place(name);
    upper
        .strip_suffix(" COUNTY")
        .map_or_else(|| upper.clone(), |stripped| stripped.trim_end().to_string())
}

fn open(path: &Path) -> Result<std::fs::File, LocationError> {
    std::fs::File::open(path).map_err(|source| LocationError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn parse_table<R: Read>(reader: R) -> Result<BTreeMap<String, Coordinate>, LocationError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut table = BTreeMap::new();
    for row in csv_reader.deserialize::<TableRow>() {
        let row = row?;

        if !(-90.0..=90.0).contains(&row.latitude) || !(-180.0..=180.0).contains(&row.longitude)
        {
            return Err(LocationError::OutOfRange {
                name: row.name,
                latitude: row.latitude,
                longitude: row.longitude,
            });
        }

        let key = normalize_place(&row.name);
        if table
            .insert(key, Coordinate::new(row.latitude, row.longitude))
            .is_some()
        {
            log::debug!("Duplicate location table entry for {}; keeping last", row.name);
        }
    }

    Ok(table)
}
