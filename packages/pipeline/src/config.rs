//! Pipeline configuration.
//!
//! Loaded from an optional TOML file; every key has a default, so an empty
//! file (or no file at all) yields the stock Georgia configuration. Callers
//! such as the CLI override individual fields after loading.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "water_map.toml";

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid config {path}: {source}")]
    Parse {
        /// Path of the config file.
        path: String,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

/// What to do when the requested reporting period is absent from the
/// systems extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodPolicy {
    /// Use the requested period as-is; an absent period yields zero rows.
    #[default]
    Strict,
    /// Switch to the lexicographically last period available for the
    /// jurisdiction.
    FallbackToLatest,
}

/// How to pick one representative record when a system has several
/// service-area records of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// First record in extract order.
    #[default]
    FirstEncountered,
    /// Lexicographically smallest place name.
    Lexicographic,
}

/// Optional replacement reference tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LocationsConfig {
    /// `name,latitude,longitude` CSV of cities.
    pub cities_file: Option<PathBuf>,
    /// `name,latitude,longitude` CSV of counties.
    pub counties_file: Option<PathBuf>,
}

/// Optional external geocoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Geocode systems the reference tables cannot place. Also requires
    /// `GOOGLE_MAPS_API_KEY` to be set.
    pub enabled: bool,
    /// Minimum delay between requests, in milliseconds.
    pub rate_limit_ms: u64,
    /// Geocoding endpoint.
    pub base_url: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate_limit_ms: 100,
            base_url: water_map_geocoder::google::DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the extracts.
    pub data_dir: PathBuf,
    /// Systems extract file name, relative to `data_dir`.
    pub systems_file: String,
    /// Geographic-areas extract file name, relative to `data_dir`.
    pub geographic_areas_file: String,
    /// Violations extract file name, relative to `data_dir`.
    pub violations_file: String,
    /// Output artifact. Relative paths resolve against `data_dir`.
    pub output_file: PathBuf,
    /// Target reporting period (e.g. `"2025Q1"`).
    pub period: String,
    /// Behavior when `period` is absent.
    pub period_policy: PeriodPolicy,
    /// Jurisdiction code systems must match.
    pub jurisdiction: String,
    /// Name used as the address when a system has no known place.
    pub jurisdiction_name: String,
    /// Activity-status code meaning active.
    pub active_code: String,
    /// Value of the health-based flag meaning "yes".
    pub health_based_flag: String,
    /// Violation statuses counted as unaddressed.
    pub unaddressed_statuses: BTreeSet<String>,
    /// Representative-record choice for duplicate service areas.
    pub tie_break: TieBreak,
    /// Reference table overrides.
    pub locations: LocationsConfig,
    /// External geocoding.
    pub geocoding: GeocodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            systems_file: "SDWA_PUB_WATER_SYSTEMS.csv".to_string(),
            geographic_areas_file: "SDWA_GEOGRAPHIC_AREAS.csv".to_string(),
            violations_file: "SDWA_VIOLATIONS_ENFORCEMENT.csv".to_string(),
            output_file: PathBuf::from("polished_data.csv"),
            period: "2025Q1".to_string(),
            period_policy: PeriodPolicy::Strict,
            jurisdiction: "GA".to_string(),
            jurisdiction_name: "Georgia".to_string(),
            active_code: "A".to_string(),
            health_based_flag: "Y".to_string(),
            unaddressed_statuses: ["Open", "Unaddressed"]
                .into_iter()
                .map(String::from)
                .collect(),
            tie_break: TieBreak::FirstEncountered,
            locations: LocationsConfig::default(),
            geocoding: GeocodingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] if the string is not a valid config.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(toml_str)
    }

    /// Loads configuration from `path`. With no path, reads
    /// [`DEFAULT_CONFIG_FILE`] when it exists and returns the defaults
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Path of the systems extract.
    #[must_use]
    pub fn systems_path(&self) -> PathBuf {
        self.data_dir.join(&self.systems_file)
    }

    /// Path of the geographic-areas extract.
    #[must_use]
    pub fn geographic_areas_path(&self) -> PathBuf {
        self.data_dir.join(&self.geographic_areas_file)
    }

    /// Path of the violations extract.
    #[must_use]
    pub fn violations_path(&self) -> PathBuf {
        self.data_dir.join(&self.violations_file)
    }

    /// Path of the output artifact.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        if self.output_file.is_absolute() {
            self.output_file.clone()
        } else {
            self.data_dir.join(&self.output_file)
        }
    }
}
