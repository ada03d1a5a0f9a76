#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record-linkage and enrichment pipeline for public water system
//! extracts.
//!
//! Reads three regulatory extracts (systems, geographic service areas,
//! violations) from a data directory and produces one flat CSV artifact
//! with one row per active system in the target jurisdiction and reporting
//! period. Stages run in a fixed order:
//!
//! 1. [`filter`]: period, jurisdiction, and activity filter
//! 2. [`geographic`]: served city/county/state per system
//! 3. [`violations`]: violation aggregates per system
//! 4. [`coordinates`]: reference-table lookup, optional geocoding
//! 5. [`risk`] and [`output`]: classification and artifact assembly
//!
//! Every join is left-outer. A system is never dropped because area,
//! violation, or coordinate data is missing; absence becomes empty or zero
//! values and `has_coordinates = false`.
//!
//! Only a missing or unreadable systems extract aborts a run. Missing area
//! or violation extracts degrade to empty enrichment. A run either writes
//! the whole artifact or leaves the previous one untouched.

pub mod config;
pub mod coordinates;
pub mod filter;
pub mod geographic;
pub mod loader;
pub mod output;
pub mod progress;
pub mod risk;
pub mod violations;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use water_map_geocoder::cache::CachedGeocoder;
use water_map_geocoder::google::GoogleGeocoder;
use water_map_locations::{LocationError, LocationTable};
use water_map_system_models::{
    EnrichedSystem, GeographicArea, PolishedSystem, RiskLevel, Violation, WaterSystemRecord,
};

use crate::config::{ConfigError, PipelineConfig};
use crate::coordinates::CoordinateStats;
use crate::filter::FilterCriteria;
use crate::loader::LoadError;
use crate::output::ArtifactError;
use crate::progress::ProgressCallback;
use crate::violations::ViolationRules;

/// Number of progress steps reported by [`run`].
pub const RUN_STEPS: u64 = 7;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The systems extract does not exist.
    #[error("Systems extract not found at {}", .path.display())]
    MissingSystemsExtract {
        /// Expected extract location.
        path: PathBuf,
    },

    /// The systems extract exists but could not be read.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A reference table override could not be loaded.
    #[error(transparent)]
    Locations(#[from] LocationError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The artifact could not be written.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// The three parsed extracts.
///
/// `areas` and `violations` are `None` when their extract is missing or
/// unreadable.
#[derive(Debug, Clone, Default)]
pub struct Extracts {
    /// Every row of the systems extract.
    pub systems: Vec<WaterSystemRecord>,
    /// Geographic-area rows, if available.
    pub areas: Option<Vec<GeographicArea>>,
    /// Violation rows, if available.
    pub violations: Option<Vec<Violation>>,
}

impl Extracts {
    /// Loads the extracts named by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MissingSystemsExtract`] if the systems
    /// extract is absent and [`PipelineError::Load`] if it cannot be parsed.
    pub fn load(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let systems_path = config.systems_path();
        let systems = loader::load_table(&systems_path)
            .and_then(|table| loader::systems_from_table(&table))
            .map_err(|e| match e {
                LoadError::MissingInputFile { path } => {
                    PipelineError::MissingSystemsExtract { path }
                }
                other => PipelineError::Load(other),
            })?;

        let areas = loader::load_optional(
            &config.geographic_areas_path(),
            "geographic areas",
            loader::areas_from_table,
        );
        let violations = loader::load_optional(
            &config.violations_path(),
            "violations",
            loader::violations_from_table,
        );

        Ok(Self {
            systems,
            areas,
            violations,
        })
    }
}

/// Output of the synchronous stages.
#[derive(Debug, Clone)]
pub struct Processed {
    /// Enriched systems in filter order.
    pub systems: Vec<EnrichedSystem>,
    /// Reporting period actually used.
    pub period: String,
    /// Whether the period fell back from the requested one.
    pub fell_back: bool,
    /// Coordinate resolution counts.
    pub coordinate_stats: CoordinateStats,
}

/// Runs the filter, geographic, violation, and coordinate stages.
///
/// Deterministic and free of I/O: the same extracts, config, and table
/// always give the same result.
#[must_use]
pub fn process(extracts: Extracts, config: &PipelineConfig, table: &LocationTable) -> Processed {
    let Extracts {
        systems,
        areas,
        violations,
    } = extracts;

    let criteria = FilterCriteria {
        period: &config.period,
        jurisdiction: &config.jurisdiction,
        active_code: &config.active_code,
        policy: config.period_policy,
    };
    let filtered = filter::filter_systems(systems, &criteria);
    let period = filtered.period;

    let mut enriched = geographic::enrich_geography(
        filtered.systems,
        areas.as_deref(),
        &period,
        config.tie_break,
    );

    let rules = ViolationRules {
        health_based_flag: &config.health_based_flag,
        unaddressed_statuses: &config.unaddressed_statuses,
    };
    violations::apply_violations(&mut enriched, violations.as_deref(), &period, &rules);

    let coordinate_stats = coordinates::resolve_coordinates(&mut enriched, table);

    Processed {
        systems: enriched,
        period,
        fell_back: filtered.fell_back,
        coordinate_stats,
    }
}

/// Projects enriched systems to artifact rows, preserving order.
#[must_use]
pub fn polish_all(systems: &[EnrichedSystem], jurisdiction_name: &str) -> Vec<PolishedSystem> {
    systems
        .iter()
        .map(|s| output::polish(s, jurisdiction_name))
        .collect()
}

/// Loads the reference table named by `config`, defaulting to the
/// embedded Georgia tables.
///
/// # Errors
///
/// Returns [`PipelineError::Locations`] if an override file is unreadable.
pub fn location_table(config: &PipelineConfig) -> Result<LocationTable, PipelineError> {
    Ok(LocationTable::load(
        config.locations.cities_file.as_deref(),
        config.locations.counties_file.as_deref(),
    )?)
}

/// Aggregate figures reported after a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Rows written.
    pub total_systems: usize,
    /// Rows with at least one violation.
    pub systems_with_violations: usize,
    /// Rows classified [`RiskLevel::High`].
    pub high_risk: usize,
    /// Rows with a coordinate.
    pub with_coordinates: usize,
    /// Rows without a coordinate.
    pub without_coordinates: usize,
    /// Mean population served, 0 for an empty artifact.
    pub mean_population: f64,
    /// Reporting period actually used.
    pub period: String,
    /// Whether the period fell back from the requested one.
    pub fell_back: bool,
    /// Where the artifact was written.
    pub artifact_path: PathBuf,
    /// Artifact size in bytes.
    pub artifact_bytes: u64,
}

impl RunSummary {
    /// Computes the summary for a written artifact.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        rows: &[PolishedSystem],
        processed: &Processed,
        artifact_path: PathBuf,
        artifact_bytes: u64,
    ) -> Self {
        let with_coordinates = rows.iter().filter(|r| r.has_coordinates).count();
        let total_population = rows
            .iter()
            .fold(0_u64, |total, r| total.saturating_add(r.population));
        let mean_population = if rows.is_empty() {
            0.0
        } else {
            total_population as f64 / rows.len() as f64
        };

        Self {
            total_systems: rows.len(),
            systems_with_violations: rows.iter().filter(|r| r.total_violations > 0).count(),
            high_risk: rows
                .iter()
                .filter(|r| r.risk_level == RiskLevel::High)
                .count(),
            with_coordinates,
            without_coordinates: rows.len() - with_coordinates,
            mean_population,
            period: processed.period.clone(),
            fell_back: processed.fell_back,
            artifact_path,
            artifact_bytes,
        }
    }

    /// Artifact size in kilobytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn artifact_kb(&self) -> f64 {
        self.artifact_bytes as f64 / 1024.0
    }

    /// Logs the summary at info level.
    pub fn log(&self) {
        log::info!("=== Processing summary ===");
        if self.fell_back {
            log::info!("Period: {} (fallback)", self.period);
        } else {
            log::info!("Period: {}", self.period);
        }
        log::info!("Total systems: {}", self.total_systems);
        log::info!("Systems with violations: {}", self.systems_with_violations);
        log::info!("High risk systems: {}", self.high_risk);
        log::info!("Systems with coordinates: {}", self.with_coordinates);
        log::info!("Systems without coordinates: {}", self.without_coordinates);
        log::info!("Average population served: {:.0}", self.mean_population);
        log::info!(
            "Artifact: {} ({:.1} KB)",
            self.artifact_path.display(),
            self.artifact_kb()
        );
        if self.total_systems == 0 {
            log::warn!("Artifact is empty: no systems matched the filter");
        }
    }
}

/// Runs the whole pipeline and writes the artifact.
///
/// Geocoding runs only when `config.geocoding.enabled` is set and the
/// `GOOGLE_MAPS_API_KEY` environment variable holds a credential.
///
/// # Errors
///
/// Returns [`PipelineError`] if the systems extract is missing or
/// unreadable, a reference table override cannot be loaded, or the artifact
/// cannot be written. Nothing is written on error.
pub async fn run(
    config: &PipelineConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RunSummary, PipelineError> {
    progress.set_total(RUN_STEPS);

    progress.set_message("Loading reference tables".to_string());
    let table = location_table(config)?;
    log::info!(
        "Location table: {} cities, {} counties",
        table.city_count(),
        table.county_count()
    );
    progress.inc(1);

    progress.set_message("Loading extracts".to_string());
    let extracts = Extracts::load(config)?;
    progress.inc(1);

    progress.set_message("Filtering, joining, resolving coordinates".to_string());
    let mut processed = process(extracts, config, &table);
    progress.inc(1);

    progress.set_message("Geocoding".to_string());
    if config.geocoding.enabled {
        if let Some(google) = GoogleGeocoder::from_env(&config.geocoding.base_url) {
            let mut geocoder = CachedGeocoder::new(google, config.geocoding.rate_limit_ms);
            coordinates::geocode_unresolved(
                &mut processed.systems,
                &mut geocoder,
                &mut processed.coordinate_stats,
            )
            .await;
        } else {
            log::info!(
                "Geocoding enabled but {} is not set; skipping",
                water_map_geocoder::google::API_KEY_ENV
            );
        }
    }
    progress.inc(1);

    progress.set_message("Classifying risk".to_string());
    risk::log_distribution(&risk::distribution(
        processed.systems.iter().map(|s| &s.violations),
    ));
    let rows = polish_all(&processed.systems, &config.jurisdiction_name);
    progress.inc(1);

    progress.set_message("Writing artifact".to_string());
    let artifact_path = config.output_path();
    let artifact_bytes = output::write_artifact(&artifact_path, &rows)?;
    progress.inc(1);

    let summary = RunSummary::new(&rows, &processed, artifact_path, artifact_bytes);
    summary.log();
    progress.inc(1);
    progress.finish(format!("Processed {} systems", summary.total_systems));

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use water_map_system_models::{AreaType, Coordinate, MarkerColor};

    use super::*;

    const SYSTEMS_CSV: &str = "\
PWSID,PWS_NAME,PWS_TYPE_CODE,POPULATION_SERVED_COUNT,OWNER_TYPE_CODE,PRIMARY_SOURCE_CODE,CITY_NAME,STATE_CODE,SUBMISSIONYEARQUARTER,PWS_ACTIVITY_CODE
GA0010000,ATLANTA WATER,CWS,500000,L,SW,ATLANTA,GA,2025Q1,A
GA0010001,BAXLEY WATER,CWS,4400,L,GW,BAXLEY,GA,2025Q1,A
GA0010002,LOST WATER,NTNCWS,abc,P,GW,NOWHERE,GA,2025Q1,A
GA0010003,CLOSED WATER,CWS,100,L,GW,MACON,GA,2025Q1,I
GA0010004,OLD WATER,CWS,100,L,GW,MACON,GA,2024Q4,A
AL0010000,ALABAMA WATER,CWS,100,L,GW,MOBILE,AL,2025Q1,A
";

    const AREAS_CSV: &str = "\
PWSID,AREA_TYPE_CODE,CITY_SERVED,COUNTY_SERVED,ZIP_CODE_SERVED,STATE_SERVED,SUBMISSIONYEARQUARTER
GA0010000,CT,ATLANTA,,,GA,2025Q1
GA0010000,CN,,FULTON,,GA,2025Q1
GA0010001,CT,SURRENCY,,,GA,2025Q1
GA0010001,CN,,APPLING,,GA,2025Q1
GA0010002,CT,\"NOWHERE, NO SUCH PLACE\",,,GA,2025Q1
";

    const VIOLATIONS_CSV: &str = "\
PWSID,VIOLATION_ID,IS_HEALTH_BASED_IND,VIOLATION_STATUS,SUBMISSIONYEARQUARTER
GA0010001,1,Y,Resolved,2025Q1
GA0010001,2,N,Archived,2025Q1
GA0010001,3,N,Resolved,2025Q1
GA0010002,4,N,Open,2025Q1
GA0010000,5,Y,Open,2024Q4
";

    fn write_fixtures(dir: &Path, areas: bool, violations: bool) -> PipelineConfig {
        std::fs::write(dir.join("SDWA_PUB_WATER_SYSTEMS.csv"), SYSTEMS_CSV).unwrap();
        if areas {
            std::fs::write(dir.join("SDWA_GEOGRAPHIC_AREAS.csv"), AREAS_CSV).unwrap();
        }
        if violations {
            std::fs::write(dir.join("SDWA_VIOLATIONS_ENFORCEMENT.csv"), VIOLATIONS_CSV).unwrap();
        }
        PipelineConfig {
            data_dir: dir.to_path_buf(),
            ..PipelineConfig::default()
        }
    }

    fn run_sync(config: &PipelineConfig) -> Vec<PolishedSystem> {
        let extracts = Extracts::load(config).unwrap();
        let processed = process(extracts, config, &LocationTable::georgia());
        polish_all(&processed.systems, &config.jurisdiction_name)
    }

    fn row<'a>(rows: &'a [PolishedSystem], pwsid: &str) -> &'a PolishedSystem {
        rows.iter().find(|r| r.pwsid == pwsid).unwrap()
    }

    #[test]
    fn every_filtered_system_appears_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        let rows = run_sync(&config);

        let ids: Vec<&str> = rows.iter().map(|r| r.pwsid.as_str()).collect();
        assert_eq!(ids, vec!["GA0010000", "GA0010001", "GA0010002"]);
    }

    #[test]
    fn counts_are_bounded_by_total_and_colors_follow_risk() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);

        for r in run_sync(&config) {
            assert!(r.health_violations <= r.total_violations);
            assert!(r.unaddressed_violations <= r.total_violations);
            let expected = if r.health_violations > 0 {
                RiskLevel::High
            } else if r.unaddressed_violations > 0 {
                RiskLevel::Medium
            } else if r.total_violations > 0 {
                RiskLevel::Low
            } else {
                RiskLevel::Good
            };
            assert_eq!(r.risk_level, expected);
            assert_eq!(r.marker_color, expected.marker_color());
            assert_eq!(r.has_coordinates, r.coordinate().is_some());
        }
    }

    #[test]
    fn repeated_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        assert_eq!(run_sync(&config), run_sync(&config));
    }

    #[test]
    fn served_city_wins_over_county() {
        let table = LocationTable::georgia();
        let mut extracts = Extracts {
            systems: vec![WaterSystemRecord {
                pwsid: "GA1".to_string(),
                city_name: "MACON".to_string(),
                state_code: "GA".to_string(),
                period: "2025Q1".to_string(),
                activity_code: "A".to_string(),
                ..WaterSystemRecord::default()
            }],
            ..Extracts::default()
        };
        extracts.areas = Some(vec![
            GeographicArea {
                pwsid: "GA1".to_string(),
                area_type: AreaType::City,
                place_name: "SAVANNAH".to_string(),
                state_served: "GA".to_string(),
                period: "2025Q1".to_string(),
            },
            GeographicArea {
                pwsid: "GA1".to_string(),
                area_type: AreaType::County,
                place_name: "FULTON".to_string(),
                state_served: "GA".to_string(),
                period: "2025Q1".to_string(),
            },
        ]);

        let processed = process(extracts, &PipelineConfig::default(), &table);
        assert_eq!(
            processed.systems[0].coordinate,
            Some(Coordinate::new(32.0835, -81.0998))
        );
    }

    #[test]
    fn atlanta_without_violations_is_good_and_placed() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        let rows = run_sync(&config);
        let atlanta = row(&rows, "GA0010000");

        assert_eq!(atlanta.total_violations, 0);
        assert_eq!(atlanta.risk_level, RiskLevel::Good);
        assert_eq!(atlanta.marker_color, MarkerColor::Green);
        assert_eq!(atlanta.coordinate(), Some(Coordinate::new(33.749, -84.388)));
        assert!(atlanta.has_coordinates);
        assert_eq!(atlanta.address, "ATLANTA, FULTON County, GA");
    }

    #[test]
    fn health_violation_makes_system_high_risk() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        let rows = run_sync(&config);
        let baxley = row(&rows, "GA0010001");

        assert_eq!(baxley.total_violations, 3);
        assert_eq!(baxley.health_violations, 1);
        assert_eq!(baxley.unaddressed_violations, 0);
        assert_eq!(baxley.risk_level, RiskLevel::High);
        assert_eq!(baxley.marker_color, MarkerColor::Red);
    }

    #[test]
    fn unknown_place_has_no_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        let rows = run_sync(&config);
        let lost = row(&rows, "GA0010002");

        assert!(!lost.has_coordinates);
        assert_eq!(lost.lat, None);
        assert_eq!(lost.lng, None);
        assert_eq!(lost.population, 0);
        assert_eq!(lost.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn missing_areas_extract_uses_registered_city() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), false, true);
        let extracts = Extracts::load(&config).unwrap();
        assert!(extracts.areas.is_none());

        let processed = process(extracts, &config, &LocationTable::georgia());
        assert_eq!(processed.systems.len(), 3);
        for enriched in &processed.systems {
            assert_eq!(enriched.location.city_served, enriched.system.city_name);
            assert_eq!(enriched.location.county_served, "");
        }
        assert_eq!(processed.coordinate_stats.served_city, 2);
        assert_eq!(processed.coordinate_stats.unresolved, 1);
        assert_eq!(
            processed.systems[1].coordinate,
            Some(Coordinate::new(31.7793, -82.347))
        );
    }

    #[test]
    fn missing_violations_extract_is_all_good() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, false);
        let rows = run_sync(&config);

        assert_eq!(rows.len(), 3);
        for r in &rows {
            assert_eq!(r.total_violations, 0);
            assert_eq!(r.health_violations, 0);
            assert_eq!(r.unaddressed_violations, 0);
            assert_eq!(r.risk_level, RiskLevel::Good);
        }
    }

    #[test]
    fn missing_systems_extract_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            Extracts::load(&config),
            Err(PipelineError::MissingSystemsExtract { .. })
        ));
    }

    #[tokio::test]
    async fn run_writes_artifact_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);

        let summary = run(&config, progress::null_progress()).await.unwrap();

        assert_eq!(summary.total_systems, 3);
        assert_eq!(summary.systems_with_violations, 2);
        assert_eq!(summary.high_risk, 1);
        assert_eq!(summary.with_coordinates, 2);
        assert_eq!(summary.without_coordinates, 1);
        assert_eq!(summary.period, "2025Q1");
        assert!(!summary.fell_back);
        assert!(summary.artifact_bytes > 0);

        let written = output::read_artifact(&config.output_path()).unwrap();
        assert_eq!(written.len(), 3);
    }

    #[tokio::test]
    async fn failed_run_leaves_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        run(&config, progress::null_progress()).await.unwrap();
        let before = std::fs::read_to_string(config.output_path()).unwrap();

        std::fs::remove_file(config.systems_path()).unwrap();
        assert!(run(&config, progress::null_progress()).await.is_err());

        assert_eq!(std::fs::read_to_string(config.output_path()).unwrap(), before);
    }

    #[test]
    fn summary_population_saturates_instead_of_overflowing() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_fixtures(dir.path(), true, true);
        let mut rows = run_sync(&config);
        for row in &mut rows {
            row.population = u64::MAX;
        }
        let processed = Processed {
            systems: Vec::new(),
            period: "2025Q1".to_string(),
            fell_back: false,
            coordinate_stats: CoordinateStats::default(),
        };

        let summary = RunSummary::new(&rows, &processed, config.output_path(), 0);

        assert!((summary.mean_population - u64::MAX as f64 / 3.0).abs() < 1.0e6);
    }

    #[tokio::test]
    async fn fallback_period_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = write_fixtures(dir.path(), true, true);
        config.period = "2030Q1".to_string();
        config.period_policy = config::PeriodPolicy::FallbackToLatest;

        let summary = run(&config, progress::null_progress()).await.unwrap();
        assert_eq!(summary.period, "2025Q1");
        assert!(summary.fell_back);
        assert_eq!(summary.total_systems, 3);
    }
}
