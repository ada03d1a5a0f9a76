//! Extract loading.
//!
//! Reads a raw CSV extract (header row, one record per line) and maps its
//! columns onto the typed records in `water_map_system_models`. Short rows
//! are tolerated and fields are decoded lossily, so a single odd row never
//! aborts a load; only unreadable files and missing required columns do.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use water_map_system_models::{AreaType, GeographicArea, Violation, WaterSystemRecord};

/// Errors from loading an extract.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The extract file does not exist.
    #[error("File not found: {}", .path.display())]
    MissingInputFile {
        /// Expected path.
        path: PathBuf,
    },

    /// A column the stage depends on is absent from the header row.
    #[error("{} is missing required column {column}", .path.display())]
    MissingColumn {
        /// Extract path.
        path: PathBuf,
        /// Missing column name.
        column: String,
    },

    /// The file could not be read as CSV.
    #[error("Failed to parse {}: {source}", .path.display())]
    ParseFailure {
        /// Extract path.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

/// A loaded extract: its header row and every data row as strings.
#[derive(Debug, Clone)]
pub struct RawTable {
    path: PathBuf,
    columns: BTreeMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the extract has no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Path the table was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn required(&self, column: &str) -> Result<Column, LoadError> {
        self.columns
            .get(column)
            .map(|&idx| Column(Some(idx)))
            .ok_or_else(|| LoadError::MissingColumn {
                path: self.path.clone(),
                column: column.to_string(),
            })
    }

    fn optional(&self, column: &str) -> Column {
        let found = self.columns.get(column).copied();
        if found.is_none() {
            log::warn!(
                "{} has no {column} column; treating it as empty",
                self.path.display()
            );
        }
        Column(found)
    }
}

/// Index of a column in a [`RawTable`], or `None` for an absent optional
/// column.
#[derive(Debug, Clone, Copy)]
struct Column(Option<usize>);

impl Column {
    fn get(self, row: &[String]) -> &str {
        self.0
            .and_then(|idx| row.get(idx))
            .map_or("", String::as_str)
    }
}

/// Reads an extract from disk.
///
/// # Errors
///
/// Returns [`LoadError::MissingInputFile`] if `path` does not exist and
/// [`LoadError::ParseFailure`] if it cannot be read as CSV.
pub fn load_table(path: &Path) -> Result<RawTable, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingInputFile {
            path: path.to_path_buf(),
        });
    }

    let parse_failure = |source| LoadError::ParseFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(parse_failure)?;

    let columns: BTreeMap<String, usize> = reader
        .byte_headers()
        .map_err(parse_failure)?
        .iter()
        .enumerate()
        .map(|(idx, h)| {
            let name = String::from_utf8_lossy(h);
            (name.trim().trim_start_matches('\u{feff}').to_string(), idx)
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(parse_failure)?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).trim().to_string())
                .collect(),
        );
    }

    log::info!("Loaded {} records from {}", rows.len(), display_name(path));

    Ok(RawTable {
        path: path.to_path_buf(),
        columns,
        rows,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Parses a population count, coercing anything unusable to 0.
///
/// Accepts plain integers and finite decimals (`"1200.0"`); decimals are
/// truncated. Negative, non-numeric, and empty values become 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_population(raw: &str) -> u64 {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => n.trunc() as u64,
        _ => 0,
    }
}

/// Maps a systems extract onto [`WaterSystemRecord`]s.
///
/// # Errors
///
/// Returns [`LoadError::MissingColumn`] if an identity or filter column is
/// absent.
pub fn systems_from_table(table: &RawTable) -> Result<Vec<WaterSystemRecord>, LoadError> {
    let pwsid = table.required("PWSID")?;
    let period = table.required("SUBMISSIONYEARQUARTER")?;
    let state = table.required("STATE_CODE")?;
    let activity = table.required("PWS_ACTIVITY_CODE")?;
    let name = table.optional("PWS_NAME");
    let type_code = table.optional("PWS_TYPE_CODE");
    let population = table.optional("POPULATION_SERVED_COUNT");
    let owner = table.optional("OWNER_TYPE_CODE");
    let source = table.optional("PRIMARY_SOURCE_CODE");
    let city = table.optional("CITY_NAME");

    let mut coerced = 0_u64;
    let records = table
        .rows
        .iter()
        .map(|row| {
            let raw_population = population.get(row);
            let parsed = parse_population(raw_population);
            if parsed == 0 && !raw_population.is_empty() && raw_population.parse::<f64>().is_err()
            {
                coerced += 1;
            }
            WaterSystemRecord {
                pwsid: pwsid.get(row).to_string(),
                name: name.get(row).to_string(),
                type_code: type_code.get(row).to_string(),
                population: parsed,
                owner_type_code: owner.get(row).to_string(),
                primary_source_code: source.get(row).to_string(),
                city_name: city.get(row).to_string(),
                state_code: state.get(row).to_string(),
                period: period.get(row).to_string(),
                activity_code: activity.get(row).to_string(),
            }
        })
        .collect();

    if coerced > 0 {
        log::warn!(
            "Coerced {coerced} unparseable population values to 0 in {}",
            table.path().display()
        );
    }

    Ok(records)
}

/// Maps a geographic-areas extract onto [`GeographicArea`]s. Rows with an
/// area type other than city, county, or ZIP are skipped.
///
/// # Errors
///
/// Returns [`LoadError::MissingColumn`] if the identity, area type, or
/// period column is absent.
pub fn areas_from_table(table: &RawTable) -> Result<Vec<GeographicArea>, LoadError> {
    let pwsid = table.required("PWSID")?;
    let area_type = table.required("AREA_TYPE_CODE")?;
    let period = table.required("SUBMISSIONYEARQUARTER")?;
    let city = table.optional("CITY_SERVED");
    let county = table.optional("COUNTY_SERVED");
    let zip = table.optional("ZIP_CODE_SERVED");
    let state = table.optional("STATE_SERVED");

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            let kind = AreaType::from_code(area_type.get(row))?;
            let place = match kind {
                AreaType::City => city.get(row),
                AreaType::County => county.get(row),
                AreaType::Zip => zip.get(row),
            };
            Some(GeographicArea {
                pwsid: pwsid.get(row).to_string(),
                area_type: kind,
                place_name: place.to_string(),
                state_served: state.get(row).to_string(),
                period: period.get(row).to_string(),
            })
        })
        .collect())
}

/// Maps a violations extract onto [`Violation`]s.
///
/// # Errors
///
/// Returns [`LoadError::MissingColumn`] if the identity, health flag,
/// status, or period column is absent.
pub fn violations_from_table(table: &RawTable) -> Result<Vec<Violation>, LoadError> {
    let pwsid = table.required("PWSID")?;
    let health = table.required("IS_HEALTH_BASED_IND")?;
    let status = table.required("VIOLATION_STATUS")?;
    let period = table.required("SUBMISSIONYEARQUARTER")?;
    let violation_id = table.optional("VIOLATION_ID");

    Ok(table
        .rows
        .iter()
        .map(|row| Violation {
            pwsid: pwsid.get(row).to_string(),
            violation_id: violation_id.get(row).to_string(),
            health_based_flag: health.get(row).to_string(),
            status: status.get(row).to_string(),
            period: period.get(row).to_string(),
        })
        .collect())
}

/// Loads an optional extract, logging and returning `None` on any failure
/// so the pipeline can continue with empty enrichment.
pub fn load_optional<T>(
    path: &Path,
    label: &str,
    parse: impl FnOnce(&RawTable) -> Result<Vec<T>, LoadError>,
) -> Option<Vec<T>> {
    match load_table(path).and_then(|table| parse(&table)) {
        Ok(records) => Some(records),
        Err(LoadError::MissingInputFile { path }) => {
            log::warn!(
                "No {label} extract at {}; continuing without it",
                path.display()
            );
            None
        }
        Err(e) => {
            log::warn!("Ignoring {label} extract: {e}");
            None
        }
    }
}
