//! Output assembly: projects enriched systems to the artifact schema and
//! reads/writes the artifact.

use std::path::{Path, PathBuf};

use thiserror::Error;
use water_map_system_models::{ARTIFACT_COLUMNS, EnrichedSystem, PolishedSystem, ServedLocation};

use crate::risk::classify;

/// Errors reading or writing the artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No artifact exists at the path.
    #[error("Artifact not found: {}", .path.display())]
    Missing {
        /// Expected artifact location.
        path: PathBuf,
    },

    /// Filesystem failure.
    #[error("Artifact I/O error at {}: {source}", .path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// CSV encoding or decoding failure.
    #[error("Artifact CSV error at {}: {source}", .path.display())]
    Csv {
        /// File being read or written.
        path: PathBuf,
        /// Underlying CSV error.
        source: csv::Error,
    },
}

/// Joins the served city, county, and state into a display address,
/// skipping empty parts. Falls back to `jurisdiction_name` when no part is
/// known.
#[must_use]
pub fn build_address(location: &ServedLocation, jurisdiction_name: &str) -> String {
    let county = location.county_served.trim();
    let county = if county.is_empty() || county.to_uppercase().ends_with(" COUNTY") {
        county.to_string()
    } else {
        format!("{county} County")
    };

    let parts: Vec<&str> = [
        location.city_served.trim(),
        county.as_str(),
        location.state_served.trim(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect();

    if parts.is_empty() {
        jurisdiction_name.to_string()
    } else {
        parts.join(", ")
    }
}

/// Projects one enriched system to an artifact row.
#[must_use]
pub fn polish(enriched: &EnrichedSystem, jurisdiction_name: &str) -> PolishedSystem {
    let system = &enriched.system;
    let risk_level = classify(&enriched.violations);

    PolishedSystem {
        pwsid: system.pwsid.clone(),
        name: system.name.clone(),
        system_type: system.type_code.clone(),
        population: system.population,
        owner_type: system.owner_type_code.clone(),
        primary_source: system.primary_source_code.clone(),
        address: build_address(&enriched.location, jurisdiction_name),
        lat: enriched.coordinate.map(|c| c.latitude),
        lng: enriched.coordinate.map(|c| c.longitude),
        total_violations: enriched.violations.total,
        health_violations: enriched.violations.health,
        unaddressed_violations: enriched.violations.unaddressed,
        risk_level,
        marker_color: risk_level.marker_color(),
        has_coordinates: enriched.has_coordinates(),
    }
}

/// Writes `rows` to `path` and returns the artifact size in bytes.
///
/// The rows go to a uniquely named temp file in the target directory that
/// is then renamed over `path`. A failed write leaves any previous artifact
/// untouched, and concurrent writers never share a temp file. The header
/// row is always written, even for zero rows.
///
/// # Errors
///
/// Returns [`ArtifactError`] if the file cannot be written or renamed.
pub fn write_artifact(path: &Path, rows: &[PolishedSystem]) -> Result<u64, ArtifactError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut prefix = path.file_name().unwrap_or_default().to_os_string();
    prefix.push(".");
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|source| ArtifactError::Io {
            path: parent.to_path_buf(),
            source,
        })?;

    // Dropping `tmp` on any error below deletes the temp file.
    let tmp_path = tmp.path().to_path_buf();
    write_rows(tmp.as_file_mut(), &tmp_path, rows)?;
    let bytes = tmp
        .as_file()
        .metadata()
        .map_err(|source| ArtifactError::Io {
            path: tmp_path,
            source,
        })?
        .len();

    tmp.persist(path).map_err(|e| ArtifactError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    log::info!("Saved {} systems to {}", rows.len(), path.display());
    Ok(bytes)
}

fn write_rows(
    file: &mut std::fs::File,
    path: &Path,
    rows: &[PolishedSystem],
) -> Result<(), ArtifactError> {
    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(&mut *file);

    writer.write_record(ARTIFACT_COLUMNS).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }

    writer.flush().map_err(io_err)?;
    drop(writer);
    file.sync_all().map_err(io_err)
}

/// Reads an artifact written by [`write_artifact`].
///
/// # Errors
///
/// Returns [`ArtifactError::Missing`] if no file exists at `path`, or
/// another [`ArtifactError`] if it cannot be parsed.
pub fn read_artifact(path: &Path) -> Result<Vec<PolishedSystem>, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::Missing {
            path: path.to_path_buf(),
        });
    }

    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let rows = reader
        .deserialize::<PolishedSystem>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;

    log::debug!("Read {} systems from {}", rows.len(), path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use water_map_system_models::{
        Coordinate, MarkerColor, RiskLevel, ViolationSummary, WaterSystem,
    };

    use super::*;

    fn location(city: &str, county: &str, state: &str) -> ServedLocation {
        ServedLocation {
            city_served: city.to_string(),
            county_served: county.to_string(),
            state_served: state.to_string(),
            zip_served: None,
        }
    }

    fn enriched() -> EnrichedSystem {
        let mut enriched = EnrichedSystem::new(
            WaterSystem {
                pwsid: "GA0010000".to_string(),
                name: "BAXLEY WATER".to_string(),
                type_code: "CWS".to_string(),
                population: 4_400,
                owner_type_code: "L".to_string(),
                primary_source_code: "GW".to_string(),
                city_name: "BAXLEY".to_string(),
                state_code: "GA".to_string(),
            },
            location("BAXLEY", "APPLING", "GA"),
        );
        enriched.violations = ViolationSummary {
            total: 2,
            health: 0,
            unaddressed: 1,
        };
        enriched.coordinate = Some(Coordinate::new(31.7793, -82.347));
        enriched
    }

    #[test]
    fn address_joins_known_parts() {
        assert_eq!(
            build_address(&location("BAXLEY", "APPLING", "GA"), "Georgia"),
            "BAXLEY, APPLING County, GA"
        );
        assert_eq!(build_address(&location("BAXLEY", "", "GA"), "Georgia"), "BAXLEY, GA");
        assert_eq!(
            build_address(&location("", "Appling County", "GA"), "Georgia"),
            "Appling County, GA"
        );
        assert_eq!(build_address(&location("", "", ""), "Georgia"), "Georgia");
    }

    #[test]
    fn polish_projects_and_classifies() {
        let row = polish(&enriched(), "Georgia");
        assert_eq!(row.system_type, "CWS");
        assert_eq!(row.address, "BAXLEY, APPLING County, GA");
        assert_eq!(row.lat, Some(31.7793));
        assert_eq!(row.risk_level, RiskLevel::Medium);
        assert_eq!(row.marker_color, MarkerColor::Orange);
        assert!(row.has_coordinates);
    }

    #[test]
    fn unresolved_rows_have_empty_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polished_data.csv");
        let mut system = enriched();
        system.coordinate = None;

        write_artifact(&path, &[polish(&system, "Georgia")]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(ARTIFACT_COLUMNS.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("GA0010000,BAXLEY WATER,CWS,4400,L,GW,\"BAXLEY, APPLING County, GA\",,,2,0,1,Medium,orange,false")
        );
    }

    #[test]
    fn write_then_read_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("polished_data.csv");
        let rows = vec![polish(&enriched(), "Georgia")];

        let bytes = write_artifact(&path, &rows).unwrap();
        assert!(bytes > 0);
        assert!(temp_files(&dir.path().join("out")).is_empty());
        assert_eq!(read_artifact(&path).unwrap(), rows);
    }

    #[test]
    fn empty_artifact_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polished_data.csv");
        write_artifact(&path, &[]).unwrap();
        assert!(read_artifact(&path).unwrap().is_empty());
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("pwsid,name,type"));
    }

    fn temp_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmp"))
            .collect()
    }

    #[test]
    fn failed_publish_leaves_target_and_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = dir.path().join("polished_data.csv");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "keep").unwrap();

        assert!(write_artifact(&path, &[polish(&enriched(), "Georgia")]).is_err());

        assert_eq!(std::fs::read_to_string(path.join("keep.txt")).unwrap(), "keep");
        assert!(temp_files(dir.path()).is_empty());
    }

    #[test]
    fn concurrent_writes_all_succeed_with_a_whole_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polished_data.csv");

        let small = vec![polish(&enriched(), "Georgia"); 10];
        let mut other = enriched();
        other.coordinate = None;
        let large = vec![polish(&other, "Georgia"); 5_000];

        for _ in 0..5 {
            let target = path.as_path();
            std::thread::scope(|scope| {
                let writers = [&small, &large, &small, &large]
                    .map(|rows| scope.spawn(move || write_artifact(target, rows)));
                for writer in writers {
                    assert!(writer.join().unwrap().is_ok());
                }
            });

            let written = read_artifact(&path).unwrap();
            assert!(written == small || written == large);
        }
        assert!(temp_files(dir.path()).is_empty());
    }

    #[test]
    fn missing_artifact_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_artifact(&dir.path().join("none.csv")),
            Err(ArtifactError::Missing { .. })
        ));
    }
}
