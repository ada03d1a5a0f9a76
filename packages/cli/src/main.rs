#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the water map pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`water_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the step bar never fight for the terminal.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use water_map_cli_utils::IndicatifProgress;
use water_map_locations::LocationMatch;
use water_map_pipeline::config::{PeriodPolicy, PipelineConfig};

#[derive(Parser)]
#[command(name = "water_map", about = "Public water system enrichment pipeline")]
struct Cli {
    /// TOML config file (defaults to `water_map.toml` when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write the artifact
    Process {
        /// Directory holding the extracts
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Artifact path (relative paths resolve against the data directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Reporting period, e.g. "2025Q1"
        #[arg(long)]
        period: Option<String>,
        /// Use the latest available period when the requested one is absent
        #[arg(long)]
        fallback_to_latest: bool,
        /// Geocode systems the reference tables cannot place
        /// (requires `GOOGLE_MAPS_API_KEY`)
        #[arg(long)]
        geocode: bool,
    },
    /// Resolve one place against the reference tables
    Lookup {
        /// Served city
        #[arg(long, default_value = "")]
        city: String,
        /// Served county
        #[arg(long, default_value = "")]
        county: String,
        /// Registered city used when city and county miss
        #[arg(long, default_value = "")]
        fallback_city: String,
    },
}

const fn match_label(matched_by: LocationMatch) -> &'static str {
    match matched_by {
        LocationMatch::ServedCity => "city",
        LocationMatch::ServedCounty => "county",
        LocationMatch::RegisteredCity => "registered city",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = water_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Process {
            data_dir,
            output,
            period,
            fallback_to_latest,
            geocode,
        } => {
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if let Some(output) = output {
                config.output_file = output;
            }
            if let Some(period) = period {
                config.period = period;
            }
            if fallback_to_latest {
                config.period_policy = PeriodPolicy::FallbackToLatest;
            }
            if geocode {
                config.geocoding.enabled = true;
            }

            let start = Instant::now();
            let progress = IndicatifProgress::steps_bar(&multi, "Processing");
            let summary = water_map_pipeline::run(&config, progress).await?;

            log::info!(
                "Done in {:.1}s: {} systems written to {}",
                start.elapsed().as_secs_f64(),
                summary.total_systems,
                summary.artifact_path.display()
            );
        }
        Commands::Lookup {
            city,
            county,
            fallback_city,
        } => {
            let table = water_map_pipeline::location_table(&config)?;
            match table.resolve(&city, &county, &fallback_city) {
                Some(resolved) => println!(
                    "{:.4}, {:.4} (matched by {})",
                    resolved.coordinate.latitude,
                    resolved.coordinate.longitude,
                    match_label(resolved.matched_by)
                ),
                None => println!("not found"),
            }
        }
    }

    Ok(())
}
