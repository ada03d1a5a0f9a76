#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the water map.
//!
//! Serves paginated and filtered views of the pipeline artifact, aggregate
//! statistics, the raw artifact file, and a reprocess trigger. The server
//! never derives risk tiers or coordinates itself; it only reads what the
//! pipeline wrote.

pub mod cache;
mod handlers;
pub mod views;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use water_map_pipeline::config::PipelineConfig;

use crate::cache::ArtifactCache;

/// Environment variable naming the pipeline config file.
pub const CONFIG_ENV: &str = "WATER_MAP_CONFIG";

/// Shared application state.
pub struct AppState {
    /// Cached artifact and the config that produces it.
    pub cache: ArtifactCache,
}

/// Registers the API routes on `cfg`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/water-systems", web::get().to(handlers::water_systems))
            .route("/map-data", web::get().to(handlers::map_data))
            .route("/unknown-locations", web::get().to(handlers::unknown_locations))
            .route("/stats/water-systems", web::get().to(handlers::stats))
            .route("/download", web::get().to(handlers::download))
            .route("/reprocess", web::post().to(handlers::reprocess)),
    );
}

/// Starts the water map API server.
///
/// Loads the pipeline config from `WATER_MAP_CONFIG` (or `water_map.toml`
/// when present), warms the artifact cache if an artifact exists, and
/// serves on `BIND_ADDR:PORT`. The caller provides the async runtime (e.g.
/// via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the config cannot be loaded, or if
/// the HTTP server fails to bind or encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref()).map_err(std::io::Error::other)?;

    let cache = ArtifactCache::new(config);
    match cache.get() {
        Ok(systems) => log::info!("Serving {} water systems", systems.len()),
        Err(e) => log::warn!("Starting without data: {e}"),
    }

    let state = web::Data::new(AppState { cache });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
