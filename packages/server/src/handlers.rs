//! HTTP handler functions for the water map API.

use actix_files::NamedFile;
use actix_web::{HttpRequest, HttpResponse, web};
use water_map_server_models::{ApiHealth, SystemQueryParams};

use crate::AppState;
use crate::cache::CacheError;
use crate::views::{CoordinateFilter, compute_stats, select_systems};

fn cache_error_response(e: &CacheError) -> HttpResponse {
    if e.is_missing() {
        log::warn!("{e}");
        HttpResponse::NotFound().json(serde_json::json!({
            "error": "No processed data available; run the pipeline first"
        }))
    } else {
        log::error!("Failed to load water system data: {e}");
        HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Failed to load water system data"
        }))
    }
}

fn systems_page(
    state: &AppState,
    params: &SystemQueryParams,
    coordinates: CoordinateFilter,
) -> HttpResponse {
    match state.cache.get() {
        Ok(systems) => HttpResponse::Ok().json(select_systems(&systems, params, coordinates)),
        Err(e) => cache_error_response(&e),
    }
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        artifact_loaded: state.cache.is_loaded(),
    })
}

/// `GET /api/water-systems`
///
/// Paginated systems filtered by search text, risk tier, and optionally
/// coordinate availability.
pub async fn water_systems(
    state: web::Data<AppState>,
    params: web::Query<SystemQueryParams>,
) -> HttpResponse {
    systems_page(&state, &params, CoordinateFilter::Any)
}

/// `GET /api/map-data`
///
/// Same as `/api/water-systems` restricted to systems with coordinates.
pub async fn map_data(
    state: web::Data<AppState>,
    params: web::Query<SystemQueryParams>,
) -> HttpResponse {
    systems_page(&state, &params, CoordinateFilter::Known)
}

/// `GET /api/unknown-locations`
///
/// Systems the pipeline could not place.
pub async fn unknown_locations(
    state: web::Data<AppState>,
    params: web::Query<SystemQueryParams>,
) -> HttpResponse {
    systems_page(&state, &params, CoordinateFilter::Unknown)
}

/// `GET /api/stats/water-systems`
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    match state.cache.get() {
        Ok(systems) => HttpResponse::Ok().json(compute_stats(&systems)),
        Err(e) => cache_error_response(&e),
    }
}

/// `GET /api/download`
///
/// Streams the artifact file as-is.
pub async fn download(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let path = state.cache.artifact_path();
    match NamedFile::open_async(&path).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            log::warn!("Download of {} failed: {e}", path.display());
            HttpResponse::NotFound().json(serde_json::json!({
                "error": "No processed data available; run the pipeline first"
            }))
        }
    }
}

/// `POST /api/reprocess`
///
/// Re-runs the pipeline and swaps the new artifact into the cache.
pub async fn reprocess(state: web::Data<AppState>) -> HttpResponse {
    match state.cache.refresh().await {
        Ok(summary) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "totalSystems": summary.total_systems,
            "period": summary.period,
            "withCoordinates": summary.with_coordinates,
        })),
        Err(e) => {
            log::error!("Reprocess failed: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Reprocess failed: {e}")
            }))
        }
    }
}
