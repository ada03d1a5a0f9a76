#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Optional external geocoding for water systems.
//!
//! The reference tables in `water_map_locations` are the primary coordinate
//! source. When a Google Maps API key is configured, systems the tables
//! cannot place may be looked up by free-text address through
//! [`google::GoogleGeocoder`], wrapped in a [`cache::CachedGeocoder`] that
//! memoizes results by query string and enforces a minimum delay between
//! network calls.
//!
//! Failures never propagate past [`cache::CachedGeocoder::lookup`]: network
//! errors, empty results, and rate limiting all come back as "not found".

pub mod cache;
pub mod google;

use thiserror::Error;

/// A geocoding result.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// The canonical address returned by the service.
    pub matched_address: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The service rejected the request (bad key, denied, etc.).
    #[error("Geocoding service returned status {status}")]
    Status {
        /// Status string reported by the service.
        status: String,
    },
}

/// A service that turns a free-text address into a coordinate.
///
/// `Ok(None)` means the service answered but found nothing.
pub trait Geocode {
    /// Geocodes a single free-text query.
    fn geocode(
        &self,
        query: &str,
    ) -> impl std::future::Future<Output = Result<Option<GeocodedAddress>, GeocodeError>> + Send;
}
