//! Memoizing, rate-limited wrapper around a [`Geocode`] service.
//!
//! Both hits and misses are cached by query string for the lifetime of the
//! wrapper, so a query is sent to the service at most once. Errors are not
//! cached; a later lookup of the same query will try again.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use water_map_system_models::Coordinate;

use crate::{Geocode, GeocodeError};

/// Counters describing how a [`CachedGeocoder`] has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeStats {
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Requests sent to the service.
    pub requests: u64,
    /// Requests that failed (network, status, or parse errors).
    pub failures: u64,
}

/// A [`Geocode`] service with an in-process cache and a fixed minimum
/// delay between requests.
pub struct CachedGeocoder<G> {
    inner: G,
    rate_limit: Duration,
    cache: BTreeMap<String, Option<Coordinate>>,
    last_request: Option<Instant>,
    stats: GeocodeStats,
}

impl<G: Geocode> CachedGeocoder<G> {
    /// Wraps `inner`, spacing successive requests at least `rate_limit_ms`
    /// milliseconds apart.
    #[must_use]
    pub const fn new(inner: G, rate_limit_ms: u64) -> Self {
        Self {
            inner,
            rate_limit: Duration::from_millis(rate_limit_ms),
            cache: BTreeMap::new(),
            last_request: None,
            stats: GeocodeStats {
                cache_hits: 0,
                requests: 0,
                failures: 0,
            },
        }
    }

    /// Returns usage counters.
    #[must_use]
    pub const fn stats(&self) -> GeocodeStats {
        self.stats
    }

    /// Number of distinct queries cached so far.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Looks up `query`, returning `None` when the service has no match or
    /// the request fails for any reason.
    pub async fn lookup(&mut self, query: &str) -> Option<Coordinate> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(cached) = self.cache.get(query) {
            self.stats.cache_hits += 1;
            return *cached;
        }

        self.wait_for_slot().await;
        self.stats.requests += 1;

        match self.inner.geocode(query).await {
            Ok(found) => {
                match found.as_ref().and_then(|a| a.matched_address.as_deref()) {
                    Some(matched) => log::debug!("Geocoder: '{query}' matched '{matched}'"),
                    None if found.is_none() => log::debug!("Geocoder: no match for '{query}'"),
                    None => {}
                }
                let coordinate =
                    found.map(|address| Coordinate::new(address.latitude, address.longitude));
                self.cache.insert(query.to_string(), coordinate);
                coordinate
            }
            Err(e) => {
                self.stats.failures += 1;
                log::warn!("Geocoding error for '{query}': {e}");
                if matches!(e, GeocodeError::RateLimited) {
                    log::warn!("Rate limited by geocoding service");
                }
                None
            }
        }
    }

    async fn wait_for_slot(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.rate_limit {
                tokio::time::sleep(self.rate_limit - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
