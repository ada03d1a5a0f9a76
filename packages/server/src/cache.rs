//! In-memory cache of the artifact.
//!
//! The cache is an explicit object owned by the server state rather than a
//! process global. Readers share one parsed copy behind an [`Arc`]; a
//! refresh builds the new copy off-lock and swaps it in, so requests never
//! observe a half-written artifact.
//!
//! Refreshes run on the blocking thread pool with their own single-threaded
//! runtime, so a reprocess never stalls the worker serving other requests.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use actix_web::error::BlockingError;
use actix_web::web;
use thiserror::Error;
use water_map_pipeline::config::PipelineConfig;
use water_map_pipeline::output::{ArtifactError, read_artifact};
use water_map_pipeline::progress::null_progress;
use water_map_pipeline::{PipelineError, RunSummary};
use water_map_system_models::PolishedSystem;

/// Errors from loading or refreshing the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The artifact could not be read.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Re-running the pipeline failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The pipeline runtime could not be started.
    #[error("Failed to start pipeline runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// The blocking thread pool dropped the refresh.
    #[error("Refresh task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl CacheError {
    /// Whether the error means no artifact exists yet.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Artifact(ArtifactError::Missing { .. }))
    }
}

/// Shared, lazily loaded copy of the artifact.
pub struct ArtifactCache {
    config: PipelineConfig,
    systems: RwLock<Option<Arc<Vec<PolishedSystem>>>>,
}

impl ArtifactCache {
    /// Creates an empty cache for the artifact named by `config`.
    #[must_use]
    pub const fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            systems: RwLock::new(None),
        }
    }

    /// Location of the artifact on disk.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.config.output_path()
    }

    /// Whether a parsed copy is currently held.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Returns the cached systems, reading the artifact on first use.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Artifact`] if the artifact is missing or
    /// unreadable. Nothing is cached on error.
    pub fn get(&self) -> Result<Arc<Vec<PolishedSystem>>, CacheError> {
        if let Some(systems) = self
            .systems
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(systems));
        }

        let loaded = Arc::new(read_artifact(&self.artifact_path())?);
        log::info!("Loaded {} systems into cache", loaded.len());

        let mut slot = self.systems.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(slot.get_or_insert(loaded)))
    }

    /// Drops the cached copy; the next [`get`](Self::get) re-reads the
    /// artifact.
    pub fn invalidate(&self) {
        *self.systems.write().unwrap_or_else(PoisonError::into_inner) = None;
        log::debug!("Artifact cache invalidated");
    }

    /// Re-runs the pipeline and swaps the new artifact into the cache.
    ///
    /// On failure the previous cached copy (and artifact) stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the pipeline fails or the new artifact
    /// cannot be read back.
    pub async fn refresh(&self) -> Result<RunSummary, CacheError> {
        let config = self.config.clone();
        let (summary, fresh) = web::block(move || -> Result<_, CacheError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(CacheError::Runtime)?;
            let summary = runtime.block_on(water_map_pipeline::run(&config, null_progress()))?;
            let fresh = read_artifact(&summary.artifact_path)?;
            Ok((summary, fresh))
        })
        .await??;
        let fresh = Arc::new(fresh);

        *self.systems.write().unwrap_or_else(PoisonError::into_inner) = Some(fresh);
        log::info!("Artifact cache refreshed with {} systems", summary.total_systems);

        Ok(summary)
    }
}
