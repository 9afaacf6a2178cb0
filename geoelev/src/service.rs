//! Multi-resolution elevation service.
//!
//! This module provides [`ElevationService`], the high-level entry point for
//! elevation queries, and [`ElevationServiceBuilder`] to assemble it.
//!
//! A query walks the configured resolutions in priority order. The first
//! resolution whose tile is available and whose neighbourhood around the
//! coordinate holds at least one valid sample answers; missing tiles and
//! fully void neighbourhoods fall through to the next resolution.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use geoelev::{ElevationService, FileStorage};
//!
//! let service = ElevationService::builder(Arc::new(FileStorage::new("/data/srtm")))
//!     .srtmgl1(false)
//!     .cache_size(100)
//!     .build()?;
//!
//! if let Some(elevation) = service.elevation_at(35.3606, 138.7274)? {
//!     println!("{:.1}m from {}", elevation.meters, elevation.resolution);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ElevationError, Result};
use crate::interpolate::{self, Sampling};
use crate::manifest::{self, ManifestProvider, Rediscovery, StorageManifest};
use crate::retrieval::{Credentials, Retriever};
use crate::storage::{FileStorage, Storage};
use crate::store::{CachePolicy, CacheStats, TileStore};
use crate::tile::Resolution;
use crate::tile_id::{fractional_offset, Coordinate, TileId};

#[cfg(feature = "download")]
use crate::download::{HttpConfig, HttpRetriever};

/// An interpolated elevation and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elevation {
    /// Elevation in meters.
    pub meters: f64,
    /// Resolution whose tile answered the query.
    pub resolution: Resolution,
    /// How the value was derived from the surrounding samples.
    pub sampling: Sampling,
}

/// Elevation service over one or more SRTM resolutions.
///
/// `ElevationService` is `Send + Sync`; share it behind an [`Arc`] to query
/// from many threads. Each tile is loaded at most once, concurrent queries
/// for the same tile wait on a single load.
pub struct ElevationService {
    resolutions: Vec<Resolution>,
    store: TileStore,
}

impl ElevationService {
    /// Create a builder storing tiles in `storage`.
    pub fn builder(storage: Arc<dyn Storage>) -> ElevationServiceBuilder {
        ElevationServiceBuilder::new(storage)
    }

    /// Get the interpolated elevation at a coordinate.
    ///
    /// # Arguments
    ///
    /// * `lat` - Latitude in decimal degrees (-90 to 90)
    /// * `lon` - Longitude in decimal degrees (-180 to 180)
    ///
    /// # Returns
    ///
    /// - `Ok(Some(elevation))` - elevation with its source resolution
    /// - `Ok(None)` - no resolution has data here (ocean, voids, uncovered)
    /// - `Err(OutOfBounds)` - coordinates outside the valid range
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Result<Option<Elevation>> {
        let coord = Coordinate::new(lat, lon)?;

        for &resolution in &self.resolutions {
            let Some(tile) = TileId::for_coord(coord, resolution) else {
                continue;
            };

            let grid = match self.store.get(tile) {
                Ok(grid) => grid,
                Err(e) => {
                    if is_unpublished(&e) {
                        tracing::debug!(%tile, "tile not published, trying next resolution");
                    } else {
                        tracing::warn!(%tile, error = %e, "tile unavailable, trying next resolution");
                    }
                    continue;
                }
            };

            let (row, col) = fractional_offset(coord, resolution);
            if let Some((meters, sampling)) = interpolate::sample(&grid, row, col) {
                return Ok(Some(Elevation {
                    meters,
                    resolution,
                    sampling,
                }));
            }
            tracing::debug!(%tile, row, col, "void neighbourhood, trying next resolution");
        }

        Ok(None)
    }

    /// Like [`elevation_at`](Self::elevation_at), but "no data" is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::NoElevationData`] when no resolution has
    /// data at the coordinate.
    pub fn require_elevation_at(&self, lat: f64, lon: f64) -> Result<Elevation> {
        self.elevation_at(lat, lon)?
            .ok_or(ElevationError::NoElevationData { lat, lon })
    }

    /// Get elevations for many coordinates.
    ///
    /// Results are in input order. Coordinates that are invalid or have no
    /// data yield `None`. Tiles stay cached between coordinates, so nearby
    /// points cost a single load.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let coords = vec![(35.36, 138.73), (35.37, 138.74), (0.0, -150.0)];
    /// let elevations = service.elevations_at(&coords);
    /// // elevations[2] is None (Pacific Ocean)
    /// ```
    pub fn elevations_at(&self, coords: &[(f64, f64)]) -> Vec<Option<f64>> {
        coords
            .iter()
            .map(|&(lat, lon)| match self.elevation_at(lat, lon) {
                Ok(elevation) => elevation.map(|e| e.meters),
                Err(e) => {
                    tracing::debug!(lat, lon, error = %e, "skipping coordinate");
                    None
                }
            })
            .collect()
    }

    /// Query on the tokio blocking pool.
    ///
    /// Dropping the returned future only stops waiting: a tile load already
    /// in flight runs to completion and is cached for later queries.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn elevation_at_async(
        self: &Arc<Self>,
        lat: f64,
        lon: f64,
    ) -> Result<Option<Elevation>> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.elevation_at(lat, lon)).await?
    }

    /// Enabled resolutions in priority order.
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// The underlying tile store.
    pub fn store(&self) -> &TileStore {
        &self.store
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.store.cache_stats()
    }

    /// Clear all tiles from the cache.
    pub fn clear_cache(&self) {
        self.store.clear();
    }
}

/// `TileUnavailable` caused by a tile missing from the manifest, e.g. ocean.
fn is_unpublished(e: &ElevationError) -> bool {
    matches!(
        e,
        ElevationError::TileUnavailable { source, .. }
            if matches!(**source, ElevationError::NotInManifest { .. })
    )
}

/// Builder for [`ElevationService`].
///
/// By default all three resolutions are enabled in the order SRTMGL1, SRTM1,
/// SRTM3, the manifest is read from `list.json` in storage, tiles are cached
/// without bound and no retriever is configured (storage only).
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use geoelev::{ElevationServiceBuilder, CachePolicy, Credentials, FileStorage};
/// use geoelev::download::{HttpConfig, HttpRetriever};
///
/// let service = ElevationServiceBuilder::new(Arc::new(FileStorage::in_default_dir()?))
///     .retriever(Arc::new(HttpRetriever::new(HttpConfig::default())?))
///     .credentials(Credentials::new("user", "secret"))
///     .leave_zipped(true)
///     .cache_policy(CachePolicy::Lru { max_tiles: 20 })
///     .build()?;
/// ```
pub struct ElevationServiceBuilder {
    storage: Arc<dyn Storage>,
    retriever: Option<Arc<dyn Retriever>>,
    manifest_provider: Option<Box<dyn ManifestProvider>>,
    resolutions: Vec<Resolution>,
    leave_zipped: bool,
    credentials: Option<Credentials>,
    cache_policy: CachePolicy,
    listing_urls: HashMap<Resolution, String>,
}

impl ElevationServiceBuilder {
    /// Create a new builder storing tiles in `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            retriever: None,
            manifest_provider: None,
            resolutions: Resolution::ALL.to_vec(),
            leave_zipped: false,
            credentials: None,
            cache_policy: CachePolicy::Unbounded,
            listing_urls: HashMap::new(),
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `GEOELEV_DATA_DIR` | Directory for tiles and `list.json` | `$HOME/.cache/srtm` |
    /// | `GEOELEV_CACHE_SIZE` | Maximum tiles in cache, 0 for unbounded | 0 |
    /// | `GEOELEV_RESOLUTIONS` | Comma separated, in priority order | `srtmgl1,srtm1,srtm3` |
    /// | `GEOELEV_LEAVE_ZIPPED` | Store downloads as `.hgt.zip` | false |
    /// | `GEOELEV_HTTP_USER` | Retrieval user name | None |
    /// | `GEOELEV_HTTP_PASSWORD` | Retrieval password | None |
    ///
    /// With the `download` feature an [`HttpRetriever`] with default
    /// settings is configured as well.
    ///
    /// # Example
    ///
    /// ```bash
    /// export GEOELEV_DATA_DIR=/data/srtm
    /// export GEOELEV_RESOLUTIONS=srtm3
    /// export GEOELEV_CACHE_SIZE=50
    /// ```
    ///
    /// ```ignore
    /// use geoelev::ElevationServiceBuilder;
    ///
    /// let service = ElevationServiceBuilder::from_env()?.build()?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Configuration`] for unparseable values, a
    /// user without a password (or vice versa), or when no data directory
    /// is set and no home directory can be found.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let storage = match lookup("GEOELEV_DATA_DIR") {
            Some(dir) => FileStorage::new(dir),
            None => FileStorage::in_default_dir()?,
        };
        let mut builder = Self::new(Arc::new(storage));

        if let Some(size) = lookup("GEOELEV_CACHE_SIZE") {
            let size = size.trim().parse::<u64>().map_err(|_| {
                ElevationError::Configuration(format!("invalid GEOELEV_CACHE_SIZE '{size}'"))
            })?;
            builder = builder.cache_size(size);
        }

        if let Some(list) = lookup("GEOELEV_RESOLUTIONS") {
            let resolutions = list
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .map(str::parse::<Resolution>)
                .collect::<Result<Vec<Resolution>>>()?;
            builder = builder.resolutions(resolutions);
        }

        if let Some(flag) = lookup("GEOELEV_LEAVE_ZIPPED") {
            builder = builder.leave_zipped(parse_flag("GEOELEV_LEAVE_ZIPPED", &flag)?);
        }

        match (lookup("GEOELEV_HTTP_USER"), lookup("GEOELEV_HTTP_PASSWORD")) {
            (Some(user), Some(password)) => {
                builder = builder.credentials(Credentials::new(user, password))
            }
            (None, None) => {}
            _ => {
                return Err(ElevationError::Configuration(
                    "GEOELEV_HTTP_USER and GEOELEV_HTTP_PASSWORD must be set together".to_string(),
                ))
            }
        }

        #[cfg(feature = "download")]
        {
            builder = builder.retriever(Arc::new(HttpRetriever::new(HttpConfig::default())?));
        }

        Ok(builder)
    }

    /// Fetch tiles missing from storage through `retriever`.
    pub fn retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    /// Load the manifest from `provider` instead of `list.json` in storage.
    pub fn manifest_provider(mut self, provider: impl ManifestProvider + 'static) -> Self {
        self.manifest_provider = Some(Box::new(provider));
        self
    }

    /// Set the enabled resolutions in priority order. Duplicates are ignored.
    pub fn resolutions(mut self, resolutions: impl IntoIterator<Item = Resolution>) -> Self {
        self.resolutions.clear();
        for resolution in resolutions {
            if !self.resolutions.contains(&resolution) {
                self.resolutions.push(resolution);
            }
        }
        self
    }

    /// Enable or disable SRTMGL1.
    pub fn srtmgl1(self, enabled: bool) -> Self {
        self.toggle(Resolution::Srtmgl1, enabled)
    }

    /// Enable or disable SRTM1.
    pub fn srtm1(self, enabled: bool) -> Self {
        self.toggle(Resolution::Srtm1, enabled)
    }

    /// Enable or disable SRTM3.
    pub fn srtm3(self, enabled: bool) -> Self {
        self.toggle(Resolution::Srtm3, enabled)
    }

    /// Re-enabling a resolution appends it at the lowest priority.
    fn toggle(mut self, resolution: Resolution, enabled: bool) -> Self {
        if enabled {
            if !self.resolutions.contains(&resolution) {
                self.resolutions.push(resolution);
            }
        } else {
            self.resolutions.retain(|r| *r != resolution);
        }
        self
    }

    /// Store fetched tiles as downloaded (`.hgt.zip`) rather than inflated.
    pub fn leave_zipped(mut self, leave_zipped: bool) -> Self {
        self.leave_zipped = leave_zipped;
        self
    }

    /// Credentials passed to the retriever.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the cache eviction policy. Default is [`CachePolicy::Unbounded`].
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    /// Keep at most `size` tiles in cache, or all tiles when `size` is 0.
    pub fn cache_size(self, size: u64) -> Self {
        let policy = match size {
            0 => CachePolicy::Unbounded,
            max_tiles => CachePolicy::Lru { max_tiles },
        };
        self.cache_policy(policy)
    }

    /// Override the directory listing used to rediscover `resolution` tiles.
    pub fn listing_url(mut self, resolution: Resolution, url: impl Into<String>) -> Self {
        self.listing_urls.insert(resolution, url.into());
        self
    }

    /// Build the [`ElevationService`], resolving the tile manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Configuration`] if no resolution is enabled
    /// and [`ElevationError::Manifest`] if the manifest can be neither
    /// loaded nor rediscovered.
    pub fn build(self) -> Result<ElevationService> {
        if self.resolutions.is_empty() {
            return Err(ElevationError::Configuration(
                "at least one of srtmgl1, srtm1 and srtm3 must be enabled".to_string(),
            ));
        }

        let provider = match self.manifest_provider {
            Some(provider) => provider,
            None => Box::new(StorageManifest::new(Arc::clone(&self.storage))),
        };
        let rediscovery = self.retriever.as_deref().map(|retriever| Rediscovery {
            retriever,
            credentials: self.credentials.as_ref(),
            listing_urls: &self.listing_urls,
        });
        let manifest = manifest::resolve(
            provider.as_ref(),
            &self.resolutions,
            rediscovery,
            self.storage.as_ref(),
        )?;

        let mut store = TileStore::new(self.storage, Arc::new(manifest), self.cache_policy)
            .leave_zipped(self.leave_zipped);
        if let Some(retriever) = self.retriever {
            store = store.with_retriever(retriever, self.credentials);
        }

        tracing::info!(
            resolutions = ?self.resolutions,
            leave_zipped = self.leave_zipped,
            cache_policy = ?self.cache_policy,
            "elevation service ready"
        );

        Ok(ElevationService {
            resolutions: self.resolutions,
            store,
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ElevationError::Configuration(format!(
            "invalid {key} '{value}', expected true or false"
        ))),
    }
}
