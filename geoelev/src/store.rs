//! Tile acquisition and caching.
//!
//! [`TileStore`] turns a [`TileId`] into a decoded [`TileGrid`], looking in
//! three places in order:
//!
//! 1. the in-memory cache;
//! 2. the [`Storage`] backend (`.hgt`, then `.hgt.zip`, then `.hgt.gz`);
//! 3. the [`Retriever`], using the tile's URL from the [`Manifest`].
//!
//! A freshly retrieved tile is decoded before anything is written, then
//! persisted once and cached. Concurrent requests for the same uncached
//! tile are coalesced into a single load.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use crate::error::{ElevationError, Result};
use crate::manifest::Manifest;
use crate::retrieval::{Credentials, Retriever};
use crate::storage::Storage;
use crate::tile::{self, Compression, TileGrid};
use crate::tile_id::TileId;

/// Storage suffixes probed for an existing blob, in order.
const STORED_FORMATS: [Compression; 3] = [Compression::None, Compression::Zip, Compression::Gzip];

/// How many decoded tiles stay resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Keep every tile ever loaded.
    #[default]
    Unbounded,
    /// Keep at most `max_tiles`, evicting the least recently used.
    ///
    /// An SRTM3 tile is ~2.8 MB in memory, an SRTMGL1/SRTM1 tile ~25 MB.
    Lru {
        /// Maximum number of resident tiles. Zero means unbounded.
        max_tiles: u64,
    },
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles loaded from storage or retrieved).
    pub miss_count: u64,
    /// Number of tiles fetched through the retriever.
    pub fetch_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Cache of decoded tiles backed by storage and a retriever.
pub struct TileStore {
    storage: Arc<dyn Storage>,
    manifest: Arc<Manifest>,
    retriever: Option<Arc<dyn Retriever>>,
    credentials: Option<Credentials>,
    leave_zipped: bool,
    policy: CachePolicy,
    tile_cache: Cache<TileId, Arc<TileGrid>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    fetch_count: AtomicU64,
}

impl TileStore {
    /// Create a store reading from `storage` only.
    ///
    /// Use [`with_retriever`](Self::with_retriever) to enable fetching of
    /// tiles the storage does not hold.
    pub fn new(storage: Arc<dyn Storage>, manifest: Arc<Manifest>, policy: CachePolicy) -> Self {
        let tile_cache = match policy {
            // A zero capacity would keep nothing resident.
            CachePolicy::Unbounded | CachePolicy::Lru { max_tiles: 0 } => {
                Cache::builder().build()
            }
            CachePolicy::Lru { max_tiles } => Cache::builder()
                .max_capacity(max_tiles)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        };

        Self {
            storage,
            manifest,
            retriever: None,
            credentials: None,
            leave_zipped: false,
            policy,
            tile_cache,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Fetch missing tiles through `retriever`, passing `credentials`.
    pub fn with_retriever(
        mut self,
        retriever: Arc<dyn Retriever>,
        credentials: Option<Credentials>,
    ) -> Self {
        self.retriever = Some(retriever);
        self.credentials = credentials;
        self
    }

    /// Persist fetched tiles as downloaded (`.hgt.zip`) rather than as raw
    /// `.hgt` grids.
    pub fn leave_zipped(mut self, leave_zipped: bool) -> Self {
        self.leave_zipped = leave_zipped;
        self
    }

    /// Get the decoded grid of `tile`.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::TileUnavailable`] wrapping the cause when
    /// the tile is neither cached, stored, nor retrievable. Failed loads are
    /// not cached; the next request tries again.
    pub fn get(&self, tile: TileId) -> Result<Arc<TileGrid>> {
        if let Some(grid) = self.tile_cache.get(&tile) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(%tile, "tile cache hit");
            return Ok(grid);
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(%tile, "tile cache miss");

        // Concurrent callers for the same tile wait on the first loader
        self.tile_cache
            .try_get_with(tile, || self.load(tile).map(Arc::new))
            .map_err(|source| ElevationError::TileUnavailable { tile, source })
    }

    fn load(&self, tile: TileId) -> Result<TileGrid> {
        for compression in STORED_FORMATS {
            let name = tile.storage_name(compression);
            if self.storage.exists(&name) {
                tracing::debug!(%tile, name, "loading tile from storage");
                let bytes = self.storage.read(&name)?;
                return TileGrid::decode(&bytes, tile.resolution(), compression.is_compressed());
            }
        }

        self.fetch(tile)
    }

    fn fetch(&self, tile: TileId) -> Result<TileGrid> {
        let url = self
            .manifest
            .url_for(&tile)
            .ok_or(ElevationError::NotInManifest { tile })?;
        let retriever = self
            .retriever
            .as_deref()
            .ok_or_else(|| ElevationError::Retrieval {
                url: url.to_string(),
                reason: "no retriever configured".to_string(),
            })?;

        tracing::info!(%tile, url, "fetching tile");
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let bytes = retriever.fetch(url, self.credentials.as_ref())?;

        let resolution = tile.resolution();
        let downloaded = Compression::from_url(url);
        let (grid, blob, stored_as) = if downloaded.is_compressed() && !self.leave_zipped {
            let raw = tile::decompress(&bytes, resolution)?;
            let grid = TileGrid::decode(&raw, resolution, false)?;
            (grid, raw, Compression::None)
        } else {
            let grid = TileGrid::decode(&bytes, resolution, downloaded.is_compressed())?;
            (grid, bytes, downloaded)
        };

        self.persist(&tile.storage_name(stored_as), &blob);
        Ok(grid)
    }

    fn persist(&self, name: &str, blob: &[u8]) {
        if self.storage.exists(name) {
            return;
        }
        match self.storage.write(name, blob) {
            Ok(()) => tracing::debug!(name, bytes = blob.len(), "stored tile"),
            Err(e) => tracing::warn!(name, error = %e, "failed to store tile"),
        }
    }

    /// Returns `true` if `tile` is resident in the cache.
    pub fn is_cached(&self, tile: &TileId) -> bool {
        self.tile_cache.contains_key(tile)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        // Entry count is only exact once pending evictions are applied
        self.tile_cache.run_pending_tasks();
        CacheStats {
            entry_count: self.tile_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            fetch_count: self.fetch_count.load(Ordering::Relaxed),
        }
    }

    /// The eviction policy this store was built with.
    pub fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    /// The manifest used to locate tiles.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Invalidate (remove) a specific tile from the cache.
    ///
    /// Stored blobs are untouched, so the next request reloads from storage.
    pub fn invalidate(&self, tile: &TileId) {
        self.tile_cache.invalidate(tile);
    }

    /// Clear all tiles from the cache.
    pub fn clear(&self) {
        self.tile_cache.invalidate_all();
    }
}
