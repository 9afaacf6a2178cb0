//! # geoelev - SRTM Elevation Engine
//!
//! Point elevation queries over the SRTM (Shuttle Radar Topography Mission)
//! tile products, with tiles acquired on demand and cached.
//!
//! ## Features
//!
//! - **Multi-resolution**: SRTMGL1, SRTM1 and SRTM3 queried in priority
//!   order, falling through on missing tiles and voids
//! - **On demand**: Tiles are read from storage, or fetched once and persisted
//! - **Concurrent**: One load per tile no matter how many threads ask for it
//! - **Interpolated**: Bilinear between samples, nearest valid next to voids
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use geoelev::{ElevationService, FileStorage};
//!
//! let service = ElevationService::builder(Arc::new(FileStorage::new("/data/srtm")))
//!     .build()?;
//!
//! match service.elevation_at(35.3606, 138.7274)? {
//!     Some(elevation) => println!("{:.1}m ({})", elevation.meters, elevation.resolution),
//!     None => println!("no data"),
//! }
//! ```
//!
//! ## SRTM Data Format
//!
//! SRTM files contain elevation data in a simple binary format:
//!
//! - **SRTMGL1 / SRTM1**: 3601×3601 samples, 1 arc-second (~30m) resolution
//! - **SRTM3**: 1201×1201 samples, 3 arc-second (~90m) resolution
//!
//! Each sample is a 16-bit big-endian signed integer representing elevation in meters.
//! The special value -32768 indicates void (no data).
//!
//! ## Optional Features
//!
//! - `download`: [`download::HttpRetriever`] for the USGS servers
//! - `geojson`: elevation enrichment of GeoJSON geometries

pub mod error;
pub mod interpolate;
pub mod manifest;
pub mod retrieval;
pub mod service;
pub mod storage;
pub mod store;
pub mod tile;
pub mod tile_id;

#[cfg(feature = "download")]
pub mod download;

#[cfg(feature = "geojson")]
pub mod geojson;

// Re-export main types at crate root for convenience
pub use error::{ElevationError, Result};
pub use interpolate::Sampling;
pub use manifest::{JsonManifest, Manifest, ManifestProvider, StorageManifest};
pub use retrieval::{Credentials, Retriever};
pub use service::{Elevation, ElevationService, ElevationServiceBuilder};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{CachePolicy, CacheStats, TileStore};
pub use tile::{Compression, Resolution, TileGrid, VOID_VALUE};
pub use tile_id::{fractional_offset, Coordinate, TileId};
