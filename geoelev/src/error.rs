//! Error types for the geoelev library.

use std::sync::Arc;

use thiserror::Error;

use crate::tile::Resolution;
use crate::tile_id::TileId;

/// Errors that can occur when resolving elevation data.
#[derive(Error, Debug)]
pub enum ElevationError {
    /// IO error when talking to local storage.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine was assembled with an unusable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Coordinates are outside the valid latitude/longitude range.
    #[error("Coordinates out of bounds: lat={lat}, lon={lon} (valid: lat ±90°, lon ±180°)")]
    OutOfBounds { lat: f64, lon: f64 },

    /// A coordinate is malformed, e.g. a GeoJSON position with one element.
    #[error("Invalid coordinate: {message}")]
    InvalidCoordinate { message: String },

    /// Tile bytes could not be decoded into a grid.
    #[error("Corrupt {resolution} tile: {reason}")]
    CorruptTile {
        resolution: Resolution,
        reason: String,
    },

    /// The tile is neither in storage nor retrievable.
    #[error("Tile {tile} unavailable: {source}")]
    TileUnavailable {
        tile: TileId,
        source: Arc<ElevationError>,
    },

    /// The manifest has no download URL for the tile.
    #[error("No download URL for tile {tile}")]
    NotInManifest { tile: TileId },

    /// The retrieval collaborator failed.
    #[error("Retrieval of {url} failed: {reason}")]
    Retrieval { url: String, reason: String },

    /// The URL manifest could not be loaded or rediscovered.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Every configured resolution was void or unavailable.
    #[error("No elevation data at lat={lat}, lon={lon}")]
    NoElevationData { lat: f64, lon: f64 },

    /// The blocking task behind an async query panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Manifest (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error from the bundled retriever.
    #[cfg(feature = "download")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using [`ElevationError`].
pub type Result<T> = std::result::Result<T, ElevationError>;
