//! Coordinate to tile mapping.
//!
//! This module converts geographic coordinates into [`TileId`]s and into
//! fractional grid positions within a tile.
//!
//! # Tile Names
//!
//! SRTM tiles follow the naming convention `{N|S}{lat}{E|W}{lon}`:
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N35, S12)
//! - Longitude: 3 digits with E/W prefix (e.g., E138, W077)
//!
//! The name represents the **southwest corner** of the 1° × 1° tile. Because
//! every resolution partitions space identically, a [`TileId`] is qualified
//! by its resolution: `srtm3/N35E138`.

use std::fmt;
use std::str::FromStr;

use crate::error::{ElevationError, Result};
use crate::tile::{Compression, Resolution};

/// A validated geographic coordinate in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    /// Create a coordinate, normalising longitude 180° to -180°.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::OutOfBounds`] if latitude is outside
    /// [-90, 90] or longitude outside [-180, 180] (NaN included).
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(ElevationError::OutOfBounds { lat, lon });
        }
        let lon = if lon == 180.0 { -180.0 } else { lon };
        Ok(Self { lat, lon })
    }

    /// Latitude in decimal degrees.
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in decimal degrees, in [-180, 180).
    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// South-west corner of the 1° cell containing this coordinate.
    pub fn cell(&self) -> (i32, i32) {
        (self.lat.floor() as i32, self.lon.floor() as i32)
    }
}

/// Resolution-qualified identifier of a 1° × 1° tile.
///
/// # Examples
///
/// ```
/// use geoelev::{Coordinate, Resolution, TileId};
///
/// let coord = Coordinate::new(-12.3, -77.1).unwrap();
/// let id = TileId::for_coord(coord, Resolution::Srtm3).unwrap();
/// assert_eq!(id.name(), "S13W078");
/// assert_eq!(id.to_string(), "srtm3/S13W078");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    resolution: Resolution,
    lat: i32,
    lon: i32,
}

impl TileId {
    /// Create a tile id from its south-west corner.
    ///
    /// Returns `None` if the cell lies outside the resolution's coverage.
    pub fn new(resolution: Resolution, lat: i32, lon: i32) -> Option<Self> {
        resolution
            .covers_cell(lat, lon)
            .then_some(Self {
                resolution,
                lat,
                lon,
            })
    }

    /// The tile of `resolution` containing `coord`, if covered.
    pub fn for_coord(coord: Coordinate, resolution: Resolution) -> Option<Self> {
        let (lat, lon) = coord.cell();
        Self::new(resolution, lat, lon)
    }

    /// Parse a bare tile name such as `N35E138`, `n35e138.hgt` or
    /// `/data/S12W077.hgt.zip` for the given resolution.
    pub fn from_name(name: &str, resolution: Resolution) -> Option<Self> {
        // Extract just the filename if a path is given
        let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        if !name.is_ascii() {
            return None;
        }

        let lower = name.to_lowercase();
        let stem_len = [".hgt.zip", ".hgt.gz", ".hgt"]
            .iter()
            .find_map(|suffix| lower.strip_suffix(suffix).map(str::len))
            .unwrap_or(name.len());
        let name = &name[..stem_len];

        // Must be exactly 7 characters: N00E000
        if name.len() != 7 {
            return None;
        }

        // parse() would accept a sign in place of a digit
        if !name[1..3].bytes().all(|b| b.is_ascii_digit())
            || !name[4..7].bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let lat_sign = match &name[0..1] {
            "N" | "n" => 1,
            "S" | "s" => -1,
            _ => return None,
        };
        let lat: i32 = name[1..3].parse().ok()?;

        let lon_sign = match &name[3..4] {
            "E" | "e" => 1,
            "W" | "w" => -1,
            _ => return None,
        };
        let lon: i32 = name[4..7].parse().ok()?;

        Self::new(resolution, lat * lat_sign, lon * lon_sign)
    }

    /// Bare tile name, e.g. `N35E138`.
    pub fn name(&self) -> String {
        let lat_prefix = if self.lat >= 0 { 'N' } else { 'S' };
        let lon_prefix = if self.lon >= 0 { 'E' } else { 'W' };

        format!(
            "{}{:02}{}{:03}",
            lat_prefix,
            self.lat.abs(),
            lon_prefix,
            self.lon.abs()
        )
    }

    /// Name of the blob holding this tile in a storage backend,
    /// e.g. `srtm3/N35E138.hgt.zip`.
    pub fn storage_name(&self, compression: Compression) -> String {
        format!("{}{}", self, compression.suffix())
    }

    /// Returns the resolution this tile belongs to.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the base latitude (southwest corner).
    pub fn base_lat(&self) -> i32 {
        self.lat
    }

    /// Returns the base longitude (southwest corner).
    pub fn base_lon(&self) -> i32 {
        self.lon
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resolution, self.name())
    }
}

impl FromStr for TileId {
    type Err = ElevationError;

    /// Parse the qualified form produced by `Display`, e.g. `srtm3/N35E138`.
    fn from_str(s: &str) -> Result<Self> {
        let (resolution, name) = s.split_once('/').ok_or_else(|| {
            ElevationError::Configuration(format!("tile id '{s}' lacks a resolution prefix"))
        })?;
        let resolution: Resolution = resolution.parse()?;
        Self::from_name(name, resolution).ok_or_else(|| {
            ElevationError::Configuration(format!("invalid tile id '{s}'"))
        })
    }
}

/// Real-valued `(row, col)` position of `coord` inside its tile's grid.
///
/// Columns increase eastward and rows southward across `S - 1` intervals
/// per degree, so row 0 is the northern edge of the tile.
///
/// # Examples
///
/// ```
/// use geoelev::{fractional_offset, Coordinate, Resolution};
///
/// let coord = Coordinate::new(35.5, 138.25).unwrap();
/// assert_eq!(fractional_offset(coord, Resolution::Srtm3), (600.0, 300.0));
/// ```
pub fn fractional_offset(coord: Coordinate, resolution: Resolution) -> (f64, f64) {
    let intervals = (resolution.samples() - 1) as f64;
    let (cell_lat, cell_lon) = coord.cell();

    let row = (cell_lat as f64 + 1.0 - coord.lat()) * intervals;
    let col = (coord.lon() - cell_lon as f64) * intervals;
    (row, col)
}
