//! SRTM tile resolutions and grid decoding.
//!
//! This module provides [`Resolution`], describing the three supported SRTM
//! products, and [`TileGrid`], a fully decoded `.hgt` elevation grid.

use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::error::{ElevationError, Result};

/// Number of samples per row/column for 1 arc-second products
const ONE_ARC_SECOND_SAMPLES: usize = 3601;

/// Number of samples per row/column for 3 arc-second products
const THREE_ARC_SECOND_SAMPLES: usize = 1201;

/// Value indicating no data (void) in SRTM files
pub const VOID_VALUE: i16 = -32768;

/// One of the supported SRTM tile products.
///
/// All three partition the globe into identical 1°×1° cells; they differ in
/// grid side length and coverage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    /// SRTMGL1: 1 arc-second (~30m), global coverage
    Srtmgl1,
    /// SRTM1: 1 arc-second (~30m), United States only
    Srtm1,
    /// SRTM3: 3 arc-second (~90m), global coverage
    Srtm3,
}

impl Resolution {
    /// All resolutions in default priority order.
    pub const ALL: [Resolution; 3] = [Resolution::Srtmgl1, Resolution::Srtm1, Resolution::Srtm3];

    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> usize {
        match self {
            Resolution::Srtmgl1 | Resolution::Srtm1 => ONE_ARC_SECOND_SAMPLES,
            Resolution::Srtm3 => THREE_ARC_SECOND_SAMPLES,
        }
    }

    /// Returns the expected size in bytes of an uncompressed tile.
    pub fn tile_bytes(&self) -> usize {
        self.samples() * self.samples() * 2
    }

    /// Returns the approximate resolution in meters.
    pub fn meters(&self) -> f64 {
        match self {
            Resolution::Srtmgl1 | Resolution::Srtm1 => 30.0,
            Resolution::Srtm3 => 90.0,
        }
    }

    /// Short lowercase key used in tile ids, storage names and manifests.
    pub fn key(&self) -> &'static str {
        match self {
            Resolution::Srtmgl1 => "srtmgl1",
            Resolution::Srtm1 => "srtm1",
            Resolution::Srtm3 => "srtm3",
        }
    }

    /// Default directory listing the tiles of this product.
    pub fn listing_url(&self) -> &'static str {
        match self {
            Resolution::Srtmgl1 => "http://e4ftl01.cr.usgs.gov/SRTM/SRTMGL1.003/2000.02.11/",
            Resolution::Srtm1 => "http://dds.cr.usgs.gov/srtm/version2_1/SRTM1/",
            Resolution::Srtm3 => "http://dds.cr.usgs.gov/srtm/version2_1/SRTM3/",
        }
    }

    /// Check whether the cell with south-west corner `(lat, lon)` lies
    /// inside this product's coverage area.
    ///
    /// The SRTM mission flew between 56°S and 60°N. SRTM1 was only released
    /// for the United States, approximated here as the western hemisphere
    /// from 10°N (Hawaii) upwards.
    pub fn covers_cell(&self, lat: i32, lon: i32) -> bool {
        let (lats, lons) = match self {
            Resolution::Srtmgl1 | Resolution::Srtm3 => (-56..60, -180..180),
            Resolution::Srtm1 => (10..60, -180..-60),
        };
        lats.contains(&lat) && lons.contains(&lon)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Resolution {
    type Err = ElevationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "srtmgl1" => Ok(Resolution::Srtmgl1),
            "srtm1" => Ok(Resolution::Srtm1),
            "srtm3" => Ok(Resolution::Srtm3),
            other => Err(ElevationError::Configuration(format!(
                "unknown resolution '{other}' (expected srtmgl1, srtm1 or srtm3)"
            ))),
        }
    }
}

/// Archive format of a stored or downloaded tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression - raw .hgt file
    #[default]
    None,
    /// Gzip compression (.hgt.gz)
    Gzip,
    /// ZIP archive (.hgt.zip)
    Zip,
}

impl Compression {
    /// Detect compression format from a URL or filename.
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".gz") {
            Compression::Gzip
        } else if lower.ends_with(".zip") {
            Compression::Zip
        } else {
            Compression::None
        }
    }

    /// Storage name suffix for a tile in this format.
    pub fn suffix(&self) -> &'static str {
        match self {
            Compression::None => ".hgt",
            Compression::Gzip => ".hgt.gz",
            Compression::Zip => ".hgt.zip",
        }
    }

    /// Returns `true` unless this is [`Compression::None`].
    pub fn is_compressed(&self) -> bool {
        *self != Compression::None
    }
}

/// A decoded SRTM elevation grid.
///
/// Samples are stored row-major, north to south and west to east. Row 0 is
/// the northern edge of the tile, column 0 the western edge. A grid is
/// immutable once decoded.
///
/// # Example
///
/// ```ignore
/// use geoelev::{Resolution, TileGrid};
///
/// let bytes = std::fs::read("N35E138.hgt")?;
/// let grid = TileGrid::decode(&bytes, Resolution::Srtm3, false)?;
/// println!("NW corner: {:?}", grid.sample(0, 0));
/// ```
pub struct TileGrid {
    /// Elevation samples in meters
    samples: Vec<i16>,
    /// Number of samples per row/column (1201 or 3601)
    side: usize,
    /// Product this grid belongs to
    resolution: Resolution,
}

impl TileGrid {
    /// Decode raw tile bytes into a grid.
    ///
    /// When `compressed` is set the bytes are first fully inflated; ZIP and
    /// gzip archives are recognised by their magic bytes. For ZIP archives
    /// the first member ending in `.hgt` is used.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::CorruptTile`] if decompression fails or the
    /// inflated length is not `S * S * 2` for the resolution's side `S`.
    pub fn decode(bytes: &[u8], resolution: Resolution, compressed: bool) -> Result<Self> {
        if compressed {
            let raw = decompress(bytes, resolution)?;
            Self::decode_raw(&raw, resolution)
        } else {
            Self::decode_raw(bytes, resolution)
        }
    }

    fn decode_raw(bytes: &[u8], resolution: Resolution) -> Result<Self> {
        let expected = resolution.tile_bytes();
        if bytes.len() != expected {
            return Err(ElevationError::CorruptTile {
                resolution,
                reason: format!(
                    "invalid size: {} bytes (expected {})",
                    bytes.len(),
                    expected
                ),
            });
        }

        // 16-bit big-endian signed integers
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Self {
            samples,
            side: resolution.samples(),
            resolution,
        })
    }

    /// Build a grid from already decoded samples.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::CorruptTile`] if `samples` does not hold
    /// exactly `S * S` values.
    pub fn from_samples(resolution: Resolution, samples: Vec<i16>) -> Result<Self> {
        let side = resolution.samples();
        if samples.len() != side * side {
            return Err(ElevationError::CorruptTile {
                resolution,
                reason: format!("{} samples (expected {})", samples.len(), side * side),
            });
        }
        Ok(Self {
            samples,
            side,
            resolution,
        })
    }

    /// Raw sample at `(row, col)`, clamped to the grid. May be [`VOID_VALUE`].
    pub fn raw_sample(&self, row: usize, col: usize) -> i16 {
        let row = row.min(self.side - 1);
        let col = col.min(self.side - 1);
        self.samples[row * self.side + col]
    }

    /// Sample at `(row, col)`, or `None` if it is void.
    pub fn sample(&self, row: usize, col: usize) -> Option<i16> {
        match self.raw_sample(row, col) {
            VOID_VALUE => None,
            v => Some(v),
        }
    }

    /// Returns the number of samples per row/column.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Returns the resolution of this grid.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the sentinel marking void samples.
    pub fn void_value(&self) -> i16 {
        VOID_VALUE
    }

    /// Count void samples in the grid.
    pub fn void_count(&self) -> usize {
        self.samples.iter().filter(|&&v| v == VOID_VALUE).count()
    }
}

impl fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileGrid")
            .field("resolution", &self.resolution)
            .field("side", &self.side)
            .finish_non_exhaustive()
    }
}

/// Fully inflate a compressed tile, detecting ZIP or gzip by magic bytes.
pub fn decompress(bytes: &[u8], resolution: Resolution) -> Result<Vec<u8>> {
    let corrupt = |reason: String| ElevationError::CorruptTile { resolution, reason };

    if bytes.starts_with(b"PK\x03\x04") {
        extract_hgt_from_zip(bytes).map_err(corrupt)
    } else if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = GzDecoder::new(bytes);
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|e| corrupt(format!("failed to decompress gzip: {e}")))?;
        Ok(data)
    } else {
        Err(corrupt("unrecognised archive format".to_string()))
    }
}

/// Extract the first `.hgt` member (case-insensitive) of a ZIP archive.
fn extract_hgt_from_zip(data: &[u8]) -> std::result::Result<Vec<u8>, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| format!("failed to read ZIP archive: {e}"))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| format!("failed to read ZIP entry: {e}"))?;

        if entry.name().to_lowercase().ends_with(".hgt") {
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|e| format!("failed to extract .hgt from ZIP: {e}"))?;
            return Ok(contents);
        }
    }

    Err("no .hgt file found in ZIP archive".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SRTM3_SIZE: usize = 1201 * 1201 * 2;
    const SRTM3_SAMPLES: usize = 1201;

    /// Create SRTM3 bytes with known elevation values
    fn create_test_srtm3_bytes() -> Vec<u8> {
        let mut data = vec![0u8; SRTM3_SIZE];

        // Row 0, Col 0 (northwest corner) = 1000m
        data[0] = 0x03;
        data[1] = 0xE8;

        // Row 600, Col 600 (center) = 500m
        let center_offset = (600 * SRTM3_SAMPLES + 600) * 2;
        data[center_offset] = 0x01;
        data[center_offset + 1] = 0xF4;

        // Row 1200, Col 1200 (southeast corner) = void
        let se_offset = (1200 * SRTM3_SAMPLES + 1200) * 2;
        data[se_offset] = 0x80;
        data[se_offset + 1] = 0x00;

        data
    }

    fn zip_bytes(member: &str, contents: &[u8]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buffer));
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Stored);
            zip.start_file(member, options).unwrap();
            zip.write_all(contents).unwrap();
            zip.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn test_decode_srtm3() {
        let grid = TileGrid::decode(&create_test_srtm3_bytes(), Resolution::Srtm3, false).unwrap();

        assert_eq!(grid.resolution(), Resolution::Srtm3);
        assert_eq!(grid.side(), SRTM3_SAMPLES);
        assert_eq!(grid.sample(0, 0), Some(1000));
        assert_eq!(grid.sample(600, 600), Some(500));
        assert_eq!(grid.sample(1200, 1200), None);
        assert_eq!(grid.raw_sample(1200, 1200), VOID_VALUE);
        assert_eq!(grid.void_count(), 1);
    }

    #[test]
    fn test_raw_sample_clamps() {
        let grid = TileGrid::decode(&create_test_srtm3_bytes(), Resolution::Srtm3, false).unwrap();
        assert_eq!(grid.raw_sample(5000, 5000), VOID_VALUE);
    }

    #[test]
    fn test_invalid_size_every_resolution() {
        for resolution in Resolution::ALL {
            let short = vec![0u8; resolution.tile_bytes() - 2];
            let long = vec![0u8; resolution.tile_bytes() + 2];

            for bytes in [&short, &long] {
                match TileGrid::decode(bytes, resolution, false) {
                    Err(ElevationError::CorruptTile { resolution: r, .. }) => {
                        assert_eq!(r, resolution)
                    }
                    other => panic!("Expected CorruptTile, got {:?}", other),
                }
            }
        }
    }

    #[test]
    fn test_srtm3_bytes_rejected_as_one_arc_second() {
        let result = TileGrid::decode(&create_test_srtm3_bytes(), Resolution::Srtmgl1, false);
        assert!(matches!(result, Err(ElevationError::CorruptTile { .. })));
    }

    #[test]
    fn test_decode_zip() {
        let archive = zip_bytes("N35E138.hgt", &create_test_srtm3_bytes());
        let grid = TileGrid::decode(&archive, Resolution::Srtm3, true).unwrap();
        assert_eq!(grid.sample(600, 600), Some(500));
    }

    #[test]
    fn test_decode_zip_uppercase_member() {
        let archive = zip_bytes("N35E138.HGT", &create_test_srtm3_bytes());
        assert!(TileGrid::decode(&archive, Resolution::Srtm3, true).is_ok());
    }

    #[test]
    fn test_decode_zip_without_hgt_member() {
        let archive = zip_bytes("readme.txt", b"Not an HGT file");
        let result = TileGrid::decode(&archive, Resolution::Srtm3, true);
        assert!(matches!(result, Err(ElevationError::CorruptTile { .. })));
    }

    #[test]
    fn test_decode_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder.write_all(&create_test_srtm3_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        let grid = TileGrid::decode(&gz, Resolution::Srtm3, true).unwrap();
        assert_eq!(grid.sample(0, 0), Some(1000));
    }

    #[test]
    fn test_decode_truncated_archive() {
        let archive = zip_bytes("N35E138.hgt", &create_test_srtm3_bytes());
        let truncated = &archive[..archive.len() / 2];
        let result = TileGrid::decode(truncated, Resolution::Srtm3, true);
        assert!(matches!(result, Err(ElevationError::CorruptTile { .. })));
    }

    #[test]
    fn test_compressed_flag_on_raw_bytes() {
        let result = TileGrid::decode(&create_test_srtm3_bytes(), Resolution::Srtm3, true);
        assert!(matches!(result, Err(ElevationError::CorruptTile { .. })));
    }

    #[test]
    fn test_from_samples() {
        let grid = TileGrid::from_samples(Resolution::Srtm3, vec![7; 1201 * 1201]).unwrap();
        assert_eq!(grid.sample(3, 4), Some(7));
        assert!(TileGrid::from_samples(Resolution::Srtm3, vec![7; 10]).is_err());
    }

    #[test]
    fn test_resolution_info() {
        assert_eq!(Resolution::Srtmgl1.samples(), 3601);
        assert_eq!(Resolution::Srtm1.samples(), 3601);
        assert_eq!(Resolution::Srtm3.samples(), 1201);
        assert_eq!(Resolution::Srtm3.tile_bytes(), SRTM3_SIZE);
        assert_eq!(Resolution::Srtm1.meters(), 30.0);
        assert_eq!(Resolution::Srtm3.meters(), 90.0);
    }

    #[test]
    fn test_resolution_parse() {
        assert_eq!("srtm3".parse::<Resolution>().unwrap(), Resolution::Srtm3);
        assert_eq!(" SRTMGL1 ".parse::<Resolution>().unwrap(), Resolution::Srtmgl1);
        assert!("srtm2".parse::<Resolution>().is_err());
        assert_eq!(Resolution::Srtm1.to_string(), "srtm1");
    }

    #[test]
    fn test_coverage() {
        assert!(Resolution::Srtm3.covers_cell(35, 138));
        assert!(Resolution::Srtm3.covers_cell(-56, -180));
        assert!(!Resolution::Srtm3.covers_cell(60, 0));
        assert!(!Resolution::Srtm3.covers_cell(-57, 0));

        // SRTM1 is US only
        assert!(Resolution::Srtm1.covers_cell(36, -117));
        assert!(Resolution::Srtm1.covers_cell(19, -156));
        assert!(!Resolution::Srtm1.covers_cell(35, 138));
        assert!(!Resolution::Srtm1.covers_cell(-12, -78));
    }

    #[test]
    fn test_compression_from_url() {
        assert_eq!(Compression::from_url("file.hgt"), Compression::None);
        assert_eq!(Compression::from_url("file.hgt.gz"), Compression::Gzip);
        assert_eq!(Compression::from_url("FILE.HGT.ZIP"), Compression::Zip);
        assert_eq!(
            Compression::from_url("http://dds.cr.usgs.gov/srtm/version2_1/SRTM3/Eurasia/N35E138.hgt.zip"),
            Compression::Zip
        );
        assert_eq!(Compression::Zip.suffix(), ".hgt.zip");
        assert!(!Compression::None.is_compressed());
    }
}
