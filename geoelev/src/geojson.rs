//! GeoJSON elevation enrichment.
//!
//! This module provides functions to add elevation data to GeoJSON geometries.
//! Enable the `geojson` feature to use this module.
//!
//! # Example
//!
//! ```ignore
//! use geoelev::geojson::add_elevations_to_geometry;
//! use geojson::Geometry;
//!
//! let geometry: Geometry = r#"{"type": "Point", "coordinates": [138.7274, 35.3606]}"#
//!     .parse()
//!     .unwrap();
//!
//! let enriched = add_elevations_to_geometry(&service, geometry)?;
//! // {"type": "Point", "coordinates": [138.7274, 35.3606, 3776.0]}
//! ```

use geojson::{Geometry, Value as GeoJsonValue};

use crate::error::{ElevationError, Result};
use crate::service::ElevationService;

/// Add elevations to all positions of a GeoJSON geometry.
///
/// Positions are in GeoJSON order, `[longitude, latitude]` or
/// `[longitude, latitude, altitude]`; an existing altitude is replaced by the
/// interpolated elevation. Every geometry type is supported, including
/// nested `GeometryCollection`s.
///
/// # Errors
///
/// Returns an error if:
/// - A position has fewer than 2 elements
/// - A position is outside the valid coordinate range
/// - No resolution has elevation data at a position
///   ([`ElevationError::NoElevationData`])
///
/// # Example
///
/// ```ignore
/// let line: Geometry = r#"{
///     "type": "LineString",
///     "coordinates": [[138.5, 35.5], [138.6, 35.6]]
/// }"#.parse().unwrap();
///
/// let enriched = add_elevations_to_geometry(&service, line)?;
/// // [[138.5, 35.5, 500.0], [138.6, 35.6, 750.0]]
/// ```
pub fn add_elevations_to_geometry(
    service: &ElevationService,
    geometry: Geometry,
) -> Result<Geometry> {
    let new_value = match geometry.value {
        GeoJsonValue::Point(coord) => GeoJsonValue::Point(add_elevation_to_coord(service, &coord)?),
        GeoJsonValue::MultiPoint(coords) => {
            GeoJsonValue::MultiPoint(add_elevation_to_coords(service, &coords)?)
        }
        GeoJsonValue::LineString(coords) => {
            GeoJsonValue::LineString(add_elevation_to_coords(service, &coords)?)
        }
        GeoJsonValue::MultiLineString(lines) => GeoJsonValue::MultiLineString(
            lines
                .iter()
                .map(|line| add_elevation_to_coords(service, line))
                .collect::<Result<_>>()?,
        ),
        GeoJsonValue::Polygon(rings) => GeoJsonValue::Polygon(
            rings
                .iter()
                .map(|ring| add_elevation_to_coords(service, ring))
                .collect::<Result<_>>()?,
        ),
        GeoJsonValue::MultiPolygon(polygons) => GeoJsonValue::MultiPolygon(
            polygons
                .iter()
                .map(|polygon| {
                    polygon
                        .iter()
                        .map(|ring| add_elevation_to_coords(service, ring))
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<_>>()?,
        ),
        GeoJsonValue::GeometryCollection(geometries) => GeoJsonValue::GeometryCollection(
            geometries
                .into_iter()
                .map(|g| add_elevations_to_geometry(service, g))
                .collect::<Result<_>>()?,
        ),
    };

    Ok(Geometry {
        value: new_value,
        ..geometry
    })
}

/// Add elevation to a single GeoJSON position.
///
/// Takes `[lon, lat]` or `[lon, lat, alt, ...]` and returns
/// `[lon, lat, elevation]`.
///
/// # Example
///
/// ```ignore
/// let elevated = add_elevation_to_coord(&service, &[138.7274, 35.3606])?;
/// assert_eq!(elevated.len(), 3);
/// ```
pub fn add_elevation_to_coord(service: &ElevationService, coord: &[f64]) -> Result<Vec<f64>> {
    let [lon, lat, ..] = *coord else {
        return Err(ElevationError::InvalidCoordinate {
            message: format!(
                "position must have at least 2 elements (lon, lat), got {}",
                coord.len()
            ),
        });
    };

    let elevation = service.require_elevation_at(lat, lon)?;
    Ok(vec![lon, lat, elevation.meters])
}

/// Add elevations to a list of GeoJSON positions.
pub fn add_elevation_to_coords(
    service: &ElevationService,
    coords: &[Vec<f64>],
) -> Result<Vec<Vec<f64>>> {
    coords
        .iter()
        .map(|coord| add_elevation_to_coord(service, coord))
        .collect()
}
