//! Sampling a [`TileGrid`] at fractional positions.
//!
//! Positions are `(row, col)` in grid units as returned by
//! [`fractional_offset`](crate::fractional_offset). The four surrounding
//! samples are blended bilinearly when all are valid; a partially void
//! neighbourhood degrades to the nearest valid sample.

use crate::tile::TileGrid;

/// How an elevation value was derived from the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampling {
    /// All four neighbours valid, bilinear blend.
    Bilinear,
    /// Some neighbours void, value of the closest valid one.
    NearestValid,
}

/// Sample `grid` at fractional `(row, col)`.
///
/// Positions outside the grid are clamped to its edges. Returns `None` when
/// all four neighbours are void.
///
/// Bilinear weights follow the unit-square formula:
///
/// ```text
/// h = (1-dy)·((1-dx)·h00 + dx·h01) + dy·((1-dx)·h10 + dx·h11)
/// ```
///
/// where `h00` is the north-west neighbour, `dx` the fractional column and
/// `dy` the fractional row.
pub fn sample(grid: &TileGrid, row: f64, col: f64) -> Option<(f64, Sampling)> {
    let max = (grid.side() - 1) as f64;
    let row = row.clamp(0.0, max);
    let col = col.clamp(0.0, max);

    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    let r1 = row.ceil() as usize;
    let c1 = col.ceil() as usize;
    let dy = row - r0 as f64;
    let dx = col - c0 as f64;

    let neighbours = [(r0, c0), (r0, c1), (r1, c0), (r1, c1)];
    let values = neighbours.map(|(r, c)| grid.sample(r, c));

    if let [Some(h00), Some(h01), Some(h10), Some(h11)] = values {
        let (h00, h01, h10, h11) = (h00 as f64, h01 as f64, h10 as f64, h11 as f64);
        let top = h00 * (1.0 - dx) + h01 * dx;
        let bottom = h10 * (1.0 - dx) + h11 * dx;
        return Some((top * (1.0 - dy) + bottom * dy, Sampling::Bilinear));
    }

    neighbours
        .iter()
        .zip(values)
        .filter_map(|(&(r, c), value)| {
            let dist = (r as f64 - row).powi(2) + (c as f64 - col).powi(2);
            value.map(|v| (dist, v))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, v)| (v as f64, Sampling::NearestValid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::{Resolution, VOID_VALUE};

    const SIDE: usize = 1201;

    /// SRTM3 grid of zeros with the given `(row, col, value)` overrides.
    fn grid_with(cells: &[(usize, usize, i16)]) -> TileGrid {
        let mut samples = vec![0i16; SIDE * SIDE];
        for &(row, col, value) in cells {
            samples[row * SIDE + col] = value;
        }
        TileGrid::from_samples(Resolution::Srtm3, samples).unwrap()
    }

    #[test]
    fn test_bilinear_center() {
        let grid = grid_with(&[(10, 20, 100), (10, 21, 102), (11, 20, 104), (11, 21, 106)]);
        let (value, sampling) = sample(&grid, 10.5, 20.5).unwrap();

        assert_eq!(value, 103.0);
        assert_eq!(sampling, Sampling::Bilinear);
    }

    #[test]
    fn test_exact_at_grid_points() {
        let grid = grid_with(&[(10, 20, 100), (10, 21, 102), (11, 20, 104), (11, 21, 106)]);

        assert_eq!(sample(&grid, 10.0, 20.0).unwrap().0, 100.0);
        assert_eq!(sample(&grid, 10.0, 21.0).unwrap().0, 102.0);
        assert_eq!(sample(&grid, 11.0, 20.0).unwrap().0, 104.0);
        assert_eq!(sample(&grid, 11.0, 21.0).unwrap().0, 106.0);
    }

    #[test]
    fn test_exact_at_grid_point_next_to_void() {
        let grid = grid_with(&[(10, 20, 100), (10, 21, VOID_VALUE), (11, 20, VOID_VALUE)]);
        assert_eq!(sample(&grid, 10.0, 20.0), Some((100.0, Sampling::Bilinear)));
    }

    #[test]
    fn test_within_neighbour_bounds() {
        let grid = grid_with(&[(0, 0, -12), (0, 1, 850), (1, 0, 37), (1, 1, 402)]);

        for i in 0..=10 {
            for j in 0..=10 {
                let (row, col) = (i as f64 / 10.0, j as f64 / 10.0);
                let (value, _) = sample(&grid, row, col).unwrap();
                assert!(
                    (-12.0 - 1e-9..=850.0 + 1e-9).contains(&value),
                    "{value} out of range at ({row}, {col})"
                );
            }
        }
    }

    #[test]
    fn test_linear_along_edge() {
        let grid = grid_with(&[(0, 0, 100), (0, 1, 200)]);
        let (value, _) = sample(&grid, 0.0, 0.25).unwrap();
        assert!((value - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_valid_fallback() {
        let grid = grid_with(&[
            (10, 20, 100),
            (10, 21, VOID_VALUE),
            (11, 20, 300),
            (11, 21, VOID_VALUE),
        ]);

        // Closer to the south-west neighbour
        let (value, sampling) = sample(&grid, 10.8, 20.4).unwrap();
        assert_eq!(value, 300.0);
        assert_eq!(sampling, Sampling::NearestValid);

        // Closer to the north-west neighbour
        assert_eq!(sample(&grid, 10.2, 20.9).unwrap().0, 100.0);
    }

    #[test]
    fn test_all_void() {
        let grid = grid_with(&[
            (10, 20, VOID_VALUE),
            (10, 21, VOID_VALUE),
            (11, 20, VOID_VALUE),
            (11, 21, VOID_VALUE),
        ]);
        assert_eq!(sample(&grid, 10.5, 20.5), None);
    }

    #[test]
    fn test_clamps_outside_grid() {
        let grid = grid_with(&[(SIDE - 1, SIDE - 1, 77), (0, 0, 11)]);

        assert_eq!(sample(&grid, 5000.0, 5000.0).unwrap().0, 77.0);
        assert_eq!(sample(&grid, -3.0, -3.0).unwrap().0, 11.0);
        assert_eq!(sample(&grid, (SIDE - 1) as f64, (SIDE - 1) as f64).unwrap().0, 77.0);
    }
}
