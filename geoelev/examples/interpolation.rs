//! Example comparing resolutions and showing sub-sample interpolation.
//!
//! Run with: cargo run --example interpolation -- /path/to/srtm/cache

use std::env;
use std::sync::Arc;

use geoelev::{ElevationError, ElevationService, FileStorage, Resolution, Storage};

fn main() -> Result<(), ElevationError> {
    let storage: Arc<dyn Storage> = match env::args().nth(1) {
        Some(dir) => Arc::new(FileStorage::new(dir)),
        None => Arc::new(FileStorage::in_default_dir()?),
    };

    let lat = 35.3606;
    let lon = 138.7274;

    println!("Comparing resolutions at ({}, {}):", lat, lon);
    println!("{:-<50}", "");

    for resolution in Resolution::ALL {
        let service = ElevationService::builder(Arc::clone(&storage))
            .resolutions([resolution])
            .build()?;

        match service.elevation_at(lat, lon)? {
            Some(elevation) => println!(
                "{:>8} (~{}m): {:.2}m ({:?})",
                resolution.to_string(),
                resolution.meters(),
                elevation.meters,
                elevation.sampling
            ),
            None => println!("{:>8}: no data", resolution.to_string()),
        }
    }

    // Walk east across a single SRTM3 sample interval
    let service = ElevationService::builder(storage)
        .resolutions([Resolution::Srtm3])
        .build()?;
    let step = 1.0 / 1200.0;
    let coords: Vec<(f64, f64)> = (0..=10)
        .map(|i| (lat, lon + step * i as f64 / 10.0))
        .collect();

    println!("\nTransect across one 3\" interval:");
    println!("{:-<50}", "");
    for ((lat, lon), elevation) in coords.iter().zip(service.elevations_at(&coords)) {
        match elevation {
            Some(meters) => println!("({:.6}, {:.6}) -> {:.2}m", lat, lon, meters),
            None => println!("({:.6}, {:.6}) -> no data", lat, lon),
        }
    }

    Ok(())
}
