//! Basic example demonstrating geoelev usage.
//!
//! Run with: cargo run --example basic -- /path/to/srtm/cache
//!
//! The directory is expected to hold tiles laid out as
//! `srtm3/N35E138.hgt` (or `.hgt.zip`). With the `download` feature enabled
//! missing tiles are fetched from the USGS servers.

use std::env;
use std::sync::Arc;

use geoelev::{ElevationError, ElevationService, FileStorage};

fn main() -> Result<(), ElevationError> {
    let storage = match env::args().nth(1) {
        Some(dir) => FileStorage::new(dir),
        None => FileStorage::in_default_dir()?,
    };
    println!("Tile cache: {}", storage.root().display());

    #[allow(unused_mut)]
    let mut builder = ElevationService::builder(Arc::new(storage)).cache_size(10);

    #[cfg(feature = "download")]
    {
        use geoelev::download::{HttpConfig, HttpRetriever};
        builder = builder.retriever(Arc::new(HttpRetriever::new(HttpConfig::default())?));
    }

    let service = builder.build()?;

    // Query some famous peaks
    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Mount Whitney, California", 36.5785, -118.2923),
        ("Pacific Ocean", 0.5, -150.5),
    ];

    println!("Elevation queries:");
    println!("{:-<50}", "");

    for (name, lat, lon) in &locations {
        match service.elevation_at(*lat, *lon)? {
            Some(elevation) => {
                println!(
                    "{}: {:.1}m ({}, {:?})",
                    name, elevation.meters, elevation.resolution, elevation.sampling
                );
            }
            None => println!("{}: no data", name),
        }
    }

    // Show cache statistics
    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Fetched: {}", stats.fetch_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
