//! Tile URL manifest.
//!
//! A [`Manifest`] maps every published tile of each [`Resolution`] to its
//! download URL. It is persisted as a JSON document with one top-level map
//! per resolution:
//!
//! ```json
//! {
//!     "srtm1": { "N36W117": "http://.../Region_04/N36W117.hgt.zip" },
//!     "srtm3": { "N35E138": "http://.../Eurasia/N35E138.hgt.zip" },
//!     "srtmgl1": {}
//! }
//! ```
//!
//! The manifest is resolved once at startup in two explicit stages: first
//! the configured [`ManifestProvider`], then, for any enabled resolution the
//! provider could not supply, rediscovery through the [`Retriever`]. A
//! rediscovered manifest is persisted to storage as [`MANIFEST_NAME`].

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ElevationError, Result};
use crate::retrieval::{Credentials, Retriever};
use crate::storage::Storage;
use crate::tile::Resolution;
use crate::tile_id::TileId;

/// Storage name of the persisted manifest.
pub const MANIFEST_NAME: &str = "list.json";

/// Per-resolution map from bare tile name to download URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_empty")]
    srtmgl1: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    srtm1: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    srtm3: BTreeMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Manifest {
    /// Create an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON manifest document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize as pretty-printed JSON with sorted keys.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Tile URLs of one resolution.
    pub fn urls(&self, resolution: Resolution) -> &BTreeMap<String, String> {
        match resolution {
            Resolution::Srtmgl1 => &self.srtmgl1,
            Resolution::Srtm1 => &self.srtm1,
            Resolution::Srtm3 => &self.srtm3,
        }
    }

    fn urls_mut(&mut self, resolution: Resolution) -> &mut BTreeMap<String, String> {
        match resolution {
            Resolution::Srtmgl1 => &mut self.srtmgl1,
            Resolution::Srtm1 => &mut self.srtm1,
            Resolution::Srtm3 => &mut self.srtm3,
        }
    }

    /// Replace the tile URLs of one resolution.
    pub fn set_urls<I>(&mut self, resolution: Resolution, urls: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        *self.urls_mut(resolution) = urls.into_iter().collect();
    }

    /// Add or replace the URL of a single tile.
    pub fn insert(&mut self, tile: TileId, url: impl Into<String>) {
        self.urls_mut(tile.resolution()).insert(tile.name(), url.into());
    }

    /// Download URL of a tile, if published.
    pub fn url_for(&self, tile: &TileId) -> Option<&str> {
        self.urls(tile.resolution())
            .get(&tile.name())
            .map(String::as_str)
    }

    /// Returns `true` if no URLs are known for `resolution`.
    pub fn is_empty_for(&self, resolution: Resolution) -> bool {
        self.urls(resolution).is_empty()
    }

    /// Drop the URLs of every resolution not listed.
    pub fn retain(&mut self, resolutions: &[Resolution]) {
        for resolution in Resolution::ALL {
            if !resolutions.contains(&resolution) {
                self.urls_mut(resolution).clear();
            }
        }
    }
}

/// Source of a previously built manifest.
pub trait ManifestProvider: Send + Sync {
    /// Load the manifest.
    fn load(&self) -> Result<Manifest>;
}

/// Loads the manifest persisted in a [`Storage`] as [`MANIFEST_NAME`].
pub struct StorageManifest {
    storage: Arc<dyn Storage>,
}

impl StorageManifest {
    /// Read `list.json` from `storage`.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl ManifestProvider for StorageManifest {
    fn load(&self) -> Result<Manifest> {
        Manifest::from_json(&self.storage.read(MANIFEST_NAME)?)
    }
}

/// Loads a JSON manifest from bytes or a file path, e.g. a manifest bundled
/// with an application via `include_bytes!`.
pub struct JsonManifest {
    source: JsonSource,
}

enum JsonSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

impl JsonManifest {
    /// Parse `bytes` when loaded.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: JsonSource::Bytes(bytes.into()),
        }
    }

    /// Read and parse the file at `path` when loaded.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: JsonSource::Path(path.into()),
        }
    }
}

impl ManifestProvider for JsonManifest {
    fn load(&self) -> Result<Manifest> {
        match &self.source {
            JsonSource::Bytes(bytes) => Manifest::from_json(bytes),
            JsonSource::Path(path) => Manifest::from_json(&std::fs::read(path)?),
        }
    }
}

/// Everything needed to rediscover tile URLs through a [`Retriever`].
pub struct Rediscovery<'a> {
    /// Retriever used to walk the directory listings.
    pub retriever: &'a dyn Retriever,
    /// Credentials forwarded to the retriever.
    pub credentials: Option<&'a Credentials>,
    /// Listing URL overrides; resolutions not present use
    /// [`Resolution::listing_url`].
    pub listing_urls: &'a HashMap<Resolution, String>,
}

impl Rediscovery<'_> {
    fn listing_url(&self, resolution: Resolution) -> &str {
        self.listing_urls
            .get(&resolution)
            .map(String::as_str)
            .unwrap_or_else(|| resolution.listing_url())
    }
}

/// Resolve the manifest for the enabled `resolutions`.
///
/// 1. Load from `provider`. If it yields URLs for every enabled resolution
///    that manifest is used as is.
/// 2. Otherwise rediscover the missing resolutions with `rediscovery` and
///    persist the merged result to `storage`.
///
/// A resolution whose rediscovery fails is left empty and logged; the
/// engine then simply falls through to the next resolution at query time.
/// Without `rediscovery` the provider's manifest, possibly empty, is used
/// as is and tiles can only come from storage.
///
/// # Errors
///
/// Returns [`ElevationError::Manifest`] if rediscovery was attempted and no
/// enabled resolution ends up with any URLs.
pub fn resolve(
    provider: &dyn ManifestProvider,
    resolutions: &[Resolution],
    rediscovery: Option<Rediscovery<'_>>,
    storage: &dyn Storage,
) -> Result<Manifest> {
    let mut manifest = match provider.load() {
        Ok(manifest) => manifest,
        Err(e) => {
            tracing::info!(error = %e, "manifest not available from provider, rediscovering");
            Manifest::new()
        }
    };

    let missing: Vec<Resolution> = resolutions
        .iter()
        .copied()
        .filter(|r| manifest.is_empty_for(*r))
        .collect();
    if missing.is_empty() {
        manifest.retain(resolutions);
        return Ok(manifest);
    }

    let Some(rediscovery) = rediscovery else {
        tracing::info!(?missing, "no retriever configured, tiles will only be read from storage");
        manifest.retain(resolutions);
        return Ok(manifest);
    };

    let mut failures = Vec::new();
    let mut discovered_any = false;
    for resolution in &missing {
        let listing_url = rediscovery.listing_url(*resolution);
        match rediscovery
            .retriever
            .list_tile_urls(listing_url, rediscovery.credentials)
        {
            Ok(urls) if !urls.is_empty() => {
                tracing::info!(%resolution, tiles = urls.len(), "rediscovered tile urls");
                manifest.set_urls(*resolution, urls);
                discovered_any = true;
            }
            Ok(_) => failures.push(format!("{resolution}: listing had no tiles")),
            Err(e) => {
                tracing::warn!(%resolution, error = %e, "tile url rediscovery failed");
                failures.push(format!("{resolution}: {e}"));
            }
        }
    }

    // Disabled resolutions stay in list.json for later runs.
    if discovered_any {
        persist(&manifest, storage);
    }
    manifest.retain(resolutions);

    if resolutions.iter().all(|r| manifest.is_empty_for(*r)) {
        return Err(ElevationError::Manifest(format!(
            "no tile urls for any enabled resolution ({})",
            failures.join("; ")
        )));
    }

    Ok(manifest)
}

fn persist(manifest: &Manifest, storage: &dyn Storage) {
    let written = manifest
        .to_json()
        .and_then(|json| storage.write(MANIFEST_NAME, &json));
    if let Err(e) = written {
        tracing::warn!(error = %e, "failed to persist manifest");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Retriever serving a fixed listing per URL.
    struct ListingRetriever {
        listings: HashMap<String, HashMap<String, String>>,
        calls: AtomicUsize,
    }

    impl ListingRetriever {
        fn new(listings: &[(&str, &[(&str, &str)])]) -> Self {
            let listings = listings
                .iter()
                .map(|(url, tiles)| {
                    let tiles = tiles
                        .iter()
                        .map(|(name, url)| (name.to_string(), url.to_string()))
                        .collect();
                    (url.to_string(), tiles)
                })
                .collect();
            Self {
                listings,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Retriever for ListingRetriever {
        fn list_tile_urls(
            &self,
            listing_url: &str,
            _credentials: Option<&Credentials>,
        ) -> Result<HashMap<String, String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.listings
                .get(listing_url)
                .cloned()
                .ok_or_else(|| ElevationError::Retrieval {
                    url: listing_url.to_string(),
                    reason: "HTTP 404 Not Found".to_string(),
                })
        }

        fn fetch(&self, url: &str, _credentials: Option<&Credentials>) -> Result<Vec<u8>> {
            Err(ElevationError::Retrieval {
                url: url.to_string(),
                reason: "not a tile server".to_string(),
            })
        }
    }

    const SRTM3_JSON: &str = r#"{
        "srtmgl1": null,
        "srtm1": {},
        "srtm3": {"N35E138": "http://example.com/SRTM3/Eurasia/N35E138.hgt.zip"}
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(SRTM3_JSON.as_bytes()).unwrap();
        let tile = TileId::new(Resolution::Srtm3, 35, 138).unwrap();

        assert_eq!(
            manifest.url_for(&tile),
            Some("http://example.com/SRTM3/Eurasia/N35E138.hgt.zip")
        );
        assert!(manifest.is_empty_for(Resolution::Srtmgl1));
        assert!(manifest.is_empty_for(Resolution::Srtm1));

        let other = TileId::new(Resolution::Srtmgl1, 35, 138).unwrap();
        assert_eq!(manifest.url_for(&other), None);
    }

    #[test]
    fn test_missing_maps_default_to_empty() {
        let manifest = Manifest::from_json(br#"{"srtm3": {}}"#).unwrap();
        assert_eq!(manifest, Manifest::new());
    }

    #[test]
    fn test_corrupt_manifest() {
        assert!(matches!(
            Manifest::from_json(b"{not json"),
            Err(ElevationError::Json(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_has_three_maps() {
        let mut manifest = Manifest::new();
        manifest.insert(
            TileId::new(Resolution::Srtm1, 36, -117).unwrap(),
            "http://example.com/N36W117.hgt.zip",
        );

        let json: serde_json::Value = serde_json::from_slice(&manifest.to_json().unwrap()).unwrap();
        assert!(json["srtmgl1"].is_object());
        assert!(json["srtm3"].is_object());
        assert_eq!(json["srtm1"]["N36W117"], "http://example.com/N36W117.hgt.zip");
    }

    #[test]
    fn test_resolve_uses_provider() {
        let storage = MemoryStorage::new();
        let retriever = ListingRetriever::new(&[]);
        let overrides = HashMap::new();
        let provider = JsonManifest::from_bytes(SRTM3_JSON);

        let manifest = resolve(
            &provider,
            &[Resolution::Srtm3],
            Some(Rediscovery {
                retriever: &retriever,
                credentials: None,
                listing_urls: &overrides,
            }),
            &storage,
        )
        .unwrap();

        assert!(!manifest.is_empty_for(Resolution::Srtm3));
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
        assert!(!storage.exists(MANIFEST_NAME));
    }

    #[test]
    fn test_resolve_rediscovers_and_persists() {
        let storage = MemoryStorage::new();
        let retriever = ListingRetriever::new(&[(
            "http://mirror/srtm3/",
            &[("N35E138", "http://mirror/srtm3/N35E138.hgt.zip")],
        )]);
        let mut overrides = HashMap::new();
        overrides.insert(Resolution::Srtm3, "http://mirror/srtm3/".to_string());

        // Nothing stored yet, so the storage provider fails
        let provider = StorageManifest::new(Arc::new(MemoryStorage::new()));
        let manifest = resolve(
            &provider,
            &[Resolution::Srtm3],
            Some(Rediscovery {
                retriever: &retriever,
                credentials: None,
                listing_urls: &overrides,
            }),
            &storage,
        )
        .unwrap();

        let tile = TileId::new(Resolution::Srtm3, 35, 138).unwrap();
        assert_eq!(
            manifest.url_for(&tile),
            Some("http://mirror/srtm3/N35E138.hgt.zip")
        );

        let persisted = Manifest::from_json(&storage.read(MANIFEST_NAME).unwrap()).unwrap();
        assert_eq!(persisted, manifest);
    }

    #[test]
    fn test_resolve_fills_only_missing_resolutions() {
        let storage = MemoryStorage::new();
        let retriever = ListingRetriever::new(&[(
            Resolution::Srtm1.listing_url(),
            &[("N36W117", "http://mirror/srtm1/N36W117.hgt.zip")],
        )]);
        let overrides = HashMap::new();
        let provider = JsonManifest::from_bytes(SRTM3_JSON);

        let manifest = resolve(
            &provider,
            &[Resolution::Srtm1, Resolution::Srtm3],
            Some(Rediscovery {
                retriever: &retriever,
                credentials: None,
                listing_urls: &overrides,
            }),
            &storage,
        )
        .unwrap();

        assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
        assert!(!manifest.is_empty_for(Resolution::Srtm1));
        assert!(!manifest.is_empty_for(Resolution::Srtm3));
    }

    #[test]
    fn test_resolve_partial_rediscovery_failure() {
        let storage = MemoryStorage::new();
        let retriever = ListingRetriever::new(&[(
            Resolution::Srtm3.listing_url(),
            &[("N35E138", "http://mirror/N35E138.hgt.zip")],
        )]);
        let overrides = HashMap::new();
        let provider = StorageManifest::new(Arc::new(MemoryStorage::new()));

        // SRTMGL1 listing is not served, SRTM3 is
        let manifest = resolve(
            &provider,
            &[Resolution::Srtmgl1, Resolution::Srtm3],
            Some(Rediscovery {
                retriever: &retriever,
                credentials: None,
                listing_urls: &overrides,
            }),
            &storage,
        )
        .unwrap();

        assert!(manifest.is_empty_for(Resolution::Srtmgl1));
        assert!(!manifest.is_empty_for(Resolution::Srtm3));
    }

    #[test]
    fn test_resolve_fails_without_any_urls() {
        let storage = MemoryStorage::new();
        let retriever = ListingRetriever::new(&[]);
        let overrides = HashMap::new();
        let provider = JsonManifest::from_bytes("{not json");

        let result = resolve(
            &provider,
            &[Resolution::Srtm3],
            Some(Rediscovery {
                retriever: &retriever,
                credentials: None,
                listing_urls: &overrides,
            }),
            &storage,
        );
        match result {
            Err(ElevationError::Manifest(msg)) => assert!(msg.contains("404")),
            other => panic!("Expected Manifest error, got {:?}", other),
        }
        assert!(!storage.exists(MANIFEST_NAME));
    }

    #[test]
    fn test_resolve_storage_only() {
        let storage = MemoryStorage::new();
        let provider = StorageManifest::new(Arc::new(MemoryStorage::new()));

        let manifest = resolve(&provider, &[Resolution::Srtm3], None, &storage).unwrap();
        assert_eq!(manifest, Manifest::new());
    }

    #[test]
    fn test_resolve_drops_disabled_resolutions() {
        let storage = MemoryStorage::new();
        let mut full = Manifest::new();
        full.insert(TileId::new(Resolution::Srtm3, 35, 138).unwrap(), "a");
        full.insert(TileId::new(Resolution::Srtmgl1, 35, 138).unwrap(), "b");
        let provider = JsonManifest::from_bytes(full.to_json().unwrap());

        let manifest = resolve(&provider, &[Resolution::Srtmgl1], None, &storage).unwrap();
        assert!(manifest.is_empty_for(Resolution::Srtm3));
        assert!(!manifest.is_empty_for(Resolution::Srtmgl1));
    }

    #[test]
    fn test_resolve_keeps_disabled_resolutions_in_list_json() {
        let storage = Arc::new(MemoryStorage::new());
        let mut stored = Manifest::new();
        stored.insert(TileId::new(Resolution::Srtm3, 35, 138).unwrap(), "a");
        stored.insert(TileId::new(Resolution::Srtmgl1, 35, 138).unwrap(), "b");
        storage.write(MANIFEST_NAME, &stored.to_json().unwrap()).unwrap();

        let retriever = ListingRetriever::new(&[(
            Resolution::Srtm1.listing_url(),
            &[("N36W117", "http://mirror/srtm1/N36W117.hgt.zip")],
        )]);
        let overrides = HashMap::new();
        let provider = StorageManifest::new(storage.clone());

        let manifest = resolve(
            &provider,
            &[Resolution::Srtm1],
            Some(Rediscovery {
                retriever: &retriever,
                credentials: None,
                listing_urls: &overrides,
            }),
            storage.as_ref(),
        )
        .unwrap();

        assert!(manifest.is_empty_for(Resolution::Srtm3));
        assert!(manifest.is_empty_for(Resolution::Srtmgl1));
        assert!(!manifest.is_empty_for(Resolution::Srtm1));

        let persisted = Manifest::from_json(&storage.read(MANIFEST_NAME).unwrap()).unwrap();
        assert!(!persisted.is_empty_for(Resolution::Srtm3));
        assert!(!persisted.is_empty_for(Resolution::Srtmgl1));
        assert!(!persisted.is_empty_for(Resolution::Srtm1));
    }

    #[test]
    fn test_json_manifest_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_NAME);
        std::fs::write(&path, SRTM3_JSON).unwrap();

        let manifest = JsonManifest::from_path(&path).load().unwrap();
        let tile = TileId::new(Resolution::Srtm3, 35, 138).unwrap();
        assert_eq!(
            manifest.url_for(&tile),
            Some("http://example.com/SRTM3/Eurasia/N35E138.hgt.zip")
        );

        let missing = JsonManifest::from_path(dir.path().join("absent.json"));
        assert!(matches!(missing.load(), Err(ElevationError::Io(_))));
    }
}
