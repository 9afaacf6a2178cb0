//! Tile retrieval collaborator.
//!
//! A [`Retriever`] discovers which tiles a product offers and downloads
//! their bytes. The engine does not retry failed retrievals; a retriever is
//! free to do so itself (the bundled `HttpRetriever` does).

use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

/// Credentials passed to the retriever on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account user name
    pub username: String,
    /// Account password
    pub password: String,
}

impl Credentials {
    /// Create credentials from a user name and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Discovers tile download URLs and fetches tile bytes.
pub trait Retriever: Send + Sync {
    /// List the tiles published under a product's directory listing.
    ///
    /// Returns a map from bare tile name (`N35E138`) to download URL.
    fn list_tile_urls(
        &self,
        listing_url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<HashMap<String, String>>;

    /// Download the raw (usually compressed) bytes at `url`.
    fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> Result<Vec<u8>>;
}

/// Extract the bare tile name from a listing link.
///
/// Understands the USGS naming variants `N35E138.hgt.zip` and
/// `N35E138.SRTMGL1.hgt.zip`, with or without a leading path.
///
/// # Examples
///
/// ```
/// use geoelev::retrieval::tile_name_from_link;
///
/// assert_eq!(tile_name_from_link("Eurasia/N35E138.hgt.zip"), Some("N35E138".to_string()));
/// assert_eq!(tile_name_from_link("S12W077.SRTMGL1.hgt.zip"), Some("S12W077".to_string()));
/// assert_eq!(tile_name_from_link("N35E138.SRTMGL1.hgt.zip.xml"), None);
/// ```
pub fn tile_name_from_link(link: &str) -> Option<String> {
    let file = link.rsplit('/').next().unwrap_or(link);
    if !file.to_lowercase().ends_with(".hgt.zip") {
        return None;
    }

    let stem = file.split('.').next()?;
    let bytes = stem.as_bytes();
    let well_formed = bytes.len() == 7
        && matches!(bytes[0].to_ascii_uppercase(), b'N' | b'S')
        && matches!(bytes[3].to_ascii_uppercase(), b'E' | b'W')
        && bytes[1..3].iter().all(u8::is_ascii_digit)
        && bytes[4..7].iter().all(u8::is_ascii_digit);

    well_formed.then(|| stem.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_name_from_link() {
        assert_eq!(tile_name_from_link("N35E138.hgt.zip"), Some("N35E138".to_string()));
        assert_eq!(
            tile_name_from_link("http://example.com/SRTM3/Africa/s34e018.hgt.zip"),
            Some("S34E018".to_string())
        );
        assert_eq!(tile_name_from_link("N35E138.hgt"), None);
        assert_eq!(tile_name_from_link("Africa/"), None);
        assert_eq!(tile_name_from_link("readme.hgt.zip"), None);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("user", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
