//! HTTP tile retrieval.
//!
//! This module provides [`HttpRetriever`], a blocking [`Retriever`] that
//! scrapes USGS-style directory listings for `.hgt.zip` links and downloads
//! tile archives. It is only available when the `download` feature is
//! enabled.
//!
//! # Data Sources
//!
//! The default listing URLs of each [`Resolution`](crate::Resolution) point
//! at the USGS servers:
//!
//! - **SRTMGL1**: NASA Earthdata, requires authentication
//! - **SRTM1**: United States only, organised by region subdirectories
//! - **SRTM3**: global, organised by continent subdirectories

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use crate::error::{ElevationError, Result};
use crate::retrieval::{tile_name_from_link, Credentials, Retriever};

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// How deep to follow subdirectory links in a listing.
const MAX_LISTING_DEPTH: usize = 1;

/// Configuration for [`HttpRetriever`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of retry attempts on failure.
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 3,
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Blocking HTTP [`Retriever`].
pub struct HttpRetriever {
    client: Client,
    config: HttpConfig,
}

impl HttpRetriever {
    /// Create a new retriever with the given configuration.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// GET `url` with retries, returning the body bytes.
    fn get(&self, url: &str, credentials: Option<&Credentials>) -> Result<Vec<u8>> {
        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Brief delay before retry
                std::thread::sleep(Duration::from_millis(500 * attempt as u64));
                tracing::debug!(url, attempt, "retrying request");
            }

            match self.do_get(url, credentials) {
                Ok(bytes) => return Ok(bytes),
                Err(e) => last_error = Some(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ElevationError::Retrieval {
            url: url.to_string(),
            reason: "Unknown error".to_string(),
        }))
    }

    fn do_get(&self, url: &str, credentials: Option<&Credentials>) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(ElevationError::Retrieval {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        Ok(response.bytes()?.to_vec())
    }

    fn collect_listing(
        &self,
        listing: &Url,
        credentials: Option<&Credentials>,
        depth: usize,
        urls: &mut HashMap<String, String>,
    ) -> Result<()> {
        let body = self.get(listing.as_str(), credentials)?;
        let html = String::from_utf8_lossy(&body);

        for link in extract_links(&html) {
            if let Some(name) = tile_name_from_link(&link) {
                let url = listing.join(&link).map_err(|e| ElevationError::Retrieval {
                    url: link.clone(),
                    reason: e.to_string(),
                })?;
                urls.insert(name, url.to_string());
            } else if depth < MAX_LISTING_DEPTH && is_subdirectory(&link) {
                if let Ok(sub) = listing.join(&link) {
                    self.collect_listing(&sub, credentials, depth + 1, urls)?;
                }
            }
        }

        Ok(())
    }
}

impl Retriever for HttpRetriever {
    fn list_tile_urls(
        &self,
        listing_url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<HashMap<String, String>> {
        let listing = Url::parse(listing_url).map_err(|e| ElevationError::Retrieval {
            url: listing_url.to_string(),
            reason: e.to_string(),
        })?;

        let mut urls = HashMap::new();
        self.collect_listing(&listing, credentials, 0, &mut urls)?;
        tracing::info!(listing_url, tiles = urls.len(), "discovered tile urls");
        Ok(urls)
    }

    fn fetch(&self, url: &str, credentials: Option<&Credentials>) -> Result<Vec<u8>> {
        self.get(url, credentials)
    }
}

/// Extract `href` targets from an HTML directory listing.
fn extract_links(html: &str) -> Vec<String> {
    let lower = html.to_ascii_lowercase();
    let mut links = Vec::new();
    let mut rest = 0;

    while let Some(pos) = lower[rest..].find("href=") {
        let start = rest + pos + "href=".len();
        let quote = match html[start..].chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => {
                rest = start;
                continue;
            }
        };
        let value_start = start + 1;
        match html[value_start..].find(quote) {
            Some(len) => {
                links.push(html[value_start..value_start + len].to_string());
                rest = value_start + len + 1;
            }
            None => break,
        }
    }

    links
}

/// Relative links to child directories, e.g. `Eurasia/`.
fn is_subdirectory(link: &str) -> bool {
    link.ends_with('/')
        && !link.starts_with('/')
        && !link.starts_with('?')
        && !link.starts_with("..")
        && !link.contains("://")
        && link.trim_end_matches('/').chars().all(|c| c != '/')
}
