//! Blob storage backends for downloaded tiles and the URL manifest.
//!
//! The engine only ever calls the three operations of [`Storage`]; it never
//! assumes a particular medium. Two backends are bundled:
//!
//! - [`FileStorage`] keeps blobs in a directory (by default `~/.cache/srtm`)
//! - [`MemoryStorage`] keeps blobs in process memory

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{ElevationError, Result};

/// Named blob storage used to persist tiles between runs.
///
/// Names are relative, `/`-separated paths such as `srtm3/N35E138.hgt.zip`
/// or `list.json`.
pub trait Storage: Send + Sync {
    /// Returns `true` if a blob with this name exists.
    fn exists(&self, name: &str) -> bool;

    /// Read a whole blob.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Create or replace a blob.
    fn write(&self, name: &str, contents: &[u8]) -> Result<()>;
}

/// Directory-backed [`Storage`].
///
/// # Example
///
/// ```ignore
/// use geoelev::FileStorage;
///
/// let storage = FileStorage::new("/data/srtm");
/// // Tiles land in /data/srtm/srtm3/N35E138.hgt etc.
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Store blobs under `root`. The directory is created on first write.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Store blobs in the default cache directory, `$HOME/.cache/srtm`.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::Configuration`] if neither `HOME` nor
    /// `HOMEPATH` is set.
    pub fn in_default_dir() -> Result<Self> {
        Ok(Self::new(Self::default_dir()?))
    }

    /// The default cache directory, `$HOME/.cache/srtm`.
    pub fn default_dir() -> Result<PathBuf> {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("HOMEPATH"))
            .ok_or_else(|| {
                ElevationError::Configuration(
                    "no HOME directory found, please specify a path where to store files"
                        .to_string(),
                )
            })?;
        Ok(PathBuf::from(home).join(".cache").join("srtm"))
    }

    /// Get the root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with(['/', '\\'])
            || Path::new(name).is_absolute()
            || name.split(['/', '\\']).any(|part| part == "..")
        {
            return Err(ElevationError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid blob name '{name}'"),
            )));
        }
        Ok(self.root.join(name))
    }
}

impl Storage for FileStorage {
    fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path_for(name)?)?)
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        let path = self.path_for(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write aside and rename so readers never observe a partial blob
        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        fs::write(&partial, contents)?;
        fs::rename(&partial, &path)?;
        Ok(())
    }
}

/// In-memory [`Storage`], mostly useful for tests and short-lived tools.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted names of all stored blobs.
    pub fn names(&self) -> Vec<String> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = blobs.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Storage for MemoryStorage {
    fn exists(&self, name: &str) -> bool {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs.contains_key(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs.get(name).cloned().ok_or_else(|| {
            ElevationError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no blob named '{name}'"),
            ))
        })
    }

    fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(name.to_string(), contents.to_vec());
        Ok(())
    }
}
