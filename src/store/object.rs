//! Filesystem object store for raw fetched bytes

use std::path::{Component, Path, PathBuf};

use tokio::fs;
use tracing::debug;
use url::Url;

use super::ObjectStore;
use super::error::StorageError;

/// Longest flattened path kept in a key, in bytes; filenames cap at 255
const MAX_NAME_BYTES: usize = 200;

fn clip_to_bytes(name: &str, max: usize) -> &str {
    if name.len() <= max {
        return name;
    }
    let mut end = max;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Object key for a fetched URL: `<host>/<flattened path>-<hash prefix>`.
///
/// The hash prefix keeps every archived version of a URL distinct.
pub fn object_key(url: &str, content_hash: &str) -> Result<String, StorageError> {
    let parsed = Url::parse(url).map_err(|e| StorageError::InvalidKey(format!("{}: {}", url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| StorageError::InvalidKey(format!("URL has no host: {}", url)))?;

    let safe_path = parsed
        .path()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '/' { c } else { '_' })
        .collect::<String>();
    let trimmed = safe_path.trim_matches('/');
    let name = if trimmed.is_empty() {
        "index".to_string()
    } else {
        clip_to_bytes(&trimmed.replace('/', "_"), MAX_NAME_BYTES).to_string()
    };

    let prefix: String = content_hash.chars().take(12).collect();
    Ok(format!("{}/{}-{}", host, name, prefix))
}

/// Object store writing under a base directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(relative))
    }

    fn locator(path: &Path) -> Result<String, StorageError> {
        Url::from_file_path(path)
            .map(|u| u.to_string())
            .map_err(|_| StorageError::InvalidKey(path.display().to_string()))
    }
}

impl ObjectStore for LocalObjectStore {
    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;

        let absolute = fs::canonicalize(&path).await?;
        debug!(key, bytes = bytes.len(), "Archived object");
        Self::locator(&absolute)
    }

    fn presign(&self, key: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let absolute = std::fs::canonicalize(&path)?;
        Self::locator(&absolute)
    }
}
