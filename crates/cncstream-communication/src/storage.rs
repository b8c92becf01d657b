//! Upload destinations
//!
//! The `Storage` trait is the byte-oriented file store an upload channel
//! writes into. `LocalStorage` maps it onto a directory of the host
//! filesystem.

use cncstream_core::StorageError;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

/// A file store uploads are written into
pub trait Storage {
    /// Writer for a newly created file
    type Writer: Write;

    /// Map a request path onto a storage location
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError>;

    /// Bytes that may still be written
    fn available_space(&self) -> Result<u64, StorageError>;

    /// Size of the file currently stored at `path`, if any
    fn existing_size(&self, path: &Path) -> Option<u64>;

    /// Create (or truncate) the file at `path`
    fn create(&self, path: &Path) -> Result<Self::Writer, StorageError>;
}

/// Storage rooted at a directory on the host filesystem
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    quota: Option<u64>,
}

impl LocalStorage {
    /// Create storage rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quota: None,
        }
    }

    /// Limit the total bytes stored under the root
    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    /// The storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total size of the regular files under the root
    pub fn used_bytes(&self) -> io::Result<u64> {
        directory_size(&self.root)
    }
}

fn directory_size(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += directory_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Check a request path and turn it into a path relative to a storage root
pub fn sanitize_path(path: &str) -> Result<PathBuf, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.contains('\0') {
        return Err(invalid("contains NUL"));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("parent directory reference")),
            Component::RootDir | Component::Prefix(_) => return Err(invalid("absolute path")),
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(invalid("no file name"));
    }
    Ok(relative)
}

impl Storage for LocalStorage {
    type Writer = BufWriter<File>;

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(sanitize_path(path)?))
    }

    fn available_space(&self) -> Result<u64, StorageError> {
        fs::create_dir_all(&self.root)?;
        let free = fs4::available_space(&self.root)?;
        match self.quota {
            Some(quota) => Ok(free.min(quota.saturating_sub(self.used_bytes()?))),
            None => Ok(free),
        }
    }

    fn existing_size(&self, path: &Path) -> Option<u64> {
        fs::metadata(path)
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
    }

    fn create(&self, path: &Path) -> Result<Self::Writer, StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(BufWriter::new(File::create(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_accepts_nested_paths() {
        assert_eq!(sanitize_path("job.nc").unwrap(), PathBuf::from("job.nc"));
        assert_eq!(
            sanitize_path("jobs/./part.nc").unwrap(),
            PathBuf::from("jobs/part.nc")
        );
    }

    #[test]
    fn test_sanitize_rejects_escapes() {
        for bad in ["", "/etc/passwd", "../up.nc", "a/../../b", "nul\0.nc", "."] {
            assert!(
                matches!(sanitize_path(bad), Err(StorageError::InvalidPath { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_quota_limits_free_space() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.nc"), [0u8; 40]).unwrap();
        let storage = LocalStorage::new(dir.path()).with_quota(Some(100));
        assert_eq!(storage.used_bytes().unwrap(), 40);
        assert_eq!(storage.available_space().unwrap(), 60);
    }

    #[test]
    fn test_existing_size() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let path = storage.resolve("a.nc").unwrap();
        assert_eq!(storage.existing_size(&path), None);
        fs::write(&path, b"abc").unwrap();
        assert_eq!(storage.existing_size(&path), Some(3));
    }
}
