//! Storage abstraction for the persisted interest record
//!
//! The whole store serializes to a single JSON blob, rewritten on every
//! mutation. Backends only move bytes; decoding and merge semantics live in
//! the store engine.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::StorageError;

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Byte-level persistence for the interest record blob
pub trait StorageBackend: Send {
    /// Read the persisted blob, `None` if nothing was ever stored
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Replace the persisted blob
    fn store(&mut self, data: Vec<u8>) -> Result<(), StorageError>;
}

// ----------------------------------------------------------------------------
// Memory Backend
// ----------------------------------------------------------------------------

/// In-memory backend for testing and fallback
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Option<Vec<u8>>,
}

impl MemoryBackend {
    /// Create an empty memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory backend seeded with an existing blob
    pub fn with_contents(data: Vec<u8>) -> Self {
        Self { data: Some(data) }
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.clone())
    }

    fn store(&mut self, data: Vec<u8>) -> Result<(), StorageError> {
        self.data = Some(data);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File Backend
// ----------------------------------------------------------------------------

/// Single-file backend holding the JSON blob on disk.
///
/// Writes go through a sibling temp file and a rename so a crash mid-write
/// never leaves a truncated record behind.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".tmp");
        PathBuf::from(path)
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Backend {
                reason: format!("reading {}: {e}", self.path.display()),
            }),
        }
    }

    fn store(&mut self, data: Vec<u8>) -> Result<(), StorageError> {
        let temp = self.temp_path();
        fs::write(&temp, &data).map_err(|e| StorageError::Backend {
            reason: format!("writing {}: {e}", temp.display()),
        })?;
        fs::rename(&temp, &self.path).map_err(|e| StorageError::Backend {
            reason: format!("replacing {}: {e}", self.path.display()),
        })
    }
}

// ----------------------------------------------------------------------------
// Factory Functions
// ----------------------------------------------------------------------------

/// Create a backend for testing
pub fn create_test_backend() -> MemoryBackend {
    MemoryBackend::new()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_backend_round_trip() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.load().unwrap(), None);

        backend.store(b"{}".to_vec()).unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"{}".to_vec()));

        backend.store(b"{\"a\":1}".to_vec()).unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"{\"a\":1}".to_vec()));
    }

    #[test]
    fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interests.json");
        let mut backend = FileBackend::new(&path);

        assert_eq!(backend.load().unwrap(), None);

        backend.store(b"{\"k\":true}".to_vec()).unwrap();
        assert_eq!(backend.load().unwrap(), Some(b"{\"k\":true}".to_vec()));

        // A second backend on the same path sees the persisted blob.
        let reopened = FileBackend::new(&path);
        assert_eq!(reopened.load().unwrap(), Some(b"{\"k\":true}".to_vec()));

        // No temp file is left behind after a successful write.
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_file_backend_unreadable_path() {
        let backend = FileBackend::new("/definitely/not/a/real/dir/interests.json");
        assert_eq!(backend.load().unwrap(), None);

        let mut backend = FileBackend::new("/definitely/not/a/real/dir/interests.json");
        assert!(backend.store(b"{}".to_vec()).is_err());
    }
}
