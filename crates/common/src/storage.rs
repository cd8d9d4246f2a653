//! Marker storage
//!
//! A persisted set of names. The filesystem backend keeps one zero-byte file
//! per name in a directory; the memory backend serves tests and dry runs.
//! Neither backend is transactional: callers that need mutual exclusion
//! across processes take [`FsMarkerStore::try_lock`] first.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::error::PersistenceError;

/// Name of the lock file inside a marker directory
pub const LOCK_FILE_NAME: &str = ".lock";

#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn contains(&self, name: &str) -> Result<bool, PersistenceError>;
    async fn insert(&self, name: &str) -> Result<(), PersistenceError>;
    async fn remove(&self, name: &str) -> Result<(), PersistenceError>;
    async fn names(&self) -> Result<Vec<String>, PersistenceError>;
}

fn check_name(name: &str) -> Result<(), PersistenceError> {
    if name.is_empty() || name.starts_with('.') || name.contains('/') || name.contains('\0') {
        return Err(PersistenceError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Directory-backed marker set
#[derive(Debug, Clone)]
pub struct FsMarkerStore {
    dir: PathBuf,
}

impl FsMarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        check_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Take an exclusive, non-blocking lock on the directory.
    ///
    /// The lock is held until the returned guard is dropped.
    pub fn try_lock(&self) -> Result<DirectoryLock, PersistenceError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PersistenceError::io(&self.dir, e))?;

        let path = self.dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| PersistenceError::io(&path, e))?;

        let lock_result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if lock_result != 0 {
            let err = std::io::Error::last_os_error();
            return Err(if err.kind() == ErrorKind::WouldBlock {
                PersistenceError::Locked { path }
            } else {
                PersistenceError::io(&path, err)
            });
        }

        debug!("Acquired exclusive lock on {}", path.display());
        Ok(DirectoryLock { file, path })
    }
}

#[async_trait]
impl MarkerStore for FsMarkerStore {
    async fn contains(&self, name: &str) -> Result<bool, PersistenceError> {
        let path = self.path_of(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    async fn insert(&self, name: &str) -> Result<(), PersistenceError> {
        let path = self.path_of(name)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?;
        tokio::fs::File::create(&path)
            .await
            .map_err(|e| PersistenceError::io(&path, e))?;
        debug!("Created marker {}", path.display());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), PersistenceError> {
        let path = self.path_of(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Marker {} already gone", path.display());
                Ok(())
            }
            Err(e) => Err(PersistenceError::io(path, e)),
        }
    }

    async fn names(&self) -> Result<Vec<String>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&self.dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistenceError::io(&self.dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PersistenceError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

/// Guard for [`FsMarkerStore::try_lock`]
#[derive(Debug)]
pub struct DirectoryLock {
    file: File,
    path: PathBuf,
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!("Released lock on {}", self.path.display());
    }
}

/// In-memory marker set
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    names: RwLock<BTreeSet<String>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: RwLock::new(names.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn contains(&self, name: &str) -> Result<bool, PersistenceError> {
        check_name(name)?;
        Ok(self.names.read().unwrap().contains(name))
    }

    async fn insert(&self, name: &str) -> Result<(), PersistenceError> {
        check_name(name)?;
        self.names.write().unwrap().insert(name.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), PersistenceError> {
        check_name(name)?;
        self.names.write().unwrap().remove(name);
        Ok(())
    }

    async fn names(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.names.read().unwrap().iter().cloned().collect())
    }
}
