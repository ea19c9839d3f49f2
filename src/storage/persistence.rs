//! Artifact persistence layer
//!
//! Artifacts are stored with a version number. Writers load a version,
//! apply a state-machine operation and write back with compare-and-swap; a
//! concurrent writer that got there first makes the swap fail with
//! [`StorageError::StaleVersion`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::multisig::PendingArtifact;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Artifact {id} changed: expected version {expected}, found {actual}")]
    StaleVersion {
        id: String,
        expected: u64,
        actual: u64,
    },
    #[error("Artifact not found: {0}")]
    NotFound(String),
    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),
    #[error("Storage lock poisoned")]
    LockPoisoned,
    #[error("Timed out waiting for lock {0}")]
    Locked(String),
}

/// A stored value and the version it was read at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Versioned artifact storage
pub trait ArtifactStore: Send + Sync {
    fn load(&self, id: &str) -> Result<Option<Versioned<PendingArtifact>>, StorageError>;

    /// Store a new artifact at version 1
    fn insert(&self, artifact: &PendingArtifact) -> Result<u64, StorageError>;

    /// Replace the artifact if it is still at `expected`; returns the new version
    fn compare_and_swap(
        &self,
        artifact: &PendingArtifact,
        expected: u64,
    ) -> Result<u64, StorageError>;

    fn list_ids(&self) -> Result<Vec<String>, StorageError>;
}

fn check_version(id: &str, expected: u64, actual: u64) -> Result<(), StorageError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StorageError::StaleVersion {
            id: id.to_string(),
            expected,
            actual,
        })
    }
}

type ArtifactMap = HashMap<String, Versioned<PendingArtifact>>;

/// In-process artifact store
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<ArtifactMap>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, ArtifactMap>, StorageError> {
        self.artifacts
            .lock()
            .map_err(|_| StorageError::LockPoisoned)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self, id: &str) -> Result<Option<Versioned<PendingArtifact>>, StorageError> {
        let artifacts = self.entries()?;
        Ok(artifacts.get(id).cloned())
    }

    fn insert(&self, artifact: &PendingArtifact) -> Result<u64, StorageError> {
        let mut artifacts = self.entries()?;
        if artifacts.contains_key(&artifact.id) {
            return Err(StorageError::AlreadyExists(artifact.id.clone()));
        }
        artifacts.insert(
            artifact.id.clone(),
            Versioned {
                version: 1,
                value: artifact.clone(),
            },
        );
        Ok(1)
    }

    fn compare_and_swap(
        &self,
        artifact: &PendingArtifact,
        expected: u64,
    ) -> Result<u64, StorageError> {
        let mut artifacts = self.entries()?;
        let stored = artifacts
            .get_mut(&artifact.id)
            .ok_or_else(|| StorageError::NotFound(artifact.id.clone()))?;
        check_version(&artifact.id, expected, stored.version)?;

        stored.version += 1;
        stored.value = artifact.clone();
        Ok(stored.version)
    }

    fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        let artifacts = self.entries()?;
        let mut ids: Vec<String> = artifacts.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub artifacts_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            artifacts_dir: "artifacts".to_string(),
        }
    }
}

/// How long a writer waits for another writer's artifact lock
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(2);

/// Exclusive claim on one artifact, held as a `{id}.lock` file
///
/// The file is created with `create_new`, so only one holder exists across
/// every process sharing the directory. Dropping the guard releases it.
#[derive(Debug)]
struct ArtifactLock {
    path: PathBuf,
}

impl ArtifactLock {
    fn acquire(path: PathBuf) -> Result<Self, StorageError> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= LOCK_TIMEOUT {
                        return Err(StorageError::Locked(path.display().to_string()));
                    }
                    thread::sleep(LOCK_RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for ArtifactLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Artifact store keeping one JSON file per artifact
///
/// Inserts and swaps hold the artifact's lock file across the version check
/// and the write, so separate processes on one directory serialize too.
/// Each write goes to its own temporary file that is renamed into place;
/// readers never see a partial record.
#[derive(Debug)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        let dir = config.data_dir.join(&config.artifacts_dir);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Create with default configuration
    pub fn with_defaults() -> Result<Self, StorageError> {
        Self::new(StorageConfig::default())
    }

    fn validate_id(id: &str) -> Result<(), StorageError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidData(format!(
                "bad artifact id {:?}",
                id
            )));
        }
        Ok(())
    }

    fn artifact_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        Self::validate_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn lock(&self, id: &str) -> Result<ArtifactLock, StorageError> {
        Self::validate_id(id)?;
        ArtifactLock::acquire(self.dir.join(format!("{}.lock", id)))
    }

    fn read(&self, path: &Path) -> Result<Option<Versioned<PendingArtifact>>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        load_from_file(path).map(Some)
    }

    fn write(&self, path: &Path, record: &Versioned<PendingArtifact>) -> Result<(), StorageError> {
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, record)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path)
            .map_err(|e| StorageError::IoError(e.error))?;
        Ok(())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn load(&self, id: &str) -> Result<Option<Versioned<PendingArtifact>>, StorageError> {
        let path = self.artifact_path(id)?;
        self.read(&path)
    }

    fn insert(&self, artifact: &PendingArtifact) -> Result<u64, StorageError> {
        let path = self.artifact_path(&artifact.id)?;
        let _lock = self.lock(&artifact.id)?;
        if path.exists() {
            return Err(StorageError::AlreadyExists(artifact.id.clone()));
        }
        let record = Versioned {
            version: 1,
            value: artifact.clone(),
        };
        self.write(&path, &record)?;
        Ok(1)
    }

    fn compare_and_swap(
        &self,
        artifact: &PendingArtifact,
        expected: u64,
    ) -> Result<u64, StorageError> {
        let path = self.artifact_path(&artifact.id)?;
        let _lock = self.lock(&artifact.id)?;
        let current = self
            .read(&path)?
            .ok_or_else(|| StorageError::NotFound(artifact.id.clone()))?;
        check_version(&artifact.id, expected, current.version)?;

        let record = Versioned {
            version: current.version + 1,
            value: artifact.clone(),
        };
        self.write(&path, &record)?;
        Ok(record.version)
    }

    fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Save a value as pretty JSON
pub fn save_to_file<T: Serialize>(value: &T, path: &Path) -> Result<(), StorageError> {
    let file = fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

/// Load a JSON value
pub fn load_from_file<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
