pub mod backend;

pub use backend::{DurableStorage, FsStorage, MemoryStorage};

use fido_core::{ProjectKey, QueueType, RecordTable};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const BACKUP_SUFFIX: &str = ".backup";

pub type ProjectMap = BTreeMap<ProjectKey, RecordTable>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("storage corrupt at {path}: {reason}")]
    StorageCorrupt { path: PathBuf, reason: String },
    #[error("storage write failed at {path}: {reason}")]
    StorageWriteFailed { path: PathBuf, reason: String },
    #[error("backup of {path} failed: {reason}")]
    BackupFailed { path: PathBuf, reason: String },
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub source: LoadSource,
    pub projects: usize,
    pub warnings: Vec<StorageError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Outcome of a persisting mutation. In-memory state is kept even when
/// `warnings` is non-empty; only durability was lost.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub warnings: Vec<StorageError>,
}

impl SaveReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Every uploaded project, keyed by project key, backed by a single blob.
///
/// Cross-session coordination is refresh-before-use and save-after-mutate;
/// the last writer of a project wins.
pub struct ProjectStore<S: DurableStorage> {
    storage: S,
    path: PathBuf,
    backup_path: PathBuf,
    projects: ProjectMap,
}

impl<S: DurableStorage> ProjectStore<S> {
    /// Loads whatever the medium holds, degrading to backup or empty.
    pub fn open(storage: S, path: impl Into<PathBuf>) -> (Self, LoadReport) {
        let mut store = Self::empty(storage, path);
        let report = store.refresh();
        (store, report)
    }

    /// A store that has not read from the medium yet.
    pub fn empty(storage: S, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_path = backup_path_for(&path);
        Self {
            storage,
            path,
            backup_path,
            projects: ProjectMap::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    pub fn projects(&self) -> &ProjectMap {
        &self.projects
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ProjectKey, &RecordTable)> {
        self.projects.iter()
    }

    /// Keys in upload order.
    pub fn keys(&self) -> Vec<&ProjectKey> {
        self.projects.keys().collect()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn contains(&self, key: &ProjectKey) -> bool {
        self.projects.contains_key(key)
    }

    pub fn get(&self, key: &ProjectKey) -> Result<&RecordTable, StorageError> {
        self.projects
            .get(key)
            .ok_or_else(|| StorageError::ProjectNotFound(key.encode()))
    }

    /// Decodes an externally supplied key and checks it is present.
    pub fn resolve_key(&self, encoded: &str) -> Result<ProjectKey, StorageError> {
        let not_found = || StorageError::ProjectNotFound(encoded.to_string());
        let key: ProjectKey = encoded.trim().parse().map_err(|_| not_found())?;
        if self.contains(&key) {
            Ok(key)
        } else {
            Err(not_found())
        }
    }

    /// Keys whose first segment is exactly `queue`.
    pub fn list_keys_with_prefix(&self, queue: &str) -> Vec<&ProjectKey> {
        self.projects
            .keys()
            .filter(|key| key.queue.as_str() == queue)
            .collect()
    }

    pub fn keys_in_queue(&self, queue: QueueType) -> Vec<&ProjectKey> {
        self.list_keys_with_prefix(queue.as_str())
    }

    /// Insert or replace, then persist.
    pub fn put(&mut self, key: ProjectKey, table: RecordTable) -> SaveReport {
        info!(event = "project_put", key = %key, rows = table.len());
        self.projects.insert(key, table);
        self.save()
    }

    /// Remove and persist. Absent keys are a no-op.
    pub fn delete(&mut self, key: &ProjectKey) -> SaveReport {
        if self.projects.remove(key).is_none() {
            return SaveReport::default();
        }
        info!(event = "project_deleted", key = %key);
        self.save()
    }

    /// Replaces the in-memory map with what is on the medium. Never fails:
    /// unreadable primary falls back to the backup, then to an empty store.
    pub fn refresh(&mut self) -> LoadReport {
        let mut warnings = Vec::new();

        if self.storage.exists(&self.path) {
            match self.read_map(&self.path) {
                Ok(projects) => return self.adopt(projects, LoadSource::Primary, warnings),
                Err(err) => {
                    warn!(event = "store_load_failed", path = %self.path.display(), error = %err);
                    warnings.push(err);
                }
            }
        }

        if self.storage.exists(&self.backup_path) {
            match self.read_map(&self.backup_path) {
                Ok(projects) => {
                    info!(
                        event = "store_loaded_from_backup",
                        path = %self.backup_path.display(),
                        projects = projects.len()
                    );
                    return self.adopt(projects, LoadSource::Backup, warnings);
                }
                Err(err) => {
                    warn!(
                        event = "store_backup_load_failed",
                        path = %self.backup_path.display(),
                        error = %err
                    );
                    warnings.push(err);
                }
            }
        }

        self.adopt(ProjectMap::new(), LoadSource::Empty, warnings)
    }

    /// Writes the whole map: back up the previous good blob, write, read back
    /// and verify, restoring the backup if anything after the backup fails.
    pub fn save(&self) -> SaveReport {
        let mut report = SaveReport::default();

        if self.storage.exists(&self.path) {
            match self.read_map(&self.path) {
                Ok(_) => {
                    if let Err(err) = self.storage.copy(&self.path, &self.backup_path) {
                        let err = StorageError::BackupFailed {
                            path: self.path.clone(),
                            reason: err.to_string(),
                        };
                        warn!(event = "store_backup_failed", error = %err);
                        report.warnings.push(err);
                    }
                }
                // A corrupt primary must not overwrite the last good backup.
                Err(err) => {
                    warn!(event = "store_backup_skipped", error = %err);
                }
            }
        }

        let payload = match serde_json::to_vec_pretty(&self.projects) {
            Ok(payload) => payload,
            Err(err) => {
                let err = StorageError::Serialization(err.to_string());
                warn!(event = "store_serialize_failed", error = %err);
                report.warnings.push(err);
                return report;
            }
        };

        let outcome = self
            .storage
            .write(&self.path, &payload)
            .map_err(|err| StorageError::StorageWriteFailed {
                path: self.path.clone(),
                reason: err.to_string(),
            })
            .and_then(|_| self.verify_written());

        if let Err(err) = outcome {
            warn!(event = "store_save_failed", path = %self.path.display(), error = %err);
            report.warnings.push(err);
            if let Some(restore_err) = self.restore_backup() {
                report.warnings.push(restore_err);
            }
        }

        report
    }

    fn adopt(
        &mut self,
        projects: ProjectMap,
        source: LoadSource,
        warnings: Vec<StorageError>,
    ) -> LoadReport {
        self.projects = projects;
        LoadReport {
            source,
            projects: self.projects.len(),
            warnings,
        }
    }

    fn read_map(&self, path: &Path) -> Result<ProjectMap, StorageError> {
        let corrupt = |reason: String| StorageError::StorageCorrupt {
            path: path.to_path_buf(),
            reason,
        };
        let blob = self
            .storage
            .read(path)
            .map_err(|err| corrupt(format!("read failed: {err}")))?;
        serde_json::from_slice::<ProjectMap>(&blob).map_err(|err| corrupt(err.to_string()))
    }

    fn verify_written(&self) -> Result<(), StorageError> {
        let written = self.read_map(&self.path)?;
        if written.len() != self.projects.len() {
            return Err(StorageError::StorageCorrupt {
                path: self.path.clone(),
                reason: format!(
                    "read back {} projects, expected {}",
                    written.len(),
                    self.projects.len()
                ),
            });
        }
        Ok(())
    }

    fn restore_backup(&self) -> Option<StorageError> {
        if !self.storage.exists(&self.backup_path) {
            return None;
        }
        match self.storage.copy(&self.backup_path, &self.path) {
            Ok(()) => {
                info!(event = "store_restored_from_backup", path = %self.path.display());
                None
            }
            Err(err) => {
                let err = StorageError::StorageWriteFailed {
                    path: self.path.clone(),
                    reason: format!("restore from backup failed: {err}"),
                };
                warn!(event = "store_restore_failed", error = %err);
                Some(err)
            }
        }
    }
}

pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}
