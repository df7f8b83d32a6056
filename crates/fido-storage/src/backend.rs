use fs2::FileExt;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Blob-level durable medium. The store owns the format; backends only move bytes.
pub trait DurableStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn write(&self, path: &Path, blob: &[u8]) -> io::Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Local filesystem backend.
///
/// Writes go to a sibling temp file and are renamed into place while an
/// exclusive advisory lock is held on `<path>.lock`, so cooperating processes
/// never observe a half-written store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

impl DurableStorage for FsStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, blob: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(sibling_with_suffix(path, ".lock"))?;
        lock_file.lock_exclusive()?;

        let temp_path = sibling_with_suffix(path, ".tmp");
        let result = fs::write(&temp_path, blob).and_then(|_| fs::rename(&temp_path, path));
        let _ = lock_file.unlock();
        result
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }
}

/// In-process backend for tests and throwaway sessions, with failure injection.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RefCell<HashMap<PathBuf, Vec<u8>>>,
    fail_writes: Cell<bool>,
    fail_copies: Cell<bool>,
    mangle_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, blob: impl Into<Vec<u8>>) {
        self.blobs.borrow_mut().insert(path.into(), blob.into());
    }

    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.blobs.borrow().get(path).cloned()
    }

    /// Every write fails with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn set_fail_copies(&self, fail: bool) {
        self.fail_copies.set(fail);
    }

    /// Writes report success but persist truncated bytes.
    pub fn set_mangle_writes(&self, mangle: bool) {
        self.mangle_writes.set(mangle);
    }
}

impl DurableStorage for MemoryStorage {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )
        })
    }

    fn write(&self, path: &Path, blob: &[u8]) -> io::Result<()> {
        if self.fail_writes.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let stored = if self.mangle_writes.get() {
            blob[..blob.len() / 2].to_vec()
        } else {
            blob.to_vec()
        };
        self.insert(path, stored);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.blobs.borrow().contains_key(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_copies.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "injected copy failure"));
        }
        let blob = self.read(from)?;
        self.insert(to, blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fs_write_creates_parents_and_replaces_atomically() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/projects.json");
        let storage = FsStorage::new();

        storage.write(&path, b"{\"a\":1}").expect("first write");
        storage.write(&path, b"{}").expect("second write");

        assert!(storage.exists(&path));
        assert_eq!(storage.read(&path).expect("read"), b"{}".to_vec());
        assert!(!sibling_with_suffix(&path, ".tmp").exists());
    }

    #[test]
    fn fs_copy_duplicates_bytes() {
        let dir = tempdir().expect("tempdir");
        let from = dir.path().join("projects.json");
        let to = dir.path().join("projects.json.backup");
        let storage = FsStorage::new();

        storage.write(&from, b"payload").expect("write");
        storage.copy(&from, &to).expect("copy");
        assert_eq!(storage.read(&to).expect("read backup"), b"payload".to_vec());
    }

    #[test]
    fn memory_storage_injects_failures() {
        let storage = MemoryStorage::new();
        let path = Path::new("store.json");

        storage.set_fail_writes(true);
        assert!(storage.write(path, b"x").is_err());
        assert!(!storage.exists(path));

        storage.set_fail_writes(false);
        storage.set_mangle_writes(true);
        storage.write(path, b"abcd").expect("mangled write");
        assert_eq!(storage.contents(path), Some(b"ab".to_vec()));

        storage.set_fail_copies(true);
        assert!(storage.copy(path, Path::new("store.json.backup")).is_err());
    }
}
