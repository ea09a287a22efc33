use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tempfile::NamedTempFile;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::store::{OptimisticStore, SEED_VALUE};

/// Errors produced by [`FileStore`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FileStoreError {
    /// The scope name cannot be used as a file name.
    #[error("invalid scope name {0:?}: use [A-Za-z0-9._-] and do not start with '.'")]
    InvalidScope(String),

    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file or directory being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// An [`OptimisticStore`] keeping one plain-text file per scope in a
/// directory.
///
/// Any number of processes on the same host (or sharing a filesystem with
/// working advisory locks) may open the same directory.
///
/// - **Seeding** writes `"1"` to a temporary file and publishes it with a
///   no-clobber link, so exactly one seed ever lands.
/// - **Fencing** uses the content seen at [`read`] as the token. Counters
///   never move backwards, so an unchanged value means no write landed in
///   between.
/// - **Writes** hold an exclusive lock on `.<scope>.lock`, re-read the record,
///   compare it with the token and atomically rename a temporary file over it.
///
/// Readers never take the lock; they always observe a whole value.
///
/// # Example
/// ```
/// use rangeid::{FileStore, IdGenerator};
///
/// let dir = tempfile::tempdir().unwrap();
/// let generator = IdGenerator::new(FileStore::open(dir.path()).unwrap());
///
/// assert_eq!(generator.next_id("invoices").unwrap(), 2);
/// assert_eq!(generator.next_id("invoices").unwrap(), 3);
/// ```
///
/// [`read`]: OptimisticStore::read
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    fences: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens `dir` as a counter directory, creating it if needed.
    ///
    /// # Errors
    /// Returns [`FileStoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        Ok(Self {
            dir,
            fences: Mutex::default(),
        })
    }

    /// The directory holding the counter files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, scope: &str) -> Result<PathBuf, FileStoreError> {
        let valid = !scope.is_empty()
            && !scope.starts_with('.')
            && scope
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            return Err(FileStoreError::InvalidScope(scope.to_owned()));
        }
        Ok(self.dir.join(scope))
    }

    fn seed(&self, path: &Path) -> Result<(), FileStoreError> {
        let tmp = self.stage(SEED_VALUE)?;
        match tmp.persist_noclobber(path) {
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %path.display(), "seeded counter");
                Ok(())
            }
            // Someone else seeded first; their value stands.
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(io_err(path)(e.error)),
        }
    }

    fn stage(&self, value: &str) -> Result<NamedTempFile, FileStoreError> {
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err(&self.dir))?;
        tmp.write_all(value.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(io_err(tmp.path()))?;
        Ok(tmp)
    }
}

impl OptimisticStore for FileStore {
    type Err = FileStoreError;

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn read(&self, scope: &str) -> Result<String, Self::Err> {
        let path = self.record_path(scope)?;
        let value = match read_record(&path) {
            Ok(value) => value,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.seed(&path)?;
                read_record(&path).map_err(io_err(&path))?
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        relock(&self.fences).insert(scope.to_owned(), value.clone());
        Ok(value)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn try_write(&self, scope: &str, value: &str) -> Result<bool, Self::Err> {
        let path = self.record_path(scope)?;
        let Some(fence) = relock(&self.fences).get(scope).cloned() else {
            return Ok(false);
        };

        let lock_path = self.dir.join(format!(".{scope}.lock"));
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_err(&lock_path))?;
        // Released when `lock` is dropped.
        lock.lock().map_err(io_err(&lock_path))?;

        let current = match read_record(&path) {
            Ok(current) => current,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_err(&path)(e)),
        };
        if current != fence {
            return Ok(false);
        }

        self.stage(value)?
            .persist(&path)
            .map_err(|e| io_err(&path)(e.error))?;
        relock(&self.fences).insert(scope.to_owned(), value.to_owned());
        Ok(true)
    }
}

/// Reads a record without rejecting invalid UTF-8; such content fails later
/// as a corrupt value.
fn read_record(path: &Path) -> io::Result<String> {
    fs::read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> FileStoreError {
    let path = path.to_path_buf();
    move |source| FileStoreError::Io { path, source }
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("counters")).unwrap();
        (dir, store)
    }

    #[test]
    fn open_creates_directory() {
        let (dir, store) = open();
        assert!(dir.path().join("counters").is_dir());
        assert_eq!(store.dir(), dir.path().join("counters"));
    }

    #[test]
    fn read_seeds_absent_scope() {
        let (_dir, store) = open();
        assert_eq!(store.read("orders").unwrap(), SEED_VALUE);
        let on_disk = fs::read_to_string(store.dir().join("orders")).unwrap();
        assert_eq!(on_disk, SEED_VALUE);
    }

    #[test]
    fn existing_record_is_not_reseeded() {
        let (_dir, store) = open();
        fs::write(store.dir().join("orders"), "500").unwrap();
        assert_eq!(store.read("orders").unwrap(), "500");
    }

    #[test]
    fn write_requires_prior_read() {
        let (_dir, store) = open();
        fs::write(store.dir().join("orders"), "500").unwrap();
        assert!(!store.try_write("orders", "600").unwrap());

        store.read("orders").unwrap();
        assert!(store.try_write("orders", "600").unwrap());
        assert_eq!(fs::read_to_string(store.dir().join("orders")).unwrap(), "600");
    }

    #[test]
    fn two_handles_are_fenced() {
        let (_dir, a) = open();
        let b = FileStore::open(a.dir()).unwrap();

        assert_eq!(a.read("s").unwrap(), "1");
        assert_eq!(b.read("s").unwrap(), "1");
        assert!(a.try_write("s", "101").unwrap());
        assert!(!b.try_write("s", "101").unwrap());

        assert_eq!(b.read("s").unwrap(), "101");
        assert!(b.try_write("s", "201").unwrap());
    }

    #[test]
    fn concurrent_seeding_is_absorbed() {
        let (_dir, base) = open();
        let handles: Vec<_> = (0..8).map(|_| FileStore::open(base.dir()).unwrap()).collect();
        let barrier = std::sync::Barrier::new(handles.len());

        std::thread::scope(|s| {
            for h in &handles {
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    assert_eq!(h.read("race").unwrap(), SEED_VALUE);
                });
            }
        });

        let wins = handles
            .iter()
            .filter(|h| h.try_write("race", "101").unwrap())
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn invalid_scopes_are_rejected() {
        let (_dir, store) = open();
        for scope in ["", ".hidden", "a/b", "..", "x y", "ü"] {
            assert!(
                matches!(store.read(scope), Err(FileStoreError::InvalidScope(_))),
                "{scope:?} should be rejected"
            );
        }
    }
}
