use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write blob {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Key-value persistence surface the host environment provides.
///
/// Reads are best-effort (`None` covers both "absent" and "unreadable");
/// write failures surface as [`StoreError`] but callers treat persistence as
/// advisory and only log them.
pub trait BlobStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Directory-backed store with atomic writes.
///
/// Keys are hashed into stable filenames, so arbitrarily long root paths fit
/// the filesystem's name limits.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.base_dir
            .join(format!("{}.json", hex::encode(hasher.finalize())))
    }
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.blob_path(key);
        match fs::read_to_string(&path) {
            Ok(data) => Some(data),
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(
                        target: "beacon.project",
                        path = %path.display(),
                        error = %err,
                        "failed to read cache blob; treating as absent"
                    );
                }
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.blob_path(key);
        let parent = self.base_dir.as_path();
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        let (tmp_path, mut file) =
            open_unique_tmp_file(&path, parent).map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;

        if let Err(source) = file
            .write_all(value.as_bytes())
            .and_then(|()| file.sync_all())
        {
            drop(file);
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Write {
                path: tmp_path,
                source,
            });
        }
        drop(file);

        // `rename` is atomic on Unix but refuses to overwrite on Windows;
        // fall back to remove+rename there.
        let rename_result = match fs::rename(&tmp_path, &path) {
            Ok(()) => Ok(()),
            Err(err) if cfg!(windows) && (err.kind() == io::ErrorKind::AlreadyExists || path.exists()) => {
                let _ = fs::remove_file(&path);
                fs::rename(&tmp_path, &path)
            }
            Err(err) => Err(err),
        };
        if let Err(source) = rename_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::Write { path, source });
        }

        #[cfg(unix)]
        {
            let _ = fs::File::open(parent).and_then(|dir| dir.sync_all());
        }

        Ok(())
    }
}

fn open_unique_tmp_file(dest: &Path, parent: &Path) -> io::Result<(PathBuf, fs::File)> {
    let file_name = dest
        .file_name()
        .ok_or_else(|| io::Error::other("destination path has no file name"))?;
    let pid = std::process::id();

    loop {
        let counter = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(format!(".tmp.{pid}.{counter}"));
        let tmp_path = parent.join(tmp_name);

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
        {
            Ok(file) => return Ok((tmp_path, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }
}

/// In-memory store for tests; counts writes so debounce behavior can be
/// asserted.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
