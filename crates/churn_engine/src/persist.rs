use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage directory missing or not writable: {0}")]
    StorageDir(String),
    #[error("{0} already exists")]
    AlreadyExists(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the storage directory exists; create if missing.
pub fn ensure_storage_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::StorageDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::StorageDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::StorageDir(e.to_string()))?;
    }
    Ok(())
}

/// Creates files under one directory through a temp file so readers never see
/// partial content.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `{dir}/{filename}` only if it does not exist yet.
    ///
    /// The existence check and the write are a single atomic link, so two
    /// writers racing for the same name cannot both succeed.
    pub fn create_new(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let tmp = self.staged(content)?;
        match tmp.persist_noclobber(&target) {
            Ok(_) => Ok(target),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(PersistError::AlreadyExists(target))
            }
            Err(e) => Err(PersistError::Io(e.error)),
        }
    }

    fn staged(&self, content: &str) -> Result<NamedTempFile, PersistError> {
        ensure_storage_dir(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        Ok(tmp)
    }
}
