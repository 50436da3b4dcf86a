//! Append-only snapshot storage.
//!
//! No update or delete path exists. `recent` orders by
//! capture time, newest first, and breaks ties by insertion order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use churn_core::{AccountIdentity, Snapshot, SnapshotId};
use engine_logging::{engine_debug, engine_info};
use thiserror::Error;

use crate::filename::storage_name;
use crate::persist::{ensure_storage_dir, AtomicFileWriter, PersistError};

const SNAPSHOT_EXTENSION: &str = "ron";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot storage error: {0}")]
    Storage(#[from] PersistError),
    #[error("snapshot io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
    #[error("corrupt snapshot {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

pub trait SnapshotStore: Send + Sync {
    fn commit(&self, snapshot: Snapshot) -> Result<SnapshotId, StoreError>;
    /// At most `n` snapshots of `account`, newest first.
    fn recent(&self, account: &AccountIdentity, n: usize) -> Result<Vec<Snapshot>, StoreError>;
}

fn newest_first(mut entries: Vec<(u64, Snapshot)>, n: usize) -> Vec<Snapshot> {
    entries.sort_by(|(seq_a, a), (seq_b, b)| {
        b.captured_at()
            .cmp(&a.captured_at())
            .then_with(|| seq_b.cmp(seq_a))
    });
    entries.into_iter().take(n).map(|(_, snapshot)| snapshot).collect()
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<Vec<(u64, Snapshot)>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn commit(&self, snapshot: Snapshot) -> Result<SnapshotId, StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let seq = entries.len() as u64 + 1;
        entries.push((seq, snapshot));
        Ok(SnapshotId(seq))
    }

    fn recent(&self, account: &AccountIdentity, n: usize) -> Result<Vec<Snapshot>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        let matching = entries
            .iter()
            .filter(|(_, snapshot)| snapshot.account() == account)
            .cloned()
            .collect();
        Ok(newest_first(matching, n))
    }
}

/// Stores each snapshot as a RON document under `{root}/{account}/{seq}.ron`.
///
/// Sequence numbers are per account and claimed with a no-clobber create, so
/// concurrent commits never overwrite each other.
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn account_dir(&self, account: &AccountIdentity) -> PathBuf {
        self.root.join(storage_name(account.as_str()))
    }

    fn sequences(dir: &Path) -> Result<Vec<(u64, PathBuf)>, StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut sequences = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            let seq = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u64>().ok());
            if let Some(seq) = seq {
                sequences.push((seq, path));
            }
        }
        Ok(sequences)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn commit(&self, snapshot: Snapshot) -> Result<SnapshotId, StoreError> {
        let dir = self.account_dir(snapshot.account());
        ensure_storage_dir(&dir)?;
        let content = ron::ser::to_string_pretty(&snapshot, ron::ser::PrettyConfig::new())
            .map_err(|err| StoreError::Encode(err.to_string()))?;
        let writer = AtomicFileWriter::new(dir.clone());

        let mut seq = Self::sequences(&dir)?
            .iter()
            .map(|(seq, _)| *seq)
            .max()
            .unwrap_or(0)
            + 1;
        loop {
            let filename = format!("{seq:010}.{SNAPSHOT_EXTENSION}");
            match writer.create_new(&filename, &content) {
                Ok(path) => {
                    engine_info!(
                        "Committed snapshot {} for {} ({} followers, {} following) to {:?}",
                        seq,
                        snapshot.account(),
                        snapshot.followers().len(),
                        snapshot.following().len(),
                        path
                    );
                    return Ok(SnapshotId(seq));
                }
                Err(PersistError::AlreadyExists(_)) => {
                    engine_debug!("Snapshot sequence {} taken, trying next", seq);
                    seq += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn recent(&self, account: &AccountIdentity, n: usize) -> Result<Vec<Snapshot>, StoreError> {
        let dir = self.account_dir(account);
        let mut entries = Vec::new();
        for (seq, path) in Self::sequences(&dir)? {
            let content = fs::read_to_string(&path)?;
            let snapshot: Snapshot =
                ron::from_str(&content).map_err(|err| StoreError::Corrupt {
                    path: path.clone(),
                    message: err.to_string(),
                })?;
            if snapshot.account() == account {
                entries.push((seq, snapshot));
            }
        }
        Ok(newest_first(entries, n))
    }
}
