//! Single-flight run lock keyed by account.
//!
//! The lock is an entry in a key-value store with an expiry. Acquisition is an
//! atomic set-if-absent; the expiry only matters when a worker died without
//! releasing.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use churn_core::AccountIdentity;
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filename::storage_name;
use crate::persist::{AtomicFileWriter, PersistError};
use crate::{system_clock, Clock};

/// Default lifetime of a lock entry.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(3600);

const LOCK_MARKER: &str = "running";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock storage error: {0}")]
    Storage(#[from] PersistError),
    #[error("lock io error: {0}")]
    Io(#[from] io::Error),
    #[error("lock record encoding failed: {0}")]
    Encode(String),
    #[error("lock ttl {0:?} is out of range")]
    InvalidTtl(Duration),
}

/// Shared store with expiring keys and atomic set-if-absent.
pub trait KeyValueStore: Send + Sync {
    /// Sets `key` unless a live entry exists. Returns `true` when set.
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError>;
    /// Removes `key`. Returns `true` if a live entry was removed.
    fn delete(&self, key: &str) -> Result<bool, LockError>;
    /// Whether a live entry exists for `key`.
    fn exists(&self, key: &str) -> Result<bool, LockError>;
}

/// A zero ttl would store an entry that is already expired.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, LockError> {
    if ttl.is_zero() {
        return Err(LockError::InvalidTtl(ttl));
    }
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or(LockError::InvalidTtl(ttl))
}

struct MemoryEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-local store. Suitable for tests and single-process embedding.
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
    clock: Clock,
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::with_clock(system_clock())
    }
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Value stored under `key`, if live.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = (self.clock)();
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = (self.clock)();
        let expires_at = expiry(now, ttl)?;
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.get(key).is_some_and(|entry| entry.expires_at > now) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    fn delete(&self, key: &str) -> Result<bool, LockError> {
        let now = (self.clock)();
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        Ok(entries
            .remove(key)
            .is_some_and(|entry| entry.expires_at > now))
    }

    fn exists(&self, key: &str) -> Result<bool, LockError> {
        Ok(self.get(key).is_some())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    value: String,
    expires_at: DateTime<Utc>,
}

/// One file per key in a shared directory.
///
/// Usable across processes on the same host. Creation goes through an atomic
/// no-clobber link, and expired entries are reclaimed by renaming them away
/// before the next create attempt.
pub struct FileKeyValueStore {
    writer: AtomicFileWriter,
    clock: Clock,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self::with_clock(dir, system_clock())
    }

    pub fn with_clock(dir: PathBuf, clock: Clock) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            clock,
        }
    }

    /// Value stored under `key`, if live.
    pub fn get(&self, key: &str) -> Result<Option<String>, LockError> {
        let now = (self.clock)();
        Ok(self
            .read_record(&self.path(key))?
            .filter(|record| record.expires_at > now)
            .map(|record| record.value))
    }

    fn file_name(key: &str) -> String {
        format!("{}.lock", storage_name(key))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.writer.dir().join(Self::file_name(key))
    }

    /// `None` when the file is absent. Unreadable records count as expired so
    /// a torn write cannot wedge the lock forever.
    fn read_record(&self, path: &Path) -> Result<Option<LockRecord>, LockError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match ron::from_str::<LockRecord>(&content) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                engine_warn!("Unreadable lock file {:?}: {}", path, err);
                Ok(Some(LockRecord {
                    value: String::new(),
                    expires_at: DateTime::<Utc>::MIN_UTC,
                }))
            }
        }
    }

    /// Moves an expired entry out of the way. Returns `false` if the entry
    /// turned out to be live (someone re-acquired in between) and was restored.
    fn reclaim_expired(&self, path: &Path, now: DateTime<Utc>) -> Result<bool, LockError> {
        let tombstone = path.with_extension(format!("stale-{}", rand::random::<u64>()));
        match fs::rename(path, &tombstone) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        }

        let stolen_live_entry = self
            .read_record(&tombstone)?
            .is_some_and(|record| record.expires_at > now);
        let restored = if stolen_live_entry {
            restore_entry(&tombstone, path)
        } else {
            Ok(())
        };
        fs::remove_file(&tombstone)?;
        restored?;
        Ok(!stolen_live_entry)
    }
}

/// Links a live entry that was moved aside back into place. Fails when another
/// writer claimed the slot meanwhile.
fn restore_entry(tombstone: &Path, path: &Path) -> Result<(), LockError> {
    fs::hard_link(tombstone, path).map_err(|err| {
        engine_error!("Could not restore live lock entry {:?}: {}", path, err);
        LockError::Io(err)
    })
}

impl KeyValueStore for FileKeyValueStore {
    fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = (self.clock)();
        let record = LockRecord {
            value: value.to_string(),
            expires_at: expiry(now, ttl)?,
        };
        let content =
            ron::to_string(&record).map_err(|err| LockError::Encode(err.to_string()))?;
        let path = self.path(key);

        // One reclaim round is enough: a second conflict means a live holder.
        for _ in 0..2 {
            match self.writer.create_new(&Self::file_name(key), &content) {
                Ok(_) => return Ok(true),
                Err(PersistError::AlreadyExists(_)) => {}
                Err(err) => return Err(err.into()),
            }

            let live = self
                .read_record(&path)?
                .is_some_and(|existing| existing.expires_at > now);
            if live || !self.reclaim_expired(&path, now)? {
                return Ok(false);
            }
            engine_debug!("Reclaimed expired lock entry {:?}", path);
        }
        Ok(false)
    }

    fn delete(&self, key: &str) -> Result<bool, LockError> {
        let path = self.path(key);
        let now = (self.clock)();
        let live = self
            .read_record(&path)?
            .is_some_and(|record| record.expires_at > now);
        match fs::remove_file(&path) {
            Ok(()) => Ok(live),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn exists(&self, key: &str) -> Result<bool, LockError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Fail-fast, per-account exclusive run lock.
#[derive(Clone)]
pub struct ExclusiveRunLock {
    store: Arc<dyn KeyValueStore>,
}

impl ExclusiveRunLock {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn lock_key(account: &AccountIdentity) -> String {
        format!("scan_lock_for_{account}")
    }

    /// Returns `false` when another run holds the lock. Never blocks.
    pub fn try_acquire(
        &self,
        account: &AccountIdentity,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let acquired = self
            .store
            .set_if_absent(&Self::lock_key(account), LOCK_MARKER, ttl)?;
        if acquired {
            engine_debug!("Acquired run lock for {} (ttl {}s)", account, ttl.as_secs());
        }
        Ok(acquired)
    }

    pub fn release(&self, account: &AccountIdentity) -> Result<(), LockError> {
        self.store.delete(&Self::lock_key(account))?;
        engine_info!("Released run lock for {}", account);
        Ok(())
    }

    /// Scoped acquisition. The returned guard releases on every exit path.
    pub fn acquire(
        &self,
        account: &AccountIdentity,
        ttl: Duration,
    ) -> Result<Option<RunLockGuard>, LockError> {
        if !self.try_acquire(account, ttl)? {
            return Ok(None);
        }
        Ok(Some(RunLockGuard {
            lock: self.clone(),
            account: account.clone(),
            released: false,
        }))
    }

    /// Whether a capture is currently running for `account`.
    pub fn is_held(&self, account: &AccountIdentity) -> Result<bool, LockError> {
        self.store.exists(&Self::lock_key(account))
    }

    /// Clears a lock regardless of who holds it. Returns whether one was held.
    pub fn force_release(&self, account: &AccountIdentity) -> Result<bool, LockError> {
        let removed = self.store.delete(&Self::lock_key(account))?;
        if removed {
            engine_warn!("Force-released run lock for {}", account);
        }
        Ok(removed)
    }
}

/// Holds the run lock for one account until released or dropped.
pub struct RunLockGuard {
    lock: ExclusiveRunLock,
    account: AccountIdentity,
    released: bool,
}

impl RunLockGuard {
    pub fn account(&self) -> &AccountIdentity {
        &self.account
    }

    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.lock.release(&self.account)
    }
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.lock.release(&self.account) {
            engine_error!("Failed to release run lock for {}: {}", self.account, err);
        }
    }
}
