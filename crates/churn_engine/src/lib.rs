//! Churn engine: list fetching, run locking, snapshot storage and the capture
//! entry point.
mod client;
mod decode;
mod fetcher;
mod filename;
mod lock;
mod orchestrator;
mod persist;
mod runner;
mod store;
mod types;

pub use client::{
    ClientSettings, ListClient, ReqwestListClient, MAX_CONCURRENT_CONNECTIONS, PAGE_SIZE,
};
pub use decode::decode_page;
pub use fetcher::{PacingSettings, PaginatedFetcher};
pub use filename::storage_name;
pub use lock::{
    ExclusiveRunLock, FileKeyValueStore, KeyValueStore, LockError, MemoryKeyValueStore,
    RunLockGuard, DEFAULT_LOCK_TTL,
};
pub use orchestrator::ConcurrentFetchOrchestrator;
pub use persist::{ensure_storage_dir, AtomicFileWriter, PersistError};
pub use runner::{
    summarize, CaptureRunner, CaptureSettings, CaptureSummary, RunError, RunOutcome,
    SessionError, SessionProvider, StaticSession,
};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StoreError};
pub use types::{
    system_clock, Clock, FailureKind, FetchError, OrchestratorError, PageRequest, PageResult,
};
