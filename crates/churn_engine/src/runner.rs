//! Entry point for one capture run.
//!
//! A run is: acquire the account's lock, obtain a session, fetch both lists,
//! commit a snapshot, release the lock. Failure anywhere after acquisition
//! still releases the lock and commits nothing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use churn_core::{
    AccountIdentity, AccountSummary, PreconditionError, RetryPolicy, SessionCredentials, Snapshot,
    SnapshotId,
};
use engine_logging::{engine_error, engine_info};
use thiserror::Error;

use crate::lock::DEFAULT_LOCK_TTL;
use crate::{
    system_clock, Clock, ConcurrentFetchOrchestrator, ExclusiveRunLock, ListClient, LockError,
    OrchestratorError, PacingSettings, PaginatedFetcher, SnapshotStore, StoreError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub lock_ttl: Duration,
    pub retry: RetryPolicy,
    pub pacing: PacingSettings,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            retry: RetryPolicy::default(),
            pacing: PacingSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("session unavailable: {0}")]
    Unavailable(String),
}

/// Produces the authenticated session for an account. Implemented by the
/// login collaborator.
#[async_trait::async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session(
        &self,
        account: &AccountIdentity,
    ) -> Result<SessionCredentials, SessionError>;
}

/// A session value that is already at hand.
pub struct StaticSession(pub SessionCredentials);

#[async_trait::async_trait]
impl SessionProvider for StaticSession {
    async fn session(
        &self,
        _account: &AccountIdentity,
    ) -> Result<SessionCredentials, SessionError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Session(SessionError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl From<SessionError> for RunError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Precondition(err) => RunError::Precondition(err),
            other => RunError::Session(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub id: SnapshotId,
    pub captured_at: DateTime<Utc>,
    pub followers: usize,
    pub following: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Captured(CaptureSummary),
    /// Another run holds the lock; nothing was fetched.
    AlreadyRunning,
}

pub struct CaptureRunner<C> {
    orchestrator: ConcurrentFetchOrchestrator<C>,
    lock: ExclusiveRunLock,
    store: Arc<dyn SnapshotStore>,
    settings: CaptureSettings,
    clock: Clock,
}

impl<C: ListClient> CaptureRunner<C> {
    pub fn new(
        client: Arc<C>,
        lock: ExclusiveRunLock,
        store: Arc<dyn SnapshotStore>,
        settings: CaptureSettings,
    ) -> Self {
        let fetcher = PaginatedFetcher::new(client, settings.retry, settings.pacing);
        Self {
            orchestrator: ConcurrentFetchOrchestrator::new(fetcher),
            lock,
            store,
            settings,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn lock(&self) -> &ExclusiveRunLock {
        &self.lock
    }

    /// Runs one capture for `account`.
    ///
    /// Returns [`RunOutcome::AlreadyRunning`] without fetching when another run
    /// holds the account's lock.
    pub async fn run(
        &self,
        account: &AccountIdentity,
        sessions: &dyn SessionProvider,
    ) -> Result<RunOutcome, RunError> {
        let Some(guard) = self.lock.acquire(account, self.settings.lock_ttl)? else {
            engine_info!(
                "A capture is already in progress for {}; skipping this run",
                account
            );
            return Ok(RunOutcome::AlreadyRunning);
        };

        let result = self.capture(account, sessions).await;
        if let Err(err) = &result {
            engine_error!("Capture for {} failed: {}", account, err);
        }

        if let Err(err) = guard.release() {
            // The ttl clears it eventually; the capture result still stands.
            engine_error!("Failed to release run lock for {}: {}", account, err);
        }
        result.map(RunOutcome::Captured)
    }

    /// Blocking wrapper around [`run`](Self::run) for callers without a runtime.
    pub fn run_blocking(
        &self,
        account: &AccountIdentity,
        sessions: &dyn SessionProvider,
    ) -> Result<RunOutcome, RunError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(account, sessions))
    }

    async fn capture(
        &self,
        account: &AccountIdentity,
        sessions: &dyn SessionProvider,
    ) -> Result<CaptureSummary, RunError> {
        let session = sessions.session(account).await?;
        session.validate()?;

        let result = self.orchestrator.run(&session, account.as_str()).await?;

        let previous = self.store.recent(account, 1)?;
        let mut captured_at = (self.clock)();
        if let Some(latest) = previous.first() {
            captured_at = captured_at.max(latest.captured_at());
        }

        let followers = result.followers.len();
        let following = result.following.len();
        let id = self
            .store
            .commit(Snapshot::new(account.clone(), captured_at, result))?;
        engine_info!(
            "Snapshot {} created with {} followers and {} following",
            id,
            followers,
            following
        );

        Ok(CaptureSummary {
            id,
            captured_at,
            followers,
            following,
        })
    }
}

/// Dashboard summary for `account` from the two newest snapshots.
pub fn summarize(
    store: &dyn SnapshotStore,
    lock: &ExclusiveRunLock,
    account: &AccountIdentity,
) -> Result<AccountSummary, RunError> {
    let recent = store.recent(account, 2)?;
    let is_running = lock.is_held(account)?;
    Ok(AccountSummary::from_recent(account.clone(), &recent, is_running))
}
