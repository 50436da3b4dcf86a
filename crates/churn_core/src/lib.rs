//! Churn core: pure domain types, retry decisions and snapshot diffing.
mod account;
mod diff;
mod error;
mod retry;
mod session;
mod snapshot;
mod summary;
mod user;

pub use account::{AccountIdentity, ListKind};
pub use diff::{diff, ChurnReport};
pub use error::PreconditionError;
pub use retry::{
    is_retryable_status, AttemptOutcome, DelayRange, RetryDecision, RetryPolicy,
    RETRYABLE_STATUSES,
};
pub use session::{SessionCredentials, SESSION_COOKIE_NAMES};
pub use snapshot::{FetchResult, Snapshot, SnapshotId};
pub use summary::AccountSummary;
pub use user::{UserRef, UserSet};
