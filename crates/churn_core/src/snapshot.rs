use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountIdentity, UserSet};

/// Both relationship lists from one successful capture.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub followers: UserSet,
    pub following: UserSet,
}

impl FetchResult {
    pub fn new(followers: UserSet, following: UserSet) -> Self {
        Self {
            followers,
            following,
        }
    }
}

/// Opaque handle returned when a snapshot is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable point-in-time capture of an account's lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    account: AccountIdentity,
    captured_at: DateTime<Utc>,
    result: FetchResult,
}

impl Snapshot {
    pub fn new(account: AccountIdentity, captured_at: DateTime<Utc>, result: FetchResult) -> Self {
        Self {
            account,
            captured_at,
            result,
        }
    }

    pub fn account(&self) -> &AccountIdentity {
        &self.account
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn followers(&self) -> &UserSet {
        &self.result.followers
    }

    pub fn following(&self) -> &UserSet {
        &self.result.following
    }

    pub fn result(&self) -> &FetchResult {
        &self.result
    }
}
