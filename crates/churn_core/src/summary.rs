use chrono::{DateTime, Utc};

use crate::{diff, AccountIdentity, ChurnReport, Snapshot};

/// Dashboard view of one account: latest capture, counts and churn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub account: AccountIdentity,
    pub latest_capture: Option<DateTime<Utc>>,
    pub follower_count: usize,
    pub following_count: usize,
    pub report: ChurnReport,
    pub is_running: bool,
}

impl AccountSummary {
    /// Builds the summary from snapshots ordered newest first. Only the first
    /// two entries are looked at.
    pub fn from_recent(account: AccountIdentity, recent: &[Snapshot], is_running: bool) -> Self {
        let Some(latest) = recent.first() else {
            return Self {
                account,
                latest_capture: None,
                follower_count: 0,
                following_count: 0,
                report: ChurnReport::default(),
                is_running,
            };
        };

        Self {
            account,
            latest_capture: Some(latest.captured_at()),
            follower_count: latest.followers().len(),
            following_count: latest.following().len(),
            report: diff(latest, recent.get(1)),
            is_running,
        }
    }
}
