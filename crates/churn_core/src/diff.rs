use serde::{Deserialize, Serialize};

use crate::Snapshot;

/// Follower churn derived from two snapshots. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnReport {
    /// In the previous followers but not the latest, ascending.
    pub unfollowers: Vec<String>,
    /// Followed in the latest snapshot without following back, ascending.
    pub not_following_back: Vec<String>,
}

/// Compares the latest snapshot with the one before it.
///
/// `not_following_back` only looks at `latest`. Without a previous snapshot
/// there are no unfollowers.
pub fn diff(latest: &Snapshot, previous: Option<&Snapshot>) -> ChurnReport {
    let unfollowers = previous
        .map(|previous| {
            previous
                .followers()
                .difference(latest.followers())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let not_following_back = latest
        .following()
        .difference(latest.followers())
        .map(ToOwned::to_owned)
        .collect();

    ChurnReport {
        unfollowers,
        not_following_back,
    }
}
