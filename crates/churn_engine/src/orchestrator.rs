use churn_core::{FetchResult, ListKind, SessionCredentials, UserSet};
use engine_logging::{engine_error, engine_info, engine_warn};
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::{ListClient, OrchestratorError, PaginatedFetcher};

/// Runs the followers and following sweeps side by side.
///
/// Both branches always run to completion. If either fails, the error that
/// completed first is returned and every result is discarded.
pub struct ConcurrentFetchOrchestrator<C> {
    fetcher: PaginatedFetcher<C>,
}

impl<C: ListClient> ConcurrentFetchOrchestrator<C> {
    pub fn new(fetcher: PaginatedFetcher<C>) -> Self {
        Self { fetcher }
    }

    pub async fn run(
        &self,
        session: &SessionCredentials,
        handle: &str,
    ) -> Result<FetchResult, OrchestratorError> {
        let fetcher = &self.fetcher;
        let mut branches: FuturesUnordered<_> = ListKind::ALL
            .into_iter()
            .map(|list| async move { (list, fetcher.fetch_all(session, list, handle).await) })
            .collect();

        let mut followers: Option<UserSet> = None;
        let mut following: Option<UserSet> = None;
        let mut first_failure: Option<OrchestratorError> = None;

        while let Some((list, outcome)) = branches.next().await {
            match outcome {
                Ok(users) => match list {
                    ListKind::Followers => followers = Some(users),
                    ListKind::Following => following = Some(users),
                },
                Err(source) if first_failure.is_none() => {
                    engine_error!("{} fetch failed: {}", list, source);
                    first_failure = Some(OrchestratorError { list, source });
                }
                Err(source) => {
                    engine_warn!("{} fetch also failed, discarding: {}", list, source);
                }
            }
        }

        if let Some(err) = first_failure {
            return Err(err);
        }

        // Both branches report exactly once, so both sets are present here.
        let result = FetchResult::new(
            followers.unwrap_or_default(),
            following.unwrap_or_default(),
        );
        engine_info!(
            "Fetched {} followers and {} following for {}",
            result.followers.len(),
            result.following.len(),
            handle
        );
        Ok(result)
    }
}
