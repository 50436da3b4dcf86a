//! Sweeps one relationship list page by page.
//!
//! Pages are requested strictly in cursor order. A failed page is resubmitted
//! with the same cursor according to the [`RetryPolicy`]; the consecutive
//! failure count starts over after every successful page.

use std::sync::Arc;

use churn_core::{DelayRange, ListKind, RetryDecision, RetryPolicy, SessionCredentials, UserSet};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use tokio::time::sleep;

use crate::{FailureKind, FetchError, ListClient, PageRequest};

/// Delay inserted between consecutive successful pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingSettings {
    pub between_pages: DelayRange,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            between_pages: DelayRange::from_secs(1, 2),
        }
    }
}

pub struct PaginatedFetcher<C> {
    client: Arc<C>,
    policy: RetryPolicy,
    pacing: PacingSettings,
}

impl<C> Clone for PaginatedFetcher<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            policy: self.policy,
            pacing: self.pacing,
        }
    }
}

impl<C: ListClient> PaginatedFetcher<C> {
    pub fn new(client: Arc<C>, policy: RetryPolicy, pacing: PacingSettings) -> Self {
        Self {
            client,
            policy,
            pacing,
        }
    }

    /// Fetches every page of `list` and returns the distinct users seen.
    pub async fn fetch_all(
        &self,
        session: &SessionCredentials,
        list: ListKind,
        handle: &str,
    ) -> Result<UserSet, FetchError> {
        let mut users = UserSet::new();
        let mut cursor: Option<String> = None;
        let mut consecutive_failures: u32 = 0;
        let mut pages: usize = 0;

        engine_info!("[{}] Starting fetch for {}", list, handle);

        loop {
            let request = PageRequest {
                list,
                handle,
                cursor: cursor.as_deref(),
            };

            let page = match self.client.fetch_page(session, request).await {
                Ok(page) => page,
                Err(err) => {
                    match self.policy.decide(err.into_outcome(), consecutive_failures) {
                        RetryDecision::Retry { delay, cause } => {
                            if cause.kind != FailureKind::RateLimited {
                                consecutive_failures += 1;
                            }
                            engine_warn!(
                                "[{}] {}; retry {}/{} in {} ms",
                                list,
                                cause,
                                consecutive_failures,
                                self.policy.max_transient_retries,
                                delay.as_millis()
                            );
                            sleep(delay).await;
                        }
                        RetryDecision::Abort(cause) => {
                            engine_error!(
                                "[{}] Giving up after {} pages: {}",
                                list,
                                pages,
                                cause
                            );
                            return Err(cause);
                        }
                        // Failures never map to `Continue`.
                        RetryDecision::Continue => {}
                    }
                    continue;
                }
            };

            consecutive_failures = 0;
            pages += 1;
            let page_len = page.users.len();
            users.extend(page.users);
            engine_info!(
                "[{}] Fetched {} users. Total: {}",
                list,
                page_len,
                users.len()
            );

            match page.next_cursor {
                Some(next) => {
                    cursor = Some(next);
                    let pause = self.pacing.between_pages.sample(&mut rand::rng());
                    engine_debug!(
                        "[{}] Pausing {} ms before next page",
                        list,
                        pause.as_millis()
                    );
                    sleep(pause).await;
                }
                None => {
                    engine_info!(
                        "[{}] Reached end of list after {} pages. Total: {}",
                        list,
                        pages,
                        users.len()
                    );
                    return Ok(users);
                }
            }
        }
    }
}
