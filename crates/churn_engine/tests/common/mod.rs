#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::{Arc, Mutex, Once};

use churn_core::{ListKind, RetryPolicy, SessionCredentials, UserRef};
use churn_engine::{
    FailureKind, FetchError, ListClient, PacingSettings, PageRequest, PageResult, PaginatedFetcher,
};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn session() -> SessionCredentials {
    SessionCredentials::from_cookies(
        "936619743392459",
        [
            ("sessionid", "sess-value"),
            ("ds_user_id", "4242"),
            ("csrftoken", "csrf-value"),
        ],
    )
    .unwrap()
}

pub fn users(prefix: &str, range: Range<usize>) -> Vec<UserRef> {
    range
        .map(|i| UserRef::new(format!("{prefix}{i:03}")).unwrap())
        .collect()
}

pub fn page(users: Vec<UserRef>, next: Option<&str>) -> Result<PageResult, FetchError> {
    Ok(PageResult {
        users,
        next_cursor: next.map(ToOwned::to_owned),
    })
}

pub fn http_status(code: u16) -> Result<PageResult, FetchError> {
    Err(FetchError::new(FailureKind::HttpStatus(code), code.to_string()))
}

pub fn rate_limited() -> Result<PageResult, FetchError> {
    Err(FetchError::new(FailureKind::RateLimited, "429"))
}

pub fn network_error() -> Result<PageResult, FetchError> {
    Err(FetchError::new(FailureKind::Network, "connection reset"))
}

type ScriptKey = (ListKind, Option<String>);

/// In-memory list endpoint. Each (list, cursor) pair answers from a queue of
/// scripted responses, in order.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<HashMap<ScriptKey, VecDeque<Result<PageResult, FetchError>>>>,
    calls: Mutex<Vec<ScriptKey>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(
        &self,
        list: ListKind,
        cursor: Option<&str>,
        response: Result<PageResult, FetchError>,
    ) -> &Self {
        self.script
            .lock()
            .unwrap()
            .entry((list, cursor.map(ToOwned::to_owned)))
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<ScriptKey> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, list: ListKind, cursor: Option<&str>) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, c)| *l == list && c.as_deref() == cursor)
            .count()
    }

    pub fn calls_for_list(&self, list: ListKind) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == list)
            .count()
    }
}

#[async_trait::async_trait]
impl ListClient for ScriptedClient {
    async fn fetch_page(
        &self,
        _session: &SessionCredentials,
        request: PageRequest<'_>,
    ) -> Result<PageResult, FetchError> {
        tokio::task::yield_now().await;
        let key = (request.list, request.cursor.map(ToOwned::to_owned));
        self.calls.lock().unwrap().push(key.clone());
        self.script
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(FetchError::new(
                    FailureKind::InvalidRequest,
                    format!("unscripted page {key:?}"),
                ))
            })
    }
}

pub fn fetcher(client: Arc<ScriptedClient>) -> PaginatedFetcher<ScriptedClient> {
    PaginatedFetcher::new(client, RetryPolicy::default(), PacingSettings::default())
}
