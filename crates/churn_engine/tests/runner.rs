mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use churn_core::{
    AccountIdentity, DelayRange, ListKind, PreconditionError, SessionCredentials, UserRef,
};
use churn_engine::{
    summarize, CaptureRunner, CaptureSettings, Clock, ExclusiveRunLock, MemoryKeyValueStore,
    MemorySnapshotStore, PacingSettings, RunError, RunOutcome, SessionError, SessionProvider,
    SnapshotStore, StaticSession, DEFAULT_LOCK_TTL,
};
use common::{http_status, init_logging, page, session, users, ScriptedClient};
use pretty_assertions::assert_eq;

struct Harness {
    client: Arc<ScriptedClient>,
    lock: ExclusiveRunLock,
    store: Arc<MemorySnapshotStore>,
    account: AccountIdentity,
}

impl Harness {
    fn new() -> Self {
        init_logging();
        Self {
            client: Arc::new(ScriptedClient::new()),
            lock: ExclusiveRunLock::new(Arc::new(MemoryKeyValueStore::new())),
            store: Arc::new(MemorySnapshotStore::new()),
            account: AccountIdentity::new("me").unwrap(),
        }
    }

    fn runner(&self) -> CaptureRunner<ScriptedClient> {
        CaptureRunner::new(
            Arc::clone(&self.client),
            self.lock.clone(),
            self.store.clone(),
            CaptureSettings::default(),
        )
    }

    fn script_success(&self, followers: &[&str], following: &[&str]) {
        self.client
            .respond(ListKind::Followers, None, page(named(followers), None))
            .respond(ListKind::Following, None, page(named(following), None));
    }
}

fn named(names: &[&str]) -> Vec<UserRef> {
    names.iter().map(|name| UserRef::new(*name).unwrap()).collect()
}

fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}

#[tokio::test(start_paused = true)]
async fn successful_run_commits_one_snapshot_and_releases_the_lock() {
    let h = Harness::new();
    h.client
        .respond(ListKind::Followers, None, page(users("f", 0..25), Some("2")))
        .respond(ListKind::Followers, Some("2"), page(users("f", 25..40), None))
        .respond(ListKind::Following, None, page(users("g", 0..12), None));

    let outcome = h
        .runner()
        .run(&h.account, &StaticSession(session()))
        .await
        .expect("capture succeeds");

    let RunOutcome::Captured(summary) = outcome else {
        panic!("expected a capture, got {outcome:?}");
    };
    assert_eq!(summary.followers, 40);
    assert_eq!(summary.following, 12);
    assert_eq!(h.store.len(), 1);
    assert!(!h.lock.is_held(&h.account).unwrap());

    let stored = h.store.recent(&h.account, 1).unwrap();
    assert_eq!(stored[0].captured_at(), summary.captured_at);
    assert_eq!(stored[0].followers().len(), 40);
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_commits_nothing_and_releases_the_lock() {
    let h = Harness::new();
    h.client
        .respond(ListKind::Followers, None, page(users("f", 0..10), None))
        .respond(ListKind::Following, None, http_status(404));

    let err = h
        .runner()
        .run(&h.account, &StaticSession(session()))
        .await
        .unwrap_err();

    match err {
        RunError::Orchestrator(err) => assert_eq!(err.list, ListKind::Following),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.is_empty());
    assert!(!h.lock.is_held(&h.account).unwrap());
}

#[tokio::test(start_paused = true)]
async fn busy_lock_skips_the_run_without_fetching() {
    let h = Harness::new();
    assert!(h.lock.try_acquire(&h.account, DEFAULT_LOCK_TTL).unwrap());

    let outcome = h
        .runner()
        .run(&h.account, &StaticSession(session()))
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::AlreadyRunning);
    assert!(h.client.calls().is_empty());
    // The other holder keeps its lock.
    assert!(h.lock.is_held(&h.account).unwrap());
}

#[tokio::test(start_paused = true)]
async fn invalid_session_fails_before_any_fetch() {
    let h = Harness::new();
    let mut cookies = BTreeMap::new();
    cookies.insert("sessionid".to_string(), "sess-value".to_string());
    let no_app_id = SessionCredentials::new("4242", "csrf", "", cookies);

    let err = h
        .runner()
        .run(&h.account, &StaticSession(no_app_id))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::Precondition(PreconditionError::MissingAppId)
    ));
    assert!(h.client.calls().is_empty());
    assert!(!h.lock.is_held(&h.account).unwrap());
}

struct FailingProvider;

#[async_trait::async_trait]
impl SessionProvider for FailingProvider {
    async fn session(
        &self,
        _account: &AccountIdentity,
    ) -> Result<SessionCredentials, SessionError> {
        Err(SessionError::Unavailable("login service down".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn unavailable_session_is_reported_and_releases_the_lock() {
    let h = Harness::new();

    let err = h.runner().run(&h.account, &FailingProvider).await.unwrap_err();

    assert!(matches!(err, RunError::Session(SessionError::Unavailable(_))));
    assert!(h.client.calls().is_empty());
    assert!(!h.lock.is_held(&h.account).unwrap());
}

#[tokio::test(start_paused = true)]
async fn capture_time_never_goes_backwards() {
    let h = Harness::new();
    let later = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let earlier = Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap();

    h.script_success(&["a"], &["b"]);
    h.runner()
        .with_clock(fixed_clock(later))
        .run(&h.account, &StaticSession(session()))
        .await
        .unwrap();

    h.script_success(&["a"], &["b"]);
    let outcome = h
        .runner()
        .with_clock(fixed_clock(earlier))
        .run(&h.account, &StaticSession(session()))
        .await
        .unwrap();

    let RunOutcome::Captured(summary) = outcome else {
        panic!("expected a capture");
    };
    assert_eq!(summary.captured_at, later);
    let newest = h.store.recent(&h.account, 1).unwrap();
    assert_eq!(newest[0].captured_at(), later);
}

#[tokio::test(start_paused = true)]
async fn summary_reports_churn_between_the_last_two_runs() {
    let h = Harness::new();
    let first = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
    let second = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();

    h.script_success(&["a", "b", "c"], &["a"]);
    h.runner()
        .with_clock(fixed_clock(first))
        .run(&h.account, &StaticSession(session()))
        .await
        .unwrap();

    h.script_success(&["a", "c"], &["a", "d", "e"]);
    h.runner()
        .with_clock(fixed_clock(second))
        .run(&h.account, &StaticSession(session()))
        .await
        .unwrap();

    let summary = summarize(h.store.as_ref(), &h.lock, &h.account).unwrap();
    assert_eq!(summary.latest_capture, Some(second));
    assert_eq!(summary.follower_count, 2);
    assert_eq!(summary.following_count, 3);
    assert_eq!(summary.report.unfollowers, vec!["b".to_string()]);
    assert_eq!(
        summary.report.not_following_back,
        vec!["d".to_string(), "e".to_string()]
    );
    assert!(!summary.is_running);
}

#[test]
fn summary_of_unknown_account_is_empty() {
    init_logging();
    let store = MemorySnapshotStore::new();
    let lock = ExclusiveRunLock::new(Arc::new(MemoryKeyValueStore::new()));
    let account = AccountIdentity::new("nobody").unwrap();
    lock.try_acquire(&account, DEFAULT_LOCK_TTL).unwrap();

    let summary = summarize(&store, &lock, &account).unwrap();
    assert_eq!(summary.latest_capture, None);
    assert_eq!(summary.follower_count, 0);
    assert!(summary.is_running);
}

#[test]
fn run_blocking_drives_a_capture_without_an_outer_runtime() {
    let h = Harness::new();
    h.script_success(&["a"], &["a"]);
    let settings = CaptureSettings {
        pacing: PacingSettings {
            between_pages: DelayRange::ZERO,
        },
        ..CaptureSettings::default()
    };
    let runner = CaptureRunner::new(
        Arc::clone(&h.client),
        h.lock.clone(),
        h.store.clone(),
        settings,
    );

    let outcome = runner
        .run_blocking(&h.account, &StaticSession(session()))
        .unwrap();

    assert!(matches!(outcome, RunOutcome::Captured(_)));
    assert_eq!(h.store.len(), 1);
}
