mod common;

use std::sync::Arc;

use churn_core::ListKind;
use churn_engine::{ConcurrentFetchOrchestrator, FailureKind};
use common::{fetcher, http_status, init_logging, page, session, users, ScriptedClient};
use pretty_assertions::assert_eq;

#[tokio::test(start_paused = true)]
async fn combines_both_lists() {
    init_logging();
    let client = Arc::new(ScriptedClient::new());
    client
        .respond(ListKind::Followers, None, page(users("f", 0..25), Some("f2")))
        .respond(ListKind::Followers, Some("f2"), page(users("f", 25..30), None))
        .respond(ListKind::Following, None, page(users("g", 0..7), None));

    let result = ConcurrentFetchOrchestrator::new(fetcher(client))
        .run(&session(), "me")
        .await
        .expect("both lists fetched");

    assert_eq!(result.followers.len(), 30);
    assert_eq!(result.following.len(), 7);
    assert!(result.following.contains("g006"));
}

#[tokio::test(start_paused = true)]
async fn one_failed_list_fails_the_whole_capture() {
    init_logging();
    let client = Arc::new(ScriptedClient::new());
    client
        .respond(ListKind::Followers, None, page(users("f", 0..25), Some("f2")))
        .respond(ListKind::Followers, Some("f2"), page(users("f", 25..50), None))
        .respond(ListKind::Following, None, http_status(404));

    let err = ConcurrentFetchOrchestrator::new(fetcher(client.clone()))
        .run(&session(), "me")
        .await
        .unwrap_err();

    assert_eq!(err.list, ListKind::Following);
    assert_eq!(err.source.kind, FailureKind::HttpStatus(404));
    // The healthy branch still runs to its end.
    assert_eq!(client.calls_for(ListKind::Followers, Some("f2")), 1);
}

#[tokio::test(start_paused = true)]
async fn first_observed_failure_wins_when_both_fail() {
    init_logging();
    let client = Arc::new(ScriptedClient::new());
    // Following fails on its first page; followers fails on its second page
    // after a pacing pause, so it finishes later.
    client
        .respond(ListKind::Followers, None, page(users("f", 0..25), Some("f2")))
        .respond(ListKind::Followers, Some("f2"), http_status(403))
        .respond(ListKind::Following, None, http_status(401));

    let err = ConcurrentFetchOrchestrator::new(fetcher(client))
        .run(&session(), "me")
        .await
        .unwrap_err();

    assert_eq!(err.list, ListKind::Following);
    assert_eq!(err.source.kind, FailureKind::HttpStatus(401));
}
