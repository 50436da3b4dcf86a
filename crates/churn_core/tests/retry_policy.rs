use std::time::Duration;

use churn_core::{AttemptOutcome, DelayRange, RetryDecision, RetryPolicy};

fn delay_of<E>(decision: RetryDecision<E>) -> Duration {
    match decision {
        RetryDecision::Retry { delay, .. } => delay,
        _ => panic!("expected a retry decision"),
    }
}

#[test]
fn success_continues() {
    let policy = RetryPolicy::default();
    assert_eq!(
        policy.decide::<&str>(AttemptOutcome::Success, 2),
        RetryDecision::Continue
    );
}

#[test]
fn rate_limited_always_retries_within_bounds() {
    let policy = RetryPolicy::default();
    for retries_so_far in [0, 3, 50, u32::MAX] {
        let delay = delay_of(policy.decide(AttemptOutcome::RateLimited("429"), retries_so_far));
        assert!(delay >= Duration::from_secs(5), "delay {delay:?} below 5s");
        assert!(delay < Duration::from_secs(10), "delay {delay:?} not below 10s");
    }
}

#[test]
fn transient_failures_retry_until_budget_is_spent() {
    let policy = RetryPolicy::default();
    let transient = || {
        [
            AttemptOutcome::ServerError {
                status: 503,
                cause: "503",
            },
            AttemptOutcome::Network("reset"),
            AttemptOutcome::Timeout("timeout"),
        ]
    };

    for retries_so_far in 0..3 {
        for outcome in transient() {
            let delay = delay_of(policy.decide(outcome, retries_so_far));
            assert!(delay >= Duration::from_secs(2));
            assert!(delay < Duration::from_secs(5));
        }
    }

    for outcome in transient() {
        let cause = match &outcome {
            AttemptOutcome::ServerError { cause, .. }
            | AttemptOutcome::Network(cause)
            | AttemptOutcome::Timeout(cause) => *cause,
            _ => unreachable!(),
        };
        assert_eq!(policy.decide(outcome, 3), RetryDecision::Abort(cause));
    }
}

#[test]
fn retry_budget_is_configurable() {
    let policy = RetryPolicy {
        max_transient_retries: 1,
        ..RetryPolicy::default()
    };
    assert!(matches!(
        policy.decide(AttemptOutcome::Network("e"), 0),
        RetryDecision::Retry { .. }
    ));
    assert_eq!(
        policy.decide(AttemptOutcome::Network("e"), 1),
        RetryDecision::Abort("e")
    );
}

#[test]
fn non_retryable_errors_abort_immediately() {
    let policy = RetryPolicy::default();
    assert_eq!(
        policy.decide(
            AttemptOutcome::ServerError {
                status: 404,
                cause: "not found"
            },
            0
        ),
        RetryDecision::Abort("not found")
    );
    assert_eq!(
        policy.decide(AttemptOutcome::Fatal("bad json"), 0),
        RetryDecision::Abort("bad json")
    );
}

#[test]
fn delays_are_not_constant() {
    let policy = RetryPolicy::default();
    let delays: std::collections::HashSet<Duration> = (0..64)
        .map(|_| delay_of(policy.decide(AttemptOutcome::RateLimited(()), 0)))
        .collect();
    assert!(delays.len() > 1);
}

#[test]
fn zero_ranges_disable_waiting() {
    let policy = RetryPolicy {
        transient_delay: DelayRange::ZERO,
        rate_limit_delay: DelayRange::ZERO,
        ..RetryPolicy::default()
    };
    assert_eq!(
        delay_of(policy.decide(AttemptOutcome::RateLimited(()), 0)),
        Duration::ZERO
    );
}
