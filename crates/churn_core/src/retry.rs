//! Retry decisions for a single page request.
//!
//! The policy is a pure function of the attempt outcome and the number of
//! transient failures already retried for the current page. Delays are drawn
//! uniformly from a half-open range so concurrent clients do not retry in
//! lockstep.

use std::time::Duration;

use rand::Rng;

/// HTTP statuses treated as transient server errors.
pub const RETRYABLE_STATUSES: [u16; 4] = [500, 502, 503, 504];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Half-open delay range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn from_secs(min: u64, max: u64) -> Self {
        Self::new(Duration::from_secs(min), Duration::from_secs(max))
    }

    /// No delay at all. Handy for tests that talk to a local mock server.
    pub const ZERO: DelayRange = DelayRange::new(Duration::ZERO, Duration::ZERO);

    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        rng.random_range(self.min..self.max)
    }
}

/// Result of one page request, classified for the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<E> {
    Success,
    RateLimited(E),
    ServerError { status: u16, cause: E },
    Network(E),
    Timeout(E),
    /// Anything else: malformed responses, client errors, bad requests.
    Fatal(E),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision<E> {
    /// The page succeeded; move on and reset the failure counter.
    Continue,
    /// Resubmit the same page request after `delay`.
    Retry { delay: Duration, cause: E },
    /// Give up, surfacing the last error.
    Abort(E),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transient failures allowed per page before aborting.
    pub max_transient_retries: u32,
    pub transient_delay: DelayRange,
    pub rate_limit_delay: DelayRange,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_transient_retries: 3,
            transient_delay: DelayRange::from_secs(2, 5),
            rate_limit_delay: DelayRange::from_secs(5, 10),
        }
    }
}

impl RetryPolicy {
    /// Decides what to do after an attempt, drawing delays from the thread rng.
    ///
    /// `retries_so_far` counts consecutive transient failures already retried
    /// for the current page. Rate limiting never consumes it.
    pub fn decide<E>(&self, outcome: AttemptOutcome<E>, retries_so_far: u32) -> RetryDecision<E> {
        self.decide_with_rng(outcome, retries_so_far, &mut rand::rng())
    }

    pub fn decide_with_rng<E, R: Rng>(
        &self,
        outcome: AttemptOutcome<E>,
        retries_so_far: u32,
        rng: &mut R,
    ) -> RetryDecision<E> {
        match outcome {
            AttemptOutcome::Success => RetryDecision::Continue,
            AttemptOutcome::RateLimited(cause) => RetryDecision::Retry {
                delay: self.rate_limit_delay.sample(rng),
                cause,
            },
            AttemptOutcome::ServerError { status, cause } if is_retryable_status(status) => {
                self.transient(cause, retries_so_far, rng)
            }
            AttemptOutcome::Network(cause) | AttemptOutcome::Timeout(cause) => {
                self.transient(cause, retries_so_far, rng)
            }
            AttemptOutcome::ServerError { cause, .. } | AttemptOutcome::Fatal(cause) => {
                RetryDecision::Abort(cause)
            }
        }
    }

    fn transient<E, R: Rng>(
        &self,
        cause: E,
        retries_so_far: u32,
        rng: &mut R,
    ) -> RetryDecision<E> {
        if retries_so_far < self.max_transient_retries {
            RetryDecision::Retry {
                delay: self.transient_delay.sample(rng),
                cause,
            }
        } else {
            RetryDecision::Abort(cause)
        }
    }
}
