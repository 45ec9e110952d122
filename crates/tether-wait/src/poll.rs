//! # Poll Engine
//!
//! [`wait_for`] drives a fetch function until the fetched value satisfies
//! every assertion.
//!
//! ## Loop
//!
//! 1. If the [`Cancellation`] has fired, return [`WaitError::Cancelled`].
//!    No fetch is started after cancellation is observed.
//! 2. Call `fetch(input)`.
//! 3. A fetch error the [`ErrorClassifier`] marks retryable waits and
//!    loops; any other fetch error returns [`WaitError::Transport`].
//! 4. Assertions run in order and stop at the first non-accept outcome.
//!    `Accept` from all of them returns the value, `Retry` waits and loops,
//!    `Fatal` returns [`WaitError::Remote`].
//!
//! The wait between iterations races the cancellation, so a fired abort
//! or an expired deadline is observed within one poll interval at worst.
//! Retryable conditions never leave the loop.

use std::future::Future;
use std::time::Duration;

use tether_core::{AssertOutcome, BoxError, ErrorClassifier};
use thiserror::Error;

use crate::cancel::{CancelReason, Cancellation};

/// Poll interval used when the caller does not pick one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How the wait between polls grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Every wait is one poll interval.
    #[default]
    Fixed,
    /// The wait doubles after each unsuccessful poll, capped at `max`.
    Exponential { max: Duration },
}

impl Backoff {
    /// Wait before the poll following `attempt` unsuccessful ones
    /// (0-indexed).
    pub fn delay(&self, interval: Duration, attempt: u32) -> Duration {
        match self {
            Self::Fixed => interval,
            Self::Exponential { max } => interval
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(*max),
        }
    }
}

/// Why [`wait_for`] gave up.
#[derive(Debug, Error)]
pub enum WaitError<C> {
    /// An assertion classified the fetched value as a terminal failure.
    #[error("remote operation failed: {0}")]
    Remote(#[source] C),

    /// The fetch failed with an error that is not marked retryable.
    #[error("fetch failed on attempt {fetches}: {source}")]
    Transport {
        fetches: u32,
        #[source]
        source: BoxError,
    },

    /// The abort signal or the deadline fired before convergence.
    #[error("wait {reason} after {fetches} fetch(es)")]
    Cancelled { reason: CancelReason, fetches: u32 },
}

impl<C> WaitError<C> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The remote failure cause, if this is one.
    pub fn remote(&self) -> Option<&C> {
        match self {
            Self::Remote(cause) => Some(cause),
            _ => None,
        }
    }

    /// Number of fetches made before giving up, when known.
    pub fn fetches(&self) -> Option<u32> {
        match self {
            Self::Remote(_) => None,
            Self::Transport { fetches, .. } | Self::Cancelled { fetches, .. } => Some(*fetches),
        }
    }
}

type Assertion<T, C> = Box<dyn Fn(&T) -> AssertOutcome<C> + Send + Sync>;

/// Everything one [`wait_for`] call needs, apart from the cancellation.
///
/// Built fresh per call and consumed by it.
pub struct WaitConfig<I, F, T, C> {
    input: I,
    fetch: F,
    assertions: Vec<Assertion<T, C>>,
    retryable: ErrorClassifier,
    poll_interval: Duration,
    backoff: Backoff,
}

impl<I, F, T, C> WaitConfig<I, F, T, C> {
    /// Poll `fetch(input)` with no assertions, no retryable errors and
    /// the default interval.
    pub fn new(input: I, fetch: F) -> Self {
        Self {
            input,
            fetch,
            assertions: Vec::new(),
            retryable: ErrorClassifier::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff: Backoff::Fixed,
        }
    }

    /// Append an assertion. Assertions run in the order they were added.
    pub fn assert<A>(mut self, assertion: A) -> Self
    where
        A: Fn(&T) -> AssertOutcome<C> + Send + Sync + 'static,
        T: 'static,
        C: 'static,
    {
        self.assertions.push(Box::new(assertion));
        self
    }

    /// Fetch errors this classifier marks retryable keep the loop going.
    pub fn retry_on(mut self, classifier: ErrorClassifier) -> Self {
        self.retryable = classifier;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl<I, F, T, C> std::fmt::Debug for WaitConfig<I, F, T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitConfig")
            .field("assertions", &self.assertions.len())
            .field("retryable", &self.retryable)
            .field("poll_interval", &self.poll_interval)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

/// Poll until every assertion accepts the fetched value.
///
/// Returns exactly once: with the accepted value, or with a
/// [`WaitError`] naming the fatal cause, the failed fetch, or the
/// cancellation. Performs no side effects besides calling `fetch`.
pub async fn wait_for<I, F, Fut, T, E, C>(
    mut cfg: WaitConfig<I, F, T, C>,
    cancel: &Cancellation,
) -> Result<T, WaitError<C>>
where
    I: Clone,
    F: FnMut(I) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    let mut fetches: u32 = 0;

    loop {
        if let Some(reason) = cancel.check() {
            tracing::debug!(fetches, %reason, "wait cancelled before fetch");
            return Err(WaitError::Cancelled { reason, fetches });
        }

        fetches += 1;
        match (cfg.fetch)(cfg.input.clone()).await {
            Ok(value) => match evaluate(&cfg.assertions, &value) {
                AssertOutcome::Accept => {
                    tracing::debug!(fetches, "wait condition satisfied");
                    return Ok(value);
                }
                AssertOutcome::Retry(reason) => {
                    tracing::debug!(fetches, %reason, "wait condition not yet satisfied");
                }
                AssertOutcome::Fatal(cause) => {
                    tracing::warn!(fetches, "fetched value classified as fatal");
                    return Err(WaitError::Remote(cause));
                }
            },
            Err(err) => {
                let err: BoxError = err.into();
                if cfg.retryable.is_retryable(&*err) {
                    tracing::debug!(fetches, error = %err, "retryable fetch error");
                } else {
                    tracing::warn!(fetches, error = %err, "fatal fetch error");
                    return Err(WaitError::Transport {
                        fetches,
                        source: err,
                    });
                }
            }
        }

        let delay = cfg.backoff.delay(cfg.poll_interval, fetches - 1);
        if let Err(reason) = cancel.sleep(delay).await {
            tracing::debug!(fetches, %reason, "wait cancelled between polls");
            return Err(WaitError::Cancelled { reason, fetches });
        }
    }
}

fn evaluate<T, C>(assertions: &[Assertion<T, C>], value: &T) -> AssertOutcome<C> {
    for assertion in assertions {
        match assertion(value) {
            AssertOutcome::Accept => continue,
            rejected => return rejected,
        }
    }
    AssertOutcome::Accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use tether_core::RetryReadError;
    use tokio::time::Instant;

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("boom: {0}")]
    struct Boom(String);

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    /// Fetch function returning `values` in order, repeating the last one.
    fn sequence<T: Clone>(
        values: Vec<T>,
        counter: Arc<AtomicU32>,
    ) -> impl FnMut(()) -> std::future::Ready<Result<T, Infallible>> {
        move |()| {
            let n = counter.fetch_add(1, Ordering::SeqCst) as usize;
            let value = values[n.min(values.len() - 1)].clone();
            std::future::ready(Ok(value))
        }
    }

    fn at_least(min: u32) -> impl Fn(&u32) -> AssertOutcome<Boom> {
        move |v| {
            if *v >= min {
                AssertOutcome::Accept
            } else {
                AssertOutcome::retry(format!("{v} < {min}"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_fetch_accepted_returns_after_one_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let cfg = WaitConfig::new((), sequence(vec![5u32], calls.clone())).assert(at_least(1));

        let value = wait_for(cfg, &Cancellation::never()).await.unwrap();

        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_assertions_accept_first_successful_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let cfg: WaitConfig<_, _, u32, Boom> =
            WaitConfig::new((), sequence(vec![0u32, 1, 2], calls.clone()));

        assert_eq!(wait_for(cfg, &Cancellation::never()).await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_condition_holds() {
        let calls = Arc::new(AtomicU32::new(0));
        let cfg = WaitConfig::new((), sequence(vec![0u32, 1, 2, 3], calls.clone()))
            .assert(at_least(3))
            .poll_interval(Duration::from_millis(100));
        let start = Instant::now();

        let value = wait_for(cfg, &Cancellation::never()).await.unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_assertion_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let cfg = WaitConfig::new((), sequence(vec![0u32, 7, 8], calls.clone())).assert(
            |v: &u32| match *v {
                0 => AssertOutcome::retry("not yet"),
                _ => AssertOutcome::Fatal(Boom(format!("saw {v}"))),
            },
        );

        let err = wait_for(cfg, &Cancellation::never()).await.unwrap_err();

        assert_eq!(err.remote(), Some(&Boom("saw 7".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn assertions_short_circuit_in_order() {
        let second_called = Arc::new(AtomicBool::new(false));
        let flag = second_called.clone();
        let cfg = WaitConfig::new((), sequence(vec![1u32], Arc::new(AtomicU32::new(0))))
            .assert(|_: &u32| AssertOutcome::Fatal(Boom("first".into())))
            .assert(move |_: &u32| {
                flag.store(true, Ordering::SeqCst);
                AssertOutcome::Accept
            });

        let err = wait_for(cfg, &Cancellation::never()).await.unwrap_err();

        assert_eq!(err.remote(), Some(&Boom("first".into())));
        assert!(!second_called.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn unlisted_fetch_error_is_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let cfg: WaitConfig<_, _, u32, Boom> = WaitConfig::new((), move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err::<u32, _>(ConnectionReset))
        })
        .retry_on(ErrorClassifier::new().with_marker::<RetryReadError>());

        let err = wait_for(cfg, &Cancellation::never()).await.unwrap_err();

        assert!(matches!(err, WaitError::Transport { fetches: 1, .. }));
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn listed_fetch_error_keeps_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let cfg: WaitConfig<_, _, u32, Boom> = WaitConfig::new((), move |()| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < 2 {
                Err(RetryReadError::new("not indexed"))
            } else {
                Ok(n)
            })
        })
        .retry_on(ErrorClassifier::new().with_marker::<RetryReadError>());

        assert_eq!(wait_for(cfg, &Cancellation::never()).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_classifier_makes_marker_fatal() {
        let cfg: WaitConfig<_, _, u32, Boom> = WaitConfig::new((), |()| {
            std::future::ready(Err::<u32, _>(RetryReadError::new("not indexed")))
        });

        let err = wait_for(cfg, &Cancellation::never()).await.unwrap_err();
        assert!(matches!(err, WaitError::Transport { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_first_fetch_makes_no_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let (handle, cancel) = Cancellation::new();
        handle.cancel();
        let cfg = WaitConfig::new((), sequence(vec![9u32], calls.clone())).assert(at_least(1));

        let err = wait_for(cfg, &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            WaitError::Cancelled {
                reason: CancelReason::Aborted,
                fetches: 0
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_after_n_intervals_bounds_fetches() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = Cancellation::never().with_timeout(Duration::from_millis(350));
        let cfg = WaitConfig::new((), sequence(vec![0u32], calls.clone()))
            .assert(at_least(1))
            .poll_interval(Duration::from_millis(100));

        let err = wait_for(cfg, &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            WaitError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            }
        ));
        // Three full intervals fit before the deadline: at most N + 1 fetches.
        assert!(calls.load(Ordering::SeqCst) <= 4);
        assert_eq!(err.fetches(), Some(calls.load(Ordering::SeqCst)));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_during_wait_stops_without_another_fetch() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let (handle, cancel) = Cancellation::new();
        let cfg = WaitConfig::new((), move |()| {
            if counter.fetch_add(1, Ordering::SeqCst) + 1 == 3 {
                handle.cancel();
            }
            std::future::ready(Ok::<u32, Infallible>(0))
        })
        .assert(at_least(1))
        .poll_interval(Duration::from_secs(30));
        let start = Instant::now();

        let err = wait_for(cfg, &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            WaitError::Cancelled {
                reason: CancelReason::Aborted,
                fetches: 3
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_backoff_stretches_waits() {
        let calls = Arc::new(AtomicU32::new(0));
        let cfg = WaitConfig::new((), sequence(vec![0u32, 0, 0, 0, 1], calls.clone()))
            .assert(at_least(1))
            .poll_interval(Duration::from_millis(100))
            .backoff(Backoff::Exponential {
                max: Duration::from_millis(300),
            });
        let start = Instant::now();

        wait_for(cfg, &Cancellation::never()).await.unwrap();

        // 100 + 200 + 300 + 300
        assert_eq!(start.elapsed(), Duration::from_millis(900));
    }

    #[test]
    fn backoff_delays() {
        let interval = Duration::from_millis(200);
        assert_eq!(Backoff::Fixed.delay(interval, 5), interval);

        let exp = Backoff::Exponential {
            max: Duration::from_secs(1),
        };
        assert_eq!(exp.delay(interval, 0), Duration::from_millis(200));
        assert_eq!(exp.delay(interval, 1), Duration::from_millis(400));
        assert_eq!(exp.delay(interval, 2), Duration::from_millis(800));
        assert_eq!(exp.delay(interval, 3), Duration::from_secs(1));
        assert_eq!(exp.delay(interval, 40), Duration::from_secs(1));
    }
}
