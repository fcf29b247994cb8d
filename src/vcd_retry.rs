//! Bounded retry for vCD calls.
//!
//! One policy covers both the generic "retry this unit of work" wrapper and
//! the entity-busy re-attempts: a time budget, a backoff and a predicate that
//! decides which errors are worth another attempt.
//!
//! Contract of [`RetryPolicy::run_classified`]:
//! - success returns immediately
//! - a non-retryable error is returned as [`RetryFailure::Permanent`] and the
//!   closure is not called again
//! - once the budget is spent, [`RetryFailure::Timeout`] carries the most
//!   recent error
//!
//! Each attempt runs under the remaining budget, so an attempt that never
//! finishes on its own (e.g. task polling) is dropped when time runs out.
//! A zero budget runs exactly one attempt without a deadline.

use std::{fmt, future::Future, time::Duration};

use tokio::time::Instant;

use crate::vcd_client::{VcdClientConfig, VcdError};

/// Interval between attempts of [`retry_call`].
pub const RETRY_CALL_INTERVAL: Duration = Duration::from_millis(500);

/// Message vCD returns when an entity is locked by another operation.
pub const BUSY_MESSAGE: &str = "is busy, cannot proceed with the operation";

/// Minor error code vCD returns for busy entities.
pub const BUSY_MINOR_CODE: &str = "BUSY_ENTITY";

/// Per-attempt classification of a failure.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Worth another attempt.
    Retryable(E),
    /// Fatal, stop now.
    NonRetryable(E),
}

impl<E> RetryError<E> {
    /// The wrapped error.
    pub fn into_inner(self) -> E {
        match self {
            Self::Retryable(e) | Self::NonRetryable(e) => e,
        }
    }

    /// Whether the error allows another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryFailure<E> {
    /// An attempt failed with a non-retryable error.
    Permanent(E),
    /// The budget ran out.
    Timeout {
        /// Time spent.
        elapsed: Duration,
        /// Most recent error; `None` if the only attempt was cut short.
        last: Option<E>,
    },
}

impl<E> RetryFailure<E> {
    /// The error that ended the retries, if any.
    pub fn into_last(self) -> Option<E> {
        match self {
            Self::Permanent(e) => Some(e),
            Self::Timeout { last, .. } => last,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent(e) => write!(f, "{e}"),
            Self::Timeout {
                elapsed,
                last: Some(e),
            } => write!(f, "timeout after {elapsed:?}: {e}"),
            Self::Timeout { elapsed, last: None } => write!(f, "timeout after {elapsed:?}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryFailure<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Permanent(e) | Self::Timeout { last: Some(e), .. } => Some(e),
            Self::Timeout { last: None, .. } => None,
        }
    }
}

impl From<RetryFailure<VcdError>> for VcdError {
    fn from(failure: RetryFailure<VcdError>) -> Self {
        match failure {
            RetryFailure::Permanent(e) => e,
            RetryFailure::Timeout { elapsed, last } => Self::RetryTimeout {
                elapsed,
                last: last.map(Box::new),
            },
        }
    }
}

/// Wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Sleep a fixed duration.
    Fixed(Duration),
    /// Retry right away.
    Immediate,
}

impl Backoff {
    const fn delay(self) -> Duration {
        match self {
            Self::Fixed(d) => d,
            Self::Immediate => Duration::ZERO,
        }
    }
}

/// Budget, backoff and retryability predicate.
pub struct RetryPolicy<E> {
    budget: Duration,
    backoff: Backoff,
    predicate: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("budget", &self.budget)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl<E: fmt::Display> RetryPolicy<E> {
    /// Build a policy.
    #[must_use]
    pub const fn new(budget: Duration, backoff: Backoff, predicate: fn(&E) -> bool) -> Self {
        Self {
            budget,
            backoff,
            predicate,
        }
    }

    /// Total time allowed.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Wait between attempts.
    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Whether the predicate considers `err` retryable.
    #[must_use]
    pub fn is_retryable(&self, err: &E) -> bool {
        (self.predicate)(err)
    }

    /// Retry `op`, classifying its errors with the policy predicate.
    ///
    /// # Errors
    ///
    /// See [`RetryPolicy::run_classified`].
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let predicate = self.predicate;
        self.run_classified(|| {
            let attempt = op();
            async move {
                attempt.await.map_err(|e| {
                    if predicate(&e) {
                        RetryError::Retryable(e)
                    } else {
                        RetryError::NonRetryable(e)
                    }
                })
            }
        })
        .await
    }

    /// Retry `op`, which classifies its own errors.
    ///
    /// # Errors
    ///
    /// Returns [`RetryFailure::Permanent`] on a non-retryable error and
    /// [`RetryFailure::Timeout`] once the budget is spent.
    pub async fn run_classified<T, F, Fut>(&self, mut op: F) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RetryError<E>>>,
    {
        let start = Instant::now();
        let mut last: Option<E> = None;
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 && start.elapsed() >= self.budget {
                return Err(RetryFailure::Timeout {
                    elapsed: start.elapsed(),
                    last,
                });
            }
            attempt += 1;

            let outcome = if self.budget.is_zero() {
                op().await
            } else {
                let remaining = self.budget.saturating_sub(start.elapsed());
                match tokio::time::timeout(remaining, op()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(attempt, budget = ?self.budget, "attempt cut short by retry budget");
                        return Err(RetryFailure::Timeout {
                            elapsed: start.elapsed(),
                            last,
                        });
                    }
                }
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(RetryError::NonRetryable(e)) => return Err(RetryFailure::Permanent(e)),
                Err(RetryError::Retryable(e)) => {
                    let elapsed = start.elapsed();
                    if elapsed >= self.budget {
                        return Err(RetryFailure::Timeout {
                            elapsed,
                            last: Some(e),
                        });
                    }

                    tracing::warn!(attempt, error = %e, "retryable failure");
                    last = Some(e);

                    let delay = self.backoff.delay().min(self.budget - elapsed);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

impl RetryPolicy<VcdError> {
    /// Re-attempt calls rejected because the target entity is busy.
    #[must_use]
    pub const fn busy(budget: Duration, delay: Duration) -> Self {
        Self::new(budget, Backoff::Fixed(delay), is_busy)
    }

    /// Busy policy using the configured budget and delay.
    #[must_use]
    pub const fn busy_from_config(cfg: &VcdClientConfig) -> Self {
        Self::busy(cfg.max_retry_timeout(), cfg.busy_retry_delay())
    }
}

/// Whether vCD rejected the call because the entity is locked.
#[must_use]
pub fn is_busy(err: &VcdError) -> bool {
    match err {
        VcdError::Api {
            message,
            minor_code,
            ..
        } => message.contains(BUSY_MESSAGE) || minor_code == BUSY_MINOR_CODE,
        _ => false,
    }
}

/// Retry a self-classifying unit of work within `budget`, every 500 ms.
///
/// # Errors
///
/// See [`RetryPolicy::run_classified`].
pub async fn retry_call<T, E, F, Fut>(budget: Duration, op: F) -> Result<T, RetryFailure<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
{
    RetryPolicy::new(budget, Backoff::Fixed(RETRY_CALL_INTERVAL), |_| true)
        .run_classified(op)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    fn busy_error() -> VcdError {
        VcdError::Api {
            status: StatusCode::BAD_REQUEST,
            message: "[ 1f2e ] The entity network lan is busy, cannot proceed with the operation."
                .to_string(),
            minor_code: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_error_is_not_retried() {
        let calls = counter();
        let c = Arc::clone(&calls);

        let result: Result<(), _> = retry_call(Duration::from_secs(60), || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::NonRetryable("fatal"))
            }
        })
        .await;

        assert!(matches!(result, Err(RetryFailure::Permanent("fatal"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_errors_are_retried_until_success() {
        let calls = counter();
        let c = Arc::clone(&calls);

        let value = retry_call(Duration::from_secs(60), || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(RetryError::Retryable(format!("attempt {n}")))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_surfaces_most_recent_error() {
        let calls = counter();
        let c = Arc::clone(&calls);
        let budget = Duration::from_secs(2);
        let start = Instant::now();

        let result: Result<(), _> = retry_call(budget, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst) + 1;
                Err(RetryError::Retryable(n))
            }
        })
        .await;

        let attempts = calls.load(Ordering::SeqCst);
        match result {
            Err(RetryFailure::Timeout {
                elapsed,
                last: Some(last),
            }) => {
                assert!(elapsed >= budget);
                assert_eq!(last, attempts);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(attempts >= 2);
        assert!(start.elapsed() >= budget);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), attempts);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_attempt_is_cut_by_budget() {
        let policy: RetryPolicy<String> =
            RetryPolicy::new(Duration::from_secs(1), Backoff::Immediate, |_| true);

        let result: Result<(), _> = policy
            .run_classified(|| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;

        match result {
            Err(RetryFailure::Timeout { elapsed, last }) => {
                assert!(last.is_none());
                assert!(elapsed >= Duration::from_secs(1));
                assert!(elapsed < Duration::from_secs(3600));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_runs_one_unbounded_attempt() {
        let calls = counter();
        let c = Arc::clone(&calls);

        let value = retry_call(Duration::ZERO, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, RetryError<String>>("done")
            }
        })
        .await
        .unwrap();
        assert_eq!(value, "done");

        let c = Arc::clone(&calls);
        let result: Result<(), _> = retry_call(Duration::ZERO, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(RetryError::Retryable("again"))
            }
        })
        .await;
        assert!(matches!(
            result,
            Err(RetryFailure::Timeout {
                last: Some("again"),
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_policy_retries_only_busy_errors() {
        let calls = counter();
        let c = Arc::clone(&calls);
        let policy = RetryPolicy::busy(Duration::from_secs(30), Duration::from_secs(3));

        let value = policy
            .run(|| {
                let c = Arc::clone(&c);
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(busy_error())
                    } else {
                        Ok("deleted")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, "deleted");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let c = Arc::clone(&calls);
        let result: Result<(), _> = policy
            .run(|| {
                let c = Arc::clone(&c);
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err(VcdError::NotFound {
                        kind: "network",
                        name: "lan".into(),
                    })
                }
            })
            .await;
        assert!(matches!(result, Err(RetryFailure::Permanent(VcdError::NotFound { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_entity_keeps_failing_until_budget() {
        let policy = RetryPolicy::busy(Duration::from_secs(10), Duration::from_secs(3));
        let result: Result<(), _> = policy.run(|| async { Err(busy_error()) }).await;

        let err = VcdError::from(result.unwrap_err());
        match err {
            VcdError::RetryTimeout { elapsed, last } => {
                assert!(elapsed >= Duration::from_secs(10));
                assert!(is_busy(&last.unwrap()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn busy_detection() {
        assert!(is_busy(&busy_error()));
        assert!(is_busy(&VcdError::Api {
            status: StatusCode::BAD_REQUEST,
            message: "locked".into(),
            minor_code: BUSY_MINOR_CODE.into(),
        }));
        assert!(!is_busy(&VcdError::Xml("is busy, cannot proceed with the operation".into())));
    }

    #[test]
    fn permanent_failure_converts_to_inner_error() {
        let err = VcdError::from(RetryFailure::Permanent(VcdError::Session("gone".into())));
        assert!(matches!(err, VcdError::Session(_)));
    }
}
