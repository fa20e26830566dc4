//! Pending/Target State Refresh Engine
//!
//! Waits for a resource whose state is reported as an open-ended string
//! code (a provisioning state, an HTTP status, ...). Codes in the pending
//! set keep the wait going, codes in the target set count toward the
//! required number of consecutive hits, anything else ends the wait.
//!
//! A refresh function may have side effects, e.g. re-issuing a delete the
//! backend is known to drop. It can run any number of times before the
//! wait ends, so it must be idempotent.

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Interruption, OperationContext};
use crate::error::RefreshError;

/// First backoff step when no fixed poll interval is configured.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Backoff ceiling when no fixed poll interval is configured.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// What one refresh observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T> {
    /// The resource exists and reports `code`.
    State { code: String, payload: T },
    /// The resource could not be found.
    NotFound,
}

impl<T> Observation<T> {
    pub fn state(code: impl Into<String>, payload: T) -> Self {
        Observation::State {
            code: code.into(),
            payload,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Observation::State { code, .. } => Some(code),
            Observation::NotFound => None,
        }
    }
}

/// Reads the current state code of the awaited resource.
///
/// Implemented for any
/// `FnMut(OperationContext) -> impl Future<Output = anyhow::Result<Observation<T>>>`.
pub trait RefreshFn<T>: Send {
    fn refresh(
        &mut self,
        ctx: OperationContext,
    ) -> impl Future<Output = anyhow::Result<Observation<T>>> + Send;
}

impl<F, Fut, T> RefreshFn<T> for F
where
    F: FnMut(OperationContext) -> Fut + Send,
    Fut: Future<Output = anyhow::Result<Observation<T>>> + Send,
{
    fn refresh(
        &mut self,
        ctx: OperationContext,
    ) -> impl Future<Output = anyhow::Result<Observation<T>>> + Send {
        self(ctx)
    }
}

/// Per-wait bookkeeping.
#[derive(Debug, Default)]
struct RefreshState {
    consecutive_target_hits: u32,
    consecutive_not_found: u32,
    last_state: Option<String>,
}

/// Wait for a resource to move from a pending state to a target state.
pub struct RefreshEngine<F, T> {
    pending: HashSet<String>,
    target: HashSet<String>,
    refresh: F,
    min_interval: Duration,
    required_hits: u32,
    delay: Duration,
    poll_interval: Option<Duration>,
    timeout: Option<Duration>,
    not_found_checks: Option<u32>,
    _payload: PhantomData<fn() -> T>,
}

impl<F, T> RefreshEngine<F, T>
where
    F: RefreshFn<T>,
{
    /// `required_hits` consecutive target observations end the wait
    /// successfully; 0 is treated as 1. Polls are never closer together
    /// than `min_interval`.
    pub fn new<P, Q>(
        pending: P,
        target: Q,
        refresh: F,
        min_interval: Duration,
        required_hits: u32,
    ) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        Q: IntoIterator,
        Q::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            refresh,
            min_interval,
            required_hits: required_hits.max(1),
            delay: Duration::ZERO,
            poll_interval: None,
            timeout: None,
            not_found_checks: None,
            _payload: PhantomData,
        }
    }

    /// Wait this long before the first refresh.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Poll at a fixed interval instead of backing off.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Give up after `timeout` even if the context allows longer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Fail after more than `checks` consecutive [`Observation::NotFound`].
    /// Without a limit, not-found is treated as pending.
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = Some(checks);
        self
    }

    fn sorted_target(&self) -> Vec<String> {
        let mut target: Vec<String> = self.target.iter().cloned().collect();
        target.sort();
        target
    }

    fn next_wait(&self, backoff: &mut Duration) -> Duration {
        if let Some(interval) = self.poll_interval {
            return interval.max(self.min_interval);
        }
        let wait = (*backoff).max(self.min_interval);
        *backoff = (*backoff * 2).min(MAX_BACKOFF);
        wait
    }

    /// Poll until the target state has been seen `required_hits` times in a
    /// row, returning the payload of the last observation.
    pub async fn wait(&mut self, ctx: &OperationContext) -> Result<T, RefreshError> {
        let ctx = ctx.narrowed(self.timeout);
        let started = Instant::now();
        let mut state = RefreshState::default();
        let mut backoff = INITIAL_BACKOFF;

        if !self.delay.is_zero() {
            if let Err(interruption) = ctx.sleep(self.delay).await {
                return Err(self.interrupted(interruption, &state, started));
            }
        }

        loop {
            if let Err(interruption) = ctx.check() {
                return Err(self.interrupted(interruption, &state, started));
            }

            let observation = self.refresh.refresh(ctx.clone()).await.map_err(|e| {
                warn!(error = %e, "refresh failed");
                RefreshError::Failed(e)
            })?;

            match observation {
                Observation::NotFound => {
                    state.consecutive_target_hits = 0;
                    state.consecutive_not_found += 1;
                    state.last_state = None;
                    debug!(checks = state.consecutive_not_found, "resource not found yet");
                    if let Some(limit) = self.not_found_checks {
                        if state.consecutive_not_found > limit {
                            return Err(RefreshError::NotFound {
                                checks: state.consecutive_not_found,
                            });
                        }
                    }
                }
                Observation::State { code, payload } => {
                    state.consecutive_not_found = 0;
                    if self.target.contains(&code) {
                        state.consecutive_target_hits += 1;
                        debug!(
                            state = %code,
                            hits = state.consecutive_target_hits,
                            required = self.required_hits,
                            "observed target state"
                        );
                        if state.consecutive_target_hits >= self.required_hits {
                            info!(state = %code, elapsed = ?started.elapsed(), "reached target state");
                            return Ok(payload);
                        }
                    } else if self.pending.contains(&code) {
                        state.consecutive_target_hits = 0;
                        debug!(state = %code, "still pending");
                    } else {
                        warn!(state = %code, "unexpected state");
                        return Err(RefreshError::UnexpectedState {
                            state: code,
                            target: self.sorted_target(),
                        });
                    }
                    state.last_state = Some(code);
                }
            }

            let wait = self.next_wait(&mut backoff);
            if let Err(interruption) = ctx.sleep(wait).await {
                return Err(self.interrupted(interruption, &state, started));
            }
        }
    }

    fn interrupted(
        &self,
        interruption: Interruption,
        state: &RefreshState,
        started: Instant,
    ) -> RefreshError {
        match interruption {
            Interruption::DeadlineExceeded => RefreshError::Timeout {
                target: self.sorted_target(),
                last_state: state.last_state.clone(),
                hits: state.consecutive_target_hits,
                required: self.required_hits,
                elapsed: started.elapsed(),
            },
            Interruption::Cancelled => RefreshError::Cancelled {
                target: self.sorted_target(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sequence(
        codes: &[&'static str],
        calls: Arc<Mutex<Vec<Instant>>>,
    ) -> impl FnMut(OperationContext) -> std::future::Ready<anyhow::Result<Observation<u32>>> + Send
    {
        let codes: Vec<&'static str> = codes.to_vec();
        move |_ctx: OperationContext| {
            let mut calls = calls.lock().unwrap();
            calls.push(Instant::now());
            let n = calls.len();
            let observation = match codes.get(n - 1) {
                Some(&"missing") => Observation::NotFound,
                Some(code) => Observation::state(*code, n as u32),
                None => Observation::state("pending", n as u32),
            };
            std::future::ready(Ok(observation))
        }
    }

    #[tokio::test]
    async fn test_pending_then_target() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&["pending", "pending", "done"], calls.clone()),
            Duration::ZERO,
            1,
        )
        .with_poll_interval(Duration::from_millis(1));

        let payload = engine.wait(&OperationContext::new()).await.unwrap();
        assert_eq!(payload, 3);
    }

    #[tokio::test]
    async fn test_streak_resets_on_pending() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&["done", "pending", "done", "done"], calls.clone()),
            Duration::ZERO,
            2,
        )
        .with_poll_interval(Duration::from_millis(1));

        assert_eq!(engine.wait(&OperationContext::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_refresh_error_is_failed() {
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            |_ctx: OperationContext| async {
                Err::<Observation<()>, _>(anyhow::anyhow!("connection reset"))
            },
            Duration::ZERO,
            1,
        );
        let err = engine.wait(&OperationContext::new()).await.unwrap_err();
        assert!(matches!(err, RefreshError::Failed(_)));
    }

    #[tokio::test]
    async fn test_not_found_is_pending_without_limit() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&["missing", "missing", "missing", "done"], calls.clone()),
            Duration::ZERO,
            1,
        )
        .with_poll_interval(Duration::from_millis(1));
        assert_eq!(engine.wait(&OperationContext::new()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_not_found_checks_limit() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&["missing", "missing", "missing", "done"], calls.clone()),
            Duration::ZERO,
            1,
        )
        .with_poll_interval(Duration::from_millis(1))
        .with_not_found_checks(2);
        let err = engine.wait(&OperationContext::new()).await.unwrap_err();
        assert!(matches!(err, RefreshError::NotFound { checks: 3 }));
    }

    #[tokio::test]
    async fn test_min_interval_spaces_polls() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&["pending", "pending", "done"], calls.clone()),
            Duration::from_millis(30),
            1,
        )
        .with_poll_interval(Duration::from_millis(1));
        engine.wait(&OperationContext::new()).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(30));
        }
    }

    #[tokio::test]
    async fn test_own_timeout_applies() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&[], calls.clone()),
            Duration::ZERO,
            1,
        )
        .with_poll_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_millis(30));

        let err = engine.wait(&OperationContext::new()).await.unwrap_err();
        match err {
            RefreshError::Timeout {
                last_state, hits, ..
            } => {
                assert_eq!(last_state.as_deref(), Some("pending"));
                assert_eq!(hits, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delay_precedes_first_refresh() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&["done"], calls.clone()),
            Duration::ZERO,
            1,
        )
        .with_delay(Duration::from_millis(20));
        let started = Instant::now();
        engine.wait(&OperationContext::new()).await.unwrap();
        assert!(calls.lock().unwrap()[0] - started >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_cancelled_context() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut engine = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&[], calls.clone()),
            Duration::ZERO,
            1,
        );
        let ctx = OperationContext::new();
        ctx.cancel();
        let err = engine.wait(&ctx).await.unwrap_err();
        assert!(matches!(err, RefreshError::Cancelled { .. }));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let engine: RefreshEngine<_, u32> = RefreshEngine::new(
            ["pending"],
            ["done"],
            sequence(&[], Arc::new(Mutex::new(Vec::new()))),
            Duration::from_millis(150),
            1,
        );
        let mut backoff = INITIAL_BACKOFF;
        assert_eq!(engine.next_wait(&mut backoff), Duration::from_millis(150));
        assert_eq!(engine.next_wait(&mut backoff), Duration::from_millis(200));
        assert_eq!(engine.next_wait(&mut backoff), Duration::from_millis(400));
        for _ in 0..10 {
            engine.next_wait(&mut backoff);
        }
        assert_eq!(engine.next_wait(&mut backoff), MAX_BACKOFF);
    }
}
