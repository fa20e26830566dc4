//! Deadline and cancellation for one operation

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why an operation stopped waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

/// Deadline plus cancellation token, passed to every probe.
///
/// Cloning is cheap; clones share the token.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OperationContext {
    /// A context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: CancellationToken::new(),
        }
    }

    /// A child context whose deadline is the earlier of ours and `timeout`
    /// from now. Cancelling the parent cancels the child.
    pub fn narrowed(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            deadline,
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails once cancelled or past the deadline.
    pub fn check(&self) -> Result<(), Interruption> {
        if self.cancel.is_cancelled() {
            return Err(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interruption::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Sleep for `duration`, waking early on cancellation or at the deadline.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interruption> {
        let wake = Instant::now() + duration;
        let wake = match self.deadline {
            Some(deadline) => wake.min(deadline),
            None => wake,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Interruption::Cancelled),
            _ = tokio::time::sleep_until(wake) => self.check(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_context_never_expires() {
        let ctx = OperationContext::new();
        assert_eq!(ctx.check(), Ok(()));
        assert_eq!(ctx.remaining(), None);
    }

    #[tokio::test]
    async fn test_deadline_expires() {
        let ctx = OperationContext::with_timeout(Duration::from_millis(10));
        assert_eq!(ctx.check(), Ok(()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ctx.check(), Err(Interruption::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_sleep_is_cut_at_deadline() {
        let ctx = OperationContext::with_timeout(Duration::from_millis(20));
        let started = Instant::now();
        let result = ctx.sleep(Duration::from_secs(5)).await;
        assert_eq!(result, Err(Interruption::DeadlineExceeded));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sleep_wakes_on_cancel() {
        let ctx = OperationContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        assert_eq!(
            ctx.sleep(Duration::from_secs(5)).await,
            Err(Interruption::Cancelled)
        );
    }

    #[test]
    fn test_narrowed_takes_earlier_deadline() {
        let ctx = OperationContext::with_timeout(Duration::from_secs(60));
        let child = ctx.narrowed(Some(Duration::from_secs(1)));
        assert!(child.deadline() < ctx.deadline());

        let wider = ctx.narrowed(Some(Duration::from_secs(600)));
        assert_eq!(wider.deadline(), ctx.deadline());
    }

    #[test]
    fn test_cancelling_parent_cancels_child() {
        let ctx = OperationContext::new();
        let child = ctx.narrowed(None);
        ctx.cancel();
        assert_eq!(child.check(), Err(Interruption::Cancelled));
    }
}
