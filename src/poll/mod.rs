//! Waiting for eventually-consistent remote state
//!
//! A mutation accepted by the management API is not necessarily visible to
//! the next read. The types here block the calling operation until the
//! remote state catches up, fails, or the operation's deadline passes.
//!
//! # Module Structure
//!
//! - [`context`] - Deadline and cancellation shared by probe and engine
//! - [`poller`] - Probe-driven state machine with a stabilization count
//! - [`refresh`] - Pending/target state-code engine
//!
//! Classifying "not found" is the probe's job: while waiting for a resource
//! to appear, a 404 is [`PollStatus::InProgress`], not a failure.

pub mod context;
pub mod poller;
pub mod refresh;

use std::future::Future;
use std::time::Duration;

pub use context::{Interruption, OperationContext};
pub use poller::Poller;
pub use refresh::{Observation, RefreshEngine, RefreshFn};

/// Lifecycle of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::Failed | PollState::Cancelled
        )
    }
}

/// What a single probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of one probe invocation.
#[derive(Debug)]
pub struct PollResult {
    pub status: PollStatus,
    /// Overrides the poller's interval before the next probe.
    pub retry_after: Option<Duration>,
    pub error: Option<anyhow::Error>,
}

impl PollResult {
    pub fn in_progress() -> Self {
        Self {
            status: PollStatus::InProgress,
            retry_after: None,
            error: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            status: PollStatus::Succeeded,
            retry_after: None,
            error: None,
        }
    }

    pub fn failed(error: anyhow::Error) -> Self {
        Self {
            status: PollStatus::Failed,
            retry_after: None,
            error: Some(error),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: PollStatus::Cancelled,
            retry_after: None,
            error: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// One bounded check of the awaited condition.
///
/// Implemented for any `FnMut(OperationContext) -> impl Future<Output = PollResult>`.
pub trait Probe: Send {
    fn probe(&mut self, ctx: OperationContext) -> impl Future<Output = PollResult> + Send;
}

impl<F, Fut> Probe for F
where
    F: FnMut(OperationContext) -> Fut + Send,
    Fut: Future<Output = PollResult> + Send,
{
    fn probe(&mut self, ctx: OperationContext) -> impl Future<Output = PollResult> + Send {
        self(ctx)
    }
}
