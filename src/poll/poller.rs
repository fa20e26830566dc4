//! Operation Poller
//!
//! Calls a [`Probe`] until it reports success (enough times in a row),
//! failure, or the context's deadline passes. The context is checked
//! before every probe, so no probe starts after the deadline.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{Interruption, OperationContext, PollState, PollStatus, Probe};
use crate::error::PollError;

/// Probe-driven wait for one operation.
pub struct Poller<P> {
    probe: P,
    interval: Duration,
    stabilization: u32,
    initial_delay: Duration,
    operation: String,
    state: PollState,
    attempts: u32,
    consecutive_successes: u32,
}

impl<P: Probe> Poller<P> {
    /// `stabilization` is the number of consecutive successful probes needed
    /// before the poller trusts the result; 0 is treated as 1.
    pub fn new(probe: P, interval: Duration, stabilization: u32) -> Self {
        Self {
            probe,
            interval,
            stabilization: stabilization.max(1),
            initial_delay: Duration::ZERO,
            operation: "operation".to_string(),
            state: PollState::NotStarted,
            attempts: 0,
            consecutive_successes: 0,
        }
    }

    /// Label used in log events and errors.
    pub fn named(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    /// Wait this long before the first probe.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of probes issued by the last run.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn run(&mut self, ctx: &OperationContext) -> Result<(), PollError> {
        self.state = PollState::NotStarted;
        self.attempts = 0;
        self.consecutive_successes = 0;

        if !self.initial_delay.is_zero() {
            if let Err(interruption) = ctx.sleep(self.initial_delay).await {
                return Err(self.interrupted(interruption));
            }
        }

        loop {
            if let Err(interruption) = ctx.check() {
                return Err(self.interrupted(interruption));
            }

            self.attempts += 1;
            let result = self.probe.probe(ctx.clone()).await;
            self.state = PollState::InProgress;
            debug!(
                operation = %self.operation,
                attempt = self.attempts,
                status = ?result.status,
                "probe returned"
            );

            match result.status {
                PollStatus::Succeeded => {
                    self.consecutive_successes += 1;
                    if self.consecutive_successes >= self.stabilization {
                        self.state = PollState::Succeeded;
                        info!(
                            operation = %self.operation,
                            attempts = self.attempts,
                            "operation completed"
                        );
                        return Ok(());
                    }
                }
                PollStatus::InProgress => self.consecutive_successes = 0,
                PollStatus::Failed => {
                    self.state = PollState::Failed;
                    let source = result
                        .error
                        .unwrap_or_else(|| anyhow::anyhow!("probe reported failure"));
                    warn!(operation = %self.operation, error = %source, "operation failed");
                    return Err(PollError::Failed {
                        operation: self.operation.clone(),
                        source,
                    });
                }
                PollStatus::Cancelled => {
                    return Err(self.interrupted(Interruption::Cancelled));
                }
            }

            let wait = result.retry_after.unwrap_or(self.interval);
            if let Err(interruption) = ctx.sleep(wait).await {
                return Err(self.interrupted(interruption));
            }
        }
    }

    fn interrupted(&mut self, interruption: Interruption) -> PollError {
        self.state = PollState::Cancelled;
        let operation = self.operation.clone();
        match interruption {
            Interruption::DeadlineExceeded => {
                warn!(operation = %operation, attempts = self.attempts, "timed out");
                PollError::Timeout {
                    operation,
                    attempts: self.attempts,
                }
            }
            Interruption::Cancelled => {
                debug!(operation = %operation, "cancelled");
                PollError::Cancelled { operation }
            }
        }
    }
}
