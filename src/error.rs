//! Error types for identifier parsing and operation polling
//!
//! Structural errors ([`MalformedIdentifier`], [`SchemaError`]) are raised
//! immediately and are never worth retrying. Poll-time errors
//! ([`PollError`], [`RefreshError`]) are terminal for the wait that raised
//! them; any retry policy belongs to the caller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::poll::PollState;

/// Why an identifier failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    /// The input was empty (or only a separator).
    Empty,
    /// No token was present for a required segment.
    Missing,
    /// A literal segment did not match.
    Mismatch { expected: String, got: String },
    /// Tokens were left over once every segment had been matched.
    UnexpectedTrailingSegment { token: String },
    /// A value contains the `/` separator and could never be parsed back.
    InvalidValue { value: String },
}

/// An identifier did not match the schema it was parsed against.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct MalformedIdentifier {
    /// Name of the offending segment (or the leftover token for trailing input).
    pub segment: String,
    pub kind: MalformedKind,
    /// The identifier as supplied.
    pub input: String,
}

impl MalformedIdentifier {
    pub(crate) fn new(segment: impl Into<String>, kind: MalformedKind, input: &str) -> Self {
        Self {
            segment: segment.into(),
            kind,
            input: input.to_string(),
        }
    }

    /// True when the error reports a segment with no corresponding token.
    pub fn is_missing(&self) -> bool {
        matches!(self.kind, MalformedKind::Missing)
    }
}

impl fmt::Display for MalformedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MalformedKind::Empty => write!(f, "parsing resource id: input was empty"),
            MalformedKind::Missing => write!(
                f,
                "parsing resource id {:?}: the segment {:?} was not found",
                self.input, self.segment
            ),
            MalformedKind::Mismatch { expected, got } => write!(
                f,
                "parsing resource id {:?}: segment {:?} expected {:?} but got {:?}",
                self.input, self.segment, expected, got
            ),
            MalformedKind::UnexpectedTrailingSegment { token } => write!(
                f,
                "parsing resource id {:?}: unexpected trailing segment {:?}",
                self.input, token
            ),
            MalformedKind::InvalidValue { value } => write!(
                f,
                "building resource id {:?}: segment {:?} has value {:?} containing '/'",
                self.input, self.segment, value
            ),
        }
    }
}

/// A schema declaration breaks one of the identifier schema invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema has no segments")]
    Empty,

    #[error("schema must contain exactly one subscription segment, found {0}")]
    SubscriptionCount(usize),

    #[error("schema must contain at most one resource group segment, found {0}")]
    ResourceGroupCount(usize),

    #[error("segment {segment:?} must precede the first user-specified segment")]
    ScopeAfterName { segment: &'static str },

    #[error("segment {segment:?} is missing its literal")]
    MissingLiteral { segment: &'static str },

    #[error("value segment {segment:?} must not carry a literal")]
    UnexpectedLiteral { segment: &'static str },

    #[error("segment name {segment:?} is used more than once")]
    DuplicateName { segment: &'static str },
}

/// Terminal failure of an [`crate::poll::Poller`] run.
#[derive(Debug, Error)]
pub enum PollError {
    /// The deadline elapsed while the operation was still in progress.
    #[error("timed out after {attempts} probe(s) waiting for {operation}")]
    Timeout { operation: String, attempts: u32 },

    /// The probe classified the remote state as failed.
    #[error("{operation} failed")]
    Failed {
        operation: String,
        #[source]
        source: anyhow::Error,
    },

    /// The operation was cancelled before reaching a terminal state.
    #[error("{operation} was cancelled")]
    Cancelled { operation: String },
}

impl PollError {
    /// The poller state that accompanies this error.
    pub fn state(&self) -> PollState {
        match self {
            PollError::Failed { .. } => PollState::Failed,
            PollError::Timeout { .. } | PollError::Cancelled { .. } => PollState::Cancelled,
        }
    }
}

/// Terminal failure of a [`crate::poll::RefreshEngine`] wait.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// An observed state was in neither the pending nor the target set.
    #[error("unexpected state {state:?}, wanted target {target:?}")]
    UnexpectedState { state: String, target: Vec<String> },

    /// The deadline elapsed before the target state was stably observed.
    #[error(
        "timeout while waiting for state to become {target:?} (last state: {last_state:?}, \
         consecutive target hits: {hits}/{required}, elapsed: {elapsed:?})"
    )]
    Timeout {
        target: Vec<String>,
        last_state: Option<String>,
        hits: u32,
        required: u32,
        elapsed: Duration,
    },

    /// The refresh function itself returned an error.
    #[error("refreshing state")]
    Failed(#[source] anyhow::Error),

    /// The resource was reported missing more times than allowed.
    #[error("couldn't find resource ({checks} retries)")]
    NotFound { checks: u32 },

    /// The wait was cancelled.
    #[error("wait for state {target:?} was cancelled")]
    Cancelled { target: Vec<String> },
}

impl RefreshError {
    /// True when the wait ran out of time rather than failing outright.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RefreshError::Timeout { .. })
    }
}
