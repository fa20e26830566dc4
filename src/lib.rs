//! armctl - resource identifiers and convergence waits for a cloud
//! management API
//!
//! # Module Structure
//!
//! - [`resourceid`] - Schema-driven identifier parsing and formatting
//! - [`locks`] - Process-wide named locks serializing conflicting mutations
//! - [`poll`] - Poller and pending/target refresh engine
//! - [`client`] - Thin management API client
//! - [`ops`] - Lock, mutate, wait, verify workflows
//! - [`config`] - Persistent configuration
//! - [`error`] - Error types

pub mod client;
pub mod config;
pub mod error;
pub mod locks;
pub mod ops;
pub mod poll;
pub mod resourceid;

pub use error::{MalformedIdentifier, MalformedKind, PollError, RefreshError, SchemaError};
pub use locks::{LockGuard, LockKey, LockRegistry, MultiLockGuard};
pub use poll::{OperationContext, PollResult, PollState, PollStatus, Poller, RefreshEngine};
pub use resourceid::{ArmResourceId, ParseMode, ParsedId, ResourceId, Schema};

/// Version injected at compile time via ARMCTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("ARMCTL_VERSION") {
    Some(v) => v,
    None => "dev",
};
