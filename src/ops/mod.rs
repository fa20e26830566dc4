//! Mutation workflows
//!
//! The flow every resource mutation follows: lock the names it touches,
//! issue the call, wait for the remote state to converge, check the
//! identifier the API hands back, release. Each workflow runs inside a
//! tracing span carrying a fresh operation id.
//!
//! # Module Structure
//!
//! - [`probes`] - Client-backed probes and refresh functions

pub mod probes;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub use probes::{
    exists_probe, provisioning_state, provisioning_state_refresh, reissuing_delete_refresh,
    status_refresh, UNKNOWN_STATE,
};

use crate::client::ArmClient;
use crate::config::PollSettings;
use crate::error::{MalformedIdentifier, MalformedKind, PollError, RefreshError};
use crate::locks::{LockKey, LockRegistry};
use crate::poll::{OperationContext, Poller, RefreshEngine, RefreshFn};
use crate::resourceid::{ArmResourceId, ResourceId};

/// Status codes a GET may return while a delete is still running.
pub const DELETE_PENDING: &[&str] = &["200", "202"];

/// Status code that marks a delete as complete.
pub const DELETE_TARGET: &[&str] = &["404"];

/// The resource a mutation targets and the locks it must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    id: String,
    locks: Vec<LockKey>,
}

impl Mutation {
    /// Mutate `id`, locking its name within its resource kind.
    pub fn for_resource<T: ResourceId>(id: &T) -> Self {
        Self {
            id: id.to_string(),
            locks: vec![LockKey::for_resource(id)],
        }
    }

    /// Mutate a resource known only by its raw identifier. The lock scope
    /// is the innermost resource type, e.g. `virtualNetworks`, so it is the
    /// same key [`Mutation::for_resource`] takes for the typed identifier.
    pub fn for_raw_id(id: &str) -> Result<Self, MalformedIdentifier> {
        let parsed = ArmResourceId::parse(id)?;
        let Some((kind, name)) = parsed.leaf() else {
            return Err(MalformedIdentifier::new(
                "resourceGroups",
                MalformedKind::Missing,
                id,
            ));
        };
        Ok(Self {
            id: id.to_string(),
            locks: vec![LockKey::for_type(name, kind)],
        })
    }

    /// Also hold `key` for the duration of the mutation. Keys are taken in
    /// the order they were added, so add parents after children.
    pub fn also_locking(mut self, key: LockKey) -> Self {
        self.locks.push(key);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn lock_keys(&self) -> &[LockKey] {
        &self.locks
    }
}

/// Runs workflows against one management endpoint.
#[derive(Clone)]
pub struct Operations {
    client: ArmClient,
    locks: Arc<LockRegistry>,
    settings: PollSettings,
}

impl Operations {
    /// Workflows sharing the process-wide lock registry.
    pub fn new(client: ArmClient, settings: PollSettings) -> Self {
        Self {
            client,
            locks: LockRegistry::global(),
            settings,
        }
    }

    /// Use `locks` instead of the process-wide registry.
    pub fn with_registry(mut self, locks: Arc<LockRegistry>) -> Self {
        self.locks = locks;
        self
    }

    pub fn client(&self) -> &ArmClient {
        &self.client
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    /// Wait until a GET of `id` has succeeded `stabilization` times in a row.
    pub async fn wait_for_exists(
        &self,
        id: &str,
        api_version: &str,
        ctx: &OperationContext,
    ) -> Result<(), PollError> {
        let ctx = ctx.narrowed(Some(self.settings.timeout()));
        Poller::new(
            exists_probe(self.client.clone(), id, api_version),
            self.settings.interval(),
            self.settings.stabilization,
        )
        .named(format!("existence of {}", id))
        .run(&ctx)
        .await
    }

    /// Wait for several resources at once; the first failure wins.
    pub async fn wait_for_all_exist<S: AsRef<str>>(
        &self,
        ids: &[S],
        api_version: &str,
        ctx: &OperationContext,
    ) -> Result<(), PollError> {
        try_join_all(
            ids.iter()
                .map(|id| self.wait_for_exists(id.as_ref(), api_version, ctx)),
        )
        .await?;
        Ok(())
    }

    /// Wait for `properties.provisioningState` of `id` to reach one of
    /// `target`, returning the last body read. A missing resource counts as
    /// pending unless `not_found_checks` is configured.
    pub async fn wait_for_state<P, Q>(
        &self,
        id: &str,
        api_version: &str,
        pending: &[P],
        target: &[Q],
        ctx: &OperationContext,
    ) -> Result<Value, RefreshError>
    where
        P: AsRef<str>,
        Q: AsRef<str>,
    {
        let refresh = provisioning_state_refresh(self.client.clone(), id, api_version);
        let mut engine: RefreshEngine<_, Value> = RefreshEngine::new(
            pending.iter().map(|s| s.as_ref().to_string()),
            target.iter().map(|s| s.as_ref().to_string()),
            refresh,
            self.settings.min_interval(),
            self.settings.required_hits,
        )
        .with_poll_interval(self.settings.interval())
        .with_timeout(self.settings.timeout());
        if let Some(checks) = self.settings.not_found_checks {
            engine = engine.with_not_found_checks(checks);
        }
        engine.wait(ctx).await
    }

    /// PUT `body` to the mutation's resource and wait until it can be read
    /// back, returning the identifier the API reports for it.
    pub async fn create_or_update<T: ResourceId>(
        &self,
        mutation: &Mutation,
        api_version: &str,
        body: &Value,
        ctx: &OperationContext,
    ) -> Result<T> {
        let span = info_span!(
            "create_or_update",
            op = %Uuid::new_v4(),
            kind = T::RESOURCE_KIND,
            id = %mutation.id()
        );
        self.create_or_update_inner(mutation, api_version, body, ctx)
            .instrument(span)
            .await
    }

    async fn create_or_update_inner<T: ResourceId>(
        &self,
        mutation: &Mutation,
        api_version: &str,
        body: &Value,
        ctx: &OperationContext,
    ) -> Result<T> {
        let expected = T::parse(mutation.id())
            .with_context(|| format!("invalid {} id", T::RESOURCE_KIND))?;

        let _locks = self
            .locks
            .acquire_ordered(mutation.lock_keys().iter().cloned())
            .await;

        self.client
            .put_resource(mutation.id(), api_version, body)
            .await?;

        self.wait_for_exists(mutation.id(), api_version, ctx)
            .await
            .with_context(|| format!("waiting for {} to be created", expected))?;

        let read = self
            .client
            .get_resource(mutation.id(), api_version)
            .await?
            .with_context(|| format!("{} disappeared after being created", expected))?;

        let Some(returned) = read.get("id").and_then(Value::as_str) else {
            warn!(id = %expected, "read back without an id");
            bail!("API returned no id for {}", expected);
        };
        let actual = T::parse_insensitively(returned)
            .with_context(|| format!("API returned an unusable id for {}", expected))?;
        if !actual.id().eq_ignore_ascii_case(&expected.id()) {
            bail!("API returned id {} for {}", actual, expected);
        }

        info!(id = %actual, "created or updated");
        Ok(actual)
    }

    /// DELETE the mutation's resource and wait until reads return 404.
    ///
    /// With `reissue`, the DELETE is sent again before every read. Returns
    /// `false` when the resource was already gone.
    pub async fn delete(
        &self,
        mutation: &Mutation,
        api_version: &str,
        reissue: bool,
        ctx: &OperationContext,
    ) -> Result<bool> {
        let span = info_span!("delete", op = %Uuid::new_v4(), id = %mutation.id(), reissue);
        self.delete_inner(mutation, api_version, reissue, ctx)
            .instrument(span)
            .await
    }

    async fn delete_inner(
        &self,
        mutation: &Mutation,
        api_version: &str,
        reissue: bool,
        ctx: &OperationContext,
    ) -> Result<bool> {
        let _locks = self
            .locks
            .acquire_ordered(mutation.lock_keys().iter().cloned())
            .await;

        let existed = self
            .client
            .delete_resource(mutation.id(), api_version)
            .await?;
        if !existed {
            info!("already gone");
            return Ok(false);
        }

        let result = if reissue {
            self.wait_until_gone(
                reissuing_delete_refresh(self.client.clone(), mutation.id(), api_version),
                ctx,
            )
            .await
        } else {
            self.wait_until_gone(
                status_refresh(self.client.clone(), mutation.id(), api_version),
                ctx,
            )
            .await
        };
        result.with_context(|| format!("waiting for {} to be deleted", mutation.id()))?;

        info!("deleted");
        Ok(true)
    }

    async fn wait_until_gone<F>(&self, refresh: F, ctx: &OperationContext) -> Result<(), RefreshError>
    where
        F: RefreshFn<Value>,
    {
        let mut engine: RefreshEngine<F, Value> = RefreshEngine::new(
            DELETE_PENDING.iter().copied(),
            DELETE_TARGET.iter().copied(),
            refresh,
            self.settings.min_interval(),
            self.settings.required_hits,
        )
        .with_poll_interval(self.settings.interval())
        .with_timeout(self.settings.timeout());
        engine.wait(ctx).await.map(|_| ())
    }
}
