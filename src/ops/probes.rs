//! Probes and refresh functions backed by the control-plane client
//!
//! Each builder clones what it needs into the returned closure, so the
//! result can be handed to a [`Poller`](crate::poll::Poller) or
//! [`RefreshEngine`](crate::poll::RefreshEngine) that outlives the caller's
//! borrows.

use anyhow::Result;
use serde_json::Value;

use crate::client::ArmClient;
use crate::poll::{Observation, OperationContext, PollResult, Probe, RefreshFn};

/// Code reported by [`provisioning_state_refresh`] when the body carries no
/// `properties.provisioningState`.
pub const UNKNOWN_STATE: &str = "Unknown";

/// Succeeds once a GET of `id` returns the resource. A 404 is
/// [`InProgress`](crate::poll::PollStatus::InProgress); any other non-success
/// status or transport error fails the wait.
pub fn exists_probe(client: ArmClient, id: &str, api_version: &str) -> impl Probe {
    let id = id.to_string();
    let api_version = api_version.to_string();
    move |_ctx: OperationContext| probe_exists(client.clone(), id.clone(), api_version.clone())
}

async fn probe_exists(client: ArmClient, id: String, api_version: String) -> PollResult {
    let response = match client.get_status(&id, &api_version).await {
        Ok(response) => response,
        Err(e) => return PollResult::failed(e),
    };
    let retry_after = response.retry_after;
    let result = if response.is_not_found() {
        PollResult::in_progress()
    } else {
        match response.error_for_status() {
            Ok(_) => PollResult::succeeded(),
            Err(e) => PollResult::failed(e),
        }
    };
    match retry_after {
        Some(delay) => result.with_retry_after(delay),
        None => result,
    }
}

/// Reports the HTTP status of a GET of `id` as the state code, with the
/// response body as payload. Never reports not-found; 404 is just `"404"`.
pub fn status_refresh(client: ArmClient, id: &str, api_version: &str) -> impl RefreshFn<Value> {
    let id = id.to_string();
    let api_version = api_version.to_string();
    move |_ctx: OperationContext| read_status(client.clone(), id.clone(), api_version.clone())
}

async fn read_status(
    client: ArmClient,
    id: String,
    api_version: String,
) -> Result<Observation<Value>> {
    let response = client.get_status(&id, &api_version).await?;
    Ok(Observation::state(
        response.status.as_u16().to_string(),
        response.body,
    ))
}

/// Reports `properties.provisioningState` of `id`, or
/// [`Observation::NotFound`] on 404.
pub fn provisioning_state_refresh(
    client: ArmClient,
    id: &str,
    api_version: &str,
) -> impl RefreshFn<Value> {
    let id = id.to_string();
    let api_version = api_version.to_string();
    move |_ctx: OperationContext| {
        read_provisioning_state(client.clone(), id.clone(), api_version.clone())
    }
}

async fn read_provisioning_state(
    client: ArmClient,
    id: String,
    api_version: String,
) -> Result<Observation<Value>> {
    let Some(body) = client.get_resource(&id, &api_version).await? else {
        return Ok(Observation::NotFound);
    };
    let state = provisioning_state(&body)
        .unwrap_or(UNKNOWN_STATE)
        .to_string();
    Ok(Observation::state(state, body))
}

/// Re-issues the DELETE of `id` before every status read.
///
/// Some backends accept a delete and then drop it. Deleting an absent
/// resource is a no-op, so running this any number of times is safe.
pub fn reissuing_delete_refresh(
    client: ArmClient,
    id: &str,
    api_version: &str,
) -> impl RefreshFn<Value> {
    let id = id.to_string();
    let api_version = api_version.to_string();
    move |_ctx: OperationContext| {
        reissue_delete(client.clone(), id.clone(), api_version.clone())
    }
}

async fn reissue_delete(
    client: ArmClient,
    id: String,
    api_version: String,
) -> Result<Observation<Value>> {
    let accepted = client.delete_resource(&id, &api_version).await?;
    tracing::debug!(id = %id, accepted, "delete re-issued");
    read_status(client, id, api_version).await
}

/// `properties.provisioningState` of a resource body.
pub fn provisioning_state(body: &Value) -> Option<&str> {
    body.get("properties")?.get("provisioningState")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provisioning_state() {
        let body = json!({"properties": {"provisioningState": "Updating"}});
        assert_eq!(provisioning_state(&body), Some("Updating"));
        assert_eq!(provisioning_state(&json!({"properties": {}})), None);
        assert_eq!(provisioning_state(&Value::Null), None);
    }
}
