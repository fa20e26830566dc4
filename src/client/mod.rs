//! Control-plane client
//!
//! A thin client for the management API: it addresses resources by their
//! identifier, sends one request per call and reports "not found" as a
//! value rather than an error. Transport retries and authentication flows
//! are deliberately absent; the token is supplied by the caller.
//!
//! # Module Structure
//!
//! - [`http`] - HTTP wrapper, response type and error formatting

pub mod http;

use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

pub use http::{format_api_error, ApiError, ApiResponse, ArmHttpClient};

use crate::config::Config;

/// Main management API client
#[derive(Clone)]
pub struct ArmClient {
    http: ArmHttpClient,
    endpoint: Url,
    token: Option<String>,
}

impl ArmClient {
    /// Create a client for `endpoint`
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let mut endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint {:?}", endpoint))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            http: ArmHttpClient::new()?,
            endpoint,
            token,
        })
    }

    /// Create a client from configuration and the environment
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = config.access_token();
        if token.is_none() {
            tracing::warn!(
                "No access token in ${}, requests will be unauthenticated",
                config.token_env
            );
        }
        Self::new(&config.effective_endpoint(), token)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the request URL for a resource id
    pub fn resource_url(&self, id: &str, api_version: &str) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(id.trim_start_matches('/'))
            .with_context(|| format!("Invalid resource id {:?}", id))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// GET a resource and return the response whatever its status
    pub async fn get_status(&self, id: &str, api_version: &str) -> Result<ApiResponse> {
        let url = self.resource_url(id, api_version)?;
        self.http.get(url, self.token.as_deref()).await
    }

    /// GET a resource, `None` when it does not exist
    pub async fn get_resource(&self, id: &str, api_version: &str) -> Result<Option<Value>> {
        let response = self.get_status(id, api_version).await?;
        if response.is_not_found() {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.body))
    }

    /// PUT (create or update) a resource
    pub async fn put_resource(&self, id: &str, api_version: &str, body: &Value) -> Result<Value> {
        let url = self.resource_url(id, api_version)?;
        let response = self
            .http
            .put(url, self.token.as_deref(), body)
            .await?
            .error_for_status()
            .with_context(|| format!("creating/updating {}", id))?;
        Ok(response.body)
    }

    /// DELETE a resource, `false` when it was already gone
    pub async fn delete_resource(&self, id: &str, api_version: &str) -> Result<bool> {
        let url = self.resource_url(id, api_version)?;
        let response = self.http.delete(url, self.token.as_deref()).await?;
        if response.is_not_found() || response.status == reqwest::StatusCode::NO_CONTENT {
            return Ok(false);
        }
        response
            .error_for_status()
            .with_context(|| format!("deleting {}", id))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_url_appends_api_version() {
        let client = ArmClient::new("https://management.example.com", None).unwrap();
        let url = client
            .resource_url(
                "/subscriptions/sub/resourceGroups/rg",
                "2021-04-01",
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.example.com/subscriptions/sub/resourceGroups/rg?api-version=2021-04-01"
        );
    }

    #[test]
    fn test_endpoint_with_path_keeps_prefix() {
        let client = ArmClient::new("http://localhost:8080/arm", None).unwrap();
        assert_eq!(client.endpoint().as_str(), "http://localhost:8080/arm/");
        let url = client.resource_url("/subscriptions/sub", "v1").unwrap();
        assert_eq!(url.path(), "/arm/subscriptions/sub");
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        assert!(ArmClient::new("not a url", None).is_err());
    }
}
