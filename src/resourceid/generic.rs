//! Schema-less ARM identifiers
//!
//! Used where only a component of an arbitrary identifier is needed, e.g.
//! the container group name inside a network interface reference returned
//! by the API. Anything that should be a known shape belongs in
//! [`super::ids`] instead.

use std::fmt;

use crate::error::{MalformedIdentifier, MalformedKind};

/// An ARM identifier split into its scope and `(type, name)` path pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmResourceId {
    pub subscription_id: String,
    pub resource_group: Option<String>,
    pub provider: Option<String>,
    /// `(type, name)` pairs after the provider namespace, in order.
    pub path: Vec<(String, String)>,
}

impl ArmResourceId {
    /// Parse any `key/value` structured identifier that carries a subscription.
    ///
    /// The scope keys (`subscriptions`, `resourceGroups`, `providers`) are
    /// matched case-insensitively since this is meant for identifiers read
    /// back from the API.
    pub fn parse(input: &str) -> Result<Self, MalformedIdentifier> {
        let path = input.strip_prefix('/').unwrap_or(input);
        if path.is_empty() {
            return Err(MalformedIdentifier::new("", MalformedKind::Empty, input));
        }

        let tokens: Vec<&str> = path.split('/').collect();
        if tokens.len() % 2 != 0 {
            let key = tokens[tokens.len() - 1];
            return Err(MalformedIdentifier::new(key, MalformedKind::Missing, input));
        }

        let mut subscription_id = None;
        let mut resource_group = None;
        let mut provider = None;
        let mut pairs = Vec::new();

        for pair in tokens.chunks_exact(2) {
            let (key, value) = (pair[0], pair[1]);
            if key.is_empty() || value.is_empty() {
                return Err(MalformedIdentifier::new(key, MalformedKind::Missing, input));
            }

            let in_scope = provider.is_none() && pairs.is_empty();
            if in_scope && key.eq_ignore_ascii_case("subscriptions") && subscription_id.is_none() {
                subscription_id = Some(value.to_string());
            } else if in_scope && key.eq_ignore_ascii_case("resourceGroups") && resource_group.is_none() {
                resource_group = Some(value.to_string());
            } else if in_scope && key.eq_ignore_ascii_case("providers") {
                provider = Some(value.to_string());
            } else {
                pairs.push((key.to_string(), value.to_string()));
            }
        }

        let Some(subscription_id) = subscription_id else {
            return Err(MalformedIdentifier::new(
                "subscriptions",
                MalformedKind::Missing,
                input,
            ));
        };

        Ok(Self {
            subscription_id,
            resource_group,
            provider,
            path: pairs,
        })
    }

    /// The name recorded under `key` in the path, e.g. `containerGroups`.
    pub fn path_value(&self, key: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The innermost `(type, name)` pair, falling back to the resource group.
    pub fn leaf(&self) -> Option<(&str, &str)> {
        if let Some((kind, name)) = self.path.last() {
            return Some((kind.as_str(), name.as_str()));
        }
        self.resource_group
            .as_deref()
            .map(|group| ("resourceGroups", group))
    }
}

impl fmt::Display for ArmResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if let Some(group) = &self.resource_group {
            write!(f, "/resourceGroups/{}", group)?;
        }
        if let Some(provider) = &self.provider {
            write!(f, "/providers/{}", provider)?;
        }
        for (key, value) in &self.path {
            write!(f, "/{}/{}", key, value)?;
        }
        Ok(())
    }
}
