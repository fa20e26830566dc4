//! Property-based tests using proptest
//!
//! These tests verify identifier round-tripping, missing-segment
//! attribution and the two case-sensitivity modes using randomized names.

use proptest::prelude::*;

use armctl::resourceid::ids::{ContainerGroupId, SubnetId, VirtualNetworkId};
use armctl::{ArmResourceId, MalformedKind, ParseMode, ResourceId};

/// Names that can never collide with a literal segment (literals have no '-')
fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.]{0,12}-[a-zA-Z0-9]{1,6}"
}

/// Names that may collide with any literal of a subnet identifier
fn arb_colliding_name() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_name(),
        Just("subscriptions".to_string()),
        Just("resourceGroups".to_string()),
        Just("providers".to_string()),
        Just("Microsoft.Network".to_string()),
        Just("virtualNetworks".to_string()),
        Just("subnets".to_string()),
    ]
}

fn arb_subnet() -> impl Strategy<Value = SubnetId> {
    (arb_name(), arb_name(), arb_name(), arb_name())
        .prop_map(|(sub, rg, vnet, subnet)| SubnetId::new(sub, rg, vnet, subnet))
}

/// Uppercase every literal token of a formatted identifier
fn recase_literals<T: ResourceId>(id: &T) -> String {
    let formatted = id.to_string();
    let tokens: Vec<String> = formatted
        .trim_start_matches('/')
        .split('/')
        .zip(T::schema().segments())
        .map(|(token, segment)| {
            if segment.literal.is_some() {
                token.to_uppercase()
            } else {
                token.to_string()
            }
        })
        .collect();
    format!("/{}", tokens.join("/"))
}

proptest! {
    /// Formatting then parsing gives back the same identifier
    #[test]
    fn parse_inverts_format(id in arb_subnet()) {
        let parsed = SubnetId::parse(&id.to_string()).unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// The leading separator is optional
    #[test]
    fn leading_slash_is_optional(
        sub in arb_name(),
        rg in arb_name(),
        name in arb_name()
    ) {
        let id = ContainerGroupId::new(sub, rg, name);
        let formatted = id.to_string();
        let parsed = ContainerGroupId::parse(formatted.trim_start_matches('/')).unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Dropping any one token names exactly the segment it belonged to
    #[test]
    fn dropped_token_names_its_segment(
        id in arb_subnet(),
        index in 0usize..10
    ) {
        let segments = SubnetId::schema().segments();
        prop_assert_eq!(segments.len(), 10);

        let formatted = id.to_string();
        let mut tokens: Vec<&str> = formatted.trim_start_matches('/').split('/').collect();
        tokens.remove(index);
        let input = format!("/{}", tokens.join("/"));

        let err = SubnetId::parse(&input).unwrap_err();
        prop_assert_eq!(err.kind, MalformedKind::Missing);
        prop_assert_eq!(err.segment, segments[index].name);
    }

    /// With names that may equal literals, putting a token back at the
    /// reported segment always repairs the input
    #[test]
    fn dropped_token_with_colliding_names(
        sub in arb_colliding_name(),
        rg in arb_colliding_name(),
        vnet in arb_colliding_name(),
        subnet in arb_colliding_name(),
        index in 0usize..10
    ) {
        let id = SubnetId::new(sub, rg, vnet, subnet);
        let segments = SubnetId::schema().segments();
        let formatted = id.to_string();
        let mut tokens: Vec<&str> = formatted.trim_start_matches('/').split('/').collect();
        tokens.remove(index);
        let input = format!("/{}", tokens.join("/"));

        let err = SubnetId::parse(&input).unwrap_err();
        prop_assert_eq!(&err.kind, &MalformedKind::Missing);
        let reported = segments.iter().position(|s| s.name == err.segment);
        prop_assert!(reported.is_some(), "unknown segment {}", err.segment);

        let position = reported.unwrap_or_default();
        tokens.insert(position, segments[position].literal.unwrap_or("restored"));
        let repaired = format!("/{}", tokens.join("/"));
        prop_assert!(SubnetId::parse(&repaired).is_ok(), "{} not repaired", repaired);
    }

    /// Identifiers built through the checked constructor always parse back
    #[test]
    fn checked_constructor_round_trips(
        sub in "\\PC{0,6}",
        rg in "[a-z/]{0,4}",
        name in "\\PC{0,6}"
    ) {
        match VirtualNetworkId::try_new(sub.clone(), rg.clone(), name.clone()) {
            Ok(id) => prop_assert_eq!(VirtualNetworkId::parse(&id.to_string()).unwrap(), id),
            Err(err) => {
                let bad = [sub, rg, name]
                    .iter()
                    .any(|value| value.is_empty() || value.contains('/'));
                prop_assert!(bad, "rejected clean values: {}", err);
            }
        }
    }

    /// Strict parsing refuses re-cased literals, naming the first one
    #[test]
    fn strict_rejects_recased_literals(id in arb_subnet()) {
        let err = SubnetId::parse(&recase_literals(&id)).unwrap_err();
        prop_assert_eq!(err.segment, "staticSubscriptions");
        let is_mismatch = matches!(err.kind, MalformedKind::Mismatch { .. });
        prop_assert!(is_mismatch);
    }

    /// Insensitive parsing accepts re-cased literals and keeps values verbatim
    #[test]
    fn insensitive_recovers_recased_literals(id in arb_subnet()) {
        let parsed = SubnetId::parse_insensitively(&recase_literals(&id)).unwrap();
        prop_assert_eq!(parsed.to_string(), id.to_string());
        prop_assert_eq!(parsed, id);
    }

    /// Values are case-sensitive in both modes
    #[test]
    fn values_keep_their_case(
        sub in arb_name(),
        rg in arb_name(),
        name in "[a-z]{1,8}-[a-z]{1,4}"
    ) {
        let id = VirtualNetworkId::new(sub, rg, name.to_uppercase());
        let strict = VirtualNetworkId::schema()
            .parse(&id.to_string(), ParseMode::Strict)
            .unwrap();
        let insensitive = VirtualNetworkId::schema()
            .parse(&id.to_string(), ParseMode::Insensitive)
            .unwrap();
        let upper = name.to_uppercase();
        prop_assert_eq!(strict.get("virtualNetworkName"), Some(upper.as_str()));
        prop_assert_eq!(insensitive.get("virtualNetworkName"), Some(upper.as_str()));
    }

    /// Extra tokens after a complete identifier are rejected
    #[test]
    fn trailing_tokens_rejected(id in arb_subnet(), extra in arb_name()) {
        let input = format!("{}/{}", id, extra);
        let err = SubnetId::parse(&input).unwrap_err();
        prop_assert_eq!(
            err.kind,
            MalformedKind::UnexpectedTrailingSegment { token: extra }
        );
    }
}

mod generic_id_tests {
    use super::*;

    proptest! {
        /// The loose parser finds every component of a typed identifier
        #[test]
        fn loose_parse_finds_components(id in arb_subnet()) {
            let loose = ArmResourceId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(&loose.subscription_id, &id.subscription_id);
            prop_assert_eq!(loose.resource_group.as_deref(), Some(id.resource_group_name.as_str()));
            prop_assert_eq!(loose.provider.as_deref(), Some("Microsoft.Network"));
            prop_assert_eq!(loose.path_value("virtualNetworks"), Some(id.virtual_network_name.as_str()));
            prop_assert_eq!(loose.leaf(), Some(("subnets", id.subnet_name.as_str())));
        }

        /// Loose formatting reproduces the canonical string
        #[test]
        fn loose_display_round_trips(id in arb_subnet()) {
            let loose = ArmResourceId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(loose.to_string(), id.to_string());
        }

        /// Scope keys are matched regardless of case
        #[test]
        fn loose_scope_keys_case_insensitive(id in arb_subnet()) {
            let loose = ArmResourceId::parse(&recase_literals(&id)).unwrap();
            prop_assert_eq!(&loose.subscription_id, &id.subscription_id);
            prop_assert_eq!(loose.path_value("VIRTUALNETWORKS"), Some(id.virtual_network_name.as_str()));
        }
    }
}
