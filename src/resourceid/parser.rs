//! Schema-driven identifier parser

use crate::error::{MalformedIdentifier, MalformedKind};

use super::segment::{Schema, Segment};

/// How literal segments are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Literals must match their canonical casing exactly.
    #[default]
    Strict,
    /// Literals are compared ignoring ASCII case. Only for identifiers
    /// returned by the remote API, which is known to re-case them.
    Insensitive,
}

impl ParseMode {
    fn matches(self, literal: &str, token: &str) -> bool {
        match self {
            ParseMode::Strict => literal == token,
            ParseMode::Insensitive => literal.eq_ignore_ascii_case(token),
        }
    }
}

/// Values captured from one parse, keyed by segment name in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedId {
    input: String,
    mode: ParseMode,
    values: Vec<(&'static str, String)>,
}

impl ParsedId {
    /// The identifier as it was supplied.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    pub fn get(&self, segment: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == segment)
            .map(|(_, value)| value.as_str())
    }

    /// Like [`ParsedId::get`], reporting an absent segment as missing.
    pub fn require(&self, segment: &str) -> Result<&str, MalformedIdentifier> {
        self.get(segment).ok_or_else(|| {
            MalformedIdentifier::new(segment, MalformedKind::Missing, &self.input)
        })
    }

    /// Captured `(segment name, value)` pairs in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(name, value)| (*name, value.as_str()))
    }
}

pub(crate) fn parse(
    schema: &Schema,
    input: &str,
    mode: ParseMode,
) -> Result<ParsedId, MalformedIdentifier> {
    let path = input.strip_prefix('/').unwrap_or(input);
    if path.is_empty() {
        return Err(MalformedIdentifier::new("", MalformedKind::Empty, input));
    }

    let tokens: Vec<&str> = path.split('/').collect();
    let segments = schema.segments();
    let missing = |name: &str| MalformedIdentifier::new(name, MalformedKind::Missing, input);
    if let Some(dropped) = dropped_segment(segments, &tokens, mode) {
        return Err(missing(dropped.name));
    }
    // With too few tokens, a mismatch is evidence that the segment's own
    // token was dropped and the following tokens shifted into its place.
    let short = tokens.len() < segments.len();

    let mut values = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        let Some(&token) = tokens.get(i) else {
            return Err(missing(segment.name));
        };

        match segment.literal {
            Some(literal) => {
                if !mode.matches(literal, token) {
                    if short {
                        return Err(missing(segment.name));
                    }
                    return Err(MalformedIdentifier::new(
                        segment.name,
                        MalformedKind::Mismatch {
                            expected: literal.to_string(),
                            got: token.to_string(),
                        },
                        input,
                    ));
                }
            }
            None => {
                if token.is_empty() {
                    return Err(missing(segment.name));
                }
                values.push((segment.name, token.to_string()));
            }
        }
    }

    if let Some(extra) = tokens.get(segments.len()) {
        return Err(MalformedIdentifier::new(
            *extra,
            MalformedKind::UnexpectedTrailingSegment {
                token: extra.to_string(),
            },
            input,
        ));
    }

    Ok(ParsedId {
        input: input.to_string(),
        mode,
        values,
    })
}

/// With exactly one token short, the segment whose removal lines the
/// remaining segments up with every token. When several do, a name is
/// preferred over a literal and a later segment over an earlier one.
fn dropped_segment<'s>(
    segments: &'s [Segment],
    tokens: &[&str],
    mode: ParseMode,
) -> Option<&'s Segment> {
    if tokens.len() + 1 != segments.len() {
        return None;
    }
    (0..segments.len())
        .filter(|&skip| {
            segments
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .zip(tokens)
                .all(|((_, segment), token)| match segment.literal {
                    Some(literal) => mode.matches(literal, token),
                    None => !token.is_empty(),
                })
        })
        .max_by_key(|&skip| (segments[skip].literal.is_none(), skip))
        .map(|skip| &segments[skip])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resourceid::segment::{
        Segment, RESOURCE_GROUP_NAME, STATIC_PROVIDERS, STATIC_RESOURCE_GROUPS,
        STATIC_SUBSCRIPTIONS, SUBSCRIPTION_ID,
    };

    const SEGMENTS: &[Segment] = &[
        STATIC_SUBSCRIPTIONS,
        SUBSCRIPTION_ID,
        STATIC_RESOURCE_GROUPS,
        RESOURCE_GROUP_NAME,
        STATIC_PROVIDERS,
        Segment::provider("staticMicrosoftNetwork", "Microsoft.Network"),
        Segment::static_segment("staticVirtualNetworks", "virtualNetworks"),
        Segment::user_specified("virtualNetworkName", "example-vnet"),
    ];
    const VNET: Schema = Schema::new(SEGMENTS);

    const INPUT: &str =
        "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Network/virtualNetworks/vnet-1";

    #[test]
    fn test_parse_captures_values() {
        let parsed = VNET.parse(INPUT, ParseMode::Strict).unwrap();
        assert_eq!(parsed.get("subscriptionId"), Some("sub-1"));
        assert_eq!(parsed.get("resourceGroupName"), Some("rg-1"));
        assert_eq!(parsed.get("virtualNetworkName"), Some("vnet-1"));
        assert_eq!(parsed.get("staticProviders"), None);
        assert_eq!(parsed.input(), INPUT);
        assert_eq!(parsed.mode(), ParseMode::Strict);
    }

    #[test]
    fn test_parse_accepts_missing_leading_slash() {
        let parsed = VNET.parse(&INPUT[1..], ParseMode::Strict).unwrap();
        assert_eq!(parsed.get("virtualNetworkName"), Some("vnet-1"));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let err = VNET.parse("/", ParseMode::Strict).unwrap_err();
        assert_eq!(err.kind, MalformedKind::Empty);
        let err = VNET.parse("", ParseMode::Strict).unwrap_err();
        assert_eq!(err.kind, MalformedKind::Empty);
    }

    #[test]
    fn test_mismatched_literal_reports_expected_and_got() {
        let input = INPUT.replace("virtualNetworks", "networkProfiles");
        let err = VNET.parse(&input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "staticVirtualNetworks");
        assert_eq!(
            err.kind,
            MalformedKind::Mismatch {
                expected: "virtualNetworks".to_string(),
                got: "networkProfiles".to_string(),
            }
        );
    }

    #[test]
    fn test_strict_mode_rejects_recased_literal() {
        let input = INPUT.replace("resourceGroups", "resourcegroups");
        let err = VNET.parse(&input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "staticResourceGroups");
    }

    #[test]
    fn test_insensitive_mode_recovers_recased_literal() {
        let input = INPUT
            .replace("resourceGroups", "resourcegroups")
            .replace("Microsoft.Network", "microsoft.network");
        let parsed = VNET.parse(&input, ParseMode::Insensitive).unwrap();
        assert_eq!(parsed.get("resourceGroupName"), Some("rg-1"));
        assert_eq!(parsed.mode(), ParseMode::Insensitive);
    }

    #[test]
    fn test_insensitive_mode_keeps_value_casing() {
        let input = INPUT.replace("vnet-1", "VNet-1");
        let parsed = VNET.parse(&input, ParseMode::Insensitive).unwrap();
        assert_eq!(parsed.get("virtualNetworkName"), Some("VNet-1"));
    }

    #[test]
    fn test_trailing_segment_is_rejected() {
        let input = format!("{INPUT}/subnets/default");
        let err = VNET.parse(&input, ParseMode::Strict).unwrap_err();
        assert_eq!(
            err.kind,
            MalformedKind::UnexpectedTrailingSegment {
                token: "subnets".to_string()
            }
        );
    }

    #[test]
    fn test_trailing_slash_is_rejected() {
        let input = format!("{INPUT}/");
        let err = VNET.parse(&input, ParseMode::Strict).unwrap_err();
        assert!(matches!(
            err.kind,
            MalformedKind::UnexpectedTrailingSegment { .. }
        ));
    }

    #[test]
    fn test_missing_name_is_reported() {
        let input = "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.Network/virtualNetworks";
        let err = VNET.parse(input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "virtualNetworkName");
        assert!(err.is_missing());
    }

    #[test]
    fn test_missing_resource_group_value_is_reported() {
        let input = "/subscriptions/sub-1/resourceGroups/providers/Microsoft.Network/virtualNetworks/vnet-1";
        let err = VNET.parse(input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "resourceGroupName");
        assert!(err.is_missing());
    }

    #[test]
    fn test_missing_literal_is_reported() {
        let input = "/subscriptions/sub-1/resourceGroups/rg-1/Microsoft.Network/virtualNetworks/vnet-1";
        let err = VNET.parse(input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "staticProviders");
        assert!(err.is_missing());
    }

    #[test]
    fn test_missing_name_after_group_named_like_a_literal() {
        let input = "/subscriptions/sub/resourceGroups/providers/providers/Microsoft.Network/virtualNetworks";
        let err = VNET.parse(input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "virtualNetworkName");
        assert!(err.is_missing());
    }

    #[test]
    fn test_missing_subnet_name_in_vnet_named_subnets() {
        const SUBNET_SEGMENTS: &[Segment] = &[
            STATIC_SUBSCRIPTIONS,
            SUBSCRIPTION_ID,
            STATIC_RESOURCE_GROUPS,
            RESOURCE_GROUP_NAME,
            STATIC_PROVIDERS,
            Segment::provider("staticMicrosoftNetwork", "Microsoft.Network"),
            Segment::static_segment("staticVirtualNetworks", "virtualNetworks"),
            Segment::user_specified("virtualNetworkName", "example-vnet"),
            Segment::static_segment("staticSubnets", "subnets"),
            Segment::user_specified("subnetName", "example-subnet"),
        ];
        let subnet = Schema::new(SUBNET_SEGMENTS);
        let input = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/subnets/subnets";
        let err = subnet.parse(input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "subnetName");
        assert!(err.is_missing());
    }

    #[test]
    fn test_empty_value_is_missing() {
        let input = "/subscriptions//resourceGroups/rg-1/providers/Microsoft.Network/virtualNetworks/vnet-1";
        let err = VNET.parse(input, ParseMode::Strict).unwrap_err();
        assert_eq!(err.segment, "subscriptionId");
        assert!(err.is_missing());
    }

    #[test]
    fn test_require_reports_missing_segment() {
        let parsed = VNET.parse(INPUT, ParseMode::Strict).unwrap();
        assert_eq!(parsed.require("virtualNetworkName"), Ok("vnet-1"));
        let err = parsed.require("subnetName").unwrap_err();
        assert_eq!(err.segment, "subnetName");
    }

    #[test]
    fn test_values_are_in_schema_order() {
        let parsed = VNET.parse(INPUT, ParseMode::Strict).unwrap();
        let names: Vec<_> = parsed.values().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["subscriptionId", "resourceGroupName", "virtualNetworkName"]
        );
    }

    #[test]
    fn test_format_round_trips() {
        let parsed = VNET.parse(INPUT, ParseMode::Strict).unwrap();
        assert_eq!(VNET.format(|name| parsed.get(name)), INPUT);
    }
}
