//! Segment descriptors and identifier schemas
//!
//! A [`Schema`] is plain data: an ordered list of [`Segment`]s describing one
//! identifier shape. Parsing, formatting and validation are generic over it.

use crate::error::{MalformedIdentifier, SchemaError};

use super::parser::{self, ParseMode, ParsedId};

/// What a segment matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A fixed literal such as `resourceGroups`.
    Static,
    /// The subscription scope value.
    SubscriptionId,
    /// The resource group scope value.
    ResourceGroup,
    /// A provider namespace literal such as `Microsoft.Network`.
    ProviderNamespace,
    /// A name chosen by the user.
    UserSpecified,
}

impl SegmentKind {
    /// Literal kinds match a fixed token instead of capturing one.
    pub fn is_literal(self) -> bool {
        matches!(self, SegmentKind::Static | SegmentKind::ProviderNamespace)
    }
}

/// One positional component of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Stable key under which the segment is reported and captured.
    pub name: &'static str,
    pub kind: SegmentKind,
    /// Canonical casing of the token, for literal kinds.
    pub literal: Option<&'static str>,
    /// Sample value used when rendering example identifiers.
    pub example: &'static str,
}

impl Segment {
    pub const fn static_segment(name: &'static str, literal: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::Static,
            literal: Some(literal),
            example: literal,
        }
    }

    pub const fn provider(name: &'static str, namespace: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::ProviderNamespace,
            literal: Some(namespace),
            example: namespace,
        }
    }

    pub const fn subscription_id(name: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::SubscriptionId,
            literal: None,
            example: "12345678-1234-9876-4563-123456789012",
        }
    }

    pub const fn resource_group(name: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::ResourceGroup,
            literal: None,
            example: "example-resource-group",
        }
    }

    pub const fn user_specified(name: &'static str, example: &'static str) -> Self {
        Self {
            name,
            kind: SegmentKind::UserSpecified,
            literal: None,
            example,
        }
    }
}

// Segments shared by every resource-group scoped identifier.
pub const STATIC_SUBSCRIPTIONS: Segment = Segment::static_segment("staticSubscriptions", "subscriptions");
pub const SUBSCRIPTION_ID: Segment = Segment::subscription_id("subscriptionId");
pub const STATIC_RESOURCE_GROUPS: Segment =
    Segment::static_segment("staticResourceGroups", "resourceGroups");
pub const RESOURCE_GROUP_NAME: Segment = Segment::resource_group("resourceGroupName");
pub const STATIC_PROVIDERS: Segment = Segment::static_segment("staticProviders", "providers");

/// Ordered segment list describing one identifier shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    segments: &'static [Segment],
}

impl Schema {
    pub const fn new(segments: &'static [Segment]) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &'static [Segment] {
        self.segments
    }

    /// Segments that capture a value, in order.
    pub fn value_segments(&self) -> impl Iterator<Item = &'static Segment> {
        self.segments.iter().filter(|s| !s.kind.is_literal())
    }

    /// Parse `input` against this schema.
    ///
    /// [`ParseMode::Insensitive`] folds the case of literal segments and is
    /// only meant for identifiers echoed back by the remote API. Identifiers
    /// supplied by an operator must be parsed with [`ParseMode::Strict`].
    pub fn parse(&self, input: &str, mode: ParseMode) -> Result<ParsedId, MalformedIdentifier> {
        parser::parse(self, input, mode)
    }

    /// Render the canonical identifier, looking each value segment up by name.
    ///
    /// Value segments without a value render as `{name}`, so
    /// `format(|_| None)` yields the schema's template.
    pub fn format<'v, F>(&self, value_of: F) -> String
    where
        F: Fn(&'static str) -> Option<&'v str>,
    {
        let mut out = String::new();
        for segment in self.segments {
            out.push('/');
            match segment.literal {
                Some(literal) => out.push_str(literal),
                None => match value_of(segment.name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('{');
                        out.push_str(segment.name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }

    /// The schema as a template, e.g. `/subscriptions/{subscriptionId}/...`.
    pub fn template(&self) -> String {
        self.format(|_| None)
    }

    /// An example identifier built from each segment's sample value.
    pub fn example(&self) -> String {
        let segments = self.segments;
        self.format(|name| {
            segments
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.example)
        })
    }

    /// Check the schema invariants.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.segments.is_empty() {
            return Err(SchemaError::Empty);
        }

        for (i, segment) in self.segments.iter().enumerate() {
            if self.segments[..i].iter().any(|s| s.name == segment.name) {
                return Err(SchemaError::DuplicateName {
                    segment: segment.name,
                });
            }
            match (segment.kind.is_literal(), segment.literal) {
                (true, None) => {
                    return Err(SchemaError::MissingLiteral {
                        segment: segment.name,
                    })
                }
                (false, Some(_)) => {
                    return Err(SchemaError::UnexpectedLiteral {
                        segment: segment.name,
                    })
                }
                _ => {}
            }
        }

        let count = |kind| self.segments.iter().filter(|s| s.kind == kind).count();
        let subscriptions = count(SegmentKind::SubscriptionId);
        if subscriptions != 1 {
            return Err(SchemaError::SubscriptionCount(subscriptions));
        }
        let groups = count(SegmentKind::ResourceGroup);
        if groups > 1 {
            return Err(SchemaError::ResourceGroupCount(groups));
        }

        if let Some(first_name) = self
            .segments
            .iter()
            .position(|s| s.kind == SegmentKind::UserSpecified)
        {
            if let Some(scope) = self.segments[first_name..].iter().find(|s| {
                matches!(s.kind, SegmentKind::SubscriptionId | SegmentKind::ResourceGroup)
            }) {
                return Err(SchemaError::ScopeAfterName {
                    segment: scope.name,
                });
            }
        }

        Ok(())
    }
}
