//! Typed resource identifiers
//!
//! Every identifier shape is described by a [`Schema`] (data) and parsed,
//! validated and formatted by one generic engine.
//!
//! # Module Structure
//!
//! - [`segment`] - Segment descriptors and the [`Schema`] type
//! - [`parser`] - The parse engine and [`ParsedId`]
//! - [`ids`] - Typed identifiers for the shapes used by resource glue
//! - [`generic`] - Schema-less parsing of arbitrary ARM identifiers
//!
//! # Example
//!
//! ```ignore
//! use armctl::resourceid::{ids::VirtualNetworkId, ResourceId};
//!
//! let id = VirtualNetworkId::parse(
//!     "/subscriptions/0000/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet",
//! )?;
//! assert_eq!(id.virtual_network_name, "vnet");
//! ```

pub mod generic;
pub mod ids;
pub mod parser;
pub mod segment;

pub use generic::ArmResourceId;
pub use parser::{ParseMode, ParsedId};
pub use segment::{Schema, Segment, SegmentKind};

use crate::error::{MalformedIdentifier, MalformedKind};

/// An identifier shape with a typed field per value segment.
///
/// Implementations are generated by [`crate::resource_id!`].
pub trait ResourceId: Sized + std::fmt::Display {
    /// Human-readable kind of resource the identifier names.
    const RESOURCE_KIND: &'static str;

    fn schema() -> Schema;

    fn from_parsed(parsed: &ParsedId) -> Result<Self, MalformedIdentifier>;

    /// Value of the named value segment.
    fn segment_value(&self, segment: &str) -> Option<&str>;

    /// Parse an identifier supplied by an operator.
    fn parse(input: &str) -> Result<Self, MalformedIdentifier> {
        Self::from_parsed(&Self::schema().parse(input, ParseMode::Strict)?)
    }

    /// Parse an identifier returned by the remote API, tolerating re-cased
    /// literal segments. Never use this on operator input.
    fn parse_insensitively(input: &str) -> Result<Self, MalformedIdentifier> {
        Self::from_parsed(&Self::schema().parse(input, ParseMode::Insensitive)?)
    }

    /// Check that `input` is a well-formed identifier of this shape.
    fn validate(input: &str) -> Result<(), MalformedIdentifier> {
        Self::schema().parse(input, ParseMode::Strict).map(|_| ())
    }

    /// The canonical string form.
    fn id(&self) -> String {
        Self::schema().format(|segment| self.segment_value(segment))
    }

    /// Check that every value can survive a format and parse round trip:
    /// non-empty and free of `/`.
    fn check(&self) -> Result<(), MalformedIdentifier> {
        for segment in Self::schema().value_segments() {
            let value = self.segment_value(segment.name).unwrap_or_default();
            if value.is_empty() {
                return Err(MalformedIdentifier::new(
                    segment.name,
                    MalformedKind::Missing,
                    &self.id(),
                ));
            }
            if value.contains('/') {
                return Err(MalformedIdentifier::new(
                    segment.name,
                    MalformedKind::InvalidValue {
                        value: value.to_string(),
                    },
                    &self.id(),
                ));
            }
        }
        Ok(())
    }

    /// Resource type the identifier names, as it appears in the path
    /// (`virtualNetworks`): the last static literal of the schema.
    fn resource_type() -> &'static str {
        Self::schema()
            .segments()
            .iter()
            .rev()
            .filter(|segment| segment.kind == SegmentKind::Static)
            .find_map(|segment| segment.literal)
            .unwrap_or(Self::RESOURCE_KIND)
    }

    /// The innermost value segment, i.e. the name of the resource itself.
    fn name(&self) -> &str {
        Self::schema()
            .value_segments()
            .last()
            .and_then(|segment| self.segment_value(segment.name))
            .unwrap_or_default()
    }
}
