//! Error types associated with encoding to ASN.1 codecs.

use num_bigint::BigInt;
use snafu::Snafu;

use super::{Path, PathSegment};
use crate::types::constraints::Bounded;
use crate::Codec;

/// An error type for failed encoding for every encoder.
///
/// `kind` is boxed to keep the `Result` payload a couple of words wide.
/// `path` names the node the failure occurred at, from the root type down.
#[derive(Debug)]
pub struct EncodeError {
    /// The kind of encoding error received.
    pub kind: Box<EncodeErrorKind>,
    /// The codec that returned the error.
    pub codec: Codec,
    /// The path from the root type to the failing node.
    pub path: Path,
}

impl core::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.codec, self.kind)?;
        if !self.path.is_empty() {
            write!(f, " (at {})", self.path)?;
        }
        Ok(())
    }
}

impl std::error::Error for EncodeError {}

impl EncodeError {
    /// A helper to construct an `EncodeError` from the given `kind` and
    /// `codec`, with an empty path.
    #[must_use]
    pub fn from_kind(kind: EncodeErrorKind, codec: Codec) -> Self {
        Self {
            kind: Box::new(kind),
            codec,
            path: Path::default(),
        }
    }

    /// Prepends `segment` to the error path; called as recursion unwinds.
    #[must_use]
    pub fn at(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.push_front(segment.into());
        self
    }

    /// The value lies outside a closed value constraint.
    #[must_use]
    pub fn constraint_violation(value: BigInt, expected: Bounded<i128>, codec: Codec) -> Self {
        Self::from_kind(EncodeErrorKind::ConstraintViolation { value, expected }, codec)
    }

    /// The length of the data lies outside a closed size constraint.
    #[must_use]
    pub fn size_constraint_not_satisfied(
        size: usize,
        expected: Bounded<usize>,
        codec: Codec,
    ) -> Self {
        Self::from_kind(
            EncodeErrorKind::SizeConstraintNotSatisfied { size, expected },
            codec,
        )
    }

    /// A character is not part of the effective permitted alphabet.
    #[must_use]
    pub fn alphabet_constraint_not_satisfied(character: char, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::AlphabetConstraintNotSatisfied { character },
            codec,
        )
    }

    /// The selected variant is not an alternative of the choice.
    #[must_use]
    pub fn variant_not_in_choice(selector: &str, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::VariantNotInChoice {
                selector: selector.to_owned(),
            },
            codec,
        )
    }

    /// The value's shape does not match the type being encoded.
    #[must_use]
    pub fn shape_mismatch(expected: &str, found: &'static str, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::ShapeMismatch {
                expected: expected.to_owned(),
                found,
            },
            codec,
        )
    }

    /// A required member is missing from the value mapping.
    #[must_use]
    pub fn required_member_missing(member: &str, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::RequiredMemberMissing {
                member: member.to_owned(),
            },
            codec,
        )
    }

    /// The value mapping holds a member the type does not declare.
    #[must_use]
    pub fn unknown_member(member: &str, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::UnknownMember {
                member: member.to_owned(),
            },
            codec,
        )
    }

    /// The enumeration item name is not declared by the type.
    #[must_use]
    pub fn unknown_enum_item(item: &str, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::UnknownEnumItem {
                item: item.to_owned(),
            },
            codec,
        )
    }

    /// No type with the given name exists in the schema.
    #[must_use]
    pub fn unknown_type_name(name: &str, codec: Codec) -> Self {
        Self::from_kind(
            EncodeErrorKind::UnknownTypeName {
                name: name.to_owned(),
            },
            codec,
        )
    }

    /// The object identifier has fewer than two components or an
    /// out-of-range leading pair.
    #[must_use]
    pub fn invalid_object_identifier(oid: Vec<u32>, codec: Codec) -> Self {
        Self::from_kind(EncodeErrorKind::InvalidObjectIdentifier { oid }, codec)
    }

    #[must_use]
    pub fn custom(msg: impl Into<String>, codec: Codec) -> Self {
        Self::from_kind(EncodeErrorKind::Custom { msg: msg.into() }, codec)
    }
}

/// `EncodeError` kinds which are common for all codecs.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum EncodeErrorKind {
    /// The value lies outside the type's closed root constraint.
    #[snafu(display("value {value} violates constraint {expected}"))]
    ConstraintViolation {
        /// The offending value.
        value: BigInt,
        /// The effective root range.
        expected: Bounded<i128>,
    },
    /// The length of the data lies outside the constraint size range.
    #[snafu(display("size constraint not satisfied: expected {expected}, actual {size}"))]
    SizeConstraintNotSatisfied {
        size: usize,
        expected: Bounded<usize>,
    },
    /// A character is missing from the permitted alphabet.
    #[snafu(display("character {character:?} not in the permitted alphabet"))]
    AlphabetConstraintNotSatisfied { character: char },
    /// The selected variant is not an alternative of the choice.
    #[snafu(display("`{selector}` is not an alternative of the CHOICE"))]
    VariantNotInChoice { selector: String },
    /// The value's shape does not fit the type.
    #[snafu(display("expected a {expected} value, found {found}"))]
    ShapeMismatch {
        expected: String,
        found: &'static str,
    },
    /// A mandatory member is absent from the value mapping.
    #[snafu(display("required member `{member}` is missing"))]
    RequiredMemberMissing { member: String },
    /// The value mapping names a member the type does not declare.
    #[snafu(display("`{member}` is not a member of the type"))]
    UnknownMember { member: String },
    /// The enumeration item is not declared.
    #[snafu(display("`{item}` is not an item of the enumeration"))]
    UnknownEnumItem { item: String },
    /// The schema has no type with the requested name.
    #[snafu(display("no type named `{name}` in the schema"))]
    UnknownTypeName { name: String },
    /// `OBJECT IDENTIFIER` must have at least two components and a valid
    /// leading pair.
    #[snafu(display("invalid object identifier: {oid:?}"))]
    InvalidObjectIdentifier { oid: Vec<u32> },
    /// The length of the data is more than the platform can address.
    #[snafu(display("length exceeds platform maximum size"))]
    LengthExceedsPlatformSize,
    #[snafu(display("{msg}"))]
    Custom { msg: String },
}
