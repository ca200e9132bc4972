//! Error types associated with decoding from ASN.1 codecs.

use num_bigint::BigInt;
use snafu::Snafu;

use super::{Path, PathSegment};
use crate::types::constraints::Bounded;
use crate::types::Tag;
use crate::Codec;

/// An error type for failed decoding for every decoder.
///
/// `kind` is boxed to keep the `Result` payload a couple of words wide.
/// `path` names the node the failure occurred at, from the root type down.
/// Decoding is bounded by the input: exhaustion always surfaces as
/// [`DecodeErrorKind::OutOfBuffer`], never as a read past the input.
#[derive(Debug)]
pub struct DecodeError {
    /// The kind of decoding error received.
    pub kind: Box<DecodeErrorKind>,
    /// The codec that returned the error.
    pub codec: Codec,
    /// The path from the root type to the failing node.
    pub path: Path,
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.codec, self.kind)?;
        if !self.path.is_empty() {
            write!(f, " (at {})", self.path)?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeError {}

impl DecodeError {
    /// A helper to construct a `DecodeError` from the given `kind` and
    /// `codec`, with an empty path.
    #[must_use]
    pub fn from_kind(kind: DecodeErrorKind, codec: Codec) -> Self {
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

    /// Maps a `nom` error from the TLV parser into a `DecodeError`.
    #[must_use]
    pub(crate) fn map_nom_err<T: core::fmt::Debug>(error: nom::Err<T>, codec: Codec) -> Self {
        match error {
            nom::Err::Incomplete(needed) => Self::out_of_buffer(
                match needed {
                    nom::Needed::Size(size) => Some(size.get()),
                    nom::Needed::Unknown => None,
                },
                codec,
            ),
            err => Self::from_kind(
                DecodeErrorKind::Parser {
                    msg: format!("{err:?}"),
                },
                codec,
            ),
        }
    }

    /// The input ran out before the value was complete.
    #[must_use]
    pub fn out_of_buffer(needed: Option<usize>, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::OutOfBuffer { needed }, codec)
    }

    /// A tag other than the expected one was read.
    #[must_use]
    pub fn unexpected_tag(expected: Option<Tag>, found: Tag, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::UnexpectedTag { expected, found }, codec)
    }

    /// The decoded value lies outside a closed value constraint.
    #[must_use]
    pub fn constraint_violation(value: BigInt, expected: Bounded<i128>, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::ConstraintViolation { value, expected }, codec)
    }

    /// The decoded length lies outside a closed size constraint.
    #[must_use]
    pub fn size_constraint_not_satisfied(
        size: usize,
        expected: Bounded<usize>,
        codec: Codec,
    ) -> Self {
        Self::from_kind(
            DecodeErrorKind::SizeConstraintNotSatisfied { size, expected },
            codec,
        )
    }

    /// A length field larger than the remaining input.
    #[must_use]
    pub fn exceeds_remaining(length: usize, remaining: usize, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::ExceedsRemaining { length, remaining }, codec)
    }

    /// The recursion depth budget was exhausted.
    #[must_use]
    pub fn nesting_limit_exceeded(codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::NestingLimitExceeded, codec)
    }

    #[must_use]
    pub fn bad_utf8(codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::BadUtf8, codec)
    }

    #[must_use]
    pub fn bad_time(text: String, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::BadTime { text }, codec)
    }

    #[must_use]
    pub fn invalid_bit_string(unused: u8, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::InvalidBitString { unused }, codec)
    }

    #[must_use]
    pub fn choice_index_exceeds_variants(index: usize, variants: usize, codec: Codec) -> Self {
        Self::from_kind(
            DecodeErrorKind::ChoiceIndexExceedsVariants { index, variants },
            codec,
        )
    }

    #[must_use]
    pub fn enumeration_index(index: i64, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::EnumerationIndex { index }, codec)
    }

    /// Bytes remained after a complete top-level decode.
    #[must_use]
    pub fn trailing_data(remaining: usize, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::TrailingData { remaining }, codec)
    }

    #[must_use]
    pub fn unknown_type_name(name: &str, codec: Codec) -> Self {
        Self::from_kind(
            DecodeErrorKind::UnknownTypeName {
                name: name.to_owned(),
            },
            codec,
        )
    }

    #[must_use]
    pub fn parser_fail(msg: impl Into<String>, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::Parser { msg: msg.into() }, codec)
    }

    #[must_use]
    pub fn custom(msg: impl Into<String>, codec: Codec) -> Self {
        Self::from_kind(DecodeErrorKind::Custom { msg: msg.into() }, codec)
    }
}

/// `DecodeError` kinds which are common for all codecs.
#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The input ended before the value was complete.
    #[snafu(display("input exhausted{}", match needed {
        Some(n) => format!(", {n} more units needed"),
        None => String::new(),
    }))]
    OutOfBuffer {
        /// How many more bits/octets the decoder wanted, when known.
        needed: Option<usize>,
    },
    /// A tag other than the expected one was read.
    #[snafu(display("unexpected tag: expected {}, found {found}", match expected {
        Some(tag) => tag.to_string(),
        None => "none of the permitted tags".to_owned(),
    }))]
    UnexpectedTag {
        expected: Option<Tag>,
        found: Tag,
    },
    /// Indefinite length where the rules forbid it.
    #[snafu(display("indefinite length is not allowed under these rules"))]
    IndefiniteLengthNotAllowed,
    /// A long-form length that fits the short form, or with leading zero
    /// octets, under DER/CER/OER.
    #[snafu(display("length is not encoded minimally"))]
    NonMinimalLength,
    /// A length field exceeds the remaining input; failed before allocating.
    #[snafu(display("length {length} exceeds the {remaining} remaining octets"))]
    ExceedsRemaining { length: usize, remaining: usize },
    /// The decoded value lies outside the type's closed root constraint.
    #[snafu(display("value {value} violates constraint {expected}"))]
    ConstraintViolation {
        value: BigInt,
        expected: Bounded<i128>,
    },
    /// The decoded length lies outside the constraint size range.
    #[snafu(display("size constraint not satisfied: expected {expected}, actual {size}"))]
    SizeConstraintNotSatisfied {
        size: usize,
        expected: Bounded<usize>,
    },
    /// A `UTF8String`'s contents were not valid UTF-8.
    #[snafu(display("invalid UTF-8 in character string"))]
    BadUtf8,
    /// A time value did not match any accepted X.690 form.
    #[snafu(display("invalid time value {text:?}"))]
    BadTime { text: String },
    /// A `BIT STRING` with more than 7 unused bits, or unused bits in an
    /// empty string.
    #[snafu(display("invalid BIT STRING: {unused} unused bits"))]
    InvalidBitString { unused: u8 },
    /// DER: a `BOOLEAN` content octet other than `00`/`FF`.
    #[snafu(display("BOOLEAN contents must be 00 or FF, found {found:02X}"))]
    InvalidBool { found: u8 },
    /// DER: `SET` members out of canonical tag order.
    #[snafu(display("SET members are not in canonical order"))]
    FieldOrder,
    /// DER: trailing unused bits of a `BIT STRING` were not zero.
    #[snafu(display("unused BIT STRING bits are not zero"))]
    UnusedBitsNotZero,
    /// A `CHOICE` index beyond the number of alternatives.
    #[snafu(display("CHOICE index {index} exceeds the {variants} alternatives"))]
    ChoiceIndexExceedsVariants { index: usize, variants: usize },
    /// An `ENUMERATED` value with no declared item.
    #[snafu(display("no enumeration item with value {index}"))]
    EnumerationIndex { index: i64 },
    /// A complete value was decoded but input remains.
    #[snafu(display("{remaining} trailing octets after a complete value"))]
    TrailingData { remaining: usize },
    /// The recursion depth budget was exhausted.
    #[snafu(display("nesting limit exceeded"))]
    NestingLimitExceeded,
    /// A fragmented length determinant with an invalid multiplier.
    #[snafu(display("invalid length fragment"))]
    InvalidLengthFragment,
    /// An object identifier body that does not parse.
    #[snafu(display("invalid object identifier contents"))]
    InvalidObjectIdentifier,
    /// A `REAL` body that does not parse.
    #[snafu(display("invalid REAL contents"))]
    InvalidReal,
    /// The schema has no type with the requested name.
    #[snafu(display("no type named `{name}` in the schema"))]
    UnknownTypeName { name: String },
    /// A low-level parse failure with no more precise kind.
    #[snafu(display("parser failed: {msg}"))]
    Parser { msg: String },
    #[snafu(display("{msg}"))]
    Custom { msg: String },
}
