//! # Decoding BER.

mod parser;

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::identifier::Identifier;
use super::rules::EncodingRules;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{
    strings, BitString, Member, StringKind, Tag, TimeKind, TypeIndex, TypeKind, TypeModel,
    TypeNode,
};
use crate::value::Value;

type Result<T, E = DecodeError> = core::result::Result<T, E>;

const EOC: &[u8] = &[0, 0];

/// Options for configuring the [`Decoder`].
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    pub(crate) encoding_rules: EncodingRules,
    // limit decoding to prevent stack overflow from deep or cyclic schemas
    remaining_depth: usize,
}

impl DecoderOptions {
    pub const fn ber() -> Self {
        Self {
            encoding_rules: EncodingRules::Ber,
            remaining_depth: 128,
        }
    }

    pub const fn cer() -> Self {
        Self {
            encoding_rules: EncodingRules::Cer,
            remaining_depth: 128,
        }
    }

    pub const fn der() -> Self {
        Self {
            encoding_rules: EncodingRules::Der,
            remaining_depth: 128,
        }
    }
}

/// The contents of one TLV: a definite slice, or the start of an
/// indefinite-length body.
enum Contents<'input> {
    Definite {
        contents: &'input [u8],
        rest: &'input [u8],
    },
    Indefinite {
        rest: &'input [u8],
    },
}

/// A BER/CER/DER decoder driven by a resolved [`TypeModel`].
pub struct Decoder {
    config: DecoderOptions,
}

impl Decoder {
    pub fn new(config: DecoderOptions) -> Self {
        Self { config }
    }

    fn codec(&self) -> crate::Codec {
        self.config.encoding_rules.codec()
    }

    /// Decodes one complete value of the type at `index`, returning the
    /// unconsumed remainder.
    pub fn decode_type<'input>(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        input: &'input [u8],
    ) -> Result<(Value, &'input [u8])> {
        self.decode_node(model, index, input, self.config.remaining_depth)
    }

    fn decode_node<'input>(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        input: &'input [u8],
        depth: usize,
    ) -> Result<(Value, &'input [u8])> {
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::nesting_limit_exceeded(self.codec()));
        };
        let node = model.node(index);
        self.decode_wrapped(model, index, node.wrapper_tags(), input, depth)
    }

    /// Unwraps the explicit wrapper tags, outermost first, then decodes the
    /// node's own encoding.
    fn decode_wrapped<'input>(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        wrappers: &[Tag],
        input: &'input [u8],
        depth: usize,
    ) -> Result<(Value, &'input [u8])> {
        let Some((&outer, inner_wrappers)) = wrappers.split_first() else {
            return self.decode_body(model, index, input, depth);
        };

        let (identifier, contents) = self.parse_header(input)?;
        if identifier.tag != outer {
            return Err(DecodeError::unexpected_tag(
                Some(outer),
                identifier.tag,
                self.codec(),
            ));
        }
        if identifier.is_primitive() {
            return Err(DecodeError::parser_fail(
                "explicitly tagged values must use constructed encoding",
                self.codec(),
            ));
        }

        let (contents, rest) = match contents {
            Contents::Definite { contents, rest } => (contents, rest),
            Contents::Indefinite { rest } => self.take_until_eoc(rest)?,
        };
        let (value, leftover) =
            self.decode_wrapped(model, index, inner_wrappers, contents, depth)?;
        if !leftover.is_empty() {
            return Err(DecodeError::trailing_data(leftover.len(), self.codec()));
        }
        Ok((value, rest))
    }

    fn decode_body<'input>(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        input: &'input [u8],
        depth: usize,
    ) -> Result<(Value, &'input [u8])> {
        let node = model.node(index);
        match &node.kind {
            TypeKind::Choice(choice) => {
                let (_, identifier) = parser::parse_identifier_octet(input)
                    .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
                for variant in &choice.variants {
                    let tags = model.leading_tags(variant.ty);
                    if tags.is_empty() || tags.contains(&identifier.tag) {
                        let (value, rest) = self
                            .decode_node(model, variant.ty, input, depth)
                            .map_err(|e| e.at(variant.name.as_str()))?;
                        return Ok((
                            Value::Choice(variant.name.clone(), Box::new(value)),
                            rest,
                        ));
                    }
                }
                Err(DecodeError::unexpected_tag(
                    None,
                    identifier.tag,
                    self.codec(),
                ))
            }
            TypeKind::Any => {
                let (span, rest) = self.take_tlv(input)?;
                Ok((Value::Any(span.to_vec()), rest))
            }
            _ => {
                let expected = node.own_tag().expect("non-open nodes carry a tag");
                let (identifier, contents) = self.parse_header(input)?;
                if identifier.tag != expected {
                    return Err(DecodeError::unexpected_tag(
                        Some(expected),
                        identifier.tag,
                        self.codec(),
                    ));
                }
                let (contents, rest) = match contents {
                    Contents::Definite { contents, rest } => (contents, rest),
                    Contents::Indefinite { rest } => self.take_until_eoc(rest)?,
                };
                let value = self.decode_contents(model, node, identifier, contents, depth)?;
                Ok((value, rest))
            }
        }
    }

    fn decode_contents(
        &self,
        model: &TypeModel,
        node: &TypeNode,
        identifier: Identifier,
        contents: &[u8],
        depth: usize,
    ) -> Result<Value> {
        match &node.kind {
            TypeKind::Boolean => {
                let [byte] = contents else {
                    return Err(DecodeError::parser_fail(
                        "BOOLEAN contents must be a single octet",
                        self.codec(),
                    ));
                };
                if self.config.encoding_rules.is_canonical() && !matches!(*byte, 0x00 | 0xFF) {
                    return Err(DecodeError::from_kind(
                        DecodeErrorKind::InvalidBool { found: *byte },
                        self.codec(),
                    ));
                }
                Ok(Value::Boolean(*byte != 0))
            }
            TypeKind::Integer(_) | TypeKind::Enumerated(_) => {
                if contents.is_empty() {
                    return Err(DecodeError::parser_fail(
                        "INTEGER contents cannot be empty",
                        self.codec(),
                    ));
                }
                if self.config.encoding_rules.is_canonical() && contents.len() > 1 {
                    let redundant = (contents[0] == 0x00 && contents[1] < 0x80)
                        || (contents[0] == 0xFF && contents[1] >= 0x80);
                    if redundant {
                        return Err(DecodeError::parser_fail(
                            "INTEGER contents are not minimal",
                            self.codec(),
                        ));
                    }
                }
                let number = BigInt::from_signed_bytes_be(contents);
                if let TypeKind::Enumerated(enumeration) = &node.kind {
                    let index = number.to_i64().ok_or_else(|| {
                        DecodeError::enumeration_index(i64::MAX, self.codec())
                    })?;
                    return match enumeration.name_of(index) {
                        Some(name) => Ok(Value::Enumerated(name.to_owned())),
                        None if enumeration.extensible => Ok(Value::Integer(number)),
                        None => Err(DecodeError::enumeration_index(index, self.codec())),
                    };
                }
                self.check_value_constraint(node, &number)?;
                Ok(Value::Integer(number))
            }
            TypeKind::Real => parse_real_contents(contents)
                .map(Value::Real)
                .ok_or_else(|| {
                    DecodeError::from_kind(DecodeErrorKind::InvalidReal, self.codec())
                }),
            TypeKind::Null => {
                if !contents.is_empty() {
                    return Err(DecodeError::parser_fail(
                        "NULL contents must be empty",
                        self.codec(),
                    ));
                }
                Ok(Value::Null)
            }
            TypeKind::ObjectIdentifier => parse_oid_contents(contents)
                .map(Value::ObjectIdentifier)
                .ok_or_else(|| {
                    DecodeError::from_kind(DecodeErrorKind::InvalidObjectIdentifier, self.codec())
                }),
            TypeKind::RelativeOid => parse_relative_oid_contents(contents)
                .map(Value::ObjectIdentifier)
                .ok_or_else(|| {
                    DecodeError::from_kind(DecodeErrorKind::InvalidObjectIdentifier, self.codec())
                }),
            TypeKind::OctetString => {
                let octets = self.string_octets(identifier, contents, Tag::OCTET_STRING, depth)?;
                self.check_size_constraint(node, octets.len())?;
                Ok(Value::OctetString(octets))
            }
            TypeKind::BitString(_) => {
                let (payload, unused) = self.bit_string_payload(identifier, contents, depth)?;
                if unused > 7 || (payload.is_empty() && unused != 0) {
                    return Err(DecodeError::invalid_bit_string(unused, self.codec()));
                }
                let mut bits = BitString::from_vec(payload);
                let length = bits.len() - usize::from(unused);
                if self.config.encoding_rules.is_canonical()
                    && bits[length..].iter().by_vals().any(|bit| bit)
                {
                    return Err(DecodeError::from_kind(
                        DecodeErrorKind::UnusedBitsNotZero,
                        self.codec(),
                    ));
                }
                bits.truncate(length);
                self.check_size_constraint(node, bits.len())?;
                Ok(Value::BitString(bits))
            }
            TypeKind::CharacterString(kind) => {
                let octets = self.string_octets(identifier, contents, kind.tag(), depth)?;
                let text = strings::from_octets(*kind, &octets)
                    .ok_or_else(|| DecodeError::bad_utf8(self.codec()))?;
                self.check_size_constraint(node, text.chars().count())?;
                Ok(Value::Text(text))
            }
            TypeKind::ObjectDescriptor => {
                let octets =
                    self.string_octets(identifier, contents, Tag::OBJECT_DESCRIPTOR, depth)?;
                let text = strings::from_octets(StringKind::Graphic, &octets)
                    .ok_or_else(|| DecodeError::bad_utf8(self.codec()))?;
                Ok(Value::Text(text))
            }
            TypeKind::Time(kind) => {
                let text = core::str::from_utf8(contents)
                    .map_err(|_| DecodeError::bad_utf8(self.codec()))?;
                self.parse_time(*kind, text)
            }
            TypeKind::Sequence(_) => {
                self.expect_constructed(identifier)?;
                self.decode_sequence_members(model, node, contents, depth)
            }
            TypeKind::Set(_) => {
                self.expect_constructed(identifier)?;
                self.decode_set_members(model, node, contents, depth)
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                self.expect_constructed(identifier)?;
                let mut elements = Vec::new();
                let mut stream = contents;
                while !stream.is_empty() {
                    let (value, rest) = self
                        .decode_node(model, *element, stream, depth)
                        .map_err(|e| e.at(elements.len()))?;
                    elements.push(value);
                    stream = rest;
                }
                self.check_size_constraint(node, elements.len())?;
                Ok(Value::List(elements))
            }
            TypeKind::Choice(_) | TypeKind::Any => unreachable!("handled in decode_body"),
        }
    }

    fn expect_constructed(&self, identifier: Identifier) -> Result<()> {
        if identifier.is_primitive() {
            return Err(DecodeError::parser_fail(
                "expected a constructed encoding",
                self.codec(),
            ));
        }
        Ok(())
    }

    fn decode_sequence_members(
        &self,
        model: &TypeModel,
        node: &TypeNode,
        contents: &[u8],
        depth: usize,
    ) -> Result<Value> {
        let TypeKind::Sequence(constructed) = &node.kind else {
            unreachable!()
        };
        let mut stream = contents;
        let mut members = BTreeMap::new();

        for member in &constructed.members {
            if self.member_matches(model, member, stream)? {
                let (value, rest) = self
                    .decode_node(model, member.ty, stream, depth)
                    .map_err(|e| e.at(member.name.as_str()))?;
                members.insert(member.name.clone(), value);
                stream = rest;
            } else if let Some(default) = &member.default {
                members.insert(member.name.clone(), default.clone());
            } else if member.optional || member.extension_group.is_some() {
                // absent
            } else if stream.is_empty() {
                return Err(DecodeError::out_of_buffer(None, self.codec())
                    .at(member.name.as_str()));
            } else {
                let (_, identifier) = parser::parse_identifier_octet(stream)
                    .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
                let expected = model.leading_tags(member.ty).first().copied();
                return Err(
                    DecodeError::unexpected_tag(expected, identifier.tag, self.codec())
                        .at(member.name.as_str()),
                );
            }
        }

        while !stream.is_empty() {
            if !constructed.extensible {
                let (_, identifier) = parser::parse_identifier_octet(stream)
                    .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
                return Err(DecodeError::unexpected_tag(
                    None,
                    identifier.tag,
                    self.codec(),
                ));
            }
            // unknown extension additions are skippable
            let (_, rest) = self.take_tlv(stream)?;
            stream = rest;
        }

        Ok(Value::Sequence(members))
    }

    fn decode_set_members(
        &self,
        model: &TypeModel,
        node: &TypeNode,
        contents: &[u8],
        depth: usize,
    ) -> Result<Value> {
        let TypeKind::Set(constructed) = &node.kind else {
            unreachable!()
        };
        let mut stream = contents;
        let mut members = BTreeMap::new();
        let mut pending: Vec<&Member> = constructed.members.iter().collect();
        let mut previous_tag: Option<Tag> = None;

        while !stream.is_empty() {
            let (_, identifier) = parser::parse_identifier_octet(stream)
                .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
            if self.config.encoding_rules.is_canonical() {
                if let Some(previous) = previous_tag {
                    if identifier.tag < previous {
                        return Err(DecodeError::from_kind(
                            DecodeErrorKind::FieldOrder,
                            self.codec(),
                        ));
                    }
                }
                previous_tag = Some(identifier.tag);
            }

            let position = pending.iter().position(|member| {
                let tags = model.leading_tags(member.ty);
                tags.is_empty() || tags.contains(&identifier.tag)
            });
            match position {
                Some(position) => {
                    let member = pending.remove(position);
                    let (value, rest) = self
                        .decode_node(model, member.ty, stream, depth)
                        .map_err(|e| e.at(member.name.as_str()))?;
                    members.insert(member.name.clone(), value);
                    stream = rest;
                }
                None if constructed.extensible => {
                    let (_, rest) = self.take_tlv(stream)?;
                    stream = rest;
                }
                None => {
                    return Err(DecodeError::unexpected_tag(
                        None,
                        identifier.tag,
                        self.codec(),
                    ))
                }
            }
        }

        for member in pending {
            if let Some(default) = &member.default {
                members.insert(member.name.clone(), default.clone());
            } else if !member.optional && member.extension_group.is_none() {
                return Err(DecodeError::parser_fail(
                    format!("missing mandatory member `{}`", member.name),
                    self.codec(),
                ));
            }
        }

        Ok(Value::Sequence(members))
    }

    fn member_matches(&self, model: &TypeModel, member: &Member, stream: &[u8]) -> Result<bool> {
        if stream.is_empty() {
            return Ok(false);
        }
        let tags = model.leading_tags(member.ty);
        if tags.is_empty() {
            // an ANY member matches whatever comes next
            return Ok(true);
        }
        let (_, identifier) = parser::parse_identifier_octet(stream)
            .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
        Ok(tags.contains(&identifier.tag))
    }

    /// Gathers the octets of a possibly constructed string encoding.
    fn string_octets(
        &self,
        identifier: Identifier,
        contents: &[u8],
        nested_tag: Tag,
        depth: usize,
    ) -> Result<Vec<u8>> {
        if identifier.is_primitive() {
            return Ok(contents.to_vec());
        }
        if !self.config.encoding_rules.allows_constructed_strings() {
            return Err(DecodeError::parser_fail(
                "constructed strings are not permitted under these rules",
                self.codec(),
            ));
        }
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::nesting_limit_exceeded(self.codec()));
        };

        let mut octets = Vec::new();
        let mut stream = contents;
        while !stream.is_empty() {
            let (identifier, chunk) = self.parse_header(stream)?;
            if identifier.tag != nested_tag {
                return Err(DecodeError::unexpected_tag(
                    Some(nested_tag),
                    identifier.tag,
                    self.codec(),
                ));
            }
            let (chunk_contents, rest) = match chunk {
                Contents::Definite { contents, rest } => (contents, rest),
                Contents::Indefinite { rest } => self.take_until_eoc(rest)?,
            };
            octets.extend(self.string_octets(identifier, chunk_contents, nested_tag, depth)?);
            stream = rest;
        }
        Ok(octets)
    }

    /// The payload and unused-bit count of a possibly constructed
    /// `BIT STRING`. Only the final chunk may carry unused bits.
    fn bit_string_payload(
        &self,
        identifier: Identifier,
        contents: &[u8],
        depth: usize,
    ) -> Result<(Vec<u8>, u8)> {
        if identifier.is_primitive() {
            let Some((&unused, payload)) = contents.split_first() else {
                return Err(DecodeError::invalid_bit_string(0, self.codec()));
            };
            return Ok((payload.to_vec(), unused));
        }
        if !self.config.encoding_rules.allows_constructed_strings() {
            return Err(DecodeError::parser_fail(
                "constructed strings are not permitted under these rules",
                self.codec(),
            ));
        }
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::nesting_limit_exceeded(self.codec()));
        };

        let mut payload = Vec::new();
        let mut unused = 0u8;
        let mut stream = contents;
        while !stream.is_empty() {
            if unused != 0 {
                return Err(DecodeError::invalid_bit_string(unused, self.codec()));
            }
            let (identifier, chunk) = self.parse_header(stream)?;
            if identifier.tag != Tag::BIT_STRING {
                return Err(DecodeError::unexpected_tag(
                    Some(Tag::BIT_STRING),
                    identifier.tag,
                    self.codec(),
                ));
            }
            let (chunk_contents, rest) = match chunk {
                Contents::Definite { contents, rest } => (contents, rest),
                Contents::Indefinite { rest } => self.take_until_eoc(rest)?,
            };
            let (chunk_payload, chunk_unused) =
                self.bit_string_payload(identifier, chunk_contents, depth)?;
            payload.extend(chunk_payload);
            unused = chunk_unused;
            stream = rest;
        }
        Ok((payload, unused))
    }

    fn parse_time(&self, kind: TimeKind, text: &str) -> Result<Value> {
        use crate::types::date;
        let bad = || DecodeError::bad_time(text.to_owned(), self.codec());
        match kind {
            TimeKind::UtcTime => date::parse_utc_time(text)
                .map(Value::UtcTime)
                .ok_or_else(bad),
            TimeKind::GeneralizedTime => date::parse_generalized_time(text)
                .map(Value::GeneralizedTime)
                .ok_or_else(bad),
            TimeKind::Date => date::parse_date(text).map(Value::Date).ok_or_else(bad),
            TimeKind::TimeOfDay => date::parse_time_of_day(text)
                .map(Value::TimeOfDay)
                .ok_or_else(bad),
            TimeKind::DateTime => date::parse_date_time(text)
                .map(Value::DateTime)
                .ok_or_else(bad),
        }
    }

    fn check_value_constraint(&self, node: &TypeNode, value: &BigInt) -> Result<()> {
        if let Some(constraint) = node.constraints.value() {
            if !constraint.extensible && !constraint.constraint.contains(value) {
                return Err(DecodeError::constraint_violation(
                    value.clone(),
                    constraint.constraint.0,
                    self.codec(),
                ));
            }
        }
        Ok(())
    }

    fn check_size_constraint(&self, node: &TypeNode, size: usize) -> Result<()> {
        if let Some(constraint) = node.constraints.size() {
            if !constraint.extensible && !constraint.constraint.contains(&size) {
                return Err(DecodeError::size_constraint_not_satisfied(
                    size,
                    constraint.constraint.0,
                    self.codec(),
                ));
            }
        }
        Ok(())
    }

    /// Parses one identifier + length header, applying the rule set's
    /// indefinite/minimal-length restrictions.
    fn parse_header<'input>(&self, input: &'input [u8]) -> Result<(Identifier, Contents<'input>)> {
        let (rest, identifier) = parser::parse_identifier_octet(input)
            .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
        let (rest, length) =
            parser::parse_length(rest).map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;

        match length.value {
            None => {
                if identifier.is_primitive() || !self.config.encoding_rules.allows_indefinite() {
                    return Err(DecodeError::from_kind(
                        DecodeErrorKind::IndefiniteLengthNotAllowed,
                        self.codec(),
                    ));
                }
                Ok((identifier, Contents::Indefinite { rest }))
            }
            Some(count) => {
                if self.config.encoding_rules.requires_minimal_length() && !length.minimal {
                    return Err(DecodeError::from_kind(
                        DecodeErrorKind::NonMinimalLength,
                        self.codec(),
                    ));
                }
                if count > rest.len() {
                    return Err(DecodeError::out_of_buffer(
                        Some(count - rest.len()),
                        self.codec(),
                    ));
                }
                let (contents, rest) = rest.split_at(count);
                Ok((identifier, Contents::Definite { contents, rest }))
            }
        }
    }

    /// Scans one complete TLV (definite or indefinite) without decoding it.
    fn take_tlv<'input>(&self, input: &'input [u8]) -> Result<(&'input [u8], &'input [u8])> {
        let (after_header, _) = parser::parse_identifier_octet(input)
            .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;
        let (after_length, length) = parser::parse_length(after_header)
            .map_err(|e| DecodeError::map_nom_err(e, self.codec()))?;

        match length.value {
            Some(length) => {
                if length > after_length.len() {
                    return Err(DecodeError::out_of_buffer(
                        Some(length - after_length.len()),
                        self.codec(),
                    ));
                }
                let consumed = input.len() - after_length.len() + length;
                Ok((&input[..consumed], &after_length[length..]))
            }
            None => {
                let (_, rest) = self.take_until_eoc(after_length)?;
                let consumed = input.len() - rest.len();
                Ok((&input[..consumed], rest))
            }
        }
    }

    /// Scans nested TLVs until the matching end-of-contents marker, and
    /// returns the enclosed span plus the input following the marker.
    fn take_until_eoc<'input>(
        &self,
        input: &'input [u8],
    ) -> Result<(&'input [u8], &'input [u8])> {
        let mut cursor = input;
        loop {
            if cursor.starts_with(EOC) {
                let contents = &input[..input.len() - cursor.len()];
                return Ok((contents, &cursor[EOC.len()..]));
            }
            if cursor.is_empty() {
                return Err(DecodeError::out_of_buffer(Some(EOC.len()), self.codec()));
            }
            let (_, rest) = self.take_tlv(cursor)?;
            cursor = rest;
        }
    }
}

/// Parses the contents octets of a `RELATIVE-OID`.
pub(crate) fn parse_relative_oid_contents(contents: &[u8]) -> Option<Vec<u32>> {
    let mut arcs = Vec::new();
    let mut stream = contents;
    while !stream.is_empty() {
        let (rest, arc) = parser::parse_encoded_number(stream).ok()?;
        arcs.push(arc.to_u32()?);
        stream = rest;
    }
    Some(arcs)
}

/// Parses the contents octets of an `OBJECT IDENTIFIER`.
pub(crate) fn parse_oid_contents(contents: &[u8]) -> Option<Vec<u32>> {
    if contents.is_empty() {
        return None;
    }
    let mut arcs = Vec::new();
    let mut stream = contents;
    while !stream.is_empty() {
        let (rest, arc) = parser::parse_encoded_number(stream).ok()?;
        let arc = arc.to_u32()?;
        if arcs.is_empty() {
            let first = (arc / 40).min(2);
            let second = arc - first * 40;
            arcs.push(first);
            arcs.push(second);
        } else {
            arcs.push(arc);
        }
        stream = rest;
    }
    Some(arcs)
}

/// Parses the contents octets of a `REAL` (X.690 §8.5): binary forms with
/// bases 2/8/16, the special values, and the ISO 6093 decimal forms.
pub(crate) fn parse_real_contents(contents: &[u8]) -> Option<f64> {
    let Some((&first, rest)) = contents.split_first() else {
        return Some(0.0);
    };
    match first {
        0x40 => return Some(f64::INFINITY),
        0x41 => return Some(f64::NEG_INFINITY),
        0x42 => return Some(f64::NAN),
        0x43 => return Some(-0.0),
        _ => {}
    }

    if first & 0x80 != 0 {
        let sign = if first & 0x40 != 0 { -1.0 } else { 1.0 };
        let base: f64 = match (first >> 4) & 0x03 {
            0 => 2.0,
            1 => 8.0,
            2 => 16.0,
            _ => return None,
        };
        let scale = ((first >> 2) & 0x03) as i32;
        let (exponent_octets, mantissa_octets) = match first & 0x03 {
            3 => {
                let (&count, rest) = rest.split_first()?;
                if rest.len() < count as usize {
                    return None;
                }
                rest.split_at(count as usize)
            }
            count => {
                let count = count as usize + 1;
                if rest.len() < count {
                    return None;
                }
                rest.split_at(count)
            }
        };
        if mantissa_octets.is_empty() {
            return None;
        }
        let exponent = BigInt::from_signed_bytes_be(exponent_octets).to_i32()?;
        let mantissa =
            BigInt::from_bytes_be(num_bigint::Sign::Plus, mantissa_octets).to_f64()?;
        return Some(sign * mantissa * 2f64.powi(scale) * base.powi(exponent));
    }

    if first & 0xC0 == 0 {
        // ISO 6093 decimal form
        let text = core::str::from_utf8(rest).ok()?;
        let text = text.trim().replace(',', ".");
        return text.parse().ok();
    }

    None
}
