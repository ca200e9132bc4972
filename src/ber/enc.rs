//! # Encoding BER.

use std::collections::VecDeque;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::identifier::Identifier;
use super::rules::EncodingRules;
use crate::bits::{bits_to_bytes, octet_string_ascending};
use crate::error::EncodeError;
use crate::num::signed_bytes_be;
use crate::types::{
    date, strings, BitStr, Member, StringKind, Tag, TimeKind, TypeIndex, TypeKind, TypeModel,
    TypeNode,
};
use crate::value::Value;

const START_OF_CONTENTS: u8 = 0x80;
const END_OF_CONTENTS: &[u8] = &[0, 0];

pub(crate) const MAX_OID_FIRST_OCTET: u32 = 2;
pub(crate) const MAX_OID_SECOND_OCTET: u32 = 39;

type Result<T, E = EncodeError> = core::result::Result<T, E>;

/// Options for configuring the [`Encoder`].
#[derive(Debug, Clone, Copy)]
pub struct EncoderOptions {
    pub(crate) encoding_rules: EncodingRules,
}

impl EncoderOptions {
    pub const fn ber() -> Self {
        Self {
            encoding_rules: EncodingRules::Ber,
        }
    }

    pub const fn cer() -> Self {
        Self {
            encoding_rules: EncodingRules::Cer,
        }
    }

    pub const fn der() -> Self {
        Self {
            encoding_rules: EncodingRules::Der,
        }
    }
}

/// A BER and variants encoder. Capable of encoding to BER, CER, and DER,
/// driven by a resolved [`TypeModel`].
pub struct Encoder {
    config: EncoderOptions,
}

impl Encoder {
    /// Creates a new instance from the given `config`.
    pub fn new(config: EncoderOptions) -> Self {
        Self { config }
    }

    fn codec(&self) -> crate::Codec {
        self.config.encoding_rules.codec()
    }

    /// Encodes one complete value of the type at `index`.
    pub fn encode_type(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        value: &Value,
    ) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.encode_node(model, index, value, &mut output)?;
        Ok(output)
    }

    fn encode_node(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        value: &Value,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        let node = model.node(index);
        match &node.kind {
            TypeKind::Choice(choice) => {
                let (selector, payload) = match value {
                    Value::Choice(selector, payload) => (selector.as_str(), payload.as_ref()),
                    other => {
                        return Err(EncodeError::shape_mismatch(
                            "CHOICE",
                            other.shape(),
                            self.codec(),
                        ))
                    }
                };
                let variant = choice
                    .variant(selector)
                    .ok_or_else(|| EncodeError::variant_not_in_choice(selector, self.codec()))?;
                let mut inner = Vec::new();
                self.encode_node(model, variant.ty, payload, &mut inner)
                    .map_err(|e| e.at(selector))?;
                self.wrap(&node.tags, inner, output);
                Ok(())
            }
            TypeKind::Any => {
                let Value::Any(bytes) = value else {
                    return Err(EncodeError::shape_mismatch(
                        "ANY",
                        value.shape(),
                        self.codec(),
                    ));
                };
                self.wrap(&node.tags, bytes.clone(), output);
                Ok(())
            }
            _ => {
                let tag = node.own_tag().expect("non-open nodes carry a tag");
                let mut body = Vec::new();
                self.encode_body(model, node, tag, value, &mut body)?;
                self.wrap(node.wrapper_tags(), body, output);
                Ok(())
            }
        }
    }

    fn encode_body(
        &self,
        model: &TypeModel,
        node: &TypeNode,
        tag: Tag,
        value: &Value,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        match &node.kind {
            TypeKind::Boolean => {
                let Some(value) = value.as_bool() else {
                    return Err(self.shape(node, value));
                };
                self.encode_primitive(tag, &[if value { 0xFF } else { 0x00 }], output);
                Ok(())
            }
            TypeKind::Integer(_) => {
                let Some(value) = value.as_integer() else {
                    return Err(self.shape(node, value));
                };
                self.check_value_constraint(node, value)?;
                self.encode_primitive(tag, &signed_bytes_be(value), output);
                Ok(())
            }
            TypeKind::Enumerated(enumeration) => {
                let number = match value {
                    Value::Enumerated(name) => BigInt::from(
                        enumeration.value_of(name).ok_or_else(|| {
                            EncodeError::unknown_enum_item(name, self.codec())
                        })?,
                    ),
                    Value::Integer(number) => number.clone(),
                    other => {
                        return Err(EncodeError::shape_mismatch(
                            "ENUMERATED",
                            other.shape(),
                            self.codec(),
                        ))
                    }
                };
                self.encode_primitive(tag, &signed_bytes_be(&number), output);
                Ok(())
            }
            TypeKind::Real => {
                let number = match value {
                    Value::Real(number) => *number,
                    Value::Integer(number) => number
                        .to_f64()
                        .ok_or_else(|| self.shape(node, value))?,
                    _ => return Err(self.shape(node, value)),
                };
                self.encode_primitive(tag, &real_contents(number), output);
                Ok(())
            }
            TypeKind::Null => {
                let Value::Null = value else {
                    return Err(self.shape(node, value));
                };
                self.encode_primitive(tag, &[], output);
                Ok(())
            }
            TypeKind::ObjectIdentifier => {
                let Value::ObjectIdentifier(oid) = value else {
                    return Err(self.shape(node, value));
                };
                let contents = oid_contents(oid)
                    .ok_or_else(|| EncodeError::invalid_object_identifier(oid.clone(), self.codec()))?;
                self.encode_primitive(tag, &contents, output);
                Ok(())
            }
            TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(oid) = value else {
                    return Err(self.shape(node, value));
                };
                let mut contents = Vec::new();
                for &arc in oid {
                    encode_as_base128(arc, &mut contents);
                }
                self.encode_primitive(tag, &contents, output);
                Ok(())
            }
            TypeKind::OctetString => {
                let Value::OctetString(octets) = value else {
                    return Err(self.shape(node, value));
                };
                self.check_size_constraint(node, octets.len())?;
                self.encode_string(tag, Tag::OCTET_STRING, octets, output);
                Ok(())
            }
            TypeKind::BitString(named) => {
                let Value::BitString(bits) = value else {
                    return Err(self.shape(node, value));
                };
                let mut bits = bits.as_bitslice();
                // canonical forms drop trailing zero bits of named bit strings
                if !named.is_empty() && self.config.encoding_rules.is_canonical() {
                    while bits.last().map(|bit| *bit) == Some(false) {
                        bits = &bits[..bits.len() - 1];
                    }
                }
                self.check_size_constraint(node, bits.len())?;
                self.encode_bit_string(tag, bits, output);
                Ok(())
            }
            TypeKind::CharacterString(kind) => {
                let Some(text) = value.as_text() else {
                    return Err(self.shape(node, value));
                };
                self.check_size_constraint(node, text.chars().count())?;
                self.check_alphabet_constraint(node, text)?;
                let octets = strings::to_octets(*kind, text).map_err(|character| {
                    EncodeError::alphabet_constraint_not_satisfied(character, self.codec())
                })?;
                self.encode_string(tag, kind.tag(), &octets, output);
                Ok(())
            }
            TypeKind::ObjectDescriptor => {
                let Some(text) = value.as_text() else {
                    return Err(self.shape(node, value));
                };
                let octets = strings::to_octets(StringKind::Graphic, text).map_err(|character| {
                    EncodeError::alphabet_constraint_not_satisfied(character, self.codec())
                })?;
                self.encode_primitive(tag, &octets, output);
                Ok(())
            }
            TypeKind::Time(kind) => {
                let text = time_text(*kind, value).ok_or_else(|| self.shape(node, value))?;
                self.encode_primitive(tag, text.as_bytes(), output);
                Ok(())
            }
            TypeKind::Sequence(constructed) | TypeKind::Set(constructed) => {
                let Some(members) = value.as_sequence() else {
                    return Err(self.shape(node, value));
                };
                for name in members.keys() {
                    if !constructed.members.iter().any(|member| &member.name == name) {
                        return Err(EncodeError::unknown_member(name, self.codec()));
                    }
                }

                let is_set = matches!(node.kind, TypeKind::Set(_));
                let mut pieces: Vec<(Option<Tag>, Vec<u8>)> = Vec::new();
                for member in &constructed.members {
                    if let Some(piece) = self.encode_member(model, member, members)? {
                        let sort_key = leading_tag_for_value(
                            model,
                            member.ty,
                            members.get(&member.name).unwrap_or(&Value::Null),
                        );
                        if is_set && sort_key.is_none() {
                            return Err(EncodeError::custom(
                                "cannot encode `ANY` types in `SET` fields",
                                self.codec(),
                            ));
                        }
                        pieces.push((sort_key, piece));
                    }
                }
                if is_set {
                    pieces.sort_by_key(|(tag, _)| *tag);
                }
                let contents = pieces.into_iter().flat_map(|(_, piece)| piece).collect();
                self.encode_constructed(tag, contents, output);
                Ok(())
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                let Some(elements) = value.as_list() else {
                    return Err(self.shape(node, value));
                };
                self.check_size_constraint(node, elements.len())?;
                let mut pieces = Vec::with_capacity(elements.len());
                for (position, element_value) in elements.iter().enumerate() {
                    let mut piece = Vec::new();
                    self.encode_node(model, *element, element_value, &mut piece)
                        .map_err(|e| e.at(position))?;
                    pieces.push(piece);
                }
                if matches!(node.kind, TypeKind::SetOf(_))
                    && self.config.encoding_rules.is_canonical()
                {
                    pieces.sort_by(octet_string_ascending);
                }
                self.encode_constructed(tag, pieces.concat(), output);
                Ok(())
            }
            TypeKind::Choice(_) | TypeKind::Any => unreachable!("handled in encode_node"),
        }
    }

    /// Encodes one `SEQUENCE`/`SET` member, or returns `None` when the
    /// member is legitimately absent (optional, or equal to its default).
    fn encode_member(
        &self,
        model: &TypeModel,
        member: &Member,
        members: &std::collections::BTreeMap<String, Value>,
    ) -> Result<Option<Vec<u8>>> {
        match members.get(&member.name) {
            Some(value) => {
                if member.default.as_ref() == Some(value) {
                    return Ok(None);
                }
                let mut piece = Vec::new();
                self.encode_node(model, member.ty, value, &mut piece)
                    .map_err(|e| e.at(member.name.as_str()))?;
                Ok(Some(piece))
            }
            None if member.is_optional_or_default() || member.extension_group.is_some() => {
                Ok(None)
            }
            None => Err(EncodeError::required_member_missing(
                &member.name,
                self.codec(),
            )),
        }
    }

    fn shape(&self, node: &TypeNode, value: &Value) -> EncodeError {
        EncodeError::shape_mismatch(node.kind.name(), value.shape(), self.codec())
    }

    fn check_value_constraint(&self, node: &TypeNode, value: &BigInt) -> Result<()> {
        if let Some(constraint) = node.constraints.value() {
            if !constraint.extensible && !constraint.constraint.contains(value) {
                return Err(EncodeError::constraint_violation(
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
                return Err(EncodeError::size_constraint_not_satisfied(
                    size,
                    constraint.constraint.0,
                    self.codec(),
                ));
            }
        }
        Ok(())
    }

    fn check_alphabet_constraint(&self, node: &TypeNode, text: &str) -> Result<()> {
        if let Some(constraint) = node.constraints.permitted_alphabet() {
            if !constraint.extensible {
                for character in text.chars() {
                    if constraint.constraint.index_of(u32::from(character)).is_none() {
                        return Err(EncodeError::alphabet_constraint_not_satisfied(
                            character,
                            self.codec(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // TLV plumbing

    /// Wraps `inner` in the explicit wrapper tags, innermost last.
    fn wrap(&self, wrappers: &[Tag], inner: Vec<u8>, output: &mut Vec<u8>) {
        let mut current = inner;
        for &tag in wrappers.iter().rev() {
            let mut wrapped = Vec::with_capacity(current.len() + 4);
            self.encode_constructed(tag, current, &mut wrapped);
            current = wrapped;
        }
        output.extend(current);
    }

    fn encode_primitive(&self, tag: Tag, contents: &[u8], output: &mut Vec<u8>) {
        self.encode_identifier(Identifier::from_tag(tag, false), output);
        self.encode_definite_length(contents.len(), output);
        output.extend_from_slice(contents);
    }

    fn encode_constructed(&self, tag: Tag, contents: Vec<u8>, output: &mut Vec<u8>) {
        self.encode_identifier(Identifier::from_tag(tag, true), output);
        if self.config.encoding_rules.is_cer() {
            output.push(START_OF_CONTENTS);
            output.extend(contents);
            output.extend_from_slice(END_OF_CONTENTS);
        } else {
            self.encode_definite_length(contents.len(), output);
            output.extend(contents);
        }
    }

    /// "STRING" types in ASN.1 BER are either primitive encoded, or in
    /// certain variants like CER constructed encoded containing primitive
    /// encoded chunks.
    fn encode_string(&self, tag: Tag, nested_tag: Tag, contents: &[u8], output: &mut Vec<u8>) {
        let max_string_length = self.config.encoding_rules.max_string_length();
        if contents.len() > max_string_length {
            self.encode_identifier(Identifier::from_tag(tag, true), output);
            output.push(START_OF_CONTENTS);
            for chunk in contents.chunks(max_string_length) {
                self.encode_primitive(nested_tag, chunk, output);
            }
            output.extend_from_slice(END_OF_CONTENTS);
        } else {
            self.encode_primitive(tag, contents, output);
        }
    }

    fn encode_bit_string(&self, tag: Tag, bits: &BitStr, output: &mut Vec<u8>) {
        if bits.is_empty() {
            self.encode_primitive(tag, &[0], output);
            return;
        }
        let payload = bits_to_bytes(bits);
        let unused = (payload.len() * 8 - bits.len()) as u8;

        let max_string_length = self.config.encoding_rules.max_string_length();
        if payload.len() + 1 > max_string_length {
            // CER chunks carry their own unused-bits octet; only the final
            // chunk may have unused bits
            self.encode_identifier(Identifier::from_tag(tag, true), output);
            output.push(START_OF_CONTENTS);
            let chunk_payload = max_string_length - 1;
            let chunks: Vec<&[u8]> = payload.chunks(chunk_payload).collect();
            for (position, chunk) in chunks.iter().enumerate() {
                let chunk_unused = if position + 1 == chunks.len() { unused } else { 0 };
                let mut piece = Vec::with_capacity(chunk.len() + 1);
                piece.push(chunk_unused);
                piece.extend_from_slice(chunk);
                self.encode_primitive(Tag::BIT_STRING, &piece, output);
            }
            output.extend_from_slice(END_OF_CONTENTS);
        } else {
            let mut contents = Vec::with_capacity(payload.len() + 1);
            contents.push(unused);
            contents.extend(payload);
            self.encode_primitive(tag, &contents, output);
        }
    }

    /// Encodes the identifier of a type in BER/CER/DER. An identifier
    /// consists of a "class", encoding bit, and tag number. If the tag
    /// number is greater than 30 the number is encoded as a stream of 7 bit
    /// integers in big endian delimited by the leading bit of each byte.
    ///
    /// ```text
    /// ---------------------------------
    /// | 0 | 0 | 0 | 0 | 0 | 0 | 0 | 0 |
    /// ---------------------------------
    /// | class | E |        Tag        |
    /// ---------------------------------
    /// ```
    fn encode_identifier(&self, identifier: Identifier, output: &mut Vec<u8>) {
        const FIVE_BITS: u32 = (1 << 5) - 1;
        let mut tag_byte = identifier.tag.class as u8;
        let tag_number = identifier.tag.value;

        // Constructed is a single bit.
        tag_byte <<= 1;
        tag_byte |= identifier.is_constructed() as u8;
        tag_byte <<= 5;

        if tag_number >= FIVE_BITS {
            output.push(tag_byte | FIVE_BITS as u8);
            encode_as_base128(tag_number, output);
        } else {
            output.push(tag_byte | tag_number as u8);
        }
    }

    fn encode_definite_length(&self, length: usize, output: &mut Vec<u8>) {
        if length <= 127 {
            output.push(length as u8);
        } else {
            let mut remaining = length;
            let mut buffer = VecDeque::new();
            while remaining != 0 {
                buffer.push_front((remaining & 0xff) as u8);
                remaining >>= 8;
            }
            output.push(buffer.len() as u8 | 0x80);
            output.extend(buffer);
        }
    }
}

/// The canonically first tag a concrete value will put on the wire; `None`
/// for `ANY` payloads.
pub(crate) fn leading_tag_for_value(
    model: &TypeModel,
    index: TypeIndex,
    value: &Value,
) -> Option<Tag> {
    let node = model.node(index);
    if let Some(&tag) = node.tags.first() {
        return Some(tag);
    }
    match (&node.kind, value) {
        (TypeKind::Choice(choice), Value::Choice(selector, payload)) => {
            let variant = choice.variant(selector)?;
            leading_tag_for_value(model, variant.ty, payload)
        }
        _ => None,
    }
}

pub(crate) fn encode_as_base128(number: u32, buffer: &mut Vec<u8>) {
    const WIDTH: u8 = 7;
    const SEVEN_BITS: u8 = 0x7F;
    const EIGHTH_BIT: u8 = 0x80;

    if number < EIGHTH_BIT as u32 {
        buffer.push(number as u8);
    } else {
        let mut n: u8;
        let mut bits_left = 35;
        let mut cont = false;
        while bits_left > 0 {
            bits_left -= WIDTH;
            n = ((number >> bits_left) as u8) & SEVEN_BITS;
            if n > 0 || cont {
                buffer.push(if bits_left > 0 { EIGHTH_BIT } else { 0 } | (n & SEVEN_BITS));
                cont = true;
            }
        }
    }
}

/// The contents octets of an `OBJECT IDENTIFIER`, or `None` when the value
/// has fewer than two components or an out-of-range leading pair.
pub(crate) fn oid_contents(oid: &[u32]) -> Option<Vec<u8>> {
    if oid.len() < 2 {
        return None;
    }
    let first = oid[0];
    let second = oid[1];
    if first > MAX_OID_FIRST_OCTET || (first < MAX_OID_FIRST_OCTET && second > MAX_OID_SECOND_OCTET)
    {
        return None;
    }
    let mut contents = Vec::new();
    encode_as_base128(first * (MAX_OID_SECOND_OCTET + 1) + second, &mut contents);
    for &component in &oid[2..] {
        encode_as_base128(component, &mut contents);
    }
    Some(contents)
}

/// The contents octets of a binary `REAL` (X.690 §8.5): base 2, scale 0,
/// odd mantissa, minimal exponent.
pub(crate) fn real_contents(value: f64) -> Vec<u8> {
    if value == 0.0 {
        return if value.is_sign_negative() {
            vec![0x43]
        } else {
            Vec::new()
        };
    }
    if value.is_nan() {
        return vec![0x42];
    }
    if value.is_infinite() {
        return vec![if value > 0.0 { 0x40 } else { 0x41 }];
    }

    let bits = value.to_bits();
    let negative = bits >> 63 == 1;
    let biased = ((bits >> 52) & 0x7FF) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mut mantissa, mut exponent) = if biased == 0 {
        (fraction, -1074i64)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    while mantissa & 1 == 0 {
        mantissa >>= 1;
        exponent += 1;
    }

    let exponent_octets = signed_bytes_be(&BigInt::from(exponent));
    let mut header = 0x80u8;
    if negative {
        header |= 0x40;
    }
    let mut contents = Vec::new();
    match exponent_octets.len() {
        1 => contents.push(header),
        2 => contents.push(header | 0x01),
        3 => contents.push(header | 0x02),
        len => {
            contents.push(header | 0x03);
            contents.push(len as u8);
        }
    }
    contents.extend(exponent_octets);

    let mantissa_octets = mantissa.to_be_bytes();
    let skip = mantissa_octets.iter().take_while(|&&b| b == 0).count();
    contents.extend_from_slice(&mantissa_octets[skip..]);
    contents
}

/// The character payload of a time value, canonicalized. `Value::Text` is
/// accepted as a convenience and validated by parsing.
pub(crate) fn time_text(kind: TimeKind, value: &Value) -> Option<String> {
    match (kind, value) {
        (TimeKind::UtcTime, Value::UtcTime(time)) => Some(date::format_utc_time(time)),
        (TimeKind::GeneralizedTime, Value::GeneralizedTime(time)) => {
            Some(date::format_generalized_time(time))
        }
        (TimeKind::Date, Value::Date(value)) => Some(date::format_date(value)),
        (TimeKind::TimeOfDay, Value::TimeOfDay(value)) => Some(date::format_time_of_day(value)),
        (TimeKind::DateTime, Value::DateTime(value)) => Some(date::format_date_time(value)),
        (TimeKind::UtcTime, Value::Text(text)) => {
            date::parse_utc_time(text).map(|time| date::format_utc_time(&time))
        }
        (TimeKind::GeneralizedTime, Value::Text(text)) => {
            date::parse_generalized_time(text).map(|time| date::format_generalized_time(&time))
        }
        (TimeKind::Date, Value::Text(text)) => {
            date::parse_date(text).map(|value| date::format_date(&value))
        }
        (TimeKind::TimeOfDay, Value::Text(text)) => {
            date::parse_time_of_day(text).map(|value| date::format_time_of_day(&value))
        }
        (TimeKind::DateTime, Value::Text(text)) => {
            date::parse_date_time(text).map(|value| date::format_date_time(&value))
        }
        _ => None,
    }
}
