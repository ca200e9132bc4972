//! Decoding Octet Encoding Rules data into values.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::{fixed_size, integer_form, IntegerForm};
use crate::ber::de::{parse_oid_contents, parse_real_contents, parse_relative_oid_contents};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{
    strings, BitString, Class, Member, StringKind, Tag, TimeKind, TypeIndex, TypeKind, TypeModel,
    TypeNode,
};
use crate::value::Value;

type Result<T, E = DecodeError> = core::result::Result<T, E>;

/// The decoder's byte cursor.
struct Reader<'input> {
    input: &'input [u8],
}

impl<'input> Reader<'input> {
    fn take(&mut self, count: usize) -> Result<&'input [u8]> {
        if self.input.len() < count {
            return Err(DecodeError::out_of_buffer(
                Some(count - self.input.len()),
                crate::Codec::Oer,
            ));
        }
        let (taken, rest) = self.input.split_at(count);
        self.input = rest;
        Ok(taken)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

/// An OER decoder driven by a resolved [`TypeModel`].
pub struct Decoder {
    remaining_depth: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            remaining_depth: 128,
        }
    }

    fn codec(&self) -> crate::Codec {
        crate::Codec::Oer
    }

    /// Decodes one complete value of the type at `index`, returning the
    /// unconsumed remainder.
    pub fn decode_type<'input>(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        input: &'input [u8],
    ) -> Result<(Value, &'input [u8])> {
        let mut reader = Reader { input };
        let value = self.decode_node(model, index, &mut reader, self.remaining_depth)?;
        Ok((value, reader.input))
    }

    fn decode_node(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        reader: &mut Reader<'_>,
        depth: usize,
    ) -> Result<Value> {
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::nesting_limit_exceeded(self.codec()));
        };
        let node = model.node(index);
        match &node.kind {
            TypeKind::Boolean => Ok(Value::Boolean(reader.byte()? != 0)),
            TypeKind::Integer(_) => {
                let value = self.decode_integer(node, reader)?;
                self.check_value_constraint(node, &value)?;
                Ok(Value::Integer(value))
            }
            TypeKind::Enumerated(enumeration) => {
                let first = reader.byte()?;
                let number = if first < 0x80 {
                    i64::from(first)
                } else {
                    let count = (first & 0x7F) as usize;
                    let octets = reader.take(count)?;
                    BigInt::from_signed_bytes_be(octets)
                        .to_i64()
                        .ok_or_else(|| DecodeError::enumeration_index(i64::MAX, self.codec()))?
                };
                match enumeration.name_of(number) {
                    Some(name) => Ok(Value::Enumerated(name.to_owned())),
                    None if enumeration.extensible => Ok(Value::Integer(BigInt::from(number))),
                    None => Err(DecodeError::enumeration_index(number, self.codec())),
                }
            }
            TypeKind::Real => {
                let length = self.decode_length(reader)?;
                let contents = reader.take(length)?;
                parse_real_contents(contents).map(Value::Real).ok_or_else(|| {
                    DecodeError::from_kind(DecodeErrorKind::InvalidReal, self.codec())
                })
            }
            TypeKind::Null => Ok(Value::Null),
            TypeKind::ObjectIdentifier => {
                let length = self.decode_length(reader)?;
                let contents = reader.take(length)?;
                parse_oid_contents(contents)
                    .map(Value::ObjectIdentifier)
                    .ok_or_else(|| {
                        DecodeError::from_kind(
                            DecodeErrorKind::InvalidObjectIdentifier,
                            self.codec(),
                        )
                    })
            }
            TypeKind::RelativeOid => {
                let length = self.decode_length(reader)?;
                let contents = reader.take(length)?;
                parse_relative_oid_contents(contents)
                    .map(Value::ObjectIdentifier)
                    .ok_or_else(|| {
                        DecodeError::from_kind(
                            DecodeErrorKind::InvalidObjectIdentifier,
                            self.codec(),
                        )
                    })
            }
            TypeKind::BitString(_) => {
                if let Some(size) = fixed_size(node) {
                    let octets = reader.take(size.div_ceil(8))?;
                    let mut bits = BitString::from_vec(octets.to_vec());
                    bits.truncate(size);
                    return Ok(Value::BitString(bits));
                }
                let length = self.decode_length(reader)?;
                if length == 0 {
                    return Err(DecodeError::invalid_bit_string(0, self.codec()));
                }
                let contents = reader.take(length)?;
                let (&unused, payload) = contents.split_first().expect("length checked");
                if unused > 7 || (payload.is_empty() && unused != 0) {
                    return Err(DecodeError::invalid_bit_string(unused, self.codec()));
                }
                let mut bits = BitString::from_vec(payload.to_vec());
                bits.truncate(payload.len() * 8 - usize::from(unused));
                self.check_size(node, bits.len())?;
                Ok(Value::BitString(bits))
            }
            TypeKind::OctetString => {
                let length = match fixed_size(node) {
                    Some(size) => size,
                    None => self.decode_length(reader)?,
                };
                let octets = reader.take(length)?.to_vec();
                self.check_size(node, octets.len())?;
                Ok(Value::OctetString(octets))
            }
            TypeKind::CharacterString(kind) => {
                let length = match fixed_size(node) {
                    Some(size) => size * strings::octets_per_character(*kind),
                    None => self.decode_length(reader)?,
                };
                let octets = reader.take(length)?;
                let text = strings::from_octets(*kind, octets)
                    .ok_or_else(|| DecodeError::bad_utf8(self.codec()))?;
                self.check_size(node, text.chars().count())?;
                Ok(Value::Text(text))
            }
            TypeKind::ObjectDescriptor => {
                let length = self.decode_length(reader)?;
                let octets = reader.take(length)?;
                strings::from_octets(StringKind::Graphic, octets)
                    .map(Value::Text)
                    .ok_or_else(|| DecodeError::bad_utf8(self.codec()))
            }
            TypeKind::Time(kind) => {
                let length = self.decode_length(reader)?;
                let octets = reader.take(length)?;
                let text = core::str::from_utf8(octets)
                    .map_err(|_| DecodeError::bad_utf8(self.codec()))?;
                self.parse_time(*kind, text)
            }
            TypeKind::Any => {
                let length = self.decode_length(reader)?;
                Ok(Value::Any(reader.take(length)?.to_vec()))
            }
            TypeKind::Sequence(_) | TypeKind::Set(_) => {
                self.decode_constructed(model, node, reader, depth)
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                let count_octets = reader.byte()? as usize;
                let count = BigInt::from_bytes_be(
                    num_bigint::Sign::Plus,
                    reader.take(count_octets)?,
                )
                .to_usize()
                .ok_or_else(|| {
                    DecodeError::parser_fail("quantity exceeds usize", self.codec())
                })?;
                if count > reader.input.len() {
                    // each element occupies at least one octet
                    return Err(DecodeError::exceeds_remaining(
                        count,
                        reader.input.len(),
                        self.codec(),
                    ));
                }
                let mut elements = Vec::with_capacity(count.min(4096));
                for position in 0..count {
                    let value = self
                        .decode_node(model, *element, reader, depth)
                        .map_err(|e| e.at(position))?;
                    elements.push(value);
                }
                self.check_size(node, elements.len())?;
                Ok(Value::List(elements))
            }
            TypeKind::Choice(choice) => {
                let tag = self.decode_tag(reader)?;
                let variant = choice
                    .variants
                    .iter()
                    .find(|variant| model.first_tag(variant.ty) == Some(tag))
                    .ok_or_else(|| {
                        DecodeError::unexpected_tag(None, tag, self.codec())
                    })?;
                if variant.extension {
                    let length = self.decode_length(reader)?;
                    let contents = reader.take(length)?;
                    let mut open = Reader { input: contents };
                    let value = self
                        .decode_node(model, variant.ty, &mut open, depth)
                        .map_err(|e| e.at(variant.name.as_str()))?;
                    Ok(Value::Choice(variant.name.clone(), Box::new(value)))
                } else {
                    let value = self
                        .decode_node(model, variant.ty, reader, depth)
                        .map_err(|e| e.at(variant.name.as_str()))?;
                    Ok(Value::Choice(variant.name.clone(), Box::new(value)))
                }
            }
        }
    }

    fn decode_integer(&self, node: &TypeNode, reader: &mut Reader<'_>) -> Result<BigInt> {
        Ok(match integer_form(node) {
            IntegerForm::FixedUnsigned(octets) => {
                BigInt::from_bytes_be(num_bigint::Sign::Plus, reader.take(octets as usize)?)
            }
            IntegerForm::FixedSigned(octets) => {
                BigInt::from_signed_bytes_be(reader.take(octets as usize)?)
            }
            IntegerForm::VariableUnsigned => {
                let length = self.decode_length(reader)?;
                BigInt::from_bytes_be(num_bigint::Sign::Plus, reader.take(length)?)
            }
            IntegerForm::VariableSigned => {
                let length = self.decode_length(reader)?;
                let contents = reader.take(length)?;
                if contents.is_empty() {
                    return Err(DecodeError::parser_fail(
                        "integer bodies cannot be empty",
                        self.codec(),
                    ));
                }
                BigInt::from_signed_bytes_be(contents)
            }
        })
    }

    fn decode_constructed(
        &self,
        model: &TypeModel,
        node: &TypeNode,
        reader: &mut Reader<'_>,
        depth: usize,
    ) -> Result<Value> {
        let (constructed, is_set) = match &node.kind {
            TypeKind::Sequence(constructed) => (constructed, false),
            TypeKind::Set(constructed) => (constructed, true),
            _ => unreachable!(),
        };

        let mut root: Vec<&Member> = constructed.root_members().collect();
        if is_set {
            root.sort_by_key(|member| model.first_tag(member.ty));
        }

        let presence_bits = usize::from(constructed.extensible)
            + root
                .iter()
                .filter(|member| member.is_optional_or_default())
                .count();
        let preamble_octets = presence_bits.div_ceil(8);
        let preamble = BitString::from_vec(reader.take(preamble_octets)?.to_vec());

        let mut bit = 0usize;
        let extended = if constructed.extensible {
            bit += 1;
            preamble[0]
        } else {
            false
        };

        let mut members = BTreeMap::new();
        for member in &root {
            let present = if member.is_optional_or_default() {
                let value = preamble[bit];
                bit += 1;
                value
            } else {
                true
            };
            if present {
                let value = self
                    .decode_node(model, member.ty, reader, depth)
                    .map_err(|e| e.at(member.name.as_str()))?;
                members.insert(member.name.clone(), value);
            } else if let Some(default) = &member.default {
                members.insert(member.name.clone(), default.clone());
            }
        }

        let additions = constructed.extension_additions();
        if extended {
            let length = self.decode_length(reader)?;
            if length == 0 {
                return Err(DecodeError::invalid_bit_string(0, self.codec()));
            }
            let contents = reader.take(length)?;
            let (&unused, bitmap_octets) = contents.split_first().expect("length checked");
            if unused > 7 {
                return Err(DecodeError::invalid_bit_string(unused, self.codec()));
            }
            let mut bitmap = BitString::from_vec(bitmap_octets.to_vec());
            bitmap.truncate(bitmap_octets.len() * 8 - usize::from(unused));

            for (position, present) in bitmap.iter().by_vals().enumerate() {
                if !present {
                    continue;
                }
                let length = self.decode_length(reader)?;
                let contents = reader.take(length)?;
                match additions.get(position) {
                    Some(addition) => {
                        let mut open = Reader { input: contents };
                        match addition.as_slice() {
                            [member] => {
                                let value = self
                                    .decode_node(model, member.ty, &mut open, depth)
                                    .map_err(|e| e.at(member.name.as_str()))?;
                                members.insert(member.name.clone(), value);
                            }
                            group => {
                                let optional = group
                                    .iter()
                                    .filter(|member| member.is_optional_or_default())
                                    .count();
                                let preamble_octets = optional.div_ceil(8);
                                let preamble = BitString::from_vec(
                                    open.take(preamble_octets)?.to_vec(),
                                );
                                let mut bit = 0usize;
                                for member in group {
                                    let present = if member.is_optional_or_default() {
                                        let value = preamble[bit];
                                        bit += 1;
                                        value
                                    } else {
                                        true
                                    };
                                    if present {
                                        let value = self
                                            .decode_node(model, member.ty, &mut open, depth)
                                            .map_err(|e| e.at(member.name.as_str()))?;
                                        members.insert(member.name.clone(), value);
                                    } else if let Some(default) = &member.default {
                                        members
                                            .insert(member.name.clone(), default.clone());
                                    }
                                }
                            }
                        }
                    }
                    // additions this schema does not know are skipped
                    None => {}
                }
            }
        }
        for addition in &additions {
            for member in addition {
                if !members.contains_key(&member.name) {
                    if let Some(default) = &member.default {
                        members.insert(member.name.clone(), default.clone());
                    }
                }
            }
        }

        Ok(Value::Sequence(members))
    }

    fn decode_tag(&self, reader: &mut Reader<'_>) -> Result<Tag> {
        let first = reader.byte()?;
        let class = match first >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::Context,
            _ => Class::Private,
        };
        let number = if first & 0x3F != 0x3F {
            u32::from(first & 0x3F)
        } else {
            let mut number: u32 = 0;
            loop {
                let octet = reader.byte()?;
                number = number
                    .checked_mul(128)
                    .and_then(|n| n.checked_add(u32::from(octet & 0x7F)))
                    .ok_or_else(|| {
                        DecodeError::parser_fail("tag number exceeds u32", self.codec())
                    })?;
                if octet & 0x80 == 0 {
                    break;
                }
            }
            number
        };
        Ok(Tag::new(class, number))
    }

    /// X.696 length determinants: short form below 128, otherwise
    /// `0x80 | n` followed by `n` big-endian octets. Leading zero octets and
    /// unnecessary long forms are rejected, keeping encodings canonical.
    fn decode_length(&self, reader: &mut Reader<'_>) -> Result<usize> {
        let first = reader.byte()?;
        if first < 0x80 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        if count == 0 {
            return Err(DecodeError::from_kind(
                DecodeErrorKind::IndefiniteLengthNotAllowed,
                self.codec(),
            ));
        }
        let octets = reader.take(count)?;
        let length = BigInt::from_bytes_be(num_bigint::Sign::Plus, octets)
            .to_usize()
            .ok_or_else(|| {
                DecodeError::parser_fail("length exceeds usize", self.codec())
            })?;
        if octets[0] == 0 || length < 128 {
            return Err(DecodeError::from_kind(
                DecodeErrorKind::NonMinimalLength,
                self.codec(),
            ));
        }
        Ok(length)
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

    fn check_size(&self, node: &TypeNode, size: usize) -> Result<()> {
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
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
