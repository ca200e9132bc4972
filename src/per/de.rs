//! Decoding Packed Encoding Rules data into values.
//!
//! The decoder is a bit-cursor machine over the input: every read moves the
//! cursor forward and exhaustion surfaces as `OutOfBuffer`, never as a read
//! past the input.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::enc::{effective_width, log2_u128, sorted_root_variants};
use super::{SIXTEEN_K, SIXTY_FOUR_K};
use crate::ber::de::{parse_oid_contents, parse_real_contents, parse_relative_oid_contents};
use crate::error::{DecodeError, DecodeErrorKind};
use crate::types::{
    date, strings, BitStr, BitString, Bounded, Member, StringKind, TimeKind, TypeIndex, TypeKind,
    TypeModel, TypeNode,
};
use crate::value::Value;

type Result<T, E = DecodeError> = core::result::Result<T, E>;

/// Options for configuring the [`Decoder`].
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    aligned: bool,
    // limit decoding to prevent stack overflow from deep or cyclic schemas
    remaining_depth: usize,
}

impl DecoderOptions {
    /// Returns the default decoding options for Aligned Packed Encoding Rules.
    #[must_use]
    pub fn aligned() -> Self {
        Self {
            aligned: true,
            remaining_depth: 128,
        }
    }

    /// Returns the default decoding options for Unaligned Packed Encoding Rules.
    #[must_use]
    pub fn unaligned() -> Self {
        Self {
            aligned: false,
            remaining_depth: 128,
        }
    }

    fn current_codec(self) -> crate::Codec {
        if self.aligned {
            crate::Codec::Per
        } else {
            crate::Codec::Uper
        }
    }
}

/// The decoder's bit cursor.
struct Cursor<'input> {
    bits: &'input BitStr,
    position: usize,
}

impl<'input> Cursor<'input> {
    fn new(bits: &'input BitStr) -> Self {
        Self { bits, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.bits.len() - self.position
    }

    fn read_bit(&mut self, codec: crate::Codec) -> Result<bool> {
        if self.remaining() < 1 {
            return Err(DecodeError::out_of_buffer(Some(1), codec));
        }
        let bit = self.bits[self.position];
        self.position += 1;
        Ok(bit)
    }

    fn read_bits(&mut self, count: usize, codec: crate::Codec) -> Result<&'input BitStr> {
        if self.remaining() < count {
            return Err(DecodeError::out_of_buffer(
                Some(count - self.remaining()),
                codec,
            ));
        }
        let slice = &self.bits[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    fn read_uint(&mut self, width: u32, codec: crate::Codec) -> Result<u128> {
        let bits = self.read_bits(width as usize, codec)?;
        let mut value = 0u128;
        for bit in bits.iter().by_vals() {
            value = (value << 1) | u128::from(bit);
        }
        Ok(value)
    }

    fn read_octets(&mut self, count: usize, codec: crate::Codec) -> Result<Vec<u8>> {
        let bits = self.read_bits(count * 8, codec)?;
        Ok(crate::bits::bits_to_bytes(bits))
    }

    fn pad_to_alignment(&mut self, codec: crate::Codec) -> Result<()> {
        let misaligned = self.position % 8;
        if misaligned != 0 {
            self.read_bits(8 - misaligned, codec)?;
        }
        Ok(())
    }
}

/// A PER/UPER decoder driven by a resolved [`TypeModel`].
pub struct Decoder {
    options: DecoderOptions,
}

impl Decoder {
    /// Creates a new decoder from the given options.
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }

    fn codec(&self) -> crate::Codec {
        self.options.current_codec()
    }

    /// Decodes one complete value of the type at `index`, returning the
    /// unconsumed whole octets.
    pub fn decode_type<'input>(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        input: &'input [u8],
    ) -> Result<(Value, &'input [u8])> {
        if input.is_empty() {
            return Err(DecodeError::out_of_buffer(Some(1), self.codec()));
        }
        let bits = BitStr::from_slice(input);
        let mut cursor = Cursor::new(bits);
        let value = self.decode_node(
            model,
            index,
            &mut cursor,
            self.options.remaining_depth,
        )?;
        // a complete encoding occupies at least one octet
        let consumed = cursor.position.div_ceil(8).max(1);
        Ok((value, &input[consumed..]))
    }

    fn decode_node(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        cursor: &mut Cursor<'_>,
        depth: usize,
    ) -> Result<Value> {
        let Some(depth) = depth.checked_sub(1) else {
            return Err(DecodeError::nesting_limit_exceeded(self.codec()));
        };
        let node = model.node(index);
        match &node.kind {
            TypeKind::Boolean => Ok(Value::Boolean(cursor.read_bit(self.codec())?)),
            TypeKind::Integer(_) => self.decode_integer(node, cursor),
            TypeKind::Enumerated(enumeration) => {
                let extended =
                    enumeration.extensible && cursor.read_bit(self.codec())?;
                if extended {
                    let index = self.decode_normally_small_number(cursor)?;
                    return match enumeration.extensions.get(index) {
                        Some(item) => Ok(Value::Enumerated(item.name.clone())),
                        None => Err(DecodeError::enumeration_index(
                            index as i64,
                            self.codec(),
                        )),
                    };
                }
                let index = if enumeration.root.len() > 1 {
                    self.decode_constrained_whole_number(
                        cursor,
                        0,
                        enumeration.root.len() as i128 - 1,
                    )? as usize
                } else {
                    0
                };
                let item = enumeration.root.get(index).ok_or_else(|| {
                    DecodeError::enumeration_index(index as i64, self.codec())
                })?;
                Ok(Value::Enumerated(item.name.clone()))
            }
            TypeKind::Real => {
                let octets = self.decode_octet_payload(cursor)?;
                parse_real_contents(&octets).map(Value::Real).ok_or_else(|| {
                    DecodeError::from_kind(DecodeErrorKind::InvalidReal, self.codec())
                })
            }
            TypeKind::Null => Ok(Value::Null),
            TypeKind::ObjectIdentifier => {
                let octets = self.decode_octet_payload(cursor)?;
                parse_oid_contents(&octets)
                    .map(Value::ObjectIdentifier)
                    .ok_or_else(|| {
                        DecodeError::from_kind(
                            DecodeErrorKind::InvalidObjectIdentifier,
                            self.codec(),
                        )
                    })
            }
            TypeKind::RelativeOid => {
                let octets = self.decode_octet_payload(cursor)?;
                parse_relative_oid_contents(&octets)
                    .map(Value::ObjectIdentifier)
                    .ok_or_else(|| {
                        DecodeError::from_kind(
                            DecodeErrorKind::InvalidObjectIdentifier,
                            self.codec(),
                        )
                    })
            }
            TypeKind::BitString(_) => self.decode_bit_string(node, cursor),
            TypeKind::OctetString => self.decode_octet_string(node, cursor),
            TypeKind::CharacterString(kind) => {
                self.decode_character_string(node, *kind, cursor)
            }
            TypeKind::ObjectDescriptor => {
                let octets = self.decode_octet_payload(cursor)?;
                strings::from_octets(StringKind::Graphic, &octets)
                    .map(Value::Text)
                    .ok_or_else(|| DecodeError::bad_utf8(self.codec()))
            }
            TypeKind::Time(kind) => {
                let text = self.decode_known_multiplier_text(cursor, None, 7, None)?;
                self.parse_time(*kind, &text)
            }
            TypeKind::Any => Ok(Value::Any(self.decode_octet_payload(cursor)?)),
            TypeKind::Sequence(_) | TypeKind::Set(_) => {
                self.decode_constructed(model, node, cursor, depth)
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                let bounds = self.length_bounds(node, cursor)?;
                let element = *element;
                let mut elements = Vec::new();
                self.decode_length(cursor, bounds, &mut |decoder, cursor, count| {
                    for _ in 0..count {
                        let value = decoder
                            .decode_node(model, element, cursor, depth)
                            .map_err(|e| e.at(elements.len()))?;
                        elements.push(value);
                    }
                    Ok(())
                })?;
                self.check_size(node, elements.len())?;
                Ok(Value::List(elements))
            }
            TypeKind::Choice(choice) => {
                let extended = choice.extensible && cursor.read_bit(self.codec())?;
                if extended {
                    let index = self.decode_normally_small_number(cursor)?;
                    let variant = choice.extension_variants().nth(index).ok_or_else(|| {
                        DecodeError::choice_index_exceeds_variants(
                            index,
                            choice.extension_variants().count(),
                            self.codec(),
                        )
                    })?;
                    let value = self
                        .decode_open_type(model, variant.ty, cursor)
                        .map_err(|e| e.at(variant.name.as_str()))?;
                    return Ok(Value::Choice(variant.name.clone(), Box::new(value)));
                }
                let sorted = sorted_root_variants(model, choice);
                if sorted.is_empty() {
                    return Err(DecodeError::choice_index_exceeds_variants(
                        0,
                        0,
                        self.codec(),
                    ));
                }
                let index = if sorted.len() > 1 {
                    self.decode_constrained_whole_number(cursor, 0, sorted.len() as i128 - 1)?
                        as usize
                } else {
                    0
                };
                let variant = sorted[index];
                let value = self
                    .decode_node(model, variant.ty, cursor, depth)
                    .map_err(|e| e.at(variant.name.as_str()))?;
                Ok(Value::Choice(variant.name.clone(), Box::new(value)))
            }
        }
    }

    // Whole numbers and length determinants

    fn decode_integer(&self, node: &TypeNode, cursor: &mut Cursor<'_>) -> Result<Value> {
        let Some(constraint) = node.constraints.value() else {
            return self.decode_unconstrained_integer(cursor, None);
        };
        if constraint.extensible && cursor.read_bit(self.codec())? {
            return self.decode_unconstrained_integer(cursor, None);
        }

        let bounds = constraint.constraint.0;
        let value = match (bounds.as_start(), bounds.as_end()) {
            (Some(&lo), Some(&hi)) => {
                let value = self.decode_constrained_whole_number(cursor, lo, hi)?;
                Value::Integer(BigInt::from(value))
            }
            (Some(&lo), None) => return self.decode_unconstrained_integer(cursor, Some(lo)),
            _ => return self.decode_unconstrained_integer(cursor, None),
        };
        Ok(value)
    }

    fn decode_unconstrained_integer(
        &self,
        cursor: &mut Cursor<'_>,
        lower: Option<i128>,
    ) -> Result<Value> {
        let octets = self.decode_octet_payload(cursor)?;
        if octets.is_empty() {
            return Err(DecodeError::parser_fail(
                "integer bodies cannot be empty",
                self.codec(),
            ));
        }
        let value = match lower {
            Some(lower) => {
                BigInt::from_bytes_be(num_bigint::Sign::Plus, &octets) + BigInt::from(lower)
            }
            None => BigInt::from_signed_bytes_be(&octets),
        };
        Ok(Value::Integer(value))
    }

    fn decode_constrained_whole_number(
        &self,
        cursor: &mut Cursor<'_>,
        lo: i128,
        hi: i128,
    ) -> Result<i128> {
        let range = (hi - lo) as u128 + 1;
        if range == 1 {
            return Ok(lo);
        }
        let offset = if !self.options.aligned {
            cursor.read_uint(log2_u128(range), self.codec())?
        } else if range <= 255 {
            cursor.read_uint(log2_u128(range), self.codec())?
        } else if range == 256 {
            cursor.pad_to_alignment(self.codec())?;
            cursor.read_uint(8, self.codec())?
        } else if range <= SIXTY_FOUR_K as u128 {
            cursor.pad_to_alignment(self.codec())?;
            cursor.read_uint(16, self.codec())?
        } else {
            let max_octets = octets_for(range - 1);
            let octets =
                self.decode_constrained_whole_number(cursor, 1, max_octets as i128)? as u32;
            cursor.pad_to_alignment(self.codec())?;
            cursor.read_uint(octets * 8, self.codec())?
        };
        let value = lo
            .checked_add(offset as i128)
            .filter(|value| *value <= hi)
            .ok_or_else(|| {
                DecodeError::constraint_violation(
                    BigInt::from(lo) + BigInt::from(offset),
                    Bounded::new(lo, hi),
                    self.codec(),
                )
            })?;
        Ok(value)
    }

    fn decode_length(
        &self,
        cursor: &mut Cursor<'_>,
        bounds: Option<Bounded<usize>>,
        read: &mut dyn FnMut(&Self, &mut Cursor<'_>, usize) -> Result<()>,
    ) -> Result<()> {
        if let Some(bounds) = bounds {
            let lo = bounds.minimum();
            if let Some(hi) = bounds.maximum() {
                if hi < SIXTY_FOUR_K as usize {
                    if lo == hi {
                        return read(self, cursor, lo);
                    }
                    let length = self
                        .decode_constrained_whole_number(cursor, lo as i128, hi as i128)?
                        as usize;
                    return read(self, cursor, length);
                }
            }
        }

        loop {
            cursor.pad_to_alignment_if(self.options.aligned, self.codec())?;
            if !cursor.read_bit(self.codec())? {
                let length = cursor.read_uint(7, self.codec())? as usize;
                return read(self, cursor, length);
            }
            if !cursor.read_bit(self.codec())? {
                let length = cursor.read_uint(14, self.codec())? as usize;
                return read(self, cursor, length);
            }
            let factor = cursor.read_uint(6, self.codec())? as usize;
            if !(1..=4).contains(&factor) {
                return Err(DecodeError::from_kind(
                    DecodeErrorKind::InvalidLengthFragment,
                    self.codec(),
                ));
            }
            read(self, cursor, factor * SIXTEEN_K as usize)?;
        }
    }

    fn decode_bare_length(&self, cursor: &mut Cursor<'_>) -> Result<usize> {
        cursor.pad_to_alignment_if(self.options.aligned, self.codec())?;
        if !cursor.read_bit(self.codec())? {
            return Ok(cursor.read_uint(7, self.codec())? as usize);
        }
        if !cursor.read_bit(self.codec())? {
            return Ok(cursor.read_uint(14, self.codec())? as usize);
        }
        Err(DecodeError::from_kind(
            DecodeErrorKind::InvalidLengthFragment,
            self.codec(),
        ))
    }

    fn decode_normally_small_length(&self, cursor: &mut Cursor<'_>) -> Result<usize> {
        if !cursor.read_bit(self.codec())? {
            Ok(cursor.read_uint(6, self.codec())? as usize + 1)
        } else {
            self.decode_bare_length(cursor)
        }
    }

    fn decode_normally_small_number(&self, cursor: &mut Cursor<'_>) -> Result<usize> {
        if !cursor.read_bit(self.codec())? {
            return Ok(cursor.read_uint(6, self.codec())? as usize);
        }
        let length = self.decode_bare_length(cursor)?;
        let octets = cursor.read_octets(length, self.codec())?;
        BigInt::from_bytes_be(num_bigint::Sign::Plus, &octets)
            .to_usize()
            .ok_or_else(|| {
                DecodeError::parser_fail("extension index exceeds usize", self.codec())
            })
    }

    fn decode_octet_payload(&self, cursor: &mut Cursor<'_>) -> Result<Vec<u8>> {
        let mut octets = Vec::new();
        self.decode_length(cursor, None, &mut |_, cursor, count| {
            octets.extend(cursor.read_octets(count, self.codec())?);
            Ok(())
        })?;
        Ok(octets)
    }

    /// Decodes an open type: a length-prefixed, octet-aligned complete
    /// encoding.
    fn decode_open_type(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        cursor: &mut Cursor<'_>,
    ) -> Result<Value> {
        let octets = self.decode_octet_payload(cursor)?;
        let (value, _padding) =
            Decoder::new(self.options).decode_type(model, index, &octets)?;
        Ok(value)
    }

    // Strings

    fn length_bounds(
        &self,
        node: &TypeNode,
        cursor: &mut Cursor<'_>,
    ) -> Result<Option<Bounded<usize>>> {
        let Some(constraint) = node.constraints.size() else {
            return Ok(None);
        };
        if constraint.extensible && cursor.read_bit(self.codec())? {
            return Ok(None);
        }
        Ok(Some(constraint.constraint.0))
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

    fn decode_bit_string(&self, node: &TypeNode, cursor: &mut Cursor<'_>) -> Result<Value> {
        let bounds = self.length_bounds(node, cursor)?;
        if let Some(bounds) = bounds {
            if let (lo, Some(hi)) = (bounds.minimum(), bounds.maximum()) {
                if lo == hi && hi < SIXTY_FOUR_K as usize {
                    if self.options.aligned && hi > 16 {
                        cursor.pad_to_alignment(self.codec())?;
                    }
                    let bits = cursor.read_bits(hi, self.codec())?;
                    return Ok(Value::BitString(bits.to_bitvec()));
                }
            }
        }
        let mut bits = BitString::new();
        let aligned = self.options.aligned;
        self.decode_length(cursor, bounds, &mut |decoder, cursor, count| {
            if aligned && count > 0 {
                cursor.pad_to_alignment(decoder.codec())?;
            }
            bits.extend_from_bitslice(cursor.read_bits(count, decoder.codec())?);
            Ok(())
        })?;
        Ok(Value::BitString(bits))
    }

    fn decode_octet_string(&self, node: &TypeNode, cursor: &mut Cursor<'_>) -> Result<Value> {
        let bounds = self.length_bounds(node, cursor)?;
        if let Some(bounds) = bounds {
            if let (lo, Some(hi)) = (bounds.minimum(), bounds.maximum()) {
                if lo == hi && hi < SIXTY_FOUR_K as usize {
                    if self.options.aligned && hi > 2 {
                        cursor.pad_to_alignment(self.codec())?;
                    }
                    return Ok(Value::OctetString(cursor.read_octets(hi, self.codec())?));
                }
            }
        }
        let mut octets = Vec::new();
        let aligned = self.options.aligned;
        self.decode_length(cursor, bounds, &mut |decoder, cursor, count| {
            if aligned && count > 0 {
                cursor.pad_to_alignment(decoder.codec())?;
            }
            octets.extend(cursor.read_octets(count, decoder.codec())?);
            Ok(())
        })?;
        Ok(Value::OctetString(octets))
    }

    fn decode_character_string(
        &self,
        node: &TypeNode,
        kind: StringKind,
        cursor: &mut Cursor<'_>,
    ) -> Result<Value> {
        if !kind.is_known_multiplier() {
            let octets = self.decode_octet_payload(cursor)?;
            return strings::from_octets(kind, &octets)
                .map(Value::Text)
                .ok_or_else(|| DecodeError::bad_utf8(self.codec()));
        }

        let bounds = self.length_bounds(node, cursor)?;
        let alphabet = node
            .constraints
            .permitted_alphabet()
            .filter(|alphabet| !alphabet.extensible)
            .map(|alphabet| alphabet.constraint.as_slice())
            .or_else(|| kind.canonical_alphabet());
        let width = effective_width(kind, alphabet);
        let text = self.decode_known_multiplier_text(cursor, alphabet, width, bounds)?;
        self.check_size(node, text.chars().count())?;
        Ok(Value::Text(text))
    }

    fn decode_known_multiplier_text(
        &self,
        cursor: &mut Cursor<'_>,
        alphabet: Option<&[u32]>,
        canonical_width: u32,
        bounds: Option<Bounded<usize>>,
    ) -> Result<String> {
        let width = if self.options.aligned && canonical_width > 0
            && !canonical_width.is_power_of_two()
        {
            canonical_width.next_power_of_two()
        } else {
            canonical_width
        };
        let direct = match alphabet {
            Some(alphabet) => {
                u128::from(alphabet.last().copied().unwrap_or(0)) < (1u128 << width.min(64))
            }
            None => true,
        };

        let aligned = self.options.aligned;
        let large = match bounds.and_then(|b| b.maximum()) {
            Some(hi) => (hi as u128) * width as u128 > 16,
            None => true,
        };

        let mut values: Vec<u32> = Vec::new();
        let fixed = bounds
            .map(|b| b.minimum() == b.maximum().unwrap_or(usize::MAX))
            .unwrap_or(false);
        if fixed && bounds.map_or(false, |b| b.maximum().unwrap_or(0) < SIXTY_FOUR_K as usize) {
            if aligned && large {
                cursor.pad_to_alignment(self.codec())?;
            }
            let count = bounds.expect("fixed implies bounds").minimum();
            for _ in 0..count {
                values.push(cursor.read_uint(width, self.codec())? as u32);
            }
        } else {
            self.decode_length(cursor, bounds, &mut |decoder, cursor, count| {
                if aligned && large && count > 0 {
                    cursor.pad_to_alignment(decoder.codec())?;
                }
                for _ in 0..count {
                    values.push(cursor.read_uint(width, decoder.codec())? as u32);
                }
                Ok(())
            })?;
        }

        let mut text = String::with_capacity(values.len());
        for value in values {
            let code = if direct {
                if let Some(alphabet) = alphabet {
                    if alphabet.binary_search(&value).is_err() {
                        return Err(DecodeError::parser_fail(
                            format!("character {value:#x} is outside the permitted alphabet"),
                            self.codec(),
                        ));
                    }
                }
                value
            } else {
                let alphabet = alphabet.expect("indexed strings carry an alphabet");
                *alphabet.get(value as usize).ok_or_else(|| {
                    DecodeError::parser_fail(
                        format!("character index {value} is outside the permitted alphabet"),
                        self.codec(),
                    )
                })?
            };
            text.push(char::from_u32(code).ok_or_else(|| DecodeError::bad_utf8(self.codec()))?);
        }
        Ok(text)
    }

    // Constructed types

    fn decode_constructed(
        &self,
        model: &TypeModel,
        node: &TypeNode,
        cursor: &mut Cursor<'_>,
        depth: usize,
    ) -> Result<Value> {
        let (constructed, is_set) = match &node.kind {
            TypeKind::Sequence(constructed) => (constructed, false),
            TypeKind::Set(constructed) => (constructed, true),
            _ => unreachable!(),
        };

        let extended = constructed.extensible && cursor.read_bit(self.codec())?;

        let mut root: Vec<&Member> = constructed.root_members().collect();
        if is_set {
            root.sort_by_key(|member| model.first_tag(member.ty));
        }

        let mut members = BTreeMap::new();
        self.decode_member_run(model, &root, cursor, depth, &mut members)?;

        let additions = constructed.extension_additions();
        if extended {
            let count = self.decode_normally_small_length(cursor)?;
            let mut present = Vec::with_capacity(count);
            for _ in 0..count {
                present.push(cursor.read_bit(self.codec())?);
            }
            for (position, &bit) in present.iter().enumerate() {
                if !bit {
                    continue;
                }
                let octets = self.decode_octet_payload(cursor)?;
                match additions.get(position) {
                    Some(addition) => match addition.as_slice() {
                        [member] => {
                            let (value, _) = Decoder::new(self.options)
                                .decode_type(model, member.ty, &octets)
                                .map_err(|e| e.at(member.name.as_str()))?;
                            members.insert(member.name.clone(), value);
                        }
                        group => {
                            let bits = BitStr::from_slice(&octets);
                            let mut group_cursor = Cursor::new(bits);
                            self.decode_member_run(
                                model,
                                group,
                                &mut group_cursor,
                                depth,
                                &mut members,
                            )?;
                        }
                    },
                    // additions this schema does not know are skipped
                    None => {}
                }
            }
        }
        // absent known additions still surface their defaults
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

    /// The presence bitmap and member decodes of a root component list or an
    /// addition group.
    fn decode_member_run(
        &self,
        model: &TypeModel,
        run: &[&Member],
        cursor: &mut Cursor<'_>,
        depth: usize,
        members: &mut BTreeMap<String, Value>,
    ) -> Result<()> {
        let mut presence = Vec::with_capacity(run.len());
        for member in run {
            if member.is_optional_or_default() {
                presence.push(cursor.read_bit(self.codec())?);
            } else {
                presence.push(true);
            }
        }
        for (member, present) in run.iter().zip(presence) {
            if present {
                let value = self
                    .decode_node(model, member.ty, cursor, depth)
                    .map_err(|e| e.at(member.name.as_str()))?;
                members.insert(member.name.clone(), value);
            } else if let Some(default) = &member.default {
                members.insert(member.name.clone(), default.clone());
            }
        }
        Ok(())
    }

    fn parse_time(&self, kind: TimeKind, text: &str) -> Result<Value> {
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
}

impl Cursor<'_> {
    fn pad_to_alignment_if(&mut self, aligned: bool, codec: crate::Codec) -> Result<()> {
        if aligned {
            self.pad_to_alignment(codec)?;
        }
        Ok(())
    }
}

fn octets_for(value: u128) -> u32 {
    (((u128::BITS - value.leading_zeros()) + 7) / 8).max(1)
}
