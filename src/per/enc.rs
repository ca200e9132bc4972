//! Encoding values into Packed Encoding Rules data.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::{SIXTEEN_K, SIXTY_FOUR_K};
use crate::ber::enc::{oid_contents, real_contents, time_text};
use crate::error::EncodeError;
use crate::num::{signed_bytes_be, unsigned_bytes_be};
use crate::types::{
    strings, BitString, Bounded, ChoiceType, ConstructedType, Member, StringKind, TypeIndex,
    TypeKind, TypeModel, TypeNode, Variant,
};
use crate::value::Value;

type Result<T, E = EncodeError> = core::result::Result<T, E>;

/// Options for configuring the [`Encoder`].
#[derive(Debug, Clone, Copy)]
pub struct EncoderOptions {
    aligned: bool,
}

impl EncoderOptions {
    /// Returns the default encoder options for Aligned Packed Encoding Rules.
    #[must_use]
    pub fn aligned() -> Self {
        Self { aligned: true }
    }

    /// Returns the default encoder options for Unaligned Packed Encoding Rules.
    #[must_use]
    pub fn unaligned() -> Self {
        Self { aligned: false }
    }

    fn current_codec(self) -> crate::Codec {
        if self.aligned {
            crate::Codec::Per
        } else {
            crate::Codec::Uper
        }
    }
}

/// A PER/UPER encoder driven by a resolved [`TypeModel`].
pub struct Encoder {
    options: EncoderOptions,
}

impl Encoder {
    /// Constructs a new encoder from the provided options.
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    fn codec(&self) -> crate::Codec {
        self.options.current_codec()
    }

    /// Encodes one complete value of the type at `index`, padded to whole
    /// octets. An empty encoding becomes a single zero octet (X.691 §10.1).
    pub fn encode_type(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        value: &Value,
    ) -> Result<Vec<u8>> {
        let mut buffer = BitString::default();
        self.encode_node(model, index, value, &mut buffer)?;
        if buffer.is_empty() {
            return Ok(vec![0]);
        }
        Ok(crate::bits::bits_to_bytes(&buffer))
    }

    fn encode_node(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        value: &Value,
        buffer: &mut BitString,
    ) -> Result<()> {
        let node = model.node(index);
        match &node.kind {
            TypeKind::Boolean => {
                let Some(value) = value.as_bool() else {
                    return Err(self.shape(node, value));
                };
                buffer.push(value);
                Ok(())
            }
            TypeKind::Integer(_) => {
                let Some(value) = value.as_integer() else {
                    return Err(self.shape(node, value));
                };
                self.encode_integer(node, value, buffer)
            }
            TypeKind::Enumerated(enumeration) => {
                let name = match value {
                    Value::Enumerated(name) => name.clone(),
                    Value::Integer(number) => {
                        let number = number
                            .to_i64()
                            .ok_or_else(|| self.shape(node, value))?;
                        enumeration
                            .name_of(number)
                            .ok_or_else(|| self.shape(node, value))?
                            .to_owned()
                    }
                    _ => return Err(self.shape(node, value)),
                };
                if let Some(root_index) = enumeration.root_index_of(&name) {
                    if enumeration.extensible {
                        buffer.push(false);
                    }
                    if enumeration.root.len() > 1 {
                        self.encode_constrained_whole_number(
                            buffer,
                            root_index as i128,
                            0,
                            enumeration.root.len() as i128 - 1,
                        );
                    }
                    Ok(())
                } else if let Some(extension_index) = enumeration.extension_index_of(&name) {
                    buffer.push(true);
                    self.encode_normally_small_number(buffer, extension_index)
                } else {
                    Err(EncodeError::unknown_enum_item(&name, self.codec()))
                }
            }
            TypeKind::Real => {
                let number = match value {
                    Value::Real(number) => *number,
                    Value::Integer(number) => {
                        number.to_f64().ok_or_else(|| self.shape(node, value))?
                    }
                    _ => return Err(self.shape(node, value)),
                };
                self.encode_octet_payload(buffer, &real_contents(number))
            }
            TypeKind::Null => match value {
                Value::Null => Ok(()),
                _ => Err(self.shape(node, value)),
            },
            TypeKind::ObjectIdentifier => {
                let Value::ObjectIdentifier(oid) = value else {
                    return Err(self.shape(node, value));
                };
                let contents = oid_contents(oid).ok_or_else(|| {
                    EncodeError::invalid_object_identifier(oid.clone(), self.codec())
                })?;
                self.encode_octet_payload(buffer, &contents)
            }
            TypeKind::RelativeOid => {
                let Value::ObjectIdentifier(oid) = value else {
                    return Err(self.shape(node, value));
                };
                let mut contents = Vec::new();
                for &arc in oid {
                    crate::ber::enc::encode_as_base128(arc, &mut contents);
                }
                self.encode_octet_payload(buffer, &contents)
            }
            TypeKind::BitString(_) => {
                let Value::BitString(bits) = value else {
                    return Err(self.shape(node, value));
                };
                self.encode_bit_string(node, bits, buffer)
            }
            TypeKind::OctetString => {
                let Value::OctetString(octets) = value else {
                    return Err(self.shape(node, value));
                };
                self.encode_octet_string(node, octets, buffer)
            }
            TypeKind::CharacterString(kind) => {
                let Some(text) = value.as_text() else {
                    return Err(self.shape(node, value));
                };
                self.encode_character_string(node, *kind, text, buffer)
            }
            TypeKind::ObjectDescriptor => {
                let Some(text) = value.as_text() else {
                    return Err(self.shape(node, value));
                };
                let octets = strings::to_octets(StringKind::Graphic, text).map_err(|c| {
                    EncodeError::alphabet_constraint_not_satisfied(c, self.codec())
                })?;
                self.encode_octet_payload(buffer, &octets)
            }
            TypeKind::Time(kind) => {
                // time types ride as their canonical VisibleString payloads
                let text = time_text(*kind, value).ok_or_else(|| self.shape(node, value))?;
                self.encode_known_multiplier(&text, None, 7, buffer, None)
            }
            TypeKind::Any => {
                let Value::Any(octets) = value else {
                    return Err(self.shape(node, value));
                };
                self.encode_octet_payload(buffer, octets)
            }
            TypeKind::Sequence(constructed) => {
                self.encode_constructed(model, constructed, false, value, buffer)
            }
            TypeKind::Set(constructed) => {
                self.encode_constructed(model, constructed, true, value, buffer)
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                let Some(elements) = value.as_list() else {
                    return Err(self.shape(node, value));
                };
                let bounds = self.length_bounds(node, elements.len(), buffer)?;
                let element = *element;
                self.encode_length(buffer, elements.len(), bounds, &mut |encoder, buf, range| {
                    for position in range {
                        encoder
                            .encode_node(model, element, &elements[position], buf)
                            .map_err(|e| e.at(position))?;
                    }
                    Ok(())
                })
            }
            TypeKind::Choice(choice) => self.encode_choice(model, choice, value, buffer),
        }
    }

    // Whole numbers and length determinants

    fn encode_integer(
        &self,
        node: &TypeNode,
        value: &BigInt,
        buffer: &mut BitString,
    ) -> Result<()> {
        let Some(constraint) = node.constraints.value() else {
            return self.encode_unconstrained_integer(value, None, buffer);
        };
        let in_root = constraint.constraint.contains(value);
        if constraint.extensible {
            buffer.push(!in_root);
            if !in_root {
                return self.encode_unconstrained_integer(value, None, buffer);
            }
        } else if !in_root {
            return Err(EncodeError::constraint_violation(
                value.clone(),
                constraint.constraint.0,
                self.codec(),
            ));
        }

        let bounds = constraint.constraint.0;
        match (bounds.as_start(), bounds.as_end()) {
            (Some(&lo), Some(&hi)) => {
                let value = value.to_i128().expect("value within closed i128 bounds");
                self.encode_constrained_whole_number(buffer, value, lo, hi);
                Ok(())
            }
            (Some(&lo), None) => self.encode_unconstrained_integer(value, Some(lo), buffer),
            _ => self.encode_unconstrained_integer(value, None, buffer),
        }
    }

    /// Semi-constrained and unconstrained whole numbers: a length determinant
    /// in octets, then the offset or two's-complement body.
    fn encode_unconstrained_integer(
        &self,
        value: &BigInt,
        lower: Option<i128>,
        buffer: &mut BitString,
    ) -> Result<()> {
        let octets = match lower {
            Some(lower) => unsigned_bytes_be(&(value - BigInt::from(lower)))
                .expect("semi-constrained values sit above their lower bound"),
            None => signed_bytes_be(value),
        };
        self.encode_octet_payload(buffer, &octets)
    }

    /// A constrained whole number in `[lo, hi]` (X.691 §11.5).
    fn encode_constrained_whole_number(
        &self,
        buffer: &mut BitString,
        value: i128,
        lo: i128,
        hi: i128,
    ) {
        let range = (hi - lo) as u128 + 1;
        if range == 1 {
            return;
        }
        let offset = (value - lo) as u128;
        if !self.options.aligned {
            push_uint(buffer, offset, log2_u128(range));
            return;
        }

        if range <= 255 {
            push_uint(buffer, offset, log2_u128(range));
        } else if range == 256 {
            self.pad_to_alignment(buffer);
            push_uint(buffer, offset, 8);
        } else if range <= SIXTY_FOUR_K as u128 {
            self.pad_to_alignment(buffer);
            push_uint(buffer, offset, 16);
        } else {
            let octets = octets_for(offset);
            let max_octets = octets_for(range - 1);
            self.encode_constrained_whole_number(buffer, octets as i128, 1, max_octets as i128);
            self.pad_to_alignment(buffer);
            push_uint(buffer, offset, octets * 8);
        }
    }

    /// A length determinant followed by content written through `write`,
    /// fragmenting into 16K blocks when no upper bound caps the length
    /// (X.691 §11.9). `write` receives unit ranges into the content.
    fn encode_length(
        &self,
        buffer: &mut BitString,
        length: usize,
        bounds: Option<Bounded<usize>>,
        write: &mut dyn FnMut(&Self, &mut BitString, core::ops::Range<usize>) -> Result<()>,
    ) -> Result<()> {
        if let Some(bounds) = bounds {
            let lo = bounds.minimum();
            if let Some(hi) = bounds.maximum() {
                if hi < SIXTY_FOUR_K as usize {
                    if lo != hi {
                        self.encode_constrained_whole_number(
                            buffer,
                            length as i128,
                            lo as i128,
                            hi as i128,
                        );
                    }
                    return write(self, buffer, 0..length);
                }
            }
        }

        let mut offset = 0usize;
        let mut remaining = length;
        loop {
            if remaining >= SIXTEEN_K as usize {
                let factor = (remaining / SIXTEEN_K as usize).min(4);
                let count = factor * SIXTEEN_K as usize;
                self.pad_to_alignment(buffer);
                buffer.push(true);
                buffer.push(true);
                push_uint(buffer, factor as u128, 6);
                write(self, buffer, offset..offset + count)?;
                offset += count;
                remaining -= count;
            } else if remaining >= 128 {
                self.pad_to_alignment(buffer);
                buffer.push(true);
                buffer.push(false);
                push_uint(buffer, remaining as u128, 14);
                return write(self, buffer, offset..offset + remaining);
            } else {
                self.pad_to_alignment(buffer);
                buffer.push(false);
                push_uint(buffer, remaining as u128, 7);
                return write(self, buffer, offset..offset + remaining);
            }
        }
    }

    /// A normally small length: extension-addition counts (X.691 §11.9.3.4).
    fn encode_normally_small_length(&self, buffer: &mut BitString, n: usize) -> Result<()> {
        debug_assert!(n >= 1);
        if n <= 64 {
            buffer.push(false);
            push_uint(buffer, (n - 1) as u128, 6);
            Ok(())
        } else {
            buffer.push(true);
            self.encode_length(buffer, n, None, &mut |_, _, _| Ok(()))
        }
    }

    /// A normally small non-negative whole number: extension indices
    /// (X.691 §11.6).
    fn encode_normally_small_number(&self, buffer: &mut BitString, n: usize) -> Result<()> {
        if n <= 63 {
            buffer.push(false);
            push_uint(buffer, n as u128, 6);
            Ok(())
        } else {
            buffer.push(true);
            let octets =
                unsigned_bytes_be(&BigInt::from(n)).expect("indices are non-negative");
            self.encode_octet_payload(buffer, &octets)
        }
    }

    /// A general length determinant in octets followed by the octets
    /// themselves; the shape of open types, unconstrained integers, and
    /// octet-carried payloads.
    fn encode_octet_payload(&self, buffer: &mut BitString, octets: &[u8]) -> Result<()> {
        self.encode_length(buffer, octets.len(), None, &mut |_, buf, range| {
            for &octet in &octets[range] {
                push_uint(buf, octet as u128, 8);
            }
            Ok(())
        })
    }

    /// Encodes a value as an open type: complete, octet-aligned, and length
    /// prefixed so unaware decoders can skip it (X.691 §11.2).
    fn encode_open_type(
        &self,
        model: &TypeModel,
        index: TypeIndex,
        value: &Value,
        buffer: &mut BitString,
    ) -> Result<()> {
        let octets = Encoder::new(self.options).encode_type(model, index, value)?;
        self.encode_octet_payload(buffer, &octets)
    }

    // Strings

    /// The effective size bounds for the value's length, pushing the
    /// extension bit when the constraint carries one. `Err` when a closed
    /// constraint excludes the length.
    fn length_bounds(
        &self,
        node: &TypeNode,
        length: usize,
        buffer: &mut BitString,
    ) -> Result<Option<Bounded<usize>>> {
        let Some(constraint) = node.constraints.size() else {
            return Ok(None);
        };
        let in_root = constraint.constraint.contains(&length);
        if constraint.extensible {
            buffer.push(!in_root);
            if !in_root {
                return Ok(None);
            }
        } else if !in_root {
            return Err(EncodeError::size_constraint_not_satisfied(
                length,
                constraint.constraint.0,
                self.codec(),
            ));
        }
        Ok(Some(constraint.constraint.0))
    }

    fn encode_bit_string(
        &self,
        node: &TypeNode,
        bits: &BitString,
        buffer: &mut BitString,
    ) -> Result<()> {
        let bounds = self.length_bounds(node, bits.len(), buffer)?;
        if let Some(bounds) = bounds {
            if let (lo, Some(hi)) = (bounds.minimum(), bounds.maximum()) {
                if lo == hi && hi < SIXTY_FOUR_K as usize {
                    // fixed size: in-line, bit-aligned up to 16 bits
                    if self.options.aligned && hi > 16 {
                        self.pad_to_alignment(buffer);
                    }
                    buffer.extend_from_bitslice(bits);
                    return Ok(());
                }
            }
        }
        let bits = bits.as_bitslice();
        let aligned = self.options.aligned;
        self.encode_length(buffer, bits.len(), bounds, &mut |encoder, buf, range| {
            if aligned && !range.is_empty() {
                encoder.pad_to_alignment(buf);
            }
            buf.extend_from_bitslice(&bits[range]);
            Ok(())
        })
    }

    fn encode_octet_string(
        &self,
        node: &TypeNode,
        octets: &[u8],
        buffer: &mut BitString,
    ) -> Result<()> {
        let bounds = self.length_bounds(node, octets.len(), buffer)?;
        if let Some(bounds) = bounds {
            if let (lo, Some(hi)) = (bounds.minimum(), bounds.maximum()) {
                if lo == hi && hi < SIXTY_FOUR_K as usize {
                    // fixed size: in-line, unpadded up to two octets
                    if self.options.aligned && hi > 2 {
                        self.pad_to_alignment(buffer);
                    }
                    for &octet in octets {
                        push_uint(buffer, octet as u128, 8);
                    }
                    return Ok(());
                }
            }
        }
        let aligned = self.options.aligned;
        self.encode_length(buffer, octets.len(), bounds, &mut |encoder, buf, range| {
            if aligned && !range.is_empty() {
                encoder.pad_to_alignment(buf);
            }
            for &octet in &octets[range] {
                push_uint(buf, octet as u128, 8);
            }
            Ok(())
        })
    }

    fn encode_character_string(
        &self,
        node: &TypeNode,
        kind: StringKind,
        text: &str,
        buffer: &mut BitString,
    ) -> Result<()> {
        for character in text.chars() {
            if !kind.permits(character) {
                return Err(EncodeError::alphabet_constraint_not_satisfied(
                    character,
                    self.codec(),
                ));
            }
        }

        if !kind.is_known_multiplier() {
            // size constraints on these kinds are not PER-visible; the value
            // rides as octets behind a general length determinant
            let octets = strings::to_octets(kind, text).map_err(|c| {
                EncodeError::alphabet_constraint_not_satisfied(c, self.codec())
            })?;
            return self.encode_octet_payload(buffer, &octets);
        }

        let char_count = text.chars().count();
        let bounds = self.length_bounds(node, char_count, buffer)?;

        let alphabet = node
            .constraints
            .permitted_alphabet()
            .filter(|alphabet| !alphabet.extensible)
            .map(|alphabet| alphabet.constraint.as_slice())
            .or_else(|| kind.canonical_alphabet());
        let width = self.character_width(effective_width(kind, alphabet));

        self.encode_known_multiplier_body(text, alphabet, width, bounds, buffer)
    }

    /// Shared known-multiplier body used for the restricted kinds and the
    /// time types' visible-string payloads.
    fn encode_known_multiplier(
        &self,
        text: &str,
        alphabet: Option<&[u32]>,
        canonical_width: u32,
        buffer: &mut BitString,
        bounds: Option<Bounded<usize>>,
    ) -> Result<()> {
        let width = self.character_width(canonical_width);
        self.encode_known_multiplier_body(text, alphabet, width, bounds, buffer)
    }

    fn encode_known_multiplier_body(
        &self,
        text: &str,
        alphabet: Option<&[u32]>,
        width: u32,
        bounds: Option<Bounded<usize>>,
        buffer: &mut BitString,
    ) -> Result<()> {
        // characters encode as their own value when every value fits the
        // width, otherwise as indices into the effective alphabet
        let direct = match alphabet {
            Some(alphabet) => {
                u128::from(alphabet.last().copied().unwrap_or(0)) < (1u128 << width.min(64))
            }
            None => true,
        };

        let values: Vec<u32> = match (direct, alphabet) {
            (true, _) => text.chars().map(u32::from).collect(),
            (false, Some(alphabet)) => {
                let mut values = Vec::with_capacity(text.len());
                for character in text.chars() {
                    let position = alphabet
                        .binary_search(&u32::from(character))
                        .map_err(|_| {
                            EncodeError::alphabet_constraint_not_satisfied(
                                character,
                                self.codec(),
                            )
                        })?;
                    values.push(position as u32);
                }
                values
            }
            (false, None) => unreachable!("direct is true without an alphabet"),
        };

        // a permitted-alphabet character outside the constraint
        if let Some(alphabet) = alphabet {
            if direct {
                for (character, _) in text.chars().zip(&values) {
                    if alphabet.binary_search(&u32::from(character)).is_err() {
                        return Err(EncodeError::alphabet_constraint_not_satisfied(
                            character,
                            self.codec(),
                        ));
                    }
                }
            }
        }

        let aligned = self.options.aligned;
        let large = match bounds.and_then(|b| b.maximum()) {
            Some(hi) => (hi as u128) * width as u128 > 16,
            None => true,
        };
        let fixed = bounds
            .map(|b| b.minimum() == b.maximum().unwrap_or(usize::MAX))
            .unwrap_or(false);

        if fixed && bounds.map_or(false, |b| b.maximum().unwrap_or(0) < SIXTY_FOUR_K as usize) {
            if aligned && large {
                self.pad_to_alignment(buffer);
            }
            for &value in &values {
                push_uint(buffer, value as u128, width);
            }
            return Ok(());
        }

        self.encode_length(buffer, values.len(), bounds, &mut |encoder, buf, range| {
            if aligned && large && !range.is_empty() {
                encoder.pad_to_alignment(buf);
            }
            for &value in &values[range] {
                push_uint(buf, value as u128, width);
            }
            Ok(())
        })
    }

    fn character_width(&self, width: u32) -> u32 {
        if self.options.aligned && width > 0 && !width.is_power_of_two() {
            width.next_power_of_two()
        } else {
            width
        }
    }

    // Constructed types

    fn encode_constructed(
        &self,
        model: &TypeModel,
        constructed: &ConstructedType,
        is_set: bool,
        value: &Value,
        buffer: &mut BitString,
    ) -> Result<()> {
        let Some(members) = value.as_sequence() else {
            return Err(EncodeError::shape_mismatch(
                if is_set { "SET" } else { "SEQUENCE" },
                value.shape(),
                self.codec(),
            ));
        };
        for name in members.keys() {
            if !constructed.members.iter().any(|member| &member.name == name) {
                return Err(EncodeError::unknown_member(name, self.codec()));
            }
        }

        let additions = constructed.extension_additions();
        let present: Vec<bool> = additions
            .iter()
            .map(|addition| {
                addition
                    .iter()
                    .any(|member| members.contains_key(&member.name))
            })
            .collect();
        let extensions_present = present.iter().any(|&bit| bit);
        if constructed.extensible {
            buffer.push(extensions_present);
        }

        let mut root: Vec<&Member> = constructed.root_members().collect();
        if is_set {
            // canonical order for SET components
            root.sort_by_key(|member| model.first_tag(member.ty));
        }

        self.encode_member_run(model, &root, members, buffer)?;

        if !extensions_present {
            return Ok(());
        }
        self.encode_normally_small_length(buffer, additions.len())?;
        for &bit in &present {
            buffer.push(bit);
        }
        for (addition, &bit) in additions.iter().zip(&present) {
            if !bit {
                continue;
            }
            if let [member] = addition.as_slice() {
                let member_value = members
                    .get(&member.name)
                    .expect("presence bit implies the member is present");
                let mut open = BitString::default();
                self.encode_node(model, member.ty, member_value, &mut open)
                    .map_err(|e| e.at(member.name.as_str()))?;
                let octets = finish_bits(open);
                self.encode_octet_payload(buffer, &octets)?;
            } else {
                // an addition group rides as a nested sequence in an open type
                let mut open = BitString::default();
                self.encode_member_run(model, addition, members, &mut open)?;
                let octets = finish_bits(open);
                self.encode_octet_payload(buffer, &octets)?;
            }
        }
        Ok(())
    }

    /// The optional/default presence bitmap followed by the member
    /// encodings, for a root component list or an addition group.
    fn encode_member_run(
        &self,
        model: &TypeModel,
        run: &[&Member],
        members: &BTreeMap<String, Value>,
        buffer: &mut BitString,
    ) -> Result<()> {
        for member in run {
            if member.is_optional_or_default() {
                buffer.push(self.member_is_encoded(member, members));
            }
        }
        for member in run {
            match members.get(&member.name) {
                Some(value) => {
                    if member.default.as_ref() == Some(value) {
                        continue;
                    }
                    self.encode_node(model, member.ty, value, buffer)
                        .map_err(|e| e.at(member.name.as_str()))?;
                }
                None if member.is_optional_or_default() => {}
                None => {
                    return Err(EncodeError::required_member_missing(
                        &member.name,
                        self.codec(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn member_is_encoded(&self, member: &Member, members: &BTreeMap<String, Value>) -> bool {
        match members.get(&member.name) {
            Some(value) => member.default.as_ref() != Some(value),
            None => false,
        }
    }

    fn encode_choice(
        &self,
        model: &TypeModel,
        choice: &ChoiceType,
        value: &Value,
        buffer: &mut BitString,
    ) -> Result<()> {
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

        if variant.extension {
            buffer.push(true);
            let index = choice
                .extension_variants()
                .position(|candidate| candidate.name == variant.name)
                .expect("extension variants contain the selected one");
            self.encode_normally_small_number(buffer, index)?;
            return self
                .encode_open_type(model, variant.ty, payload, buffer)
                .map_err(|e| e.at(selector));
        }

        if choice.extensible {
            buffer.push(false);
        }
        let sorted = sorted_root_variants(model, choice);
        let index = sorted
            .iter()
            .position(|candidate| candidate.name == variant.name)
            .expect("root variants contain the selected one");
        if sorted.len() > 1 {
            self.encode_constrained_whole_number(
                buffer,
                index as i128,
                0,
                sorted.len() as i128 - 1,
            );
        }
        self.encode_node(model, variant.ty, payload, buffer)
            .map_err(|e| e.at(selector))
    }

    fn shape(&self, node: &TypeNode, value: &Value) -> EncodeError {
        EncodeError::shape_mismatch(node.kind.name(), value.shape(), self.codec())
    }

    fn pad_to_alignment(&self, buffer: &mut BitString) {
        if self.options.aligned && buffer.len() % 8 != 0 {
            for _ in 0..(8 - buffer.len() % 8) {
                buffer.push(false);
            }
        }
    }
}

/// Root alternatives in canonical tag order, the order PER indexes them in.
pub(crate) fn sorted_root_variants<'model>(
    model: &TypeModel,
    choice: &'model ChoiceType,
) -> Vec<&'model Variant> {
    let mut variants: Vec<&Variant> = choice.root_variants().collect();
    variants.sort_by_key(|variant| model.first_tag(variant.ty));
    variants
}

/// The canonical per-character width of a kind, or the width the effective
/// alphabet needs.
pub(crate) fn effective_width(kind: StringKind, alphabet: Option<&[u32]>) -> u32 {
    match alphabet {
        Some(alphabet) if alphabet.len() > 1 => log2_u128(alphabet.len() as u128),
        Some(_) => 0,
        None => kind.canonical_width().unwrap_or(8),
    }
}

pub(crate) fn log2_u128(range: u128) -> u32 {
    u128::BITS - (range - 1).leading_zeros()
}

fn octets_for(value: u128) -> u32 {
    (((u128::BITS - value.leading_zeros()) + 7) / 8).max(1)
}

pub(crate) fn push_uint(buffer: &mut BitString, value: u128, width: u32) {
    for position in (0..width).rev() {
        buffer.push((value >> position) & 1 == 1);
    }
}

/// Pads a bit buffer to whole octets; an empty buffer becomes one zero
/// octet, the minimum open-type payload.
fn finish_bits(bits: BitString) -> Vec<u8> {
    if bits.is_empty() {
        vec![0]
    } else {
        crate::bits::bits_to_bytes(&bits)
    }
}
