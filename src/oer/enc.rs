//! Encoding values into Octet Encoding Rules data.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use super::{fixed_size, integer_form, IntegerForm};
use crate::ber::enc::{encode_as_base128, oid_contents, real_contents, time_text};
use crate::bits::{bits_to_bytes, octet_string_ascending};
use crate::error::EncodeError;
use crate::num::{fixed_width_bytes_be, signed_bytes_be, unsigned_bytes_be};
use crate::types::{
    strings, BitString, Class, ConstructedType, Member, Tag, TypeIndex, TypeKind, TypeModel,
    TypeNode,
};
use crate::value::Value;

type Result<T, E = EncodeError> = core::result::Result<T, E>;

/// An OER encoder driven by a resolved [`TypeModel`]. Only the canonical
/// variant is produced, which keeps encodings unique and reproducible.
pub struct Encoder;

impl Encoder {
    pub fn new() -> Self {
        Self
    }

    fn codec(&self) -> crate::Codec {
        crate::Codec::Oer
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
            TypeKind::Boolean => {
                let Some(value) = value.as_bool() else {
                    return Err(self.shape(node, value));
                };
                output.push(if value { 0xFF } else { 0x00 });
                Ok(())
            }
            TypeKind::Integer(_) => {
                let Some(value) = value.as_integer() else {
                    return Err(self.shape(node, value));
                };
                self.check_value_constraint(node, value)?;
                self.encode_integer(node, value, output)
            }
            TypeKind::Enumerated(enumeration) => {
                let number = match value {
                    Value::Enumerated(name) => enumeration.value_of(name).ok_or_else(|| {
                        EncodeError::unknown_enum_item(name, self.codec())
                    })?,
                    Value::Integer(number) => {
                        number.to_i64().ok_or_else(|| self.shape(node, value))?
                    }
                    _ => return Err(self.shape(node, value)),
                };
                if (0..=127).contains(&number) {
                    output.push(number as u8);
                } else {
                    let octets = signed_bytes_be(&BigInt::from(number));
                    output.push(0x80 | octets.len() as u8);
                    output.extend(octets);
                }
                Ok(())
            }
            TypeKind::Real => {
                let number = match value {
                    Value::Real(number) => *number,
                    Value::Integer(number) => {
                        number.to_f64().ok_or_else(|| self.shape(node, value))?
                    }
                    _ => return Err(self.shape(node, value)),
                };
                let contents = real_contents(number);
                self.encode_length(output, contents.len());
                output.extend(contents);
                Ok(())
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
                self.encode_length(output, contents.len());
                output.extend(contents);
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
                self.encode_length(output, contents.len());
                output.extend(contents);
                Ok(())
            }
            TypeKind::BitString(_) => {
                let Value::BitString(bits) = value else {
                    return Err(self.shape(node, value));
                };
                self.check_size_constraint(node, bits.len())?;
                if let Some(size) = fixed_size(node) {
                    debug_assert_eq!(bits.len(), size);
                    output.extend(bits_to_bytes(bits));
                } else {
                    let payload = bits_to_bytes(bits);
                    let unused = (payload.len() * 8 - bits.len()) as u8;
                    self.encode_length(output, payload.len() + 1);
                    output.push(unused);
                    output.extend(payload);
                }
                Ok(())
            }
            TypeKind::OctetString => {
                let Value::OctetString(octets) = value else {
                    return Err(self.shape(node, value));
                };
                self.check_size_constraint(node, octets.len())?;
                if fixed_size(node).is_none() {
                    self.encode_length(output, octets.len());
                }
                output.extend(octets);
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
                // single-octet kinds with a fixed size carry no determinant
                let fixed = fixed_size(node)
                    .filter(|size| size * strings::octets_per_character(*kind) == octets.len());
                if fixed.is_none() {
                    self.encode_length(output, octets.len());
                }
                output.extend(octets);
                Ok(())
            }
            TypeKind::ObjectDescriptor => {
                let Some(text) = value.as_text() else {
                    return Err(self.shape(node, value));
                };
                let octets = strings::to_octets(crate::types::StringKind::Graphic, text)
                    .map_err(|character| {
                        EncodeError::alphabet_constraint_not_satisfied(character, self.codec())
                    })?;
                self.encode_length(output, octets.len());
                output.extend(octets);
                Ok(())
            }
            TypeKind::Time(kind) => {
                let text = time_text(*kind, value).ok_or_else(|| self.shape(node, value))?;
                self.encode_length(output, text.len());
                output.extend(text.into_bytes());
                Ok(())
            }
            TypeKind::Any => {
                let Value::Any(octets) = value else {
                    return Err(self.shape(node, value));
                };
                self.encode_length(output, octets.len());
                output.extend(octets);
                Ok(())
            }
            TypeKind::Sequence(constructed) => {
                self.encode_constructed(model, constructed, false, value, output)
            }
            TypeKind::Set(constructed) => {
                self.encode_constructed(model, constructed, true, value, output)
            }
            TypeKind::SequenceOf(element) | TypeKind::SetOf(element) => {
                let Some(elements) = value.as_list() else {
                    return Err(self.shape(node, value));
                };
                self.check_size_constraint(node, elements.len())?;
                let quantity = unsigned_bytes_be(&BigInt::from(elements.len()))
                    .expect("lengths are non-negative");
                output.push(quantity.len() as u8);
                output.extend(quantity);

                let mut pieces = Vec::with_capacity(elements.len());
                for (position, element_value) in elements.iter().enumerate() {
                    let mut piece = Vec::new();
                    self.encode_node(model, *element, element_value, &mut piece)
                        .map_err(|e| e.at(position))?;
                    pieces.push(piece);
                }
                if matches!(node.kind, TypeKind::SetOf(_)) {
                    pieces.sort_by(octet_string_ascending);
                }
                output.extend(pieces.concat());
                Ok(())
            }
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
                let variant = choice.variant(selector).ok_or_else(|| {
                    EncodeError::variant_not_in_choice(selector, self.codec())
                })?;
                let tag = model.first_tag(variant.ty).ok_or_else(|| {
                    EncodeError::custom(
                        "cannot encode an untagged open alternative",
                        self.codec(),
                    )
                })?;
                self.encode_tag(tag, output);
                if variant.extension {
                    let mut open = Vec::new();
                    self.encode_node(model, variant.ty, payload, &mut open)
                        .map_err(|e| e.at(selector))?;
                    self.encode_length(output, open.len());
                    output.extend(open);
                } else {
                    self.encode_node(model, variant.ty, payload, output)
                        .map_err(|e| e.at(selector))?;
                }
                Ok(())
            }
        }
    }

    fn encode_integer(
        &self,
        node: &TypeNode,
        value: &BigInt,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        match integer_form(node) {
            IntegerForm::FixedUnsigned(octets) => {
                let bytes = fixed_width_bytes_be(value, octets as usize, false)
                    .expect("value fits the checked range");
                output.extend(bytes);
            }
            IntegerForm::FixedSigned(octets) => {
                let bytes = fixed_width_bytes_be(value, octets as usize, true)
                    .expect("value fits the checked range");
                output.extend(bytes);
            }
            IntegerForm::VariableUnsigned => {
                let bytes = unsigned_bytes_be(value).ok_or_else(|| {
                    EncodeError::constraint_violation(
                        value.clone(),
                        crate::types::Bounded::start_from(0),
                        self.codec(),
                    )
                })?;
                self.encode_length(output, bytes.len());
                output.extend(bytes);
            }
            IntegerForm::VariableSigned => {
                let bytes = signed_bytes_be(value);
                self.encode_length(output, bytes.len());
                output.extend(bytes);
            }
        }
        Ok(())
    }

    fn encode_constructed(
        &self,
        model: &TypeModel,
        constructed: &ConstructedType,
        is_set: bool,
        value: &Value,
        output: &mut Vec<u8>,
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

        let mut root: Vec<&Member> = constructed.root_members().collect();
        if is_set {
            root.sort_by_key(|member| model.first_tag(member.ty));
        }

        // preamble: extension bit, then presence bits, zero padded to octets
        let mut preamble = BitString::new();
        if constructed.extensible {
            preamble.push(extensions_present);
        }
        for member in &root {
            if member.is_optional_or_default() {
                preamble.push(self.member_is_encoded(member, members));
            }
        }
        output.extend(bits_to_bytes(&preamble));

        self.encode_member_run(model, &root, members, output)?;

        if !extensions_present {
            return Ok(());
        }

        // the extension-presence bitmap rides as a length-prefixed bit
        // string: unused-bit octet plus the bitmap octets
        let mut bitmap = BitString::new();
        for &bit in &present {
            bitmap.push(bit);
        }
        let bitmap_octets = bits_to_bytes(&bitmap);
        let unused = (bitmap_octets.len() * 8 - bitmap.len()) as u8;
        self.encode_length(output, bitmap_octets.len() + 1);
        output.push(unused);
        output.extend(bitmap_octets);

        for (addition, &bit) in additions.iter().zip(&present) {
            if !bit {
                continue;
            }
            let mut open = Vec::new();
            if let [member] = addition.as_slice() {
                let member_value = members
                    .get(&member.name)
                    .expect("presence bit implies the member is present");
                self.encode_node(model, member.ty, member_value, &mut open)
                    .map_err(|e| e.at(member.name.as_str()))?;
            } else {
                // an addition group rides as a nested preamble + members
                let mut group_preamble = BitString::new();
                for member in addition {
                    if member.is_optional_or_default() {
                        group_preamble.push(self.member_is_encoded(member, members));
                    }
                }
                open.extend(bits_to_bytes(&group_preamble));
                self.encode_member_run(model, addition, members, &mut open)?;
            }
            self.encode_length(output, open.len());
            output.extend(open);
        }
        Ok(())
    }

    fn encode_member_run(
        &self,
        model: &TypeModel,
        run: &[&Member],
        members: &BTreeMap<String, Value>,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        for member in run {
            match members.get(&member.name) {
                Some(value) => {
                    if member.default.as_ref() == Some(value) {
                        continue;
                    }
                    self.encode_node(model, member.ty, value, output)
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

    /// A tag as X.696 §8.7 encodes it: two class bits, then a 6-bit number
    /// or `111111` plus base-128 octets.
    fn encode_tag(&self, tag: Tag, output: &mut Vec<u8>) {
        let class = match tag.class {
            Class::Universal => 0u8,
            Class::Application => 1,
            Class::Context => 2,
            Class::Private => 3,
        };
        if tag.value < 0x3F {
            output.push(class << 6 | tag.value as u8);
        } else {
            output.push(class << 6 | 0x3F);
            encode_as_base128(tag.value, output);
        }
    }

    /// X.696 length determinants match BER definite lengths: short form
    /// below 128, otherwise `0x80 | n` followed by `n` big-endian octets.
    fn encode_length(&self, output: &mut Vec<u8>, length: usize) {
        if length < 128 {
            output.push(length as u8);
        } else {
            let octets = unsigned_bytes_be(&BigInt::from(length)).expect("non-negative");
            output.push(0x80 | octets.len() as u8);
            output.extend(octets);
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
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
