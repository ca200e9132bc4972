//! # Octet Encoding Rules.
//!
//! Byte-oriented like BER but tagless like PER (X.696). Encoding follows the
//! canonical variant: presence bits over preamble octets, fixed-width
//! integer forms picked from the root value range, and length-prefixed open
//! types for extensions.

pub mod de;
pub mod enc;

use crate::error::{DecodeError, EncodeError};
use crate::types::{TypeIndex, TypeModel};
use crate::value::Value;

/// Attempts to encode `value` as the type at `index` to OER.
pub fn encode(
    model: &TypeModel,
    index: TypeIndex,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    enc::Encoder::new().encode_type(model, index, value)
}

/// Attempts to decode one complete OER value of the type at `index`,
/// rejecting trailing input.
pub fn decode(model: &TypeModel, index: TypeIndex, input: &[u8]) -> Result<Value, DecodeError> {
    let (value, remainder) = decode_with_remainder(model, index, input)?;
    if !remainder.is_empty() {
        return Err(DecodeError::trailing_data(remainder.len(), crate::Codec::Oer));
    }
    Ok(value)
}

/// Attempts to decode one complete OER value of the type at `index`,
/// returning the decoded value and the remaining input.
pub fn decode_with_remainder<'input>(
    model: &TypeModel,
    index: TypeIndex,
    input: &'input [u8],
) -> Result<(Value, &'input [u8]), DecodeError> {
    de::Decoder::new().decode_type(model, index, input)
}

/// The fixed-width or variable integer forms of X.696 §10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IntegerForm {
    FixedUnsigned(u32),
    FixedSigned(u32),
    VariableUnsigned,
    VariableSigned,
}

/// The integer form for a node, served from the resolve-time hint when one
/// was derived.
pub(crate) fn integer_form(node: &crate::types::TypeNode) -> IntegerForm {
    match node.hints.oer_int {
        Some(crate::types::IntegerWidth::Unsigned(octets)) => IntegerForm::FixedUnsigned(octets),
        Some(crate::types::IntegerWidth::Signed(octets)) => IntegerForm::FixedSigned(octets),
        None => variable_integer_form(node.constraints.value()),
    }
}

fn variable_integer_form(
    constraint: Option<&crate::types::Extensible<crate::types::constraints::Value>>,
) -> IntegerForm {
    let Some(constraint) = constraint.filter(|constraint| !constraint.extensible) else {
        return IntegerForm::VariableSigned;
    };
    let bounds = constraint.constraint.0;
    let Some(&lo) = bounds.as_start() else {
        return IntegerForm::VariableSigned;
    };
    if lo >= 0 {
        match bounds.as_end() {
            Some(&hi) if hi <= u8::MAX as i128 => IntegerForm::FixedUnsigned(1),
            Some(&hi) if hi <= u16::MAX as i128 => IntegerForm::FixedUnsigned(2),
            Some(&hi) if hi <= u32::MAX as i128 => IntegerForm::FixedUnsigned(4),
            Some(&hi) if hi <= u64::MAX as i128 => IntegerForm::FixedUnsigned(8),
            _ => IntegerForm::VariableUnsigned,
        }
    } else {
        match bounds.as_end() {
            Some(&hi) if lo >= i8::MIN as i128 && hi <= i8::MAX as i128 => {
                IntegerForm::FixedSigned(1)
            }
            Some(&hi) if lo >= i16::MIN as i128 && hi <= i16::MAX as i128 => {
                IntegerForm::FixedSigned(2)
            }
            Some(&hi) if lo >= i32::MIN as i128 && hi <= i32::MAX as i128 => {
                IntegerForm::FixedSigned(4)
            }
            Some(&hi) if lo >= i64::MIN as i128 && hi <= i64::MAX as i128 => {
                IntegerForm::FixedSigned(8)
            }
            _ => IntegerForm::VariableSigned,
        }
    }
}

/// A fixed, length-free size, derived at resolve time from a
/// non-extensible single-valued `SIZE` constraint.
pub(crate) fn fixed_size(node: &crate::types::TypeNode) -> Option<usize> {
    node.hints.fixed_size
}
