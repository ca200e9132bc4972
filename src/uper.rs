//! # Unaligned Packed Encoding Rules.

use crate::error::{DecodeError, EncodeError};
use crate::per::{de, enc};
use crate::types::{TypeIndex, TypeModel};
use crate::value::Value;

/// Attempts to encode `value` as the type at `index` to UPER.
pub fn encode(
    model: &TypeModel,
    index: TypeIndex,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    enc::Encoder::new(enc::EncoderOptions::unaligned()).encode_type(model, index, value)
}

/// Attempts to decode one complete UPER value of the type at `index`,
/// rejecting trailing input.
pub fn decode(model: &TypeModel, index: TypeIndex, input: &[u8]) -> Result<Value, DecodeError> {
    let (value, remainder) = decode_with_remainder(model, index, input)?;
    if !remainder.is_empty() {
        return Err(DecodeError::trailing_data(remainder.len(), crate::Codec::Uper));
    }
    Ok(value)
}

/// Attempts to decode one complete UPER value of the type at `index`,
/// returning the decoded value and the remaining whole octets.
pub fn decode_with_remainder<'input>(
    model: &TypeModel,
    index: TypeIndex,
    input: &'input [u8],
) -> Result<(Value, &'input [u8]), DecodeError> {
    de::Decoder::new(de::DecoderOptions::unaligned()).decode_type(model, index, input)
}
