//! # Canonical Encoding Rules.

use crate::ber::{de, enc};
use crate::error::{DecodeError, EncodeError};
use crate::types::{TypeIndex, TypeModel};
use crate::value::Value;

/// Attempts to encode `value` as the type at `index` to CER.
pub fn encode(
    model: &TypeModel,
    index: TypeIndex,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    enc::Encoder::new(enc::EncoderOptions::cer()).encode_type(model, index, value)
}

/// Attempts to decode one complete CER value of the type at `index`,
/// rejecting trailing input.
pub fn decode(model: &TypeModel, index: TypeIndex, input: &[u8]) -> Result<Value, DecodeError> {
    let (value, remainder) = decode_with_remainder(model, index, input)?;
    if !remainder.is_empty() {
        return Err(DecodeError::trailing_data(remainder.len(), crate::Codec::Cer));
    }
    Ok(value)
}

/// Attempts to decode one complete CER value of the type at `index`,
/// returning the decoded value and the remaining input.
pub fn decode_with_remainder<'input>(
    model: &TypeModel,
    index: TypeIndex,
    input: &'input [u8],
) -> Result<(Value, &'input [u8]), DecodeError> {
    de::Decoder::new(de::DecoderOptions::cer()).decode_type(model, index, input)
}
