//! # Basic Encoding Rules.
//!
//! The tag-length-value engine behind BER and its canonical variants. The
//! [`der`](crate::der) and [`cer`](crate::cer) modules select the stricter
//! rule sets over the same machinery.

pub mod de;
pub mod enc;
pub mod identifier;
pub mod rules;

use crate::error::{DecodeError, EncodeError};
use crate::types::{TypeIndex, TypeModel};
use crate::value::Value;

/// Attempts to encode `value` as the type at `index` to BER.
pub fn encode(
    model: &TypeModel,
    index: TypeIndex,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    enc::Encoder::new(enc::EncoderOptions::ber()).encode_type(model, index, value)
}

/// Attempts to decode one complete BER value of the type at `index`,
/// rejecting trailing input.
pub fn decode(model: &TypeModel, index: TypeIndex, input: &[u8]) -> Result<Value, DecodeError> {
    let (value, remainder) = decode_with_remainder(model, index, input)?;
    if !remainder.is_empty() {
        return Err(DecodeError::trailing_data(remainder.len(), crate::Codec::Ber));
    }
    Ok(value)
}

/// Attempts to decode one complete BER value of the type at `index`,
/// returning the decoded value and the remaining input.
pub fn decode_with_remainder<'input>(
    model: &TypeModel,
    index: TypeIndex,
    input: &'input [u8],
) -> Result<(Value, &'input [u8]), DecodeError> {
    de::Decoder::new(de::DecoderOptions::ber()).decode_type(model, index, input)
}
