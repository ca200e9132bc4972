//! # Packed Encoding Rules.
//!
//! The bit-oriented engine behind aligned PER and [UPER](crate::uper). The
//! functions here select the aligned variant; `uper` selects the unaligned
//! one over the same machinery.

pub mod de;
pub mod enc;

use crate::error::{DecodeError, EncodeError};
use crate::types::{TypeIndex, TypeModel};
use crate::value::Value;

pub(crate) const SIXTEEN_K: u16 = 16384;
pub(crate) const SIXTY_FOUR_K: u32 = 65536;

/// Attempts to encode `value` as the type at `index` to aligned PER.
pub fn encode(
    model: &TypeModel,
    index: TypeIndex,
    value: &Value,
) -> Result<Vec<u8>, EncodeError> {
    enc::Encoder::new(enc::EncoderOptions::aligned()).encode_type(model, index, value)
}

/// Attempts to decode one complete aligned-PER value of the type at `index`,
/// rejecting trailing input.
pub fn decode(model: &TypeModel, index: TypeIndex, input: &[u8]) -> Result<Value, DecodeError> {
    let (value, remainder) = decode_with_remainder(model, index, input)?;
    if !remainder.is_empty() {
        return Err(DecodeError::trailing_data(remainder.len(), crate::Codec::Per));
    }
    Ok(value)
}

/// Attempts to decode one complete aligned-PER value of the type at `index`,
/// returning the decoded value and the remaining whole octets.
pub fn decode_with_remainder<'input>(
    model: &TypeModel,
    index: TypeIndex,
    input: &'input [u8],
) -> Result<(Value, &'input [u8]), DecodeError> {
    de::Decoder::new(de::DecoderOptions::aligned()).decode_type(model, index, input)
}
