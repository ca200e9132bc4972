use crate::error::{DecodeError, EncodeError};
use crate::types::{TypeIndex, TypeModel};
use crate::value::Value;

/// The wire formats a schema can be bound to.
#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Hash)]
#[non_exhaustive]
pub enum Codec {
    /// X.690 — Basic Encoding Rules
    Ber,
    /// X.690 — Canonical Encoding Rules
    Cer,
    /// X.690 — Distinguished Encoding Rules
    Der,
    /// X.696 — Octet Encoding Rules
    Oer,
    /// X.691 — Packed Encoding Rules (Aligned)
    Per,
    /// X.691 — Packed Encoding Rules (Unaligned)
    Uper,
}

impl core::fmt::Display for Codec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ber => write!(f, "BER"),
            Self::Cer => write!(f, "CER"),
            Self::Der => write!(f, "DER"),
            Self::Oer => write!(f, "OER"),
            Self::Per => write!(f, "PER"),
            Self::Uper => write!(f, "UPER"),
        }
    }
}

impl Codec {
    /// Encodes `value` as the type at `index` under this set of rules.
    pub(crate) fn encode_value(
        self,
        model: &TypeModel,
        index: TypeIndex,
        value: &Value,
    ) -> Result<Vec<u8>, EncodeError> {
        match self {
            Self::Ber => crate::ber::encode(model, index, value),
            Self::Cer => crate::cer::encode(model, index, value),
            Self::Der => crate::der::encode(model, index, value),
            Self::Oer => crate::oer::encode(model, index, value),
            Self::Per => crate::per::encode(model, index, value),
            Self::Uper => crate::uper::encode(model, index, value),
        }
    }

    /// Decodes one value of the type at `index`, returning it along with the
    /// unconsumed remainder of `input`.
    pub(crate) fn decode_value<'input>(
        self,
        model: &TypeModel,
        index: TypeIndex,
        input: &'input [u8],
    ) -> Result<(Value, &'input [u8]), DecodeError> {
        match self {
            Self::Ber => crate::ber::decode_with_remainder(model, index, input),
            Self::Cer => crate::cer::decode_with_remainder(model, index, input),
            Self::Der => crate::der::decode_with_remainder(model, index, input),
            Self::Oer => crate::oer::decode_with_remainder(model, index, input),
            Self::Per => crate::per::decode_with_remainder(model, index, input),
            Self::Uper => crate::uper::decode_with_remainder(model, index, input),
        }
    }
}
