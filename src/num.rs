//! Module for different number-related functions which are used in the library.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Number of bits needed to distinguish `x` values.
pub(crate) const fn log2(x: i128) -> u32 {
    i128::BITS - (x - 1).leading_zeros()
}

/// The minimal two's-complement big-endian octets of `value`, never empty.
pub(crate) fn signed_bytes_be(value: &BigInt) -> Vec<u8> {
    let bytes = value.to_signed_bytes_be();
    if bytes.is_empty() {
        vec![0]
    } else {
        bytes
    }
}

/// The minimal unsigned big-endian octets of a non-negative `value`, never
/// empty. Returns `None` for negative values.
pub(crate) fn unsigned_bytes_be(value: &BigInt) -> Option<Vec<u8>> {
    if value.is_negative() {
        return None;
    }
    if value.is_zero() {
        return Some(vec![0]);
    }
    Some(value.magnitude().to_bytes_be())
}

/// Big-endian octets of `value` in exactly `octets` bytes, two's complement
/// when `signed`. `None` when the value does not fit.
pub(crate) fn fixed_width_bytes_be(value: &BigInt, octets: usize, signed: bool) -> Option<Vec<u8>> {
    let mut bytes = if signed {
        signed_bytes_be(value)
    } else {
        unsigned_bytes_be(value)?
    };
    // Unsigned values may carry a sign-preserving leading zero.
    while bytes.len() > 1 && !signed && bytes[0] == 0 {
        bytes.remove(0);
    }
    if bytes.len() > octets {
        return None;
    }
    let fill = if signed && value.is_negative() { 0xFF } else { 0x00 };
    let mut out = vec![fill; octets - bytes.len()];
    out.append(&mut bytes);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_widths() {
        assert_eq!(log2(2), 1);
        assert_eq!(log2(3), 2);
        assert_eq!(log2(256), 8);
        assert_eq!(log2(257), 9);
    }

    #[test]
    fn signed_bytes_of_zero() {
        assert_eq!(signed_bytes_be(&BigInt::zero()), vec![0]);
        assert_eq!(signed_bytes_be(&BigInt::from(128)), vec![0x00, 0x80]);
        assert_eq!(signed_bytes_be(&BigInt::from(-128)), vec![0x80]);
    }

    #[test]
    fn fixed_width() {
        assert_eq!(
            fixed_width_bytes_be(&BigInt::from(5), 2, false),
            Some(vec![0x00, 0x05])
        );
        assert_eq!(
            fixed_width_bytes_be(&BigInt::from(-1), 2, true),
            Some(vec![0xFF, 0xFF])
        );
        assert_eq!(fixed_width_bytes_be(&BigInt::from(256), 1, false), None);
    }
}
