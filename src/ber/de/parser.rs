//! `nom` primitives for tag-length-value headers.

use nom::IResult;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::ber::identifier::Identifier;
use crate::types::Class;

/// A parsed length field. `value` of `None` is the indefinite form.
/// `minimal` is false for long forms that fit the short form or carry
/// leading zero octets, which DER and CER reject.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParsedLength {
    pub value: Option<usize>,
    pub minimal: bool,
}

pub(crate) fn parse_identifier_octet(input: &[u8]) -> IResult<&[u8], Identifier> {
    use nom::error::ParseError;

    let (input, identifier) = parse_initial_octet(input)?;

    let (input, tag) = if identifier.tag.value >= 0x1f {
        let (input, tag) = parse_encoded_number(input)?;
        match tag.to_u32() {
            Some(value) => (input, value),
            None => {
                return Err(nom::Err::Failure(<_>::from_error_kind(
                    input,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
        }
    } else {
        (input, identifier.tag.value)
    };

    Ok((input, identifier.tag(tag)))
}

pub(crate) fn parse_encoded_number(input: &[u8]) -> IResult<&[u8], BigInt> {
    let (input, body) = nom::bytes::streaming::take_while(|i| i & 0x80 != 0)(input)?;
    let (input, end) = nom::bytes::streaming::take(1usize)(input)?;

    Ok((input, concat_number(body, end[0])))
}

fn parse_initial_octet(input: &[u8]) -> IResult<&[u8], Identifier> {
    let (input, octet) = nom::bytes::streaming::take(1usize)(input)?;
    let initial_octet = octet[0];

    let class_bits = (initial_octet & 0xC0) >> 6;
    let class = Class::from_u8(class_bits);
    let constructed = (initial_octet & 0x20) != 0;
    let tag = (initial_octet & 0x1f) as u32;

    Ok((input, Identifier::new(class, constructed, tag)))
}

pub(crate) fn parse_length(input: &[u8]) -> IResult<&[u8], ParsedLength> {
    use nom::error::ParseError;

    let (input, first) = nom::bytes::streaming::take(1usize)(input)?;
    match first[0] {
        0x80 => Ok((
            input,
            ParsedLength {
                value: None,
                minimal: true,
            },
        )),
        0xFF => Err(nom::Err::Failure(<_>::from_error_kind(
            input,
            nom::error::ErrorKind::Tag,
        ))),
        short @ 0..=0x7F => Ok((
            input,
            ParsedLength {
                value: Some(short as usize),
                minimal: true,
            },
        )),
        long => {
            let count = (long & 0x7F) as usize;
            let (input, octets) = nom::bytes::streaming::take(count)(input)?;
            let length = BigInt::from_bytes_be(num_bigint::Sign::Plus, octets);
            let Some(length) = length.to_usize() else {
                return Err(nom::Err::Failure(<_>::from_error_kind(
                    input,
                    nom::error::ErrorKind::TooLarge,
                )));
            };
            let minimal = octets.first() != Some(&0) && length > 127;
            Ok((
                input,
                ParsedLength {
                    value: Some(length),
                    minimal,
                },
            ))
        }
    }
}

/// Concatenates a series of 7 bit numbers delimited by `1`'s and
/// ended by a `0` in the 8th bit.
pub(crate) fn concat_number(body: &[u8], start: u8) -> BigInt {
    let start = BigInt::from(start);
    if body.is_empty() {
        return start;
    }

    let mut number = BigInt::from(body[0] & 0x7F);

    for byte in body[1..].iter() {
        number <<= 7usize;
        number |= BigInt::from(byte & 0x7F);
    }

    (number << 7usize) | start
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tag;

    #[test]
    fn long_tag() {
        let (_, identifier) = parse_identifier_octet(&[0xFF, 0x83, 0x7F]).unwrap();
        assert!(identifier.is_constructed());
        assert_eq!(Tag::new(Class::Private, 511), identifier.tag);
    }

    #[test]
    fn short_and_long_lengths() {
        let (_, length) = parse_length(&[0x05]).unwrap();
        assert_eq!(length.value, Some(5));
        assert!(length.minimal);

        let (_, length) = parse_length(&[0x81, 0x80]).unwrap();
        assert_eq!(length.value, Some(128));
        assert!(length.minimal);

        // long form for a value that fits the short form
        let (_, length) = parse_length(&[0x81, 0x05]).unwrap();
        assert_eq!(length.value, Some(5));
        assert!(!length.minimal);

        let (_, length) = parse_length(&[0x80]).unwrap();
        assert_eq!(length.value, None);
    }

    #[test]
    fn truncated_length_is_incomplete() {
        assert!(matches!(
            parse_length(&[0x82, 0x01]),
            Err(nom::Err::Incomplete(_))
        ));
    }
}
