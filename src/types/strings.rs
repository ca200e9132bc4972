//! Byte-level conversions for the restricted character string kinds.
//!
//! TLV and octet-oriented codecs carry every string kind as octets: latin
//! kinds one octet per character, `BMPString` as UCS-2 big-endian,
//! `UniversalString` as UCS-4 big-endian, `UTF8String` as UTF-8.

use super::StringKind;

/// Converts a string to its octet payload. Fails with the first character
/// that is not representable in (or permitted by) the kind.
pub(crate) fn to_octets(kind: StringKind, text: &str) -> Result<Vec<u8>, char> {
    let mut octets = Vec::with_capacity(text.len());
    match kind {
        StringKind::Utf8 => return Ok(text.as_bytes().to_vec()),
        StringKind::Bmp => {
            for c in text.chars() {
                let value = u32::from(c);
                if value > 0xFFFF {
                    return Err(c);
                }
                octets.extend_from_slice(&(value as u16).to_be_bytes());
            }
        }
        StringKind::Universal => {
            for c in text.chars() {
                octets.extend_from_slice(&u32::from(c).to_be_bytes());
            }
        }
        _ => {
            for c in text.chars() {
                let value = u32::from(c);
                if value > 0xFF || !kind.permits(c) {
                    return Err(c);
                }
                octets.push(value as u8);
            }
        }
    }
    Ok(octets)
}

/// Converts an octet payload back to a string, or `None` when the payload is
/// malformed for the kind.
pub(crate) fn from_octets(kind: StringKind, octets: &[u8]) -> Option<String> {
    match kind {
        StringKind::Utf8 => String::from_utf8(octets.to_vec()).ok(),
        StringKind::Bmp => {
            if octets.len() % 2 != 0 {
                return None;
            }
            octets
                .chunks_exact(2)
                .map(|pair| {
                    let value = u16::from_be_bytes([pair[0], pair[1]]);
                    char::from_u32(u32::from(value))
                })
                .collect()
        }
        StringKind::Universal => {
            if octets.len() % 4 != 0 {
                return None;
            }
            octets
                .chunks_exact(4)
                .map(|quad| {
                    let value = u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]);
                    char::from_u32(value)
                })
                .collect()
        }
        _ => {
            let text: String = octets.iter().map(|&b| char::from(b)).collect();
            if text.chars().all(|c| kind.permits(c)) {
                Some(text)
            } else {
                None
            }
        }
    }
}

/// Characters per octet-count for the fixed-width kinds, used by `SIZE`
/// checks that count characters rather than octets.
pub(crate) fn octets_per_character(kind: StringKind) -> usize {
    match kind {
        StringKind::Bmp => 2,
        StringKind::Universal => 4,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_kinds_round_trip() {
        let octets = to_octets(StringKind::Ia5, "Hello").unwrap();
        assert_eq!(octets, b"Hello");
        assert_eq!(from_octets(StringKind::Ia5, &octets).unwrap(), "Hello");
    }

    #[test]
    fn bmp_is_ucs2() {
        let octets = to_octets(StringKind::Bmp, "Aß").unwrap();
        assert_eq!(octets, vec![0x00, 0x41, 0x00, 0xDF]);
        assert_eq!(from_octets(StringKind::Bmp, &octets).unwrap(), "Aß");
        assert!(to_octets(StringKind::Bmp, "𝄞").is_err());
    }

    #[test]
    fn universal_is_ucs4() {
        let octets = to_octets(StringKind::Universal, "𝄞").unwrap();
        assert_eq!(octets, vec![0x00, 0x01, 0xD1, 0x1E]);
        assert_eq!(from_octets(StringKind::Universal, &octets).unwrap(), "𝄞");
    }

    #[test]
    fn numeric_rejects_letters() {
        assert!(to_octets(StringKind::Numeric, "12 3").is_ok());
        assert_eq!(to_octets(StringKind::Numeric, "12a"), Err('a'));
    }

    #[test]
    fn invalid_utf8_fails() {
        assert!(from_octets(StringKind::Utf8, &[0xFF, 0xFE]).is_none());
    }
}
