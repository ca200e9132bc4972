//! Tokenizing ASN.1 source text.
//!
//! The lexer turns a source blob into a flat token list with byte offsets,
//! which the parser walks with one token of lookahead. Offsets are resolved
//! to line/column pairs only when an error is reported.

use bitvec::prelude::*;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    combinator::map,
    IResult,
};
use num_bigint::BigInt;

use crate::types::BitString;

/// A single lexed token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// An uppercase-initial word: a type reference, module reference, or
    /// reserved word (the parser distinguishes by spelling).
    TypeReference(String),
    /// A lowercase-initial word: a value reference or member name.
    Identifier(String),
    Number(BigInt),
    Real(f64),
    /// `'0101'B`
    BString(BitString),
    /// `'AF'H`, as raw octets plus the count of significant bits.
    HString(Vec<u8>, usize),
    /// `"quoted text"`
    CString(String),
    /// `::=`
    Assign,
    /// `...`
    Ellipsis,
    /// `..`
    Range,
    Dot,
    LBrace,
    RBrace,
    LParen,
    RParen,
    /// `[[`
    LVersionBrackets,
    /// `]]`
    RVersionBrackets,
    LBracket,
    RBracket,
    LessThan,
    Comma,
    SemiColon,
    Colon,
    Pipe,
    Caret,
}

impl TokenKind {
    /// A short rendering for "found X" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::TypeReference(name) | Self::Identifier(name) => format!("`{name}`"),
            Self::Number(value) => format!("`{value}`"),
            Self::Real(value) => format!("`{value}`"),
            Self::BString(_) => "a bstring literal".to_owned(),
            Self::HString(..) => "an hstring literal".to_owned(),
            Self::CString(_) => "a quoted string".to_owned(),
            Self::Assign => "`::=`".to_owned(),
            Self::Ellipsis => "`...`".to_owned(),
            Self::Range => "`..`".to_owned(),
            Self::Dot => "`.`".to_owned(),
            Self::LBrace => "`{`".to_owned(),
            Self::RBrace => "`}`".to_owned(),
            Self::LParen => "`(`".to_owned(),
            Self::RParen => "`)`".to_owned(),
            Self::LVersionBrackets => "`[[`".to_owned(),
            Self::RVersionBrackets => "`]]`".to_owned(),
            Self::LBracket => "`[`".to_owned(),
            Self::RBracket => "`]`".to_owned(),
            Self::LessThan => "`<`".to_owned(),
            Self::Comma => "`,`".to_owned(),
            Self::SemiColon => "`;`".to_owned(),
            Self::Colon => "`:`".to_owned(),
            Self::Pipe => "`|`".to_owned(),
            Self::Caret => "`^`".to_owned(),
        }
    }
}

/// Resolves a byte offset to a 1-based line and column.
pub(crate) fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let prefix = &source[..offset];
    let line = prefix.matches('\n').count() + 1;
    let column = offset - prefix.rfind('\n').map_or(0, |p| p + 1) + 1;
    (line, column)
}

/// Tokenizes `source`, or fails with the byte offset and a message.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, (usize, String)> {
    let mut rest = source;
    let mut tokens = Vec::new();

    loop {
        rest = skip_trivia(source, rest)?;
        if rest.is_empty() {
            break;
        }
        let offset = source.len() - rest.len();
        let (next, kind) = lex_token(rest).map_err(|message| (offset, message))?;
        tokens.push(Token { kind, offset });
        rest = next;
    }

    Ok(tokens)
}

/// Consumes whitespace and comments. `--` comments end at a newline or at a
/// closing `--`; `/* */` comments nest.
fn skip_trivia<'a>(source: &str, mut input: &'a str) -> Result<&'a str, (usize, String)> {
    loop {
        let trimmed = input.trim_start_matches([' ', '\t', '\r', '\n']);
        if let Some(rest) = trimmed.strip_prefix("--") {
            input = skip_line_comment(rest);
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            input = skip_block_comment(rest).ok_or_else(|| {
                (
                    source.len() - trimmed.len(),
                    "unterminated `/*` comment".to_owned(),
                )
            })?;
        } else {
            return Ok(trimmed);
        }
    }
}

fn skip_line_comment(input: &str) -> &str {
    let mut rest = input;
    loop {
        if rest.is_empty() || rest.starts_with('\n') {
            return rest;
        }
        if let Some(after) = rest.strip_prefix("--") {
            return after;
        }
        rest = &rest[rest.chars().next().map_or(0, char::len_utf8)..];
    }
}

fn skip_block_comment(input: &str) -> Option<&str> {
    let mut depth = 1usize;
    let mut rest = input;
    while depth > 0 {
        if let Some(after) = rest.strip_prefix("/*") {
            depth += 1;
            rest = after;
        } else if let Some(after) = rest.strip_prefix("*/") {
            depth -= 1;
            rest = after;
        } else if rest.is_empty() {
            return None;
        } else {
            rest = &rest[rest.chars().next()?.len_utf8()..];
        }
    }
    Some(rest)
}

fn lex_token(input: &str) -> Result<(&str, TokenKind), String> {
    let first = input.chars().next().expect("non-empty input");

    if first.is_ascii_alphabetic() {
        return Ok(lex_word(input));
    }
    if first.is_ascii_digit() {
        return lex_number(input, false);
    }
    if first == '-' {
        let rest = &input[1..];
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            return lex_number(rest, true);
        }
        return Err("unexpected `-`".to_owned());
    }
    if first == '\'' {
        return lex_bh_string(input);
    }
    if first == '"' {
        return lex_character_string(input);
    }

    match punctuation(input) {
        Ok((rest, kind)) => Ok((rest, kind)),
        Err(_) => Err(format!("unrecognized character {first:?}")),
    }
}

fn punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        map(tag("::="), |_| TokenKind::Assign),
        map(tag("..."), |_| TokenKind::Ellipsis),
        map(tag(".."), |_| TokenKind::Range),
        map(tag("[["), |_| TokenKind::LVersionBrackets),
        map(tag("]]"), |_| TokenKind::RVersionBrackets),
        map(tag("."), |_| TokenKind::Dot),
        map(tag("{"), |_| TokenKind::LBrace),
        map(tag("}"), |_| TokenKind::RBrace),
        map(tag("("), |_| TokenKind::LParen),
        map(tag(")"), |_| TokenKind::RParen),
        map(tag("["), |_| TokenKind::LBracket),
        map(tag("]"), |_| TokenKind::RBracket),
        map(tag("<"), |_| TokenKind::LessThan),
        map(tag(","), |_| TokenKind::Comma),
        map(tag(";"), |_| TokenKind::SemiColon),
        map(tag(":"), |_| TokenKind::Colon),
        map(tag("|"), |_| TokenKind::Pipe),
        map(tag("^"), |_| TokenKind::Caret),
    ))(input)
}

/// Words are `[A-Za-z][A-Za-z0-9]*` with single interior hyphens permitted
/// (`TIME-OF-DAY`, `value-ref`); a hyphen not followed by an alphanumeric
/// ends the word, which is how `lo..hi` after an identifier stays intact.
fn lex_word(input: &str) -> (&str, TokenKind) {
    let bytes = input.as_bytes();
    let mut end = 1;
    while end < bytes.len() {
        let b = bytes[end];
        if b.is_ascii_alphanumeric() {
            end += 1;
        } else if b == b'-'
            && bytes
                .get(end + 1)
                .is_some_and(|next| next.is_ascii_alphanumeric())
        {
            end += 2;
        } else {
            break;
        }
    }
    let (word, rest) = input.split_at(end);
    let kind = if word.starts_with(|c: char| c.is_ascii_uppercase()) {
        TokenKind::TypeReference(word.to_owned())
    } else {
        TokenKind::Identifier(word.to_owned())
    };
    (rest, kind)
}

fn lex_number(input: &str, negative: bool) -> Result<(&str, TokenKind), String> {
    let (rest, integral) = take_digits(input);

    // A `.` begins a fraction only when not part of a `..` range separator.
    let has_fraction = rest.starts_with('.') && !rest.starts_with("..");
    let has_exponent = rest.starts_with(['e', 'E']);

    if !has_fraction && !has_exponent {
        let mut value = BigInt::parse_bytes(integral.as_bytes(), 10)
            .ok_or_else(|| "invalid number".to_owned())?;
        if negative {
            value = -value;
        }
        return Ok((rest, TokenKind::Number(value)));
    }

    let mut end = integral.len();
    let bytes = input.as_bytes();
    if has_fraction {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut cursor = end + 1;
        if cursor < bytes.len() && (bytes[cursor] == b'-' || bytes[cursor] == b'+') {
            cursor += 1;
        }
        if cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
            while cursor < bytes.len() && bytes[cursor].is_ascii_digit() {
                cursor += 1;
            }
            end = cursor;
        }
    }

    let literal = &input[..end];
    let value: f64 = literal
        .parse()
        .map_err(|_| format!("invalid real number `{literal}`"))?;
    let value = if negative { -value } else { value };
    Ok((&input[end..], TokenKind::Real(value)))
}

fn take_digits(input: &str) -> (&str, &str) {
    let split: IResult<&str, &str> = take_while(|c: char| c.is_ascii_digit())(input);
    // take_while never fails
    let (rest, digits) = split.expect("digits");
    (rest, digits)
}

/// `'0101'B` and `'AF'H` literals. Whitespace inside the quotes is ignored,
/// as X.680 permits.
fn lex_bh_string(input: &str) -> Result<(&str, TokenKind), String> {
    let body_start = &input[1..];
    let end = body_start
        .find('\'')
        .ok_or_else(|| "unterminated bstring or hstring".to_owned())?;
    let body: String = body_start[..end]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let rest = &body_start[end + 1..];

    match rest.chars().next() {
        Some('B') => {
            let mut bits = BitString::new();
            for c in body.chars() {
                match c {
                    '0' => bits.push(false),
                    '1' => bits.push(true),
                    other => return Err(format!("invalid bstring digit {other:?}")),
                }
            }
            Ok((&rest[1..], TokenKind::BString(bits)))
        }
        Some('H') => {
            let mut bits: BitString = BitString::new();
            for c in body.chars() {
                let digit =
                    c.to_digit(16).ok_or_else(|| format!("invalid hstring digit {c:?}"))?;
                let nibble: BitVec<u8, Msb0> = BitVec::from_element(digit as u8);
                bits.extend_from_bitslice(&nibble[4..]);
            }
            let bit_count = body.len() * 4;
            // into_vec of an Msb0 bitvec zero-pads the final partial byte
            let bytes = bits.into_vec();
            Ok((&rest[1..], TokenKind::HString(bytes, bit_count)))
        }
        _ => Err("expected `B` or `H` after quoted literal".to_owned()),
    }
}

/// `"…"` with `""` as the escape for a literal quote.
fn lex_character_string(input: &str) -> Result<(&str, TokenKind), String> {
    let mut text = String::new();
    let mut rest = &input[1..];
    loop {
        let end = rest
            .find('"')
            .ok_or_else(|| "unterminated character string".to_owned())?;
        text.push_str(&rest[..end]);
        rest = &rest[end + 1..];
        if let Some(after) = rest.strip_prefix('"') {
            text.push('"');
            rest = after;
        } else {
            return Ok((rest, TokenKind::CString(text)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn words_and_punctuation() {
        assert_eq!(
            kinds("A ::= SEQUENCE { a INTEGER }"),
            vec![
                TokenKind::TypeReference("A".into()),
                TokenKind::Assign,
                TokenKind::TypeReference("SEQUENCE".into()),
                TokenKind::LBrace,
                TokenKind::Identifier("a".into()),
                TokenKind::TypeReference("INTEGER".into()),
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn hyphenated_words() {
        assert_eq!(
            kinds("TIME-OF-DAY value-ref"),
            vec![
                TokenKind::TypeReference("TIME-OF-DAY".into()),
                TokenKind::Identifier("value-ref".into()),
            ]
        );
    }

    #[test]
    fn ranges_and_numbers() {
        assert_eq!(
            kinds("(0..255)"),
            vec![
                TokenKind::LParen,
                TokenKind::Number(BigInt::from(0)),
                TokenKind::Range,
                TokenKind::Number(BigInt::from(255)),
                TokenKind::RParen,
            ]
        );
        assert_eq!(
            kinds("-5..-1"),
            vec![
                TokenKind::Number(BigInt::from(-5)),
                TokenKind::Range,
                TokenKind::Number(BigInt::from(-1)),
            ]
        );
        assert_eq!(kinds("1.5"), vec![TokenKind::Real(1.5)]);
    }

    #[test]
    fn comments() {
        assert_eq!(
            kinds("a -- comment\nb -- inline -- c /* d /* e */ */ f"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Identifier("c".into()),
                TokenKind::Identifier("f".into()),
            ]
        );
    }

    #[test]
    fn bit_and_hex_literals() {
        let tokens = kinds("'1010'B 'AF'H");
        match &tokens[0] {
            TokenKind::BString(bits) => {
                assert_eq!(bits.len(), 4);
                assert!(bits[0] && !bits[1] && bits[2] && !bits[3]);
            }
            other => panic!("expected bstring, got {other:?}"),
        }
        assert_eq!(tokens[1], TokenKind::HString(vec![0xAF], 8));
    }

    #[test]
    fn quoted_strings() {
        assert_eq!(
            kinds(r#""hello ""world""""#),
            vec![TokenKind::CString("hello \"world\"".into())]
        );
    }

    #[test]
    fn ellipsis_and_version_brackets() {
        assert_eq!(
            kinds("..., [[ ]]"),
            vec![
                TokenKind::Ellipsis,
                TokenKind::Comma,
                TokenKind::LVersionBrackets,
                TokenKind::RVersionBrackets,
            ]
        );
    }

    #[test]
    fn line_column_resolution() {
        let source = "abc\ndef";
        assert_eq!(line_column(source, 0), (1, 1));
        assert_eq!(line_column(source, 4), (2, 1));
        assert_eq!(line_column(source, 6), (2, 3));
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        assert!(tokenize("a /* b").is_err());
    }
}
