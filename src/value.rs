//! The language-neutral value representation passed to and from codecs.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use num_bigint::BigInt;

use crate::types::BitString;

/// A runtime ASN.1 value.
///
/// Values are shaped by the type they are encoded against: a name→value map
/// for `SEQUENCE`/`SET`, a `(selector, payload)` pair for `CHOICE`, an
/// ordered list for `SEQUENCE OF`/`SET OF`, and scalars for everything else.
/// Absent `OPTIONAL` members are simply missing from the map.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(BigInt),
    Real(f64),
    /// Bit 0 is the most significant bit of the first octet.
    BitString(BitString),
    OctetString(Vec<u8>),
    /// Also used for `RELATIVE-OID` values.
    ObjectIdentifier(Vec<u32>),
    /// An `ENUMERATED` item by name.
    Enumerated(String),
    /// Any restricted character string, plus `ObjectDescriptor`.
    Text(String),
    UtcTime(DateTime<FixedOffset>),
    GeneralizedTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    TimeOfDay(NaiveTime),
    DateTime(NaiveDateTime),
    /// Members of a `SEQUENCE` or `SET` by name.
    Sequence(BTreeMap<String, Value>),
    /// Elements of a `SEQUENCE OF` or `SET OF`.
    List(Vec<Value>),
    /// A `CHOICE`: selected alternative name and its payload.
    Choice(String, Box<Value>),
    /// A raw, already-encoded payload for `ANY` and unknown open types.
    Any(Vec<u8>),
}

impl Value {
    /// Builds a [`Value::Sequence`] from `(name, value)` pairs.
    pub fn sequence<'a>(members: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Self::Sequence(
            members
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        )
    }

    /// Builds a [`Value::Choice`] from a selector and payload.
    pub fn choice(selector: &str, value: Value) -> Self {
        Self::Choice(selector.to_owned(), Box::new(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&BigInt> {
        match self {
            Self::Integer(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Sequence(members) => Some(members),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_choice(&self) -> Option<(&str, &Value)> {
        match self {
            Self::Choice(selector, value) => Some((selector, value)),
            _ => None,
        }
    }

    /// A short noun for the value's shape, used in shape-mismatch errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Integer(_) => "INTEGER",
            Self::Real(_) => "REAL",
            Self::BitString(_) => "BIT STRING",
            Self::OctetString(_) => "OCTET STRING",
            Self::ObjectIdentifier(_) => "OBJECT IDENTIFIER",
            Self::Enumerated(_) => "ENUMERATED",
            Self::Text(_) => "character string",
            Self::UtcTime(_) => "UTCTime",
            Self::GeneralizedTime(_) => "GeneralizedTime",
            Self::Date(_) => "DATE",
            Self::TimeOfDay(_) => "TIME-OF-DAY",
            Self::DateTime(_) => "DATE-TIME",
            Self::Sequence(_) => "SEQUENCE",
            Self::List(_) => "SEQUENCE OF",
            Self::Choice(..) => "CHOICE",
            Self::Any(_) => "ANY",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(BigInt::from(value))
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::OctetString(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Self::List(elements)
    }
}

impl From<BitString> for Value {
    fn from(bits: BitString) -> Self {
        Self::BitString(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_builder() {
        let value = Value::sequence([("a", Value::from(5)), ("b", Value::from(true))]);
        let members = value.as_sequence().unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members["a"], Value::from(5));
        assert_eq!(members["b"].as_bool(), Some(true));
    }

    #[test]
    fn choice_accessor() {
        let value = Value::choice("b", Value::from(true));
        let (selector, payload) = value.as_choice().unwrap();
        assert_eq!(selector, "b");
        assert_eq!(payload.as_bool(), Some(true));
    }
}
