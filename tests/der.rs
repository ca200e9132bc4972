use asnkit::{compile_str, error::DecodeErrorKind, Codec, Schema, Value};
use pretty_assertions::assert_eq;

fn schema(source: &str) -> Schema {
    compile_str(source, Codec::Der).unwrap()
}

#[test]
fn booleans_must_be_canonical() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BOOLEAN END");
    assert_eq!(
        schema.encode("B", &Value::Boolean(true)).unwrap(),
        vec![0x01, 0x01, 0xFF]
    );
    let error = schema.decode("B", &[0x01, 0x01, 0x2A]).unwrap_err();
    assert!(matches!(
        *error.kind,
        DecodeErrorKind::InvalidBool { found: 0x2A }
    ));
}

#[test]
fn set_members_sort_by_tag() {
    let schema = schema(
        "M DEFINITIONS IMPLICIT TAGS ::= BEGIN \
         S ::= SET { b [1] BOOLEAN, a [0] INTEGER } \
         END",
    );
    let value = Value::sequence([("a", Value::from(1)), ("b", Value::from(true))]);
    let encoded = schema.encode("S", &value).unwrap();
    assert_eq!(
        encoded,
        vec![0x31, 0x06, 0x80, 0x01, 0x01, 0x81, 0x01, 0xFF]
    );
    assert_eq!(schema.decode("S", &encoded).unwrap(), value);

    // members out of canonical order are rejected
    let out_of_order = [0x31, 0x06, 0x81, 0x01, 0xFF, 0x80, 0x01, 0x01];
    let error = schema.decode("S", &out_of_order).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::FieldOrder));
}

#[test]
fn set_of_elements_sort_by_encoding() {
    let schema = schema("M DEFINITIONS ::= BEGIN L ::= SET OF INTEGER END");
    let encoded = schema
        .encode(
            "L",
            &Value::List(vec![Value::from(3), Value::from(1), Value::from(2)]),
        )
        .unwrap();
    assert_eq!(
        encoded,
        vec![0x31, 0x09, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02, 0x02, 0x01, 0x03]
    );
}

#[test]
fn defaults_are_omitted() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER DEFAULT 5 } \
         END",
    );
    assert_eq!(
        schema
            .encode("T", &Value::sequence([("a", Value::from(5))]))
            .unwrap(),
        vec![0x30, 0x00]
    );
    assert_eq!(
        schema
            .encode("T", &Value::sequence([("a", Value::from(6))]))
            .unwrap(),
        vec![0x30, 0x03, 0x02, 0x01, 0x06]
    );
}

#[test]
fn non_minimal_lengths_are_rejected() {
    let der = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER END");
    let ber = compile_str("M DEFINITIONS ::= BEGIN I ::= INTEGER END", Codec::Ber).unwrap();

    let long_form = [0x02, 0x81, 0x01, 0x05];
    assert_eq!(ber.decode("I", &long_form).unwrap(), Value::from(5));
    let error = der.decode("I", &long_form).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::NonMinimalLength));
}

#[test]
fn indefinite_length_is_rejected() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER } \
         END",
    );
    let error = schema
        .decode("T", &[0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00])
        .unwrap_err();
    assert!(matches!(
        *error.kind,
        DecodeErrorKind::IndefiniteLengthNotAllowed
    ));
}

#[test]
fn unused_bits_must_be_zero() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BIT STRING END");
    let error = schema.decode("B", &[0x03, 0x02, 0x04, 0xA1]).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::UnusedBitsNotZero));
}

#[test]
fn encodings_are_byte_stable() {
    let schema = schema(
        "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER, b SET OF INTEGER, c UTF8String OPTIONAL } \
         END",
    );
    let value = Value::sequence([
        ("a", Value::from(300)),
        ("b", Value::List(vec![Value::from(2), Value::from(1)])),
        ("c", Value::from("stable")),
    ]);
    let first = schema.encode("T", &value).unwrap();
    let second = schema.encode("T", &value).unwrap();
    assert_eq!(first, second);

    // decode-encode is the identity on accepted DER
    let decoded = schema.decode("T", &first).unwrap();
    assert_eq!(schema.encode("T", &decoded).unwrap(), first);
}
