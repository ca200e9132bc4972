use asnkit::{compile_str, error::DecodeErrorKind, Codec, Schema, Value};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

fn schema(source: &str) -> Schema {
    compile_str(source, Codec::Ber).unwrap()
}

macro_rules! round_trip {
    ($schema:expr, $ty:expr, $value:expr, $expected:expr) => {{
        let value: Value = $value;
        let expected: &[u8] = $expected;
        let encoded = $schema.encode($ty, &value).unwrap();
        assert_eq!(expected, &*encoded);
        let decoded = $schema.decode($ty, &encoded).unwrap();
        assert_eq!($schema.refresh($ty, &value).unwrap(), decoded);
    }};
}

#[test]
fn booleans() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BOOLEAN END");
    round_trip!(schema, "B", Value::Boolean(true), &[0x01, 0x01, 0xFF]);
    round_trip!(schema, "B", Value::Boolean(false), &[0x01, 0x01, 0x00]);
    // any non-zero octet is truthy in plain BER
    assert_eq!(
        schema.decode("B", &[0x01, 0x01, 0x2A]).unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn integers_preserve_sign() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER END");
    round_trip!(schema, "I", Value::from(127), &[0x02, 0x01, 0x7F]);
    round_trip!(schema, "I", Value::from(128), &[0x02, 0x02, 0x00, 0x80]);
    round_trip!(schema, "I", Value::from(-128), &[0x02, 0x01, 0x80]);
    round_trip!(schema, "I", Value::from(0), &[0x02, 0x01, 0x00]);
}

#[test]
fn decode_enforces_value_constraints() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..100) END");
    let error = schema.decode("I", &[0x02, 0x01, 0x7F]).unwrap_err();
    match *error.kind {
        DecodeErrorKind::ConstraintViolation { ref value, .. } => {
            assert_eq!(value, &BigInt::from(127));
        }
        ref other => panic!("expected a constraint violation, got {other:?}"),
    }
    assert!(schema.encode("I", &Value::from(127)).is_err());
    assert!(schema.encode("I", &Value::from(100)).is_ok());
}

#[test]
fn sequences_with_optional_members() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } \
         END",
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5))]),
        &[0x30, 0x03, 0x02, 0x01, 0x05]
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5)), ("b", Value::from(true))]),
        &[0x30, 0x06, 0x02, 0x01, 0x05, 0x01, 0x01, 0xFF]
    );
}

#[test]
fn defaults_restore_on_decode() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER DEFAULT 7 } \
         END",
    );
    // a member equal to its default is left off the wire
    let encoded = schema
        .encode("T", &Value::sequence([("a", Value::from(7))]))
        .unwrap();
    assert_eq!(encoded, vec![0x30, 0x00]);
    assert_eq!(
        schema.decode("T", &encoded).unwrap(),
        Value::sequence([("a", Value::from(7))])
    );
}

#[test]
fn explicit_and_implicit_prefixes() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         A ::= [5] EXPLICIT INTEGER \
         B ::= [5] IMPLICIT INTEGER \
         END",
    );
    round_trip!(schema, "A", Value::from(1), &[0xA5, 0x03, 0x02, 0x01, 0x01]);
    round_trip!(schema, "B", Value::from(1), &[0x85, 0x01, 0x01]);
}

#[test]
fn automatic_tags_on_sequences() {
    let schema = schema(
        "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
         S ::= SEQUENCE { a INTEGER, b BOOLEAN } \
         END",
    );
    round_trip!(
        schema,
        "S",
        Value::sequence([("a", Value::from(5)), ("b", Value::from(true))]),
        &[0x30, 0x06, 0x80, 0x01, 0x05, 0x81, 0x01, 0xFF]
    );
}

#[test]
fn object_identifiers() {
    let schema = schema("M DEFINITIONS ::= BEGIN O ::= OBJECT IDENTIFIER END");
    round_trip!(
        schema,
        "O",
        Value::ObjectIdentifier(vec![1, 2, 840, 113549]),
        &[0x06, 0x06, 0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D]
    );
    assert!(schema
        .encode("O", &Value::ObjectIdentifier(vec![1]))
        .is_err());
}

#[test]
fn bit_strings_carry_unused_bits() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BIT STRING END");
    let mut bits = asnkit::types::BitString::new();
    bits.push(true);
    bits.push(false);
    bits.push(true);
    round_trip!(schema, "B", Value::BitString(bits), &[0x03, 0x02, 0x05, 0xA0]);
    round_trip!(
        schema,
        "B",
        Value::BitString(asnkit::types::BitString::new()),
        &[0x03, 0x01, 0x00]
    );
}

#[test]
fn character_strings() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         U ::= UTF8String \
         P ::= PrintableString \
         END",
    );
    round_trip!(schema, "U", Value::from("hi"), &[0x0C, 0x02, 0x68, 0x69]);
    round_trip!(schema, "P", Value::from("Test1"), &[0x13, 0x05, 0x54, 0x65, 0x73, 0x74, 0x31]);
    // invalid UTF-8 contents
    let error = schema.decode("U", &[0x0C, 0x02, 0xFF, 0xFE]).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::BadUtf8));
}

#[test]
fn choices_encode_their_alternative() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         C ::= CHOICE { a INTEGER, b BOOLEAN } \
         END",
    );
    round_trip!(
        schema,
        "C",
        Value::choice("b", Value::from(true)),
        &[0x01, 0x01, 0xFF]
    );
    round_trip!(
        schema,
        "C",
        Value::choice("a", Value::from(9)),
        &[0x02, 0x01, 0x09]
    );
    assert!(schema
        .encode("C", &Value::choice("missing", Value::Null))
        .is_err());
}

#[test]
fn indefinite_length_accepted_on_decode() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER } \
         END",
    );
    let decoded = schema
        .decode("T", &[0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00])
        .unwrap();
    assert_eq!(decoded, Value::sequence([("a", Value::from(5))]));
}

#[test]
fn utc_time_round_trips() {
    let schema = schema("M DEFINITIONS ::= BEGIN T ::= UTCTime END");
    let encoded = schema.encode("T", &Value::from("230506121314Z")).unwrap();
    assert_eq!(encoded[0], 0x17);
    assert_eq!(&encoded[2..], b"230506121314Z");
    let decoded = schema.decode("T", &encoded).unwrap();
    assert!(matches!(decoded, Value::UtcTime(_)));
}

#[test]
fn any_carries_raw_encodings() {
    let schema = schema("M DEFINITIONS ::= BEGIN A ::= ANY END");
    round_trip!(schema, "A", Value::Any(vec![0x05, 0x00]), &[0x05, 0x00]);
}

#[test]
fn recursive_types_nest() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         Node ::= SEQUENCE { next Node OPTIONAL } \
         END",
    );
    let value = Value::sequence([("next", Value::sequence([("next", Value::sequence([]))]))]);
    round_trip!(
        schema,
        "Node",
        value,
        &[0x30, 0x04, 0x30, 0x02, 0x30, 0x00]
    );
}

#[test]
fn truncated_input_is_out_of_buffer() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER END");
    let error = schema.decode("I", &[0x02, 0x04, 0x01]).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::OutOfBuffer { .. }));
}

#[test]
fn unexpected_tags_name_the_member() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER } \
         END",
    );
    let error = schema.decode("T", &[0x30, 0x03, 0x01, 0x01, 0xFF]).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::UnexpectedTag { .. }));
    let path = format!("{}", error.path);
    assert!(path.contains('a'), "path was {path}");
}

#[test]
fn extensible_sequences_skip_unknown_members() {
    let v1 = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER, ... } \
         END",
    );
    let v2 = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER, ..., b BOOLEAN } \
         END",
    );
    let newer = v2
        .encode(
            "T",
            &Value::sequence([("a", Value::from(1)), ("b", Value::from(true))]),
        )
        .unwrap();
    assert_eq!(
        v1.decode("T", &newer).unwrap(),
        Value::sequence([("a", Value::from(1))])
    );
}
