use asnkit::{compile_str, error::DecodeErrorKind, Codec, Schema, Value};
use pretty_assertions::assert_eq;

fn schema(source: &str) -> Schema {
    compile_str(source, Codec::Oer).unwrap()
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
fn integers_pick_fixed_widths() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         U1 ::= INTEGER (0..255) \
         U2 ::= INTEGER (0..65535) \
         U4 ::= INTEGER (0..4294967295) \
         S1 ::= INTEGER (-128..127) \
         S2 ::= INTEGER (-32768..32767) \
         Var ::= INTEGER \
         END",
    );
    round_trip!(schema, "U1", Value::from(5), &[0x05]);
    round_trip!(schema, "U2", Value::from(5), &[0x00, 0x05]);
    round_trip!(schema, "U4", Value::from(5), &[0x00, 0x00, 0x00, 0x05]);
    round_trip!(schema, "S1", Value::from(-2), &[0xFE]);
    round_trip!(schema, "S2", Value::from(-2), &[0xFF, 0xFE]);
    round_trip!(schema, "Var", Value::from(5), &[0x01, 0x05]);
    round_trip!(schema, "Var", Value::from(-300), &[0x02, 0xFE, 0xD4]);
}

#[test]
fn booleans_are_full_octets() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BOOLEAN END");
    round_trip!(schema, "B", Value::Boolean(true), &[0xFF]);
    round_trip!(schema, "B", Value::Boolean(false), &[0x00]);
}

#[test]
fn sequences_use_presence_preambles() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..255), b BOOLEAN OPTIONAL } \
         END",
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5)), ("b", Value::from(true))]),
        &[0x80, 0x05, 0xFF]
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5))]),
        &[0x00, 0x05]
    );
}

#[test]
fn sequences_without_options_have_no_preamble() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..255) } \
         END",
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5))]),
        &[0x05]
    );
}

#[test]
fn extensible_sequences_lead_with_the_extension_bit() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..255), ... } \
         END",
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5))]),
        &[0x00, 0x05]
    );
}

#[test]
fn extension_additions_are_length_prefixed() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..255), ..., b BOOLEAN } \
         END",
    );
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5)), ("b", Value::from(true))]),
        &[0x80, 0x05, 0x02, 0x07, 0x80, 0x01, 0xFF]
    );

    // an older schema skips the addition it does not know
    let v1 = compile_str(
        "M DEFINITIONS ::= BEGIN T ::= SEQUENCE { a INTEGER (0..255), ... } END",
        Codec::Oer,
    )
    .unwrap();
    assert_eq!(
        v1.decode("T", &[0x80, 0x05, 0x02, 0x07, 0x80, 0x01, 0xFF])
            .unwrap(),
        Value::sequence([("a", Value::from(5))])
    );
}

#[test]
fn choices_are_tagged() {
    let schema = schema(
        "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
         C ::= CHOICE { a INTEGER (0..255), b BOOLEAN } \
         END",
    );
    round_trip!(schema, "C", Value::choice("b", Value::from(true)), &[0x81, 0xFF]);
    round_trip!(schema, "C", Value::choice("a", Value::from(9)), &[0x80, 0x09]);
    let error = schema.decode("C", &[0x9F, 0xFF]).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::UnexpectedTag { .. }));
}

#[test]
fn sequence_of_counts_elements() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         L ::= SEQUENCE OF INTEGER (0..255) \
         END",
    );
    round_trip!(
        schema,
        "L",
        Value::List(vec![Value::from(1), Value::from(2)]),
        &[0x01, 0x02, 0x01, 0x02]
    );
    round_trip!(schema, "L", Value::List(vec![]), &[0x01, 0x00]);
}

#[test]
fn enumerations_use_short_or_long_form() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         E ::= ENUMERATED { a(0), b(5), big(300) } \
         END",
    );
    round_trip!(schema, "E", Value::Enumerated("b".into()), &[0x05]);
    round_trip!(
        schema,
        "E",
        Value::Enumerated("big".into()),
        &[0x82, 0x01, 0x2C]
    );
}

#[test]
fn strings_are_length_prefixed() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         S ::= UTF8String \
         F ::= IA5String (SIZE (2)) \
         END",
    );
    round_trip!(schema, "S", Value::from("hi"), &[0x02, 0x68, 0x69]);
    // fixed-size known-multiplier strings carry no determinant
    round_trip!(schema, "F", Value::from("hi"), &[0x68, 0x69]);
}

#[test]
fn fixed_size_bit_strings_are_bare() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         F ::= BIT STRING (SIZE (4)) \
         V ::= BIT STRING \
         END",
    );
    let mut bits = asnkit::types::BitString::new();
    bits.extend([true, false, true, false]);
    round_trip!(schema, "F", Value::BitString(bits.clone()), &[0xA0]);
    round_trip!(schema, "V", Value::BitString(bits), &[0x02, 0x04, 0xA0]);
}

#[test]
fn quantity_larger_than_input_fails_before_allocating() {
    let schema = schema("M DEFINITIONS ::= BEGIN L ::= SEQUENCE OF INTEGER END");
    let error = schema
        .decode("L", &[0x04, 0x7F, 0xFF, 0xFF, 0xFF])
        .unwrap_err();
    assert!(matches!(
        *error.kind,
        DecodeErrorKind::ExceedsRemaining { .. }
    ));
}
