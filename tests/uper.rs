use asnkit::{compile_str, error::DecodeErrorKind, Codec, Schema, Value};
use pretty_assertions::assert_eq;

fn schema(source: &str) -> Schema {
    compile_str(source, Codec::Uper).unwrap()
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
fn booleans_are_one_bit() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BOOLEAN END");
    round_trip!(schema, "B", Value::Boolean(true), &[0x80]);
    round_trip!(schema, "B", Value::Boolean(false), &[0x00]);
}

#[test]
fn constrained_whole_numbers() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         Octet ::= INTEGER (0..255) \
         Small ::= INTEGER (0..7) \
         Shifted ::= INTEGER (1000..1255) \
         Single ::= INTEGER (5) \
         END",
    );
    round_trip!(schema, "Octet", Value::from(5), &[0x05]);
    round_trip!(schema, "Small", Value::from(5), &[0xA0]);
    round_trip!(schema, "Shifted", Value::from(1005), &[0x05]);
    // a single-valued range needs no bits at all
    round_trip!(schema, "Single", Value::from(5), &[0x00]);
}

#[test]
fn unconstrained_integers_carry_length() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER END");
    round_trip!(schema, "I", Value::from(5), &[0x01, 0x05]);
    round_trip!(schema, "I", Value::from(128), &[0x02, 0x00, 0x80]);
    round_trip!(schema, "I", Value::from(-128), &[0x01, 0x80]);
}

#[test]
fn optional_members_use_a_presence_bit() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER, b BOOLEAN OPTIONAL } \
         END",
    );
    // 0 00000001 00000101 -> 00 82 80
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5))]),
        &[0x00, 0x82, 0x80]
    );
    // 1 00000001 00000101 1 -> 80 82 C0
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5)), ("b", Value::from(true))]),
        &[0x80, 0x82, 0xC0]
    );
}

#[test]
fn choice_index_then_alternative() {
    let schema = schema(
        "M DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
         C ::= CHOICE { a INTEGER, b BOOLEAN } \
         END",
    );
    // index bit 1, then the boolean bit
    round_trip!(schema, "C", Value::choice("b", Value::from(true)), &[0xC0]);
    // index bit 0, then length 1 + 05
    round_trip!(
        schema,
        "C",
        Value::choice("a", Value::from(5)),
        &[0x00, 0x82, 0x80]
    );
}

#[test]
fn extensible_integers_use_an_extension_bit() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..7, ...) END");
    // in root: 0 101
    round_trip!(schema, "I", Value::from(5), &[0x50]);
    // outside the root: 1, then an unconstrained body
    round_trip!(schema, "I", Value::from(200), &[0x80, 0xE4, 0x00]);
}

#[test]
fn constraint_violation_when_not_extensible() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..7) END");
    let error = schema.encode("I", &Value::from(200)).unwrap_err();
    assert!(matches!(
        *error.kind,
        asnkit::error::EncodeErrorKind::ConstraintViolation { .. }
    ));
}

#[test]
fn enumerations_index_their_root() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         E ::= ENUMERATED { a, b, c } \
         X ::= ENUMERATED { a, b, ..., c } \
         END",
    );
    round_trip!(schema, "E", Value::Enumerated("b".into()), &[0x40]);
    round_trip!(schema, "X", Value::Enumerated("c".into()), &[0x80]);
    round_trip!(schema, "X", Value::Enumerated("b".into()), &[0x40]);
}

#[test]
fn ia5_strings_pack_to_seven_bits() {
    let schema = schema("M DEFINITIONS ::= BEGIN S ::= IA5String END");
    round_trip!(schema, "S", Value::from("Hi"), &[0x02, 0x91, 0xA4]);
}

#[test]
fn numeric_strings_index_their_alphabet() {
    let schema = schema("M DEFINITIONS ::= BEGIN S ::= NumericString END");
    // '1' and '2' are positions 2 and 3 of the canonical alphabet
    round_trip!(schema, "S", Value::from("12"), &[0x02, 0x23]);
}

#[test]
fn permitted_alphabets_narrow_the_width() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         S ::= IA5String (FROM (\"a\"..\"d\")) (SIZE (2)) \
         END",
    );
    // two characters, two bits each, no determinant
    round_trip!(schema, "S", Value::from("bd"), &[0x70]);
    assert!(schema.encode("S", &Value::from("bz")).is_err());
}

#[test]
fn sized_sequence_of() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         L ::= SEQUENCE (SIZE (1..3)) OF BOOLEAN \
         END",
    );
    round_trip!(
        schema,
        "L",
        Value::List(vec![Value::from(true), Value::from(false)]),
        &[0x60]
    );
}

#[test]
fn fixed_size_octet_strings_have_no_determinant() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         O ::= OCTET STRING (SIZE (2)) \
         END",
    );
    round_trip!(
        schema,
        "O",
        Value::OctetString(vec![0xAB, 0xCD]),
        &[0xAB, 0xCD]
    );
}

#[test]
fn sequence_extensions_ride_as_open_types() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         S ::= SEQUENCE { a INTEGER (0..7), ..., b BOOLEAN } \
         END",
    );
    round_trip!(
        schema,
        "S",
        Value::sequence([("a", Value::from(1))]),
        &[0x10]
    );
    round_trip!(
        schema,
        "S",
        Value::sequence([("a", Value::from(1)), ("b", Value::from(true))]),
        &[0x90, 0x10, 0x18, 0x00]
    );
}

#[test]
fn unknown_extensions_are_skipped() {
    let v2 = schema(
        "M DEFINITIONS ::= BEGIN \
         S ::= SEQUENCE { a INTEGER (0..7), ..., b BOOLEAN } \
         END",
    );
    let v1 = schema(
        "M DEFINITIONS ::= BEGIN \
         S ::= SEQUENCE { a INTEGER (0..7), ... } \
         END",
    );
    let newer = v2
        .encode(
            "S",
            &Value::sequence([("a", Value::from(1)), ("b", Value::from(true))]),
        )
        .unwrap();
    assert_eq!(
        v1.decode("S", &newer).unwrap(),
        Value::sequence([("a", Value::from(1))])
    );
}

#[test]
fn extension_addition_groups_share_a_presence_bit() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         S ::= SEQUENCE { a BOOLEAN, ..., [[ b BOOLEAN, c BOOLEAN ]] } \
         END",
    );
    let value = Value::sequence([
        ("a", Value::from(true)),
        ("b", Value::from(false)),
        ("c", Value::from(true)),
    ]);
    let encoded = schema.encode("S", &value).unwrap();
    let decoded = schema.decode("S", &encoded).unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn deep_recursion_round_trips() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         Node ::= SEQUENCE { next Node OPTIONAL } \
         END",
    );
    // three levels: 1 1 0 -> C0
    let value = Value::sequence([(
        "next",
        Value::sequence([("next", Value::sequence([]))]),
    )]);
    round_trip!(schema, "Node", value, &[0xC0]);
}

#[test]
fn null_occupies_one_zero_octet() {
    let schema = schema("M DEFINITIONS ::= BEGIN N ::= NULL END");
    round_trip!(schema, "N", Value::Null, &[0x00]);
}

#[test]
fn exhausted_input_is_out_of_buffer() {
    let schema = schema("M DEFINITIONS ::= BEGIN O ::= OCTET STRING (SIZE (4)) END");
    let error = schema.decode("O", &[0xAB]).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::OutOfBuffer { .. }));
}

#[test]
fn semi_constrained_integers_offset_from_the_bound() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER (1000..MAX) END");
    // offset 5 from 1000, one octet body
    round_trip!(schema, "I", Value::from(1005), &[0x01, 0x05]);
}
