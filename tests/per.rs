//! Aligned-variant behavior on top of the shared PER machinery.

use asnkit::{compile_str, Codec, Schema, Value};
use pretty_assertions::assert_eq;

fn schema(source: &str) -> Schema {
    compile_str(source, Codec::Per).unwrap()
}

macro_rules! round_trip {
    ($schema:expr, $ty:expr, $value:expr, $expected:expr) => {{
        let value: Value = $value;
        let expected: &[u8] = $expected;
        let encoded = $schema.encode($ty, &value).unwrap();
        assert_eq!(expected, &*encoded);
        let decoded = $schema.decode($ty, &encoded).unwrap();
        assert_eq!(value, decoded);
    }};
}

#[test]
fn octet_range_integers_align() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         I ::= INTEGER (0..255) \
         T ::= SEQUENCE { a BOOLEAN, b INTEGER (0..255) } \
         END",
    );
    round_trip!(schema, "I", Value::from(5), &[0x05]);
    // the boolean bit, then padding to the octet boundary for b
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(true)), ("b", Value::from(5))]),
        &[0x80, 0x05]
    );
}

#[test]
fn small_ranges_stay_unaligned() {
    let schema = schema(
        "M DEFINITIONS ::= BEGIN \
         T ::= SEQUENCE { a INTEGER (0..7), b INTEGER (0..7) } \
         END",
    );
    // 101 110 padded -> BB?  101110xx -> B8
    round_trip!(
        schema,
        "T",
        Value::sequence([("a", Value::from(5)), ("b", Value::from(6))]),
        &[0xB8]
    );
}

#[test]
fn two_octet_ranges() {
    let schema = schema("M DEFINITIONS ::= BEGIN I ::= INTEGER (0..65535) END");
    round_trip!(schema, "I", Value::from(0x1234), &[0x12, 0x34]);
}

#[test]
fn ia5_strings_use_whole_octets() {
    let schema = schema("M DEFINITIONS ::= BEGIN S ::= IA5String END");
    round_trip!(schema, "S", Value::from("Hi"), &[0x02, 0x48, 0x69]);
}

#[test]
fn booleans_still_take_one_bit() {
    let schema = schema("M DEFINITIONS ::= BEGIN B ::= BOOLEAN END");
    round_trip!(schema, "B", Value::Boolean(true), &[0x80]);
}

#[test]
fn uper_and_per_differ_only_in_padding() {
    let source = "M DEFINITIONS ::= BEGIN \
                  T ::= SEQUENCE { a BOOLEAN, b INTEGER (0..255) } \
                  END";
    let aligned = compile_str(source, Codec::Per).unwrap();
    let unaligned = compile_str(source, Codec::Uper).unwrap();
    let value = Value::sequence([("a", Value::from(true)), ("b", Value::from(5))]);
    assert_eq!(aligned.encode("T", &value).unwrap(), vec![0x80, 0x05]);
    // 1 00000101 -> 82 80
    assert_eq!(unaligned.encode("T", &value).unwrap(), vec![0x82, 0x80]);
}
