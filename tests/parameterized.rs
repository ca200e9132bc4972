//! Parameterized types reduce to the same wire encodings as their
//! hand-expanded equivalents.

use asnkit::{compile_str, Codec, Value};
use pretty_assertions::assert_eq;

const SOURCE: &str = "M DEFINITIONS ::= BEGIN \
                      A { B } ::= SEQUENCE { a B } \
                      A-Integer ::= A { INTEGER } \
                      A-String ::= A { IA5String } \
                      Plain ::= SEQUENCE { a INTEGER } \
                      Bounded { INTEGER : max } ::= INTEGER (0..max) \
                      Bounded-7 ::= Bounded { 7 } \
                      Plain-7 ::= INTEGER (0..7) \
                      Nested { T } ::= SEQUENCE { inner A { T } } \
                      Nested-Integer ::= Nested { INTEGER } \
                      END";

#[test]
fn type_parameters_match_hand_expansion() {
    for codec in [Codec::Ber, Codec::Der, Codec::Uper, Codec::Per, Codec::Oer] {
        let schema = compile_str(SOURCE, codec).unwrap();
        let value = Value::sequence([("a", Value::from(1))]);
        assert_eq!(
            schema.encode("A-Integer", &value).unwrap(),
            schema.encode("Plain", &value).unwrap(),
            "codec {codec}"
        );
        assert_eq!(
            schema.decode("A-Integer", &schema.encode("Plain", &value).unwrap()).unwrap(),
            value
        );
    }
}

#[test]
fn value_parameters_match_hand_expansion() {
    for codec in [Codec::Uper, Codec::Oer] {
        let schema = compile_str(SOURCE, codec).unwrap();
        let value = Value::from(5);
        assert_eq!(
            schema.encode("Bounded-7", &value).unwrap(),
            schema.encode("Plain-7", &value).unwrap(),
            "codec {codec}"
        );
        // the instantiated constraint is enforced
        assert!(schema.encode("Bounded-7", &Value::from(8)).is_err());
    }
}

#[test]
fn distinct_actuals_produce_distinct_types() {
    let schema = compile_str(SOURCE, Codec::Ber).unwrap();
    let int_value = Value::sequence([("a", Value::from(1))]);
    let text_value = Value::sequence([("a", Value::from("x"))]);
    assert!(schema.encode("A-Integer", &int_value).is_ok());
    assert!(schema.encode("A-String", &text_value).is_ok());
    assert!(schema.encode("A-String", &int_value).is_err());
}

#[test]
fn chained_templates_instantiate_to_a_fixed_point() {
    let schema = compile_str(SOURCE, Codec::Uper).unwrap();
    let value = Value::sequence([("inner", Value::sequence([("a", Value::from(3))]))]);
    let encoded = schema.encode("Nested-Integer", &value).unwrap();
    assert_eq!(schema.decode("Nested-Integer", &encoded).unwrap(), value);
}

#[test]
fn cyclic_instantiation_is_rejected() {
    let error = compile_str(
        "M DEFINITIONS ::= BEGIN \
         Loop { T } ::= Loop { SEQUENCE { t T } } \
         Use ::= Loop { INTEGER } \
         END",
        Codec::Ber,
    )
    .unwrap_err();
    let rendered = error.to_string();
    assert!(
        rendered.contains("cyclic") || rendered.contains("recursive"),
        "unexpected error: {rendered}"
    );
}
