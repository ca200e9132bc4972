//! Recursive types encode arbitrarily deep nesting and decode back
//! byte-for-byte.

use asnkit::{compile_str, Codec, Value};
use pretty_assertions::assert_eq;

const SOURCE: &str = "M DEFINITIONS ::= BEGIN \
                      Tree ::= SEQUENCE { children SEQUENCE OF Tree OPTIONAL } \
                      END";

fn chain(depth: usize) -> Value {
    let mut value = Value::sequence([]);
    for _ in 0..depth {
        value = Value::sequence([("children", Value::List(vec![value]))]);
    }
    value
}

#[test]
fn deep_nesting_round_trips_in_every_codec() {
    for codec in [Codec::Ber, Codec::Der, Codec::Uper, Codec::Per, Codec::Oer] {
        let schema = compile_str(SOURCE, codec).unwrap();
        for depth in [0, 1, 5, 40] {
            let value = chain(depth);
            let encoded = schema.encode("Tree", &value).unwrap();
            let decoded = schema.decode("Tree", &encoded).unwrap();
            assert_eq!(decoded, value, "codec {codec}, depth {depth}");
            // and byte-for-byte on re-encode
            assert_eq!(schema.encode("Tree", &decoded).unwrap(), encoded);
        }
    }
}

#[test]
fn pathological_depth_is_bounded_on_decode() {
    use asnkit::error::DecodeErrorKind;

    let schema = compile_str(SOURCE, Codec::Ber).unwrap();
    // deep enough to exhaust the decoder's depth budget; the encoder has no
    // such budget, so this produces valid input that must fail cleanly
    let value = chain(100);
    let encoded = schema.encode("Tree", &value).unwrap();
    let error = schema.decode("Tree", &encoded).unwrap_err();
    assert!(matches!(*error.kind, DecodeErrorKind::NestingLimitExceeded));
}

#[test]
fn mutual_recursion_through_choice() {
    let schema = compile_str(
        "M DEFINITIONS ::= BEGIN \
         Expr ::= CHOICE { literal INTEGER, pair Pair } \
         Pair ::= SEQUENCE { left [0] Expr OPTIONAL, right [1] Expr OPTIONAL } \
         END",
        Codec::Ber,
    )
    .unwrap();
    let value = Value::choice(
        "pair",
        Value::sequence([
            ("left", Value::choice("literal", Value::from(1))),
            (
                "right",
                Value::choice("pair", Value::sequence([(
                    "left",
                    Value::choice("literal", Value::from(2)),
                )])),
            ),
        ]),
    );
    let encoded = schema.encode("Expr", &value).unwrap();
    assert_eq!(schema.decode("Expr", &encoded).unwrap(), value);
}
