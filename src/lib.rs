//! A runtime ASN.1 schema compiler and codec toolkit.
//!
//! `asnkit` ingests ASN.1 module definitions (ITU-T X.680), compiles them
//! into a frozen type model, and drives bit-exact encoders and decoders for
//! BER, CER, DER (X.690), aligned and unaligned PER (X.691), and OER
//! (X.696) over that model.
//!
//! ```
//! use asnkit::{compile, Codec, CompileOptions, Source, Value};
//!
//! let schema = compile(
//!     &[Source::new(
//!         "example",
//!         "Example DEFINITIONS AUTOMATIC TAGS ::= BEGIN \
//!          Point ::= SEQUENCE { x INTEGER (0..255), y INTEGER (0..255) } \
//!          END",
//!     )],
//!     CompileOptions::codec(Codec::Uper),
//! )
//! .unwrap();
//!
//! let point = Value::sequence([("x", Value::from(1)), ("y", Value::from(2))]);
//! let encoded = schema.encode("Point", &point).unwrap();
//! assert_eq!(encoded, [0x01, 0x02]);
//! assert_eq!(schema.decode("Point", &encoded).unwrap(), point);
//! ```
//!
//! A compiled [`Schema`] is immutable and freely shareable across threads;
//! every encode/decode call keeps its state on the stack.

mod ast;
mod bits;
mod codec;
mod lexer;
mod module;
mod num;
mod parser;
mod resolver;

pub mod ber;
pub mod cer;
pub mod der;
pub mod error;
pub mod oer;
pub mod per;
pub mod types;
pub mod uper;
pub mod value;

#[doc(inline)]
pub use self::{
    codec::Codec,
    error::{CompileError, DecodeError, EncodeError, ResolveError, SyntaxError},
    value::Value,
};

use error::PathSegment;
use types::{TypeIndex, TypeKind, TypeModel};

/// One ASN.1 source blob with the label used in diagnostics.
#[derive(Debug, Clone)]
pub struct Source {
    pub label: String,
    pub text: String,
}

impl Source {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Self::new("<input>", text)
    }
}

/// Options for [`compile`].
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// The wire format the schema is bound to.
    pub codec: Codec,
    /// Surface `ENUMERATED` values as their numbers instead of their names.
    pub numeric_enums: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Ber,
            numeric_enums: false,
        }
    }
}

impl CompileOptions {
    /// Options binding the schema to `codec`.
    #[must_use]
    pub fn codec(codec: Codec) -> Self {
        Self {
            codec,
            ..<_>::default()
        }
    }

    #[must_use]
    pub fn numeric_enums(mut self, numeric_enums: bool) -> Self {
        self.numeric_enums = numeric_enums;
        self
    }
}

/// Compiles an ordered list of ASN.1 sources into a [`Schema`] bound to a
/// single codec.
pub fn compile(sources: &[Source], options: CompileOptions) -> Result<Schema, CompileError> {
    let mut modules = Vec::new();
    for source in sources {
        modules.extend(parser::parse(&source.label, &source.text)?);
    }
    let table = module::ModuleTable::new(modules)?;
    let warnings = table.import_cycles();
    let model = resolver::resolve(&table)?;
    Ok(Schema {
        model,
        codec: options.codec,
        numeric_enums: options.numeric_enums,
        warnings,
    })
}

/// Compiles a single source blob; a convenience for tests and small tools.
pub fn compile_str(text: &str, codec: Codec) -> Result<Schema, CompileError> {
    compile(&[Source::from(text)], CompileOptions::codec(codec))
}

/// Lint mode: parses and resolves, collecting every resolution diagnostic
/// instead of stopping at the first. Syntax errors remain fatal.
pub fn lint(sources: &[Source]) -> Result<Vec<ResolveError>, SyntaxError> {
    let mut modules = Vec::new();
    for source in sources {
        modules.extend(parser::parse(&source.label, &source.text)?);
    }
    match module::ModuleTable::new(modules) {
        Ok(table) => Ok(resolver::lint(&table)),
        Err(error) => Ok(vec![error]),
    }
}

/// A compiled schema: the frozen type model plus the codec it is bound to.
#[derive(Debug)]
pub struct Schema {
    model: TypeModel,
    codec: Codec,
    numeric_enums: bool,
    warnings: Vec<String>,
}

impl Schema {
    /// The codec this schema is bound to.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Warnings collected during compilation (import cycles).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Names of the schema's exported types, plain and module-qualified.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.model.type_names()
    }

    /// The underlying type model.
    pub fn model(&self) -> &TypeModel {
        &self.model
    }

    /// Encodes `value` as the named type.
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let index = self
            .model
            .lookup(type_name)
            .ok_or_else(|| EncodeError::unknown_type_name(type_name, self.codec))?;
        self.codec
            .encode_value(&self.model, index, value)
            .map_err(|e| e.at(PathSegment::Type(type_name.to_owned())))
    }

    /// Decodes exactly one value of the named type; trailing bytes are an
    /// error.
    pub fn decode(&self, type_name: &str, input: &[u8]) -> Result<Value, DecodeError> {
        let (value, remainder) = self.decode_with_remainder(type_name, input)?;
        if !remainder.is_empty() {
            return Err(
                DecodeError::trailing_data(remainder.len(), self.codec)
                    .at(PathSegment::Type(type_name.to_owned())),
            );
        }
        Ok(value)
    }

    /// Decodes one value of the named type and returns the unconsumed
    /// remainder of `input`.
    pub fn decode_with_remainder<'input>(
        &self,
        type_name: &str,
        input: &'input [u8],
    ) -> Result<(Value, &'input [u8]), DecodeError> {
        let index = self
            .model
            .lookup(type_name)
            .ok_or_else(|| DecodeError::unknown_type_name(type_name, self.codec))?;
        let (value, remainder) = self
            .codec
            .decode_value(&self.model, index, input)
            .map_err(|e| e.at(PathSegment::Type(type_name.to_owned())))?;
        let value = if self.numeric_enums {
            self.numericize(index, value)
        } else {
            value
        };
        Ok((value, remainder))
    }

    /// Fills absent `DEFAULT` members of `value` with their defaults,
    /// recursively; the normal form the decoders produce.
    pub fn refresh(&self, type_name: &str, value: &Value) -> Result<Value, EncodeError> {
        let index = self
            .model
            .lookup(type_name)
            .ok_or_else(|| EncodeError::unknown_type_name(type_name, self.codec))?;
        Ok(self.refresh_value(index, value))
    }

    fn refresh_value(&self, index: TypeIndex, value: &Value) -> Value {
        let node = self.model.node(index);
        match (&node.kind, value) {
            (TypeKind::Sequence(constructed), Value::Sequence(members))
            | (TypeKind::Set(constructed), Value::Sequence(members)) => {
                let mut refreshed = members.clone();
                for member in &constructed.members {
                    match members.get(&member.name) {
                        Some(present) => {
                            refreshed.insert(
                                member.name.clone(),
                                self.refresh_value(member.ty, present),
                            );
                        }
                        None => {
                            if let Some(default) = &member.default {
                                refreshed.insert(member.name.clone(), default.clone());
                            }
                        }
                    }
                }
                Value::Sequence(refreshed)
            }
            (TypeKind::SequenceOf(element), Value::List(items))
            | (TypeKind::SetOf(element), Value::List(items)) => Value::List(
                items
                    .iter()
                    .map(|item| self.refresh_value(*element, item))
                    .collect(),
            ),
            (TypeKind::Choice(choice), Value::Choice(selector, payload)) => {
                match choice.variant(selector) {
                    Some(variant) => Value::Choice(
                        selector.clone(),
                        Box::new(self.refresh_value(variant.ty, payload)),
                    ),
                    None => value.clone(),
                }
            }
            _ => value.clone(),
        }
    }

    /// Rewrites `ENUMERATED` names to their numbers, for the
    /// `numeric_enums` option.
    fn numericize(&self, index: TypeIndex, value: Value) -> Value {
        let node = self.model.node(index);
        match (&node.kind, value) {
            (TypeKind::Enumerated(enumeration), Value::Enumerated(name)) => {
                match enumeration.value_of(&name) {
                    Some(number) => Value::Integer(number.into()),
                    None => Value::Enumerated(name),
                }
            }
            (TypeKind::Sequence(constructed), Value::Sequence(members))
            | (TypeKind::Set(constructed), Value::Sequence(members)) => Value::Sequence(
                members
                    .into_iter()
                    .map(|(name, member_value)| {
                        let member_value = match constructed
                            .members
                            .iter()
                            .find(|member| member.name == name)
                        {
                            Some(member) => self.numericize(member.ty, member_value),
                            None => member_value,
                        };
                        (name, member_value)
                    })
                    .collect(),
            ),
            (TypeKind::SequenceOf(element), Value::List(items))
            | (TypeKind::SetOf(element), Value::List(items)) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.numericize(*element, item))
                    .collect(),
            ),
            (TypeKind::Choice(choice), Value::Choice(selector, payload)) => {
                match choice.variant(&selector) {
                    Some(variant) => {
                        let payload = self.numericize(variant.ty, *payload);
                        Value::Choice(selector, Box::new(payload))
                    }
                    None => Value::Choice(selector, payload),
                }
            }
            (_, value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compile_and_round_trip() {
        let schema = compile_str(
            "M DEFINITIONS ::= BEGIN B ::= BOOLEAN END",
            Codec::Ber,
        )
        .unwrap();
        let encoded = schema.encode("B", &Value::Boolean(true)).unwrap();
        assert_eq!(encoded, vec![0x01, 0x01, 0xFF]);
        assert_eq!(schema.decode("B", &encoded).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn unknown_type_name_errors() {
        let schema = compile_str("M DEFINITIONS ::= BEGIN A ::= NULL END", Codec::Ber).unwrap();
        assert!(schema.encode("Missing", &Value::Null).is_err());
        assert!(schema.decode("Missing", &[0x05, 0x00]).is_err());
    }

    #[test]
    fn trailing_data_is_rejected() {
        let schema = compile_str("M DEFINITIONS ::= BEGIN A ::= NULL END", Codec::Ber).unwrap();
        let error = schema.decode("A", &[0x05, 0x00, 0xAA]).unwrap_err();
        assert!(matches!(
            *error.kind,
            error::DecodeErrorKind::TrailingData { remaining: 1 }
        ));
        let (value, rest) = schema.decode_with_remainder("A", &[0x05, 0x00, 0xAA]).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(rest, &[0xAA]);
    }

    #[test]
    fn refresh_fills_defaults() {
        let schema = compile_str(
            "M DEFINITIONS ::= BEGIN \
             S ::= SEQUENCE { a INTEGER, b INTEGER DEFAULT 7 } \
             END",
            Codec::Der,
        )
        .unwrap();
        let refreshed = schema
            .refresh("S", &Value::sequence([("a", Value::from(1))]))
            .unwrap();
        assert_eq!(
            refreshed,
            Value::sequence([("a", Value::from(1)), ("b", Value::from(7))])
        );
    }

    #[test]
    fn numeric_enums_option() {
        let schema = compile(
            &[Source::from(
                "M DEFINITIONS ::= BEGIN E ::= ENUMERATED { a(0), b(5) } END",
            )],
            CompileOptions::codec(Codec::Ber).numeric_enums(true),
        )
        .unwrap();
        let encoded = schema
            .encode("E", &Value::Enumerated("b".to_owned()))
            .unwrap();
        assert_eq!(schema.decode("E", &encoded).unwrap(), Value::from(5));
    }

    #[test]
    fn lint_reports_without_stopping() {
        let diagnostics = lint(&[Source::from(
            "M DEFINITIONS ::= BEGIN A ::= Missing B ::= BOOLEAN C ::= AlsoMissing END",
        )])
        .unwrap();
        assert_eq!(diagnostics.len(), 2);
    }
}
