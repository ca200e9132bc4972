//! Resolution-stage errors.

use snafu::Snafu;

/// An error produced while reducing parsed modules to the type model.
///
/// Always identifies the module and definition being resolved when the error
/// surfaced.
#[derive(Debug, Snafu)]
#[snafu(display("error resolving `{name}` in module `{module}`: {kind}"))]
pub struct ResolveError {
    /// The kind of resolution failure.
    pub kind: Box<ResolveErrorKind>,
    /// The module whose definition was being resolved.
    pub module: String,
    /// The type or value assignment being resolved.
    pub name: String,
}

impl ResolveError {
    pub(crate) fn new(kind: ResolveErrorKind, module: &str, name: &str) -> Self {
        Self {
            kind: Box::new(kind),
            module: module.to_owned(),
            name: name.to_owned(),
        }
    }
}

/// The kinds of resolution failure.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ResolveErrorKind {
    /// A type or value reference did not resolve in any known module.
    #[snafu(display("unknown reference `{symbol}`"))]
    UnknownReference { symbol: String },
    /// An import names a module that is not part of the compilation.
    #[snafu(display("unknown module `{module}`"))]
    UnknownModule { module: String },
    /// An imported symbol is not defined (or not exported) by its source
    /// module.
    #[snafu(display("`{symbol}` is not exported by module `{module}`"))]
    UnknownImport { symbol: String, module: String },
    /// Instantiating a parameterized type never reached a fixed point.
    #[snafu(display("cyclic instantiation of parameterized type `{template}`"))]
    CyclicInstantiation { template: String },
    /// A parameterized reference was given the wrong number of actuals.
    #[snafu(display(
        "`{template}` takes {expected} parameter(s) but {actual} were supplied"
    ))]
    ParameterCount {
        template: String,
        expected: usize,
        actual: usize,
    },
    /// Two members or alternatives would be indistinguishable on the wire.
    #[snafu(display("duplicate tag {tag} on `{member}`"))]
    DuplicateTag { tag: crate::types::Tag, member: String },
    /// Duplicate definition, member, or enumeration item name.
    #[snafu(display("duplicate name `{duplicate}`"))]
    DuplicateName { duplicate: String },
    /// A value does not fit the type it was declared or defaulted against.
    #[snafu(display("type mismatch: expected {expected}, found {found}"))]
    TypeMismatch { expected: String, found: String },
    /// A constraint is empty, inverted, or applied to the wrong kind of type.
    #[snafu(display("invalid constraint: {reason}"))]
    InvalidConstraint { reason: String },
    /// An extension element set appeared without a root to extend.
    #[snafu(display("constraint extension without a root"))]
    ExtensionWithoutRoot,
    /// A `DEFAULT` value failed to type-check against the member type.
    #[snafu(display("invalid DEFAULT for `{member}`: {reason}"))]
    InvalidDefault { member: String, reason: String },
    /// A type reaches itself with no `OPTIONAL` or `SEQUENCE OF`/`SET OF` on
    /// the cycle.
    #[snafu(display("`{reference}` recursively contains itself"))]
    RecursiveType { reference: String },
    /// `COMPONENTS OF` named something other than a `SEQUENCE`/`SET`.
    #[snafu(display("COMPONENTS OF requires a SEQUENCE or SET, found {found}"))]
    InvalidComponentsOf { found: String },
    /// A selection type (`alt < Choice`) named a missing alternative.
    #[snafu(display("`{alternative}` is not an alternative of the selected CHOICE"))]
    UnknownAlternative { alternative: String },
}
