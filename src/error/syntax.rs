//! Parse-stage errors.

use snafu::Snafu;

/// An error produced while tokenizing or parsing ASN.1 source text.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{label}:{line}:{column}: {message}"))]
pub struct SyntaxError {
    /// The label of the source blob the error occurred in.
    pub label: String,
    /// 1-based line of the offending token.
    pub line: usize,
    /// 1-based column of the offending token.
    pub column: usize,
    /// What was expected and what was found instead.
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(label: &str, line: usize, column: usize, message: String) -> Self {
        Self {
            label: label.to_owned(),
            line,
            column,
            message,
        }
    }
}
