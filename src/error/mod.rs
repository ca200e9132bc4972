//! Error types for every layer of the toolkit.
//!
//! The layers do not mix: the parser fails with [`SyntaxError`], the
//! resolver with [`ResolveError`], and the codecs with [`EncodeError`] /
//! [`DecodeError`]. Codec errors carry a [`Path`] from the root type to the
//! failing node.

mod decode;
mod encode;
mod resolve;
mod syntax;

pub use decode::{DecodeError, DecodeErrorKind};
pub use encode::{EncodeError, EncodeErrorKind};
pub use resolve::{ResolveError, ResolveErrorKind};
pub use syntax::SyntaxError;

use snafu::Snafu;

/// One step of a codec error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A type reference name.
    Type(String),
    /// A `SEQUENCE`/`SET` member or `CHOICE` alternative name.
    Member(String),
    /// An element index in a `SEQUENCE OF`/`SET OF`.
    Index(usize),
}

impl core::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Type(name) => f.write_str(name),
            Self::Member(name) => f.write_str(name),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        Self::Member(name.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// The path from the root type to the node an encode or decode failed at,
/// built up as the codec recursion unwinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    pub(crate) fn push_front(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl core::fmt::Display for Path {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 && !matches!(segment, PathSegment::Index(_)) {
                f.write_str(".")?;
            }
            segment.fmt(f)?;
        }
        Ok(())
    }
}

/// Errors surfaced by [`compile`](crate::compile).
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CompileError {
    /// The source text did not parse.
    #[snafu(display("{source}"), context(false))]
    Syntax { source: SyntaxError },
    /// The parsed modules did not resolve.
    #[snafu(display("{source}"), context(false))]
    Resolve { source: ResolveError },
}
