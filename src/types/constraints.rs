//! Constraints merged onto a type during resolution.
//!
//! A [`Constraints`] value is the fully reduced form of every subtype
//! constraint written against a type: one effective value range, one
//! effective size range, and one effective permitted alphabet, each of which
//! may carry an extension part when the source constraint had an `...`
//! marker. Codecs only ever look at this reduced form.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// The reduced constraint set attached to a type node.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Constraints(Vec<Constraint>);

impl Constraints {
    /// A constraint set with no entries.
    pub const fn none() -> Self {
        Self(Vec::new())
    }

    pub fn new(constraints: Vec<Constraint>) -> Self {
        Self(constraints)
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.0.push(constraint);
    }

    /// The effective value range, if any value constraint applies.
    pub fn value(&self) -> Option<&Extensible<Value>> {
        self.0.iter().find_map(|constraint| match constraint {
            Constraint::Value(value) => Some(value),
            _ => None,
        })
    }

    /// The effective size range, if any size constraint applies.
    pub fn size(&self) -> Option<&Extensible<Size>> {
        self.0.iter().find_map(|constraint| match constraint {
            Constraint::Size(size) => Some(size),
            _ => None,
        })
    }

    /// The effective permitted alphabet, if a `FROM` constraint applies.
    pub fn permitted_alphabet(&self) -> Option<&Extensible<PermittedAlphabet>> {
        self.0.iter().find_map(|constraint| match constraint {
            Constraint::PermittedAlphabet(alphabet) => Some(alphabet),
            _ => None,
        })
    }

    /// Whether any component of the constraint set carries an `...` marker.
    pub fn extensible(&self) -> bool {
        self.0.iter().any(Constraint::is_extensible)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single reduced constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// A value range constraint on an `INTEGER` or `REAL`.
    Value(Extensible<Value>),
    /// A `SIZE` constraint on a string, aggregate, or `BIT STRING`.
    Size(Extensible<Size>),
    /// A `FROM` constraint on a restricted character string.
    PermittedAlphabet(Extensible<PermittedAlphabet>),
}

impl Constraint {
    pub fn is_extensible(&self) -> bool {
        match self {
            Self::Value(value) => value.extensible,
            Self::Size(size) => size.extensible,
            Self::PermittedAlphabet(alphabet) => alphabet.extensible,
        }
    }
}

/// Wraps a constraint with its root/extension split.
///
/// `constraint` is the root part. `extension` is only populated when the
/// marker was followed by additional element sets; a bare `...` leaves it
/// `None` while still setting `extensible`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extensible<T> {
    pub constraint: T,
    pub extensible: bool,
    pub extension: Option<T>,
}

impl<T> Extensible<T> {
    pub const fn new(constraint: T) -> Self {
        Self {
            constraint,
            extensible: false,
            extension: None,
        }
    }

    #[must_use]
    pub fn extends(mut self, extension: Option<T>) -> Self {
        self.extensible = true;
        self.extension = extension;
        self
    }
}

/// A value range constraint with `i128` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Value(pub Bounded<i128>);

impl Value {
    pub const fn new(bound: Bounded<i128>) -> Self {
        Self(bound)
    }

    /// Whether `value` lies inside the range. Values outside `i128` never do
    /// unless the matching end is open.
    pub fn contains(&self, value: &BigInt) -> bool {
        match value.to_i128() {
            Some(value) => self.0.contains(&value),
            None => {
                let negative = value.sign() == num_bigint::Sign::Minus;
                match self.0 {
                    Bounded::None => true,
                    Bounded::Single(_) => false,
                    Bounded::Range { start, end } => {
                        if negative {
                            start.is_none()
                        } else {
                            end.is_none()
                        }
                    }
                }
            }
        }
    }
}

impl core::ops::Deref for Value {
    type Target = Bounded<i128>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A size range constraint with `usize` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size(pub Bounded<usize>);

impl Size {
    pub const fn new(bound: Bounded<usize>) -> Self {
        Self(bound)
    }

    pub const fn fixed(size: usize) -> Self {
        Self(Bounded::Single(size))
    }
}

impl core::ops::Deref for Size {
    type Target = Bounded<usize>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A permitted alphabet: the sorted, deduplicated character values a
/// restricted string may contain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermittedAlphabet(Vec<u32>);

impl PermittedAlphabet {
    /// Builds an alphabet from raw character values, sorting and removing
    /// duplicates so positions double as PER indices.
    pub fn new(mut characters: Vec<u32>) -> Self {
        characters.sort_unstable();
        characters.dedup();
        Self(characters)
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The position of `character` in the alphabet, if permitted.
    pub fn index_of(&self, character: u32) -> Option<usize> {
        self.0.binary_search(&character).ok()
    }

    /// The largest character value in the alphabet.
    pub fn largest(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl core::ops::Deref for PermittedAlphabet {
    type Target = [u32];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A possibly half-open range of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bounded<T> {
    /// No bound on either end.
    None,
    /// A single permitted value.
    Single(T),
    /// A range with optionally open ends.
    Range { start: Option<T>, end: Option<T> },
}

impl<T> Default for Bounded<T> {
    fn default() -> Self {
        Self::None
    }
}

impl<T> Bounded<T> {
    pub const fn start_from(value: T) -> Self {
        Self::Range {
            start: Some(value),
            end: None,
        }
    }

    pub const fn up_to(value: T) -> Self {
        Self::Range {
            start: None,
            end: Some(value),
        }
    }

    pub const fn new(start: T, end: T) -> Self {
        Self::Range {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn as_start(&self) -> Option<&T> {
        match self {
            Self::None => None,
            Self::Single(value) => Some(value),
            Self::Range { start, .. } => start.as_ref(),
        }
    }

    pub fn as_end(&self) -> Option<&T> {
        match self {
            Self::None => None,
            Self::Single(value) => Some(value),
            Self::Range { end, .. } => end.as_ref(),
        }
    }
}

impl<T: PartialOrd + Copy> Bounded<T> {
    pub fn contains(&self, value: &T) -> bool {
        match self {
            Self::None => true,
            Self::Single(single) => single == value,
            Self::Range { start, end } => {
                start.map_or(true, |start| start <= *value)
                    && end.map_or(true, |end| *value <= end)
            }
        }
    }
}

impl Bounded<i128> {
    /// The count of values in the range minus one, when both ends are fixed
    /// and the difference fits `i128`. `None` means the range is effectively
    /// unconstrained for codec purposes.
    pub fn range(&self) -> Option<i128> {
        match self {
            Self::Single(_) => Some(0),
            Self::Range {
                start: Some(start),
                end: Some(end),
            } => end.checked_sub(*start),
            _ => None,
        }
    }

    pub fn minimum(&self) -> Option<i128> {
        self.as_start().copied()
    }
}

impl Bounded<usize> {
    /// As [`Bounded::<i128>::range`], for size bounds.
    pub fn range(&self) -> Option<usize> {
        match self {
            Self::Single(_) => Some(0),
            Self::Range {
                start: Some(start),
                end: Some(end),
            } => end.checked_sub(*start),
            _ => None,
        }
    }

    /// The lower bound of the size, defaulting to zero.
    pub fn minimum(&self) -> usize {
        self.as_start().copied().unwrap_or_default()
    }

    pub fn maximum(&self) -> Option<usize> {
        self.as_end().copied()
    }
}

impl<T: core::fmt::Display> core::fmt::Display for Bounded<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::None => f.write_str("MIN..MAX"),
            Self::Single(value) => value.fmt(f),
            Self::Range { start, end } => {
                match start {
                    Some(start) => write!(f, "{start}..")?,
                    None => f.write_str("MIN..")?,
                }
                match end {
                    Some(end) => write!(f, "{end}"),
                    None => f.write_str("MAX"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_contains() {
        let bound = Bounded::new(0i128, 255);
        assert!(bound.contains(&0));
        assert!(bound.contains(&255));
        assert!(!bound.contains(&256));
        assert_eq!(bound.range(), Some(255));

        assert!(Bounded::<i128>::None.contains(&i128::MAX));
        assert_eq!(Bounded::Single(5i128).range(), Some(0));
    }

    #[test]
    fn alphabet_indexing() {
        let alphabet = PermittedAlphabet::new(vec![b'c' as u32, b'a' as u32, b'b' as u32]);
        assert_eq!(alphabet.index_of(b'a' as u32), Some(0));
        assert_eq!(alphabet.index_of(b'c' as u32), Some(2));
        assert_eq!(alphabet.index_of(b'z' as u32), None);
        assert_eq!(alphabet.largest(), Some(b'c' as u32));
    }

    #[test]
    fn big_integer_containment() {
        let value = Value::new(Bounded::start_from(0));
        assert!(value.contains(&(BigInt::from(u128::MAX) * 4)));
        assert!(!value.contains(&BigInt::from(-1)));
    }
}
