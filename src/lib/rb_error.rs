use std::fmt;

/// Why a [`Position`](crate::Position) could not be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IteratorFault {
    /// The position is `end()`: it has no element and cannot advance.
    PastEnd,
    /// The position is `begin()` and cannot retreat.
    BeforeBegin,
    /// The position belongs to another map, or to none at all.
    ForeignContainer,
    /// The element the position referred to has been erased.
    Stale,
}

/// Errors reported by [`RbMap`](crate::RbMap).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// No key equivalent to the requested one is stored.
    KeyNotFound,
    /// A position was dereferenced, moved or erased where that is not allowed.
    InvalidIterator(IteratorFault),
}

/// Result type returned by fallible map operations.
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for IteratorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IteratorFault::PastEnd => write!(f, "position is past the end"),
            IteratorFault::BeforeBegin => write!(f, "position is at the beginning"),
            IteratorFault::ForeignContainer => write!(f, "position belongs to another map"),
            IteratorFault::Stale => write!(f, "position refers to an erased element"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyNotFound => write!(f, "key not found"),
            Error::InvalidIterator(fault) => write!(f, "invalid iterator: {}", fault),
        }
    }
}

impl std::error::Error for Error {}

impl From<IteratorFault> for Error {
    fn from(fault: IteratorFault) -> Self {
        Error::InvalidIterator(fault)
    }
}
