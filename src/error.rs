use std::fmt;

use serde::{de, ser};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// A schema line couldn't be parsed. Carries the 1-based line number and the offending text.
    SchemaSyntax { line: usize, text: String },
    /// The first line of a schema wasn't one of the recognized byte order symbols.
    InvalidByteOrder(String),
    /// A schema line used a type code that isn't supported.
    UnknownTypeCode { line: usize, code: String },
    /// Data was the wrong length for the step being decoded. If `exact` is set, the data had to
    /// be exactly `expected` bytes long, otherwise it had to be at least that long.
    LengthMismatch {
        step: &'static str,
        expected: usize,
        actual: usize,
        exact: bool,
    },
    /// The decoder produced a different number of values than the layout has named fields. This
    /// is an internal consistency fault, not bad input.
    DecodeArity { expected: usize, actual: usize },
    /// A value couldn't be represented by the type code it was being encoded as.
    ValueOutOfRange { path: String, code: char },
    /// A fragment block declared a negative element count.
    InvalidFragmentCount(i64),
    /// The fragment offset field was missing, not an integer, or pointed outside the record.
    InvalidFragmentOffset { field: String, reason: String },
    /// No layout is registered for a record's version tag.
    UnknownSchemaVersion(i16),
    /// A composite key had no entry in the lookup table.
    UnknownKey(u64),
    /// A composite key component didn't fit in its bit field.
    KeyFieldOverflow { field: &'static str, value: u64 },
    /// A path was empty.
    InvalidPath,
    /// A path segment wasn't present in the tree.
    KeyNotFound { path: String },
    /// Failed while reading a schema or cache file.
    Io(std::io::Error),
    /// Occurs when serde serialization or deserialization fails
    SerdeFail(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::SchemaSyntax { line, ref text } => {
                write!(f, "Schema syntax error on line {}: {:?}", line, text)
            }
            Error::InvalidByteOrder(ref symbol) => {
                write!(f, "Invalid byte order symbol: {:?}", symbol)
            }
            Error::UnknownTypeCode { line, ref code } => {
                write!(f, "Unknown type code {:?} on line {}", code, line)
            }
            Error::LengthMismatch {
                step,
                expected,
                actual,
                exact,
            } => {
                if exact {
                    write!(
                        f,
                        "Expected data length {}, but got {} on step [{}]",
                        expected, actual, step
                    )
                } else {
                    write!(
                        f,
                        "Expected data length of at least {}, but got {} on step [{}]",
                        expected, actual, step
                    )
                }
            }
            Error::DecodeArity { expected, actual } => write!(
                f,
                "Decoded {} values, but layout has {} named fields",
                actual, expected
            ),
            Error::ValueOutOfRange { ref path, code } => {
                write!(f, "Value at {} doesn't fit type code '{}'", path, code)
            }
            Error::InvalidFragmentCount(count) => {
                write!(f, "Fragment block has negative count {}", count)
            }
            Error::InvalidFragmentOffset {
                ref field,
                ref reason,
            } => write!(f, "Bad fragment offset field {:?}: {}", field, reason),
            Error::UnknownSchemaVersion(version) => {
                write!(f, "No layout registered for version {}", version)
            }
            Error::UnknownKey(key) => write!(f, "Key {} isn't in the lookup table", key),
            Error::KeyFieldOverflow { field, value } => {
                write!(f, "Key field {} can't hold value {}", field, value)
            }
            Error::InvalidPath => f.write_str("Path must contain at least one key"),
            Error::KeyNotFound { ref path } => write!(f, "No entry at path {}", path),
            Error::Io(ref err) => write!(f, "I/O error: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::convert::From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::SerdeFail(e.to_string())
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

/// Render a key path the way error messages show it: `["a", "b"]`.
pub(crate) fn path_string<K: fmt::Debug>(path: &[K]) -> String {
    format!("{:?}", path)
}
