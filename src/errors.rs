//! Error types for building, encoding and decoding tries.

use std::error::Error;
use std::fmt;

/// Result type with [`TrieError`] as the default error.
pub type Result<T, E = TrieError> = std::result::Result<T, E>;

/// Errors raised by this crate.
///
/// Absent words are never errors: queries report them as `false`, `None`
/// or an empty result.
#[derive(Debug, thiserror::Error)]
pub enum TrieError {
    /// A construction-time argument was invalid.
    #[error(transparent)]
    Construction(ConstructionError),

    /// A serialized buffer could not be decoded.
    #[error(transparent)]
    Format(FormatError),

    /// An operation was called before the state it depends on was ready.
    #[error(transparent)]
    Precondition(PreconditionError),

    /// I/O error while reading or writing files.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TrieError {
    pub(crate) fn construction<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Construction(ConstructionError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn format<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Format(FormatError { msg: msg.into() })
    }

    pub(crate) fn precondition<S, M>(msg: S, cause: M) -> Self
    where
        S: Into<String>,
        M: Into<String>,
    {
        Self::Precondition(PreconditionError {
            msg: msg.into(),
            cause: cause.into(),
        })
    }

    /// Returns true if this is a [`FormatError`].
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    /// Returns true if this is a [`PreconditionError`].
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

/// Out-of-range index or unknown symbol during construction.
#[derive(Debug)]
pub struct ConstructionError {
    pub(crate) arg: &'static str,
    pub(crate) msg: String,
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ConstructionError: {}: {}", self.arg, self.msg)
    }
}

impl Error for ConstructionError {}

/// Malformed serialized trie.
#[derive(Debug)]
pub struct FormatError {
    pub(crate) msg: String,
}

impl FormatError {
    /// The error message.
    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl Error for FormatError {}

/// Misuse of the API, such as using a codec before initialisation.
#[derive(Debug)]
pub struct PreconditionError {
    pub(crate) msg: String,
    pub(crate) cause: String,
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PreconditionError: {}: {}", self.msg, self.cause)
    }
}

impl Error for PreconditionError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_message_is_verbatim() {
        let err = TrieError::format("Invalid trie file");
        assert!(err.is_format());
        assert_eq!(err.to_string(), "Invalid trie file");
    }

    #[test]
    fn construction_message_names_argument() {
        let err = TrieError::construction("index", "17 >= 16");
        assert_eq!(err.to_string(), "ConstructionError: index: 17 >= 16");
        assert!(!err.is_precondition());
    }
}
