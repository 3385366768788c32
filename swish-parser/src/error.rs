//! Parser error types.

use crate::source::SourcePosition;

/// Errors raised while tokenizing or parsing shell input.
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    /// An unexpected token was encountered.
    #[error("syntax error near unexpected token `{token}` ({position})")]
    UnexpectedToken {
        /// Display form of the offending token.
        token: String,
        /// Where the token was found.
        position: SourcePosition,
    },

    /// The input ended in the middle of a construct.
    #[error("syntax error: unexpected end of file ({position})")]
    UnexpectedEndOfInput {
        /// Where the input ended.
        position: SourcePosition,
    },

    /// A word that must be a name (e.g., a `for` variable or function name)
    /// was not a valid name.
    #[error("syntax error: `{0}` is not a valid name")]
    InvalidName(String),

    /// A file-descriptor number in a redirection was out of range.
    #[error("file descriptor out of range: {0}")]
    InvalidFdNumber(String),

    /// An I/O error occurred while reading input.
    #[error("error reading input: {0}")]
    Io(#[from] std::io::Error),
}
