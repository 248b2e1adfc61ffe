//! Parse error types.
//!
//! Uses `thiserror` for structured, matchable error variants. Every variant
//! that corresponds to a location in the source carries its 1-based line.

use thiserror::Error;

/// Errors produced while lexing or parsing FlowScript source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A character outside the token alphabet.
    #[error("line {line}: unexpected character '{text}'")]
    UnexpectedChar { line: u32, text: String },

    /// An integer literal that does not fit in the 32-bit scalar type.
    #[error("line {line}: integer literal '{text}' out of range")]
    InvalidInteger { line: u32, text: String },

    /// A token that cannot start or continue the current production.
    #[error("line {line}: unexpected {found}, expected {expected}")]
    UnexpectedToken {
        line: u32,
        found: String,
        expected: &'static str,
    },

    /// Source ended in the middle of a production.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },
}
