//! Error types that cross the crate boundary.
//!
//! Three kinds of failure exist: a [`LexError`] and a [`ParseError`], each carrying a byte offset
//! into the original source, and an [`EvalError`] for the one way lowering can fail (an
//! unparseable `@"..."` date literal). [`CompileError`] unifies the three for [`crate::parse`];
//! [`QueryError`] additionally wraps the PuppetDB collaborator error for the `facts` module.

use thiserror::Error;

/// A byte offset into the source string, or `None` when the error occurs at end of input.
pub type Offset = Option<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {offset:?})")]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

impl LexError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at byte {offset:?})")]
pub struct ParseError {
    pub message: String,
    pub offset: Offset,
}

impl ParseError {
    pub fn new(message: impl Into<String>, offset: Offset) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("could not parse '{text}' as a date")]
    InvalidDate { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Error surfaced by a [`crate::facts::PuppetDbClient`] implementation.
#[derive(Debug, Error)]
#[error("PuppetDB request failed: {0}")]
pub struct PuppetDbError(pub String);

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    PuppetDb(#[from] PuppetDbError),
}
