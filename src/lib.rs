//! Compiles the concise PuppetDB inventory query dialect into PuppetDB's native, prefix-form AST
//! query language.
//!
//! ```text
//! source string -> lexer -> tokens -> parser -> AST -> evaluator -> target AST -> (JSON)
//! ```
//!
//! The pipeline is pure and synchronous; [`facts`] is the only module that touches the outside
//! world, and only through the [`facts::PuppetDbClient`] trait.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod facts;
pub mod lexer;
pub mod parser;

pub use error::{CompileError, EvalError, LexError, ParseError, PuppetDbError, QueryError};
pub use evaluator::{Mode, Value};

/// Result of compiling a source string (§6.1). `Null` only occurs for empty input.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Null,
    Json(String),
    Value(Value),
}

/// Runs the full lexer → parser → evaluator pipeline.
///
/// An empty `source` (or one that lexes to no tokens) short-circuits to `Output::Null` without
/// involving the parser or evaluator at all.
pub fn parse(source: &str, mode: Mode, json: bool) -> Result<Output, CompileError> {
    let tokens = lexer::Lexer::new(source).lex()?;
    if tokens.is_empty() {
        log::debug!("empty source, returning Output::Null");
        return Ok(Output::Null);
    }

    let query = parser::parse(tokens)?;
    let Some(value) = evaluator::evaluate(&query, mode)? else {
        return Ok(Output::Null);
    };

    if json {
        Ok(Output::Json(
            serde_json::to_string(&value).expect("Value always serialises"),
        ))
    } else {
        Ok(Output::Value(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_is_null_regardless_of_mode_or_json() {
        assert_eq!(parse("", Mode::Nodes, true).unwrap(), Output::Null);
        assert_eq!(parse("", Mode::Facts, false).unwrap(), Output::Null);
    }

    #[test]
    fn json_output_is_compact() {
        let out = parse("foo=bar", Mode::None, true).unwrap();
        match out {
            Output::Json(text) => {
                assert!(!text.contains(' '));
                assert!(text.starts_with('['));
            }
            other => panic!("expected Json, got {other:?}"),
        }
    }

    #[test]
    fn lex_error_propagates_through_compile_error() {
        let err = parse("$", Mode::Nodes, false).unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }

    #[test]
    fn parse_error_propagates_through_compile_error() {
        let err = parse("foo=", Mode::Nodes, false).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }
}
