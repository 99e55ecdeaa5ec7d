//! Recursive-descent parser over the token stream produced by [`crate::lexer`].
//!
//! Grammar (EBNF, see `SPEC_FULL.md` §4.2 for the derivation of the precedence order):
//!
//! ```text
//! query           := expr | ε
//! expr            := or_expr
//! or_expr         := and_expr (OR and_expr)*
//! and_expr        := not_expr (AND not_expr)*
//! not_expr        := NOT not_expr | atom
//! atom            := LPAREN expr RPAREN
//!                  | resource_expr
//!                  | subquery
//!                  | identifier_path [cmp_op literal]
//! resource_expr   := [EXPORTED] STRING LBRACK identifier RBRACK [block_expr]
//! subquery        := HASH STRING (DOT comparison_expr | block_expr)
//! block_expr      := LBRACE expr RBRACE
//! identifier_path := identifier (DOT identifier)*
//! identifier      := STRING | NUMBER | MATCH STRING | ASTERISK
//! literal         := BOOLEAN | STRING | NUMBER | FLOAT | AT STRING
//! ```
//!
//! `NOT` sits between the comparison tier and `AND`: it binds only the single atom/comparison to
//! its right, never a whole `AND`/`OR` chain, which is why `not foo=bar` lowers to
//! `Not(Comparison(foo, =, bar))` rather than swallowing anything past the comparison.

use crate::ast::{Comparison, ComparisonRhs, Identifier, IdentifierPath, Literal, Node, Query, Resource, Subquery};
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<Query, ParseError> {
    let mut parser = Parser::new(tokens);
    if parser.tokens.is_empty() {
        return Ok(Query { expression: None });
    }
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(Query {
        expression: Some(expr),
    })
}

/// Alternate start symbol used by `query_fact_contents` (§6.1) to parse a single dotted fact path
/// without the surrounding query grammar.
pub fn parse_identifier_path(tokens: Vec<Token>) -> Result<IdentifierPath, ParseError> {
    let mut parser = Parser::new(tokens);
    let path = parser.parse_identifier_path()?;
    parser.expect_eof()?;
    Ok(path)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.peek().map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        token
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ParseError::new(
                format!("unexpected trailing {}", t.kind.describe()),
                Some(t.offset),
            )),
        }
    }

    fn expect_kind(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        match self.peek_kind() {
            Some(k) if *k == kind => Ok(self.bump()),
            _ => Err(self.error_here(&format!("expected {}", kind.describe()))),
        }
    }

    fn error_here(&self, msg: &str) -> ParseError {
        match self.peek() {
            Some(t) => ParseError::new(format!("{msg}, found {}", t.kind.describe()), Some(t.offset)),
            None => ParseError::new(format!("{msg}, found end of input"), None),
        }
    }

    // --- precedence chain -------------------------------------------------

    fn parse_or(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek_kind(), Some(TokenKind::Or)) {
            log::trace!("or_expr: folding in another AND-chain at token {}", self.pos);
            self.bump();
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ParseError> {
        let mut left = self.parse_not()?;
        while matches!(self.peek_kind(), Some(TokenKind::And)) {
            self.bump();
            let right = self.parse_not()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Node, ParseError> {
        if matches!(self.peek_kind(), Some(TokenKind::Not)) {
            log::trace!("not_expr: negating the next atom at token {}", self.pos);
            self.bump();
            let inner = self.parse_not()?;
            Ok(Node::Not(Box::new(inner)))
        } else {
            self.parse_atom()
        }
    }

    fn parse_atom(&mut self) -> Result<Node, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Exported) => {
                self.bump();
                self.parse_resource(true)
            }
            Some(TokenKind::Hash) => self.parse_subquery(),
            Some(TokenKind::LParen) => {
                self.bump();
                let inner = self.parse_or()?;
                self.expect_kind(TokenKind::RParen)?;
                Ok(Node::Parenthesized(Box::new(inner)))
            }
            Some(TokenKind::String(_))
                if matches!(self.peek_kind_at(1), Some(TokenKind::LBrack)) =>
            {
                self.parse_resource(false)
            }
            Some(_) => self.parse_path_or_comparison(),
            None => Err(self.error_here("expected an expression")),
        }
    }

    fn parse_path_or_comparison(&mut self) -> Result<Node, ParseError> {
        let path = self.parse_identifier_path()?;
        if let Some(op) = self.peek_kind().and_then(TokenKind::as_comparison_op) {
            self.bump();
            let right = self.parse_literal_or_date()?;
            Ok(Node::Comparison(Comparison {
                op: op.to_string(),
                left: path,
                right,
            }))
        } else {
            Ok(Node::RegexpNodeMatch(path))
        }
    }

    /// `HASH STRING DOT comparison_expr` requires an actual comparison, not a bare path.
    fn parse_required_comparison(&mut self) -> Result<Node, ParseError> {
        let path = self.parse_identifier_path()?;
        let op = self
            .peek_kind()
            .and_then(TokenKind::as_comparison_op)
            .ok_or_else(|| self.error_here("expected a comparison operator"))?;
        self.bump();
        let right = self.parse_literal_or_date()?;
        Ok(Node::Comparison(Comparison {
            op: op.to_string(),
            left: path,
            right,
        }))
    }

    fn parse_subquery(&mut self) -> Result<Node, ParseError> {
        self.expect_kind(TokenKind::Hash)?;
        let endpoint = self.expect_string("subquery endpoint")?;
        log::trace!("subquery: endpoint '{endpoint}'");
        let expr = if matches!(self.peek_kind(), Some(TokenKind::Dot)) {
            self.bump();
            self.parse_required_comparison()?
        } else {
            self.parse_block_expr()?
        };
        Ok(Node::Subquery(Subquery {
            endpoint,
            expr: Box::new(expr),
        }))
    }

    fn parse_block_expr(&mut self) -> Result<Node, ParseError> {
        self.expect_kind(TokenKind::LBrace)?;
        let inner = self.parse_or()?;
        self.expect_kind(TokenKind::RBrace)?;
        Ok(Node::Block(Box::new(inner)))
    }

    fn parse_resource(&mut self, exported: bool) -> Result<Node, ParseError> {
        let res_type = self.expect_string("resource type")?;
        log::trace!("resource_expr: type '{res_type}', exported={exported}");
        self.expect_kind(TokenKind::LBrack)?;
        let title = self.parse_identifier()?;
        self.expect_kind(TokenKind::RBrack)?;
        let parameters = if matches!(self.peek_kind(), Some(TokenKind::LBrace)) {
            Some(Box::new(self.parse_block_expr()?))
        } else {
            None
        };
        Ok(Node::Resource(Resource {
            res_type,
            title,
            exported,
            parameters,
        }))
    }

    fn parse_identifier_path(&mut self) -> Result<IdentifierPath, ParseError> {
        let first = self.parse_identifier()?;
        let mut path = IdentifierPath::new(first);
        while matches!(self.peek_kind(), Some(TokenKind::Dot)) {
            self.bump();
            path.push(self.parse_identifier()?);
        }
        Ok(path)
    }

    fn parse_identifier(&mut self) -> Result<Identifier, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::String(_)) => {
                let TokenKind::String(s) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Identifier::str(s))
            }
            Some(TokenKind::Number(_)) => {
                let TokenKind::Number(n) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Identifier::int(n))
            }
            Some(TokenKind::Match) => {
                self.bump();
                let pattern = self.expect_string("regexp identifier pattern")?;
                Ok(Identifier::regexp(pattern))
            }
            Some(TokenKind::Asterisk) => {
                self.bump();
                Ok(Identifier::wildcard())
            }
            _ => Err(self.error_here("expected an identifier")),
        }
    }

    fn parse_literal_or_date(&mut self) -> Result<ComparisonRhs, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::At) => {
                self.bump();
                let text = self.expect_string("date literal")?;
                Ok(ComparisonRhs::Date(text))
            }
            _ => Ok(ComparisonRhs::Literal(self.parse_literal()?)),
        }
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::Boolean(_)) => {
                let TokenKind::Boolean(b) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Literal::Bool(b))
            }
            Some(TokenKind::Number(_)) => {
                let TokenKind::Number(n) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Literal::Int(n))
            }
            Some(TokenKind::Float(_)) => {
                let TokenKind::Float(f) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Literal::Float(f))
            }
            Some(TokenKind::String(_)) => {
                let TokenKind::String(s) = self.bump().kind else {
                    unreachable!()
                };
                Ok(Literal::Str(s))
            }
            _ => Err(self.error_here("expected a literal")),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek_kind() {
            Some(TokenKind::String(_)) => {
                let TokenKind::String(s) = self.bump().kind else {
                    unreachable!()
                };
                Ok(s)
            }
            _ => Err(self.error_here(&format!("expected {what}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_src(s: &str) -> Query {
        let tokens = Lexer::new(s).lex().unwrap();
        parse(tokens).unwrap()
    }

    #[test]
    fn empty_query_has_no_expression() {
        let q = parse_src("");
        assert_eq!(q.expression, None);
    }

    #[test]
    fn parses_simple_comparison() {
        let q = parse_src("foo=bar");
        match q.expression.unwrap() {
            Node::Comparison(Comparison { op, left, right }) => {
                assert_eq!(op, "=");
                assert_eq!(left.components().len(), 1);
                assert_eq!(right, ComparisonRhs::Literal(Literal::Str("bar".into())));
            }
            other => panic!("expected Comparison, got {other:?}"),
        }
    }

    #[test]
    fn not_binds_tighter_than_and_or() {
        let q = parse_src("not foo=bar and baz=1");
        match q.expression.unwrap() {
            Node::And(left, _right) => {
                assert!(matches!(*left, Node::Not(_)));
            }
            other => panic!("expected And at the top, got {other:?}"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let q = parse_src("foo=1 or bar=2 and baz=3");
        match q.expression.unwrap() {
            Node::Or(left, right) => {
                assert!(matches!(*left, Node::Comparison(_)));
                assert!(matches!(*right, Node::And(_, _)));
            }
            other => panic!("expected Or at the top, got {other:?}"),
        }
    }

    #[test]
    fn bare_path_without_comparison_is_a_regexp_node_match() {
        let q = parse_src("foo.bar.com");
        assert!(matches!(q.expression.unwrap(), Node::RegexpNodeMatch(_)));
    }

    #[test]
    fn resource_with_parameters_parses() {
        let q = parse_src("@@file[foo]{bar=baz}");
        match q.expression.unwrap() {
            Node::Resource(Resource {
                res_type,
                exported,
                parameters,
                ..
            }) => {
                assert_eq!(res_type, "file");
                assert!(exported);
                assert!(parameters.is_some());
            }
            other => panic!("expected Resource, got {other:?}"),
        }
    }

    #[test]
    fn subquery_with_block_parses() {
        let q = parse_src("#node { catalog_environment=production }");
        assert!(matches!(q.expression.unwrap(), Node::Subquery(_)));
    }

    #[test]
    fn trailing_tokens_are_a_parse_error() {
        let tokens = Lexer::new("foo=bar baz").lex().unwrap();
        let err = parse(tokens).unwrap_err();
        assert!(err.offset.is_some());
    }

    #[test]
    fn truncated_input_errors_at_end_of_input() {
        let tokens = Lexer::new("foo=").lex().unwrap();
        let err = parse(tokens).unwrap_err();
        assert_eq!(err.offset, None);
    }

    #[test]
    fn alternate_start_symbol_parses_bare_path() {
        let tokens = Lexer::new("os.family").lex().unwrap();
        let path = parse_identifier_path(tokens).unwrap();
        assert_eq!(path.components().len(), 2);
    }
}
