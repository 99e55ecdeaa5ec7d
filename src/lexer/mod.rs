//! Lexer for the inventory query dialect.
//!
//! Turns a source string into a flat [`Vec<Token>`], tracking byte offsets for error reporting.
//! No token is ever retracted once emitted: the recognition rules below are tried in priority
//! order (longest match first within a group) exactly as described by the surface grammar, so a
//! single forward scan suffices.

mod token;

pub use token::{Token, TokenKind};

use crate::error::LexError;
use once_cell::sync::Lazy;
use std::collections::HashMap;

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("not", TokenKind::Not);
    m.insert("and", TokenKind::And);
    m.insert("or", TokenKind::Or);
    m.insert("true", TokenKind::Boolean(true));
    m.insert("false", TokenKind::Boolean(false));
    m
});

pub type LexResult<T> = Result<T, LexError>;

fn is_bareword_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-'
}

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenise the whole input, consuming the lexer.
    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.eat_whitespace();
            if self.pos >= self.bytes.len() {
                return Ok(self.tokens);
            }
            self.lex_one()?;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn eat_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0c | 0x0b) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(kind, start));
    }

    fn lex_one(&mut self) -> LexResult<()> {
        let start = self.pos;
        let c = self.peek().expect("lex_one called at end of input") as char;

        match c {
            '!' => match self.peek_at(1) {
                Some(b'=') => self.emit_fixed(TokenKind::NotEquals, 2, start),
                Some(b'~') => self.emit_fixed(TokenKind::NotMatch, 2, start),
                _ => Err(self.error_at("unexpected character '!'", start)),
            },
            '<' => match self.peek_at(1) {
                Some(b'=') => self.emit_fixed(TokenKind::LessThanEq, 2, start),
                _ => self.emit_fixed(TokenKind::LessThan, 1, start),
            },
            '>' => match self.peek_at(1) {
                Some(b'=') => self.emit_fixed(TokenKind::GreaterThanEq, 2, start),
                _ => self.emit_fixed(TokenKind::GreaterThan, 1, start),
            },
            '@' => match self.peek_at(1) {
                Some(b'@') => self.emit_fixed(TokenKind::Exported, 2, start),
                _ => self.emit_fixed(TokenKind::At, 1, start),
            },
            '(' => self.emit_fixed(TokenKind::LParen, 1, start),
            ')' => self.emit_fixed(TokenKind::RParen, 1, start),
            '[' => self.emit_fixed(TokenKind::LBrack, 1, start),
            ']' => self.emit_fixed(TokenKind::RBrack, 1, start),
            '{' => self.emit_fixed(TokenKind::LBrace, 1, start),
            '}' => self.emit_fixed(TokenKind::RBrace, 1, start),
            '=' => self.emit_fixed(TokenKind::Equals, 1, start),
            '~' => self.emit_fixed(TokenKind::Match, 1, start),
            '*' => self.emit_fixed(TokenKind::Asterisk, 1, start),
            '#' => self.emit_fixed(TokenKind::Hash, 1, start),
            '.' => self.emit_fixed(TokenKind::Dot, 1, start),
            '"' => self.lex_quoted('"'),
            '\'' => self.lex_quoted('\''),
            '0'..='9' => self.lex_number(),
            '-' if matches!(self.peek_at(1), Some(b'0'..=b'9')) => self.lex_number(),
            c if is_bareword_char(c) => self.lex_bareword(),
            other => Err(self.error_at(&format!("illegal character '{other}'"), start)),
        }
    }

    fn emit_fixed(&mut self, kind: TokenKind, len: usize, start: usize) -> LexResult<()> {
        self.pos += len;
        self.push(kind, start);
        Ok(())
    }

    fn error_at(&self, message: &str, offset: usize) -> LexError {
        LexError::new(message.to_string(), offset)
    }

    fn lex_number(&mut self) -> LexResult<()> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }

        let is_float = self.peek() == Some(b'.')
            && matches!(self.peek_at(1), Some(b'0'..=b'9'));

        if is_float {
            self.pos += 1; // consume '.'
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
            let text = &self.input[start..self.pos];
            let value: f64 = text
                .parse()
                .map_err(|_| self.error_at(&format!("invalid float literal '{text}'"), start))?;
            self.push(TokenKind::Float(value), start);
        } else {
            let text = &self.input[start..self.pos];
            let value: i64 = text
                .parse()
                .map_err(|_| self.error_at(&format!("invalid integer literal '{text}'"), start))?;
            self.push(TokenKind::Number(value), start);
        }
        Ok(())
    }

    fn lex_bareword(&mut self) -> LexResult<()> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_bareword_char(c as char) {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        match KEYWORDS.get(text) {
            Some(kind) => self.push(kind.clone(), start),
            None => self.push(TokenKind::String(text.to_string()), start),
        }
        Ok(())
    }

    fn lex_quoted(&mut self, quote: char) -> LexResult<()> {
        let start = self.pos;
        self.pos += 1; // consume opening quote
        let mut value = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(self.error_at("unterminated quoted string", start));
                }
                Some(b'\\') => {
                    // Escape sequences are preserved verbatim: the backslash and the following
                    // byte are both copied into the value unchanged (§4.1, open question #2).
                    value.push('\\');
                    self.pos += 1;
                    if let Some(next) = self.current_char() {
                        value.push(next);
                        self.pos += next.len_utf8();
                    } else {
                        return Err(self.error_at("unterminated quoted string", start));
                    }
                }
                Some(c) if c as char == quote => {
                    self.pos += 1;
                    self.push(TokenKind::String(value), start);
                    return Ok(());
                }
                Some(_) => {
                    let c = self.current_char().expect("checked Some above");
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<TokenKind> {
        Lexer::new(s)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_bareword() {
        assert_eq!(lex("foo"), vec![TokenKind::String("foo".into())]);
    }

    #[test]
    fn lexes_keywords_before_barewords() {
        assert_eq!(
            lex("not and or true false"),
            vec![
                TokenKind::Not,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Boolean(true),
                TokenKind::Boolean(false),
            ]
        );
    }

    #[test]
    fn lexes_multi_char_sigils_before_single_char_prefixes() {
        assert_eq!(
            lex("!= !~ <= >= @@"),
            vec![
                TokenKind::NotEquals,
                TokenKind::NotMatch,
                TokenKind::LessThanEq,
                TokenKind::GreaterThanEq,
                TokenKind::Exported,
            ]
        );
    }

    #[test]
    fn lexes_negative_integer() {
        assert_eq!(lex("-1"), vec![TokenKind::Number(-1)]);
    }

    #[test]
    fn lexes_float_vs_dotted_path() {
        assert_eq!(lex("1.024"), vec![TokenKind::Float(1.024)]);
        assert_eq!(
            lex("foo.0"),
            vec![
                TokenKind::String("foo".into()),
                TokenKind::Dot,
                TokenKind::Number(0),
            ]
        );
    }

    #[test]
    fn lexes_three_string_forms() {
        assert_eq!(
            lex(r#"foo 'bar' "baz""#),
            vec![
                TokenKind::String("foo".into()),
                TokenKind::String("bar".into()),
                TokenKind::String("baz".into()),
            ]
        );
    }

    #[test]
    fn does_not_interpret_escape_sequences() {
        assert_eq!(lex(r#""\n""#), vec![TokenKind::String("\\n".into())]);
    }

    #[test]
    fn lexes_all_punctuation() {
        assert_eq!(
            lex("()[]{}~<>*#.@"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrack,
                TokenKind::RBrack,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Match,
                TokenKind::LessThan,
                TokenKind::GreaterThan,
                TokenKind::Asterisk,
                TokenKind::Hash,
                TokenKind::Dot,
                TokenKind::At,
            ]
        );
    }

    #[test]
    fn empty_input_lexes_to_no_tokens() {
        assert_eq!(lex(""), vec![]);
    }

    #[test]
    fn illegal_character_is_a_lex_error() {
        let err = Lexer::new("$").lex().unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn reports_offset_of_offending_character() {
        let err = Lexer::new("foo=bar $").lex().unwrap_err();
        assert_eq!(err.offset, 8);
    }
}
