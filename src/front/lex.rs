//! The lexer: turns source text into a token stream.
//!
//! Ported from `duh/lexer.py`'s `lex()`/`Tokens`. Tokenization is
//! maximal-munch: characters are appended to the current token as long as
//! [`super::lang::compatible`] says the result could still become a single
//! token, the same rule the original lexer applies. Whitespace (including
//! newlines, which only matter for tracking line numbers) separates tokens
//! but otherwise carries no meaning; the language has no comment syntax.

use log::trace;

use crate::common::Id;
use crate::error::LexError;

use super::lang::{self, Keyword, Operator, Span, Symbol, Token, TokenData};

/// A consumed token stream with a read cursor, handed to the parser.
///
/// Mirrors `duh/lexer.py`'s `Tokens` class: `current`/`peek_next`/`advance`
/// step through without ever panicking past the end.
pub struct Tokens {
    tokens: Vec<Token>,
    head: usize,
}

impl Tokens {
    pub fn new(tokens: Vec<Token>) -> Self {
        Tokens { tokens, head: 0 }
    }

    pub fn current(&self) -> Option<&Token> {
        self.tokens.get(self.head)
    }

    pub fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.head + 1)
    }

    pub fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.head).cloned();
        if self.head < self.tokens.len() {
            self.head += 1;
        }
        token
    }

    pub fn empty(&self) -> bool {
        self.tokens.len() <= self.head
    }
}

/// Classify a finished token's text into a [`Token`].
fn create_token(content: &str, span: Span) -> Token {
    let data = if let Some(sym) = Symbol::from_str(content) {
        TokenData::Symbol(sym)
    } else if let Some(kw) = Keyword::from_str(content) {
        TokenData::Keyword(kw)
    } else if let Some(op) = Operator::from_str(content) {
        TokenData::Operator(op)
    } else if let Some(value) = lang::literal_to_value(content) {
        TokenData::Literal(value)
    } else {
        TokenData::Identifier(Id::new(content.to_string()))
    };
    Token { data, span }
}

/// Whether `c` alone could begin a valid token: a symbol, or a character
/// `compatible` (see `super::lang`) would accept as a one-character name,
/// operator, or literal.
fn can_start_token(c: char) -> bool {
    Symbol::from_str(&c.to_string()).is_some() || lang::compatible("", c)
}

/// Tokenize `source` in full, halting at the first character that cannot
/// start or extend any token.
pub fn lex(source: &str) -> Result<Tokens, LexError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_start = 0usize;

    let mut line = 0usize;
    let mut pos = 0usize;

    for c in source.chars() {
        if !current.is_empty() && (!lang::compatible(&current, c) || c.is_whitespace()) {
            trace!("lexed token {current:?}");
            tokens.push(create_token(&current, Span::new(line, current_start, pos)));
            current.clear();
        }

        if c == '\n' {
            line += 1;
        }

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if current.is_empty() {
            current_start = pos;
            if !can_start_token(c) {
                return Err(LexError::UnexpectedChar(c, line, pos));
            }
        }

        current.push(c);
        pos += 1;
    }

    if !current.is_empty() {
        tokens.push(create_token(&current, Span::new(line, current_start, pos)));
    }

    Ok(Tokens::new(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &Tokens) -> Vec<String> {
        tokens.tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn lexes_assignment_statement() {
        let tokens = lex("var x (= x 42) print x").unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                "keyword: var",
                "identifier: x",
                "symbol: (",
                "operator: =",
                "identifier: x",
                "literal: 42",
                "symbol: )",
                "keyword: print",
                "identifier: x",
            ]
        );
    }

    #[test]
    fn distinguishes_multi_char_operators() {
        let tokens = lex("(++ x) (-- x) (<= a b) (>= a b)").unwrap();
        let ops: Vec<_> = tokens
            .tokens
            .iter()
            .filter_map(|t| match &t.data {
                TokenData::Operator(op) => Some(*op),
                _ => None,
            })
            .collect();
        assert_eq!(ops, vec![Operator::Inc, Operator::Dec, Operator::Leq, Operator::Geq]);
    }

    #[test]
    fn lexes_negative_and_based_literals() {
        let tokens = lex("-5 0b101 0o17 0xFF").unwrap();
        let values: Vec<_> = tokens
            .tokens
            .iter()
            .filter_map(|t| match &t.data {
                TokenData::Literal(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(values, vec![-5, 0b101, 0o17, 0xFF]);
    }

    #[test]
    fn rejects_unrecognized_character() {
        let err = lex("var x $").unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar('$', 0, _)));
    }
}
