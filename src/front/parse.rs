//! The parser: recursive descent over the token stream into the AST.
//!
//! Ported from `duh/parser.py`. The grammar (`spec.md` §6) is small enough
//! that a hand-written recursive descent parser with one function per
//! production reads naturally, exactly as the original is structured.

use crate::common::Id;
use crate::error::ParseError;

use super::ast::{Block, Node, Program};
use super::lang::{Keyword, Symbol, TokenData};
use super::lex::{lex, Tokens};

/// Lex and parse `source` in one step.
pub fn parse(source: &str) -> Result<Program, crate::error::DuhError> {
    let tokens = lex(source)?;
    Ok(parse_tokens(tokens)?)
}

pub fn parse_tokens(mut tokens: Tokens) -> Result<Program, ParseError> {
    let instructions = parse_instructions(&mut tokens)?;
    Ok(Program(instructions))
}

fn parse_instructions(tokens: &mut Tokens) -> Result<Vec<Node>, ParseError> {
    let mut instructions = Vec::new();
    while !tokens.empty() && !is_symbol(tokens.current(), Symbol::RightBrace) {
        instructions.push(parse_instruction(tokens)?);
    }
    Ok(instructions)
}

fn parse_instruction(tokens: &mut Tokens) -> Result<Node, ParseError> {
    let current = current_or_eof(tokens)?;
    match &current.data {
        TokenData::Keyword(kw) => match kw {
            Keyword::Var => parse_var(tokens),
            Keyword::Cell => parse_cell(tokens),
            Keyword::While => parse_while(tokens),
            Keyword::If => parse_if(tokens),
            Keyword::Print => parse_print(tokens),
            Keyword::Else | Keyword::Return | Keyword::Goto => {
                Err(unexpected(tokens.current().unwrap()))
            }
        },
        _ => parse_expression(tokens),
    }
}

fn expect_identifier(tokens: &mut Tokens) -> Result<Id, ParseError> {
    let token = tokens.advance().ok_or(ParseError::UnexpectedEof)?;
    match token.data {
        TokenData::Identifier(name) => Ok(name),
        _ => Err(unexpected(&token)),
    }
}

fn expect_literal(tokens: &mut Tokens) -> Result<i64, ParseError> {
    let token = tokens.advance().ok_or(ParseError::UnexpectedEof)?;
    match token.data {
        TokenData::Literal(value) => Ok(value),
        _ => Err(unexpected(&token)),
    }
}

fn parse_var(tokens: &mut Tokens) -> Result<Node, ParseError> {
    tokens.advance();
    let name = expect_identifier(tokens)?;
    Ok(Node::Var { name })
}

fn parse_cell(tokens: &mut Tokens) -> Result<Node, ParseError> {
    tokens.advance();
    let name = expect_identifier(tokens)?;
    let address = expect_literal(tokens)?;
    Ok(Node::Cell { name, address })
}

fn parse_while(tokens: &mut Tokens) -> Result<Node, ParseError> {
    tokens.advance();
    let cond = Box::new(parse_expression(tokens)?);
    let block = parse_block(tokens)?;
    Ok(Node::While { cond, block })
}

fn parse_if(tokens: &mut Tokens) -> Result<Node, ParseError> {
    tokens.advance();
    let cond = Box::new(parse_expression(tokens)?);
    let then_block = parse_block(tokens)?;
    let else_block = if matches!(
        tokens.current().map(|t| &t.data),
        Some(TokenData::Keyword(Keyword::Else))
    ) {
        tokens.advance();
        Some(parse_block(tokens)?)
    } else {
        None
    };
    Ok(Node::If { cond, then_block, else_block })
}

fn parse_print(tokens: &mut Tokens) -> Result<Node, ParseError> {
    tokens.advance();
    let expr = Box::new(parse_expression(tokens)?);
    Ok(Node::Print(expr))
}

fn parse_block(tokens: &mut Tokens) -> Result<Block, ParseError> {
    if is_symbol(tokens.current(), Symbol::LeftBrace) {
        parse_braced_block(tokens)
    } else {
        Ok(Block(vec![parse_instruction(tokens)?]))
    }
}

fn parse_braced_block(tokens: &mut Tokens) -> Result<Block, ParseError> {
    expect_symbol(tokens, Symbol::LeftBrace)?;
    let instructions = parse_instructions(tokens)?;
    expect_symbol(tokens, Symbol::RightBrace)?;
    Ok(Block(instructions))
}

fn parse_expression(tokens: &mut Tokens) -> Result<Node, ParseError> {
    if is_symbol(tokens.current(), Symbol::LeftParen) {
        parse_paren_expression(tokens)
    } else {
        parse_atom(tokens)
    }
}

/// A parenthesized expression `(op arg arg ...)` or a bare grouping `(expr)`.
/// Arguments may themselves be nested parenthesized expressions or atoms
/// (identifiers, literals, operators used positionally as `args[0]`).
fn parse_paren_expression(tokens: &mut Tokens) -> Result<Node, ParseError> {
    expect_symbol(tokens, Symbol::LeftParen)?;
    let mut args = Vec::new();
    while !tokens.empty() && !is_symbol(tokens.current(), Symbol::RightParen) {
        let arg = if is_symbol(tokens.current(), Symbol::LeftParen) {
            parse_paren_expression(tokens)?
        } else {
            parse_arg_atom(tokens)?
        };
        args.push(arg);
    }
    expect_symbol(tokens, Symbol::RightParen)?;
    Ok(Node::Expression(args))
}

/// An atom inside a parenthesized expression: identifier, literal, or a bare
/// operator occupying the `args[0]` operator slot.
fn parse_arg_atom(tokens: &mut Tokens) -> Result<Node, ParseError> {
    let token = tokens.advance().ok_or(ParseError::UnexpectedEof)?;
    match token.data {
        TokenData::Operator(op) => Ok(Node::Operator(op)),
        TokenData::Identifier(name) => Ok(Node::Identifier(name)),
        TokenData::Literal(value) => Ok(Node::Literal(value)),
        _ => Err(unexpected(&token)),
    }
}

/// A non-parenthesized expression is just an identifier or a literal.
fn parse_atom(tokens: &mut Tokens) -> Result<Node, ParseError> {
    let token = tokens.advance().ok_or(ParseError::UnexpectedEof)?;
    match token.data {
        TokenData::Identifier(name) => Ok(Node::Identifier(name)),
        TokenData::Literal(value) => Ok(Node::Literal(value)),
        TokenData::Operator(op) => Ok(Node::Operator(op)),
        _ => Err(unexpected(&token)),
    }
}

fn is_symbol(token: Option<&super::lang::Token>, symbol: Symbol) -> bool {
    matches!(token.map(|t| &t.data), Some(TokenData::Symbol(s)) if *s == symbol)
}

fn expect_symbol(tokens: &mut Tokens, symbol: Symbol) -> Result<(), ParseError> {
    let token = tokens.current().ok_or(ParseError::UnexpectedEof)?;
    if !is_symbol(Some(token), symbol) {
        return Err(unexpected(token));
    }
    tokens.advance();
    Ok(())
}

fn current_or_eof<'a>(tokens: &'a Tokens) -> Result<&'a super::lang::Token, ParseError> {
    tokens.current().ok_or(ParseError::UnexpectedEof)
}

fn unexpected(token: &super::lang::Token) -> ParseError {
    ParseError::UnexpectedToken { found: token.to_string(), line: token.span.line }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignment_and_print() {
        let program = parse("var x (= x 42) print x").unwrap();
        assert_eq!(program.0.len(), 3);
        assert!(matches!(program.0[0], Node::Var { .. }));
        assert!(matches!(program.0[1], Node::Expression(_)));
        assert!(matches!(program.0[2], Node::Print(_)));
    }

    #[test]
    fn parses_if_else() {
        let program = parse("var x if (== x 5) print 1 else print 0").unwrap();
        match &program.0[1] {
            Node::If { then_block, else_block, .. } => {
                assert_eq!(then_block.0.len(), 1);
                assert!(else_block.is_some());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn parses_braced_while_block() {
        let program = parse("var i while (< i 3) { print i (= i (+ i 1)) }").unwrap();
        match &program.0[1] {
            Node::While { block, .. } => assert_eq!(block.0.len(), 2),
            other => panic!("expected While, got {other:?}"),
        }
    }

    #[test]
    fn rejects_goto_as_a_statement() {
        let err = parse("goto x").unwrap_err();
        assert!(matches!(err, crate::error::DuhError::Parse(_)));
    }
}
