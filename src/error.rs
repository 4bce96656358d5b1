//! Crate-wide error taxonomy.
//!
//! Every stage of the pipeline is fatal on error: lexing, parsing, and
//! compiling each get their own flat `thiserror` enum, and [`DuhError`]
//! aggregates them for the CLI's `main`. Runtime halts inside the target
//! machine (invalid memory access, `STOP`) are not modeled as errors here —
//! they are program behavior, not pipeline failure (see `back::machine`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexError {
    #[error("unexpected character {0:?} at line {1}, column {2}")]
    UnexpectedChar(char, usize, usize),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected token {found:?} at line {line}")]
    UnexpectedToken { found: String, line: usize },
    #[error("unexpected end of file")]
    UnexpectedEof,
}

#[derive(Debug, Error)]
pub enum CompileError {
    /// Kept for documentation purposes: `middle::compile::compile_node`'s
    /// match is exhaustive over `front::ast::Node`, so this variant is
    /// unreachable in practice. See `spec.md` DESIGN NOTES on replacing
    /// dispatch tables with exhaustive matching.
    #[error("{0} is not supported by the compiler")]
    UnsupportedNode(String),
}

#[derive(Debug, Error)]
pub enum RuntimeSetupError {
    #[error("malformed input line: {0:?}")]
    MalformedInput(String),
}

#[derive(Debug, Error)]
pub enum DuhError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    RuntimeSetup(#[from] RuntimeSetupError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
