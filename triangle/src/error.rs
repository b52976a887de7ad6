use crate::syntax::token::{SourcePos, Token, TokenKind};
use crate::types::Type;
use std::fmt;
use thiserror::Error;

/// Top-level pipeline error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("semantic analysis failed with {} error(s)", .0.len())]
    Semantic(Vec<SemanticError>),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal parse-time errors; the first one aborts parsing.
#[derive(Debug, Error, Clone)]
pub enum SyntaxError {
    #[error("unexpected {found}")]
    UnexpectedToken { found: Token },

    #[error("unexpected {found}, expected {expected}")]
    ExpectedToken { found: Token, expected: TokenKind },

    #[error("illegal character '{character}' at {pos}")]
    IllegalCharacter { character: char, pos: SourcePos },

    #[error("malformed character literal at {pos}")]
    MalformedCharLiteral { pos: SourcePos },

    #[error("integer literal out of range: {found}")]
    LiteralOutOfRange { found: Token },

    #[error("callable at {pos} must be a simple name")]
    ComplexCallable { pos: SourcePos },
}

/// What a type error expected to find.
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    Type(Type),
    Kind(&'static str),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Type(ty) => write!(f, "{ty}"),
            Expected::Kind(kind) => write!(f, "a {kind}"),
        }
    }
}

/// Errors found during semantic analysis. Collected rather than fatal; a
/// statement boundary is the recovery point.
#[derive(Debug, Error, Clone)]
pub enum SemanticError {
    #[error("{pos}: type mismatch: found {got}, expected {expected}")]
    TypeError {
        pos: SourcePos,
        got: Type,
        expected: Expected,
    },

    #[error("{pos}: expected {expected} argument(s), got {got}")]
    ArityMismatch {
        pos: SourcePos,
        expected: usize,
        got: usize,
    },

    #[error("{pos}: undeclared name `{name}`")]
    UndeclaredUse { pos: SourcePos, name: String },

    #[error("undeclared type `{name}`")]
    UndeclaredType { name: String },

    #[error("duplicate record field `{name}`")]
    DuplicateRecordTypeField { name: String },

    #[error("{pos}: expression produces a function value")]
    FunctionResult { pos: SourcePos },

    #[error("{pos}: literal has no elements to infer a type from")]
    EmptyLiteral { pos: SourcePos },
}

/// Fatal code-generation errors.
#[derive(Debug, Error, Clone)]
pub enum CodegenError {
    #[error("routines nested deeper than {} levels (depth {depth})", tam::MAX_ROUTINE_LEVEL - 1)]
    NestingTooDeep { depth: usize },
}
