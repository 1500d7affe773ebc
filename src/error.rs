//! Error type definitions
//!
//! Defines all error types used in tinqer, mirroring the pipeline stages of
//! the compiler: lexing, parsing, chain recognition / lambda conversion, and
//! SQL generation.

use thiserror::Error;

/// Errors that occur during lexing (tokenization) of a query chain source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("Unexpected character: '{0}' (position: {1})")]
    UnexpectedCharacter(char, usize),

    #[error("Unterminated string literal (start position: {0})")]
    UnterminatedString(usize),

    #[error("Invalid number format: '{0}' (position: {1})")]
    InvalidNumber(String, usize),

    #[error("Unsupported escape sequence: '\\{0}' (position: {1})")]
    InvalidEscapeSequence(char, usize),

    #[error("Input is empty")]
    EmptyInput,
}

/// Errors that occur while parsing the arrow-chain source into a JS-subset AST.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected '{expected}' but found '{found}' (position: {position})")]
    UnexpectedToken {
        expected: String,
        found: String,
        position: usize,
    },

    #[error("Unexpected end of input (position: {0})")]
    UnexpectedEof(usize),

    #[error(
        "Arrow function body must be a single expression or a block containing exactly one return statement (position: {0})"
    )]
    InvalidArrowBody(usize),

    #[error("Unsupported syntax node: '{0}' (position: {1})")]
    UnsupportedSyntax(String, usize),

    #[error("Lexing error: {0}")]
    LexError(#[from] LexError),
}

/// Errors surfaced by the Chain Recognizer and Lambda Converter (spec.md §4.3/§4.4).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConvertError {
    #[error("Unknown query operator: '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{operator}' expected {expected} argument(s) but received {received}")]
    WrongArity {
        operator: String,
        expected: String,
        received: usize,
    },

    #[error("Unbound identifier '{0}': not a row, grouping, or parameter binding in this scope")]
    UnboundIdentifier(String),

    #[error("Projection is too complex for this adapter: {0}")]
    ProjectionTooComplex(String),

    #[error("Join result-selector error: {0}")]
    JoinShapeError(String),

    #[error(
        "'{operation}' on table '{table}' has no WHERE clause and no explicit full-table opt-in"
    )]
    MissingWhereGuard { operation: String, table: String },

    #[error("Unsupported construct: {0}")]
    UnsupportedConstruct(String),

    #[error("Query parameter '{0}' is not present in the supplied params object")]
    UnknownQueryParameter(String),

    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

/// Errors that occur during SQL generation (spec.md §4.6/§6.3).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Dialect '{dialect}' does not support '{feature}'")]
    RuntimeUnsupported { feature: String, dialect: String },

    #[error("Invalid operation tree: {reason}")]
    InvalidAst { reason: String },

    #[error("Empty query: no SQL to generate")]
    EmptyQuery,
}

/// Unified error returned by `compile_query`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("{0}")]
    SourceUnavailable(String),

    #[error("Lexing error: {0}")]
    LexError(#[from] LexError),

    #[error("Parsing error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Query conversion error: {0}")]
    ConvertError(#[from] ConvertError),

    #[error("SQL generation error: {0}")]
    GenerationError(#[from] GenerationError),
}

/// Errors surfaced at the (out-of-scope, interface-only) execution-shell seam,
/// per spec.md §6.4 and §7. The compiler core never produces these; they exist
/// so the `QueryExecutor` trait in `sql::dialect` has a concrete return type
/// describing the contract its real implementors must honor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Expected at least one row but the query returned none")]
    NoElement,

    #[error("Expected exactly one row but the query returned more than one")]
    MultipleElements,

    #[error("Compile error: {0}")]
    CompileError(#[from] CompileError),
}

/// Result type aliases
pub type LexResult<T> = Result<T, LexError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type ConvertResult<T> = Result<T, ConvertError>;
pub type GenerationResult<T> = Result<T, GenerationError>;
pub type CompileResult<T> = Result<T, CompileError>;
pub type ExecutionResult<T> = Result<T, ExecutionError>;
