//! Exit code management and error-to-message translation for the CLI.
//!
//! Maps the library's [`CompileError`] taxonomy (spec.md §4, §6.3) onto
//! process exit codes and human-readable stderr output with suggestions.

use crate::{CompileError, ConvertError, GenerationError, LexError, ParseError};
use std::fmt;
use std::io::{self, Write};

/// Standard exit codes for the CLI application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode;

impl ExitCode {
    /// Success - operation completed successfully
    pub const SUCCESS: i32 = 0;

    /// General error - unspecified error occurred
    pub const GENERAL_ERROR: i32 = 1;

    /// Invalid arguments - command line arguments are invalid
    pub const INVALID_ARGUMENTS: i32 = 2;

    /// Input/Output error - file or stdin/stdout operations failed
    pub const IO_ERROR: i32 = 3;

    /// Validation error - query chain syntax is invalid (lex/parse stage)
    pub const VALIDATION_ERROR: i32 = 4;

    /// Compile error - chain recognition or SQL generation failed
    pub const COMPILE_ERROR: i32 = 5;

    /// Configuration error - invalid schema/params/dialect settings
    pub const CONFIG_ERROR: i32 = 6;

    /// Permission error - insufficient permissions
    pub const PERMISSION_ERROR: i32 = 7;

    /// System error - system-level operations failed (signals, pipes, etc.)
    pub const SYSTEM_ERROR: i32 = 8;

    /// Internal error - unexpected internal error
    pub const INTERNAL_ERROR: i32 = 11;
}

/// Categories of errors for better organization.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCategory {
    /// User input related errors (query text, schema, params)
    UserInput,
    /// System/IO related errors
    System,
    /// Compile pipeline errors (chain recognition, SQL generation)
    Compile,
    /// Configuration errors
    Configuration,
    /// Internal/unexpected errors
    Internal,
}

/// Comprehensive error information, built up incrementally and printed once.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub category: ErrorCategory,
    pub exit_code: i32,
    pub message: String,
    pub description: Option<String>,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub show_help: bool,
}

impl ErrorInfo {
    pub fn new(category: ErrorCategory, exit_code: i32, message: String) -> Self {
        Self {
            category,
            exit_code,
            message,
            description: None,
            context: None,
            suggestions: Vec::new(),
            show_help: false,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }

    pub fn with_context(mut self, context: String) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_help(mut self, show_help: bool) -> Self {
        self.show_help = show_help;
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Translates compile/IO/configuration errors into [`ErrorInfo`] and prints
/// them to stderr with an appropriate exit code.
#[derive(Debug, Default)]
pub struct ErrorHandler {
    pub verbose: bool,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn with_settings(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Handles a `CompileError` and returns the exit code to use.
    pub fn handle_compile_error(&self, error: &CompileError) -> i32 {
        let error_info = self.convert_compile_error(error);
        self.print_error(&error_info);
        error_info.exit_code
    }

    /// Handles an IO error and returns the exit code to use.
    pub fn handle_io_error(&self, error: &std::io::Error) -> i32 {
        let error_info = self.convert_io_error(error);
        self.print_error(&error_info);
        error_info.exit_code
    }

    /// Handles a general (configuration, CLI-argument) error.
    pub fn handle_general_error(&self, message: &str, category: ErrorCategory) -> i32 {
        let error_info = self.create_general_error(message, category);
        self.print_error(&error_info);
        error_info.exit_code
    }

    /// Dispatches a top-level [`crate::cli::pipeline::CliError`] to the
    /// matching `handle_*` method above and returns the exit code to use.
    pub fn handle_error(&self, error: &crate::cli::pipeline::CliError) -> i32 {
        use crate::cli::pipeline::CliError;
        match error {
            CliError::Compile(e) => self.handle_compile_error(e),
            CliError::Io(msg) => {
                let io_error = std::io::Error::new(std::io::ErrorKind::Other, msg.clone());
                self.handle_io_error(&io_error)
            }
            CliError::Config(msg) => self.handle_general_error(msg, ErrorCategory::Configuration),
            CliError::System(msg) => self.handle_general_error(msg, ErrorCategory::System),
        }
    }

    fn convert_compile_error(&self, error: &CompileError) -> ErrorInfo {
        match error {
            CompileError::SourceUnavailable(msg) => ErrorInfo::new(
                ErrorCategory::UserInput,
                ExitCode::INVALID_ARGUMENTS,
                format!("Input error: {}", msg),
            )
            .with_description("No query chain source text was supplied.".to_string())
            .with_suggestions(vec![
                "Pass a query chain with --query, a file with --file, or pipe it on stdin"
                    .to_string(),
            ]),

            CompileError::LexError(e) => self.convert_lex_error(e),
            CompileError::ParseError(e) => self.convert_parse_error(e),

            CompileError::ConvertError(e) => self.convert_convert_error(e),

            CompileError::GenerationError(e) => self.convert_generation_error(e),
        }
    }

    fn convert_lex_error(&self, error: &LexError) -> ErrorInfo {
        let suggestions = match error {
            LexError::UnterminatedString(_) => vec!["Check that every string literal is closed with a matching quote".to_string()],
            LexError::UnexpectedCharacter(..) => vec!["Remove or escape the offending character".to_string()],
            LexError::InvalidNumber(..) => vec!["Check the numeric literal's format".to_string()],
            LexError::InvalidEscapeSequence(..) => vec!["Only \\n, \\t, \\\\, \\\", \\' and \\uXXXX escapes are supported".to_string()],
            LexError::EmptyInput => vec!["Supply a non-empty query chain expression".to_string()],
        };
        ErrorInfo::new(
            ErrorCategory::UserInput,
            ExitCode::VALIDATION_ERROR,
            format!("Lexical error: {}", error),
        )
        .with_description("The query chain source could not be tokenized.".to_string())
        .with_suggestions(suggestions)
    }

    fn convert_parse_error(&self, error: &ParseError) -> ErrorInfo {
        ErrorInfo::new(
            ErrorCategory::UserInput,
            ExitCode::VALIDATION_ERROR,
            format!("Parse error: {}", error),
        )
        .with_description("The query chain source is not valid JavaScript-subset syntax.".to_string())
        .with_suggestions(vec![
            "Check that the outer form is a two-argument arrow function: (ctx, p) => ...".to_string(),
            "Check that every lambda body is a single expression or a single return statement".to_string(),
        ])
    }

    fn convert_convert_error(&self, error: &ConvertError) -> ErrorInfo {
        let (description, suggestions) = match error {
            ConvertError::UnboundIdentifier(name) => (
                format!("'{}' is not a row, grouping, or parameter binding in this scope.", name),
                vec!["Check the lambda's parameter name matches how it's used in its body".to_string()],
            ),
            ConvertError::MissingWhereGuard { operation, table } => (
                format!(
                    "'{}' on table '{}' has no WHERE clause and no explicit full-table opt-in.",
                    operation, table
                ),
                vec!["Add a .where(...) predicate, or pass allowFullTableUpdate/allowFullTableDelete explicitly".to_string()],
            ),
            ConvertError::UnknownQueryParameter(name) => (
                format!("Query parameter '{}' was referenced but not supplied.", name),
                vec!["Add it to the --params JSON object, or remove the reference".to_string()],
            ),
            ConvertError::WrongArity { operator, .. } => (
                format!("'{}' was called with the wrong number of arguments.", operator),
                vec!["Check the operator's expected argument count".to_string()],
            ),
            ConvertError::UnknownOperator(op) => (
                format!("'{}' is not a recognized query operator.", op),
                vec!["Check the operator name for typos".to_string()],
            ),
            ConvertError::ProjectionTooComplex(detail) => (
                detail.clone(),
                vec!["Simplify the select()/groupBy() projection to plain column references".to_string()],
            ),
            ConvertError::JoinShapeError(detail) => (
                detail.clone(),
                vec!["Check the join's result selector returns an object literal of row/group references".to_string()],
            ),
            ConvertError::UnsupportedConstruct(detail) => (
                detail.clone(),
                vec!["Check the supported subset of operators and expressions".to_string()],
            ),
            ConvertError::ParseError(_) => (
                "The inner lambda body failed to parse.".to_string(),
                vec!["Check the lambda's syntax".to_string()],
            ),
        };

        ErrorInfo::new(
            ErrorCategory::Compile,
            ExitCode::COMPILE_ERROR,
            format!("Query error: {}", error),
        )
        .with_description(description)
        .with_suggestions(suggestions)
    }

    fn convert_generation_error(&self, error: &GenerationError) -> ErrorInfo {
        let suggestions = match error {
            GenerationError::RuntimeUnsupported { dialect, .. } => vec![format!(
                "Use a feature supported by the {} dialect, or switch dialects",
                dialect
            )],
            GenerationError::InvalidAst { .. } => {
                vec!["This indicates an inconsistency in the compiled operation tree".to_string()]
            }
            GenerationError::EmptyQuery => {
                vec!["Check that the chain ends in a SELECT-shaped or write-shaped terminal".to_string()]
            }
        };
        ErrorInfo::new(
            ErrorCategory::Compile,
            ExitCode::COMPILE_ERROR,
            format!("SQL generation error: {}", error),
        )
        .with_suggestions(suggestions)
    }

    fn convert_io_error(&self, error: &std::io::Error) -> ErrorInfo {
        let (message, description, suggestions) = match error.kind() {
            io::ErrorKind::NotFound => (
                "File not found".to_string(),
                Some("The specified file does not exist.".to_string()),
                vec![
                    "Check that the file path is correct".to_string(),
                    "Verify the file exists".to_string(),
                ],
            ),
            io::ErrorKind::PermissionDenied => (
                "Permission denied".to_string(),
                Some("No read/write permission for the file.".to_string()),
                vec!["Check the file's permissions".to_string()],
            ),
            io::ErrorKind::InvalidInput => (
                "Invalid input".to_string(),
                Some("The input data is not valid UTF-8.".to_string()),
                vec!["Check the input encoding".to_string()],
            ),
            _ => (
                format!("I/O error: {}", error),
                None,
                vec!["Check the system status".to_string()],
            ),
        };

        let exit_code = match error.kind() {
            io::ErrorKind::PermissionDenied => ExitCode::PERMISSION_ERROR,
            _ => ExitCode::IO_ERROR,
        };

        ErrorInfo::new(ErrorCategory::System, exit_code, message)
            .with_description(description.unwrap_or_default())
            .with_suggestions(suggestions)
    }

    fn create_general_error(&self, message: &str, category: ErrorCategory) -> ErrorInfo {
        let exit_code = match category {
            ErrorCategory::UserInput => ExitCode::INVALID_ARGUMENTS,
            ErrorCategory::System => ExitCode::IO_ERROR,
            ErrorCategory::Compile => ExitCode::COMPILE_ERROR,
            ErrorCategory::Configuration => ExitCode::CONFIG_ERROR,
            ErrorCategory::Internal => ExitCode::INTERNAL_ERROR,
        };
        ErrorInfo::new(category, exit_code, message.to_string())
    }

    /// Prints error information to stderr.
    pub fn print_error(&self, error_info: &ErrorInfo) {
        let mut stderr = io::stderr();

        let _ = writeln!(stderr, "Error: {}", error_info.message);

        if let Some(description) = &error_info.description {
            let _ = writeln!(stderr, "{}", description);
        }

        if let Some(context) = &error_info.context {
            let _ = writeln!(stderr, "Context: {}", context);
        }

        if !error_info.suggestions.is_empty() {
            let _ = writeln!(stderr);
            let _ = writeln!(stderr, "Suggestions:");
            for suggestion in &error_info.suggestions {
                let _ = writeln!(stderr, "  - {}", suggestion);
            }
        }

        if error_info.show_help {
            let _ = writeln!(stderr);
            let _ = writeln!(stderr, "For help, run:");
            let _ = writeln!(stderr, "  tinqer --help");
        }

        let _ = stderr.flush();
    }

    pub fn print_success(&self, message: &str) {
        println!("Success: {}", message);
    }

    pub fn print_warning(&self, message: &str) {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "Warning: {}", message);
        let _ = stderr.flush();
    }

    pub fn print_info(&self, message: &str) {
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "Info: {}", message);
        let _ = stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            ExitCode::SUCCESS,
            ExitCode::GENERAL_ERROR,
            ExitCode::INVALID_ARGUMENTS,
            ExitCode::IO_ERROR,
            ExitCode::VALIDATION_ERROR,
            ExitCode::COMPILE_ERROR,
            ExitCode::CONFIG_ERROR,
            ExitCode::PERMISSION_ERROR,
            ExitCode::SYSTEM_ERROR,
            ExitCode::INTERNAL_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn lex_error_maps_to_validation_exit_code() {
        let handler = ErrorHandler::new();
        let err = CompileError::LexError(LexError::EmptyInput);
        let info = handler.convert_compile_error(&err);
        assert_eq!(info.exit_code, ExitCode::VALIDATION_ERROR);
        assert_eq!(info.category, ErrorCategory::UserInput);
    }

    #[test]
    fn missing_where_guard_maps_to_compile_exit_code() {
        let handler = ErrorHandler::new();
        let err = CompileError::ConvertError(ConvertError::MissingWhereGuard {
            operation: "update".to_string(),
            table: "users".to_string(),
        });
        let info = handler.convert_compile_error(&err);
        assert_eq!(info.exit_code, ExitCode::COMPILE_ERROR);
        assert!(info.description.unwrap().contains("users"));
    }

    #[test]
    fn io_not_found_maps_to_io_exit_code() {
        let handler = ErrorHandler::new();
        let io_error = std::io::Error::new(io::ErrorKind::NotFound, "missing");
        let info = handler.convert_io_error(&io_error);
        assert_eq!(info.exit_code, ExitCode::IO_ERROR);
        assert_eq!(info.category, ErrorCategory::System);
    }

    #[test]
    fn permission_denied_maps_to_permission_exit_code() {
        let handler = ErrorHandler::new();
        let io_error = std::io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let info = handler.convert_io_error(&io_error);
        assert_eq!(info.exit_code, ExitCode::PERMISSION_ERROR);
    }

    #[test]
    fn general_error_respects_category() {
        let handler = ErrorHandler::new();
        assert_eq!(
            handler
                .create_general_error("bad flag", ErrorCategory::UserInput)
                .exit_code,
            ExitCode::INVALID_ARGUMENTS
        );
        assert_eq!(
            handler
                .create_general_error("bad schema", ErrorCategory::Configuration)
                .exit_code,
            ExitCode::CONFIG_ERROR
        );
    }
}
