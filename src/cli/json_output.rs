//! JSON output formatting: wraps a [`CompiledQuery`] (or a validation
//! summary, or a compile error) with processing metadata for `--json` mode.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cli::validator::{ValidationErrorInfo, ValidationSummary};
use crate::{CompileError, CompiledQuery};

pub type JsonResult<T> = Result<T, JsonError>;

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Metadata attached to every JSON response: dialect, timing, input shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileMetadata {
    pub timestamp: u64,
    pub dialect: String,
    pub stats: ProcessingStats,
    pub input_info: InputInfo,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_time_us: u64,
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Source type (file, stdin, text).
    pub source_type: String,
    /// Source identifier (filename, "stdin", "text").
    pub source_id: String,
    pub size_bytes: usize,
    pub line_count: usize,
}

impl InputInfo {
    pub fn from_file(filename: &str, content: &str) -> Self {
        Self {
            source_type: "file".to_string(),
            source_id: filename.to_string(),
            size_bytes: content.len(),
            line_count: content.lines().count(),
        }
    }

    pub fn from_stdin(content: &str) -> Self {
        Self {
            source_type: "stdin".to_string(),
            source_id: "stdin".to_string(),
            size_bytes: content.len(),
            line_count: content.lines().count(),
        }
    }

    pub fn from_text(content: &str) -> Self {
        Self {
            source_type: "text".to_string(),
            source_id: "command_line".to_string(),
            size_bytes: content.len(),
            line_count: content.lines().count(),
        }
    }
}

impl CompileMetadata {
    pub fn success(dialect: &str, elapsed: std::time::Duration, input: &str, sql: &str) -> Self {
        Self {
            timestamp: now_unix(),
            dialect: dialect.to_string(),
            stats: ProcessingStats {
                total_time_us: elapsed.as_micros() as u64,
                input_size_bytes: input.len(),
                output_size_bytes: sql.len(),
            },
            input_info: InputInfo::from_text(input),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn failure(dialect: &str, elapsed: std::time::Duration, input: &str) -> Self {
        Self {
            timestamp: now_unix(),
            dialect: dialect.to_string(),
            stats: ProcessingStats {
                total_time_us: elapsed.as_micros() as u64,
                input_size_bytes: input.len(),
                output_size_bytes: 0,
            },
            input_info: InputInfo::from_text(input),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_input_info(mut self, input_info: InputInfo) -> Self {
        self.input_info = input_info;
        self
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The top-level JSON document produced for a compile request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonOutput {
    pub success: bool,
    pub sql: Option<String>,
    pub params: Option<serde_json::Value>,
    pub error: Option<CompileErrorInfo>,
    pub metadata: CompileMetadata,
}

/// Error information for a failed compile, serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileErrorInfo {
    /// Error type (input, lex, parse, convert, generation).
    pub error_type: String,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl CompileErrorInfo {
    pub fn from_compile_error(error: &CompileError) -> Self {
        let (error_type, suggestions) = match error {
            CompileError::SourceUnavailable(_) => (
                "input",
                vec!["Pass a query chain with --query, --file, or stdin".to_string()],
            ),
            CompileError::LexError(_) => (
                "lex",
                vec!["Check string quotes and escape sequences".to_string()],
            ),
            CompileError::ParseError(_) => (
                "parse",
                vec!["Check the arrow-function chain's syntax".to_string()],
            ),
            CompileError::ConvertError(_) => (
                "convert",
                vec!["Check operator names, arity, and lambda scope".to_string()],
            ),
            CompileError::GenerationError(_) => (
                "generation",
                vec!["Check the target dialect supports every feature used".to_string()],
            ),
        };
        Self {
            error_type: error_type.to_string(),
            message: error.to_string(),
            suggestions,
        }
    }
}

/// Formats compile and validation results as JSON.
#[derive(Debug, Default)]
pub struct JsonOutputFormatter {
    pub pretty_print: bool,
}

impl JsonOutputFormatter {
    pub fn new() -> Self {
        Self { pretty_print: false }
    }

    pub fn pretty() -> Self {
        Self { pretty_print: true }
    }

    fn render(&self, value: &impl Serialize) -> JsonResult<String> {
        if self.pretty_print {
            Ok(serde_json::to_string_pretty(value)?)
        } else {
            Ok(serde_json::to_string(value)?)
        }
    }

    /// Formats a successful compile as JSON.
    pub fn format_success(&self, compiled: &CompiledQuery, metadata: CompileMetadata) -> JsonResult<String> {
        let params = serde_json::to_value(&compiled.params)?;
        let output = JsonOutput {
            success: true,
            sql: Some(compiled.sql.clone()),
            params: Some(params),
            error: None,
            metadata,
        };
        self.render(&output)
    }

    /// Formats a failed compile as JSON.
    pub fn format_error(&self, error: &CompileError, metadata: CompileMetadata) -> JsonResult<String> {
        let output = JsonOutput {
            success: false,
            sql: None,
            params: None,
            error: Some(CompileErrorInfo::from_compile_error(error)),
            metadata,
        };
        self.render(&output)
    }

    /// Formats a successful validation result as JSON.
    pub fn format_validation_success(&self, summary: &ValidationSummary) -> String {
        let output = serde_json::json!({
            "success": true,
            "validation": {
                "valid": true,
                "summary": {
                    "operation_count": summary.operation_count,
                    "operations": summary.operations,
                    "column_count": summary.column_count,
                    "columns": summary.columns,
                    "has_aggregation": summary.has_aggregation,
                    "has_grouping": summary.has_grouping,
                    "has_joins": summary.has_joins,
                    "complexity_score": summary.complexity_score,
                }
            }
        });
        self.render(&output).unwrap_or_else(|_| "{}".to_string())
    }

    /// Formats a failed validation result as JSON.
    pub fn format_validation_error(
        &self,
        error: &ValidationErrorInfo,
        suggestions: &[String],
    ) -> String {
        let output = serde_json::json!({
            "success": false,
            "validation": {
                "valid": false,
                "error": {
                    "type": error.error_type,
                    "message": error.message,
                    "position": error.position,
                    "context": error.context,
                },
                "suggestions": suggestions,
            }
        });
        self.render(&output).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LexError;
    use std::collections::HashMap;

    #[test]
    fn formats_successful_compile() {
        let formatter = JsonOutputFormatter::new();
        let compiled = CompiledQuery {
            sql: "SELECT * FROM \"users\"".to_string(),
            params: HashMap::new(),
            field_contexts: HashMap::new(),
        };
        let metadata = CompileMetadata::success("postgresql", std::time::Duration::from_micros(10), "src", &compiled.sql);

        let json = formatter.format_success(&compiled, metadata).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("SELECT * FROM"));
    }

    #[test]
    fn formats_compile_error() {
        let formatter = JsonOutputFormatter::new();
        let error = CompileError::LexError(LexError::EmptyInput);
        let metadata = CompileMetadata::failure("postgresql", std::time::Duration::from_micros(5), "");

        let json = formatter.format_error(&error, metadata).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error_type\":\"lex\""));
    }

    #[test]
    fn pretty_print_adds_whitespace() {
        let formatter = JsonOutputFormatter::pretty();
        let compiled = CompiledQuery {
            sql: "SELECT 1".to_string(),
            params: HashMap::new(),
            field_contexts: HashMap::new(),
        };
        let metadata = CompileMetadata::success("sqlite", std::time::Duration::from_micros(1), "x", "SELECT 1");
        let json = formatter.format_success(&compiled, metadata).unwrap();
        assert!(json.contains('\n'));
    }
}
