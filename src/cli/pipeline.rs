//! Processing pipeline for unified CLI operations: file, text, and stdin
//! input modes, wired to `compile_query` (or, in `--validate-only` mode, to
//! the structural [`ChainValidator`]) and to the output/JSON formatters.

use std::collections::HashMap;
use std::io::{self, Write};
use std::str::FromStr;

use clap::{value_parser, Arg, ArgMatches, Command};
use serde::Deserialize;

use crate::cli::{
    debug_logger::DebugLogger,
    error_handler::{ErrorHandler, ExitCode},
    json_output::{CompileErrorInfo, CompileMetadata, InputInfo, JsonOutputFormatter},
    output_formatter::{OutputFormat, OutputFormatter},
    signal_handler::{utils, ProcessingError, SignalAwareProcessor, SignalHandler},
    stdin_reader::StdinReader,
    validator::{ChainValidator, ValidateResult},
};
use crate::context::{ParamValue, QueryContext, QueryParams};
use crate::error::CompileError;
use crate::sql::{PostgreSqlDialect, SqlDialect, SqliteDialect};

/// Errors surfaced at the CLI layer: a compile error from the library, or a
/// CLI-local IO/configuration/system failure.
#[derive(Debug)]
pub enum CliError {
    Compile(CompileError),
    Io(String),
    Config(String),
    System(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Compile(e) => write!(f, "{}", e),
            CliError::Io(msg) => write!(f, "{}", msg),
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::System(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<CompileError> for CliError {
    fn from(error: CompileError) -> Self {
        CliError::Compile(error)
    }
}

/// CLI arguments structure.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub input_file: Option<String>,
    pub output_file: Option<String>,
    pub dialect: DialectType,
    pub pretty_print: bool,
    pub input_text: Option<String>,
    pub schema_file: Option<String>,
    pub params_json: Option<String>,
    pub validate_only: bool,
    pub verbose: bool,
    pub debug: bool,
    pub compact: bool,
    pub json_output: bool,
}

/// Supported SQL dialect types (spec.md §6.3 defines exactly these two).
#[derive(Debug, Clone, PartialEq)]
pub enum DialectType {
    PostgreSql,
    Sqlite,
}

impl std::fmt::Display for DialectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialectType::PostgreSql => write!(f, "postgresql"),
            DialectType::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for DialectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(DialectType::PostgreSql),
            "sqlite" | "sqlite3" => Ok(DialectType::Sqlite),
            _ => Err(format!("Unsupported SQL dialect: {s}")),
        }
    }
}

fn create_dialect(dialect_type: &DialectType) -> Box<dyn SqlDialect> {
    match dialect_type {
        DialectType::PostgreSql => Box::new(PostgreSqlDialect),
        DialectType::Sqlite => Box::new(SqliteDialect),
    }
}

/// Parses CLI arguments.
pub fn parse_args() -> CliArgs {
    let matches = Command::new("tinqer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles a LINQ-style arrow-function query chain into parameterized SQL")
        .long_about(
            "tinqer compiles a textual query-chain expression — from/where/select/join/\n\
             groupBy/orderBy, pagination, terminal aggregates, and insert/update/deleteFrom —\n\
             into parameterized SQL for PostgreSQL or SQLite.\n\n\
             Examples:\n  \
             tinqer -q \"(ctx, p) => ctx.from(\\\"users\\\").where(u => u.age > p.minAge)\" --schema schema.json --params '{\"minAge\":18}'\n  \
             tinqer -f query.chain -d sqlite -p\n  \
             echo \"(ctx, p) => ctx.from(\\\"users\\\")\" | tinqer --validate-only",
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Read the query chain source from the given file")
                .conflicts_with("text"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write the generated SQL to the given file (stdout if not specified)"),
        )
        .arg(
            Arg::new("dialect")
                .short('d')
                .long("dialect")
                .value_name("DIALECT")
                .help("Target SQL dialect [possible values: postgresql, sqlite]")
                .value_parser(value_parser!(DialectType))
                .default_value("postgresql"),
        )
        .arg(
            Arg::new("schema")
                .long("schema")
                .value_name("FILE")
                .help("JSON file describing the QueryContext: {\"table\": [\"col\", ...]}"),
        )
        .arg(
            Arg::new("params")
                .long("params")
                .value_name("JSON")
                .help("Inline JSON object supplying the query parameters referenced as p.foo"),
        )
        .arg(
            Arg::new("pretty")
                .short('p')
                .long("pretty")
                .help("Pretty-format SQL output with indentation")
                .conflicts_with("compact")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("text")
                .short('q')
                .long("query")
                .value_name("CHAIN")
                .help("Direct query chain source as a command-line argument")
                .conflicts_with("file"),
        )
        .arg(
            Arg::new("validate-only")
                .long("validate-only")
                .help("Only validate the query chain without generating SQL")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output with detailed processing information")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug mode with operation-tree output")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("compact")
                .short('c')
                .long("compact")
                .help("Generate compact SQL output with minimal whitespace")
                .conflicts_with("pretty")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .help("Output results in JSON format with metadata")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    parse_matches(&matches)
}

fn parse_matches(matches: &ArgMatches) -> CliArgs {
    CliArgs {
        input_file: matches.get_one::<String>("file").cloned(),
        output_file: matches.get_one::<String>("output").cloned(),
        dialect: matches
            .get_one::<DialectType>("dialect")
            .cloned()
            .unwrap_or(DialectType::PostgreSql),
        pretty_print: matches.get_flag("pretty"),
        input_text: matches.get_one::<String>("text").cloned(),
        schema_file: matches.get_one::<String>("schema").cloned(),
        params_json: matches.get_one::<String>("params").cloned(),
        validate_only: matches.get_flag("validate-only"),
        verbose: matches.get_flag("verbose"),
        debug: matches.get_flag("debug"),
        compact: matches.get_flag("compact"),
        json_output: matches.get_flag("json"),
    }
}

/// CLI operation modes.
#[derive(Debug, Clone, PartialEq)]
pub enum CliMode {
    FileMode {
        input_file: String,
        output_file: Option<String>,
    },
    TextMode {
        input_text: String,
        output_file: Option<String>,
    },
    StdinMode {
        validate_only: bool,
        streaming: bool,
    },
}

/// CLI configuration derived from command-line arguments.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub mode: CliMode,
    pub dialect: DialectType,
    pub output_format: OutputFormat,
    pub validation_only: bool,
    pub verbose: bool,
    pub debug: bool,
    pub schema_file: Option<String>,
    pub params_json: Option<String>,
}

impl CliConfig {
    pub fn from_args(args: &CliArgs) -> Self {
        let mode = Self::determine_mode(args);
        let output_format = Self::determine_output_format(args);

        Self {
            mode,
            dialect: args.dialect.clone(),
            output_format,
            validation_only: args.validate_only,
            verbose: args.verbose,
            debug: args.debug,
            schema_file: args.schema_file.clone(),
            params_json: args.params_json.clone(),
        }
    }

    fn determine_mode(args: &CliArgs) -> CliMode {
        if let Some(ref input_text) = args.input_text {
            CliMode::TextMode {
                input_text: input_text.clone(),
                output_file: args.output_file.clone(),
            }
        } else if let Some(ref input_file) = args.input_file {
            CliMode::FileMode {
                input_file: input_file.clone(),
                output_file: args.output_file.clone(),
            }
        } else {
            CliMode::StdinMode {
                validate_only: args.validate_only,
                streaming: false,
            }
        }
    }

    fn determine_output_format(args: &CliArgs) -> OutputFormat {
        if args.json_output {
            OutputFormat::Json
        } else if args.compact {
            OutputFormat::Compact
        } else if args.pretty_print {
            OutputFormat::Pretty
        } else {
            OutputFormat::Default
        }
    }
}

#[derive(Deserialize)]
#[serde(transparent)]
struct SchemaFile {
    tables: HashMap<String, Vec<String>>,
}

fn load_query_context(schema_file: Option<&str>) -> Result<QueryContext, CliError> {
    let Some(path) = schema_file else {
        return Ok(QueryContext::new());
    };
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CliError::Io(format!("Failed to read schema file '{path}': {e}")))?;
    let schema: SchemaFile = serde_json::from_str(&contents)
        .map_err(|e| CliError::Config(format!("Invalid schema file '{path}': {e}")))?;

    let mut ctx = QueryContext::new();
    for (table, columns) in schema.tables {
        ctx = ctx.with_table(table, columns);
    }
    Ok(ctx)
}

fn load_query_params(params_json: Option<&str>) -> Result<QueryParams, CliError> {
    let Some(json) = params_json else {
        return Ok(QueryParams::new());
    };
    let params: HashMap<String, ParamValue> = serde_json::from_str(json)
        .map_err(|e| CliError::Config(format!("Invalid --params JSON: {e}")))?;
    Ok(params)
}

/// Processing pipeline that handles all CLI operations.
pub struct ProcessingPipeline {
    config: CliConfig,
    dialect: Box<dyn SqlDialect>,
    context: QueryContext,
    params: QueryParams,
    validator: Option<ChainValidator>,
    output_formatter: OutputFormatter,
    json_formatter: JsonOutputFormatter,
    error_handler: ErrorHandler,
    debug_logger: DebugLogger,
    signal_handler: Option<SignalHandler>,
    signal_processor: Option<SignalAwareProcessor>,
}

impl ProcessingPipeline {
    pub fn new(config: CliConfig) -> Result<Self, CliError> {
        let dialect = create_dialect(&config.dialect);
        let context = load_query_context(config.schema_file.as_deref())?;
        let params = load_query_params(config.params_json.as_deref())?;

        let validator = if config.validation_only {
            Some(ChainValidator::new())
        } else {
            None
        };

        let output_formatter = OutputFormatter::with_format(config.output_format.clone());
        let json_formatter = JsonOutputFormatter::new();
        let error_handler = ErrorHandler::with_settings(config.verbose);
        let debug_logger = DebugLogger::with_settings(config.verbose, config.debug);

        let (signal_handler, signal_processor) = if utils::is_unix_like()
            && matches!(config.mode, CliMode::StdinMode { .. })
        {
            let handler = SignalHandler::new()
                .map_err(|e| CliError::System(format!("Failed to initialize signal handler: {e}")))?;
            let processor = SignalAwareProcessor::new().map_err(|e| {
                CliError::System(format!("Failed to initialize signal processor: {e}"))
            })?;

            if let Err(e) = utils::ignore_sigpipe() {
                eprintln!("Warning: Failed to ignore SIGPIPE: {e}");
            }

            (Some(handler), Some(processor))
        } else {
            (None, None)
        };

        Ok(Self {
            config,
            dialect,
            context,
            params,
            validator,
            output_formatter,
            json_formatter,
            error_handler,
            debug_logger,
            signal_handler,
            signal_processor,
        })
    }

    /// Process input according to the configured mode.
    pub fn process(&mut self) -> Result<String, CliError> {
        self.debug_logger.verbose("Starting processing pipeline");
        self.debug_logger.reset_step_timer();

        let input = self.read_input()?;
        self.debug_logger.timing("Input reading");

        let result = if self.config.validation_only {
            self.debug_logger.verbose("Validation mode enabled");
            self.validate_input(&input)
        } else {
            self.debug_logger.verbose("Compilation mode enabled");
            self.compile_input(&input)
        };

        self.debug_logger.total_time();
        result
    }

    fn read_input(&self) -> Result<String, CliError> {
        match &self.config.mode {
            CliMode::StdinMode { .. } => {
                self.debug_logger.verbose("Reading from stdin...");
                if utils::is_in_pipeline() {
                    self.debug_logger.debug("Pipeline environment detected");
                }

                let reader = if utils::is_unix_like() {
                    self.debug_logger.debug("Using signal-aware stdin reader");
                    StdinReader::with_signal_handling().map_err(|e| {
                        CliError::System(format!("Failed to create signal-aware stdin reader: {e}"))
                    })?
                } else {
                    StdinReader::new()
                };

                let result = if let Some(ref signal_processor) = self.signal_processor {
                    self.read_stdin_with_signals(&reader, signal_processor)?
                } else {
                    reader
                        .read_all()
                        .map_err(|e| CliError::Io(format!("Failed to read from stdin: {e}")))?
                };

                self.debug_logger
                    .debug(&format!("Read {} bytes from stdin", result.len()));
                Ok(result)
            }
            CliMode::TextMode { input_text, .. } => {
                self.debug_logger.verbose("Processing direct text input...");
                Ok(input_text.clone())
            }
            CliMode::FileMode { input_file, .. } => {
                self.debug_logger
                    .verbose(&format!("Reading from file: {input_file}"));
                let result = std::fs::read_to_string(input_file)
                    .map_err(|e| CliError::Io(format!("Failed to read file '{input_file}': {e}")))?;
                self.debug_logger
                    .debug(&format!("Read {} bytes from file", result.len()));
                Ok(result)
            }
        }
    }

    fn validate_input(&self, input: &str) -> Result<String, CliError> {
        let Some(ref validator) = self.validator else {
            return Err(CliError::Config(
                "Validator not configured for validation mode".to_string(),
            ));
        };

        self.debug_logger.verbose("Validating query chain...");
        let result = validator
            .validate(input, &self.context, &self.params)
            .map_err(|e| CliError::Config(e.to_string()))?;

        match result {
            ValidateResult::Valid { summary } => {
                self.debug_logger
                    .debug(&format!("Validation successful: {summary:?}"));
                match self.config.output_format {
                    OutputFormat::Json => Ok(self.json_formatter.format_validation_success(&summary)),
                    _ => Ok("Valid query chain".to_string()),
                }
            }
            ValidateResult::Invalid { error, suggestions } => {
                self.debug_logger
                    .debug(&format!("Validation failed: {error:?}"));

                match self.config.output_format {
                    OutputFormat::Json => {
                        Ok(self.json_formatter.format_validation_error(&error, &suggestions))
                    }
                    _ => {
                        let mut error_msg = format!("Validation failed: {}", error.message);
                        if !suggestions.is_empty() {
                            error_msg.push_str("\nSuggestions:");
                            for suggestion in suggestions {
                                error_msg.push_str(&format!("\n  - {suggestion}"));
                            }
                        }
                        Err(CliError::Config(error_msg))
                    }
                }
            }
        }
    }

    fn compile_input(&mut self, input: &str) -> Result<String, CliError> {
        self.debug_logger.verbose(&format!(
            "Compiling query chain (dialect: {})...",
            self.config.dialect
        ));

        let compiled =
            crate::compile_query(input, &self.context, &self.params, self.dialect.as_ref())?;
        self.debug_logger.timing("Compilation");
        self.debug_logger.debug(&format!("Generated SQL: {}", compiled.sql));
        self.debug_logger.verbose("Compilation completed successfully");

        match self.config.output_format {
            OutputFormat::Json => {
                let metadata = CompileMetadata::success(
                    &self.config.dialect.to_string(),
                    self.debug_logger.elapsed(),
                    input,
                    &compiled.sql,
                );
                Ok(self
                    .json_formatter
                    .format_success(&compiled, metadata)
                    .map_err(|e| CliError::Config(e.to_string()))?)
            }
            _ => Ok(self
                .output_formatter
                .format(&compiled.sql)
                .map_err(|e| CliError::Config(e.to_string()))?),
        }
    }

    pub fn write_output(&self, output: &str) -> Result<(), CliError> {
        match &self.config.mode {
            CliMode::FileMode {
                output_file: Some(file),
                ..
            }
            | CliMode::TextMode {
                output_file: Some(file),
                ..
            } => {
                if self.config.verbose {
                    eprintln!("Writing output to file: {file}");
                }
                std::fs::write(file, output)
                    .map_err(|e| CliError::Io(format!("Failed to write to file '{file}': {e}")))
            }
            _ => {
                print!("{output}");
                io::stdout()
                    .flush()
                    .map_err(|e| CliError::Io(format!("Failed to flush stdout: {e}")))
            }
        }
    }

    /// Handle an error using the configured error handler, returning the exit code.
    pub fn handle_error(&self, error: &CliError) -> i32 {
        if matches!(self.config.output_format, OutputFormat::Json) {
            if let CliError::Compile(compile_error) = error {
                let error_info = CompileErrorInfo::from_compile_error(compile_error);
                let metadata = CompileMetadata::failure(
                    &self.config.dialect.to_string(),
                    std::time::Duration::from_millis(0),
                    "",
                );
                if let Ok(json) = self.json_formatter.format_error(compile_error, metadata) {
                    println!("{json}");
                    let _ = error_info;
                    return match compile_error {
                        CompileError::LexError(_) | CompileError::ParseError(_) => {
                            ExitCode::VALIDATION_ERROR
                        }
                        CompileError::ConvertError(_) | CompileError::GenerationError(_) => {
                            ExitCode::COMPILE_ERROR
                        }
                        CompileError::SourceUnavailable(_) => ExitCode::INVALID_ARGUMENTS,
                    };
                }
            }
        }

        self.error_handler.handle_error(error)
    }

    fn read_stdin_with_signals(
        &self,
        reader: &StdinReader,
        signal_processor: &SignalAwareProcessor,
    ) -> Result<String, CliError> {
        self.debug_logger.debug("Reading stdin with signal handling");

        signal_processor
            .execute_with_signal_check(|should_continue| {
                if !should_continue() {
                    if let Some(ref handler) = self.signal_handler {
                        if handler.pipe_closed() {
                            return Err(ProcessingError::PipeClosed);
                        } else {
                            return Err(ProcessingError::Interrupted);
                        }
                    }
                }

                reader
                    .read_all()
                    .map_err(|e| ProcessingError::ProcessingError(format!("Failed to read from stdin: {e}")))
            })
            .map_err(|e| match e {
                ProcessingError::Interrupted => {
                    CliError::System("Reading interrupted by signal".to_string())
                }
                ProcessingError::PipeClosed => CliError::System("Output pipe was closed".to_string()),
                ProcessingError::ProcessingError(msg) => CliError::Io(msg),
                ProcessingError::SignalError(sig_err) => {
                    CliError::System(format!("Signal error: {sig_err}"))
                }
            })
    }

    pub fn should_continue(&self) -> bool {
        if let Some(ref handler) = self.signal_handler {
            !handler.should_shutdown()
        } else {
            true
        }
    }

    pub fn pipe_closed(&self) -> bool {
        if let Some(ref handler) = self.signal_handler {
            handler.pipe_closed()
        } else {
            false
        }
    }

    pub fn config(&self) -> &CliConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_args() -> CliArgs {
        CliArgs {
            input_file: None,
            output_file: None,
            dialect: DialectType::PostgreSql,
            pretty_print: false,
            input_text: None,
            schema_file: None,
            params_json: None,
            validate_only: false,
            verbose: false,
            debug: false,
            compact: false,
            json_output: false,
        }
    }

    #[test]
    fn cli_config_from_args_stdin_mode() {
        let args = create_test_args();
        let config = CliConfig::from_args(&args);

        assert!(matches!(config.mode, CliMode::StdinMode { .. }));
        assert_eq!(config.dialect, DialectType::PostgreSql);
        assert!(matches!(config.output_format, OutputFormat::Default));
        assert!(!config.validation_only);
    }

    #[test]
    fn cli_config_from_args_text_mode() {
        let mut args = create_test_args();
        args.input_text = Some("(ctx, p) => ctx.from(\"users\")".to_string());
        args.json_output = true;

        let config = CliConfig::from_args(&args);

        if let CliMode::TextMode { input_text, output_file } = config.mode {
            assert_eq!(input_text, "(ctx, p) => ctx.from(\"users\")");
            assert_eq!(output_file, None);
        } else {
            panic!("Expected TextMode");
        }

        assert!(matches!(config.output_format, OutputFormat::Json));
    }

    #[test]
    fn cli_config_from_args_file_mode() {
        let mut args = create_test_args();
        args.input_file = Some("query.chain".to_string());
        args.output_file = Some("out.sql".to_string());
        args.pretty_print = true;

        let config = CliConfig::from_args(&args);

        if let CliMode::FileMode { input_file, output_file } = config.mode {
            assert_eq!(input_file, "query.chain");
            assert_eq!(output_file, Some("out.sql".to_string()));
        } else {
            panic!("Expected FileMode");
        }

        assert!(matches!(config.output_format, OutputFormat::Pretty));
    }

    #[test]
    fn processing_pipeline_creation_without_schema_or_params() {
        let args = create_test_args();
        let config = CliConfig::from_args(&args);

        let pipeline = ProcessingPipeline::new(config);
        assert!(pipeline.is_ok());
    }

    #[test]
    fn processing_pipeline_validation_mode() {
        let mut args = create_test_args();
        args.validate_only = true;
        let config = CliConfig::from_args(&args);

        let pipeline = ProcessingPipeline::new(config).unwrap();
        assert!(pipeline.validator.is_some());
    }

    #[test]
    fn compiles_end_to_end_through_the_pipeline() {
        let mut args = create_test_args();
        args.input_text = Some(
            "(ctx, p) => ctx.from(\"users\").where(u => u.age > p.minAge)".to_string(),
        );
        args.schema_file = None;
        args.params_json = Some("{\"minAge\": 18}".to_string());
        let config = CliConfig::from_args(&args);

        let mut pipeline = ProcessingPipeline::new(config).unwrap();
        let output = pipeline.process().unwrap();
        assert!(output.contains("SELECT"));
        assert!(output.contains("FROM"));
    }
}
