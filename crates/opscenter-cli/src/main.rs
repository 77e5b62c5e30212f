// crates/opscenter-cli/src/main.rs
// ============================================================================
// Module: Operations Center CLI Entry Point
// Description: Command dispatcher for config, expression, and update tasks.
// Purpose: Provide offline operator tooling over the configuration crates.
// Dependencies: clap, opscenter-config, opscenter-core, opscenter-expr, serde_json
// ============================================================================

//! ## Overview
//! The `opscenter` CLI validates configuration files, checks filter
//! expressions against the record schemas, and runs the update filter
//! pipeline over a JSON update list. Security posture: every input file is
//! untrusted, read with a hard size limit, and validated fail-closed.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use opscenter_config::OpsCenterConfig;
use opscenter_config::SystemConfigStore;
use opscenter_config::config_toml_example;
use opscenter_core::FileAuditSink;
use opscenter_core::FilterAuditSink;
use opscenter_core::FilterFailure;
use opscenter_core::FilterTarget;
use opscenter_core::RecordSchemas;
use opscenter_core::StderrAuditSink;
use opscenter_core::Update;
use opscenter_expr::BuiltinEngine;
use opscenter_expr::ExpressionEngine;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an update list JSON input.
const MAX_UPDATES_INPUT_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "opscenter", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Filter expression utilities.
    Expr {
        /// Selected expression subcommand.
        #[command(subcommand)]
        command: ExprCommand,
    },
    /// Update list utilities.
    Updates {
        /// Selected updates subcommand.
        #[command(subcommand)]
        command: UpdatesCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigValidateCommand),
    /// Print the canonical example config.
    Example,
}

/// Expression subcommands.
#[derive(Subcommand, Debug)]
enum ExprCommand {
    /// Compile an expression and report errors.
    Check(ExprCheckCommand),
}

/// Updates subcommands.
#[derive(Subcommand, Debug)]
enum UpdatesCommand {
    /// Filter an update list with the configured expressions.
    Filter(UpdatesFilterCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to opscenter.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for expression checks.
#[derive(Args, Debug)]
struct ExprCheckCommand {
    /// Record type the expression is evaluated against.
    #[arg(long, value_enum, default_value_t = TargetArg::Update)]
    target: TargetArg,
    /// Expression source.
    #[arg(value_name = "EXPR")]
    expression: String,
}

/// Arguments for update filtering.
#[derive(Args, Debug)]
struct UpdatesFilterCommand {
    /// Optional config file path (defaults to opscenter.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// JSON file holding an array of updates.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
}

/// Record type selector for expression checks.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum TargetArg {
    /// Update records.
    Update,
    /// Update file records.
    File,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for operator-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Expr {
            command,
        } => match command {
            ExprCommand::Check(command) => command_expr_check(&command),
        },
        Commands::Updates {
            command,
        } => match command {
            UpdatesCommand::Filter(command) => command_updates_filter(&command),
        },
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Example => {
            write_stdout_bytes(config_toml_example().as_bytes())
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(command.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Loads and validates the configuration.
fn load_config(path: Option<&Path>) -> CliResult<OpsCenterConfig> {
    OpsCenterConfig::load(path)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

// ============================================================================
// SECTION: Expression Commands
// ============================================================================

/// Executes the expression check command.
fn command_expr_check(command: &ExprCheckCommand) -> CliResult<ExitCode> {
    let schemas = RecordSchemas::builtin()
        .map_err(|err| CliError::new(format!("invalid record schema: {err}")))?;
    let schema = match command.target {
        TargetArg::Update => &schemas.update,
        TargetArg::File => &schemas.file,
    };
    if command.expression.trim().is_empty() {
        write_stdout_line("expression ok (accepts every record)")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }
    BuiltinEngine
        .compile(&command.expression, schema)
        .map_err(|err| CliError::new(format!("invalid expression: {err}")))?;
    write_stdout_line(&format!("expression ok for {}", schema.name()))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Updates Commands
// ============================================================================

/// JSON report written by `updates filter`.
#[derive(Debug, Serialize)]
struct FilterReport {
    /// Updates that passed, with pruned file lists.
    updates: Vec<Update>,
    /// Records excluded because evaluation failed.
    failures: Vec<FailureReport>,
}

/// A single evaluation failure in a [`FilterReport`].
#[derive(Debug, Serialize)]
struct FailureReport {
    /// Filter stage.
    target: FilterTarget,
    /// Update id or file name.
    record_id: String,
    /// Owning update id for file records.
    #[serde(skip_serializing_if = "Option::is_none")]
    update_id: Option<String>,
    /// Expression source that failed.
    expression: String,
    /// Evaluation error message.
    error: String,
}

impl From<FilterFailure> for FailureReport {
    fn from(failure: FilterFailure) -> Self {
        Self {
            target: failure.target,
            record_id: failure.record_id,
            update_id: failure.update_id,
            expression: failure.expression,
            error: failure.error.to_string(),
        }
    }
}

/// Executes the update filter command.
fn command_updates_filter(command: &UpdatesFilterCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.as_deref())?;
    let sink = audit_sink(&config)?;
    let store = SystemConfigStore::new(config, sink)
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;

    let bytes = read_bytes_with_limit(&command.input, MAX_UPDATES_INPUT_BYTES)
        .map_err(|err| CliError::new(read_error(&command.input, &err)))?;
    let updates: Vec<Update> = serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(format!("invalid update list {}: {err}", command.input.display()))
    })?;

    let outcome = store.filter_updates(updates);
    let report = FilterReport {
        updates: outcome.accepted,
        failures: outcome.failures.into_iter().map(FailureReport::from).collect(),
    };
    let mut bytes = serde_json::to_vec_pretty(&report)
        .map_err(|err| CliError::new(format!("failed to serialize report: {err}")))?;
    bytes.push(b'\n');
    write_stdout_bytes(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Selects the audit sink configured for the run.
fn audit_sink(config: &OpsCenterConfig) -> CliResult<Arc<dyn FilterAuditSink>> {
    match config.audit.path.as_deref() {
        Some(path) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| CliError::new(format!("failed to open audit log {path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Formats a bounded read error.
fn read_error(path: &Path, error: &ReadLimitError) -> String {
    match error {
        ReadLimitError::Io(err) => format!("failed to read {}: {err}", path.display()),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => format!("{} exceeds size limit ({size} > {limit} bytes)", path.display()),
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
