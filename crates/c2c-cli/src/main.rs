// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use c2c_cli::{format_change_table, parse_config_json, parse_series_table, run_table};
use c2c_core::{C2cError, ChangeTable, SolverConfig};
use serde::Serialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

struct Cli {
    command: Command,
}

enum Command {
    Run(RunArgs),
    Defaults(DefaultsArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    fn parse(raw: &str) -> Result<Self, CliError> {
        match raw.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(CliError::invalid_input(format!(
                "unsupported --format value '{raw}'; expected csv or json"
            ))),
        }
    }
}

/// Flags layered on top of the defaults or a `--config` file.
#[derive(Debug, Default, PartialEq)]
struct ConfigOverrides {
    max_error: Option<f64>,
    max_segments: Option<usize>,
    infill: Option<bool>,
    spikes_tolerance: Option<f64>,
    revert_band: Option<bool>,
    negative_magnitude_only: Option<bool>,
    post_metrics: Option<bool>,
    regrowth_metrics: Option<bool>,
    interpolate: Option<bool>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    regrowth_offsets: Option<Vec<usize>>,
    logs: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut SolverConfig) {
        if let Some(value) = self.max_error {
            config.max_error = value;
        }
        if let Some(value) = self.max_segments {
            config.max_segments = value;
        }
        if let Some(value) = self.infill {
            config.infill = value;
        }
        if let Some(value) = self.spikes_tolerance {
            config.spikes_tolerance = value;
        }
        if let Some(value) = self.revert_band {
            config.revert_band = value;
        }
        if let Some(value) = self.negative_magnitude_only {
            config.negative_magnitude_only = value;
        }
        if let Some(value) = self.post_metrics {
            config.post_metrics = value;
        }
        if let Some(value) = self.regrowth_metrics {
            config.regrowth_metrics = value;
        }
        if let Some(value) = self.interpolate {
            config.interpolate = value;
        }
        if let Some(value) = self.start_year {
            config.start_year = value;
        }
        if let Some(value) = self.end_year {
            config.end_year = value;
        }
        if let Some(value) = &self.regrowth_offsets {
            config.regrowth_offsets = value.clone();
        }
        if let Some(value) = self.logs {
            config.logs = value;
        }
    }
}

#[derive(Debug)]
struct RunArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    format: OutputFormat,
    config: Option<PathBuf>,
    overrides: ConfigOverrides,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: None,
            format: OutputFormat::Csv,
            config: None,
            overrides: ConfigOverrides::default(),
        }
    }
}

#[derive(Debug, Default)]
struct DefaultsArgs {
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Core(C2cError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Core(err) => err.code(),
            Self::InvalidInput(_) => "invalid_input",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Core(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<C2cError> for CliError {
    fn from(value: C2cError) -> Self {
        Self::Core(value)
    }
}

#[derive(Serialize)]
struct InputSummary {
    path: String,
    rows: usize,
    dates: usize,
}

#[derive(Serialize)]
struct RunSummary {
    processed: usize,
    skipped: usize,
    changes: usize,
    runtime_ms: Option<u64>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    command: &'static str,
    input: InputSummary,
    config: &'a SolverConfig,
    summary: RunSummary,
    #[serde(flatten)]
    table: &'a ChangeTable,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let Some(cli) = parse_cli(&args)? else {
        return Ok(());
    };

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Defaults(args) => handle_defaults(args),
    }
}

fn parse_cli(args: &[String]) -> Result<Option<Cli>, CliError> {
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].as_str();
    let rest = &args[1..];

    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name)?;
        return Ok(None);
    }

    let command = match command_name {
        "run" => Command::Run(parse_run_args(rest)?),
        "defaults" => Command::Defaults(parse_defaults_args(rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: run, defaults"
            )));
        }
    };

    Ok(Some(Cli { command }))
}

fn parse_run_args(tokens: &[String]) -> Result<RunArgs, CliError> {
    let mut args = RunArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        let overrides = &mut args.overrides;
        match flag {
            "--input" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.input = PathBuf::from(raw);
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            "--format" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.format = OutputFormat::parse(raw.as_str())?;
            }
            "--config" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.config = Some(PathBuf::from(raw));
            }
            "--max-error" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                overrides.max_error = Some(parse_f64_arg(raw.as_str(), flag)?);
            }
            "--max-segments" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                overrides.max_segments = Some(parse_usize_arg(raw.as_str(), flag)?);
            }
            "--spikes-tolerance" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                overrides.spikes_tolerance = Some(parse_f64_arg(raw.as_str(), flag)?);
            }
            "--start-year" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                overrides.start_year = Some(parse_i32_arg(raw.as_str(), flag)?);
            }
            "--end-year" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                overrides.end_year = Some(parse_i32_arg(raw.as_str(), flag)?);
            }
            "--regrowth-offsets" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                overrides.regrowth_offsets = Some(parse_usize_list_arg(raw.as_str(), flag)?);
            }
            "--no-infill" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.infill = Some(false);
            }
            "--revert-band" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.revert_band = Some(true);
            }
            "--negative-only" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.negative_magnitude_only = Some(true);
            }
            "--no-post-metrics" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.post_metrics = Some(false);
            }
            "--regrowth-metrics" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.regrowth_metrics = Some(true);
            }
            "--interpolate" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.interpolate = Some(true);
            }
            "--logs" => {
                ensure_no_inline_value(flag, inline_value)?;
                overrides.logs = Some(true);
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown run option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --input <path>"));
    }

    Ok(args)
}

fn parse_defaults_args(tokens: &[String]) -> Result<DefaultsArgs, CliError> {
    let mut args = DefaultsArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown defaults option '{other}'"
                )));
            }
        }
        idx += 1;
    }
    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<(), CliError> {
    if inline_value.is_some() {
        return Err(CliError::invalid_input(format!(
            "{flag} does not accept a value"
        )));
    }
    Ok(())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_i32_arg(raw: &str, flag: &str) -> Result<i32, CliError> {
    raw.parse::<i32>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects an integer, got '{raw}'")))
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64, CliError> {
    raw.parse::<f64>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects a number, got '{raw}'")))
}

fn parse_usize_list_arg(raw: &str, flag: &str) -> Result<Vec<usize>, CliError> {
    raw.split(',')
        .map(str::trim)
        .map(|part| parse_usize_arg(part, flag))
        .collect()
}

fn print_version() {
    println!("c2c {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "c2c {}\n\nUSAGE:\n  c2c <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  run        Segment every series of a CSV table and report its changes\n  defaults   Print the default solver configuration as JSON\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nRun 'c2c <COMMAND> --help' for subcommand options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "run" => {
            println!(
                "USAGE:\n  c2c run --input <path.csv> [OPTIONS]\n\nOPTIONS:\n  --input <path>              CSV table: header 'id,<date>,...', rows 'id,<value>,...'\n  --output <path>             Write output to a file instead of stdout\n  --format <csv|json>         Output format (default: csv)\n  --config <path.json>        Solver config JSON; flags below override it\n  --max-error <f64>           Merge-stop RMSE threshold (default: 75)\n  --max-segments <n>          Maximum number of segments (default: 6)\n  --spikes-tolerance <f64>    Despike tolerance in [0, 1]; 1 disables (default: 0.85)\n  --start-year <year>         First year of the record (default: 1984)\n  --end-year <year>           Last year of the record (default: 2019)\n  --regrowth-offsets <list>   Comma-separated sampling offsets (default: 4,5,6)\n  --no-infill                 Skip gap filling\n  --revert-band               Negate values before processing\n  --negative-only             Keep only negative-magnitude changes\n  --no-post-metrics           Drop postMagnitude, postDuration, postRate\n  --regrowth-metrics          Add indexRegrowth, recoveryIndicator, y2r60, y2r80, y2r100\n  --interpolate               Smooth between vertices and recompute regrowth\n  --logs                      Print run notes to stderr prefixed with '# '"
            );
            Ok(())
        }
        "defaults" => {
            println!(
                "USAGE:\n  c2c defaults [--output <path.json>]\n\nPrints the default solver configuration, usable as a --config file."
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: run, defaults"
        ))),
    }
}

fn resolve_config(args: &RunArgs) -> Result<SolverConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|source| {
                CliError::io(format!("failed to read '{}'", path.display()), source)
            })?;
            parse_config_json(raw.as_str())?
        }
        None => SolverConfig::default(),
    };
    args.overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn handle_run(args: RunArgs) -> Result<(), CliError> {
    let config = resolve_config(&args)?;
    let raw = fs::read_to_string(&args.input).map_err(|source| {
        CliError::io(format!("failed to read '{}'", args.input.display()), source)
    })?;
    let table = parse_series_table(raw.as_str())?;

    if config.logs {
        eprintln!("# {}", describe_config(&config));
    }
    let outcome = run_table(&table, config.clone())?;
    if config.logs {
        for note in &outcome.diagnostics.notes {
            eprintln!("# {note}");
        }
    }
    for warning in &outcome.diagnostics.warnings {
        eprintln!("# warning: {warning}");
    }

    match args.format {
        OutputFormat::Csv => {
            write_text_output(&format_change_table(&outcome.table), args.output.as_deref())
        }
        OutputFormat::Json => write_json_output(
            &RunOutput {
                command: "run",
                input: InputSummary {
                    path: args.input.display().to_string(),
                    rows: table.row_count(),
                    dates: table.dates().len(),
                },
                config: &config,
                summary: RunSummary {
                    processed: outcome.processed,
                    skipped: outcome.skipped,
                    changes: outcome.table.len(),
                    runtime_ms: outcome.diagnostics.runtime_ms,
                    warnings: outcome.diagnostics.warnings.clone(),
                },
                table: &outcome.table,
            },
            args.output.as_deref(),
        ),
    }
}

fn handle_defaults(args: DefaultsArgs) -> Result<(), CliError> {
    write_json_output(&SolverConfig::default(), args.output.as_deref())
}

fn describe_config(config: &SolverConfig) -> String {
    format!(
        "maxError={}, maxSegments={}, startYear={}, endYear={}, infill={}, spikesTolerance={}, revertBand={}, negativeMagnitudeOnly={}, postMetrics={}, regrowthMetrics={}, interpolate={}, regrowthOffsets={:?}",
        config.max_error,
        config.max_segments,
        config.start_year,
        config.end_year,
        config.infill,
        config.spikes_tolerance,
        config.revert_band,
        config.negative_magnitude_only,
        config.post_metrics,
        config.regrowth_metrics,
        config.interpolate,
        config.regrowth_offsets
    )
}

fn write_text_output(text: &str, output_path: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = output_path {
        fs::write(path, text)
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        print!("{text}");
        Ok(())
    }
}

fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
