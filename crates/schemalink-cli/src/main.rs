mod logging;
mod settings;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use logging::init_logging;
use schemalink_core::{
    diff_configs, link_sources, source_json_schema, Diagnostics, Error as CoreError, LinkFailure,
    LinkedConfig, SourceSet,
};
use settings::load_settings;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("logging error: {0}")]
    Logging(String),
    #[error(transparent)]
    LinkFailed(#[from] LinkFailure),
    #[error("schema change rejected with {0} error(s)")]
    Incompatible(usize),
    #[error("{0} warning(s) treated as errors")]
    Warnings(usize),
}

#[derive(Parser, Debug)]
#[command(name = "schemalink", version, about = "Schemalink CLI")]
struct Cli {
    /// Settings file; defaults to `schemalink.toml` when present.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    /// Fail when any warning is reported.
    #[arg(long, global = true, default_value_t = false)]
    warnings_as_errors: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link the sources and report diagnostics.
    Check(SourcesArgs),
    /// Print structs in emission order as `height<TAB>name`.
    Order(SourcesArgs),
    /// Compare an old configuration with a new one.
    Diff(DiffArgs),
    /// Print the JSON Schema of source documents.
    JsonSchema,
}

#[derive(Args, Debug)]
struct SourcesArgs {
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    #[arg(required = true, value_name = "OLD")]
    old: Vec<PathBuf>,

    #[arg(long, required = true, num_args = 1.., value_name = "NEW")]
    new: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut settings = load_settings(cli.config.as_deref())?;
    settings.log_json |= cli.log_json;
    settings.warnings_as_errors |= cli.warnings_as_errors;
    init_logging(&settings)?;

    tracing::info!(event = "run_started", command = command_name(&cli.command));

    match cli.command {
        Command::Check(args) => {
            let linked = link_files(&args.files)?;
            report(linked.diagnostics());
            enforce_warnings(linked.diagnostics(), settings.warnings_as_errors)?;
            tracing::info!(event = "check_finished", structs = linked.config().struct_count());
        }
        Command::Order(args) => {
            let linked = link_files(&args.files)?;
            report(linked.diagnostics());
            enforce_warnings(linked.diagnostics(), settings.warnings_as_errors)?;
            for (_, strct) in linked.ordered() {
                println!("{}\t{}", strct.height, strct.name);
            }
        }
        Command::Diff(args) => {
            let old = link_files(&args.old)?;
            let new = link_files(&args.new)?;
            let diagnostics = diff_configs(&old, &new);
            report(&diagnostics);
            if !diagnostics.is_ok() {
                return Err(CliError::Incompatible(diagnostics.error_count()));
            }
            enforce_warnings(&diagnostics, settings.warnings_as_errors)?;
        }
        Command::JsonSchema => {
            let schema = serde_json::to_string_pretty(&source_json_schema())?;
            println!("{schema}");
        }
    }

    tracing::info!(event = "run_finished", status = "success");
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Check(_) => "check",
        Command::Order(_) => "order",
        Command::Diff(_) => "diff",
        Command::JsonSchema => "json-schema",
    }
}

fn link_files(files: &[PathBuf]) -> Result<LinkedConfig, CliError> {
    let mut sources = SourceSet::new();
    for path in files {
        load_file(&mut sources, path)?;
    }

    link_sources(sources).map_err(|failure| {
        report(&failure.diagnostics);
        CliError::from(failure)
    })
}

fn load_file(sources: &mut SourceSet, path: &Path) -> Result<(), CliError> {
    tracing::debug!(event = "source_loading", path = %path.display());
    match sources.add_file(path) {
        Ok(()) => Ok(()),
        Err(CoreError::Io(err)) => Err(CliError::Io(err)),
        Err(CoreError::Json(err)) => Err(CliError::Json(err)),
        Err(err) => Err(CliError::Core(err)),
    }
}

fn report(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.iter() {
        eprintln!("{diagnostic}");
    }
}

fn enforce_warnings(diagnostics: &Diagnostics, warnings_as_errors: bool) -> Result<(), CliError> {
    let warnings = diagnostics.warning_count();
    if warnings_as_errors && warnings > 0 {
        return Err(CliError::Warnings(warnings));
    }
    Ok(())
}
