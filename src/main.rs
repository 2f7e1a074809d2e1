use clap::Parser;
use go_immutable::{
    lint::{run_lint, LintOptions, Overrides},
    logging::{self, LogFormat, LogLevel, LogOptions},
    project::config::OutputFormat,
};
use std::{path::PathBuf, process::ExitCode};

/// Reports Go code that breaks the `mut`/`Mut` mutability naming convention.
#[derive(Parser)]
#[command(name = "go-immutable", version, about, long_about = None)]
struct Cli {
    /// Packages to analyze: `.`, `./dir`, `./...` or an import path
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Configuration file (default: nearest immutable.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format: plain, fancy or json
    #[arg(long, value_parser = parse_output_format)]
    format: Option<OutputFormat>,

    /// Checker worker threads; 0 uses every available core
    #[arg(long, value_name = "N")]
    jobs: Option<usize>,

    /// Extra name excluded from naming checks (repeatable)
    #[arg(long = "exempt", value_name = "NAME")]
    exempt: Vec<String>,

    /// Re-run whenever Go sources, go.mod or immutable.toml change
    #[arg(long)]
    watch: bool,

    /// Log verbosity: error, warn, info, debug or trace
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LogLevel>,

    /// Log format: text or json
    #[arg(long, value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

fn parse_output_format(value: &str) -> Result<OutputFormat, String> {
    OutputFormat::parse(value).ok_or_else(|| format!("unknown output format `{value}`"))
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value).ok_or_else(|| format!("unknown log level `{value}`"))
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    LogFormat::parse(value).ok_or_else(|| format!("unknown log format `{value}`"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(LogOptions::from_env().with_overrides(cli.log_format, cli.log_level));

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("error: cannot read the working directory: {err}");
            return ExitCode::from(2);
        }
    };
    let options = LintOptions {
        pattern: cli.pattern,
        cwd,
        config: cli.config,
        overrides: Overrides {
            format: cli.format,
            jobs: cli.jobs,
            exempt: cli.exempt,
        },
        watch: cli.watch,
    };
    ExitCode::from(run_lint(&options).exit_code())
}
