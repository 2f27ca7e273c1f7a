//! phpverify CLI - static analysis for whole PHP projects
//!
//! ```text
//! phpverify check src/ tests/
//! phpverify check --format json --config ci.toml src/
//! ```

mod check;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;

use check::{run_check, CheckArgs};
use phpverify_analyze::output::OutputFormat;

#[derive(Parser)]
#[command(name = "phpverify")]
#[command(version)]
#[command(about = "Finds undefined variables, unused variables and unreachable code in PHP projects")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze files and directories
    Check(CheckCommand),
}

#[derive(Args)]
struct CheckCommand {
    /// Files or directories to analyze
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Path to config file (default: auto-detect .phpverify.toml)
    #[arg(long, value_name = "PATH", conflicts_with = "no_config")]
    config: Option<PathBuf>,

    /// Ignore config files
    #[arg(long)]
    no_config: bool,

    /// Output format: text, json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    format: String,

    /// Write a debug log to this file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Show verbose output
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check(command) => {
            let args = check_args(command)?;
            let summary = run_check(&args)?;
            if summary.errors > 0 {
                Ok(ExitCode::from(1))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn check_args(command: CheckCommand) -> Result<CheckArgs> {
    let format = OutputFormat::from_str(&command.format).ok_or_else(|| {
        anyhow::anyhow!("Invalid output format '{}'. Valid options: text, json", command.format)
    })?;

    Ok(CheckArgs {
        paths: command.paths,
        config: command.config,
        no_config: command.no_config,
        format,
        debug_log: command.debug_log,
        verbose: command.verbose,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_command() {
        let cli = Cli::try_parse_from(["phpverify", "check", "--format", "json", "src", "lib"]).unwrap();
        let Command::Check(command) = cli.command;
        let args = check_args(command).unwrap();
        assert_eq!(args.paths, vec![PathBuf::from("src"), PathBuf::from("lib")]);
        assert_eq!(args.format, OutputFormat::Json);
        assert!(!args.no_config);
    }

    #[test]
    fn test_invalid_format() {
        let cli = Cli::try_parse_from(["phpverify", "check", "--format", "xml", "src"]).unwrap();
        let Command::Check(command) = cli.command;
        assert!(check_args(command).is_err());
    }

    #[test]
    fn test_config_conflicts_with_no_config() {
        assert!(Cli::try_parse_from(["phpverify", "check", "--config", "a.toml", "--no-config", "src"]).is_err());
        assert!(Cli::try_parse_from(["phpverify", "check"]).is_err());
    }
}
