//! The `check` subcommand

use anyhow::{Context, Result};
use colored::*;
use phpverify_analyze::{
    config::Config,
    logging,
    output::{format_issues, OutputFormat},
    Analyzer,
};
use std::path::{Path, PathBuf};

pub struct CheckArgs {
    pub paths: Vec<PathBuf>,
    /// Config file; auto-detected when unset
    pub config: Option<PathBuf>,
    pub no_config: bool,
    pub format: OutputFormat,
    /// Debug log file path (enables detailed logging)
    pub debug_log: Option<PathBuf>,
    pub verbose: bool,
}

/// Counts of what the run reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckSummary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub total: usize,
}

pub fn run_check(args: &CheckArgs) -> Result<CheckSummary> {
    if let Some(log_path) = &args.debug_log {
        match logging::init_logger(Some(log_path)) {
            Ok(path) => {
                if args.verbose {
                    println!("{}: Debug log writing to {}", "Debug".bold(), path.display());
                }
            }
            Err(e) => {
                eprintln!("{}: Failed to initialize debug log: {}", "Warning".yellow(), e);
            }
        }
    }

    let config = load_config(args)?;
    logging::log_config_summary(
        config.paths.exclude.len(),
        config.threads(),
        config.analysis.max_file_size,
        config.analysis.unused_var_regex.as_deref().unwrap_or("^_$"),
    );

    let analyzer = Analyzer::new(config).context("Invalid configuration")?;
    let paths: Vec<&Path> = args.paths.iter().map(|p| p.as_path()).collect();

    if args.verbose && args.format == OutputFormat::Text {
        println!(
            "{}: {}",
            "Analyzing".bold(),
            paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
        );
    }

    let issues = analyzer.analyze_paths(&paths)?;
    print!("{}", format_issues(&issues, args.format));

    let summary = CheckSummary {
        files: analyzer.index().stats().files,
        errors: issues.error_count(),
        warnings: issues.warning_count(),
        total: issues.len(),
    };

    if args.format == OutputFormat::Text {
        if summary.total == 0 {
            println!("{}", "No issues found".green());
        } else {
            println!(
                "Found {} ({} and {})",
                format!("{} issues", summary.total).bold(),
                format!("{} errors", summary.errors).red(),
                format!("{} warnings", summary.warnings).yellow()
            );
        }
    }

    Ok(summary)
}

fn load_config(args: &CheckArgs) -> Result<Config> {
    if args.no_config {
        return Ok(Config::default());
    }

    if let Some(path) = &args.config {
        logging::log_config_load(path);
        let config = Config::load_path(path)?;
        if args.verbose && args.format == OutputFormat::Text {
            println!("{}: {}", "Using config".bold(), path.display());
        }
        return Ok(config);
    }

    match Config::load()? {
        Some((config, path)) => {
            logging::log_config_load(&path);
            if args.verbose && args.format == OutputFormat::Text {
                println!("{}: {}", "Using config".bold(), path.display());
            }
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(paths: Vec<PathBuf>) -> CheckArgs {
        CheckArgs {
            paths,
            config: None,
            no_config: true,
            format: OutputFormat::Json,
            debug_log: None,
            verbose: false,
        }
    }

    #[test]
    fn test_check_counts_errors() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("a.php"),
            "<?php\nfunction f() {\n    $x = 1;\n    echo $y;\n}\n",
        )
        .unwrap();

        let summary = run_check(&args(vec![temp.path().to_path_buf()])).unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.total, 2);
    }

    #[test]
    fn test_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("custom.toml");
        fs::write(&config_path, "[analysis]\nunused_var_regex = \"^x$\"\n").unwrap();
        fs::write(temp.path().join("a.php"), "<?php\nfunction f() { $x = 1; }\n").unwrap();

        let mut check = args(vec![temp.path().to_path_buf()]);
        check.no_config = false;
        check.config = Some(config_path);
        let summary = run_check(&check).unwrap();
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn test_broken_config_is_error() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("broken.toml");
        fs::write(&config_path, "[analysis\n").unwrap();

        let mut check = args(vec![temp.path().to_path_buf()]);
        check.no_config = false;
        check.config = Some(config_path);
        assert!(run_check(&check).is_err());
    }
}
