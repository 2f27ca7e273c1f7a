//! phpverify-analyze: whole-project static analysis for PHP
//!
//! Files are analyzed in two passes. The first pass walks every file to
//! fill the [`SymbolIndex`](symbols::SymbolIndex) with functions, classes,
//! constants and pseudo-main globals. The index is then frozen and the second
//! pass walks every file again, this time resolving calls across files and
//! reporting diagnostics:
//!
//! - undefined and possibly undefined variables;
//! - unused variables and foreach keys;
//! - unreachable code, including code after calls to functions that always exit;
//! - missing `break` in switch cases.
//!
//! # Example
//!
//! ```no_run
//! use phpverify_analyze::{config::Config, output::OutputFormat, Analyzer};
//! use std::path::Path;
//!
//! let analyzer = Analyzer::new(Config::default()).unwrap();
//! let issues = analyzer.analyze_paths(&[Path::new("src/")]).unwrap();
//! println!("{}", phpverify_analyze::output::format_issues(&issues, OutputFormat::Text));
//! ```

pub mod config;
pub mod issue;
pub mod linter;
pub mod logging;
pub mod output;
pub mod scope;
pub mod solver;
pub mod symbols;
pub mod types;
pub mod worker;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use config::{Config, ConfigError};
use issue::{Issue, IssueCollection};
use linter::LintOptions;
use symbols::{IndexError, SymbolIndex, BUILTIN_FILE};
use worker::{ByteLimiter, FileInput, Phase, Worker};

/// Runs both passes over a set of files
pub struct Analyzer {
    config: Config,
    options: LintOptions,
    index: SymbolIndex,
}

impl Analyzer {
    pub fn new(config: Config) -> Result<Self, AnalyzeError> {
        let options = config.lint_options()?;
        Ok(Self {
            config,
            options,
            index: SymbolIndex::with_builtins(),
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            config: Config::default(),
            options: LintOptions::default(),
            index: SymbolIndex::with_builtins(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The index as left by the last run
    pub fn index(&self) -> &SymbolIndex {
        &self.index
    }

    /// Analyze files and directories; directories are searched for `*.php`
    pub fn analyze_paths(&self, paths: &[&Path]) -> Result<IssueCollection, AnalyzeError> {
        let files = worker::collect_php_files(paths, &self.config)?;
        let inputs: Vec<FileInput> = files.into_iter().map(FileInput::Path).collect();
        self.run(&inputs)
    }

    /// Analyze in-memory sources given as `(filename, source)` pairs
    pub fn analyze_sources(&self, sources: &[(&str, &str)]) -> Result<IssueCollection, AnalyzeError> {
        let inputs: Vec<FileInput> = sources
            .iter()
            .map(|(name, source)| FileInput::Memory {
                name: name.to_string(),
                source: source.to_string(),
            })
            .collect();
        self.run(&inputs)
    }

    fn run(&self, inputs: &[FileInput]) -> Result<IssueCollection, AnalyzeError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads())
            .build()?;
        let limiter = ByteLimiter::new(self.config.analysis.max_file_size);
        let worker = Worker::new(&self.index, &self.options);

        self.index.set_indexing_complete(false);
        self.retract_missing(inputs)?;
        self.run_phase(&pool, worker, &limiter, inputs, Phase::Indexing)?;
        self.index.set_indexing_complete(true);
        logging::log_index_stats(&self.index.stats());

        let mut combined = self.run_phase(&pool, worker, &limiter, inputs, Phase::Reporting)?;
        combined.sort();
        Ok(combined)
    }

    /// Drop the symbols of files indexed by an earlier run but not given now
    fn retract_missing(&self, inputs: &[FileInput]) -> Result<(), AnalyzeError> {
        let current: HashSet<String> = inputs.iter().map(|input| input.name().into_owned()).collect();
        for file in self.index.files() {
            if file != BUILTIN_FILE && !current.contains(&file) {
                logging::log(&format!("Retracting symbols of {}", file));
                self.index.delete_meta_for_file(&file)?;
            }
        }
        Ok(())
    }

    fn run_phase(
        &self,
        pool: &rayon::ThreadPool,
        worker: Worker<'_>,
        limiter: &ByteLimiter,
        inputs: &[FileInput],
        phase: Phase,
    ) -> Result<IssueCollection, AnalyzeError> {
        logging::log_phase_start(phase.name(), inputs.len());

        let results: Vec<_> = pool.install(|| {
            inputs
                .par_iter()
                .map(|input| (input, worker.process(limiter, input, phase)))
                .collect()
        });

        let mut combined = IssueCollection::new();
        for (input, result) in results {
            match result {
                Ok(file) => combined.extend(file.issues),
                Err(AnalyzeError::Index(error)) => return Err(error.into()),
                Err(error) => {
                    logging::log_file_error(&input.name(), &error.to_string());
                    if phase == Phase::Reporting {
                        combined.add(Issue::error("io", error.to_string(), input.name()));
                    }
                }
            }
        }

        logging::log_phase_complete(phase.name(), inputs.len(), combined.len());
        Ok(combined)
    }
}

/// Errors that can occur during analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
