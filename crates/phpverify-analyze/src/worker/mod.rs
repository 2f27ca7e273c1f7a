//! Per-file analysis jobs
//!
//! Every file goes through the [`RootWalker`] twice. The indexing pass
//! only records symbols, the reporting pass runs against the complete
//! index and keeps the diagnostics.

pub mod limiter;

pub use limiter::{ByteGuard, ByteLimiter};

use std::borrow::Cow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use phpverify_core::parse_source;
use walkdir::WalkDir;

use crate::config::Config;
use crate::issue::Issue;
use crate::linter::{FileResult, LintOptions, RootWalker, WalkEnv};
use crate::logging;
use crate::symbols::SymbolIndex;
use crate::AnalyzeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Declarations only; diagnostics are dropped
    Indexing,
    Reporting,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Indexing => "indexing",
            Phase::Reporting => "reporting",
        }
    }
}

/// A file to analyze, on disk or already in memory
#[derive(Debug, Clone)]
pub enum FileInput {
    Path(PathBuf),
    Memory { name: String, source: String },
}

impl FileInput {
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            FileInput::Path(path) => path.to_string_lossy(),
            FileInput::Memory { name, .. } => Cow::Borrowed(name),
        }
    }

    pub fn read(&self) -> Result<Cow<'_, str>, AnalyzeError> {
        match self {
            FileInput::Path(path) => std::fs::read_to_string(path)
                .map(Cow::Owned)
                .map_err(|source| AnalyzeError::Io {
                    path: path.clone(),
                    source,
                }),
            FileInput::Memory { source, .. } => Ok(Cow::Borrowed(source)),
        }
    }
}

/// Runs the walkers for one file at a time; cheap to share across threads
#[derive(Clone, Copy)]
pub struct Worker<'a> {
    index: &'a SymbolIndex,
    options: &'a LintOptions,
}

impl<'a> Worker<'a> {
    pub fn new(index: &'a SymbolIndex, options: &'a LintOptions) -> Self {
        Self { index, options }
    }

    /// Parse and walk `source`.
    ///
    /// While indexing, the file's previous symbols are replaced by the new
    /// ones in a single step.
    pub fn analyze_file(&self, filename: &str, source: &str, phase: Phase) -> Result<FileResult, AnalyzeError> {
        let parsed = match parse_source(filename, source) {
            Ok(parsed) => parsed,
            Err(error) => {
                logging::log_file_error(filename, &error.to_string());
                let mut result = FileResult::default();
                if phase == Phase::Reporting {
                    result.issues.push(Issue::error("parse", error.to_string(), filename));
                }
                return Ok(result);
            }
        };

        let env = WalkEnv {
            index: self.index,
            options: self.options,
        };
        let result = RootWalker::new(env, filename, source, phase == Phase::Reporting).walk_file(&parsed);
        if phase == Phase::Indexing {
            self.index.replace_file_meta(filename, result.meta.clone())?;
        }
        Ok(result)
    }

    /// Like [`Worker::analyze_file`], but a panic yields an empty result
    pub fn analyze_guarded(&self, filename: &str, source: &str, phase: Phase) -> Result<FileResult, AnalyzeError> {
        match catch_unwind(AssertUnwindSafe(|| self.analyze_file(filename, source, phase))) {
            Ok(result) => result,
            Err(payload) => {
                logging::log_file_panic(filename, &panic_message(payload.as_ref()));
                Ok(FileResult::default())
            }
        }
    }

    /// Read `input`, wait for budget and analyze it
    pub fn process(&self, limiter: &ByteLimiter, input: &FileInput, phase: Phase) -> Result<FileResult, AnalyzeError> {
        let source = input.read()?;
        let filename = input.name();
        let _guard = limiter.acquire(source.len() as u64, &filename);
        self.analyze_guarded(&filename, &source, phase)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Expand `paths` into the PHP files to analyze, sorted and deduplicated
pub fn collect_php_files(paths: &[&Path], config: &Config) -> Result<Vec<PathBuf>, AnalyzeError> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.to_path_buf());
        } else if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
                let entry_path = entry.path();
                if entry_path.is_file()
                    && entry_path.extension().map(|e| e == "php").unwrap_or(false)
                    && !config.is_excluded(entry_path)
                {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            return Err(AnalyzeError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            });
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn run_both(worker: &Worker, index: &SymbolIndex, filename: &str, source: &str) -> FileResult {
        worker.analyze_file(filename, source, Phase::Indexing).unwrap();
        index.set_indexing_complete(true);
        worker.analyze_file(filename, source, Phase::Reporting).unwrap()
    }

    #[test]
    fn test_indexing_registers_and_drops_issues() {
        let index = SymbolIndex::with_builtins();
        let options = LintOptions::default();
        let worker = Worker::new(&index, &options);

        let result = worker
            .analyze_file("a.php", "<?php\nfunction a() { echo $x; }\n", Phase::Indexing)
            .unwrap();
        assert!(result.issues.is_empty());
        assert!(index.get_function("\\a").is_some());
        assert!(index.file_exists("a.php"));
    }

    #[test]
    fn test_reindexing_replaces_symbols() {
        let index = SymbolIndex::new();
        let options = LintOptions::default();
        let worker = Worker::new(&index, &options);

        worker.analyze_file("a.php", "<?php\nfunction old_name() {}\n", Phase::Indexing).unwrap();
        worker.analyze_file("a.php", "<?php\nfunction new_name() {}\n", Phase::Indexing).unwrap();
        assert!(index.get_function("\\old_name").is_none());
        assert!(index.get_function("\\new_name").is_some());
    }

    #[test]
    fn test_reporting_keeps_issues_without_touching_index() {
        let index = SymbolIndex::new();
        let options = LintOptions::default();
        let worker = Worker::new(&index, &options);

        let result = run_both(&worker, &index, "a.php", "<?php\nfunction a() { echo $x; }\n");
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].message, "Undefined variable: $x");
        assert_eq!(index.stats().files, 1);
    }

    #[test]
    fn test_indexing_after_completion_fails() {
        let index = SymbolIndex::new();
        let options = LintOptions::default();
        let worker = Worker::new(&index, &options);
        index.set_indexing_complete(true);

        let err = worker.analyze_file("a.php", "<?php\n", Phase::Indexing).unwrap_err();
        assert!(matches!(err, AnalyzeError::Index(_)));
    }

    #[test]
    fn test_process_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.php");
        fs::write(&path, "<?php\nfunction f() { return 1; echo 2; }\n").unwrap();

        let index = SymbolIndex::new();
        let options = LintOptions::default();
        let worker = Worker::new(&index, &options);
        let limiter = ByteLimiter::new(1024);
        let input = FileInput::Path(path);

        worker.process(&limiter, &input, Phase::Indexing).unwrap();
        index.set_indexing_complete(true);
        let result = worker.process(&limiter, &input, Phase::Reporting).unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].check_name, "deadCode");
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let index = SymbolIndex::new();
        let options = LintOptions::default();
        let worker = Worker::new(&index, &options);
        let limiter = ByteLimiter::new(1024);
        let input = FileInput::Path(PathBuf::from("/nonexistent/phpverify/a.php"));

        let err = worker.process(&limiter, &input, Phase::Indexing).unwrap_err();
        assert!(matches!(err, AnalyzeError::Io { .. }));
    }

    #[test]
    fn test_collect_php_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("vendor/lib")).unwrap();
        fs::write(dir.path().join("src/b.php"), "<?php\n").unwrap();
        fs::write(dir.path().join("src/a.php"), "<?php\n").unwrap();
        fs::write(dir.path().join("src/notes.txt"), "").unwrap();
        fs::write(dir.path().join("vendor/lib/c.php"), "<?php\n").unwrap();

        let config = Config::parse("[paths]\nexclude = [\"vendor/\"]\n").unwrap();
        let files = collect_php_files(&[dir.path()], &config).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["src/a.php", "src/b.php"]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
