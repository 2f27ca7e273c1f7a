//! Opt-in debug log for phpverify-analyze
//!
//! Nothing is written until [`init_logger`] is called; every helper is a
//! no-op otherwise. Workers log from several threads, so the writer sits
//! behind a global mutex.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::symbols::IndexStats;

static LOGGER: Mutex<Option<AnalyzeLogger>> = Mutex::new(None);

/// Timestamped line writer behind the global log
pub struct AnalyzeLogger {
    file: File,
    path: PathBuf,
}

impl AnalyzeLogger {
    pub fn new(log_path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(log_path)?;

        Ok(Self {
            file,
            path: log_path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&mut self, message: &str) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(self.file, "[{}] {}", timestamp, message);
        let _ = self.file.flush();
    }

    pub fn section(&mut self, title: &str) {
        let separator = "=".repeat(60);
        self.log(&separator);
        self.log(title);
        self.log(&separator);
    }

    pub fn subsection(&mut self, title: &str) {
        let separator = "-".repeat(40);
        self.log(&separator);
        self.log(title);
        self.log(&separator);
    }
}

/// Start logging to `log_path`, or to a timestamped file in the temp dir
pub fn init_logger(log_path: Option<&Path>) -> std::io::Result<PathBuf> {
    let path = log_path.map(|p| p.to_path_buf()).unwrap_or_else(|| {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        std::env::temp_dir().join(format!("phpverify-{}.log", timestamp))
    });

    let logger = AnalyzeLogger::new(&path)?;
    let mut guard = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
    *guard = Some(logger);

    Ok(path)
}

fn with_logger(f: impl FnOnce(&mut AnalyzeLogger)) {
    let mut guard = LOGGER.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(logger) = guard.as_mut() {
        f(logger);
    }
}

pub fn log(message: &str) {
    with_logger(|logger| logger.log(message));
}

pub fn section(title: &str) {
    with_logger(|logger| logger.section(title));
}

pub fn subsection(title: &str) {
    with_logger(|logger| logger.subsection(title));
}

pub fn is_enabled() -> bool {
    LOGGER.lock().map(|guard| guard.is_some()).unwrap_or(false)
}

pub fn log_config_load(path: &Path) {
    section("CONFIGURATION LOADING");
    log(&format!("Loading config from: {}", path.display()));
}

pub fn log_config_summary(exclude_count: usize, threads: usize, max_file_size: u64, unused_var_regex: &str) {
    section("CONFIGURATION SUMMARY");
    log(&format!("Exclude patterns: {}", exclude_count));
    log(&format!("Worker threads: {}", threads));
    log(&format!("Byte budget: {}", max_file_size));
    log(&format!("Unused variable pattern: {}", unused_var_regex));
}

pub fn log_phase_start(phase: &str, files_count: usize) {
    section(&format!("{} START", phase.to_uppercase()));
    log(&format!("Processing {} files", files_count));
}

pub fn log_phase_complete(phase: &str, files_count: usize, issues_count: usize) {
    subsection(&format!("{} COMPLETE", phase.to_uppercase()));
    log(&format!("Files processed: {}", files_count));
    log(&format!("Diagnostics: {}", issues_count));
}

pub fn log_index_stats(stats: &IndexStats) {
    subsection("SYMBOL INDEX");
    log(&format!("Files: {}", stats.files));
    log(&format!("Classes: {}", stats.classes));
    log(&format!("Traits: {}", stats.traits));
    log(&format!("Functions: {}", stats.functions));
    log(&format!("Constants: {}", stats.constants));
}

pub fn log_file_panic(filename: &str, message: &str) {
    log(&format!("PANIC while analyzing {}: {}", filename, message));
}

pub fn log_file_error(filename: &str, error: &str) {
    log(&format!("FAILED to analyze {}: {}", filename, error));
}

pub fn log_throttle(filename: &str, in_flight: u64, size: u64) {
    log(&format!(
        "Limiting concurrency to save memory: {} waits ({} bytes in flight, {} requested)",
        filename, in_flight, size
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_writes_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let mut logger = AnalyzeLogger::new(&path).unwrap();
        logger.section("INDEXING");
        logger.log("hello");
        assert_eq!(logger.path(), path.as_path());

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("] INDEXING"));
        assert!(lines[3].starts_with('['));
        assert!(lines[3].ends_with("] hello"));
    }
}
