//! Configuration file support
//!
//! Loads `.phpverify.toml` from the current directory or one of its parents.
//!
//! ```toml
//! [paths]
//! exclude = ["vendor/", "*.generated.php"]
//!
//! [analysis]
//! unused_var_regex = "^_"
//! max_file_size = 20971520
//! ignore_trigger_error = false
//! allow_disable = "legacy/"
//! threads = 4
//! ```

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::linter::LintOptions;

pub const CONFIG_FILE_NAME: &str = ".phpverify.toml";

/// Default soft byte budget of sources analyzed at once
pub const DEFAULT_MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid regex for {key}: {source}")]
    Regex {
        key: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid exclude pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Glob patterns to exclude from analysis
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub unused_var_regex: Option<String>,
    pub max_file_size: u64,
    pub ignore_trigger_error: bool,
    pub allow_disable: Option<String>,
    /// Worker count; all available cores when unset
    pub threads: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            unused_var_regex: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            ignore_trigger_error: false,
            allow_disable: None,
            threads: None,
        }
    }
}

impl Config {
    /// Load config from `.phpverify.toml` searching from the current directory upward
    pub fn load() -> Result<Option<(Config, PathBuf)>, ConfigError> {
        let cwd = std::env::current_dir().map_err(|source| ConfigError::Read {
            path: PathBuf::from("."),
            source,
        })?;
        Self::load_from(&cwd)
    }

    /// Load config searching from the given directory upward
    pub fn load_from(start_dir: &Path) -> Result<Option<(Config, PathBuf)>, ConfigError> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.is_file() {
                let config = Self::load_path(&config_path)?;
                return Ok(Some((config, config_path)));
            }
            current = dir.parent();
        }

        Ok(None)
    }

    pub fn load_path(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Check the patterns and build the walker settings
    pub fn lint_options(&self) -> Result<LintOptions, ConfigError> {
        for pattern in &self.paths.exclude {
            glob::Pattern::new(pattern).map_err(|source| ConfigError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
        }

        let compile = |key: &'static str, pattern: &Option<String>| -> Result<Option<Regex>, ConfigError> {
            pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|source| ConfigError::Regex { key, source })
        };

        Ok(LintOptions {
            unused_var_regex: compile("analysis.unused_var_regex", &self.analysis.unused_var_regex)?,
            ignore_trigger_error: self.analysis.ignore_trigger_error,
            allow_disable: compile("analysis.allow_disable", &self.analysis.allow_disable)?,
        })
    }

    pub fn threads(&self) -> usize {
        self.analysis
            .threads
            .filter(|&n| n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
    }

    /// Check if a path should be excluded based on config patterns
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        for pattern in &self.paths.exclude {
            if let Ok(glob_pattern) = glob::Pattern::new(pattern) {
                if glob_pattern.matches(&path_str) {
                    return true;
                }
                if let Some(file_name) = path.file_name() {
                    if glob_pattern.matches(&file_name.to_string_lossy()) {
                        return true;
                    }
                }
            }

            if pattern.ends_with('/') {
                let dir_pattern = pattern.trim_end_matches('/');
                if path_str.contains(&format!("/{}/", dir_pattern)) || path_str.starts_with(&format!("{}/", dir_pattern))
                {
                    return true;
                }
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_parent_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"
[paths]
exclude = ["vendor/", "*.generated.php"]

[analysis]
unused_var_regex = "^_"
max_file_size = 1024
threads = 2
"#,
        )
        .unwrap();
        let nested = temp.path().join("src").join("app");
        fs::create_dir_all(&nested).unwrap();

        let (config, path) = Config::load_from(&nested).unwrap().unwrap();
        assert_eq!(path, temp.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.paths.exclude.len(), 2);
        assert_eq!(config.analysis.max_file_size, 1024);
        assert_eq!(config.threads(), 2);
        assert!(!config.analysis.ignore_trigger_error);

        let options = config.lint_options().unwrap();
        assert!(options.is_discard_var("$_unused"));
        assert!(!options.is_discard_var("$x"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.analysis.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert!(config.threads() >= 1);
        let options = config.lint_options().unwrap();
        assert!(options.is_discard_var("$_"));
        assert!(options.allow_disable.is_none());
    }

    #[test]
    fn test_invalid_regex() {
        let config = Config::parse("[analysis]\nallow_disable = \"(\"\n").unwrap();
        let err = config.lint_options().unwrap_err();
        assert!(matches!(err, ConfigError::Regex { key: "analysis.allow_disable", .. }));
    }

    #[test]
    fn test_invalid_glob() {
        let config = Config::parse("[paths]\nexclude = [\"a[\"]\n").unwrap();
        assert!(matches!(config.lint_options(), Err(ConfigError::Glob { .. })));
    }

    #[test]
    fn test_unknown_value_type_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[analysis]\nthreads = \"many\"\n").unwrap();
        assert!(matches!(Config::load_path(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_exclusion() {
        let config = Config::parse("[paths]\nexclude = [\"vendor/\", \"*.generated.php\"]\n").unwrap();
        assert!(config.is_excluded(Path::new("project/vendor/lib/a.php")));
        assert!(config.is_excluded(Path::new("src/model.generated.php")));
        assert!(!config.is_excluded(Path::new("src/model.php")));
    }
}
