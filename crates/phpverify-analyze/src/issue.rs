//! Diagnostic records produced by the walkers

use serde::Serialize;

/// Severity level for issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed
    Error,
    /// Warning - should be reviewed
    Warning,
    Notice,
    Information,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Information => "INFO",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issue found during analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    /// The check that found this issue (e.g., "undefined")
    pub check_name: String,
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    pub filename: String,
    /// Line number (1-based)
    pub line: usize,
    /// First character within the line (0-based)
    pub start_char: usize,
    /// One past the last character within the line
    pub end_char: usize,
}

impl Issue {
    /// Create a new issue located at the start of `filename`
    pub fn new(
        check_name: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            check_name: check_name.into(),
            severity,
            message: message.into(),
            filename: filename.into(),
            line: 1,
            start_char: 0,
            end_char: 0,
        }
    }

    pub fn error(check_name: impl Into<String>, message: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::new(check_name, Severity::Error, message, filename)
    }

    pub fn warning(check_name: impl Into<String>, message: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::new(check_name, Severity::Warning, message, filename)
    }

    /// Set the line and character range
    pub fn with_position(mut self, line: usize, start_char: usize, end_char: usize) -> Self {
        self.line = line;
        self.start_char = start_char;
        self.end_char = end_char.max(start_char);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Collection of issues from analysis
#[derive(Debug, Default, Serialize)]
pub struct IssueCollection {
    #[serde(rename = "diagnostics")]
    issues: Vec<Issue>,
}

impl IssueCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = Issue>) {
        self.issues.extend(issues);
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Sort issues by file, then line, then column. Ties keep walk order.
    pub fn sort(&mut self) {
        self.issues.sort_by(|a, b| {
            a.filename
                .cmp(&b.filename)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.start_char.cmp(&b.start_char))
        });
    }
}
