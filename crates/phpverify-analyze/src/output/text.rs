//! Human readable output
//!
//! ```text
//! ERROR   undefined: Undefined variable: $x at src/a.php:3
//!     echo $x;
//!          ^^
//! ```

use std::collections::HashMap;

use super::Formatter;
use crate::issue::{Issue, IssueCollection};

/// Formats diagnostics, reading the source of each file once to show
/// the offending line. Sources can also be supplied up front.
#[derive(Debug, Default)]
pub struct TextFormatter {
    sources: HashMap<String, String>,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, filename: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(filename.into(), source.into());
        self
    }

    fn format_issue(issue: &Issue, source: Option<&str>, output: &mut String) {
        output.push_str(&format!(
            "{:<7} {}: {} at {}:{}\n",
            issue.severity.as_str(),
            issue.check_name,
            issue.message,
            issue.filename,
            issue.line
        ));

        let Some(line) = source.and_then(|s| s.lines().nth(issue.line.saturating_sub(1))) else {
            return;
        };
        output.push_str("    ");
        output.push_str(line);
        output.push('\n');

        // keep tabs so the marker lines up with the source
        let mut padding: String = line
            .chars()
            .take(issue.start_char)
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        let short = issue.start_char.saturating_sub(padding.chars().count());
        padding.push_str(&" ".repeat(short));
        let width = issue.end_char.saturating_sub(issue.start_char).max(1);
        output.push_str("    ");
        output.push_str(&padding);
        output.push_str(&"^".repeat(width));
        output.push('\n');
    }
}

impl Formatter for TextFormatter {
    fn format(&self, issues: &IssueCollection) -> String {
        let mut read: HashMap<&str, Option<String>> = HashMap::new();
        let mut output = String::new();

        for issue in issues.issues() {
            let source = match self.sources.get(&issue.filename) {
                Some(source) => Some(source.as_str()),
                None => read
                    .entry(issue.filename.as_str())
                    .or_insert_with(|| std::fs::read_to_string(&issue.filename).ok())
                    .as_deref(),
            };
            Self::format_issue(issue, source, &mut output);
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Severity;
    use crate::output::OutputFormat;

    #[test]
    fn test_text_format_with_marker() {
        let mut issues = IssueCollection::new();
        issues.add(
            Issue::new("undefined", Severity::Error, "Undefined variable: $x", "a.php").with_position(2, 5, 7),
        );

        let formatter = TextFormatter::new().with_source("a.php", "<?php\necho $x;\n");
        let output = formatter.format(&issues);
        assert_eq!(
            output,
            "ERROR   undefined: Undefined variable: $x at a.php:2\n    echo $x;\n         ^^\n"
        );
    }

    #[test]
    fn test_marker_after_multibyte_text() {
        let mut issues = IssueCollection::new();
        issues.add(
            Issue::new("undefined", Severity::Error, "Undefined variable: $x", "a.php").with_position(2, 10, 12),
        );

        let formatter = TextFormatter::new().with_source("a.php", "<?php\n$s = 'é'; $x;\n");
        let output = formatter.format(&issues);
        assert!(output.ends_with("    $s = 'é'; $x;\n              ^^\n"), "{}", output);
    }

    #[test]
    fn test_text_format_without_source() {
        let mut issues = IssueCollection::new();
        issues.add(Issue::warning("unused", "Variable $y is unused", "/nonexistent/phpverify/b.php"));

        let output = TextFormatter::new().format(&issues);
        assert_eq!(output, "WARNING unused: Variable $y is unused at /nonexistent/phpverify/b.php:1\n");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("table"), None);
    }
}
