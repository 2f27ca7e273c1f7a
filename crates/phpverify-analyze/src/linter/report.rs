//! Per-file diagnostic sink

use phpverify_core::ir::Span;
use phpverify_core::LineIndex;

use crate::issue::{Issue, Severity};

/// Collects the diagnostics of one file in walk order.
///
/// A disabled reporter (first pass, or a file that opted out) drops
/// everything it is given.
#[derive(Debug)]
pub struct Reporter {
    filename: String,
    source: String,
    lines: LineIndex,
    line_lengths: Vec<usize>,
    enabled: bool,
    issues: Vec<Issue>,
}

impl Reporter {
    pub fn new(filename: impl Into<String>, source: &str, enabled: bool) -> Self {
        Self {
            filename: filename.into(),
            source: source.to_string(),
            lines: LineIndex::new(source),
            line_lengths: source
                .split('\n')
                .map(|l| l.trim_end_matches('\r').chars().count())
                .collect(),
            enabled,
            issues: Vec::new(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// 1-based line of a byte offset
    pub fn line(&self, offset: u32) -> usize {
        self.lines.line(offset)
    }

    pub fn report(&mut self, span: Span, severity: Severity, check_name: &str, message: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let line = self.lines.line(span.start);
        let start_char = self.lines.column(&self.source, span.start) - 1;
        let line_len = self.line_lengths.get(line - 1).copied().unwrap_or(start_char);
        let end_char = if self.lines.line(span.end) == line {
            self.lines.column(&self.source, span.end) - 1
        } else {
            line_len
        };
        self.issues.push(
            Issue::new(check_name, severity, message, self.filename.clone()).with_position(line, start_char, end_char),
        );
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}
