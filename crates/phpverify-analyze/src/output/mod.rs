//! Output formatters for analysis results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::issue::IssueCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One block per diagnostic with the offending line underlined
    #[default]
    Text,
    /// `{"diagnostics": [...]}`
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

pub trait Formatter {
    fn format(&self, issues: &IssueCollection) -> String;
}

pub fn format_issues(issues: &IssueCollection, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => TextFormatter::new().format(issues),
        OutputFormat::Json => JsonFormatter.format(issues),
    }
}
