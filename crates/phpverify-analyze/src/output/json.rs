//! JSON output format

use super::Formatter;
use crate::issue::IssueCollection;

pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, issues: &IssueCollection) -> String {
        serde_json::to_string_pretty(issues).unwrap_or_else(|_| "{}".to_string())
    }
}
