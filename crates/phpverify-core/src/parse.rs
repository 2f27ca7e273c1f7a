//! Parsing entry point: source text in, owned IR out

use bumpalo::Bump;
use mago_database::file::FileId;
use mago_span::HasSpan;
use thiserror::Error;

use crate::ir::File;
use crate::lower::Lowerer;

/// Errors that stop a file from being lowered
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: u32, message: String },

    #[error("parser panicked while reading the file")]
    Panicked,
}

impl ParseError {
    /// Byte offset of the problem, when the parser reported one
    pub fn offset(&self) -> u32 {
        match self {
            ParseError::Syntax { offset, .. } => *offset,
            ParseError::Panicked => 0,
        }
    }
}

/// A lowered file together with the syntax errors met on the way
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file: File,
    pub errors: Vec<ParseError>,
}

/// Parse PHP source and lower it into the owned IR.
///
/// Syntax errors are collected and the recovered tree is still lowered.
/// Only a parser panic fails the whole file.
pub fn parse_source(name: &str, source: &str) -> Result<ParsedFile, ParseError> {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let arena = Bump::new();
        let file_id = FileId::new(name);
        let program = mago_syntax::parser::parse_file_content(&arena, file_id, source);

        let errors = program
            .errors
            .iter()
            .map(|error| ParseError::Syntax {
                offset: error.span().start.offset,
                message: error.to_string(),
            })
            .collect();

        let lowerer = Lowerer::new(source);
        ParsedFile {
            file: lowerer.lower_program(program),
            errors,
        }
    }));

    result.map_err(|_| ParseError::Panicked)
}

/// Maps byte offsets to 1-based line numbers
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Create a new line index over `source`
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based line containing `offset`
    pub fn line(&self, offset: u32) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }

    /// 1-based column of `offset` within its line, counted in characters
    pub fn column(&self, source: &str, offset: u32) -> usize {
        let line = self.line(offset);
        let start = self.line_starts[line - 1] as usize;
        let end = (offset as usize).min(source.len());
        let chars = match source.get(start..end) {
            Some(text) => text.chars().count(),
            None => end.saturating_sub(start),
        };
        chars + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::StmtKind;

    #[test]
    fn test_line_index() {
        let source = "<?php\n$a = 1;\n\n$b = 2;\n";
        let index = LineIndex::new(source);
        assert_eq!(index.line(0), 1);
        assert_eq!(index.line(6), 2);
        assert_eq!(index.line(13), 2);
        assert_eq!(index.line(15), 4);
        assert_eq!(index.column(source, 8), 3);
    }

    #[test]
    fn test_column_counts_characters() {
        let source = "<?php\n$s = 'héllo'; $x;\n";
        let index = LineIndex::new(source);
        let offset = source.find("$x").unwrap() as u32;
        assert_eq!(index.column(source, offset), 15);
    }

    #[test]
    fn test_parse_simple_file() {
        let parsed = parse_source("a.php", "<?php\nfunction a() { return 1; }\n").unwrap();
        assert!(parsed.errors.is_empty());
        let functions: Vec<_> = parsed
            .file
            .statements
            .iter()
            .filter(|s| matches!(s.kind, StmtKind::Function(_)))
            .collect();
        assert_eq!(functions.len(), 1);
    }

    #[test]
    fn test_parse_error_reported() {
        let parsed = parse_source("bad.php", "<?php\nfunction ( {\n").unwrap();
        assert!(!parsed.errors.is_empty());
    }
}
