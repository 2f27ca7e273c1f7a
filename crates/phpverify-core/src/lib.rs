//! phpverify-core: syntax boundary for the phpverify analyzer
//!
//! This crate provides:
//! - `parse_source()`: parse PHP with mago and lower it into an owned IR
//! - `ir`: the owned statement and expression tree the analyzer walks
//! - `Visitor`: trait for traversing the IR
//! - `LineIndex`: offset to line/column mapping for diagnostics

pub mod ir;
mod lower;
mod parse;
pub mod visitor;

pub use lower::{literal_from_text, scan_variables};
pub use parse::{parse_source, LineIndex, ParseError, ParsedFile};
pub use visitor::{walk_expr, walk_stmt, Visitor};
