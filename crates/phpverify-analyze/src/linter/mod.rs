//! Walkers producing symbols and diagnostics
//!
//! [`RootWalker`] is the declaration pass over one file: it registers
//! functions, classes and constants into a [`FileMeta`](crate::symbols::FileMeta)
//! and hands every body to a [`BlockWalker`].

pub mod block;
pub mod exit_flags;
pub mod params;
pub mod report;
pub mod root;

pub use block::{BlockContext, BlockWalker, BodySummary, PropertyAssignment, WalkEnv};
pub use exit_flags::ExitFlags;
pub use report::Reporter;
pub use root::{FileResult, RootWalker};

use regex::Regex;

/// Variables that are always defined and never unused
pub const SUPERGLOBALS: &[&str] = &[
    "$GLOBALS",
    "$_SERVER",
    "$_GET",
    "$_POST",
    "$_FILES",
    "$_COOKIE",
    "$_SESSION",
    "$_REQUEST",
    "$_ENV",
    "$argv",
    "$argc",
    "$http_response_header",
];

pub fn is_superglobal(name: &str) -> bool {
    SUPERGLOBALS.contains(&name)
}

/// Comment that switches off reporting for a whole file
pub const DISABLE_MARKER: &str = "@linter disable";

/// Settings the walkers read
#[derive(Debug, Clone, Default)]
pub struct LintOptions {
    /// Matches names (without `$`) of deliberately unused variables; `_` when unset
    pub unused_var_regex: Option<Regex>,
    /// Do not treat `trigger_error(.., E_USER_ERROR)` as an exit
    pub ignore_trigger_error: bool,
    /// Paths in which the disable marker is honored
    pub allow_disable: Option<Regex>,
}

impl LintOptions {
    pub fn is_discard_var(&self, name: &str) -> bool {
        let bare = name.trim_start_matches('$');
        match &self.unused_var_regex {
            Some(regex) => regex.is_match(bare),
            None => bare == "_",
        }
    }

    pub fn allows_disable(&self, path: &str) -> bool {
        self.allow_disable
            .as_ref()
            .map(|regex| regex.is_match(path))
            .unwrap_or(false)
    }
}
