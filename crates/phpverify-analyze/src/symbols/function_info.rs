//! Function and method declarations

use crate::linter::ExitFlags;
use crate::types::TypeSet;

/// Access level of a class member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessLevel {
    #[default]
    Public,
    Protected,
    Private,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Protected => "protected",
            AccessLevel::Private => "private",
        }
    }
}

impl From<phpverify_core::ir::Visibility> for AccessLevel {
    fn from(visibility: phpverify_core::ir::Visibility) -> Self {
        use phpverify_core::ir::Visibility;
        match visibility {
            Visibility::Public => AccessLevel::Public,
            Visibility::Protected => AccessLevel::Protected,
            Visibility::Private => AccessLevel::Private,
        }
    }
}

/// Where a symbol is declared
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementPosition {
    pub filename: String,
    /// 1-based line of the declaration start
    pub line: usize,
    /// Byte range of the whole declaration
    pub start: u32,
    pub end: u32,
}

impl ElementPosition {
    pub fn new(filename: impl Into<String>, line: usize, start: u32, end: u32) -> Self {
        Self {
            filename: filename.into(),
            line,
            start,
            end,
        }
    }

    /// Size of the declaration body; larger declarations win over stubs
    pub fn length(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FuncParam {
    /// Name including `$`
    pub name: String,
    pub types: TypeSet,
    pub by_ref: bool,
    pub variadic: bool,
}

impl FuncParam {
    /// Create a new parameter of unknown type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: TypeSet::new(),
            by_ref: false,
            variadic: false,
        }
    }

    pub fn with_types(mut self, types: TypeSet) -> Self {
        self.types = types;
        self
    }
}

/// A function or method as recorded in the index
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Fully qualified for functions, bare for methods
    pub name: String,
    pub pos: ElementPosition,
    pub params: Vec<FuncParam>,
    /// Number of parameters that must be passed
    pub min_params: usize,
    /// Return type
    pub typ: TypeSet,
    pub access: AccessLevel,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_pure: bool,
    /// How every path through the body ends; non-empty only when no path returns
    pub exit_flags: ExitFlags,
}

impl FunctionInfo {
    /// Create a new function info with no parameters and an unknown return type
    pub fn new(name: impl Into<String>, pos: ElementPosition) -> Self {
        Self {
            name: name.into(),
            pos,
            params: Vec::new(),
            min_params: 0,
            typ: TypeSet::new(),
            access: AccessLevel::Public,
            is_static: false,
            is_abstract: false,
            is_final: false,
            is_pure: false,
            exit_flags: ExitFlags::empty(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, param: FuncParam) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return type
    pub fn with_return(mut self, typ: TypeSet) -> Self {
        self.typ = typ;
        self
    }

    pub fn with_min_params(mut self, min_params: usize) -> Self {
        self.min_params = min_params;
        self
    }

    /// Calling it never returns normally
    pub fn exits_abnormally(&self) -> bool {
        !self.exit_flags.is_empty()
    }
}
