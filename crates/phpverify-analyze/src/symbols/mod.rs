//! Symbol index for cross-file analysis
//!
//! Classes, traits, functions and constants collected from every file,
//! partitioned by the file that declared them.

mod builtins;
pub mod class_info;
pub mod function_info;
pub mod index;

pub use class_info::{ClassInfo, ClassKind, ConstInfo, ConstValue, PropertyInfo};
pub use function_info::{AccessLevel, ElementPosition, FuncParam, FunctionInfo};
pub use index::{symbol_key, FileMeta, IndexError, IndexStats, SymbolIndex, BUILTIN_FILE};
