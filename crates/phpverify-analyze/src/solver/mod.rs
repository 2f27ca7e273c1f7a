//! Type solving: hierarchy lookups, deferred type resolution and
//! expression typing

pub mod exprtype;
pub mod oop;
pub mod resolver;

pub use exprtype::{class_ref_name, expr_type, expr_type_local};
pub use oop::{extends, find_constant, find_method, find_property, implements, instance_of, FoundMethod, FoundProperty};
pub use resolver::{resolve, resolve_type_set, ResolverMap};
