//! Type model for PHP static analysis
//!
//! A [`TypeValue`] is either a concrete type name or a deferred computation
//! ("the return type of `f`", "the element type of `$a`") that the solver
//! expands later. A [`TypeSet`] is the union type of an expression.

pub mod hint;
pub mod predicates;
pub mod set;
pub mod value;

pub use set::TypeSet;
pub use value::TypeValue;

/// Placeholder for an array literal with no elements
pub const EMPTY_ARRAY: &str = "empty_array";

/// Type given to variables whose use was reported as undefined
pub const UNDEFINED: &str = "undefined";
