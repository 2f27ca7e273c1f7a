//! Scope tracking for static analysis
//!
//! [`Scope`] maps the variables of one lexical region to their types and
//! definedness. [`ClassParseState`] is the naming context (namespace, imports,
//! enclosing class and function) threaded through the walk.

pub mod parse_state;
pub mod scope;

pub use parse_state::ClassParseState;
pub use scope::{Scope, VarInfo};
