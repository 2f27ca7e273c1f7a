//! Class-like declarations: classes, interfaces, traits, enums

use std::collections::{BTreeSet, HashMap};

use super::function_info::{AccessLevel, ElementPosition, FunctionInfo};
use crate::types::TypeSet;

/// Kind of class-like structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Trait,
    Enum,
}

/// A property as recorded in the index
#[derive(Debug, Clone)]
pub struct PropertyInfo {
    pub pos: ElementPosition,
    pub typ: TypeSet,
    pub access: AccessLevel,
}

/// Statically known value of a constant
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// A global or class constant as recorded in the index
#[derive(Debug, Clone)]
pub struct ConstInfo {
    pub pos: ElementPosition,
    pub typ: TypeSet,
    pub access: AccessLevel,
    pub value: Option<ConstValue>,
}

/// A class-like declaration as recorded in the index
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    /// Fully qualified name as declared
    pub name: String,
    pub pos: ElementPosition,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub is_final: bool,
    /// Synthetic struct-like class describing an array shape
    pub is_shape: bool,
    pub parent: Option<String>,
    /// `extends` list of an interface
    pub parent_interfaces: Vec<String>,
    pub traits: BTreeSet<String>,
    /// Directly implemented interfaces
    pub interfaces: BTreeSet<String>,
    pub mixins: Vec<String>,
    /// Methods keyed by lowercase name
    pub methods: HashMap<String, FunctionInfo>,
    /// Instance properties keyed by bare name, static ones with a leading `$`
    pub properties: HashMap<String, PropertyInfo>,
    pub constants: HashMap<String, ConstInfo>,
}

impl ClassInfo {
    /// Create a new class info
    pub fn new(name: impl Into<String>, pos: ElementPosition) -> Self {
        Self {
            name: name.into(),
            pos,
            ..Self::default()
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_trait(&self) -> bool {
        self.kind == ClassKind::Trait
    }

    /// Get a method by name (case-insensitive)
    pub fn get_method(&self, name: &str) -> Option<&FunctionInfo> {
        self.methods.get(&name.to_ascii_lowercase())
    }

    pub fn add_method(&mut self, info: FunctionInfo) {
        self.methods.insert(info.name.to_ascii_lowercase(), info);
    }

    /// Get a method for in-place update (case-insensitive)
    pub fn get_method_mut(&mut self, name: &str) -> Option<&mut FunctionInfo> {
        self.methods.get_mut(&name.to_ascii_lowercase())
    }

    pub fn get_property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    pub fn get_constant(&self, name: &str) -> Option<&ConstInfo> {
        self.constants.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_lookup_is_case_insensitive() {
        let mut class = ClassInfo::new("\\Foo", ElementPosition::default());
        class.add_method(FunctionInfo::new("doThing", ElementPosition::default()));
        assert!(class.get_method("DOTHING").is_some());
        assert_eq!(class.get_method("dothing").map(|m| m.name.as_str()), Some("doThing"));
    }

    #[test]
    fn test_properties_are_case_sensitive() {
        let mut class = ClassInfo::new("\\Foo", ElementPosition::default());
        class.properties.insert(
            "bar".to_string(),
            PropertyInfo {
                pos: ElementPosition::default(),
                typ: TypeSet::concrete("int"),
                access: AccessLevel::Public,
            },
        );
        assert!(class.get_property("bar").is_some());
        assert!(class.get_property("Bar").is_none());
    }
}
