//! Variables of one lexical region
//!
//! Branches are explored on clones. Cloning copies the map; the type sets
//! inside are shared until one side appends to them.

use std::collections::HashMap;

use crate::types::TypeSet;

/// What the scope knows about a single variable
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub types: TypeSet,
    /// Defined on every path reaching the current point
    pub always_defined: bool,
    /// Pinned by an explicit annotation: assignments append instead of replacing
    pub no_replace: bool,
    /// Introduced by the analyzer itself (narrowing, isset markers)
    pub implicit: bool,
}

impl VarInfo {
    fn new(types: TypeSet, always_defined: bool) -> Self {
        Self {
            types,
            always_defined,
            no_replace: false,
            implicit: false,
        }
    }
}

/// Variables of one lexical region, keyed by name including `$`
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, VarInfo>,
    in_instance_method: bool,
    in_closure: bool,
}

impl Scope {
    /// Create a new empty scope
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_instance_method(&self) -> bool {
        self.in_instance_method
    }

    pub fn set_in_instance_method(&mut self, value: bool) {
        self.in_instance_method = value;
    }

    pub fn in_closure(&self) -> bool {
        self.in_closure
    }

    pub fn set_in_closure(&mut self, value: bool) {
        self.in_closure = value;
    }

    /// Add a variable or widen an existing one.
    ///
    /// Types are unioned; `always_defined` only ever turns on.
    pub fn add_var(&mut self, name: &str, types: TypeSet, always_defined: bool) {
        match self.vars.get_mut(name) {
            Some(var) => {
                var.always_defined |= always_defined;
                var.types = var.types.union(&types);
            }
            None => {
                self.vars
                    .insert(name.to_string(), VarInfo::new(types, always_defined));
            }
        }
    }

    /// Variable introduced by narrowing or an isset guard
    pub fn add_implicit_var(&mut self, name: &str, types: TypeSet) {
        self.add_var(name, types, true);
        if let Some(var) = self.vars.get_mut(name) {
            var.implicit = true;
        }
    }

    /// Variable whose type is pinned; later assignments only widen it
    pub fn add_pinned_var(&mut self, name: &str, types: TypeSet) {
        self.add_var(name, types, true);
        if let Some(var) = self.vars.get_mut(name) {
            var.no_replace = true;
        }
    }

    /// Assignment: the old type is dropped unless the variable is pinned
    pub fn replace_var(&mut self, name: &str, types: TypeSet, always_defined: bool) {
        if let Some(var) = self.vars.get_mut(name) {
            if var.no_replace {
                var.types = var.types.union(&types);
                return;
            }
        }
        self.vars
            .insert(name.to_string(), VarInfo::new(types, always_defined));
    }

    /// Narrowed type that holds until the guarded region ends
    pub fn replace_implicit_var(&mut self, name: &str, types: TypeSet) {
        let mut info = VarInfo::new(types, true);
        info.implicit = true;
        self.vars.insert(name.to_string(), info);
    }

    /// Put back a previously saved variable as is
    pub fn restore_var(&mut self, name: &str, info: VarInfo) {
        self.vars.insert(name.to_string(), info);
    }

    pub fn get_var_mut(&mut self, name: &str) -> Option<&mut VarInfo> {
        self.vars.get_mut(name)
    }

    pub fn del_var(&mut self, name: &str) {
        self.vars.remove(name);
    }

    /// Present and defined on every path
    pub fn have_var(&self, name: &str) -> bool {
        self.vars.get(name).map(|v| v.always_defined).unwrap_or(false)
    }

    /// Present on at least one path
    pub fn maybe_have_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn have_implicit_var(&self, name: &str) -> bool {
        self.vars.get(name).map(|v| v.implicit).unwrap_or(false)
    }

    pub fn get_var(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }

    pub fn get_var_type(&self, name: &str) -> Option<&TypeSet> {
        self.vars.get(name).map(|v| &v.types)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarInfo)> {
        let mut entries: Vec<_> = self.vars.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter()
    }

    /// Names sorted, for deterministic reporting
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_var_unions_types() {
        let mut scope = Scope::new();
        scope.add_var("$a", TypeSet::concrete("int"), false);
        scope.add_var("$a", TypeSet::concrete("string"), true);
        let var = scope.get_var("$a").unwrap();
        assert_eq!(var.types.to_string(), "int|string");
        assert!(var.always_defined);
    }

    #[test]
    fn test_replace_var() {
        let mut scope = Scope::new();
        scope.add_var("$a", TypeSet::concrete("int"), true);
        scope.replace_var("$a", TypeSet::concrete("string"), true);
        assert_eq!(scope.get_var_type("$a").unwrap().to_string(), "string");
    }

    #[test]
    fn test_pinned_var_widens() {
        let mut scope = Scope::new();
        scope.add_pinned_var("$a", TypeSet::concrete("\\Foo"));
        scope.replace_var("$a", TypeSet::concrete("null"), true);
        assert_eq!(scope.get_var_type("$a").unwrap().to_string(), "\\Foo|null");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut parent = Scope::new();
        parent.add_var("$a", TypeSet::concrete("int"), true);
        let mut child = parent.clone();
        child.add_var("$a", TypeSet::concrete("float"), true);
        child.add_var("$b", TypeSet::concrete("int"), true);
        assert_eq!(parent.get_var_type("$a").unwrap().to_string(), "int");
        assert!(!parent.maybe_have_var("$b"));
    }

    #[test]
    fn test_definedness_queries() {
        let mut scope = Scope::new();
        scope.add_var("$maybe", TypeSet::concrete("int"), false);
        scope.add_implicit_var("$narrowed", TypeSet::concrete("\\A"));
        assert!(scope.maybe_have_var("$maybe"));
        assert!(!scope.have_var("$maybe"));
        assert!(scope.have_implicit_var("$narrowed"));
        scope.del_var("$narrowed");
        assert!(!scope.maybe_have_var("$narrowed"));
    }
}
