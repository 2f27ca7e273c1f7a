//! Naming context of the code being walked

use std::collections::HashMap;

/// Namespace, imports and the enclosing class/function.
///
/// The root walker builds one per namespace and derives class and function
/// contexts from it with the `with_*` methods, so leaving a declaration is
/// just dropping the derived value.
#[derive(Debug, Clone, Default)]
pub struct ClassParseState {
    /// Current namespace with a leading `\`, empty for the global namespace
    pub namespace: String,
    /// Class imports: lowercase alias -> fully qualified name
    pub uses: HashMap<String, String>,
    /// Function imports: lowercase alias -> fully qualified name
    pub function_uses: HashMap<String, String>,
    /// Constant imports: alias -> fully qualified name
    pub const_uses: HashMap<String, String>,
    /// Fully qualified name of the enclosing class-like, empty outside one
    pub current_class: String,
    pub current_parent_class: String,
    /// Name of the enclosing function or method, empty at top level
    pub current_function: String,
    pub is_trait: bool,
}

impl ClassParseState {
    /// Create a new state for the global namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a fresh namespace; imports do not carry over
    pub fn for_namespace(name: Option<&str>) -> Self {
        let namespace = match name {
            Some(name) if !name.is_empty() => format!("\\{}", name.trim_start_matches('\\')),
            _ => String::new(),
        };
        Self {
            namespace,
            ..Self::default()
        }
    }

    /// Copy entering the class-like `class`
    pub fn with_class(&self, class: &str, parent: &str, is_trait: bool) -> Self {
        let mut state = self.clone();
        state.current_class = class.to_string();
        state.current_parent_class = parent.to_string();
        state.is_trait = is_trait;
        state
    }

    /// Copy entering the function or method `function`
    pub fn with_function(&self, function: &str) -> Self {
        let mut state = self.clone();
        state.current_function = function.to_string();
        state
    }

    /// Register `use Name [as Alias];`
    pub fn add_use(&mut self, alias: &str, fqn: &str) {
        self.uses.insert(alias.to_ascii_lowercase(), absolute(fqn));
    }

    pub fn add_function_use(&mut self, alias: &str, fqn: &str) {
        self.function_uses
            .insert(alias.to_ascii_lowercase(), absolute(fqn));
    }

    pub fn add_const_use(&mut self, alias: &str, fqn: &str) {
        self.const_uses.insert(alias.to_string(), absolute(fqn));
    }

    /// Fully qualified class name for `name` as written in the source
    pub fn resolve_class_name(&self, name: &str) -> String {
        if name.starts_with('\\') {
            return name.to_string();
        }
        if let Some(rest) = strip_namespace_keyword(name) {
            return self.in_namespace(rest);
        }

        let (first, rest) = match name.find('\\') {
            Some(pos) => (&name[..pos], &name[pos..]),
            None => (name, ""),
        };
        if let Some(fqn) = self.uses.get(&first.to_ascii_lowercase()) {
            return format!("{}{}", fqn, rest);
        }
        self.in_namespace(name)
    }

    /// Candidate names for a function call: the namespaced name and, for an
    /// unqualified name inside a namespace, the global fallback.
    pub fn resolve_function_name(&self, name: &str) -> (String, Option<String>) {
        if name.starts_with('\\') {
            return (name.to_string(), None);
        }
        if !name.contains('\\') {
            if let Some(fqn) = self.function_uses.get(&name.to_ascii_lowercase()) {
                return (fqn.clone(), None);
            }
            if self.namespace.is_empty() {
                return (format!("\\{}", name), None);
            }
            return (self.in_namespace(name), Some(format!("\\{}", name)));
        }
        (self.resolve_class_name(name), None)
    }

    /// Candidate names for a constant, like [`Self::resolve_function_name`]
    pub fn resolve_constant_name(&self, name: &str) -> (String, Option<String>) {
        if name.starts_with('\\') {
            return (name.to_string(), None);
        }
        if !name.contains('\\') {
            if let Some(fqn) = self.const_uses.get(name) {
                return (fqn.clone(), None);
            }
            if self.namespace.is_empty() {
                return (format!("\\{}", name), None);
            }
            return (self.in_namespace(name), Some(format!("\\{}", name)));
        }
        (self.resolve_class_name(name), None)
    }

    /// `name` declared in the current namespace
    pub fn in_namespace(&self, name: &str) -> String {
        format!("{}\\{}", self.namespace, name)
    }
}

fn absolute(name: &str) -> String {
    format!("\\{}", name.trim_start_matches('\\'))
}

fn strip_namespace_keyword(name: &str) -> Option<&str> {
    let prefix = name.get(..10)?;
    if prefix.eq_ignore_ascii_case("namespace\\") {
        name.get(10..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_class_name() {
        let mut state = ClassParseState::for_namespace(Some("App\\Models"));
        state.add_use("Illuminate\\Support\\Collection", "Illuminate\\Support\\Collection");
        state.add_use("Collection", "Illuminate\\Support\\Collection");
        state.add_use("Sub", "Vendor\\Sub");

        assert_eq!(state.resolve_class_name("User"), "\\App\\Models\\User");
        assert_eq!(
            state.resolve_class_name("collection"),
            "\\Illuminate\\Support\\Collection"
        );
        assert_eq!(state.resolve_class_name("Sub\\Thing"), "\\Vendor\\Sub\\Thing");
        assert_eq!(state.resolve_class_name("\\DateTime"), "\\DateTime");
        assert_eq!(state.resolve_class_name("namespace\\X"), "\\App\\Models\\X");
    }

    #[test]
    fn test_global_namespace() {
        let state = ClassParseState::new();
        assert_eq!(state.resolve_class_name("Foo"), "\\Foo");
        assert_eq!(state.resolve_function_name("strlen"), ("\\strlen".to_string(), None));
    }

    #[test]
    fn test_function_fallback() {
        let mut state = ClassParseState::for_namespace(Some("App"));
        assert_eq!(
            state.resolve_function_name("helper"),
            ("\\App\\helper".to_string(), Some("\\helper".to_string()))
        );
        state.add_function_use("h", "Lib\\helper");
        assert_eq!(state.resolve_function_name("H"), ("\\Lib\\helper".to_string(), None));
    }

    #[test]
    fn test_with_class_restores_on_drop() {
        let state = ClassParseState::for_namespace(Some("App"));
        {
            let inner = state.with_class("\\App\\A", "", false).with_function("run");
            assert_eq!(inner.current_class, "\\App\\A");
            assert_eq!(inner.current_function, "run");
        }
        assert!(state.current_class.is_empty());
    }
}
