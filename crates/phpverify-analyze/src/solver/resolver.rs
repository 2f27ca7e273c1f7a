//! Expansion of deferred type values into concrete type names
//!
//! Resolution is memoized per top-level call. A value that is being resolved
//! is recorded as empty first, so re-entering it (mutually recursive return
//! types, self-referencing properties) contributes nothing instead of
//! recursing forever.

use std::collections::{BTreeSet, HashMap};

use super::oop::{find_constant, find_method, find_property, implements};
use crate::symbols::SymbolIndex;
use crate::types::{predicates, TypeSet, TypeValue, EMPTY_ARRAY};

/// Memo key: the value and the class `static` binds to while resolving it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitKey {
    value: TypeValue,
    class: String,
}

/// Results of one top-level resolution; in-progress entries are empty
pub type ResolverMap = HashMap<VisitKey, BTreeSet<String>>;

/// Resolve every value of `set` in the context of `class`.
///
/// `class` is the class `static` binds to; empty outside classes. The result
/// only holds concrete values and may be empty.
pub fn resolve_type_set(
    index: &SymbolIndex,
    class: &str,
    set: &TypeSet,
    visited: &mut ResolverMap,
) -> TypeSet {
    let mut resolver = Resolver { index, visited };
    resolver
        .resolve_types(class, set)
        .into_iter()
        .map(TypeValue::Concrete)
        .collect::<TypeSet>()
        .immutable()
}

/// Resolve with a fresh memo
pub fn resolve(index: &SymbolIndex, class: &str, set: &TypeSet) -> TypeSet {
    resolve_type_set(index, class, set, &mut ResolverMap::new())
}

struct Resolver<'a> {
    index: &'a SymbolIndex,
    visited: &'a mut ResolverMap,
}

impl<'a> Resolver<'a> {
    fn resolve_types(&mut self, class: &str, set: &TypeSet) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        for value in set.iter() {
            result.extend(self.resolve_type(class, value));
        }

        if result.remove(EMPTY_ARRAY) && !result.iter().any(|t| predicates::is_array(t)) {
            result.insert("mixed[]".to_string());
        }
        result
    }

    fn resolve_type(&mut self, class: &str, value: &TypeValue) -> BTreeSet<String> {
        let mut result = self.resolve_without_static(class, value);
        if result.remove("static") && !class.is_empty() {
            result.insert(class.to_string());
        }
        result
    }

    fn resolve_without_static(&mut self, class: &str, value: &TypeValue) -> BTreeSet<String> {
        if let TypeValue::Concrete(name) = value {
            let mut single = BTreeSet::new();
            single.insert(name.clone());
            return single;
        }

        let key = VisitKey {
            value: value.clone(),
            class: class.to_string(),
        };
        if let Some(known) = self.visited.get(&key) {
            return known.clone();
        }
        self.visited.insert(key.clone(), BTreeSet::new());

        let result = self.expand(class, value);
        self.visited.insert(key, result.clone());
        result
    }

    fn expand(&mut self, class: &str, value: &TypeValue) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        match value {
            TypeValue::Concrete(name) => {
                result.insert(name.clone());
            }
            TypeValue::Global(name) => {
                if let Some(types) = self.index.get_global_var(&format!("${}", name)) {
                    result = self.resolve_types(class, &types);
                }
            }
            TypeValue::Constant(name) => {
                let found = self
                    .index
                    .get_constant(name)
                    .or_else(|| root_fallback(name).and_then(|n| self.index.get_constant(&n)));
                if let Some(info) = found {
                    result = self.resolve_types(class, &info.typ);
                }
            }
            TypeValue::ArrayOf(elem) => {
                for name in self.resolve_type(class, elem) {
                    result.insert(format!("{}[]", name));
                }
            }
            TypeValue::ElementOf(array) => {
                for name in self.resolve_type(class, array) {
                    self.solve_elem_of(&name, &mut result);
                }
            }
            TypeValue::ElementOfKey { array, key } => {
                for name in self.resolve_type(class, array) {
                    if predicates::is_shape(&name) {
                        self.solve_elem_of_shape(class, &name, key, &mut result);
                    } else {
                        self.solve_elem_of(&name, &mut result);
                    }
                }
            }
            TypeValue::FunctionCall(name) => {
                let found = self
                    .index
                    .get_function(name)
                    .or_else(|| root_fallback(name).and_then(|n| self.index.get_function(&n)));
                if let Some(info) = found {
                    result = self.resolve_types(class, &info.typ);
                }
            }
            TypeValue::InstanceMethodCall { object, method } => {
                let instances = self.resolve_type(class, object);
                self.collect_method_types(&instances, method, &mut result);
                if result.is_empty() {
                    self.collect_method_types(&instances, "__call", &mut result);
                }
            }
            TypeValue::InstanceProperty { object, property } => {
                for class_name in self.resolve_type(class, object) {
                    if let Some(found) = find_property(self.index, &class_name, property) {
                        result.extend(self.resolve_types(class, &found.info.typ));
                    } else if let Some(magic) = find_method(self.index, &class_name, "__get") {
                        result.extend(self.resolve_types(&class_name, &magic.info.typ));
                    }
                }
            }
            TypeValue::StaticMethodCall {
                class: class_name,
                method,
            } => {
                if let Some(found) = find_method(self.index, class_name, method) {
                    result = self.resolve_types(class_name, &found.info.typ);
                    if let Some(trait_name) = &found.trait_name {
                        replace_trait_name(&mut result, trait_name, &found.class_name);
                    }
                } else if let Some(magic) = find_method(self.index, class_name, "__callStatic") {
                    result = self.resolve_types(class_name, &magic.info.typ);
                }
            }
            TypeValue::StaticProperty {
                class: class_name,
                property,
            } => {
                if let Some(found) = find_property(self.index, class_name, property) {
                    result = self.resolve_types(class_name, &found.info.typ);
                    if let Some(trait_name) = &found.trait_name {
                        replace_trait_name(&mut result, trait_name, &found.class_name);
                    }
                }
            }
            TypeValue::ClassConstant {
                class: class_name,
                constant,
            } => {
                if let Some((info, _)) = find_constant(self.index, class_name, constant) {
                    result = self.resolve_types(class, &info.typ);
                }
            }
            TypeValue::BaseMethodParam {
                index,
                class: class_name,
                method,
            } => {
                result = self.solve_base_method_param(class, *index, class_name, method);
            }
        }
        result
    }

    fn collect_method_types(&mut self, instances: &BTreeSet<String>, method: &str, out: &mut BTreeSet<String>) {
        for class_name in instances {
            if let Some(found) = find_method(self.index, class_name, method) {
                let mut types = self.resolve_types(class_name, &found.info.typ);
                if let Some(trait_name) = &found.trait_name {
                    replace_trait_name(&mut types, trait_name, &found.class_name);
                }
                out.extend(types);
            }
        }
    }

    /// Parameter type borrowed from the first interface declaring `method`
    fn solve_base_method_param(&mut self, class: &str, index: usize, class_name: &str, method: &str) -> BTreeSet<String> {
        let info = match self.index.get_class(class_name) {
            Some(info) => info,
            None => return BTreeSet::new(),
        };
        for iface_name in &info.interfaces {
            let iface = match self.index.get_class(iface_name) {
                Some(iface) => iface,
                None => continue,
            };
            if let Some(func) = iface.get_method(method) {
                if let Some(param) = func.params.get(index) {
                    return self.resolve_types(class, &param.types);
                }
            }
        }
        BTreeSet::new()
    }

    fn solve_elem_of_shape(&mut self, class: &str, shape: &str, key: &str, out: &mut BTreeSet<String>) {
        let info = match self.index.get_class(shape) {
            Some(info) => info,
            None => return,
        };
        if let Some(prop) = info.get_property(key) {
            out.extend(self.resolve_types(class, &prop.typ));
        }
    }

    /// Element type of one concrete container type
    fn solve_elem_of(&mut self, name: &str, out: &mut BTreeSet<String>) {
        if predicates::is_array(name) {
            out.insert(predicates::array_element_type(name).to_string());
        } else if name == "mixed" || name == "string" {
            out.insert(name.to_string());
        } else if predicates::is_class(name) {
            let accessor = if implements(self.index, name, "\\ArrayAccess") || is_same(name, "\\ArrayAccess") {
                Some("offsetGet")
            } else if implements(self.index, name, "\\Traversable") || is_same(name, "\\Iterator") {
                Some("current")
            } else {
                None
            };
            if let Some(accessor) = accessor {
                if let Some(found) = find_method(self.index, name, accessor) {
                    out.extend(self.resolve_types(name, &found.info.typ));
                }
            }
        }
    }
}

fn is_same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// `\ns\f` → `\f`, for names that live in a namespace
fn root_fallback(name: &str) -> Option<String> {
    if name.matches('\\').count() > 1 {
        name.rfind('\\').map(|pos| name[pos..].to_string())
    } else {
        None
    }
}

fn replace_trait_name(result: &mut BTreeSet<String>, trait_name: &str, class_name: &str) {
    if result.remove(trait_name) {
        result.insert(class_name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{ClassInfo, ClassKind, ElementPosition, FileMeta, FunctionInfo, PropertyInfo};

    fn pos() -> ElementPosition {
        ElementPosition::new("t.php", 1, 0, 10)
    }

    fn function(name: &str, ret: TypeSet) -> FunctionInfo {
        FunctionInfo::new(name, pos()).with_return(ret)
    }

    #[test]
    fn test_function_call_chain() {
        let index = SymbolIndex::new();
        let mut meta = FileMeta::new();
        meta.add_function(function("\\a", TypeSet::concrete("int")));
        meta.add_function(function("\\b", TypeSet::single(TypeValue::FunctionCall("\\a".into()))));
        index.add_file_meta("t.php", meta).unwrap();

        let set = TypeSet::single(TypeValue::FunctionCall("\\b".into()));
        assert_eq!(resolve(&index, "", &set).to_string(), "int");
    }

    #[test]
    fn test_mutual_recursion_is_empty() {
        let index = SymbolIndex::new();
        let mut meta = FileMeta::new();
        meta.add_function(function("\\p", TypeSet::single(TypeValue::FunctionCall("\\q".into()))));
        meta.add_function(function("\\q", TypeSet::single(TypeValue::FunctionCall("\\p".into()))));
        index.add_file_meta("t.php", meta).unwrap();

        let set = TypeSet::single(TypeValue::FunctionCall("\\p".into()));
        assert!(resolve(&index, "", &set).is_empty());
    }

    #[test]
    fn test_root_namespace_fallback() {
        let index = SymbolIndex::with_builtins();
        let set = TypeSet::single(TypeValue::FunctionCall("\\App\\strlen".into()));
        assert_eq!(resolve(&index, "", &set).to_string(), "int");
    }

    #[test]
    fn test_late_static_binding() {
        let index = SymbolIndex::new();
        let mut meta = FileMeta::new();
        let mut base = ClassInfo::new("\\Base", pos());
        let mut create = function("create", TypeSet::concrete("static"));
        create.is_static = true;
        base.add_method(create);
        let mut derived = ClassInfo::new("\\Derived", pos());
        derived.parent = Some("\\Base".into());
        meta.add_class(base);
        meta.add_class(derived);
        index.add_file_meta("t.php", meta).unwrap();

        let set = TypeSet::single(TypeValue::static_method_call("\\Derived", "create"));
        assert_eq!(resolve(&index, "", &set).to_string(), "\\Derived");
    }

    #[test]
    fn test_array_duality() {
        let index = SymbolIndex::with_builtins();
        let inner = TypeValue::FunctionCall("\\strlen".into());
        let wrapped = TypeValue::ElementOf(Box::new(TypeValue::ArrayOf(Box::new(inner.clone()))));
        assert_eq!(
            resolve(&index, "", &TypeSet::single(wrapped)),
            resolve(&index, "", &TypeSet::single(inner))
        );
    }

    #[test]
    fn test_empty_array_sentinel() {
        let index = SymbolIndex::new();
        let alone = TypeSet::concrete(EMPTY_ARRAY);
        assert_eq!(resolve(&index, "", &alone).to_string(), "mixed[]");

        let mixed_in = TypeSet::from_values([TypeValue::concrete(EMPTY_ARRAY), TypeValue::concrete("int[]")]);
        assert_eq!(resolve(&index, "", &mixed_in).to_string(), "int[]");
    }

    #[test]
    fn test_elem_of_array_access_object() {
        let index = SymbolIndex::with_builtins();
        let mut meta = FileMeta::new();
        let mut list = ClassInfo::new("\\UserList", pos());
        list.interfaces.insert("\\ArrayAccess".into());
        list.add_method(function("offsetGet", TypeSet::concrete("\\User")));
        meta.add_class(list);
        index.add_file_meta("t.php", meta).unwrap();

        let set = TypeSet::single(TypeValue::elem_of(TypeValue::concrete("\\UserList")));
        assert_eq!(resolve(&index, "", &set).to_string(), "\\User");
    }

    #[test]
    fn test_elem_of_shape_by_key() {
        let index = SymbolIndex::new();
        let mut meta = FileMeta::new();
        let mut shape = ClassInfo::new("\\shape$t.php:1$", pos());
        shape.is_shape = true;
        for (key, typ) in [("id", "int"), ("name", "string")] {
            shape.properties.insert(
                key.into(),
                PropertyInfo {
                    pos: pos(),
                    typ: TypeSet::concrete(typ),
                    access: Default::default(),
                },
            );
        }
        meta.add_class(shape);
        index.add_file_meta("t.php", meta).unwrap();

        let set = TypeSet::single(TypeValue::elem_of_key(TypeValue::concrete("\\shape$t.php:1$"), "name"));
        assert_eq!(resolve(&index, "", &set).to_string(), "string");
    }

    #[test]
    fn test_base_method_param() {
        let index = SymbolIndex::new();
        let mut meta = FileMeta::new();
        let mut iface = ClassInfo::new("\\Handler", pos());
        iface.kind = ClassKind::Interface;
        iface.add_method(
            FunctionInfo::new("handle", pos())
                .with_param(crate::symbols::FuncParam::new("$req").with_types(TypeSet::concrete("\\Request"))),
        );
        let mut class = ClassInfo::new("\\Impl", pos());
        class.interfaces.insert("\\Handler".into());
        meta.add_class(iface);
        meta.add_class(class);
        index.add_file_meta("t.php", meta).unwrap();

        let set = TypeSet::single(TypeValue::BaseMethodParam {
            index: 0,
            class: "\\Impl".into(),
            method: "handle".into(),
        });
        assert_eq!(resolve(&index, "", &set).to_string(), "\\Request");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let index = SymbolIndex::with_builtins();
        let set = TypeSet::from_values([
            TypeValue::FunctionCall("\\count".into()),
            TypeValue::instance_method_call(TypeValue::concrete("\\Exception"), "getMessage"),
        ]);
        let first = resolve(&index, "", &set);
        let second = resolve(&index, "", &set);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), "int|string");
    }
}
