//! Class hierarchy walks
//!
//! Every walk carries its own set of visited classes, so inheritance cycles
//! end the walk with "not found" instead of looping.

use std::collections::HashSet;
use std::sync::Arc;

use crate::symbols::{symbol_key, ClassInfo, ConstInfo, FunctionInfo, PropertyInfo, SymbolIndex};

/// A method found somewhere in a class hierarchy
#[derive(Debug, Clone)]
pub struct FoundMethod {
    pub info: FunctionInfo,
    /// Class the lookup ended in
    pub class_name: String,
    /// Trait that supplied the method, if any
    pub trait_name: Option<String>,
    /// False for interface and abstract declarations
    pub implemented: bool,
}

impl FoundMethod {
    /// Class-like that holds the body
    pub fn impl_name(&self) -> &str {
        self.trait_name.as_deref().unwrap_or(&self.class_name)
    }
}

/// A property found somewhere in a class hierarchy
#[derive(Debug, Clone)]
pub struct FoundProperty {
    pub info: PropertyInfo,
    pub class_name: String,
    pub trait_name: Option<String>,
}

fn class_or_trait(index: &SymbolIndex, name: &str) -> Option<Arc<ClassInfo>> {
    index.get_class_or_trait(name)
}

/// First visit of `name`; false when the walk already passed through it
fn first_visit(visited: &mut HashSet<String>, name: &str) -> bool {
    visited.insert(symbol_key(name))
}

fn pick_implemented(current: Option<FoundMethod>, candidate: FoundMethod) -> FoundMethod {
    match current {
        Some(current) if current.implemented => current,
        _ => candidate,
    }
}

/// Look up `method` on `class`.
///
/// A concrete implementation anywhere in the parent chain or traits outranks
/// an abstract or interface declaration met earlier.
pub fn find_method(index: &SymbolIndex, class: &str, method: &str) -> Option<FoundMethod> {
    find_method_in(index, class, method, &mut HashSet::new())
}

fn find_method_in(
    index: &SymbolIndex,
    class: &str,
    method: &str,
    visited: &mut HashSet<String>,
) -> Option<FoundMethod> {
    let mut result: Option<FoundMethod> = None;
    let mut class_name = class.to_string();

    loop {
        if !first_visit(visited, &class_name) {
            break;
        }
        let info = match class_or_trait(index, &class_name) {
            Some(info) => info,
            None => break,
        };

        if let Some(found) = info.get_method(method) {
            let candidate = FoundMethod {
                info: found.clone(),
                class_name: class_name.clone(),
                trait_name: None,
                implemented: !found.is_abstract,
            };
            let picked = pick_implemented(result.take(), candidate);
            if picked.implemented {
                return Some(picked);
            }
            result = Some(picked);
        }

        for trait_name in &info.traits {
            if let Some(found) = find_method_in(index, trait_name, method, visited) {
                let candidate = FoundMethod {
                    implemented: !found.info.is_abstract,
                    info: found.info,
                    class_name: class_name.clone(),
                    trait_name: Some(trait_name.clone()),
                };
                let picked = pick_implemented(result.take(), candidate);
                if picked.implemented {
                    return Some(picked);
                }
                result = Some(picked);
            }
        }

        for parent_iface in &info.parent_interfaces {
            if let Some(mut found) = find_method_in(index, parent_iface, method, visited) {
                found.implemented = false;
                return Some(found);
            }
        }

        for mixin in &info.mixins {
            if class_or_trait(index, mixin).is_none() {
                continue;
            }
            if let Some(found) = find_method_in(index, mixin, method, visited) {
                return Some(found);
            }
        }

        for iface in &info.interfaces {
            if let Some(mut found) = find_method_in(index, iface, method, visited) {
                found.implemented = false;
                result = Some(pick_implemented(result.take(), found));
                break;
            }
        }

        match &info.parent {
            Some(parent) => class_name = parent.clone(),
            None => break,
        }
    }

    result
}

/// Look up a property; static property names carry a leading `$`
pub fn find_property(index: &SymbolIndex, class: &str, property: &str) -> Option<FoundProperty> {
    find_property_in(index, class, property, &mut HashSet::new())
}

fn find_property_in(
    index: &SymbolIndex,
    class: &str,
    property: &str,
    visited: &mut HashSet<String>,
) -> Option<FoundProperty> {
    let mut class_name = class.to_string();
    loop {
        if !first_visit(visited, &class_name) {
            return None;
        }
        let info = class_or_trait(index, &class_name)?;
        if info.is_shape {
            return None;
        }

        if let Some(prop) = info.get_property(property) {
            return Some(FoundProperty {
                info: prop.clone(),
                class_name,
                trait_name: None,
            });
        }

        for trait_name in &info.traits {
            if let Some(found) = find_property_in(index, trait_name, property, visited) {
                return Some(FoundProperty {
                    info: found.info,
                    class_name,
                    trait_name: Some(trait_name.clone()),
                });
            }
        }

        for mixin in &info.mixins {
            if let Some(found) = find_property_in(index, mixin, property, visited) {
                return Some(found);
            }
        }

        class_name = info.parent.clone()?;
    }
}

/// Look up a class constant; returns it with the class that declares it
pub fn find_constant(index: &SymbolIndex, class: &str, constant: &str) -> Option<(ConstInfo, String)> {
    find_constant_in(index, class, constant, &mut HashSet::new())
}

fn find_constant_in(
    index: &SymbolIndex,
    class: &str,
    constant: &str,
    visited: &mut HashSet<String>,
) -> Option<(ConstInfo, String)> {
    let mut class_name = class.to_string();
    loop {
        if !first_visit(visited, &class_name) {
            return None;
        }
        let info = index.get_class(&class_name)?;

        for iface in &info.interfaces {
            if let Some(found) = find_constant_in(index, iface, constant, visited) {
                return Some(found);
            }
        }

        if let Some(found) = info.get_constant(constant) {
            return Some((found.clone(), class_name));
        }

        for parent_iface in &info.parent_interfaces {
            if let Some(found) = find_constant_in(index, parent_iface, constant, visited) {
                return Some(found);
            }
        }

        for trait_name in &info.traits {
            if let Some(trait_info) = index.get_trait(trait_name) {
                if let Some(found) = trait_info.get_constant(constant) {
                    return Some((found.clone(), trait_name.clone()));
                }
            }
        }

        class_name = info.parent.clone()?;
    }
}

/// Whether `class` implements or extends the interface `iface`.
///
/// A class-like does not implement itself; see [`instance_of`].
pub fn implements(index: &SymbolIndex, class: &str, iface: &str) -> bool {
    let mut visited = HashSet::new();
    implements_in(index, class, iface, &mut visited)
}

fn implements_in(index: &SymbolIndex, class: &str, iface: &str, visited: &mut HashSet<String>) -> bool {
    let target = symbol_key(iface);
    let mut class_name = class.to_string();
    loop {
        if !first_visit(visited, &class_name) {
            return false;
        }
        let info = match index.get_class(&class_name) {
            Some(info) => info,
            None => return false,
        };

        for implemented in info.interfaces.iter().chain(&info.parent_interfaces) {
            if symbol_key(implemented) == target {
                return true;
            }
            if implements_in(index, implemented, iface, visited) {
                return true;
            }
        }

        match &info.parent {
            Some(parent) => class_name = parent.clone(),
            None => return false,
        }
    }
}

/// Whether `derived` has `base` somewhere up its parent chain
pub fn extends(index: &SymbolIndex, derived: &str, base: &str) -> bool {
    let target = symbol_key(base);
    let mut visited = HashSet::new();
    let mut class_name = derived.to_string();
    loop {
        if !first_visit(&mut visited, &class_name) {
            return false;
        }
        let parent = match index.get_class(&class_name).and_then(|info| info.parent.clone()) {
            Some(parent) => parent,
            None => return false,
        };
        if symbol_key(&parent) == target {
            return true;
        }
        class_name = parent;
    }
}

/// `class` is `target`, extends it, or implements it
pub fn instance_of(index: &SymbolIndex, class: &str, target: &str) -> bool {
    symbol_key(class) == symbol_key(target)
        || extends(index, class, target)
        || implements(index, class, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{ClassKind, ElementPosition, FileMeta};
    use crate::types::TypeSet;

    fn method(name: &str, ret: &str, is_abstract: bool) -> FunctionInfo {
        let mut info = FunctionInfo::new(name, ElementPosition::default()).with_return(TypeSet::concrete(ret));
        info.is_abstract = is_abstract;
        info
    }

    fn class(name: &str) -> ClassInfo {
        ClassInfo::new(name, ElementPosition::new("t.php", 1, 0, 10))
    }

    fn index_of(classes: Vec<ClassInfo>) -> SymbolIndex {
        let index = SymbolIndex::new();
        let mut meta = FileMeta::new();
        for info in classes {
            meta.add_class(info);
        }
        index.add_file_meta("t.php", meta).unwrap();
        index
    }

    #[test]
    fn test_concrete_ancestor_beats_interface() {
        let mut iface = class("\\A");
        iface.kind = ClassKind::Interface;
        iface.add_method(method("a", "int", true));
        let mut base1 = class("\\Base1");
        base1.add_method(method("a", "string", false));
        let mut base2 = class("\\Base2");
        base2.parent = Some("\\Base1".into());
        let mut c = class("\\C");
        c.parent = Some("\\Base2".into());
        c.interfaces.insert("\\A".into());

        let index = index_of(vec![iface, base1, base2, c]);
        let found = find_method(&index, "\\C", "a").unwrap();
        assert_eq!(found.class_name, "\\Base1");
        assert!(found.implemented);
    }

    #[test]
    fn test_interface_only_method() {
        let mut iface = class("\\I");
        iface.kind = ClassKind::Interface;
        iface.add_method(method("run", "int", true));
        let mut c = class("\\C");
        c.is_abstract = true;
        c.interfaces.insert("\\I".into());

        let index = index_of(vec![iface, c]);
        let found = find_method(&index, "\\C", "RUN").unwrap();
        assert_eq!(found.class_name, "\\I");
        assert!(!found.implemented);
    }

    #[test]
    fn test_trait_method() {
        let mut t = class("\\T");
        t.kind = ClassKind::Trait;
        t.add_method(method("helper", "int", false));
        let mut c = class("\\C");
        c.traits.insert("\\T".into());

        let index = index_of(vec![t, c]);
        let found = find_method(&index, "\\C", "helper").unwrap();
        assert_eq!(found.trait_name.as_deref(), Some("\\T"));
        assert_eq!(found.impl_name(), "\\T");
    }

    #[test]
    fn test_inheritance_cycle_terminates() {
        let mut a = class("\\A");
        a.parent = Some("\\B".into());
        let mut b = class("\\B");
        b.parent = Some("\\A".into());

        let index = index_of(vec![a, b]);
        assert!(find_method(&index, "\\A", "x").is_none());
        assert!(find_property(&index, "\\A", "x").is_none());
        assert!(find_constant(&index, "\\A", "X").is_none());
        assert!(!implements(&index, "\\A", "\\A"));
        assert!(!extends(&index, "\\A", "\\Missing"));
    }

    #[test]
    fn test_implements_through_parent_interfaces() {
        let mut base = class("\\Base");
        base.kind = ClassKind::Interface;
        let mut child = class("\\Child");
        child.kind = ClassKind::Interface;
        child.parent_interfaces.push("\\Base".into());
        let mut c = class("\\C");
        c.interfaces.insert("\\Child".into());
        let mut d = class("\\D");
        d.parent = Some("\\C".into());

        let index = index_of(vec![base, child, c, d]);
        assert!(implements(&index, "\\D", "\\base"));
        assert!(extends(&index, "\\D", "\\C"));
        assert!(instance_of(&index, "\\D", "\\D"));
        assert!(!implements(&index, "\\C", "\\Other"));
    }

    #[test]
    fn test_constant_from_interface() {
        let mut iface = class("\\I");
        iface.kind = ClassKind::Interface;
        iface.constants.insert(
            "VERSION".into(),
            ConstInfo {
                pos: ElementPosition::default(),
                typ: TypeSet::concrete("int"),
                access: Default::default(),
                value: None,
            },
        );
        let mut c = class("\\C");
        c.interfaces.insert("\\I".into());

        let index = index_of(vec![iface, c]);
        let (info, owner) = find_constant(&index, "\\C", "VERSION").unwrap();
        assert_eq!(owner, "\\I");
        assert_eq!(info.typ.to_string(), "int");
    }

    #[test]
    fn test_mixin_members() {
        let prop = PropertyInfo {
            pos: ElementPosition::default(),
            typ: TypeSet::concrete("int"),
            access: Default::default(),
        };
        let mut helper = class("\\Helper");
        helper.add_method(method("assist", "int", false));
        helper.properties.insert("level".into(), prop.clone());
        let mut c = class("\\C");
        c.mixins.push("\\Missing".into());
        c.mixins.push("\\Helper".into());
        let mut shape = class("\\shape$t.php:1$");
        shape.is_shape = true;
        shape.properties.insert("id".into(), prop);

        let index = index_of(vec![helper, c, shape]);
        assert_eq!(find_method(&index, "\\C", "assist").unwrap().class_name, "\\Helper");
        assert_eq!(find_property(&index, "\\C", "level").unwrap().class_name, "\\Helper");
        assert!(find_method(&index, "\\C", "other").is_none());
        assert!(find_property(&index, "\\shape$t.php:1$", "id").is_none());
    }
}
