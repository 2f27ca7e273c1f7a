//! Single type values, concrete or deferred

use std::fmt;

/// One concrete or deferred description of an expression's type.
///
/// Class names are fully qualified with a leading `\`. Deferred variants are
/// expanded by the solver against the symbol index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeValue {
    /// A plain type name: `int`, `mixed`, `\Foo\Bar`, `int[]`
    Concrete(String),
    /// Return type of a function, name fully qualified
    FunctionCall(String),
    /// `Class::method()`
    StaticMethodCall { class: String, method: String },
    /// `$expr->method()`
    InstanceMethodCall { object: Box<TypeValue>, method: String },
    /// `Class::$property`, the property name includes `$`
    StaticProperty { class: String, property: String },
    /// `$expr->property`
    InstanceProperty { object: Box<TypeValue>, property: String },
    /// `Class::CONSTANT`
    ClassConstant { class: String, constant: String },
    ArrayOf(Box<TypeValue>),
    ElementOf(Box<TypeValue>),
    /// `$expr['key']`, used for shapes
    ElementOfKey { array: Box<TypeValue>, key: String },
    /// Variable of the pseudo-main scope, name without `$`
    Global(String),
    /// Global constant, name fully qualified
    Constant(String),
    /// Type of parameter `index` of `method` as declared on an interface of `class`
    BaseMethodParam {
        index: usize,
        class: String,
        method: String,
    },
}

impl TypeValue {
    pub fn concrete(name: impl Into<String>) -> Self {
        TypeValue::Concrete(name.into())
    }

    pub fn mixed() -> Self {
        TypeValue::Concrete("mixed".to_string())
    }

    /// `T[]`; `ArrayOf(ElementOf(T))` collapses to `T`
    pub fn array_of(elem: TypeValue) -> Self {
        match elem {
            TypeValue::ElementOf(inner) => *inner,
            TypeValue::Concrete(name) => TypeValue::Concrete(format!("{}[]", name)),
            other => TypeValue::ArrayOf(Box::new(other)),
        }
    }

    /// Element type; `ElementOf(ArrayOf(T))` collapses to `T`
    pub fn elem_of(array: TypeValue) -> Self {
        match array {
            TypeValue::ArrayOf(inner) => *inner,
            TypeValue::Concrete(name) if name.ends_with("[]") => {
                TypeValue::Concrete(name[..name.len() - 2].to_string())
            }
            other => TypeValue::ElementOf(Box::new(other)),
        }
    }

    /// Element under `key`; plain arrays ignore the key
    pub fn elem_of_key(array: TypeValue, key: impl Into<String>) -> Self {
        match array {
            TypeValue::ArrayOf(inner) => *inner,
            TypeValue::Concrete(name) if name.ends_with("[]") => {
                TypeValue::Concrete(name[..name.len() - 2].to_string())
            }
            other => TypeValue::ElementOfKey {
                array: Box::new(other),
                key: key.into(),
            },
        }
    }

    pub fn instance_method_call(object: TypeValue, method: impl Into<String>) -> Self {
        TypeValue::InstanceMethodCall {
            object: Box::new(object),
            method: method.into(),
        }
    }

    pub fn instance_property(object: TypeValue, property: impl Into<String>) -> Self {
        TypeValue::InstanceProperty {
            object: Box::new(object),
            property: property.into(),
        }
    }

    pub fn static_method_call(class: impl Into<String>, method: impl Into<String>) -> Self {
        TypeValue::StaticMethodCall {
            class: class.into(),
            method: method.into(),
        }
    }

    pub fn static_property(class: impl Into<String>, property: impl Into<String>) -> Self {
        TypeValue::StaticProperty {
            class: class.into(),
            property: property.into(),
        }
    }

    pub fn class_constant(class: impl Into<String>, constant: impl Into<String>) -> Self {
        TypeValue::ClassConstant {
            class: class.into(),
            constant: constant.into(),
        }
    }

    /// Whether the value still needs the solver
    pub fn is_lazy(&self) -> bool {
        !matches!(self, TypeValue::Concrete(_))
    }

    pub fn as_concrete(&self) -> Option<&str> {
        match self {
            TypeValue::Concrete(name) => Some(name),
            _ => None,
        }
    }

    /// Concrete name equal to `name`
    pub fn is(&self, name: &str) -> bool {
        self.as_concrete() == Some(name)
    }
}

impl fmt::Display for TypeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeValue::Concrete(name) => write!(f, "{}", name),
            TypeValue::FunctionCall(name) => write!(f, "{}()", name),
            TypeValue::StaticMethodCall { class, method } => write!(f, "{}::{}()", class, method),
            TypeValue::InstanceMethodCall { object, method } => write!(f, "({})->{}()", object, method),
            TypeValue::StaticProperty { class, property } => write!(f, "{}::{}", class, property),
            TypeValue::InstanceProperty { object, property } => write!(f, "({})->{}", object, property),
            TypeValue::ClassConstant { class, constant } => write!(f, "{}::{}", class, constant),
            TypeValue::ArrayOf(elem) => write!(f, "{}[]", elem),
            TypeValue::ElementOf(array) => write!(f, "elem({})", array),
            TypeValue::ElementOfKey { array, key } => write!(f, "elem({})[{}]", array, key),
            TypeValue::Global(name) => write!(f, "global_${}", name),
            TypeValue::Constant(name) => write!(f, "constant({})", name),
            TypeValue::BaseMethodParam {
                index,
                class,
                method,
            } => write!(f, "param({})::{}[{}]", class, method, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_identities() {
        let call = TypeValue::FunctionCall("\\f".into());
        assert_eq!(TypeValue::elem_of(TypeValue::array_of(call.clone())), call);
        assert_eq!(TypeValue::array_of(TypeValue::elem_of(call.clone())), call);
    }

    #[test]
    fn test_concrete_arrays_fold() {
        assert_eq!(
            TypeValue::array_of(TypeValue::concrete("int")),
            TypeValue::concrete("int[]")
        );
        assert_eq!(
            TypeValue::elem_of(TypeValue::concrete("\\Foo[][]")),
            TypeValue::concrete("\\Foo[]")
        );
        assert!(TypeValue::elem_of(TypeValue::concrete("int")).is_lazy());
    }

    #[test]
    fn test_display_formats() {
        let obj = TypeValue::concrete("\\A");
        assert_eq!(TypeValue::instance_method_call(obj.clone(), "m").to_string(), "(\\A)->m()");
        assert_eq!(TypeValue::instance_property(obj, "p").to_string(), "(\\A)->p");
        assert_eq!(TypeValue::Global("x".into()).to_string(), "global_$x");
        assert_eq!(
            TypeValue::elem_of_key(TypeValue::Global("x".into()), "k").to_string(),
            "elem(global_$x)[k]"
        );
        assert_eq!(
            TypeValue::BaseMethodParam {
                index: 1,
                class: "\\C".into(),
                method: "m".into()
            }
            .to_string(),
            "param(\\C)::m[1]"
        );
    }
}
