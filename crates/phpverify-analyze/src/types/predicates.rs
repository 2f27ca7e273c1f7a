//! Classification of concrete type names

/// Names with a builtin meaning; never resolved as classes
const TRIVIAL: &[&str] = &[
    "bool", "callable", "float", "int", "mixed", "object", "resource", "string", "void",
    "iterable", "never", "null", "true", "false",
];

/// Fully qualified class name (not a shape, array or closure)
pub fn is_class(name: &str) -> bool {
    name.starts_with('\\') && !is_shape(name) && !is_array(name) && !is_closure(name)
}

/// Synthetic struct-like class produced for array shapes
pub fn is_shape(name: &str) -> bool {
    name.starts_with("\\shape$")
}

pub fn is_closure(name: &str) -> bool {
    name.starts_with("\\Closure")
}

pub fn is_array(name: &str) -> bool {
    name.ends_with("[]")
}

pub fn is_trivial(name: &str) -> bool {
    TRIVIAL.contains(&name)
}

/// `T[]` → `T`; other names are returned unchanged
pub fn array_element_type(name: &str) -> &str {
    name.strip_suffix("[]").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_class() {
        assert!(is_class("\\Foo\\Bar"));
        assert!(!is_class("\\Foo[]"));
        assert!(!is_class("\\shape$a.php$1"));
        assert!(!is_class("\\Closure"));
        assert!(!is_class("int"));
    }

    #[test]
    fn test_array_element_type() {
        assert_eq!(array_element_type("int[][]"), "int[]");
        assert_eq!(array_element_type("int"), "int");
    }

    #[test]
    fn test_trivial() {
        assert!(is_trivial("never"));
        assert!(!is_trivial("array"));
    }
}
