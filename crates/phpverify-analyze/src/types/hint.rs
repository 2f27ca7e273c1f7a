//! Type hints: `?int`, `A|B`, `(A&B)|null`, `self`, `array`

use super::predicates;
use super::set::TypeSet;
use super::value::TypeValue;
use crate::scope::ClassParseState;

/// String refinements collapsed to `string`
const STRING_LIKE: &[&str] = &[
    "class-string",
    "interface-string",
    "trait-string",
    "callable-string",
    "numeric-string",
    "literal-string",
    "lowercase-string",
    "non-empty-string",
    "array-key",
];

/// Parse a declared hint into a precise type set.
///
/// Class names are resolved against the namespace and `use` imports of
/// `state`. `static` is kept as a marker for the resolver.
pub fn parse_hint(hint: &str, state: &ClassParseState) -> TypeSet {
    let mut values = Vec::new();
    for part in hint.split(|c| c == '|' || c == '&') {
        let part = part.trim().trim_matches(|c| c == '(' || c == ')').trim();
        if part.is_empty() {
            continue;
        }
        let part = match part.strip_prefix('?') {
            Some(rest) => {
                values.push(TypeValue::concrete("null"));
                rest.trim()
            }
            None => part,
        };
        if let Some(name) = normalize_name(part, state) {
            values.push(TypeValue::Concrete(name));
        }
    }
    TypeSet::from_values(values).precise().immutable()
}

/// Normalized concrete name of one hint atom
pub fn normalize_name(name: &str, state: &ClassParseState) -> Option<String> {
    let lower = name.to_ascii_lowercase();
    if predicates::is_trivial(&lower) {
        return Some(lower);
    }
    if STRING_LIKE.contains(&lower.as_str()) {
        return Some("string".to_string());
    }
    match lower.as_str() {
        "array" => Some("mixed[]".to_string()),
        "positive-int" => Some("int".to_string()),
        "static" | "$this" => Some("static".to_string()),
        "self" => non_empty(&state.current_class),
        "parent" => non_empty(&state.current_parent_class),
        "closure" | "\\closure" => Some("\\Closure".to_string()),
        _ => Some(state.resolve_class_name(name)),
    }
}

fn non_empty(name: &str) -> Option<String> {
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ClassParseState {
        let mut state = ClassParseState::new();
        state.namespace = "\\App".to_string();
        state.add_use("Thing", "\\Lib\\Thing");
        state.current_class = "\\App\\Model".to_string();
        state.current_parent_class = "\\App\\Base".to_string();
        state
    }

    #[test]
    fn test_nullable() {
        let set = parse_hint("?int", &state());
        assert_eq!(set.to_string(), "int|null");
        assert!(set.is_precise());
    }

    #[test]
    fn test_union_and_classes() {
        let set = parse_hint("Thing|Other|\\Root", &state());
        assert_eq!(set.to_string(), "\\App\\Other|\\Lib\\Thing|\\Root");
    }

    #[test]
    fn test_special_names() {
        assert_eq!(parse_hint("array", &state()).to_string(), "mixed[]");
        assert_eq!(parse_hint("self", &state()).to_string(), "\\App\\Model");
        assert_eq!(parse_hint("parent", &state()).to_string(), "\\App\\Base");
        assert_eq!(parse_hint("static", &state()).to_string(), "static");
        assert_eq!(parse_hint("String", &state()).to_string(), "string");
    }

    #[test]
    fn test_intersection_in_dnf() {
        let set = parse_hint("(Thing&Other)|null", &state());
        assert_eq!(set.to_string(), "\\App\\Other|\\Lib\\Thing|null");
    }
}
