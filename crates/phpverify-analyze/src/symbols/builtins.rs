//! Builtin declarations registered before indexing
//!
//! Only the parts of the runtime the resolver leans on: the iteration and
//! array-access interfaces, the throwable hierarchy, enum interfaces and a
//! table of common functions with known return types.

use super::class_info::{ClassInfo, ClassKind};
use super::function_info::{ElementPosition, FuncParam, FunctionInfo};
use super::index::{FileMeta, BUILTIN_FILE};
use crate::types::{TypeSet, TypeValue};

/// (name, kind, parent, interfaces or parent interfaces)
const CLASSES: &[(&str, ClassKind, Option<&str>, &[&str])] = &[
    ("\\Traversable", ClassKind::Interface, None, &[]),
    ("\\Iterator", ClassKind::Interface, None, &["\\Traversable"]),
    ("\\IteratorAggregate", ClassKind::Interface, None, &["\\Traversable"]),
    ("\\ArrayAccess", ClassKind::Interface, None, &[]),
    ("\\Countable", ClassKind::Interface, None, &[]),
    ("\\Stringable", ClassKind::Interface, None, &[]),
    ("\\JsonSerializable", ClassKind::Interface, None, &[]),
    ("\\Throwable", ClassKind::Interface, None, &["\\Stringable"]),
    ("\\UnitEnum", ClassKind::Interface, None, &[]),
    ("\\BackedEnum", ClassKind::Interface, None, &["\\UnitEnum"]),
    ("\\stdClass", ClassKind::Class, None, &[]),
    ("\\Closure", ClassKind::Class, None, &[]),
    ("\\Generator", ClassKind::Class, None, &["\\Iterator"]),
    ("\\ArrayIterator", ClassKind::Class, None, &["\\Iterator", "\\ArrayAccess", "\\Countable"]),
    ("\\ArrayObject", ClassKind::Class, None, &["\\IteratorAggregate", "\\ArrayAccess", "\\Countable"]),
    ("\\Exception", ClassKind::Class, None, &["\\Throwable"]),
    ("\\Error", ClassKind::Class, None, &["\\Throwable"]),
    ("\\ErrorException", ClassKind::Class, Some("\\Exception"), &[]),
    ("\\TypeError", ClassKind::Class, Some("\\Error"), &[]),
    ("\\ValueError", ClassKind::Class, Some("\\Error"), &[]),
    ("\\ArithmeticError", ClassKind::Class, Some("\\Error"), &[]),
    ("\\DivisionByZeroError", ClassKind::Class, Some("\\ArithmeticError"), &[]),
    ("\\ArgumentCountError", ClassKind::Class, Some("\\TypeError"), &[]),
    ("\\LogicException", ClassKind::Class, Some("\\Exception"), &[]),
    ("\\BadFunctionCallException", ClassKind::Class, Some("\\LogicException"), &[]),
    ("\\BadMethodCallException", ClassKind::Class, Some("\\BadFunctionCallException"), &[]),
    ("\\DomainException", ClassKind::Class, Some("\\LogicException"), &[]),
    ("\\InvalidArgumentException", ClassKind::Class, Some("\\LogicException"), &[]),
    ("\\LengthException", ClassKind::Class, Some("\\LogicException"), &[]),
    ("\\OutOfRangeException", ClassKind::Class, Some("\\LogicException"), &[]),
    ("\\RuntimeException", ClassKind::Class, Some("\\Exception"), &[]),
    ("\\OutOfBoundsException", ClassKind::Class, Some("\\RuntimeException"), &[]),
    ("\\OverflowException", ClassKind::Class, Some("\\RuntimeException"), &[]),
    ("\\RangeException", ClassKind::Class, Some("\\RuntimeException"), &[]),
    ("\\UnderflowException", ClassKind::Class, Some("\\RuntimeException"), &[]),
    ("\\UnexpectedValueException", ClassKind::Class, Some("\\RuntimeException"), &[]),
];

/// (class, method, return type, parameter names, static)
const METHODS: &[(&str, &str, &str, &[&str], bool)] = &[
    ("\\Iterator", "current", "mixed", &[], false),
    ("\\Iterator", "key", "mixed", &[], false),
    ("\\Iterator", "next", "void", &[], false),
    ("\\Iterator", "rewind", "void", &[], false),
    ("\\Iterator", "valid", "bool", &[], false),
    ("\\IteratorAggregate", "getIterator", "\\Traversable", &[], false),
    ("\\ArrayAccess", "offsetExists", "bool", &["$offset"], false),
    ("\\ArrayAccess", "offsetGet", "mixed", &["$offset"], false),
    ("\\ArrayAccess", "offsetSet", "void", &["$offset", "$value"], false),
    ("\\ArrayAccess", "offsetUnset", "void", &["$offset"], false),
    ("\\Countable", "count", "int", &[], false),
    ("\\Stringable", "__toString", "string", &[], false),
    ("\\JsonSerializable", "jsonSerialize", "mixed", &[], false),
    ("\\Throwable", "getMessage", "string", &[], false),
    ("\\Throwable", "getCode", "int", &[], false),
    ("\\Throwable", "getFile", "string", &[], false),
    ("\\Throwable", "getLine", "int", &[], false),
    ("\\Throwable", "getTrace", "mixed[]", &[], false),
    ("\\Throwable", "getTraceAsString", "string", &[], false),
    ("\\Throwable", "getPrevious", "\\Throwable|null", &[], false),
    ("\\UnitEnum", "cases", "static[]", &[], true),
    ("\\BackedEnum", "from", "static", &["$value"], true),
    ("\\BackedEnum", "tryFrom", "static|null", &["$value"], true),
    ("\\Closure", "bind", "\\Closure|null", &["$closure", "$newThis"], true),
    ("\\Closure", "fromCallable", "\\Closure", &["$callback"], true),
    ("\\Closure", "call", "mixed", &["$newThis"], false),
    ("\\Generator", "current", "mixed", &[], false),
    ("\\Generator", "send", "mixed", &["$value"], false),
    ("\\Generator", "getReturn", "mixed", &[], false),
    ("\\ArrayIterator", "current", "mixed", &[], false),
    ("\\ArrayIterator", "offsetGet", "mixed", &["$key"], false),
    ("\\ArrayIterator", "count", "int", &[], false),
    ("\\ArrayObject", "getIterator", "\\ArrayIterator", &[], false),
    ("\\ArrayObject", "offsetGet", "mixed", &["$key"], false),
    ("\\ArrayObject", "count", "int", &[], false),
    ("\\ArrayObject", "getArrayCopy", "mixed[]", &[], false),
];

/// (name, return type, required parameters)
const FUNCTIONS: &[(&str, &str, usize)] = &[
    ("\\strlen", "int", 1),
    ("\\count", "int", 1),
    ("\\intval", "int", 1),
    ("\\floatval", "float", 1),
    ("\\strval", "string", 1),
    ("\\boolval", "bool", 1),
    ("\\time", "int", 0),
    ("\\trim", "string", 1),
    ("\\strtolower", "string", 1),
    ("\\strtoupper", "string", 1),
    ("\\sprintf", "string", 1),
    ("\\implode", "string", 1),
    ("\\explode", "string[]", 2),
    ("\\str_repeat", "string", 2),
    ("\\substr", "string", 2),
    ("\\strpos", "int|false", 2),
    ("\\in_array", "bool", 2),
    ("\\array_keys", "mixed[]", 1),
    ("\\array_values", "mixed[]", 1),
    ("\\array_merge", "mixed[]", 0),
    ("\\is_array", "bool", 1),
    ("\\is_string", "bool", 1),
    ("\\is_int", "bool", 1),
    ("\\is_null", "bool", 1),
    ("\\json_encode", "string|false", 1),
    ("\\func_get_args", "mixed[]", 0),
    ("\\compact", "mixed[]", 0),
    ("\\extract", "int", 1),
    ("\\define", "bool", 2),
    ("\\defined", "bool", 1),
    ("\\trigger_error", "bool", 1),
    ("\\microtime", "string|float", 0),
];

fn position() -> ElementPosition {
    ElementPosition::new(BUILTIN_FILE, 0, 0, 0)
}

fn type_of(text: &str) -> TypeSet {
    text.split('|')
        .map(TypeValue::concrete)
        .collect::<TypeSet>()
        .precise()
        .immutable()
}

/// Declarations stored under [`BUILTIN_FILE`]
pub fn builtin_meta() -> FileMeta {
    let mut meta = FileMeta::new();

    for (name, kind, parent, interfaces) in CLASSES {
        let mut info = ClassInfo::new(*name, position());
        info.kind = *kind;
        info.parent = parent.map(str::to_string);
        if *kind == ClassKind::Interface {
            info.parent_interfaces = interfaces.iter().map(|s| s.to_string()).collect();
        } else {
            info.interfaces = interfaces.iter().map(|s| s.to_string()).collect();
        }
        if *name == "\\Closure" || *name == "\\Generator" {
            info.is_final = true;
        }

        for (class, method, ret, params, is_static) in METHODS {
            if class != name {
                continue;
            }
            let mut func = FunctionInfo::new(*method, position())
                .with_return(type_of(ret))
                .with_min_params(params.len());
            for param in *params {
                func = func.with_param(FuncParam::new(*param));
            }
            func.is_static = *is_static;
            func.is_abstract = *kind == ClassKind::Interface;
            info.add_method(func);
        }

        meta.add_class(info);
    }

    for (name, ret, min_params) in FUNCTIONS {
        let mut func = FunctionInfo::new(*name, position())
            .with_return(type_of(ret))
            .with_min_params(*min_params);
        func.is_pure = !matches!(*name, "\\define" | "\\extract" | "\\trigger_error");
        meta.add_function(func);
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_hierarchy() {
        let meta = builtin_meta();
        let runtime = &meta.classes["\\runtimeexception"];
        assert_eq!(runtime.parent.as_deref(), Some("\\Exception"));
        let iterator = &meta.classes["\\iterator"];
        assert_eq!(iterator.parent_interfaces, vec!["\\Traversable".to_string()]);
        assert!(iterator.get_method("current").unwrap().is_abstract);
    }

    #[test]
    fn test_builtin_functions() {
        let meta = builtin_meta();
        assert_eq!(meta.functions["\\strlen"].typ.to_string(), "int");
        assert_eq!(meta.functions["\\explode"].min_params, 2);
    }
}
