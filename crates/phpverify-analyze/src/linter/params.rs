//! Parameter typing shared by declarations and closures

use phpverify_core::ir::Param;

use crate::scope::{ClassParseState, Scope};
use crate::solver::expr_type_local;
use crate::symbols::FuncParam;
use crate::types::hint::parse_hint;
use crate::types::{TypeSet, TypeValue};

/// Method whose interface declarations supply omitted parameter types
pub struct BaseMethod<'a> {
    pub class: &'a str,
    pub method: &'a str,
}

/// Typed parameters of a function, method or closure.
///
/// A hint wins; without one the default value's type is used, and in a
/// method of a class implementing interfaces the interface declaration.
pub fn describe_params(state: &ClassParseState, params: &[Param], base: Option<&BaseMethod<'_>>) -> Vec<FuncParam> {
    let empty = Scope::new();
    params
        .iter()
        .enumerate()
        .map(|(index, param)| {
            let mut types = match &param.hint {
                Some(hint) => parse_hint(hint, state),
                None => TypeSet::new(),
            };
            if types.is_empty() {
                if let Some(default) = &param.default {
                    types = expr_type_local(&empty, state, default);
                }
            }
            if types.is_empty() {
                if let Some(base) = base {
                    types = TypeSet::single(TypeValue::BaseMethodParam {
                        index,
                        class: base.class.to_string(),
                        method: base.method.to_string(),
                    });
                }
            }
            if param.variadic {
                types = types.array_of();
            }
            let mut described = FuncParam::new(param.name.clone()).with_types(types);
            described.by_ref = param.by_ref;
            described.variadic = param.variadic;
            described
        })
        .collect()
}

/// Parameters before the first optional or variadic one
pub fn min_params(params: &[Param]) -> usize {
    params
        .iter()
        .take_while(|p| p.default.is_none() && !p.variadic)
        .count()
}

/// Define every parameter in `scope` as always present
pub fn bind_params(scope: &mut Scope, params: &[FuncParam]) {
    for param in params {
        scope.add_var(&param.name, param.types.clone(), true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpverify_core::ir::{StmtKind, Stmt};
    use phpverify_core::parse_source;

    fn params_of(code: &str) -> Vec<Param> {
        let parsed = parse_source("t.php", code).unwrap();
        let stmts: Vec<Stmt> = parsed.file.statements;
        stmts
            .into_iter()
            .find_map(|s| match s.kind {
                StmtKind::Function(func) => Some(func.params),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_hint_default_and_variadic() {
        let params = params_of("<?php function f(int $a, $b = 'x', string ...$rest) {}");
        let state = ClassParseState::new();
        let described = describe_params(&state, &params, None);
        assert_eq!(described[0].types.to_string(), "int");
        assert_eq!(described[1].types.to_string(), "string");
        assert_eq!(described[2].types.to_string(), "string[]");
        assert!(described[2].variadic);
        assert_eq!(min_params(&params), 1);
    }

    #[test]
    fn test_base_method_param_fallback() {
        let params = params_of("<?php function f($a) {}");
        let state = ClassParseState::new();
        let base = BaseMethod {
            class: "\\Impl",
            method: "run",
        };
        let described = describe_params(&state, &params, Some(&base));
        assert!(matches!(
            described[0].types.iter().next(),
            Some(TypeValue::BaseMethodParam { index: 0, .. })
        ));
    }
}
