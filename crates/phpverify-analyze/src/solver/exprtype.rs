//! Expression typing
//!
//! [`expr_type_local`] computes a type without touching the index, producing
//! deferred values for anything declared elsewhere. [`expr_type`] resolves
//! those once indexing is complete.

use phpverify_core::ir::{AssignOp, BinaryOp, Callee, ClassRef, Expr, ExprKind, UnaryOp};

use super::resolver::resolve;
use crate::scope::{ClassParseState, Scope};
use crate::symbols::SymbolIndex;
use crate::types::{TypeSet, TypeValue, EMPTY_ARRAY};

/// Type of `expr`, resolved when the index is complete.
///
/// The current class is the late static binding context. An empty result
/// degrades to `{mixed}` once resolved.
pub fn expr_type(index: &SymbolIndex, scope: &Scope, state: &ClassParseState, expr: &Expr) -> TypeSet {
    let local = expr_type_local(scope, state, expr);
    if !index.is_indexing_complete() {
        return local;
    }
    let resolved = resolve(index, &state.current_class, &local);
    if resolved.is_empty() {
        TypeSet::mixed()
    } else {
        resolved
    }
}

/// Fully qualified class name referenced by `class`
pub fn class_ref_name(state: &ClassParseState, class: &ClassRef) -> Option<String> {
    let name = match class {
        ClassRef::Name(name) => state.resolve_class_name(name),
        ClassRef::SelfRef | ClassRef::StaticRef => state.current_class.clone(),
        ClassRef::ParentRef => state.current_parent_class.clone(),
        ClassRef::Dynamic(_) => return None,
    };
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Type of `expr` without consulting the index
pub fn expr_type_local(scope: &Scope, state: &ClassParseState, expr: &Expr) -> TypeSet {
    match &expr.kind {
        ExprKind::Var(name) => scope.get_var_type(name).cloned().unwrap_or_default(),
        ExprKind::Paren(inner) | ExprKind::Clone(inner) => expr_type_local(scope, state, inner),
        ExprKind::Int => TypeSet::concrete("int"),
        ExprKind::Float => TypeSet::concrete("float"),
        ExprKind::Str(_) | ExprKind::Interpolated(_) => TypeSet::concrete("string"),
        ExprKind::Bool(_) => TypeSet::concrete("bool"),
        ExprKind::Null => TypeSet::concrete("null"),
        ExprKind::MagicConst(name) => {
            if name.eq_ignore_ascii_case("__LINE__") {
                TypeSet::concrete("int")
            } else {
                TypeSet::concrete("string")
            }
        }
        ExprKind::Array(items) => {
            if items.is_empty() {
                return TypeSet::concrete(EMPTY_ARRAY);
            }
            let all = |pred: fn(&ExprKind) -> bool| items.iter().all(|i| !i.unpack && pred(&i.value.kind));
            if all(|k| matches!(k, ExprKind::Str(_) | ExprKind::Interpolated(_))) {
                TypeSet::concrete("string[]")
            } else if all(|k| matches!(k, ExprKind::Int)) {
                TypeSet::concrete("int[]")
            } else if all(|k| matches!(k, ExprKind::Float)) {
                TypeSet::concrete("float[]")
            } else {
                TypeSet::concrete("mixed[]")
            }
        }
        ExprKind::ArrayDim { base, index } => {
            let base_types = expr_type_local(scope, state, base);
            let key = index.as_deref().and_then(|i| match &i.kind {
                ExprKind::Str(Some(key)) => Some(key.clone()),
                _ => None,
            });
            base_types.map(|v| match &key {
                Some(key) => TypeValue::elem_of_key(v.clone(), key.clone()),
                None => TypeValue::elem_of(v.clone()),
            })
        }
        ExprKind::Assign { target, value, op, .. } => match op {
            AssignOp::Assign => expr_type_local(scope, state, value),
            AssignOp::Concat => TypeSet::concrete("string"),
            AssignOp::Bitwise => TypeSet::concrete("int"),
            AssignOp::Arithmetic => arithmetic_type(scope, state, target, value),
            AssignOp::Coalesce => {
                expr_type_local(scope, state, target).union(&expr_type_local(scope, state, value))
            }
        },
        ExprKind::Binary { op, left, right } => match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
                arithmetic_type(scope, state, left, right)
            }
            BinaryOp::Concat => TypeSet::concrete("string"),
            BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::ShiftLeft
            | BinaryOp::ShiftRight
            | BinaryOp::Spaceship => TypeSet::concrete("int"),
            BinaryOp::And | BinaryOp::Or | BinaryOp::LowOr => TypeSet::concrete("bool"),
            BinaryOp::Coalesce => {
                expr_type_local(scope, state, left).union(&expr_type_local(scope, state, right))
            }
            op if op.is_comparison() => TypeSet::concrete("bool"),
            _ => TypeSet::new(),
        },
        ExprKind::Unary { op, operand } => match op {
            UnaryOp::Not => TypeSet::concrete("bool"),
            UnaryOp::BitNot => TypeSet::concrete("int"),
            UnaryOp::Cast(target) => match target.as_str() {
                "array" => TypeSet::concrete("mixed[]"),
                "object" => TypeSet::concrete("\\stdClass"),
                other => TypeSet::concrete(other),
            },
            UnaryOp::Negate | UnaryOp::Plus => {
                let inner = expr_type_local(scope, state, operand);
                if inner.is("int") {
                    inner
                } else {
                    TypeSet::concrete("float")
                }
            }
            UnaryOp::Other => TypeSet::new(),
            _ => expr_type_local(scope, state, operand),
        },
        ExprKind::InstanceOf { .. } | ExprKind::Isset(_) | ExprKind::Empty(_) => TypeSet::concrete("bool"),
        ExprKind::Ternary { cond, then, otherwise } => {
            let first = match then {
                Some(then) => expr_type_local(scope, state, then),
                None => expr_type_local(scope, state, cond),
            };
            first.union(&expr_type_local(scope, state, otherwise))
        }
        ExprKind::Call { callee, .. } => match callee {
            Callee::Name(name) => {
                let (fqn, _) = state.resolve_function_name(name);
                TypeSet::single(TypeValue::FunctionCall(fqn))
            }
            Callee::Expr(_) => TypeSet::new(),
        },
        ExprKind::MethodCall {
            object,
            method: Some(method),
            ..
        } => expr_type_local(scope, state, object)
            .map(|v| TypeValue::instance_method_call(v.clone(), method.clone())),
        ExprKind::PropertyFetch {
            object,
            property: Some(property),
            ..
        } => expr_type_local(scope, state, object)
            .map(|v| TypeValue::instance_property(v.clone(), property.clone())),
        ExprKind::StaticCall {
            class,
            method: Some(method),
            ..
        } => match class_ref_name(state, class) {
            Some(class) => TypeSet::single(TypeValue::static_method_call(class, method.clone())),
            None => TypeSet::new(),
        },
        ExprKind::StaticPropertyFetch {
            class,
            property: Some(property),
        } => match class_ref_name(state, class) {
            Some(class) => TypeSet::single(TypeValue::static_property(class, property.clone())),
            None => TypeSet::new(),
        },
        ExprKind::ClassConstFetch { class, constant } => {
            if constant.eq_ignore_ascii_case("class") {
                return TypeSet::concrete("string");
            }
            match class_ref_name(state, class) {
                Some(class) => TypeSet::single(TypeValue::class_constant(class, constant.clone())),
                None => TypeSet::new(),
            }
        }
        ExprKind::ConstFetch(name) => {
            let (fqn, _) = state.resolve_constant_name(name);
            TypeSet::single(TypeValue::Constant(fqn))
        }
        ExprKind::New { class, .. } => match class_ref_name(state, class) {
            Some(class) => TypeSet::concrete(class),
            None => TypeSet::new(),
        },
        ExprKind::Closure(_) | ExprKind::ArrowFunction(_) => TypeSet::concrete("\\Closure"),
        ExprKind::Match { arms, .. } => {
            let mut result = TypeSet::new();
            for arm in arms {
                result.append(&expr_type_local(scope, state, &arm.body));
            }
            result
        }
        ExprKind::Print(_) => TypeSet::concrete("int"),
        ExprKind::Yield { .. } | ExprKind::YieldFrom(_) | ExprKind::Include(_) => TypeSet::concrete("mixed"),
        _ => TypeSet::new(),
    }
}

fn arithmetic_type(scope: &Scope, state: &ClassParseState, left: &Expr, right: &Expr) -> TypeSet {
    if expr_type_local(scope, state, left).is("int") && expr_type_local(scope, state, right).is("int") {
        TypeSet::concrete("int")
    } else {
        TypeSet::concrete("float")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phpverify_core::ir::{ArrayItem, Span};

    fn e(kind: ExprKind) -> Expr {
        Expr::new(kind, Span::default())
    }

    fn item(kind: ExprKind) -> ArrayItem {
        ArrayItem {
            key: None,
            value: e(kind),
            by_ref: false,
            unpack: false,
        }
    }

    #[test]
    fn test_literals() {
        let scope = Scope::new();
        let state = ClassParseState::new();
        assert_eq!(expr_type_local(&scope, &state, &e(ExprKind::Int)).to_string(), "int");
        assert_eq!(expr_type_local(&scope, &state, &e(ExprKind::Null)).to_string(), "null");
        assert_eq!(
            expr_type_local(&scope, &state, &e(ExprKind::Array(vec![item(ExprKind::Int), item(ExprKind::Int)])))
                .to_string(),
            "int[]"
        );
        assert_eq!(
            expr_type_local(&scope, &state, &e(ExprKind::Array(vec![item(ExprKind::Int), item(ExprKind::Null)])))
                .to_string(),
            "mixed[]"
        );
        assert_eq!(expr_type_local(&scope, &state, &e(ExprKind::Array(vec![]))).to_string(), EMPTY_ARRAY);
    }

    #[test]
    fn test_arithmetic() {
        let scope = Scope::new();
        let state = ClassParseState::new();
        let add = |right| {
            e(ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(e(ExprKind::Int)),
                right: Box::new(e(right)),
            })
        };
        assert_eq!(expr_type_local(&scope, &state, &add(ExprKind::Int)).to_string(), "int");
        assert_eq!(expr_type_local(&scope, &state, &add(ExprKind::Float)).to_string(), "float");
    }

    #[test]
    fn test_namespaced_function_call() {
        let scope = Scope::new();
        let state = ClassParseState::for_namespace(Some("App"));
        let call = e(ExprKind::Call {
            callee: Callee::Name("helper".into()),
            args: vec![],
        });
        assert_eq!(expr_type_local(&scope, &state, &call).to_string(), "\\App\\helper()");
    }

    #[test]
    fn test_method_call_on_variable() {
        let mut scope = Scope::new();
        scope.add_var("$a", TypeSet::concrete("\\A"), true);
        let state = ClassParseState::new();
        let call = e(ExprKind::MethodCall {
            object: Box::new(e(ExprKind::Var("$a".into()))),
            method: Some("run".into()),
            args: vec![],
            nullsafe: false,
        });
        assert_eq!(expr_type_local(&scope, &state, &call).to_string(), "(\\A)->run()");
    }

    #[test]
    fn test_expr_type_resolves_after_indexing() {
        let index = SymbolIndex::with_builtins();
        let scope = Scope::new();
        let state = ClassParseState::new();
        let call = e(ExprKind::Call {
            callee: Callee::Name("strlen".into()),
            args: vec![],
        });
        assert_eq!(expr_type(&index, &scope, &state, &call).to_string(), "\\strlen()");
        index.set_indexing_complete(true);
        assert_eq!(expr_type(&index, &scope, &state, &call).to_string(), "int");

        let unknown = e(ExprKind::Call {
            callee: Callee::Name("nope".into()),
            args: vec![],
        });
        assert_eq!(expr_type(&index, &scope, &state, &unknown).to_string(), "mixed");
    }
}
