//! Declaration pass over one file
//!
//! Registers every function, class-like and constant of a file into a
//! [`FileMeta`], walking each body with a [`BlockWalker`] to infer return
//! types and exit flags. The pseudo-main code is walked as one block whose
//! variables become the file's globals.

use phpverify_core::ir::{
    Callee, ClassDecl, ConstItem, Expr, ExprKind, FunctionDecl, Member, MethodDecl, Param, Span, Stmt, StmtKind,
    UnaryOp, UseKind,
};
use phpverify_core::{walk_stmt, ParseError, ParsedFile, Visitor};

use super::block::{BlockWalker, BodySummary, PropertyAssignment, WalkEnv};
use super::params::{bind_params, describe_params, min_params, BaseMethod};
use super::report::Reporter;
use super::{is_superglobal, DISABLE_MARKER};
use crate::issue::{Issue, Severity};
use crate::scope::{ClassParseState, Scope};
use crate::solver::expr_type_local;
use crate::symbols::{
    AccessLevel, ClassInfo, ClassKind, ConstInfo, ConstValue, ElementPosition, FileMeta, FunctionInfo, PropertyInfo,
};
use crate::types::hint::parse_hint;
use crate::types::{TypeSet, TypeValue};

/// Symbols and diagnostics of one file
#[derive(Debug, Clone, Default)]
pub struct FileResult {
    pub meta: FileMeta,
    /// In source order
    pub issues: Vec<Issue>,
}

/// A function-like body to declare
struct Signature<'s> {
    name: &'s str,
    span: Span,
    params: &'s [Param],
    return_hint: Option<&'s str>,
    body: Option<&'s [Stmt]>,
}

pub struct RootWalker<'a> {
    env: WalkEnv<'a>,
    filename: String,
    source: &'a str,
    reporter: Reporter,
    meta: FileMeta,
}

impl<'a> RootWalker<'a> {
    /// `report` is false during indexing: everything reported is dropped
    pub fn new(env: WalkEnv<'a>, filename: &str, source: &'a str, report: bool) -> Self {
        let mut reporter = Reporter::new(filename, source, report);
        if source.contains(DISABLE_MARKER) && env.options.allows_disable(filename) {
            reporter.set_enabled(false);
        }
        Self {
            env,
            filename: filename.to_string(),
            source,
            reporter,
            meta: FileMeta::new(),
        }
    }

    pub fn walk_file(mut self, parsed: &ParsedFile) -> FileResult {
        for error in &parsed.errors {
            self.report_parse_error(error);
        }

        let mut states = vec![ClassParseState::new()];
        let mut current = ClassParseState::new();
        let mut plan = Vec::new();
        plan_statements(&parsed.file.statements, &mut current, &mut states, &mut plan);

        let mut finder = DeclarationFinder::default();
        for &(state, stmt) in &plan {
            match &stmt.kind {
                StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Const(_) => {
                    self.declare(stmt, &states[state]);
                }
                _ => {
                    finder.state = state;
                    walk_stmt(&mut finder, std::slice::from_ref(stmt));
                }
            }
        }
        for (state, stmt) in &finder.nested {
            self.declare(stmt, &states[*state]);
        }
        for define in &finder.defines {
            self.declare_define(define, &states[define.state]);
        }

        let env = self.env;
        let summary = {
            let mut walker = BlockWalker::new_root(env, &states[0], &mut self.reporter);
            for &(state, stmt) in &plan {
                walker.set_state(&states[state]);
                walker.walk_stmts(std::slice::from_ref(stmt));
            }
            walker.finish()
        };
        for (name, var) in summary.scope.iter() {
            if !is_superglobal(name) {
                self.meta.globals.insert(name.clone(), var.types.clone());
            }
        }

        // unused variables are reported when their body ends
        let mut issues = self.reporter.into_issues();
        issues.sort_by_key(|issue| (issue.line, issue.start_char));
        FileResult {
            meta: self.meta,
            issues,
        }
    }

    fn report_parse_error(&mut self, error: &ParseError) {
        let offset = error.offset();
        let message = match error {
            ParseError::Syntax { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.reporter
            .report(Span::new(offset, offset), Severity::Error, "parse", message);
    }

    fn position(&self, span: Span) -> ElementPosition {
        ElementPosition::new(&self.filename, self.reporter.line(span.start), span.start, span.end)
    }

    fn declare(&mut self, stmt: &Stmt, state: &ClassParseState) {
        match &stmt.kind {
            StmtKind::Function(func) => self.declare_function(func, state),
            StmtKind::Class(class) => self.declare_class(class, state),
            StmtKind::Const(items) => self.declare_constants(items, state),
            _ => {}
        }
    }

    fn declare_function(&mut self, func: &FunctionDecl, state: &ClassParseState) {
        let name = state.in_namespace(&func.name);
        let function_state = state.with_function(&name);
        let signature = Signature {
            name: &name,
            span: func.span,
            params: &func.params,
            return_hint: func.return_hint.as_deref(),
            body: Some(&func.body),
        };
        let (info, _) = self.walk_function_like(&signature, &function_state, None, None);
        self.meta.add_function(info);
    }

    /// Walk a body and describe it; property assignments are returned for
    /// the enclosing class
    fn walk_function_like(
        &mut self,
        signature: &Signature<'_>,
        state: &ClassParseState,
        base: Option<&BaseMethod<'_>>,
        this: Option<&str>,
    ) -> (FunctionInfo, Vec<PropertyAssignment>) {
        let params = describe_params(state, signature.params, base);
        let mut info = FunctionInfo::new(signature.name, self.position(signature.span))
            .with_min_params(min_params(signature.params));
        info.params = params.clone();

        let hint = match signature.return_hint {
            Some(hint) => parse_hint(hint, state),
            None => TypeSet::new(),
        };
        let Some(body) = signature.body else {
            info.typ = hint;
            return (info, Vec::new());
        };

        let mut scope = Scope::new();
        bind_params(&mut scope, &params);
        if let Some(class) = this {
            scope.add_var("$this", TypeSet::concrete(class), true);
            scope.set_in_instance_method(true);
        }

        let env = self.env;
        let summary = {
            let mut walker = BlockWalker::new(env, state, &mut self.reporter, scope);
            for param in params.iter().filter(|p| p.by_ref) {
                walker.mark_non_local(&param.name);
            }
            walker.walk_body(body);
            walker.finish()
        };

        info.typ = return_type(hint, &summary);
        info.exit_flags = summary.exit_flags;
        info.is_pure = summary.is_pure;
        (info, summary.property_assignments)
    }

    fn declare_class(&mut self, class: &ClassDecl, state: &ClassParseState) {
        use phpverify_core::ir::ClassKind as DeclKind;

        let name = state.in_namespace(&class.name);
        let kind = match class.kind {
            DeclKind::Class => ClassKind::Class,
            DeclKind::Interface => ClassKind::Interface,
            DeclKind::Trait => ClassKind::Trait,
            DeclKind::Enum => ClassKind::Enum,
        };
        let parent = match kind {
            ClassKind::Class => class.extends.first().map(|p| state.resolve_class_name(p)),
            _ => None,
        };
        let class_state = state.with_class(&name, parent.as_deref().unwrap_or(""), kind == ClassKind::Trait);

        let mut info = ClassInfo::new(&name, self.position(class.span));
        info.kind = kind;
        info.is_abstract = class.is_abstract;
        info.is_final = class.is_final || kind == ClassKind::Enum;
        info.parent = parent;
        if kind == ClassKind::Interface {
            info.parent_interfaces = class
                .extends
                .iter()
                .map(|i| state.resolve_class_name(i))
                .collect();
        }
        info.interfaces = class
            .implements
            .iter()
            .map(|i| state.resolve_class_name(i))
            .collect();
        if kind == ClassKind::Enum {
            info.interfaces.insert("\\UnitEnum".to_string());
            if class.backed.is_some() {
                info.interfaces.insert("\\BackedEnum".to_string());
            }
        }
        let has_interfaces = !info.interfaces.is_empty();

        let mut assignments = Vec::new();
        for member in &class.members {
            match member {
                Member::Method(method) => {
                    let base = BaseMethod {
                        class: &name,
                        method: &method.name,
                    };
                    let (method_info, assigned) =
                        self.declare_method(method, &class_state, has_interfaces.then_some(&base), kind, &mut info);
                    assignments.extend(assigned);
                    info.add_method(method_info);
                }
                Member::Property(prop) => {
                    let hint = match &prop.hint {
                        Some(hint) => parse_hint(hint, &class_state),
                        None => TypeSet::new(),
                    };
                    for item in &prop.items {
                        let key = if prop.is_static {
                            item.name.clone()
                        } else {
                            item.name.trim_start_matches('$').to_string()
                        };
                        let mut typ = hint.clone();
                        if let Some(default) = &item.default {
                            typ.append(&expr_type_local(&Scope::new(), &class_state, default));
                        }
                        info.properties.insert(
                            key,
                            PropertyInfo {
                                pos: self.position(item.span),
                                typ,
                                access: prop.visibility.into(),
                            },
                        );
                    }
                }
                Member::Constant(constants) => {
                    for item in &constants.items {
                        let constant = self.describe_constant(item, &class_state, constants.visibility.into());
                        info.constants.insert(item.name.clone(), constant);
                    }
                }
                Member::EnumCase { name: case, span, .. } => {
                    info.constants.insert(
                        case.clone(),
                        ConstInfo {
                            pos: self.position(*span),
                            typ: TypeSet::concrete(&name),
                            access: AccessLevel::Public,
                            value: None,
                        },
                    );
                }
                Member::TraitUse(traits) => {
                    for used in traits {
                        info.traits.insert(class_state.resolve_class_name(used));
                    }
                }
            }
        }

        for assignment in assignments {
            if let Some(prop) = info.properties.get_mut(&assignment.name) {
                prop.typ = prop.typ.union(&assignment.types);
            }
        }
        self.meta.add_class(info);
    }

    fn declare_method(
        &mut self,
        method: &MethodDecl,
        class_state: &ClassParseState,
        base: Option<&BaseMethod<'_>>,
        kind: ClassKind,
        class: &mut ClassInfo,
    ) -> (FunctionInfo, Vec<PropertyAssignment>) {
        let method_state = class_state.with_function(&method.name);
        let signature = Signature {
            name: &method.name,
            span: method.span,
            params: &method.params,
            return_hint: method.return_hint.as_deref(),
            body: method.body.as_deref(),
        };
        let this = if method.is_static {
            None
        } else {
            Some(class_state.current_class.as_str())
        };
        let (mut info, assigned) = self.walk_function_like(&signature, &method_state, base, this);
        info.access = method.visibility.into();
        info.is_static = method.is_static;
        info.is_abstract = method.is_abstract || kind == ClassKind::Interface;
        info.is_final = method.is_final;

        if method.name.eq_ignore_ascii_case("__construct") {
            for (param, described) in method.params.iter().zip(&info.params) {
                let Some(visibility) = param.promoted else {
                    continue;
                };
                class.properties.insert(
                    param.name.trim_start_matches('$').to_string(),
                    PropertyInfo {
                        pos: self.position(param.span),
                        typ: described.types.clone(),
                        access: visibility.into(),
                    },
                );
            }
        }
        (info, assigned)
    }

    fn describe_constant(&self, item: &ConstItem, state: &ClassParseState, access: AccessLevel) -> ConstInfo {
        ConstInfo {
            pos: self.position(item.span),
            typ: expr_type_local(&Scope::new(), state, &item.value),
            access,
            value: fold_constant(&item.value, self.source),
        }
    }

    fn declare_constants(&mut self, items: &[ConstItem], state: &ClassParseState) {
        for item in items {
            let constant = self.describe_constant(item, state, AccessLevel::Public);
            self.meta
                .add_constant(&state.in_namespace(&item.name), constant);
        }
    }

    /// `define('NAME', value)` always declares a global name
    fn declare_define(&mut self, define: &Define, state: &ClassParseState) {
        let constant = ConstInfo {
            pos: self.position(define.span),
            typ: expr_type_local(&Scope::new(), state, &define.value),
            access: AccessLevel::Public,
            value: fold_constant(&define.value, self.source),
        };
        self.meta.add_constant(&define.name, constant);
    }
}

/// Split top-level statements by the naming context they run in
fn plan_statements<'s>(
    stmts: &'s [Stmt],
    state: &mut ClassParseState,
    states: &mut Vec<ClassParseState>,
    plan: &mut Vec<(usize, &'s Stmt)>,
) {
    for stmt in stmts {
        match &stmt.kind {
            StmtKind::Namespace { name, body } => {
                let mut inner = ClassParseState::for_namespace(name.as_deref());
                states.push(inner.clone());
                plan_statements(body, &mut inner, states, plan);
                states.push(state.clone());
            }
            StmtKind::Use(items) => {
                for item in items {
                    let alias = match &item.alias {
                        Some(alias) => alias.clone(),
                        None => item.name.rsplit('\\').next().unwrap_or(&item.name).to_string(),
                    };
                    match item.kind {
                        UseKind::Class => state.add_use(&alias, &item.name),
                        UseKind::Function => state.add_function_use(&alias, &item.name),
                        UseKind::Const => state.add_const_use(&alias, &item.name),
                    }
                }
                states.push(state.clone());
            }
            _ => plan.push((states.len() - 1, stmt)),
        }
    }
}

/// Declared return type joined with what the body returns
fn return_type(hint: TypeSet, summary: &BodySummary) -> TypeSet {
    let mut typ = hint;
    if summary.returns_value {
        typ.append(&summary.return_types);
        if summary.bare_return {
            typ.insert(TypeValue::concrete("null"));
        }
    } else if typ.is_empty() {
        typ = TypeSet::void();
    }
    typ
}

/// Value of a literal initializer
fn fold_constant(expr: &Expr, source: &str) -> Option<ConstValue> {
    match &expr.unparen().kind {
        ExprKind::Str(Some(text)) => Some(ConstValue::Str(text.clone())),
        ExprKind::Bool(value) => Some(ConstValue::Bool(*value)),
        ExprKind::Int | ExprKind::Float => {
            let text = source.get(expr.span.start as usize..expr.span.end as usize)?;
            parse_number(&text.trim().replace('_', ""))
        }
        ExprKind::Unary {
            op: UnaryOp::Negate,
            operand,
        } => match fold_constant(operand, source)? {
            ConstValue::Int(value) => Some(ConstValue::Int(-value)),
            ConstValue::Float(value) => Some(ConstValue::Float(-value)),
            _ => None,
        },
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<ConstValue> {
    let lower = text.to_ascii_lowercase();
    let radix = |digits: &str, radix| i64::from_str_radix(digits, radix).ok().map(ConstValue::Int);
    if let Some(hex) = lower.strip_prefix("0x") {
        return radix(hex, 16);
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return radix(bin, 2);
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return radix(oct, 8);
    }
    if lower.len() > 1 && lower.starts_with('0') && lower.bytes().all(|b| b.is_ascii_digit()) {
        return radix(&lower[1..], 8);
    }
    if let Ok(value) = lower.parse::<i64>() {
        return Some(ConstValue::Int(value));
    }
    lower.parse::<f64>().ok().map(ConstValue::Float)
}

struct Define {
    state: usize,
    name: String,
    value: Expr,
    span: Span,
}

/// Declarations nested in top-level control flow, and `define()` calls
#[derive(Default)]
struct DeclarationFinder {
    state: usize,
    nested: Vec<(usize, Stmt)>,
    defines: Vec<Define>,
}

impl Visitor for DeclarationFinder {
    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        if matches!(stmt.kind, StmtKind::Function(_) | StmtKind::Class(_)) {
            self.nested.push((self.state, stmt.clone()));
            return false;
        }
        true
    }

    fn visit_expr(&mut self, expr: &Expr) -> bool {
        if let ExprKind::Call {
            callee: Callee::Name(name),
            args,
        } = &expr.kind
        {
            if name.trim_start_matches('\\').eq_ignore_ascii_case("define") && args.len() >= 2 {
                if let ExprKind::Str(Some(constant)) = &args[0].value.kind {
                    self.defines.push(Define {
                        state: self.state,
                        name: constant.clone(),
                        value: args[1].value.clone(),
                        span: expr.span,
                    });
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linter::{ExitFlags, LintOptions};
    use crate::symbols::SymbolIndex;
    use phpverify_core::parse_source;

    fn declare(code: &str) -> FileResult {
        let index = SymbolIndex::with_builtins();
        let options = LintOptions::default();
        let env = WalkEnv {
            index: &index,
            options: &options,
        };
        let parsed = parse_source("t.php", code).unwrap();
        RootWalker::new(env, "t.php", code, true).walk_file(&parsed)
    }

    #[test]
    fn test_function_return_types() {
        let result = declare(
            "<?php
function a(): int { return 1; }
function nothing() { echo 1; }
function either($c) { if ($c) { return 1; } return 'x'; }
",
        );
        let functions = &result.meta.functions;
        assert_eq!(functions["\\a"].typ.to_string(), "int");
        assert_eq!(functions["\\nothing"].typ.to_string(), "void");
        assert_eq!(functions["\\either"].typ.to_string(), "int|string");
        assert!(!functions["\\nothing"].is_pure);
    }

    #[test]
    fn test_exit_flags_of_functions() {
        let result = declare(
            "<?php
function fail() { throw new \\Exception('x'); }
function stop() { exit(1); }
function mixed_exit($c) { if ($c) { return 1; } throw new \\Exception('x'); }
",
        );
        let functions = &result.meta.functions;
        assert_eq!(functions["\\fail"].exit_flags, ExitFlags::THROW);
        assert_eq!(functions["\\stop"].exit_flags, ExitFlags::DIE);
        assert!(functions["\\mixed_exit"].exit_flags.is_empty());
    }

    #[test]
    fn test_namespaced_declarations() {
        let result = declare(
            "<?php
namespace App\\Util;

const LIMIT = 0x10;

function helper() { return LIMIT; }

class Box {}
",
        );
        assert!(result.meta.functions.contains_key("\\app\\util\\helper"));
        assert!(result.meta.classes.contains_key("\\app\\util\\box"));
        let limit = &result.meta.constants["\\App\\Util\\LIMIT"];
        assert_eq!(limit.value, Some(ConstValue::Int(16)));
    }

    #[test]
    fn test_class_members() {
        let result = declare(
            "<?php
interface Shape { public function area(): float; }
class Square implements Shape {
    const SIDES = 4;
    public static $count = 0;
    private $items = [];
    public function __construct(private int $size) { $this->items = ['a']; }
    public function area(): float { return $this->size * $this->size; }
    public static function make(int $size): static { return new static($size); }
}
",
        );
        let square = &result.meta.classes["\\square"];
        assert!(square.interfaces.contains("\\Shape"));
        assert_eq!(square.constants["SIDES"].value, Some(ConstValue::Int(4)));
        assert_eq!(square.properties["$count"].typ.to_string(), "int");
        assert_eq!(square.properties["size"].typ.to_string(), "int");
        assert_eq!(square.properties["size"].access, AccessLevel::Private);
        assert!(square.properties["items"].typ.contains_name("string[]"));
        let make = square.get_method("make").unwrap();
        assert!(make.is_static);
        assert_eq!(make.min_params, 1);

        let shape = &result.meta.classes["\\shape"];
        assert!(shape.get_method("area").unwrap().is_abstract);
    }

    #[test]
    fn test_enum_registration() {
        let result = declare(
            "<?php
enum Suit: string {
    case Hearts = 'H';
    case Spades = 'S';
}
",
        );
        let suit = &result.meta.classes["\\suit"];
        assert!(suit.is_final);
        assert!(suit.interfaces.contains("\\UnitEnum"));
        assert!(suit.interfaces.contains("\\BackedEnum"));
        assert_eq!(suit.constants["Hearts"].typ.to_string(), "\\Suit");
    }

    #[test]
    fn test_globals_and_define() {
        let result = declare(
            "<?php
$config = [1, 2];
define('VERSION', '1.0');
if (!function_exists('polyfill')) {
    function polyfill() { return true; }
}
",
        );
        assert_eq!(result.meta.globals["$config"].to_string(), "int[]");
        assert_eq!(
            result.meta.constants["\\VERSION"].value,
            Some(ConstValue::Str("1.0".to_string()))
        );
        assert!(result.meta.functions.contains_key("\\polyfill"));
    }

    #[test]
    fn test_issues_in_source_order() {
        let result = declare(
            "<?php
function f() {
    $unused = 1;
    return;
    echo 1;
}
",
        );
        let found: Vec<(usize, &str)> = result
            .issues
            .iter()
            .map(|i| (i.line, i.check_name.as_str()))
            .collect();
        assert_eq!(found, vec![(3, "unused"), (5, "deadCode")]);
    }

    #[test]
    fn test_parse_error_reported() {
        let result = declare("<?php\nfunction ( {\n");
        assert!(result.issues.iter().any(|i| i.check_name == "parse"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0b101"), Some(ConstValue::Int(5)));
        assert_eq!(parse_number("017"), Some(ConstValue::Int(15)));
        assert_eq!(parse_number("1.5"), Some(ConstValue::Float(1.5)));
        assert_eq!(parse_number("1e3"), Some(ConstValue::Float(1000.0)));
    }
}
