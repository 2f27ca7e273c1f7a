//! Control-flow sensitive walk over one body
//!
//! A [`BlockWalker`] walks the statements of a function, method, closure or
//! the pseudo-main code of a file in a single forward pass. It keeps a
//! [`BlockContext`] per block, reports undefined, unused and unreachable
//! code, and collects what the declaration pass needs: return types, exit
//! flags, purity and property assignments.

mod condition;
mod context;
mod flow;

pub use context::BlockContext;

use std::collections::{HashMap, HashSet};

use phpverify_core::ir::{
    ArrayItem, ArrowFunctionDecl, AssignOp, BinaryOp, Callee, ClassRef, ClosureDecl, Expr, ExprKind, Span, Stmt,
    StmtKind,
};

use super::params::{bind_params, describe_params};
use super::report::Reporter;
use super::{is_superglobal, ExitFlags, LintOptions};
use crate::issue::Severity;
use crate::scope::{ClassParseState, Scope};
use crate::solver::{class_ref_name, expr_type, expr_type_local, find_method, instance_of, FoundMethod};
use crate::symbols::{FuncParam, SymbolIndex};
use crate::types::predicates::is_class;
use crate::types::{TypeSet, TypeValue, EMPTY_ARRAY, UNDEFINED};

/// Read-only inputs shared by every walker of a run
#[derive(Clone, Copy)]
pub struct WalkEnv<'a> {
    pub index: &'a SymbolIndex,
    pub options: &'a LintOptions,
}

/// Assignment to a property of the class being declared
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAssignment {
    /// Bare for instance properties, with `$` for static ones
    pub name: String,
    pub is_static: bool,
    pub types: TypeSet,
}

/// What a finished walk learned about the body
#[derive(Debug, Clone)]
pub struct BodySummary {
    pub scope: Scope,
    /// Union of the types of every `return expr;`
    pub return_types: TypeSet,
    pub returns_value: bool,
    pub bare_return: bool,
    /// Non-empty only when every path ends in `throw` or `die`
    pub exit_flags: ExitFlags,
    pub is_pure: bool,
    pub property_assignments: Vec<PropertyAssignment>,
}

pub struct BlockWalker<'a> {
    env: WalkEnv<'a>,
    state: &'a ClassParseState,
    reporter: &'a mut Reporter,
    ctx: BlockContext,
    /// Writes not read yet, by variable
    unused_vars: HashMap<String, Vec<Span>>,
    /// Bound by reference, `global` or `static`
    non_local_vars: HashSet<String>,
    return_types: TypeSet,
    returns_value: bool,
    bare_return: bool,
    suppress_unused: bool,
    suppress_undefined: bool,
    is_pure: bool,
    root_level: bool,
    /// Enclosing scopes visible to an arrow function, innermost first
    arrow_parents: Vec<Scope>,
    /// Names an arrow function read; the enclosing walkers stop tracking them
    captured: Vec<String>,
    property_assignments: Vec<PropertyAssignment>,
}

impl<'a> BlockWalker<'a> {
    pub fn new(env: WalkEnv<'a>, state: &'a ClassParseState, reporter: &'a mut Reporter, scope: Scope) -> Self {
        Self {
            env,
            state,
            reporter,
            ctx: BlockContext::new(scope),
            unused_vars: HashMap::new(),
            non_local_vars: HashSet::new(),
            return_types: TypeSet::new(),
            returns_value: false,
            bare_return: false,
            suppress_unused: false,
            suppress_undefined: false,
            is_pure: true,
            root_level: false,
            arrow_parents: Vec::new(),
            captured: Vec::new(),
            property_assignments: Vec::new(),
        }
    }

    /// Walker for the pseudo-main code of a file.
    ///
    /// Unused variables are not reported there: they may be read by any
    /// included file.
    pub fn new_root(env: WalkEnv<'a>, state: &'a ClassParseState, reporter: &'a mut Reporter) -> Self {
        let mut walker = Self::new(env, state, reporter, Scope::new());
        walker.root_level = true;
        walker
    }

    /// Switch the naming context, used when pseudo-main code spans namespaces
    pub fn set_state(&mut self, state: &'a ClassParseState) {
        self.state = state;
    }

    pub fn scope(&self) -> &Scope {
        &self.ctx.scope
    }

    pub fn exit_flags(&self) -> ExitFlags {
        self.ctx.exit_flags
    }

    /// Exclude a variable from unused tracking
    pub fn mark_non_local(&mut self, name: &str) {
        self.non_local_vars.insert(name.to_string());
    }

    /// Walk a complete body, then report its unused variables
    pub fn walk_body(&mut self, stmts: &[Stmt]) {
        self.walk_stmts(stmts);
        if !self.root_level {
            self.flush_unused();
        }
    }

    pub fn walk_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    pub fn finish(self) -> BodySummary {
        let exit = self.ctx.exit_flags;
        let abnormal = exit.intersection(ExitFlags::DIE | ExitFlags::THROW);
        let exit_flags = if exit == abnormal && !self.ctx.contains_exit_flags.contains(ExitFlags::RETURN) {
            abnormal
        } else {
            ExitFlags::empty()
        };

        BodySummary {
            scope: self.ctx.scope,
            return_types: self.return_types,
            returns_value: self.returns_value,
            bare_return: self.bare_return,
            exit_flags,
            is_pure: self.is_pure,
            property_assignments: self.property_assignments,
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        if !self.ctx.exit_flags.is_empty() {
            self.report_dead_code(stmt);
        }

        match &stmt.kind {
            StmtKind::Expr(expr) => self.walk_expr(expr),
            StmtKind::Echo(exprs) => {
                self.is_pure = false;
                for expr in exprs {
                    self.walk_expr(expr);
                }
            }
            StmtKind::Return(value) => self.handle_return(value.as_ref()),
            StmtKind::Break => self.ctx.mark_exit(ExitFlags::BREAK),
            StmtKind::Continue => self.ctx.mark_exit(ExitFlags::CONTINUE),
            StmtKind::Block(body) => self.walk_stmts(body),
            StmtKind::If(if_stmt) => self.handle_if(if_stmt),
            StmtKind::While { cond, body } => {
                self.walk_expr(cond);
                self.walk_loop_body(body);
            }
            StmtKind::DoWhile { body, cond } => self.handle_do_while(body, cond),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                for expr in init.iter().chain(cond).chain(step) {
                    self.walk_expr(expr);
                }
                self.walk_loop_body(body);
            }
            StmtKind::Foreach(foreach) => self.handle_foreach(foreach),
            StmtKind::Switch(switch) => self.handle_switch(switch),
            StmtKind::Try(try_stmt) => self.handle_try(try_stmt),
            StmtKind::Global(names) => {
                self.is_pure = false;
                for name in names {
                    let global = TypeValue::Global(name.trim_start_matches('$').to_string());
                    self.ctx.scope.replace_var(name, TypeSet::single(global), true);
                    self.non_local_vars.insert(name.clone());
                    self.untrack(name);
                }
            }
            StmtKind::Static(vars) => {
                self.is_pure = false;
                for var in vars {
                    let mut types = TypeSet::new();
                    if let Some(default) = &var.default {
                        self.walk_expr(default);
                        types = expr_type_local(&self.ctx.scope, self.state, default);
                    }
                    self.ctx.scope.add_var(&var.name, types, true);
                    self.non_local_vars.insert(var.name.clone());
                    self.untrack(&var.name);
                }
            }
            StmtKind::Unset(names) => {
                for name in names {
                    self.untrack(name);
                    self.ctx.scope.del_var(name);
                }
            }
            StmtKind::Const(items) => {
                for item in items {
                    self.walk_expr(&item.value);
                }
            }
            StmtKind::Namespace { .. }
            | StmtKind::Use(_)
            | StmtKind::Function(_)
            | StmtKind::Class(_)
            | StmtKind::Nop => {}
        }
    }

    fn report_dead_code(&mut self, stmt: &Stmt) {
        if self.ctx.dead_code_reported {
            return;
        }
        let exempt = match &stmt.kind {
            StmtKind::Break | StmtKind::Continue | StmtKind::Return(_) | StmtKind::Nop => true,
            StmtKind::Expr(expr) => matches!(expr.unparen().kind, ExprKind::Exit { .. } | ExprKind::Throw(_)),
            _ => stmt.is_declaration(),
        };
        if exempt {
            return;
        }
        self.ctx.dead_code_reported = true;
        self.reporter
            .report(stmt.span, Severity::Warning, "deadCode", "Unreachable code");
    }

    fn handle_return(&mut self, value: Option<&Expr>) {
        match value {
            Some(expr) => {
                self.walk_expr(expr);
                let types = expr_type_local(&self.ctx.scope, self.state, expr);
                self.return_types.append(&types);
                self.returns_value = true;
            }
            None => self.bare_return = true,
        }
        self.ctx.mark_exit(ExitFlags::RETURN);
    }

    /// Run `f` with `ctx` as the current block and hand the block back
    fn with_context(&mut self, ctx: BlockContext, f: impl FnOnce(&mut Self)) -> BlockContext {
        let saved = std::mem::replace(&mut self.ctx, ctx);
        f(self);
        std::mem::replace(&mut self.ctx, saved)
    }

    /// Walk an expression whose evaluation is conditional: it cannot end the block
    fn walk_conditional(&mut self, expr: &Expr) {
        let exit = self.ctx.exit_flags;
        self.walk_expr(expr);
        self.ctx.exit_flags = exit;
    }

    pub fn walk_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Var(name) => self.handle_variable(name, expr.span),
            ExprKind::DynamicVar(reads) | ExprKind::Interpolated(reads) | ExprKind::Opaque(reads) => {
                for name in reads {
                    self.handle_variable(name, expr.span);
                }
            }
            ExprKind::Print(reads) => {
                self.is_pure = false;
                for name in reads {
                    self.handle_variable(name, expr.span);
                }
            }
            ExprKind::Int
            | ExprKind::Float
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::MagicConst(_)
            | ExprKind::ConstFetch(_) => {}
            ExprKind::Paren(inner) | ExprKind::Clone(inner) => self.walk_expr(inner),
            ExprKind::Array(items) => {
                for item in items {
                    self.walk_array_item(item);
                }
            }
            ExprKind::List(items) => {
                for item in items.iter().flatten() {
                    self.walk_array_item(item);
                }
            }
            ExprKind::ArrayDim { base, index } => {
                self.check_array_access(base, expr.span);
                self.walk_expr(base);
                if let Some(index) = index {
                    self.walk_expr(index);
                }
            }
            ExprKind::Assign {
                target,
                value,
                op,
                by_ref,
            } => self.handle_assign(expr, target, value, op, *by_ref),
            ExprKind::Binary { op, left, right } => match op {
                BinaryOp::Coalesce => {
                    self.walk_isset_target(left);
                    self.walk_conditional(right);
                }
                BinaryOp::And | BinaryOp::Or | BinaryOp::LowOr => {
                    self.walk_expr(left);
                    self.walk_conditional(right);
                }
                _ => {
                    self.walk_expr(left);
                    self.walk_expr(right);
                }
            },
            ExprKind::Unary { operand, .. } => self.walk_expr(operand),
            ExprKind::InstanceOf { expr: inner, class } => {
                self.walk_expr(inner);
                self.walk_class_ref(class);
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => match then {
                Some(then) => self.handle_ternary(cond, then, otherwise),
                None => {
                    self.walk_expr(cond);
                    self.walk_conditional(otherwise);
                }
            },
            ExprKind::Call { callee, args } => self.handle_call(callee, args),
            ExprKind::MethodCall {
                object,
                method,
                args,
                ..
            } => {
                self.is_pure = false;
                self.walk_expr(object);
                let found = match method {
                    Some(method) => self.lookup_method_of_object(object, method),
                    None => None,
                };
                self.walk_call_args(args, found.as_ref().map(|f| f.info.params.as_slice()));
                if let Some(found) = &found {
                    self.apply_callee_exit(found.info.exit_flags);
                }
            }
            ExprKind::StaticCall { class, method, args } => {
                self.is_pure = false;
                self.walk_class_ref(class);
                let found = match (class_ref_name(self.state, class), method) {
                    (Some(class), Some(method)) => self.lookup_method(&class, method),
                    _ => None,
                };
                self.walk_call_args(args, found.as_ref().map(|f| f.info.params.as_slice()));
                if let Some(found) = &found {
                    self.apply_callee_exit(found.info.exit_flags);
                }
            }
            ExprKind::PropertyFetch { object, .. } => self.walk_expr(object),
            ExprKind::StaticPropertyFetch { class, .. } | ExprKind::ClassConstFetch { class, .. } => {
                self.walk_class_ref(class)
            }
            ExprKind::New { class, args } => {
                self.is_pure = false;
                self.walk_class_ref(class);
                let found = match class_ref_name(self.state, class) {
                    Some(class) => self.lookup_method(&class, "__construct"),
                    None => None,
                };
                self.walk_call_args(args, found.as_ref().map(|f| f.info.params.as_slice()));
            }
            ExprKind::Isset(values) => {
                for value in values {
                    self.walk_isset_target(value);
                }
            }
            ExprKind::Empty(inner) => self.walk_isset_target(inner),
            ExprKind::Exit { reads, .. } => {
                self.is_pure = false;
                for name in reads {
                    self.handle_variable(name, expr.span);
                }
                self.ctx.mark_exit(ExitFlags::DIE);
            }
            ExprKind::Include(inner) => {
                self.is_pure = false;
                self.walk_expr(inner);
            }
            ExprKind::Throw(inner) => {
                self.walk_expr(inner);
                self.ctx.mark_exit(ExitFlags::THROW);
            }
            ExprKind::Closure(closure) => self.enter_closure(closure),
            ExprKind::ArrowFunction(arrow) => self.enter_arrow_function(arrow),
            ExprKind::Match { subject, arms } => {
                self.walk_expr(subject);
                for arm in arms {
                    for cond in &arm.conditions {
                        self.walk_conditional(cond);
                    }
                    self.walk_conditional(&arm.body);
                }
            }
            ExprKind::Yield { key, value } => {
                self.is_pure = false;
                for part in key.iter().chain(value) {
                    self.walk_expr(part);
                }
            }
            ExprKind::YieldFrom(inner) => {
                self.is_pure = false;
                self.walk_expr(inner);
            }
        }
    }

    fn walk_array_item(&mut self, item: &ArrayItem) {
        if let Some(key) = &item.key {
            self.walk_expr(key);
        }
        self.walk_expr(&item.value);
    }

    fn walk_class_ref(&mut self, class: &ClassRef) {
        if let ClassRef::Dynamic(expr) = class {
            self.walk_expr(expr);
        }
    }

    /// Operand of `isset`, `empty` or the left side of `??`: may be undefined
    fn walk_isset_target(&mut self, expr: &Expr) {
        match &expr.unparen().kind {
            ExprKind::Var(name) => self.untrack(name),
            ExprKind::ArrayDim { base, index } => {
                self.walk_isset_target(base);
                if let Some(index) = index {
                    self.walk_expr(index);
                }
            }
            ExprKind::PropertyFetch { object, .. } => self.walk_isset_target(object),
            _ => self.walk_expr(expr),
        }
    }

    /// A read of `$name`
    fn handle_variable(&mut self, name: &str, span: Span) {
        if self.env.options.is_discard_var(name) && !is_superglobal(name) {
            self.reporter.report(
                span,
                Severity::Error,
                "discardVar",
                format!("Used var {} that is supposed to be unused", name),
            );
        }
        self.untrack(name);

        if self.ctx.scope.have_var(name) || is_superglobal(name) || self.suppress_undefined {
            return;
        }

        let mut maybe = self.ctx.scope.maybe_have_var(name);
        let captured = self
            .arrow_parents
            .iter()
            .find(|parent| parent.have_var(name))
            .and_then(|parent| parent.get_var_type(name).cloned());
        if let Some(types) = captured {
            self.ctx.scope.add_var(name, types, true);
            return;
        }
        maybe |= self.arrow_parents.iter().any(|parent| parent.maybe_have_var(name));

        if maybe {
            self.reporter.report(
                span,
                Severity::Warning,
                "undefined",
                format!("Variable might have not been defined: {}", name),
            );
        } else {
            self.reporter
                .report(span, Severity::Error, "undefined", format!("Undefined variable: {}", name));
        }
        self.ctx.scope.add_var(name, TypeSet::concrete(UNDEFINED), true);
    }

    /// Record a write that should be read later
    fn track_write(&mut self, name: &str, span: Span) {
        if self.non_local_vars.contains(name) {
            self.untrack(name);
            return;
        }
        if !self.ctx.inside_loop {
            self.unused_vars.entry(name.to_string()).or_default().push(span);
        }
    }

    fn untrack(&mut self, name: &str) {
        self.unused_vars.remove(name);
        if !self.arrow_parents.is_empty() {
            self.captured.push(name.to_string());
        }
    }

    fn flush_unused(&mut self) {
        if self.suppress_unused {
            self.unused_vars.clear();
            return;
        }

        let mut pending: Vec<(Span, String)> = Vec::new();
        for (name, spans) in self.unused_vars.drain() {
            if self.env.options.is_discard_var(&name) || is_superglobal(&name) {
                continue;
            }
            for span in spans {
                pending.push((span, name.clone()));
            }
        }
        pending.sort_by_key(|(span, _)| (span.start, span.end));
        pending.dedup_by_key(|(span, _)| *span);

        for (span, name) in pending {
            self.reporter.report(
                span,
                Severity::Warning,
                "unused",
                format!("Variable {} is unused (use $_ to ignore this inspection)", name),
            );
        }
    }

    fn handle_assign(&mut self, whole: &Expr, target: &Expr, value: &Expr, op: &AssignOp, by_ref: bool) {
        if by_ref {
            self.handle_assign_ref(target, value);
            return;
        }

        self.walk_expr(value);
        if matches!(op, AssignOp::Assign) {
            let types = expr_type_local(&self.ctx.scope, self.state, value);
            self.assign_to(target, types);
            return;
        }

        // compound assignment reads the target as well
        let types = expr_type_local(&self.ctx.scope, self.state, whole);
        match &target.unparen().kind {
            ExprKind::Var(name) => {
                self.ctx.scope.replace_var(name, types, true);
                self.untrack(name);
            }
            ExprKind::ArrayDim { base, index } => self.assign_dim(base, index.as_deref(), types, target.span),
            _ => self.assign_to(target, types),
        }
    }

    /// `$a = &$b`: both sides stop being block-local
    fn handle_assign_ref(&mut self, target: &Expr, value: &Expr) {
        match &value.unparen().kind {
            ExprKind::Var(name) => {
                if !self.ctx.scope.have_var(name) {
                    self.ctx.scope.add_var(name, TypeSet::concrete("null"), true);
                }
                self.non_local_vars.insert(name.clone());
                self.untrack(name);
            }
            _ => self.walk_expr(value),
        }

        let types = expr_type_local(&self.ctx.scope, self.state, value);
        match &target.unparen().kind {
            ExprKind::Var(name) => {
                self.ctx.scope.replace_var(name, types, true);
                self.non_local_vars.insert(name.clone());
                self.untrack(name);
            }
            _ => self.assign_to(target, types),
        }
    }

    fn assign_to(&mut self, target: &Expr, types: TypeSet) {
        match &target.kind {
            ExprKind::Var(name) => {
                self.ctx.scope.replace_var(name, types, true);
                self.track_write(name, target.span);
            }
            ExprKind::Paren(inner) => self.assign_to(inner, types),
            ExprKind::ArrayDim { base, index } => self.assign_dim(base, index.as_deref(), types, target.span),
            ExprKind::List(items) => {
                let items: Vec<&ArrayItem> = items.iter().flatten().collect();
                self.assign_list(&items, &types);
            }
            ExprKind::Array(items) => {
                let items: Vec<&ArrayItem> = items.iter().collect();
                self.assign_list(&items, &types);
            }
            ExprKind::PropertyFetch { object, property, .. } => {
                self.is_pure = false;
                let on_this = object.var_name() == Some("$this");
                match property {
                    Some(property) if on_this && !self.state.current_class.is_empty() => {
                        self.property_assignments.push(PropertyAssignment {
                            name: property.clone(),
                            is_static: false,
                            types,
                        });
                    }
                    _ => {}
                }
                self.walk_expr(object);
            }
            ExprKind::StaticPropertyFetch { class, property } => {
                self.is_pure = false;
                let own_class = !self.state.current_class.is_empty()
                    && class_ref_name(self.state, class).as_deref() == Some(self.state.current_class.as_str());
                if let (true, Some(property)) = (own_class, property) {
                    self.property_assignments.push(PropertyAssignment {
                        name: property.clone(),
                        is_static: true,
                        types,
                    });
                }
                self.walk_class_ref(class);
            }
            _ => self.walk_expr(target),
        }
    }

    /// `$base[$index] = value`
    fn assign_dim(&mut self, base: &Expr, index: Option<&Expr>, types: TypeSet, span: Span) {
        self.check_array_access(base, span);
        match &base.unparen().kind {
            ExprKind::Var(name) => {
                let array = types.array_of();
                let was_empty = self
                    .ctx
                    .scope
                    .get_var_type(name)
                    .map(|t| t.is(EMPTY_ARRAY))
                    .unwrap_or(false);
                if was_empty {
                    self.ctx.scope.replace_var(name, array, true);
                    self.untrack(name);
                } else {
                    self.ctx.scope.add_var(name, array, true);
                    self.handle_variable(name, base.span);
                }
            }
            ExprKind::ArrayDim {
                base: inner,
                index: inner_index,
            } => self.assign_dim(inner, inner_index.as_deref(), types.array_of(), base.span),
            _ => {
                if matches!(base.unparen().kind, ExprKind::PropertyFetch { .. } | ExprKind::StaticPropertyFetch { .. }) {
                    self.is_pure = false;
                }
                self.walk_expr(base);
            }
        }
        if let Some(index) = index {
            self.walk_expr(index);
        }
    }

    /// `[$a, 'k' => $b] = value`
    fn assign_list(&mut self, items: &[&ArrayItem], types: &TypeSet) {
        for (position, item) in items.iter().enumerate() {
            let key = match &item.key {
                Some(key) => {
                    self.walk_expr(key);
                    match &key.kind {
                        ExprKind::Str(Some(text)) => Some(text.clone()),
                        _ => None,
                    }
                }
                None => Some(position.to_string()),
            };
            let element = match key {
                Some(key) => types.map(|v| TypeValue::elem_of_key(v.clone(), key.clone())),
                None => types.elem_of(),
            };
            if item.by_ref {
                if let Some(name) = item.value.var_name() {
                    self.non_local_vars.insert(name.to_string());
                }
            }
            self.assign_to(&item.value, element);
        }
    }

    fn handle_call(&mut self, callee: &Callee, args: &[phpverify_core::ir::Arg]) {
        let name = match callee {
            Callee::Name(name) => name,
            Callee::Expr(expr) => {
                self.is_pure = false;
                self.walk_expr(expr);
                self.walk_call_args(args, None);
                return;
            }
        };

        let (fqn, fallback) = self.state.resolve_function_name(name);
        let index = self.env.index;
        let info = index
            .get_function(&fqn)
            .or_else(|| fallback.as_deref().and_then(|f| index.get_function(f)));
        let global = fallback.unwrap_or_else(|| fqn.clone()).to_ascii_lowercase();

        match global.as_str() {
            "\\compact" => {
                for arg in args {
                    self.read_compact_arg(&arg.value);
                }
                return;
            }
            "\\func_get_args" => self.suppress_unused = true,
            "\\extract" => {
                self.suppress_unused = true;
                self.suppress_undefined = true;
            }
            _ => {}
        }

        if !info.as_ref().map(|i| i.is_pure).unwrap_or(false) {
            self.is_pure = false;
        }
        self.walk_call_args(args, info.as_ref().map(|i| i.params.as_slice()));

        if let Some(info) = &info {
            self.apply_callee_exit(info.exit_flags);
        }

        let fatal_error = matches!(global.as_str(), "\\trigger_error" | "\\user_error")
            && args.len() == 2
            && matches!(&args[1].value.unparen().kind, ExprKind::ConstFetch(c) if c.trim_start_matches('\\') == "E_USER_ERROR");
        if fatal_error && !self.env.options.ignore_trigger_error {
            self.ctx.mark_exit(ExitFlags::DIE);
        }
    }

    /// `compact('a', ['b'])` reads `$a` and `$b`
    fn read_compact_arg(&mut self, expr: &Expr) {
        match &expr.unparen().kind {
            ExprKind::Str(Some(name)) => self.handle_variable(&format!("${}", name), expr.span),
            ExprKind::Array(items) => {
                for item in items {
                    self.read_compact_arg(&item.value);
                }
            }
            _ => self.walk_expr(expr),
        }
    }

    /// Arguments; those passed to by-reference parameters are defined by the call
    fn walk_call_args(&mut self, args: &[phpverify_core::ir::Arg], params: Option<&[FuncParam]>) {
        for (i, arg) in args.iter().enumerate() {
            let param = params.and_then(|p| p.get(i).or_else(|| p.last().filter(|last| last.variadic)));
            if let Some(param) = param.filter(|p| p.by_ref) {
                match &arg.value.unparen().kind {
                    ExprKind::Var(name) => {
                        let types = if param.types.is_empty() {
                            TypeSet::mixed()
                        } else {
                            param.types.clone()
                        };
                        self.ctx.scope.add_var(name, types, true);
                        self.non_local_vars.insert(name.clone());
                        self.untrack(name);
                        continue;
                    }
                    ExprKind::ArrayDim { base, index } => {
                        self.assign_dim(base, index.as_deref(), TypeSet::mixed(), arg.value.span);
                        continue;
                    }
                    _ => {}
                }
            }
            self.walk_expr(&arg.value);
        }
    }

    /// `class::method`, once the index can answer
    fn lookup_method(&self, class: &str, method: &str) -> Option<FoundMethod> {
        if !self.env.index.is_indexing_complete() {
            return None;
        }
        find_method(self.env.index, class, method)
    }

    fn lookup_method_of_object(&self, object: &Expr, method: &str) -> Option<FoundMethod> {
        if !self.env.index.is_indexing_complete() {
            return None;
        }
        let types = expr_type(self.env.index, &self.ctx.scope, self.state, object);
        let found = types
            .concrete_names()
            .filter(|name| is_class(name))
            .find_map(|class| self.lookup_method(class, method));
        found
    }

    /// A callee that always exits ends the calling block too
    fn apply_callee_exit(&mut self, flags: ExitFlags) {
        if !flags.is_empty() && self.env.index.is_indexing_complete() {
            self.ctx.mark_exit(flags);
        }
    }

    /// Indexing a value whose type is a class without `ArrayAccess`
    fn check_array_access(&mut self, base: &Expr, span: Span) {
        if !self.env.index.is_indexing_complete() || !self.reporter.is_enabled() {
            return;
        }
        let types = expr_type(self.env.index, &self.ctx.scope, self.state, base);
        let mut classes = types.concrete_names().filter(|name| is_class(name)).peekable();
        if classes.peek().is_none() {
            return;
        }
        let index = self.env.index;
        if classes.any(|class| instance_of(index, class, "\\ArrayAccess")) {
            return;
        }
        self.reporter.report(
            span,
            Severity::Notice,
            "arrayAccess",
            format!("Array access to non-array type {}", types),
        );
    }

    fn enter_closure(&mut self, closure: &ClosureDecl) {
        let mut scope = Scope::new();
        scope.set_in_closure(true);
        if !closure.is_static {
            match self.ctx.scope.get_var_type("$this") {
                Some(this) if self.ctx.scope.in_instance_method() => {
                    scope.add_var("$this", this.clone(), true);
                    scope.set_in_instance_method(true);
                }
                _ => scope.add_var("$this", TypeSet::concrete("possibly_late_bound"), true),
            }
        }

        for used in &closure.uses {
            if !used.by_ref && !self.ctx.scope.have_var(&used.name) {
                self.reporter.report(
                    used.span,
                    Severity::Error,
                    "undefined",
                    format!("Cannot find referenced variable {}", used.name),
                );
            }
            let types = self.ctx.scope.get_var_type(&used.name).cloned().unwrap_or_default();
            scope.add_var(&used.name, types, true);
            if used.by_ref {
                self.non_local_vars.insert(used.name.clone());
            }
            self.untrack(&used.name);
        }

        let params = describe_params(self.state, &closure.params, None);
        bind_params(&mut scope, &params);

        let env = self.env;
        let state = self.state;
        let mut child = BlockWalker::new(env, state, &mut *self.reporter, scope);
        for param in params.iter().filter(|p| p.by_ref) {
            child.mark_non_local(&param.name);
        }
        for used in &closure.uses {
            if used.by_ref {
                child.mark_non_local(&used.name);
            } else {
                child.track_write(&used.name, used.span);
            }
        }
        child.walk_body(&closure.body);
    }

    fn enter_arrow_function(&mut self, arrow: &ArrowFunctionDecl) {
        let mut scope = Scope::new();
        scope.set_in_closure(true);
        if !arrow.is_static && self.ctx.scope.in_instance_method() {
            if let Some(this) = self.ctx.scope.get_var_type("$this") {
                scope.add_var("$this", this.clone(), true);
                scope.set_in_instance_method(true);
            }
        }
        let params = describe_params(self.state, &arrow.params, None);
        bind_params(&mut scope, &params);

        let mut parents = Vec::with_capacity(self.arrow_parents.len() + 1);
        parents.push(self.ctx.scope.clone());
        parents.extend(self.arrow_parents.iter().cloned());

        let env = self.env;
        let state = self.state;
        let captured = {
            let mut child = BlockWalker::new(env, state, &mut *self.reporter, scope);
            child.arrow_parents = parents;
            child.walk_expr(&arrow.body);
            std::mem::take(&mut child.captured)
        };
        for name in captured {
            self.untrack(&name);
        }
    }
}

#[cfg(test)]
mod tests {
    use phpverify_core::parse_source;

    use super::{BlockWalker, WalkEnv};
    use crate::issue::{Issue, Severity};
    use crate::linter::{ExitFlags, LintOptions, Reporter, RootWalker};
    use crate::scope::{ClassParseState, Scope};
    use crate::symbols::SymbolIndex;
    use crate::types::TypeSet;

    fn lint(code: &str) -> Vec<Issue> {
        let index = SymbolIndex::with_builtins();
        let options = LintOptions::default();
        let env = WalkEnv {
            index: &index,
            options: &options,
        };
        let parsed = parse_source("t.php", code).unwrap();
        RootWalker::new(env, "t.php", code, true).walk_file(&parsed).issues
    }

    /// Index `code` first, then walk it again with reporting on
    fn lint_indexed(code: &str) -> Vec<Issue> {
        let index = SymbolIndex::with_builtins();
        let options = LintOptions::default();
        let env = WalkEnv {
            index: &index,
            options: &options,
        };
        let parsed = parse_source("t.php", code).unwrap();
        let meta = RootWalker::new(env, "t.php", code, false).walk_file(&parsed).meta;
        index.replace_file_meta("t.php", meta).unwrap();
        index.set_indexing_complete(true);
        RootWalker::new(env, "t.php", code, true).walk_file(&parsed).issues
    }

    /// State after walking the statements of `code` as one body with `$c` bound
    struct Walked {
        scope: Scope,
        exit_flags: ExitFlags,
        contains_exit_flags: ExitFlags,
        issues: Vec<Issue>,
    }

    fn walk_with(index: &SymbolIndex, code: &str) -> Walked {
        let options = LintOptions::default();
        let env = WalkEnv { index, options: &options };
        let state = ClassParseState::new();
        let parsed = parse_source("t.php", code).unwrap();
        let mut reporter = Reporter::new("t.php", code, true);
        let mut scope = Scope::new();
        scope.add_var("$c", TypeSet::concrete("bool"), true);

        let (exit_flags, contains_exit_flags, scope) = {
            let mut walker = BlockWalker::new(env, &state, &mut reporter, scope);
            walker.walk_stmts(&parsed.file.statements);
            let flags = (walker.ctx.exit_flags, walker.ctx.contains_exit_flags);
            (flags.0, flags.1, walker.finish().scope)
        };
        Walked {
            scope,
            exit_flags,
            contains_exit_flags,
            issues: reporter.into_issues(),
        }
    }

    fn walk(code: &str) -> Walked {
        walk_with(&SymbolIndex::with_builtins(), code)
    }

    fn messages(issues: &[Issue], check: &str) -> Vec<String> {
        issues
            .iter()
            .filter(|i| i.check_name == check)
            .map(|i| i.message.clone())
            .collect()
    }

    #[test]
    fn test_if_else_defines_variable() {
        let issues = lint("<?php\nfunction f($c) { if ($c) { $x = 1; } else { $x = 2; } return $x; }\n");
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_if_without_else_maybe_defines() {
        let issues = lint("<?php\nfunction f($c) { if ($c) { $x = 1; } return $x; }\n");
        assert_eq!(
            messages(&issues, "undefined"),
            vec!["Variable might have not been defined: $x"]
        );
        assert_eq!(issues[0].severity, Severity::Warning);
    }

    #[test]
    fn test_loop_body_maybe_defines() {
        let issues = lint("<?php\nfunction f($n) { for ($i = 0; $i < $n; $i++) { $y = 1; } return $y; }\n");
        assert_eq!(
            messages(&issues, "undefined"),
            vec!["Variable might have not been defined: $y"]
        );
    }

    #[test]
    fn test_undefined_reported_once() {
        let issues = lint("<?php\nfunction f() { echo $nope; echo $nope; }\n");
        assert_eq!(messages(&issues, "undefined"), vec!["Undefined variable: $nope"]);
        assert_eq!(issues[0].severity, Severity::Error);
    }

    #[test]
    fn test_dead_code_after_return() {
        let issues = lint("<?php\nfunction f() { return 1; echo \"x\"; echo \"y\"; }\n");
        assert_eq!(messages(&issues, "deadCode"), vec!["Unreachable code"]);
    }

    #[test]
    fn test_dead_code_after_exiting_branches() {
        let issues = lint(
            "<?php\nfunction f($c) { if ($c) { throw new E(); } else { return 1; } echo \"x\"; }\n",
        );
        assert_eq!(messages(&issues, "deadCode"), vec!["Unreachable code"]);
    }

    #[test]
    fn test_no_dead_code_when_one_branch_falls_through() {
        let issues = lint("<?php\nfunction f($c) { if ($c) { return 1; } echo \"x\"; }\n");
        assert!(messages(&issues, "deadCode").is_empty());
    }

    #[test]
    fn test_case_without_break() {
        let issues = lint(
            "<?php
function f($a) {
    switch ($a) {
    case 1:
        echo 1;
    case 2:
        echo 2;
        break;
    }
}
",
        );
        assert_eq!(
            messages(&issues, "caseBreak"),
            vec!["Add break or '// fallthrough' to the end of the case"]
        );
        assert_eq!(issues[0].line, 4);
    }

    #[test]
    fn test_switch_all_cases_return() {
        let issues = lint(
            "<?php
function f($a) {
    switch ($a) {
    case 1:
        return 1;
    default:
        return 2;
    }
    echo 'never';
}
",
        );
        assert_eq!(messages(&issues, "deadCode"), vec!["Unreachable code"]);
    }

    #[test]
    fn test_unused_variable() {
        let issues = lint("<?php\nfunction f() { $x = 1; $_ = 2; }\n");
        assert_eq!(
            messages(&issues, "unused"),
            vec!["Variable $x is unused (use $_ to ignore this inspection)"]
        );
    }

    #[test]
    fn test_discard_var_read() {
        let issues = lint("<?php\nfunction f() { $_ = 1; echo $_; }\n");
        assert_eq!(
            messages(&issues, "discardVar"),
            vec!["Used var $_ that is supposed to be unused"]
        );
    }

    #[test]
    fn test_unused_foreach_key() {
        let issues = lint("<?php\nfunction f($a) { foreach ($a as $k => $v) { echo $v; } }\n");
        assert_eq!(
            messages(&issues, "unused"),
            vec!["Foreach key $k is unused, can simplify $k => $v to just $v"]
        );
    }

    #[test]
    fn test_closure_use_of_missing_variable() {
        let issues = lint("<?php\nfunction f() { return function () use ($missing) { return $missing; }; }\n");
        assert_eq!(
            messages(&issues, "undefined"),
            vec!["Cannot find referenced variable $missing"]
        );
    }

    #[test]
    fn test_arrow_function_captures_scope() {
        let issues = lint("<?php\nfunction f($a) { $b = 2; return fn($x) => $x + $a + $b; }\n");
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_compact_reads_variables() {
        let issues = lint("<?php\nfunction f() { $a = 1; $b = 2; return compact('a', ['b']); }\n");
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_isset_guard_defines_variable() {
        let issues = lint("<?php\nfunction f() { if (isset($x)) { echo $x; } }\n");
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_global_and_reference_not_unused() {
        let issues = lint("<?php\nfunction f(array $a) { global $config; $config = 1; $r = &$a; $r = 2; }\n");
        assert!(messages(&issues, "unused").is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_finally_return_makes_try_return_unreachable() {
        let issues = lint(
            "<?php
function f() {
    try { return 1; }
    finally { return 2; }
}
",
        );
        assert_eq!(
            messages(&issues, "deadCode"),
            vec!["return is unreachable (because finally block contains a return on line 4)"]
        );
    }

    #[test]
    fn test_finally_after_dying_catch() {
        let issues = lint(
            "<?php
function f() {
    try { g(); }
    catch (\\Exception $e) { die(); }
    finally { echo 1; }
}
",
        );
        assert_eq!(
            messages(&issues, "deadCode"),
            vec!["Block finally is unreachable (because catch block 1 contains a exit/die)"]
        );
    }

    #[test]
    fn test_try_variable_maybe_defined_in_catch() {
        let issues = lint(
            "<?php
function f() {
    try { $x = g(); }
    catch (\\Exception $e) { echo $x; }
}
",
        );
        assert_eq!(
            messages(&issues, "undefined"),
            vec!["Variable might have not been defined: $x"]
        );
    }

    #[test]
    fn test_instanceof_narrowing_continues_in_false_branch() {
        let issues = lint(
            "<?php
function f($x) {
    if (!$x instanceof \\ArrayObject) {
        return null;
    }
    return $x;
}
",
        );
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_if_else_merges_always_defined_int() {
        let walked = walk("<?php\nif ($c) { $x = 1; } else { $x = 2; }\n");
        let x = walked.scope.get_var("$x").unwrap();
        assert!(x.always_defined);
        assert_eq!(x.types.to_string(), "int");
    }

    #[test]
    fn test_if_without_else_defines_but_not_always() {
        let walked = walk("<?php\nif ($c) { $x = 1; }\n");
        let x = walked.scope.get_var("$x").unwrap();
        assert!(!x.always_defined);
        assert!(walked.scope.maybe_have_var("$x"));
    }

    #[test]
    fn test_exiting_branch_left_out_of_merge() {
        let walked = walk("<?php\nif ($c) { $x = 1; } else { return; }\n");
        assert!(walked.scope.get_var("$x").unwrap().always_defined);
    }

    #[test]
    fn test_elseif_chain_all_branches_exit() {
        let walked = walk(
            "<?php
if ($c) { return 1; }
elseif ($c === false) { throw new \\Exception('x'); }
else { exit(1); }
",
        );
        assert!(!walked.exit_flags.is_empty());
        assert!(walked.exit_flags.contains(ExitFlags::RETURN));
        assert!(walked.exit_flags.contains(ExitFlags::THROW));
        assert!(walked.exit_flags.contains(ExitFlags::DIE));
    }

    #[test]
    fn test_elseif_chain_without_else_falls_through() {
        let walked = walk("<?php\nif ($c) { return 1; }\nelseif ($c === false) { return 2; }\n");
        assert!(walked.exit_flags.is_empty());
        assert!(walked.contains_exit_flags.contains(ExitFlags::RETURN));
    }

    #[test]
    fn test_try_and_catch_both_exit() {
        let walked = walk("<?php\ntry { return 1; } catch (\\Exception $e) { return 2; }\n");
        assert!(walked.exit_flags.contains(ExitFlags::RETURN));

        let issues = lint(
            "<?php
function f() {
    try { return 1; } catch (\\Exception $e) { return 2; }
    echo 'x';
}
",
        );
        assert_eq!(messages(&issues, "deadCode"), vec!["Unreachable code"]);
        assert_eq!(issues[0].line, 4);
    }

    #[test]
    fn test_catch_falling_through_keeps_code_live() {
        let walked = walk("<?php\ntry { return 1; } catch (\\Exception $e) { }\n");
        assert!(walked.exit_flags.is_empty());

        let issues = lint(
            "<?php
function f() {
    try { return 1; } catch (\\Exception $e) { }
    echo 'x';
}
",
        );
        assert!(messages(&issues, "deadCode").is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_do_while_body_always_runs() {
        let walked = walk("<?php\ndo { $y = 1; } while ($c);\n");
        let y = walked.scope.get_var("$y").unwrap();
        assert!(y.always_defined);
        assert_eq!(y.types.to_string(), "int");
        assert!(walked.issues.is_empty(), "{:?}", walked.issues);
    }

    #[test]
    fn test_while_body_not_always_defined() {
        let walked = walk("<?php\nwhile ($c) { $y = 1; }\n");
        assert!(!walked.scope.get_var("$y").unwrap().always_defined);
    }

    #[test]
    fn test_dead_code_after_exiting_methods() {
        let issues = lint_indexed(
            "<?php
class C {
    public static function fail() { throw new \\Exception('x'); }
    public function stop() { exit(1); }
    public function run() { return 1; }
}
function a() { C::fail(); echo 'a'; }
function b(C $c) { $c->stop(); echo 'b'; }
function d(C $c) { $c->run(); echo 'd'; }
",
        );
        let dead: Vec<usize> = issues
            .iter()
            .filter(|i| i.check_name == "deadCode")
            .map(|i| i.line)
            .collect();
        assert_eq!(dead, vec![7, 8]);
    }

    #[test]
    fn test_callee_exit_recorded_in_both_flag_sets() {
        let index = SymbolIndex::with_builtins();
        let decl = "<?php\nclass C { public static function fail() { throw new \\Exception('x'); } }\n";
        {
            let options = LintOptions::default();
            let env = WalkEnv {
                index: &index,
                options: &options,
            };
            let parsed = parse_source("c.php", decl).unwrap();
            let meta = RootWalker::new(env, "c.php", decl, false).walk_file(&parsed).meta;
            index.replace_file_meta("c.php", meta).unwrap();
        }
        index.set_indexing_complete(true);

        let walked = walk_with(&index, "<?php\nC::fail();\n");
        assert_eq!(walked.exit_flags, ExitFlags::THROW);
        assert!(walked.contains_exit_flags.contains(ExitFlags::THROW));
    }

    #[test]
    fn test_callee_exit_ignored_while_indexing() {
        let issues = lint(
            "<?php
class C { public static function fail() { throw new \\Exception('x'); } }
function a() { C::fail(); echo 'a'; }
",
        );
        assert!(messages(&issues, "deadCode").is_empty());
    }
}
