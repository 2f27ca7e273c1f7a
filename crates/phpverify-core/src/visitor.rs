//! Visitor for traversing the owned IR
//!
//! Provides a trait-based visitor pattern for passes that only need to look
//! at nodes. Default implementations handle traversal; implementors override
//! `visit_stmt`/`visit_expr` and return `false` to skip a subtree.
//!
//! Function, method and closure bodies are separate scopes, so traversal
//! does not enter them unless `enter_nested_scopes` says so.

use crate::ir::*;

/// Trait for visiting IR nodes
pub trait Visitor {
    /// Called for each statement. Return `true` to continue traversal into children.
    fn visit_stmt(&mut self, _stmt: &Stmt) -> bool {
        true
    }

    /// Called for each expression. Return `true` to continue traversal into children.
    fn visit_expr(&mut self, _expr: &Expr) -> bool {
        true
    }

    /// Whether to descend into function, class and closure bodies
    fn enter_nested_scopes(&self) -> bool {
        false
    }

    fn traverse_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.traverse_stmt(stmt);
        }
    }

    /// Traverse a statement and its children
    fn traverse_stmt(&mut self, stmt: &Stmt) {
        if !self.visit_stmt(stmt) {
            return;
        }

        match &stmt.kind {
            StmtKind::Expr(expr) => self.traverse_expr(expr),
            StmtKind::Echo(exprs) => {
                for expr in exprs {
                    self.traverse_expr(expr);
                }
            }
            StmtKind::Return(value) => {
                if let Some(expr) = value {
                    self.traverse_expr(expr);
                }
            }
            StmtKind::Block(body) => self.traverse_stmts(body),
            StmtKind::If(if_stmt) => {
                self.traverse_expr(&if_stmt.cond);
                self.traverse_stmts(&if_stmt.then);
                for else_if in &if_stmt.else_ifs {
                    self.traverse_expr(&else_if.cond);
                    self.traverse_stmts(&else_if.body);
                }
                if let Some(body) = &if_stmt.else_body {
                    self.traverse_stmts(body);
                }
            }
            StmtKind::While { cond, body } => {
                self.traverse_expr(cond);
                self.traverse_stmts(body);
            }
            StmtKind::DoWhile { body, cond } => {
                self.traverse_stmts(body);
                self.traverse_expr(cond);
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                for expr in init.iter().chain(cond).chain(step) {
                    self.traverse_expr(expr);
                }
                self.traverse_stmts(body);
            }
            StmtKind::Foreach(foreach) => {
                self.traverse_expr(&foreach.expr);
                if let Some(key) = &foreach.key {
                    self.traverse_expr(key);
                }
                self.traverse_expr(&foreach.value);
                self.traverse_stmts(&foreach.body);
            }
            StmtKind::Switch(switch) => {
                self.traverse_expr(&switch.subject);
                for case in &switch.cases {
                    if let Some(cond) = &case.cond {
                        self.traverse_expr(cond);
                    }
                    self.traverse_stmts(&case.body);
                }
            }
            StmtKind::Try(try_stmt) => {
                self.traverse_stmts(&try_stmt.body);
                for catch in &try_stmt.catches {
                    self.traverse_stmts(&catch.body);
                }
                if let Some(finally) = &try_stmt.finally {
                    self.traverse_stmts(&finally.body);
                }
            }
            StmtKind::Static(vars) => {
                for var in vars {
                    if let Some(default) = &var.default {
                        self.traverse_expr(default);
                    }
                }
            }
            StmtKind::Namespace { body, .. } => self.traverse_stmts(body),
            StmtKind::Function(func) => {
                if self.enter_nested_scopes() {
                    self.traverse_stmts(&func.body);
                }
            }
            StmtKind::Class(class) => {
                if self.enter_nested_scopes() {
                    for member in &class.members {
                        if let Member::Method(method) = member {
                            if let Some(body) = &method.body {
                                self.traverse_stmts(body);
                            }
                        }
                    }
                }
            }
            StmtKind::Const(items) => {
                for item in items {
                    self.traverse_expr(&item.value);
                }
            }
            StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Global(_)
            | StmtKind::Unset(_)
            | StmtKind::Use(_)
            | StmtKind::Nop => {}
        }
    }

    fn traverse_args(&mut self, args: &[Arg]) {
        for arg in args {
            self.traverse_expr(&arg.value);
        }
    }

    fn traverse_class_ref(&mut self, class: &ClassRef) {
        if let ClassRef::Dynamic(expr) = class {
            self.traverse_expr(expr);
        }
    }

    /// Traverse an expression and its children
    fn traverse_expr(&mut self, expr: &Expr) {
        if !self.visit_expr(expr) {
            return;
        }

        match &expr.kind {
            ExprKind::Paren(inner)
            | ExprKind::Empty(inner)
            | ExprKind::Include(inner)
            | ExprKind::Throw(inner)
            | ExprKind::Clone(inner)
            | ExprKind::YieldFrom(inner) => self.traverse_expr(inner),
            ExprKind::Array(items) => {
                for item in items {
                    if let Some(key) = &item.key {
                        self.traverse_expr(key);
                    }
                    self.traverse_expr(&item.value);
                }
            }
            ExprKind::List(items) => {
                for item in items.iter().flatten() {
                    if let Some(key) = &item.key {
                        self.traverse_expr(key);
                    }
                    self.traverse_expr(&item.value);
                }
            }
            ExprKind::ArrayDim { base, index } => {
                self.traverse_expr(base);
                if let Some(index) = index {
                    self.traverse_expr(index);
                }
            }
            ExprKind::Assign { target, value, .. } => {
                self.traverse_expr(target);
                self.traverse_expr(value);
            }
            ExprKind::Binary { left, right, .. } => {
                self.traverse_expr(left);
                self.traverse_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.traverse_expr(operand),
            ExprKind::InstanceOf { expr, class } => {
                self.traverse_expr(expr);
                self.traverse_class_ref(class);
            }
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                self.traverse_expr(cond);
                if let Some(then) = then {
                    self.traverse_expr(then);
                }
                self.traverse_expr(otherwise);
            }
            ExprKind::Call { callee, args } => {
                if let Callee::Expr(callee) = callee {
                    self.traverse_expr(callee);
                }
                self.traverse_args(args);
            }
            ExprKind::MethodCall { object, args, .. } => {
                self.traverse_expr(object);
                self.traverse_args(args);
            }
            ExprKind::StaticCall { class, args, .. } | ExprKind::New { class, args } => {
                self.traverse_class_ref(class);
                self.traverse_args(args);
            }
            ExprKind::PropertyFetch { object, .. } => self.traverse_expr(object),
            ExprKind::StaticPropertyFetch { class, .. } | ExprKind::ClassConstFetch { class, .. } => {
                self.traverse_class_ref(class)
            }
            ExprKind::Isset(values) => {
                for value in values {
                    self.traverse_expr(value);
                }
            }
            ExprKind::Closure(closure) => {
                if self.enter_nested_scopes() {
                    self.traverse_stmts(&closure.body);
                }
            }
            ExprKind::ArrowFunction(arrow) => {
                if self.enter_nested_scopes() {
                    self.traverse_expr(&arrow.body);
                }
            }
            ExprKind::Match { subject, arms } => {
                self.traverse_expr(subject);
                for arm in arms {
                    for cond in &arm.conditions {
                        self.traverse_expr(cond);
                    }
                    self.traverse_expr(&arm.body);
                }
            }
            ExprKind::Yield { key, value } => {
                if let Some(key) = key {
                    self.traverse_expr(key);
                }
                if let Some(value) = value {
                    self.traverse_expr(value);
                }
            }
            ExprKind::Var(_)
            | ExprKind::DynamicVar(_)
            | ExprKind::Int
            | ExprKind::Float
            | ExprKind::Str(_)
            | ExprKind::Interpolated(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::MagicConst(_)
            | ExprKind::ConstFetch(_)
            | ExprKind::Exit { .. }
            | ExprKind::Print(_)
            | ExprKind::Opaque(_) => {}
        }
    }
}

/// Helper function to run a visitor over a statement list
pub fn walk_stmt<V: Visitor>(visitor: &mut V, stmts: &[Stmt]) {
    visitor.traverse_stmts(stmts);
}

/// Helper function to run a visitor over a single expression
pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr) {
    visitor.traverse_expr(expr);
}
