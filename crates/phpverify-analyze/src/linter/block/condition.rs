//! Conditions of `if`, `elseif` and `?:`
//!
//! The condition is walked once, in the context of the true branch. Guards
//! refine both branch contexts on the way: `isset($x)` and `!empty($x)`
//! define `$x` with a marker type in the true branch, `$x instanceof C`
//! narrows `$x` in both.

use phpverify_core::ir::{BinaryOp, Expr, ExprKind, UnaryOp};

use super::{BlockContext, BlockWalker};
use crate::solver::class_ref_name;
use crate::types::{TypeSet, TypeValue};

/// Type given to a variable known to be set only because a guard said so
fn isset_marker(name: &str) -> String {
    format!("isset_{}", name)
}

impl<'a> BlockWalker<'a> {
    /// Walk `cond` and return the contexts of its true and false outcomes.
    ///
    /// Variables first assigned in the condition are defined whatever the
    /// outcome, so they are copied into the current block as well.
    pub(super) fn walk_condition_split(&mut self, cond: &Expr, markers: &mut Vec<String>) -> (BlockContext, BlockContext) {
        let mut false_ctx = self.ctx.child();
        let true_ctx = self.ctx.child();
        let true_ctx = self.with_context(true_ctx, |w| w.walk_condition(cond, &mut false_ctx, false, false, markers));

        for (name, var) in true_ctx.scope.iter() {
            if var.implicit || markers.contains(name) || self.ctx.scope.maybe_have_var(name) {
                continue;
            }
            self.ctx.scope.add_var(name, var.types.clone(), true);
            false_ctx.scope.add_var(name, var.types.clone(), true);
        }

        (true_ctx, false_ctx)
    }

    fn walk_condition(
        &mut self,
        cond: &Expr,
        false_ctx: &mut BlockContext,
        negated: bool,
        in_logic: bool,
        markers: &mut Vec<String>,
    ) {
        match &cond.kind {
            ExprKind::Paren(inner) => self.walk_condition(inner, false_ctx, negated, in_logic, markers),
            ExprKind::Binary {
                op: BinaryOp::And | BinaryOp::Or,
                left,
                right,
            } => {
                self.walk_condition(left, false_ctx, negated, true, markers);
                let exit = self.ctx.exit_flags;
                self.walk_condition(right, false_ctx, negated, true, markers);
                self.ctx.exit_flags = exit;
            }
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                if let ExprKind::Empty(inner) = &operand.unparen().kind {
                    if !negated {
                        self.add_isset_marker(inner, markers);
                    }
                }
                self.walk_condition(operand, false_ctx, !negated, in_logic, markers);
            }
            ExprKind::Isset(values) => {
                if !negated {
                    for value in values {
                        self.add_isset_marker(value, markers);
                    }
                }
                self.walk_expr(cond);
            }
            ExprKind::InstanceOf { expr, class } => {
                self.walk_expr(cond);
                let (Some(name), Some(class)) = (expr.var_name(), class_ref_name(self.state, class)) else {
                    return;
                };
                self.narrow_instanceof(name, &class, false_ctx, negated, in_logic);
            }
            _ => self.walk_expr(cond),
        }
    }

    /// `isset($x['k'])` guards `$x` itself
    fn add_isset_marker(&mut self, guarded: &Expr, markers: &mut Vec<String>) {
        let mut root = guarded.unparen();
        loop {
            match &root.kind {
                ExprKind::ArrayDim { base, .. } => root = base.unparen(),
                ExprKind::PropertyFetch { object, .. } => root = object.unparen(),
                _ => break,
            }
        }
        let ExprKind::Var(name) = &root.kind else {
            return;
        };
        if self.ctx.scope.have_var(name) {
            return;
        }
        self.ctx
            .scope
            .add_var(name, TypeSet::concrete(isset_marker(name)), true);
        if !markers.contains(name) {
            markers.push(name.clone());
        }
    }

    fn narrow_instanceof(&mut self, name: &str, class: &str, false_ctx: &mut BlockContext, negated: bool, in_logic: bool) {
        let current = false_ctx.scope.get_var_type(name).cloned().unwrap_or_default();
        let mut when_true = TypeSet::single(TypeValue::concrete(class));
        let mut when_false = current.filter(|v| !v.is(class));
        if negated {
            std::mem::swap(&mut when_true, &mut when_false);
        }

        if in_logic && self.ctx.scope.have_implicit_var(name) {
            // a previous test of the same condition already narrowed it
            if let Some(var) = self.ctx.scope.get_var_mut(name) {
                var.types = var.types.union(&when_true);
            }
            if let Some(var) = false_ctx.scope.get_var_mut(name) {
                var.types = var.types.union(&when_false);
            }
            return;
        }
        self.ctx.scope.replace_implicit_var(name, when_true);
        false_ctx.scope.replace_implicit_var(name, when_false);
    }

    /// Retract the guard markers that no assignment replaced
    pub(super) fn drop_isset_markers(&mut self, markers: &[String]) {
        for name in markers {
            let marker = isset_marker(name);
            let Some(var) = self.ctx.scope.get_var_mut(name) else {
                continue;
            };
            var.types = var.types.filter(|v| !v.is(&marker));
            if var.types.is_empty() {
                self.ctx.scope.del_var(name);
            }
        }
    }
}
