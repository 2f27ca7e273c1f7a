//! Branching statements: scope merging and exit propagation

use std::collections::{BTreeMap, HashMap};

use phpverify_core::ir::{Expr, ExprKind, ForeachStmt, IfStmt, Span, Stmt, StmtKind, SwitchStmt, TryStmt};
use phpverify_core::{walk_stmt, Visitor};

use super::{BlockContext, BlockWalker};
use crate::issue::Severity;
use crate::linter::ExitFlags;
use crate::solver::expr_type_local;
use crate::types::{TypeSet, TypeValue};

impl<'a> BlockWalker<'a> {
    pub(super) fn handle_if(&mut self, stmt: &IfStmt) {
        let initial = self.ctx.scope.clone();
        let narrows_only = only_instanceof(&stmt.cond);
        let mut markers = Vec::new();
        let mut contexts = Vec::new();
        let mut links = 0;

        let (mut true_ctx, mut false_ctx) = self.walk_condition_split(&stmt.cond, &mut markers);

        true_ctx = self.with_context(true_ctx, |w| w.walk_stmts(&stmt.then));
        if true_ctx.exit_flags.is_empty() {
            links += 1;
        }
        let continue_in_false =
            !true_ctx.exit_flags.is_empty() && narrows_only && stmt.else_ifs.is_empty() && stmt.else_body.is_none();
        restore_implicit_vars(&mut true_ctx, &initial);
        contexts.push(true_ctx);

        for else_if in &stmt.else_ifs {
            let parent = std::mem::take(&mut false_ctx);
            let saved = std::mem::replace(&mut self.ctx, parent);
            let (branch, rest) = self.walk_condition_split(&else_if.cond, &mut markers);
            self.ctx = saved;

            let mut branch = self.with_context(branch, |w| w.walk_stmts(&else_if.body));
            if branch.exit_flags.is_empty() {
                links += 1;
            }
            restore_implicit_vars(&mut branch, &initial);
            contexts.push(branch);
            false_ctx = rest;
        }

        match &stmt.else_body {
            Some(body) => {
                let mut branch = self.with_context(false_ctx, |w| w.walk_stmts(body));
                if branch.exit_flags.is_empty() {
                    links += 1;
                }
                restore_implicit_vars(&mut branch, &initial);
                contexts.push(branch);
            }
            None => {
                links += 1;
                if continue_in_false {
                    false_ctx.contains_exit_flags |= self.ctx.contains_exit_flags;
                    false_ctx.dead_code_reported = self.ctx.dead_code_reported;
                    self.ctx = false_ctx;
                }
            }
        }

        self.propagate_from_branches(&contexts, links);
        self.merge_branches(&contexts, links);
        self.drop_isset_markers(&markers);
    }

    /// `cond ? then : otherwise`
    pub(super) fn handle_ternary(&mut self, cond: &Expr, then: &Expr, otherwise: &Expr) {
        let initial = self.ctx.scope.clone();
        let mut markers = Vec::new();
        let (true_ctx, false_ctx) = self.walk_condition_split(cond, &mut markers);

        let mut true_ctx = self.with_context(true_ctx, |w| w.walk_expr(then));
        let mut false_ctx = self.with_context(false_ctx, |w| w.walk_expr(otherwise));
        restore_implicit_vars(&mut true_ctx, &initial);
        restore_implicit_vars(&mut false_ctx, &initial);
        true_ctx.exit_flags = ExitFlags::empty();
        false_ctx.exit_flags = ExitFlags::empty();

        self.merge_branches(&[true_ctx, false_ctx], 2);
        self.drop_isset_markers(&markers);
    }

    /// Body of `for` and `while`: may run zero times
    pub(super) fn walk_loop_body(&mut self, body: &[Stmt]) {
        let mut ctx = self.ctx.child();
        ctx.inside_loop = true;
        let ctx = self.with_context(ctx, |w| w.walk_stmts(body));
        self.merge_possibly_defined(&ctx);
    }

    /// `do { } while (cond)`: the body runs at least once, in the current block
    pub(super) fn handle_do_while(&mut self, body: &[Stmt], cond: &Expr) {
        let inside_loop = self.ctx.inside_loop;
        self.ctx.inside_loop = true;
        self.walk_stmts(body);
        self.walk_expr(cond);
        self.ctx.inside_loop = inside_loop;
        self.ctx.exit_flags = self.ctx.exit_flags.without(ExitFlags::LOOP_LOCAL);
    }

    pub(super) fn handle_foreach(&mut self, foreach: &ForeachStmt) {
        self.walk_expr(&foreach.expr);
        let collection = expr_type_local(&self.ctx.scope, self.state, &foreach.expr);

        let ctx = self.ctx.child();
        let ctx = self.with_context(ctx, |w| {
            if foreach.by_ref {
                if let Some(name) = foreach.value.var_name() {
                    w.non_local_vars.insert(name.to_string());
                }
            }
            match &foreach.value.unparen().kind {
                ExprKind::Var(name) => {
                    w.ctx.scope.replace_var(name, collection.elem_of(), true);
                    w.track_write(name, foreach.value.span);
                }
                _ => w.assign_to(&foreach.value, collection.elem_of()),
            }
            if let Some(key) = &foreach.key {
                let key_types = TypeSet::from_values([TypeValue::concrete("int"), TypeValue::concrete("string")]);
                match &key.unparen().kind {
                    ExprKind::Var(name) => {
                        w.ctx.scope.replace_var(name, key_types, true);
                        w.track_write(name, key.span);
                    }
                    _ => w.assign_to(key, key_types),
                }
            }
            w.ctx.inside_loop = true;
            w.walk_stmts(&foreach.body);
        });
        self.merge_possibly_defined(&ctx);

        let (Some(key), Some(value)) = (foreach.key.as_ref(), foreach.value.var_name()) else {
            return;
        };
        let Some(key_name) = key.var_name() else {
            return;
        };
        if self.env.options.is_discard_var(key_name) || !self.unused_vars.contains_key(key_name) {
            return;
        }
        self.untrack(key_name);
        self.reporter.report(
            key.span,
            Severity::Warning,
            "unused",
            format!(
                "Foreach key {k} is unused, can simplify {k} => {v} to just {v}",
                k = key_name,
                v = value
            ),
        );
    }

    pub(super) fn handle_switch(&mut self, switch: &SwitchStmt) {
        self.walk_expr(&switch.subject);

        let mut contexts = Vec::new();
        let mut links = 0;
        let mut have_default = false;

        for (i, case) in switch.cases.iter().enumerate() {
            match &case.cond {
                Some(cond) => self.walk_expr(cond),
                None => have_default = true,
            }
            if case.body.is_empty() {
                continue;
            }

            let ctx = self.ctx.child();
            let rest = &switch.cases[i + 1..];
            let ctx = self.with_context(ctx, |w| {
                w.walk_stmts(&case.body);
                if let Some(next) = rest.first() {
                    if w.ctx.exit_flags.is_empty() && !next.fallthrough_comment {
                        w.reporter.report(
                            case.span,
                            Severity::Warning,
                            "caseBreak",
                            "Add break or '// fallthrough' to the end of the case",
                        );
                    }
                }
                if w.ctx.exit_flags.is_empty() {
                    w.walk_fallthrough(rest);
                }
            });
            if ctx.exit_flags.without(ExitFlags::LOOP_LOCAL).is_empty() {
                links += 1;
            }
            contexts.push(ctx);
        }

        if !have_default {
            links += 1;
        }

        let mut all_exit = have_default && !contexts.is_empty();
        let mut exit = ExitFlags::empty();
        for ctx in &contexts {
            self.ctx.contains_exit_flags |= ctx.contains_exit_flags;
            let clean = ctx.exit_flags.without(ExitFlags::LOOP_LOCAL);
            if clean.is_empty() {
                all_exit = false;
            } else {
                exit |= clean;
            }
        }
        if all_exit {
            self.ctx.exit_flags |= exit;
        }

        // break and continue end the case, not the switch
        for ctx in &mut contexts {
            ctx.exit_flags = ctx.exit_flags.without(ExitFlags::LOOP_LOCAL);
        }
        self.merge_branches(&contexts, links);
    }

    /// Following cases reached by falling through; their diagnostics belong to
    /// their own walk
    fn walk_fallthrough(&mut self, cases: &[phpverify_core::ir::SwitchCase]) {
        let enabled = self.reporter.is_enabled();
        self.reporter.set_enabled(false);
        for case in cases {
            self.walk_stmts(&case.body);
            if !self.ctx.exit_flags.is_empty() {
                break;
            }
        }
        self.reporter.set_enabled(enabled);
    }

    pub(super) fn handle_try(&mut self, stmt: &TryStmt) {
        let try_ctx = self.ctx.child();
        let try_ctx = self.with_context(try_ctx, |w| w.walk_stmts(&stmt.body));

        // any statement of the try body may have thrown
        let mut after_throw = self.ctx.child();
        for (name, var) in try_ctx.scope.iter() {
            after_throw.scope.add_var(name, var.types.clone(), false);
        }

        let mut links = 0;
        let mut catches = Vec::with_capacity(stmt.catches.len());
        for catch in &stmt.catches {
            let ctx = after_throw.child();
            let ctx = self.with_context(ctx, |w| {
                if let Some(var) = &catch.var {
                    let types = TypeSet::from_values(
                        catch
                            .types
                            .iter()
                            .map(|t| TypeValue::concrete(w.state.resolve_class_name(t))),
                    );
                    w.ctx.scope.replace_var(var, types, true);
                }
                w.walk_stmts(&catch.body);
            });
            if ctx.exit_flags.is_empty() {
                links += 1;
            }
            catches.push(ctx);
        }

        let finally_ctx = stmt.finally.as_ref().map(|finally| {
            let ctx = after_throw.child();
            self.with_context(ctx, |w| w.walk_stmts(&finally.body))
        });

        if try_ctx.exit_flags.is_empty() {
            links += 1;
        }

        if let Some(finally_ctx) = &finally_ctx {
            self.check_finally(stmt, &try_ctx, &catches, finally_ctx);
        }

        let all_exit = !try_ctx.exit_flags.is_empty() && catches.iter().all(|c| !c.exit_flags.is_empty());
        let mut exit = try_ctx.exit_flags;
        for ctx in &catches {
            exit |= ctx.exit_flags;
            self.ctx.contains_exit_flags |= ctx.contains_exit_flags;
        }
        self.ctx.contains_exit_flags |= try_ctx.contains_exit_flags;

        let mut contexts = catches;
        contexts.push(try_ctx);
        self.merge_branches(&contexts, links);

        if all_exit {
            self.ctx.exit_flags |= exit;
        }

        if let Some(finally_ctx) = finally_ctx {
            let always = finally_ctx.exit_flags.is_empty();
            for (name, var) in finally_ctx.scope.iter() {
                self.ctx.scope.add_var(name, var.types.clone(), always && var.always_defined);
            }
            self.ctx.contains_exit_flags |= finally_ctx.contains_exit_flags;
            if !finally_ctx.exit_flags.is_empty() {
                self.ctx.exit_flags = finally_ctx.exit_flags;
            }
        }
    }

    /// Exits that a `finally` makes pointless
    fn check_finally(&mut self, stmt: &TryStmt, try_ctx: &BlockContext, catches: &[BlockContext], finally_ctx: &BlockContext) {
        let Some(finally) = &stmt.finally else {
            return;
        };

        let mut exit_points = Vec::new();
        if try_ctx.contains_exit_flags.intersects(ExitFlags::RETURN | ExitFlags::DIE) {
            let flags = try_ctx.contains_exit_flags.without(ExitFlags::THROW);
            exit_points.extend(find_exit_points(&stmt.body, flags));
        }

        let mut catch_with_die = None;
        for (i, (catch, ctx)) in stmt.catches.iter().zip(catches).enumerate() {
            let flags = ctx.contains_exit_flags.without(ExitFlags::DIE);
            if !flags.is_empty() {
                exit_points.extend(find_exit_points(&catch.body, flags));
            }
            if ctx.contains_exit_flags.contains(ExitFlags::DIE) && catch_with_die.is_none() {
                catch_with_die = Some(i + 1);
            }
        }

        if let Some(n) = catch_with_die {
            self.reporter.report(
                finally.span,
                Severity::Error,
                "deadCode",
                format!("Block finally is unreachable (because catch block {} contains a exit/die)", n),
            );
            return;
        }

        if finally_ctx.exit_flags != ExitFlags::RETURN {
            return;
        }
        let Some(return_span) = find_exit_points(&finally.body, ExitFlags::RETURN)
            .first()
            .map(|(span, _)| *span)
        else {
            return;
        };
        let line = self.reporter.line(return_span.start);
        for (span, kind) in exit_points {
            self.reporter.report(
                span,
                Severity::Error,
                "deadCode",
                format!("{} is unreachable (because finally block contains a return on line {})", kind, line),
            );
        }
    }

    /// Fold branch exits into the current block
    fn propagate_from_branches(&mut self, contexts: &[BlockContext], links: usize) {
        for ctx in contexts {
            self.ctx.contains_exit_flags |= ctx.contains_exit_flags;
        }
        if links == 0 && !contexts.is_empty() {
            let mut exit = ExitFlags::empty();
            for ctx in contexts {
                exit |= ctx.exit_flags;
            }
            self.ctx.exit_flags |= exit;
        }
    }

    /// Merge the branches that fall through.
    ///
    /// A variable is always defined afterwards when every one of the `links`
    /// reaching paths defines it.
    pub(super) fn merge_branches(&mut self, contexts: &[BlockContext], links: usize) {
        let mut types: BTreeMap<String, TypeSet> = BTreeMap::new();
        let mut defined_in: HashMap<String, usize> = HashMap::new();

        for ctx in contexts.iter().filter(|c| c.exit_flags.is_empty()) {
            for (name, var) in ctx.scope.iter() {
                types.entry(name.clone()).or_default().append(&var.types);
                if var.always_defined {
                    *defined_in.entry(name.clone()).or_default() += 1;
                }
            }
        }

        for (name, types) in types {
            let always = links > 0 && defined_in.get(&name).copied().unwrap_or(0) == links;
            self.ctx.scope.add_var(&name, types, always);
        }
    }

    fn merge_possibly_defined(&mut self, ctx: &BlockContext) {
        for (name, var) in ctx.scope.iter() {
            self.ctx.scope.add_var(name, var.types.clone(), false);
        }
        self.ctx.contains_exit_flags |= ctx.contains_exit_flags;
    }
}

/// Condition built only from `instanceof` tests
fn only_instanceof(cond: &Expr) -> bool {
    match &cond.kind {
        ExprKind::Paren(inner) => only_instanceof(inner),
        ExprKind::Unary {
            op: phpverify_core::ir::UnaryOp::Not,
            operand,
        } => only_instanceof(operand),
        ExprKind::Binary {
            op: phpverify_core::ir::BinaryOp::And | phpverify_core::ir::BinaryOp::Or,
            left,
            right,
        } => only_instanceof(left) && only_instanceof(right),
        ExprKind::InstanceOf { .. } => true,
        _ => false,
    }
}

/// Narrowed variables go back to what they were before the branch
fn restore_implicit_vars(ctx: &mut BlockContext, initial: &crate::scope::Scope) {
    let narrowed: Vec<String> = ctx
        .scope
        .iter()
        .filter(|(_, var)| var.implicit)
        .map(|(name, _)| name.clone())
        .collect();
    for name in narrowed {
        if let Some(original) = initial.get_var(&name) {
            ctx.scope.restore_var(&name, original.clone());
        }
    }
}

struct ExitPointFinder {
    flags: ExitFlags,
    points: Vec<(Span, &'static str)>,
}

impl Visitor for ExitPointFinder {
    fn visit_stmt(&mut self, stmt: &Stmt) -> bool {
        if let StmtKind::Return(_) = stmt.kind {
            if self.flags.contains(ExitFlags::RETURN) {
                self.points.push((stmt.span, "return"));
            }
        }
        true
    }

    fn visit_expr(&mut self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Throw(_) if self.flags.contains(ExitFlags::THROW) => self.points.push((expr.span, "throw")),
            ExprKind::Exit { die, .. } if self.flags.contains(ExitFlags::DIE) => {
                self.points.push((expr.span, if *die { "die" } else { "exit" }))
            }
            _ => {}
        }
        true
    }
}

/// `return`, `throw`, `exit` and `die` in `stmts` matching `flags`, in source order
fn find_exit_points(stmts: &[Stmt], flags: ExitFlags) -> Vec<(Span, &'static str)> {
    let mut finder = ExitPointFinder {
        flags,
        points: Vec::new(),
    };
    walk_stmt(&mut finder, stmts);
    finder.points
}
