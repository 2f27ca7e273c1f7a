//! Lowering from the mago AST into the owned IR
//!
//! The traversal mirrors the shape of the syntax tree. Operators and a few
//! rarely used constructs are classified from their source text, which keeps
//! this module independent of the finer details of the mago node API.

use mago_span::HasSpan;
use mago_syntax::ast::*;

use crate::ir::{
    self, Arg, ArrayItem, ArrowFunctionDecl, AssignOp, BinaryOp, Callee, CatchClause, ClassConstDecl,
    ClassDecl, ClassKind, ClassRef, ClosureDecl, ClosureUse, ConstItem, ElseIf, Expr, ExprKind,
    FinallyClause, ForeachStmt, FunctionDecl, IfStmt, MatchArm as IrMatchArm, Member, MethodDecl,
    Param, PropertyDecl, PropertyItem, Span, StaticVar, Stmt, StmtKind, SwitchStmt, TryStmt,
    UnaryOp, UseKind, Visibility,
};

/// Converts one parsed program into IR, reading operator text from `source`
pub struct Lowerer<'s> {
    source: &'s str,
}

fn to_span(span: mago_span::Span) -> Span {
    Span::new(span.start.offset, span.end.offset)
}

fn expr_span(expr: &Expression<'_>) -> Span {
    to_span(expr.span())
}

fn stmt_span(stmt: &Statement<'_>) -> Span {
    to_span(stmt.span())
}

fn visibility_of<'b, 'a: 'b>(modifiers: impl Iterator<Item = &'b Modifier<'a>>) -> Visibility {
    for m in modifiers {
        if m.is_private() {
            return Visibility::Private;
        }
        if m.is_protected() {
            return Visibility::Protected;
        }
        if m.is_public() {
            return Visibility::Public;
        }
    }
    Visibility::Public
}

impl<'s> Lowerer<'s> {
    /// Create a new lowerer over the given source text
    pub fn new(source: &'s str) -> Self {
        Self { source }
    }

    fn text(&self, span: Span) -> &'s str {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or("")
    }

    pub fn lower_program(&self, program: &Program<'_>) -> ir::File {
        ir::File {
            statements: self.lower_stmts(program.statements.iter()),
        }
    }

    fn lower_stmts<'b, 'a: 'b, I>(&self, stmts: I) -> Vec<Stmt>
    where
        I: Iterator<Item = &'b Statement<'a>>,
    {
        stmts.map(|s| self.lower_stmt(s)).collect()
    }

    /// Lower a statement used as a loop or branch body, flattening braces
    fn lower_body(&self, stmt: &Statement<'_>) -> Vec<Stmt> {
        match stmt {
            Statement::Block(block) => self.lower_stmts(block.statements.iter()),
            _ => vec![self.lower_stmt(stmt)],
        }
    }

    fn lower_stmt(&self, stmt: &Statement<'_>) -> Stmt {
        let span = stmt_span(stmt);
        let kind = match stmt {
            Statement::Expression(expr_stmt) => StmtKind::Expr(self.lower_expr(&expr_stmt.expression)),
            Statement::Echo(echo) => {
                StmtKind::Echo(echo.values.iter().map(|e| self.lower_expr(e)).collect())
            }
            Statement::Return(ret) => {
                StmtKind::Return(ret.value.as_ref().map(|e| self.lower_expr(e)))
            }
            Statement::Break(_) => StmtKind::Break,
            Statement::Continue(_) => StmtKind::Continue,
            Statement::Block(block) => StmtKind::Block(self.lower_stmts(block.statements.iter())),
            Statement::If(if_stmt) => self.lower_if(if_stmt),
            Statement::While(while_stmt) => {
                let body = match &while_stmt.body {
                    WhileBody::Statement(inner) => self.lower_body(inner),
                    WhileBody::ColonDelimited(body) => self.lower_stmts(body.statements.iter()),
                };
                StmtKind::While {
                    cond: self.lower_expr(&while_stmt.condition),
                    body,
                }
            }
            Statement::DoWhile(do_while) => StmtKind::DoWhile {
                body: self.lower_body(&do_while.statement),
                cond: self.lower_expr(&do_while.condition),
            },
            Statement::For(for_stmt) => {
                let body = match &for_stmt.body {
                    ForBody::Statement(inner) => self.lower_body(inner),
                    ForBody::ColonDelimited(body) => self.lower_stmts(body.statements.iter()),
                };
                StmtKind::For {
                    init: for_stmt.initializations.iter().map(|e| self.lower_expr(e)).collect(),
                    cond: for_stmt.conditions.iter().map(|e| self.lower_expr(e)).collect(),
                    step: for_stmt.increments.iter().map(|e| self.lower_expr(e)).collect(),
                    body,
                }
            }
            Statement::Foreach(foreach) => self.lower_foreach(foreach),
            Statement::Switch(switch) => self.lower_switch(switch),
            Statement::Try(try_stmt) => self.lower_try(try_stmt),
            Statement::Global(global) => StmtKind::Global(
                global
                    .variables
                    .iter()
                    .filter_map(|var| match var {
                        Variable::Direct(dv) => Some(dv.name.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            Statement::Static(static_stmt) => StmtKind::Static(
                static_stmt
                    .items
                    .iter()
                    .map(|item| {
                        let item_span = to_span(item.span());
                        let text = self.text(item_span);
                        let default = text.find('=').map(|eq| {
                            let start = item_span.start + eq as u32 + 1;
                            let value_span = Span::new(start, item_span.end);
                            literal_from_text(self.text(value_span), value_span)
                        });
                        StaticVar {
                            name: item.variable().name.to_string(),
                            default,
                            span: item_span,
                        }
                    })
                    .collect(),
            ),
            Statement::Unset(_) => StmtKind::Unset(unset_targets(self.text(span))),
            Statement::Namespace(ns) => StmtKind::Namespace {
                name: ns
                    .name
                    .as_ref()
                    .map(|ident| ident.value().to_string())
                    .filter(|name| !name.is_empty()),
                body: self.lower_stmts(ns.statements().iter()),
            },
            Statement::Use(use_stmt) => StmtKind::Use(self.lower_use(&use_stmt.items)),
            Statement::Function(func) => StmtKind::Function(self.lower_function(func)),
            Statement::Class(class) => {
                StmtKind::Class(ClassDecl {
                    kind: ClassKind::Class,
                    name: class.name.value.to_string(),
                    name_span: to_span(class.name.span()),
                    span,
                    extends: class
                        .extends
                        .as_ref()
                        .map(|ext| ext.types.iter().map(|t| t.value().to_string()).collect())
                        .unwrap_or_default(),
                    implements: class
                        .implements
                        .as_ref()
                        .map(|imp| imp.types.iter().map(|t| t.value().to_string()).collect())
                        .unwrap_or_default(),
                    is_abstract: class.modifiers.contains_abstract(),
                    is_final: class.modifiers.contains_final(),
                    backed: None,
                    members: class.members.iter().map(|m| self.lower_member(m)).collect(),
                })
            }
            Statement::Interface(iface) => StmtKind::Class(ClassDecl {
                kind: ClassKind::Interface,
                name: iface.name.value.to_string(),
                name_span: to_span(iface.name.span()),
                span,
                extends: iface
                    .extends
                    .as_ref()
                    .map(|ext| ext.types.iter().map(|t| t.value().to_string()).collect())
                    .unwrap_or_default(),
                implements: Vec::new(),
                is_abstract: true,
                is_final: false,
                backed: None,
                members: iface.members.iter().map(|m| self.lower_member(m)).collect(),
            }),
            Statement::Trait(tr) => StmtKind::Class(ClassDecl {
                kind: ClassKind::Trait,
                name: tr.name.value.to_string(),
                name_span: to_span(tr.name.span()),
                span,
                extends: Vec::new(),
                implements: Vec::new(),
                is_abstract: false,
                is_final: false,
                backed: None,
                members: tr.members.iter().map(|m| self.lower_member(m)).collect(),
            }),
            Statement::Enum(en) => StmtKind::Class(ClassDecl {
                kind: ClassKind::Enum,
                name: en.name.value.to_string(),
                name_span: to_span(en.name.span()),
                span,
                extends: Vec::new(),
                implements: en
                    .implements
                    .as_ref()
                    .map(|imp| imp.types.iter().map(|t| t.value().to_string()).collect())
                    .unwrap_or_default(),
                is_abstract: false,
                is_final: true,
                backed: en.backing_type_hint.as_ref().map(|b| {
                    self.text(to_span(b.span()))
                        .trim_start_matches(':')
                        .trim()
                        .to_string()
                }),
                members: en.members.iter().map(|m| self.lower_member(m)).collect(),
            }),
            Statement::Constant(constant) => StmtKind::Const(
                constant
                    .items
                    .iter()
                    .map(|item| ConstItem {
                        name: item.name.value.to_string(),
                        value: self.lower_expr(&item.value),
                        span: to_span(item.span()),
                    })
                    .collect(),
            ),
            _ => StmtKind::Nop,
        };
        Stmt::new(kind, span)
    }

    fn lower_if(&self, if_stmt: &If<'_>) -> StmtKind {
        let cond = self.lower_expr(&if_stmt.condition);
        let lowered = match &if_stmt.body {
            IfBody::Statement(body) => IfStmt {
                cond,
                then: self.lower_body(&body.statement),
                then_span: stmt_span(&body.statement),
                else_ifs: body
                    .else_if_clauses
                    .iter()
                    .map(|clause| ElseIf {
                        cond: self.lower_expr(&clause.condition),
                        body: self.lower_body(&clause.statement),
                        span: to_span(clause.span()),
                    })
                    .collect(),
                else_body: body
                    .else_clause
                    .as_ref()
                    .map(|clause| self.lower_body(&clause.statement)),
            },
            IfBody::ColonDelimited(body) => IfStmt {
                cond,
                then: self.lower_stmts(body.statements.iter()),
                then_span: to_span(body.span()),
                else_ifs: body
                    .else_if_clauses
                    .iter()
                    .map(|clause| ElseIf {
                        cond: self.lower_expr(&clause.condition),
                        body: self.lower_stmts(clause.statements.iter()),
                        span: to_span(clause.span()),
                    })
                    .collect(),
                else_body: body
                    .else_clause
                    .as_ref()
                    .map(|clause| self.lower_stmts(clause.statements.iter())),
            },
        };
        StmtKind::If(lowered)
    }

    fn lower_foreach(&self, foreach: &Foreach<'_>) -> StmtKind {
        let body = match &foreach.body {
            ForeachBody::Statement(inner) => self.lower_body(inner),
            ForeachBody::ColonDelimited(body) => self.lower_stmts(body.statements.iter()),
        };
        let (value, by_ref) = strip_reference(self.lower_expr(foreach.target.value()));
        StmtKind::Foreach(ForeachStmt {
            expr: self.lower_expr(&foreach.expression),
            key: foreach.target.key().map(|k| self.lower_expr(k)),
            value,
            by_ref,
            body,
        })
    }

    fn lower_switch(&self, switch: &Switch<'_>) -> StmtKind {
        let cases: Vec<&SwitchCase<'_>> = match &switch.body {
            SwitchBody::BraceDelimited(body) => body.cases.iter().collect(),
            SwitchBody::ColonDelimited(body) => body.cases.iter().collect(),
        };

        let mut lowered = Vec::with_capacity(cases.len());
        let mut prev_tail: Option<u32> = None;
        for case in cases {
            let case_span = to_span(case.span());
            let fallthrough_comment = prev_tail
                .map(|tail| {
                    let between = self.text(Span::new(tail, case_span.start));
                    between.to_ascii_lowercase().contains("fallthrough")
                })
                .unwrap_or(false);

            let (cond, body) = match case {
                SwitchCase::Expression(c) => (
                    Some(self.lower_expr(&c.expression)),
                    self.lower_stmts(c.statements.iter()),
                ),
                SwitchCase::Default(d) => (None, self.lower_stmts(d.statements.iter())),
            };

            prev_tail = Some(body.last().map(|s| s.span.end).unwrap_or(case_span.start));
            lowered.push(ir::SwitchCase {
                cond,
                body,
                span: case_span,
                fallthrough_comment,
            });
        }

        StmtKind::Switch(SwitchStmt {
            subject: self.lower_expr(&switch.expression),
            cases: lowered,
        })
    }

    fn lower_try(&self, try_stmt: &Try<'_>) -> StmtKind {
        let catches = try_stmt
            .catch_clauses
            .iter()
            .map(|catch| CatchClause {
                types: self
                    .text(to_span(catch.hint.span()))
                    .split('|')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
                var: catch.variable.as_ref().map(|v| v.name.to_string()),
                body: self.lower_stmts(catch.block.statements.iter()),
                span: to_span(catch.span()),
            })
            .collect();

        StmtKind::Try(TryStmt {
            body: self.lower_stmts(try_stmt.block.statements.iter()),
            catches,
            finally: try_stmt.finally_clause.as_ref().map(|finally| FinallyClause {
                body: self.lower_stmts(finally.block.statements.iter()),
                span: to_span(finally.span()),
            }),
        })
    }

    fn lower_use(&self, items: &UseItems<'_>) -> Vec<ir::UseItem> {
        fn kind_of(is_function: bool, is_const: bool) -> UseKind {
            if is_function {
                UseKind::Function
            } else if is_const {
                UseKind::Const
            } else {
                UseKind::Class
            }
        }

        let item = |kind: UseKind, prefix: Option<&str>, item: &UseItem<'_>| {
            let name = item.name.value().trim_start_matches('\\');
            ir::UseItem {
                kind,
                name: match prefix {
                    Some(prefix) => format!("{}\\{}", prefix.trim_start_matches('\\'), name),
                    None => name.to_string(),
                },
                alias: item.alias.as_ref().map(|a| a.identifier.value.to_string()),
            }
        };

        match items {
            UseItems::Sequence(seq) => seq
                .items
                .iter()
                .map(|i| item(UseKind::Class, None, i))
                .collect(),
            UseItems::TypedSequence(seq) => {
                let kind = kind_of(seq.r#type.is_function(), seq.r#type.is_const());
                seq.items.iter().map(|i| item(kind, None, i)).collect()
            }
            UseItems::TypedList(list) => {
                let kind = kind_of(list.r#type.is_function(), list.r#type.is_const());
                let prefix = list.namespace.value();
                list.items.iter().map(|i| item(kind, Some(prefix), i)).collect()
            }
            UseItems::MixedList(list) => {
                let prefix = list.namespace.value();
                list.items
                    .iter()
                    .map(|maybe_typed| {
                        let kind = match &maybe_typed.r#type {
                            Some(t) => kind_of(t.is_function(), t.is_const()),
                            None => UseKind::Class,
                        };
                        item(kind, Some(prefix), &maybe_typed.item)
                    })
                    .collect()
            }
        }
    }

    fn lower_params(&self, list: &FunctionLikeParameterList<'_>) -> Vec<Param> {
        list.parameters
            .iter()
            .map(|param| Param {
                name: param.variable.name.to_string(),
                span: to_span(param.span()),
                hint: param.hint.as_ref().map(|h| self.hint_text(h)),
                default: param.default_value.as_ref().map(|d| self.lower_expr(&d.value)),
                by_ref: param.ampersand.is_some(),
                variadic: param.ellipsis.is_some(),
                promoted: if param.is_promoted_property() {
                    Some(visibility_of(param.modifiers.iter()))
                } else {
                    None
                },
            })
            .collect()
    }

    fn hint_text(&self, hint: &Hint<'_>) -> String {
        self.text(to_span(hint.span())).trim().to_string()
    }

    fn return_hint(&self, hint: Option<&FunctionLikeReturnTypeHint<'_>>) -> Option<String> {
        hint.map(|rth| self.hint_text(&rth.hint))
    }

    fn lower_function(&self, func: &Function<'_>) -> FunctionDecl {
        let span = to_span(func.span());
        let name_span = to_span(func.name.span());
        FunctionDecl {
            name: func.name.value.to_string(),
            name_span,
            span,
            params: self.lower_params(&func.parameter_list),
            return_hint: self.return_hint(func.return_type_hint.as_ref()),
            by_ref: self.text(Span::new(span.start, name_span.start)).contains('&'),
            body: self.lower_stmts(func.body.statements.iter()),
        }
    }

    fn lower_member(&self, member: &ClassLikeMember<'_>) -> Member {
        match member {
            ClassLikeMember::Method(method) => {
                let body = match &method.body {
                    MethodBody::Concrete(block) => Some(self.lower_stmts(block.statements.iter())),
                    _ => None,
                };
                Member::Method(MethodDecl {
                    name: method.name.value.to_string(),
                    name_span: to_span(method.name.span()),
                    span: to_span(method.span()),
                    params: self.lower_params(&method.parameter_list),
                    return_hint: self.return_hint(method.return_type_hint.as_ref()),
                    body,
                    is_static: method.modifiers.contains_static(),
                    is_abstract: method.modifiers.contains_abstract(),
                    is_final: method.modifiers.contains_final(),
                    visibility: visibility_of(method.modifiers.iter()),
                })
            }
            ClassLikeMember::Property(property) => {
                let span = to_span(property.span());
                let variables = property.variables();
                let vars: Vec<_> = variables.iter().collect();
                let mut items = Vec::with_capacity(vars.len());
                for (i, var) in vars.iter().enumerate() {
                    let var_span = to_span(var.span());
                    let limit = vars
                        .get(i + 1)
                        .map(|next| to_span(next.span()).start)
                        .unwrap_or(span.end);
                    let tail = Span::new(var_span.end, limit);
                    items.push(PropertyItem {
                        name: var.name.to_string(),
                        default: self.initializer_after(tail),
                        span: var_span,
                    });
                }
                Member::Property(PropertyDecl {
                    items,
                    hint: property.hint().map(|h| self.hint_text(h)),
                    is_static: property.modifiers().iter().any(|m| m.is_static()),
                    visibility: visibility_of(property.modifiers().iter()),
                })
            }
            ClassLikeMember::Constant(constant) => Member::Constant(ClassConstDecl {
                items: constant
                    .items
                    .iter()
                    .map(|item| ConstItem {
                        name: item.name.value.to_string(),
                        value: self.lower_expr(&item.value),
                        span: to_span(item.span()),
                    })
                    .collect(),
                visibility: visibility_of(constant.modifiers.iter()),
            }),
            ClassLikeMember::EnumCase(enum_case) => {
                let span = to_span(enum_case.span());
                let name_span = to_span(enum_case.item.name().span());
                Member::EnumCase {
                    name: enum_case.item.name().value.to_string(),
                    value: self.initializer_after(Span::new(name_span.end, span.end)),
                    span,
                }
            }
            ClassLikeMember::TraitUse(trait_use) => Member::TraitUse(
                trait_use
                    .trait_names
                    .iter()
                    .map(|name| name.value().to_string())
                    .collect(),
            ),
        }
    }

    /// Find `= value` inside `span` and lower the value from its text
    fn initializer_after(&self, span: Span) -> Option<Expr> {
        let text = self.text(span);
        let eq = text.find('=')?;
        let mut end = text.len();
        // stop at the separator of the next declaration
        let mut depth = 0i32;
        let mut in_string: Option<char> = None;
        for (i, c) in text.char_indices().skip(eq + 1) {
            match in_string {
                Some(q) if c == q => in_string = None,
                Some(_) => {}
                None => match c {
                    '\'' | '"' => in_string = Some(c),
                    '(' | '[' | '{' => depth += 1,
                    ')' | ']' | '}' => depth -= 1,
                    ',' | ';' if depth <= 0 => {
                        end = i;
                        break;
                    }
                    _ => {}
                },
            }
        }
        let start = span.start + eq as u32 + 1;
        let value_span = Span::new(start, span.start + end as u32);
        Some(literal_from_text(self.text(value_span), value_span))
    }

    fn lower_args(&self, list: &ArgumentList<'_>) -> Vec<Arg> {
        list.arguments
            .iter()
            .map(|arg| {
                let text = self.text(to_span(arg.span())).trim_start();
                let named = match arg {
                    Argument::Named(_) => text
                        .split(':')
                        .next()
                        .map(|n| n.trim().to_string()),
                    _ => None,
                };
                Arg {
                    value: self.lower_expr(arg.value()),
                    unpack: text.starts_with("..."),
                    named,
                }
            })
            .collect()
    }

    fn lower_class_ref(&self, expr: &Expression<'_>) -> ClassRef {
        match expr {
            Expression::Identifier(ident) => ClassRef::Name(ident.value().to_string()),
            Expression::Self_(_) => ClassRef::SelfRef,
            Expression::Static(_) => ClassRef::StaticRef,
            Expression::Parent(_) => ClassRef::ParentRef,
            _ => ClassRef::Dynamic(Box::new(self.lower_expr(expr))),
        }
    }

    fn lower_array_elements<'b, 'a: 'b, I>(&self, elements: I) -> Vec<Option<ArrayItem>>
    where
        I: Iterator<Item = &'b ArrayElement<'a>>,
    {
        elements
            .map(|element| match element {
                ArrayElement::KeyValue(kv) => {
                    let (value, by_ref) = strip_reference(self.lower_expr(&kv.value));
                    Some(ArrayItem {
                        key: Some(self.lower_expr(&kv.key)),
                        value,
                        by_ref,
                        unpack: false,
                    })
                }
                ArrayElement::Value(v) => {
                    let (value, by_ref) = strip_reference(self.lower_expr(&v.value));
                    Some(ArrayItem {
                        key: None,
                        value,
                        by_ref,
                        unpack: false,
                    })
                }
                ArrayElement::Variadic(v) => Some(ArrayItem {
                    key: None,
                    value: self.lower_expr(&v.value),
                    by_ref: false,
                    unpack: true,
                }),
                ArrayElement::Missing(_) => None,
            })
            .collect()
    }

    fn member_name(selector: &ClassLikeMemberSelector<'_>) -> Option<String> {
        match selector {
            ClassLikeMemberSelector::Identifier(ident) => Some(ident.value.to_string()),
            _ => None,
        }
    }

    pub fn lower_expr(&self, expr: &Expression<'_>) -> Expr {
        let span = expr_span(expr);
        let kind = match expr {
            Expression::Parenthesized(paren) => {
                ExprKind::Paren(Box::new(self.lower_expr(&paren.expression)))
            }
            Expression::Variable(Variable::Direct(dv)) => ExprKind::Var(dv.name.to_string()),
            Expression::Variable(_) => ExprKind::DynamicVar(scan_variables(self.text(span))),
            Expression::Literal(literal) => match literal {
                Literal::String(s) => ExprKind::Str(s.value.map(|v| v.to_string())),
                Literal::Integer(_) => ExprKind::Int,
                Literal::Float(_) => ExprKind::Float,
                Literal::True(_) => ExprKind::Bool(true),
                Literal::False(_) => ExprKind::Bool(false),
                Literal::Null(_) => ExprKind::Null,
            },
            Expression::CompositeString(_) => {
                ExprKind::Interpolated(scan_interpolated(self.text(span)))
            }
            Expression::MagicConstant(_) => ExprKind::MagicConst(self.text(span).to_string()),
            Expression::ConstantAccess(_) => const_kind(self.text(span).trim()),
            Expression::Identifier(ident) => const_kind(ident.value()),
            Expression::Array(array) => ExprKind::Array(
                self.lower_array_elements(array.elements.iter())
                    .into_iter()
                    .flatten()
                    .collect(),
            ),
            Expression::LegacyArray(array) => ExprKind::Array(
                self.lower_array_elements(array.elements.iter())
                    .into_iter()
                    .flatten()
                    .collect(),
            ),
            Expression::List(list) => {
                ExprKind::List(self.lower_array_elements(list.elements.iter()))
            }
            Expression::ArrayAccess(access) => ExprKind::ArrayDim {
                base: Box::new(self.lower_expr(&access.array)),
                index: Some(Box::new(self.lower_expr(&access.index))),
            },
            Expression::ArrayAppend(append) => ExprKind::ArrayDim {
                base: Box::new(self.lower_expr(&append.array)),
                index: None,
            },
            Expression::Assignment(assignment) => {
                let lhs = self.lower_expr(&assignment.lhs);
                let rhs = self.lower_expr(&assignment.rhs);
                let op_text = self.text(Span::new(lhs.span.end, rhs.span.start)).trim();
                let op_by_ref = op_text.ends_with('&');
                let op_text = op_text.trim_end_matches('&').trim();
                let (value, rhs_by_ref) = strip_reference(rhs);
                ExprKind::Assign {
                    target: Box::new(lhs),
                    value: Box::new(value),
                    op: AssignOp::from_text(op_text),
                    by_ref: op_by_ref || rhs_by_ref,
                }
            }
            Expression::Binary(binary) => {
                let lhs = self.lower_expr(&binary.lhs);
                let op_text = self.text(Span::new(lhs.span.end, expr_span(&binary.rhs).start));
                let op_text = op_text.trim();
                if op_text.eq_ignore_ascii_case("instanceof") {
                    ExprKind::InstanceOf {
                        expr: Box::new(lhs),
                        class: self.lower_class_ref(&binary.rhs),
                    }
                } else {
                    ExprKind::Binary {
                        op: BinaryOp::from_text(op_text),
                        left: Box::new(lhs),
                        right: Box::new(self.lower_expr(&binary.rhs)),
                    }
                }
            }
            Expression::UnaryPrefix(prefix) => {
                let operand = self.lower_expr(&prefix.operand);
                let op_text = self.text(Span::new(span.start, operand.span.start));
                ExprKind::Unary {
                    op: UnaryOp::prefix_from_text(op_text),
                    operand: Box::new(operand),
                }
            }
            Expression::UnaryPostfix(postfix) => {
                let operand = self.lower_expr(&postfix.operand);
                let op_text = self.text(Span::new(operand.span.end, span.end));
                ExprKind::Unary {
                    op: UnaryOp::postfix_from_text(op_text),
                    operand: Box::new(operand),
                }
            }
            Expression::Conditional(cond) => ExprKind::Ternary {
                cond: Box::new(self.lower_expr(&cond.condition)),
                then: cond.then.as_ref().map(|e| Box::new(self.lower_expr(e))),
                otherwise: Box::new(self.lower_expr(&cond.r#else)),
            },
            Expression::Call(call) => self.lower_call(call),
            Expression::Access(access) => match access {
                Access::Property(pa) => ExprKind::PropertyFetch {
                    object: Box::new(self.lower_expr(&pa.object)),
                    property: Self::member_name(&pa.property),
                    nullsafe: false,
                },
                Access::NullSafeProperty(pa) => ExprKind::PropertyFetch {
                    object: Box::new(self.lower_expr(&pa.object)),
                    property: Self::member_name(&pa.property),
                    nullsafe: true,
                },
                Access::StaticProperty(pa) => ExprKind::StaticPropertyFetch {
                    class: self.lower_class_ref(&pa.class),
                    property: match &pa.property {
                        Variable::Direct(dv) => Some(dv.name.to_string()),
                        _ => None,
                    },
                },
                Access::ClassConstant(pa) => ExprKind::ClassConstFetch {
                    class: self.lower_class_ref(&pa.class),
                    constant: match &pa.constant {
                        ClassLikeConstantSelector::Identifier(ident) => ident.value.to_string(),
                        _ => String::new(),
                    },
                },
            },
            Expression::Instantiation(inst) => ExprKind::New {
                class: self.lower_class_ref(&inst.class),
                args: inst
                    .argument_list
                    .as_ref()
                    .map(|list| self.lower_args(list))
                    .unwrap_or_default(),
            },
            Expression::Closure(closure) => {
                let text = self.text(span).trim_start();
                ExprKind::Closure(Box::new(ClosureDecl {
                    params: self.lower_params(&closure.parameter_list),
                    uses: closure
                        .use_clause
                        .as_ref()
                        .map(|clause| {
                            clause
                                .variables
                                .iter()
                                .map(|var| ClosureUse {
                                    name: var.variable.name.to_string(),
                                    by_ref: var.ampersand.is_some(),
                                    span: to_span(var.span()),
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                    return_hint: self.return_hint(closure.return_type_hint.as_ref()),
                    is_static: text.starts_with("static"),
                    body: self.lower_stmts(closure.body.statements.iter()),
                }))
            }
            Expression::ArrowFunction(arrow) => {
                let text = self.text(span).trim_start();
                ExprKind::ArrowFunction(Box::new(ArrowFunctionDecl {
                    params: self.lower_params(&arrow.parameter_list),
                    return_hint: self.return_hint(arrow.return_type_hint.as_ref()),
                    is_static: text.starts_with("static"),
                    body: Box::new(self.lower_expr(&arrow.expression)),
                }))
            }
            Expression::Match(m) => ExprKind::Match {
                subject: Box::new(self.lower_expr(&m.expression)),
                arms: m
                    .arms
                    .iter()
                    .map(|arm| match arm {
                        MatchArm::Expression(arm_expr) => IrMatchArm {
                            conditions: arm_expr
                                .conditions
                                .iter()
                                .map(|c| self.lower_expr(c))
                                .collect(),
                            body: self.lower_expr(&arm_expr.expression),
                        },
                        MatchArm::Default(arm_default) => IrMatchArm {
                            conditions: Vec::new(),
                            body: self.lower_expr(&arm_default.expression),
                        },
                    })
                    .collect(),
            },
            Expression::Throw(throw) => ExprKind::Throw(Box::new(self.lower_expr(&throw.exception))),
            Expression::Clone(clone) => ExprKind::Clone(Box::new(self.lower_expr(&clone.object))),
            Expression::Yield(y) => match y {
                Yield::Value(yv) => ExprKind::Yield {
                    key: None,
                    value: yv.value.as_ref().map(|v| Box::new(self.lower_expr(v))),
                },
                Yield::Pair(yp) => ExprKind::Yield {
                    key: Some(Box::new(self.lower_expr(&yp.key))),
                    value: Some(Box::new(self.lower_expr(&yp.value))),
                },
                Yield::From(yf) => ExprKind::YieldFrom(Box::new(self.lower_expr(&yf.iterator))),
            },
            Expression::Construct(construct) => match construct {
                Construct::Isset(isset) => {
                    ExprKind::Isset(isset.values.iter().map(|v| self.lower_expr(v)).collect())
                }
                Construct::Empty(empty) => ExprKind::Empty(Box::new(self.lower_expr(&empty.value))),
                Construct::Require(c) => ExprKind::Include(Box::new(self.lower_expr(&c.value))),
                Construct::RequireOnce(c) => ExprKind::Include(Box::new(self.lower_expr(&c.value))),
                Construct::Include(c) => ExprKind::Include(Box::new(self.lower_expr(&c.value))),
                Construct::IncludeOnce(c) => ExprKind::Include(Box::new(self.lower_expr(&c.value))),
                _ => construct_kind(self.text(span)),
            },
            Expression::Self_(_) | Expression::Static(_) | Expression::Parent(_) => {
                ExprKind::Opaque(Vec::new())
            }
            _ => opaque_kind(self.text(span)),
        };
        Expr::new(kind, span)
    }

    fn lower_call(&self, call: &Call<'_>) -> ExprKind {
        match call {
            Call::Function(f) => {
                let function: &Expression<'_> = &f.function;
                ExprKind::Call {
                    callee: match function {
                        Expression::Identifier(ident) => Callee::Name(ident.value().to_string()),
                        other => Callee::Expr(Box::new(self.lower_expr(other))),
                    },
                    args: self.lower_args(&f.argument_list),
                }
            }
            Call::Method(m) => ExprKind::MethodCall {
                object: Box::new(self.lower_expr(&m.object)),
                method: Self::member_name(&m.method),
                args: self.lower_args(&m.argument_list),
                nullsafe: false,
            },
            Call::NullSafeMethod(m) => ExprKind::MethodCall {
                object: Box::new(self.lower_expr(&m.object)),
                method: Self::member_name(&m.method),
                args: self.lower_args(&m.argument_list),
                nullsafe: true,
            },
            Call::StaticMethod(s) => ExprKind::StaticCall {
                class: self.lower_class_ref(&s.class),
                method: Self::member_name(&s.method),
                args: self.lower_args(&s.argument_list),
            },
        }
    }
}

/// Unwrap a `&$x` operand, reporting whether a reference was taken
fn strip_reference(expr: Expr) -> (Expr, bool) {
    match expr.kind {
        ExprKind::Unary {
            op: UnaryOp::Reference,
            operand,
        } => (*operand, true),
        kind => (Expr::new(kind, expr.span), false),
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic() || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric() || !c.is_ascii()
}

fn is_name_like(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    if chars.peek() == Some(&'\\') {
        chars.next();
    }
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(|c| is_ident_char(c) || c == '\\')
}

/// Collect every `$name` mentioned in a fragment of source
pub fn scan_variables(text: &str) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '$' && i + 1 < chars.len() && is_ident_start(chars[i + 1]) {
            let mut j = i + 1;
            while j < chars.len() && is_ident_char(chars[j]) {
                j += 1;
            }
            let name: String = chars[i..j].iter().collect();
            if !vars.contains(&name) {
                vars.push(name);
            }
            i = j;
        } else {
            i += 1;
        }
    }
    vars
}

/// Variables interpolated into a double-quoted string or heredoc
fn scan_interpolated(text: &str) -> Vec<String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with("<<<'") || trimmed.starts_with("<<< '") {
        return Vec::new();
    }
    let mut cleaned = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        if escaped {
            escaped = false;
            cleaned.push(' ');
            continue;
        }
        if c == '\\' {
            escaped = true;
            cleaned.push(' ');
            continue;
        }
        cleaned.push(c);
    }
    scan_variables(&cleaned)
}

/// Variables passed as plain arguments to `unset(...)`
fn unset_targets(text: &str) -> Vec<String> {
    let inner = match (text.find('('), text.rfind(')')) {
        (Some(open), Some(close)) if open < close => &text[open + 1..close],
        _ => return Vec::new(),
    };
    inner
        .split(',')
        .map(str::trim)
        .filter(|arg| arg.starts_with('$') && arg[1..].chars().all(is_ident_char) && arg.len() > 1)
        .map(str::to_string)
        .collect()
}

fn const_kind(name: &str) -> ExprKind {
    match name.to_ascii_lowercase().trim_start_matches('\\') {
        "true" => ExprKind::Bool(true),
        "false" => ExprKind::Bool(false),
        "null" => ExprKind::Null,
        _ => ExprKind::ConstFetch(name.to_string()),
    }
}

fn construct_kind(text: &str) -> ExprKind {
    let trimmed = text.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("exit") {
        ExprKind::Exit {
            die: false,
            reads: scan_variables(trimmed),
        }
    } else if lower.starts_with("die") {
        ExprKind::Exit {
            die: true,
            reads: scan_variables(trimmed),
        }
    } else if lower.starts_with("print") {
        ExprKind::Print(scan_variables(trimmed))
    } else {
        ExprKind::Opaque(scan_variables(trimmed))
    }
}

fn opaque_kind(text: &str) -> ExprKind {
    let trimmed = text.trim();
    if is_name_like(trimmed) {
        return const_kind(trimmed);
    }
    let lower = trimmed.to_ascii_lowercase();
    // anonymous classes carry their own method scopes
    if lower.starts_with("new") {
        return ExprKind::Opaque(Vec::new());
    }
    if lower.starts_with("exit") || lower.starts_with("die") || lower.starts_with("print") {
        return construct_kind(trimmed);
    }
    ExprKind::Opaque(scan_variables(trimmed))
}

/// Lower a constant initializer known only by its source text.
///
/// Covers scalars, arrays, `new`, constants and class constants; anything
/// else becomes an opaque expression.
pub fn literal_from_text(text: &str, span: Span) -> Expr {
    let t = text.trim();
    let lower = t.to_ascii_lowercase();
    let kind = if t.is_empty() {
        ExprKind::Opaque(Vec::new())
    } else if t.starts_with('\'') {
        let inner = t.trim_start_matches('\'').trim_end_matches('\'');
        ExprKind::Str(if inner.contains('\\') {
            None
        } else {
            Some(inner.to_string())
        })
    } else if t.starts_with('"') || t.starts_with("<<<") {
        ExprKind::Str(None)
    } else if lower == "true" || lower == "false" || lower == "null" {
        const_kind(&lower)
    } else if t
        .trim_start_matches(['-', '+'])
        .starts_with(|c: char| c.is_ascii_digit() || c == '.')
    {
        let digits = t.trim_start_matches(['-', '+']);
        let is_hex_or_bin = digits.starts_with("0x")
            || digits.starts_with("0X")
            || digits.starts_with("0b")
            || digits.starts_with("0B");
        if !is_hex_or_bin && (digits.contains('.') || digits.contains(['e', 'E'])) {
            ExprKind::Float
        } else {
            ExprKind::Int
        }
    } else if t.starts_with('[') || lower.starts_with("array(") || lower.starts_with("array (") {
        let inner = t
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim();
        let inner = inner.get(1..inner.len().saturating_sub(1)).unwrap_or("");
        if inner.trim().is_empty() {
            ExprKind::Array(Vec::new())
        } else {
            ExprKind::Array(vec![ArrayItem {
                key: None,
                value: Expr::new(ExprKind::Opaque(Vec::new()), span),
                by_ref: false,
                unpack: false,
            }])
        }
    } else if lower.starts_with("new ") {
        let name: String = t[4..]
            .trim_start()
            .chars()
            .take_while(|c| is_ident_char(*c) || *c == '\\')
            .collect();
        if name.is_empty() {
            ExprKind::Opaque(Vec::new())
        } else {
            ExprKind::New {
                class: ClassRef::Name(name),
                args: Vec::new(),
            }
        }
    } else if let Some((class, constant)) = t.split_once("::") {
        let class = class.trim();
        let class_ref = match class.to_ascii_lowercase().as_str() {
            "self" => ClassRef::SelfRef,
            "static" => ClassRef::StaticRef,
            "parent" => ClassRef::ParentRef,
            _ => ClassRef::Name(class.to_string()),
        };
        let constant = constant.trim();
        if is_name_like(constant) {
            ExprKind::ClassConstFetch {
                class: class_ref,
                constant: constant.to_string(),
            }
        } else {
            ExprKind::Opaque(Vec::new())
        }
    } else if is_name_like(t) {
        ExprKind::ConstFetch(t.to_string())
    } else {
        ExprKind::Opaque(Vec::new())
    };
    Expr::new(kind, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_variables() {
        assert_eq!(scan_variables("foo($a, $b->c, $a)"), vec!["$a", "$b"]);
        assert!(scan_variables("$ 1").is_empty());
    }

    #[test]
    fn test_scan_interpolated_skips_escapes() {
        assert_eq!(scan_interpolated(r#""\$x and $y""#), vec!["$y"]);
        assert!(scan_interpolated("<<<'EOT'\n$x\nEOT").is_empty());
    }

    #[test]
    fn test_unset_targets() {
        assert_eq!(unset_targets("unset($a, $b['k'], $c)"), vec!["$a", "$c"]);
    }

    #[test]
    fn test_literal_from_text() {
        let span = Span::default();
        assert!(matches!(literal_from_text(" 12 ", span).kind, ExprKind::Int));
        assert!(matches!(literal_from_text("-1.5", span).kind, ExprKind::Float));
        assert!(matches!(literal_from_text("0x1F", span).kind, ExprKind::Int));
        assert!(matches!(literal_from_text("[]", span).kind, ExprKind::Array(ref items) if items.is_empty()));
        assert!(matches!(literal_from_text("NULL", span).kind, ExprKind::Null));
        assert!(matches!(
            literal_from_text("self::FOO", span).kind,
            ExprKind::ClassConstFetch { class: ClassRef::SelfRef, .. }
        ));
        assert!(matches!(literal_from_text("'abc'", span).kind, ExprKind::Str(Some(ref s)) if s == "abc"));
    }

    #[test]
    fn test_name_like() {
        assert!(is_name_like("\\Foo\\BAR"));
        assert!(!is_name_like("$a"));
        assert!(!is_name_like("foo()"));
    }
}
