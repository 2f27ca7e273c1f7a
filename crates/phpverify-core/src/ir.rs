//! Owned intermediate representation of a parsed PHP file
//!
//! The mago AST borrows from a bump arena that dies with the parse call.
//! The analyzer keeps functions and classes around across both passes, so
//! everything it walks is lowered into these owned nodes first.
//!
//! Names are kept exactly as written in the source (`Foo`, `\Foo\Bar`,
//! `namespace\baz`). Resolution against namespaces and `use` imports happens
//! in the analyzer.

/// Byte range inside the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a new span
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Declarations are hoisted by PHP and never count as unreachable
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Function(_) | StmtKind::Class(_) | StmtKind::Namespace { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    Echo(Vec<Expr>),
    Return(Option<Expr>),
    Break,
    Continue,
    Block(Vec<Stmt>),
    If(IfStmt),
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Expr>,
        cond: Vec<Expr>,
        step: Vec<Expr>,
        body: Vec<Stmt>,
    },
    Foreach(ForeachStmt),
    Switch(SwitchStmt),
    Try(TryStmt),
    /// `global $a, $b;` with the names including `$`
    Global(Vec<String>),
    Static(Vec<StaticVar>),
    /// Variables passed directly to `unset()`
    Unset(Vec<String>),
    Namespace {
        name: Option<String>,
        body: Vec<Stmt>,
    },
    Use(Vec<UseItem>),
    Function(FunctionDecl),
    Class(ClassDecl),
    Const(Vec<ConstItem>),
    Nop,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub cond: Expr,
    pub then: Vec<Stmt>,
    pub then_span: Span,
    pub else_ifs: Vec<ElseIf>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct ElseIf {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForeachStmt {
    pub expr: Expr,
    pub key: Option<Expr>,
    pub value: Expr,
    pub by_ref: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct SwitchStmt {
    pub subject: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub cond: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
    /// A `fallthrough` comment sits between this case and the previous one
    pub fallthrough_comment: bool,
}

#[derive(Debug, Clone)]
pub struct TryStmt {
    pub body: Vec<Stmt>,
    pub catches: Vec<CatchClause>,
    pub finally: Option<FinallyClause>,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub types: Vec<String>,
    pub var: Option<String>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FinallyClause {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StaticVar {
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Class,
    Function,
    Const,
}

#[derive(Debug, Clone)]
pub struct UseItem {
    pub kind: UseKind,
    /// Fully spelled imported name without a leading `\`
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConstItem {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    /// Includes the leading `$`
    pub name: String,
    pub span: Span,
    pub hint: Option<String>,
    pub default: Option<Expr>,
    pub by_ref: bool,
    pub variadic: bool,
    /// Constructor property promotion
    pub promoted: Option<Visibility>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub params: Vec<Param>,
    pub return_hint: Option<String>,
    pub by_ref: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
    Enum,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub kind: ClassKind,
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub extends: Vec<String>,
    pub implements: Vec<String>,
    pub is_abstract: bool,
    pub is_final: bool,
    /// Backing type hint of an enum (`enum Suit: string`)
    pub backed: Option<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone)]
pub enum Member {
    Method(MethodDecl),
    Property(PropertyDecl),
    Constant(ClassConstDecl),
    EnumCase { name: String, value: Option<Expr>, span: Span },
    TraitUse(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub name_span: Span,
    pub span: Span,
    pub params: Vec<Param>,
    pub return_hint: Option<String>,
    /// `None` for abstract and interface methods
    pub body: Option<Vec<Stmt>>,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub items: Vec<PropertyItem>,
    pub hint: Option<String>,
    pub is_static: bool,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct PropertyItem {
    /// Includes the leading `$`
    pub name: String,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassConstDecl {
    pub items: Vec<ConstItem>,
    pub visibility: Visibility,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Strip any number of wrapping parentheses
    pub fn unparen(&self) -> &Expr {
        match &self.kind {
            ExprKind::Paren(inner) => inner.unparen(),
            _ => self,
        }
    }

    /// Name of a plain `$var` expression
    pub fn var_name(&self) -> Option<&str> {
        match &self.unparen().kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// Includes the leading `$`
    Var(String),
    /// `$$x` and `${...}`; carries the variables read to build the name
    DynamicVar(Vec<String>),
    Int,
    Float,
    /// Literal string; `None` when the value is not known statically
    Str(Option<String>),
    /// Double-quoted string or heredoc with interpolated variables
    Interpolated(Vec<String>),
    Bool(bool),
    Null,
    /// `__LINE__`, `__CLASS__`, ...
    MagicConst(String),
    Paren(Box<Expr>),
    Array(Vec<ArrayItem>),
    List(Vec<Option<ArrayItem>>),
    ArrayDim {
        base: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        op: AssignOp,
        by_ref: bool,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    InstanceOf {
        expr: Box<Expr>,
        class: ClassRef,
    },
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
    Call {
        callee: Callee,
        args: Vec<Arg>,
    },
    MethodCall {
        object: Box<Expr>,
        method: Option<String>,
        args: Vec<Arg>,
        nullsafe: bool,
    },
    StaticCall {
        class: ClassRef,
        method: Option<String>,
        args: Vec<Arg>,
    },
    PropertyFetch {
        object: Box<Expr>,
        property: Option<String>,
        nullsafe: bool,
    },
    /// Property name includes the leading `$`
    StaticPropertyFetch {
        class: ClassRef,
        property: Option<String>,
    },
    ClassConstFetch {
        class: ClassRef,
        constant: String,
    },
    ConstFetch(String),
    New {
        class: ClassRef,
        args: Vec<Arg>,
    },
    Isset(Vec<Expr>),
    Empty(Box<Expr>),
    /// `exit`/`die` with the variables read by the argument
    Exit {
        die: bool,
        reads: Vec<String>,
    },
    Include(Box<Expr>),
    /// `print` with the variables read by its argument
    Print(Vec<String>),
    Closure(Box<ClosureDecl>),
    ArrowFunction(Box<ArrowFunctionDecl>),
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Throw(Box<Expr>),
    Clone(Box<Expr>),
    Yield {
        key: Option<Box<Expr>>,
        value: Option<Box<Expr>>,
    },
    YieldFrom(Box<Expr>),
    /// Anything the analyzer does not model; carries the variables it reads
    Opaque(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct ArrayItem {
    pub key: Option<Expr>,
    pub value: Expr,
    pub by_ref: bool,
    pub unpack: bool,
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub value: Expr,
    pub unpack: bool,
    pub named: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Callee {
    Name(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum ClassRef {
    Name(String),
    SelfRef,
    StaticRef,
    ParentRef,
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct MatchArm {
    /// Empty for the `default` arm
    pub conditions: Vec<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone)]
pub struct ClosureUse {
    pub name: String,
    pub by_ref: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClosureDecl {
    pub params: Vec<Param>,
    pub uses: Vec<ClosureUse>,
    pub return_hint: Option<String>,
    pub is_static: bool,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct ArrowFunctionDecl {
    pub params: Vec<Param>,
    pub return_hint: Option<String>,
    pub is_static: bool,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Concat,
    Coalesce,
    /// `+=`, `-=`, `*=`, `/=`, `%=`, `**=`
    Arithmetic,
    /// `&=`, `|=`, `^=`, `<<=`, `>>=`
    Bitwise,
}

impl AssignOp {
    pub fn from_text(op: &str) -> Self {
        match op {
            "=" => AssignOp::Assign,
            ".=" => AssignOp::Concat,
            "??=" => AssignOp::Coalesce,
            "+=" | "-=" | "*=" | "/=" | "%=" | "**=" => AssignOp::Arithmetic,
            _ => AssignOp::Bitwise,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    /// `&&` and `and`
    And,
    /// `||`
    Or,
    /// Low precedence `or`
    LowOr,
    Xor,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Spaceship,
    Coalesce,
    Other,
}

impl BinaryOp {
    pub fn from_text(op: &str) -> Self {
        match op.to_ascii_lowercase().as_str() {
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "**" => BinaryOp::Pow,
            "." => BinaryOp::Concat,
            "&" => BinaryOp::BitAnd,
            "|" => BinaryOp::BitOr,
            "^" => BinaryOp::BitXor,
            "<<" => BinaryOp::ShiftLeft,
            ">>" => BinaryOp::ShiftRight,
            "&&" | "and" => BinaryOp::And,
            "||" => BinaryOp::Or,
            "or" => BinaryOp::LowOr,
            "xor" => BinaryOp::Xor,
            "==" => BinaryOp::Equal,
            "!=" | "<>" => BinaryOp::NotEqual,
            "===" => BinaryOp::Identical,
            "!==" => BinaryOp::NotIdentical,
            "<" => BinaryOp::Less,
            "<=" => BinaryOp::LessEqual,
            ">" => BinaryOp::Greater,
            ">=" => BinaryOp::GreaterEqual,
            "<=>" => BinaryOp::Spaceship,
            "??" => BinaryOp::Coalesce,
            _ => BinaryOp::Other,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Identical
                | BinaryOp::NotIdentical
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::Xor
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    BitNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    Silence,
    Reference,
    /// `(int)`, `(string)`, ... with the normalized target type
    Cast(String),
    Other,
}

impl UnaryOp {
    /// Classify a prefix operator by its source text
    pub fn prefix_from_text(op: &str) -> Self {
        let op = op.trim();
        match op {
            "!" => UnaryOp::Not,
            "-" => UnaryOp::Negate,
            "+" => UnaryOp::Plus,
            "~" => UnaryOp::BitNot,
            "++" => UnaryOp::PreIncrement,
            "--" => UnaryOp::PreDecrement,
            "@" => UnaryOp::Silence,
            "&" => UnaryOp::Reference,
            _ if op.starts_with('(') && op.ends_with(')') => {
                let inner: String = op[1..op.len() - 1]
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                let target = match inner.as_str() {
                    "int" | "integer" => "int",
                    "bool" | "boolean" => "bool",
                    "float" | "double" | "real" => "float",
                    "string" | "binary" => "string",
                    "array" => "array",
                    "object" => "object",
                    "unset" => "null",
                    _ => return UnaryOp::Other,
                };
                UnaryOp::Cast(target.to_string())
            }
            _ => UnaryOp::Other,
        }
    }

    pub fn postfix_from_text(op: &str) -> Self {
        match op.trim() {
            "++" => UnaryOp::PostIncrement,
            "--" => UnaryOp::PostDecrement,
            _ => UnaryOp::Other,
        }
    }
}

/// A fully lowered file, ready for both analysis passes
#[derive(Debug, Clone, Default)]
pub struct File {
    pub statements: Vec<Stmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_from_text() {
        assert_eq!(BinaryOp::from_text("&&"), BinaryOp::And);
        assert_eq!(BinaryOp::from_text("AND"), BinaryOp::And);
        assert_eq!(BinaryOp::from_text("or"), BinaryOp::LowOr);
        assert_eq!(BinaryOp::from_text("<>"), BinaryOp::NotEqual);
        assert_eq!(BinaryOp::from_text("instanceof"), BinaryOp::Other);
    }

    #[test]
    fn test_cast_operators() {
        assert_eq!(UnaryOp::prefix_from_text("(int)"), UnaryOp::Cast("int".into()));
        assert_eq!(UnaryOp::prefix_from_text("( double )"), UnaryOp::Cast("float".into()));
        assert_eq!(UnaryOp::prefix_from_text("!"), UnaryOp::Not);
    }

    #[test]
    fn test_unparen() {
        let inner = Expr::new(ExprKind::Var("$a".into()), Span::new(1, 3));
        let wrapped = Expr::new(ExprKind::Paren(Box::new(inner)), Span::new(0, 4));
        assert_eq!(wrapped.var_name(), Some("$a"));
    }
}
