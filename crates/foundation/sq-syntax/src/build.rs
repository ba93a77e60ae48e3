//! Shorthand constructors for building trees in-process
//!
//! All nodes built here carry a default span; use [`Stmt::at`] /
//! [`Expr::at`] to attach a real one.

use crate::{
    BinOp, CatchClause, ClassDef, Expr, ExprKind, FunctionDef, IfBranch, Param, Stmt, StmtKind,
};
use sq_span::Span;

impl Expr {
    /// Wrap a kind with a default span
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    /// Replace the span
    #[must_use]
    pub fn at(self, span: Span) -> Self {
        Self { span, ..self }
    }

    /// Identifier
    pub fn id(name: &str) -> Self {
        Self::new(ExprKind::Id(name.to_owned()))
    }

    /// Integer literal
    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Int(value))
    }

    /// Float literal
    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Float(value))
    }

    /// Boolean literal
    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    /// String literal
    pub fn str(value: &str) -> Self {
        Self::new(ExprKind::Str(value.to_owned()))
    }

    /// `expr.member`
    pub fn dot(expr: Self, member: &str) -> Self {
        Self::new(ExprKind::Dot {
            expr: Box::new(expr),
            member: member.to_owned(),
        })
    }

    /// `expr[index]`
    pub fn index(expr: Self, index: Self) -> Self {
        Self::new(ExprKind::Index {
            expr: Box::new(expr),
            index: Box::new(index),
        })
    }

    /// `(items...)`
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::new(ExprKind::Tuple(items))
    }

    /// `callee(args...)`
    pub fn call(callee: Self, args: Vec<Self>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
        })
    }

    /// `lhs op rhs`
    pub fn binary(op: BinOp, lhs: Self, rhs: Self) -> Self {
        Self::new(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }
}

impl Stmt {
    /// Wrap a kind with a default span
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::default(),
        }
    }

    /// Replace the span
    #[must_use]
    pub fn at(self, span: Span) -> Self {
        Self { span, ..self }
    }

    /// Statement sequence
    pub fn suite(stmts: Vec<Self>) -> Self {
        Self::new(StmtKind::Suite(stmts))
    }

    /// `pass`
    pub fn pass() -> Self {
        Self::new(StmtKind::Pass)
    }

    /// Expression statement
    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    /// `lhs = rhs`
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Self::new(StmtKind::Assign { lhs, rhs, ty: None })
    }

    /// `lhs: ty = rhs`
    pub fn assign_typed(lhs: Expr, ty: Expr, rhs: Expr) -> Self {
        Self::new(StmtKind::Assign {
            lhs,
            rhs,
            ty: Some(ty),
        })
    }

    /// `print expr`
    pub fn print(expr: Expr) -> Self {
        Self::new(StmtKind::Print(expr))
    }

    /// `return [expr]`
    pub fn ret(expr: Option<Expr>) -> Self {
        Self::new(StmtKind::Return(expr))
    }

    /// `yield [expr]`
    pub fn yield_(expr: Option<Expr>) -> Self {
        Self::new(StmtKind::Yield(expr))
    }

    /// `global name`
    pub fn global(name: &str) -> Self {
        Self::new(StmtKind::Global(name.to_owned()))
    }

    /// `while cond: body`
    pub fn while_(cond: Expr, body: Self) -> Self {
        Self::new(StmtKind::While {
            cond,
            suite: Box::new(body),
        })
    }

    /// `for var in iter: body`
    pub fn for_(var: Expr, iter: Expr, body: Self) -> Self {
        Self::new(StmtKind::For {
            var,
            iter,
            suite: Box::new(body),
        })
    }

    /// `if`/`elif`/`else` chain from `(condition, body)` pairs
    pub fn if_(branches: Vec<(Option<Expr>, Self)>) -> Self {
        Self::new(StmtKind::If(
            branches
                .into_iter()
                .map(|(cond, suite)| IfBranch { cond, suite })
                .collect(),
        ))
    }

    /// `try`/`except`/`finally`
    pub fn try_(body: Self, catches: Vec<CatchClause>, finally: Option<Self>) -> Self {
        Self::new(StmtKind::Try {
            suite: Box::new(body),
            catches,
            finally: finally.map(Box::new),
        })
    }

    /// Function declaration
    pub fn function(def: FunctionDef) -> Self {
        Self::new(StmtKind::Function(def))
    }

    /// Class or value-type declaration
    pub fn class(def: ClassDef) -> Self {
        Self::new(StmtKind::Class(def))
    }

    /// `extend what: body`
    pub fn extend(what: Expr, body: Self) -> Self {
        Self::new(StmtKind::Extend {
            what,
            suite: Box::new(body),
        })
    }
}

impl Param {
    /// Untyped parameter without default
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ty: None,
            default: None,
        }
    }

    /// Parameter with a declared type
    pub fn typed(name: &str, ty: Expr) -> Self {
        Self {
            ty: Some(ty),
            ..Self::named(name)
        }
    }

    /// Attach a default value
    #[must_use]
    pub fn with_default(self, default: Expr) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }
}

impl FunctionDef {
    /// Function with the given parameters and body, no generics or attributes
    pub fn new(name: &str, params: Vec<Param>, body: Stmt) -> Self {
        Self {
            name: name.to_owned(),
            ret: None,
            generics: Vec::new(),
            params,
            suite: Box::new(body),
            attributes: Vec::new(),
        }
    }
}

impl ClassDef {
    /// Reference class with the given fields and an empty body
    pub fn class(name: &str, members: Vec<Param>) -> Self {
        Self {
            name: name.to_owned(),
            generics: Vec::new(),
            members,
            suite: Box::new(Stmt::suite(Vec::new())),
            is_type: false,
        }
    }

    /// Value-aggregate type with the given fields and an empty body
    pub fn value_type(name: &str, members: Vec<Param>) -> Self {
        Self {
            is_type: true,
            ..Self::class(name, members)
        }
    }
}

impl CatchClause {
    /// `except [exc] as var: body`
    pub fn new(var: &str, exc: Option<Expr>, body: Stmt) -> Self {
        Self {
            var: var.to_owned(),
            exc,
            suite: body,
        }
    }
}
