//! Parsed statement tree handed to the lowering stage
//!
//! The parser lives outside this workspace. It produces the closed node
//! sets defined here, either in-process or serialized as JSON. Every node
//! carries the [`Span`] it was parsed from so that lowering errors can
//! point back at the source.

mod build;

use serde::{Deserialize, Serialize};
use sq_span::Span;
use std::fmt;

/// Statement node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// What the statement is
    pub kind: StmtKind,
    /// Source location
    #[serde(default)]
    pub span: Span,
}

/// Closed set of statement forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Sequence of statements sharing the enclosing scope
    Suite(Vec<Stmt>),
    /// `pass`
    Pass,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// Expression evaluated for its effects
    Expr(Expr),
    /// `lhs[: ty] = rhs`
    Assign {
        /// Assignment target
        lhs: Expr,
        /// Assigned value
        rhs: Expr,
        /// Optional declared type
        ty: Option<Expr>,
    },
    /// `del expr`
    Del(Expr),
    /// `print expr`
    Print(Expr),
    /// `return [expr]`
    Return(Option<Expr>),
    /// `yield [expr]`
    Yield(Option<Expr>),
    /// `assert expr`
    Assert(Expr),
    /// `type name = expr`
    TypeAlias {
        /// Alias name
        name: String,
        /// Aliased type expression
        expr: Expr,
    },
    /// `while cond: suite`
    While {
        /// Loop condition
        cond: Expr,
        /// Loop body
        suite: Box<Stmt>,
    },
    /// `for var in iter: suite`
    For {
        /// Loop variable target
        var: Expr,
        /// Iterated expression
        iter: Expr,
        /// Loop body
        suite: Box<Stmt>,
    },
    /// `if`/`elif`/`else` chain
    If(Vec<IfBranch>),
    /// `match what: case ...`
    Match {
        /// Scrutinee
        what: Expr,
        /// Cases in source order
        cases: Vec<MatchCase>,
    },
    /// `from module import names`
    Import {
        /// Module path
        from: String,
        /// Imported names with optional aliases
        names: Vec<ImportName>,
    },
    /// `cimport`/`pyimport` of a foreign symbol
    ExternImport {
        /// Foreign language tag
        lang: String,
        /// Imported symbol
        name: String,
        /// Declared return type
        ret: Option<Expr>,
        /// Declared argument types
        args: Vec<Expr>,
    },
    /// `try`/`except`/`finally`
    Try {
        /// Protected suite
        suite: Box<Stmt>,
        /// Catch clauses in source order
        catches: Vec<CatchClause>,
        /// Optional finally suite
        finally: Option<Box<Stmt>>,
    },
    /// `global name`
    Global(String),
    /// `raise expr`
    Throw(Expr),
    /// `prefetch collection[index]`
    Prefetch(Expr),
    /// `def ...`
    Function(FunctionDef),
    /// `class ...` / `type ...`
    Class(ClassDef),
    /// `extend what: suite`
    Extend {
        /// Extended type, optionally with generic names (`List[T]`)
        what: Expr,
        /// Method declarations
        suite: Box<Stmt>,
    },
}

impl StmtKind {
    /// Short human-readable name of the statement form
    pub fn name(&self) -> &'static str {
        match self {
            Self::Suite(_) => "suite",
            Self::Pass => "pass",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Expr(_) => "expression",
            Self::Assign { .. } => "assignment",
            Self::Del(_) => "del",
            Self::Print(_) => "print",
            Self::Return(_) => "return",
            Self::Yield(_) => "yield",
            Self::Assert(_) => "assert",
            Self::TypeAlias { .. } => "type alias",
            Self::While { .. } => "while",
            Self::For { .. } => "for",
            Self::If(_) => "if",
            Self::Match { .. } => "match",
            Self::Import { .. } => "import",
            Self::ExternImport { .. } => "extern import",
            Self::Try { .. } => "try",
            Self::Global(_) => "global",
            Self::Throw(_) => "raise",
            Self::Prefetch(_) => "prefetch",
            Self::Function(_) => "function",
            Self::Class(_) => "class",
            Self::Extend { .. } => "extend",
        }
    }
}

/// One arm of an `if` chain; `cond == None` is the terminal `else`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfBranch {
    /// Branch condition
    pub cond: Option<Expr>,
    /// Branch body
    pub suite: Stmt,
}

/// One `case` of a match statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCase {
    /// Pattern expression
    pub pattern: Expr,
    /// Case body
    pub suite: Stmt,
}

/// One name in an import list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportName {
    /// Imported name
    pub name: String,
    /// Local alias
    pub alias: Option<String>,
}

/// One `except` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// Bound exception name
    pub var: String,
    /// Filter type; `None` catches everything
    pub exc: Option<Expr>,
    /// Handler body
    pub suite: Stmt,
}

/// Function or class member parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Declared type
    pub ty: Option<Expr>,
    /// Default value
    pub default: Option<Expr>,
}

/// `def name[generics](params) -> ret: suite`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Declared return type
    pub ret: Option<Expr>,
    /// Explicit generic names
    #[serde(default)]
    pub generics: Vec<String>,
    /// Parameters in declaration order
    pub params: Vec<Param>,
    /// Function body
    pub suite: Box<Stmt>,
    /// Attribute tags (`@inline`, `@atomic`, ...)
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// `class Name[generics]: members; suite` or `type Name(members)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Class name
    pub name: String,
    /// Explicit generic names
    #[serde(default)]
    pub generics: Vec<String>,
    /// Fields in declaration order
    pub members: Vec<Param>,
    /// Method declarations
    pub suite: Box<Stmt>,
    /// Value-aggregate (`type`) rather than reference class
    #[serde(default)]
    pub is_type: bool,
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// What the expression is
    pub kind: ExprKind,
    /// Source location
    #[serde(default)]
    pub span: Span,
}

/// Closed set of expression forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// Bare identifier
    Id(String),
    /// `(a, b, ...)`
    Tuple(Vec<Expr>),
    /// `expr.member`
    Dot {
        /// Receiver
        expr: Box<Expr>,
        /// Member name
        member: String,
    },
    /// `expr[index]`
    Index {
        /// Indexed expression
        expr: Box<Expr>,
        /// Index (a tuple for multiple indices)
        index: Box<Expr>,
    },
    /// `callee(args)`
    Call {
        /// Called expression
        callee: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
    },
    /// `lhs op rhs`
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
}

/// Binary operators that dispatch through operator tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

impl BinOp {
    /// Name of the operator-table entry implementing this operator
    pub fn magic(self) -> &'static str {
        match self {
            Self::Add => "__add__",
            Self::Sub => "__sub__",
            Self::Mul => "__mul__",
            Self::Lt => "__lt__",
            Self::Gt => "__gt__",
            Self::Eq => "__eq__",
            Self::Ne => "__ne__",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        formatter.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_names() {
        assert_eq!(Stmt::pass().kind.name(), "pass");
        assert_eq!(Stmt::global("x").kind.name(), "global");
    }

    #[test]
    fn test_tree_deserializes_from_json() {
        let json = r#"{
            "kind": {"Assign": {
                "lhs": {"kind": {"Id": "x"}},
                "rhs": {"kind": {"Int": 5}},
                "ty": null
            }},
            "span": {"start": 0, "end": 5, "line": 1, "col": 1}
        }"#;
        let stmt: Stmt = serde_json::from_str(json).unwrap();
        assert_eq!(stmt.span.line, 1);
        assert_eq!(stmt.kind, Stmt::assign(Expr::id("x"), Expr::int(5)).kind);
    }

    #[test]
    fn test_binop_magic_names() {
        assert_eq!(BinOp::Add.magic(), "__add__");
        assert_eq!(BinOp::Ne.to_string(), "!=");
    }
}
