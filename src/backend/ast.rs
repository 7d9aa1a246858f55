//! Syntax tree for the bundled script language

use std::fmt;
use std::sync::Arc;
use crate::unit::ScriptMode;

/// A 1-based source position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        };
        f.write_str(s)
    }
}

/// Call target: `f(x)` or `ns.f(x)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Name(String),
    Qualified(String, String),
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Name(name) => f.write_str(name),
            Callee::Qualified(ns, name) => write!(f, "{}.{}", ns, name),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Literal, Pos),
    Ident(String, Pos),
    List(Vec<Expr>, Pos),
    Record(Vec<(String, Expr)>, Pos),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    Call {
        callee: Callee,
        args: Vec<Expr>,
        pos: Pos,
    },
    Field {
        target: Box<Expr>,
        name: String,
        pos: Pos,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Literal(_, pos)
            | Expr::Ident(_, pos)
            | Expr::List(_, pos)
            | Expr::Record(_, pos) => *pos,
            Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Field { pos, .. }
            | Expr::Index { pos, .. } => *pos,
        }
    }
}

/// A top-level function declaration
#[derive(Debug)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        name: String,
        init: Expr,
        pos: Pos,
    },
    Assign {
        name: String,
        value: Expr,
        pos: Pos,
    },
    Fn(Arc<FnDecl>),
    Using {
        namespace: String,
        pos: Pos,
    },
    Return(Option<Expr>, Pos),
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    Throw(Expr, Pos),
    /// `terminated` is false only for a trailing bare expression in eval/repl mode
    Expr {
        expr: Expr,
        terminated: bool,
    },
}

/// A parsed unit
#[derive(Debug, Clone)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    pub mode: ScriptMode,
}

impl Program {
    /// Top-level function declarations, in source order.
    pub fn functions(&self) -> impl Iterator<Item = &Arc<FnDecl>> {
        self.stmts.iter().filter_map(|s| match s {
            Stmt::Fn(decl) => Some(decl),
            _ => None,
        })
    }
}
