// Foxscream Statement AST Nodes

use std::rc::Rc;

use super::expr::{Expr, TypeExpr};
use crate::error::Span;

/// How a parameter binds arguments
#[derive(Debug, Clone)]
pub enum ParamKind {
    /// `x` - bound by position (or by name)
    Positional,
    /// `x = default` - optional, bound by name or position
    Keyword(Expr),
    /// `*rest` - collects overflow positional arguments
    VarPositional,
    /// `**opts` - collects overflow keyword arguments
    VarKeyword,
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct FunctionParam {
    pub name: String,
    pub kind: ParamKind,
    pub type_hint: Option<TypeExpr>,
    pub span: Span,
}

/// Function definition (named declaration or anonymous)
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<FunctionParam>,
    pub return_type: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Class flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Instantiable class
    Class,
    /// Namespace-like class that cannot be instantiated
    Static,
    /// Mixin that can only be listed after `has`
    Trait,
}

impl std::fmt::Display for ClassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassKind::Class => write!(f, "class"),
            ClassKind::Static => write!(f, "static class"),
            ClassKind::Trait => write!(f, "trait"),
        }
    }
}

/// Class definition: `class Name of A, B has T { body }`
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: Option<String>,
    pub kind: ClassKind,
    pub parents: Vec<Expr>,
    pub traits: Vec<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

/// Statement nodes
#[derive(Debug, Clone)]
pub enum Stmt {
    /// Expression statement: foo(), x = 1, if c { }
    Expression { expr: Expr, span: Span },

    /// defer expr. Shared so every registration is a cheap handle.
    Defer { expr: Rc<Expr>, span: Span },

    /// Class-level member inside a class body: static x = 1, static fn make() { }
    Static { expr: Expr, span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expression { span, .. } => *span,
            Stmt::Defer { span, .. } => *span,
            Stmt::Static { span, .. } => *span,
        }
    }
}

/// Program is a list of statements
#[derive(Debug, Clone)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn new(statements: Vec<Stmt>) -> Self {
        Self { statements }
    }
}
