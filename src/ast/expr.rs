// Foxscream Expression AST Nodes

use std::rc::Rc;

use super::stmt::{ClassDef, FunctionDef, Stmt};
use crate::error::Span;
use crate::lexer::TokenKind;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    // Comparison
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    // Logical (short-circuit)
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    LeftShift,
    RightShift,
    // Membership and relations
    In,
    NotIn,
    Has,
    NotHas,
    Of,
    NotOf,
    Is,
    IsNot,
}

impl BinaryOp {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::SlashSlash => Some(BinaryOp::FloorDiv),
            TokenKind::Percent => Some(BinaryOp::Mod),
            TokenKind::StarStar => Some(BinaryOp::Pow),
            TokenKind::EqualEqual => Some(BinaryOp::Equal),
            TokenKind::BangEqual => Some(BinaryOp::NotEqual),
            TokenKind::Less => Some(BinaryOp::Less),
            TokenKind::LessEqual => Some(BinaryOp::LessEqual),
            TokenKind::Greater => Some(BinaryOp::Greater),
            TokenKind::GreaterEqual => Some(BinaryOp::GreaterEqual),
            TokenKind::And | TokenKind::AndKw => Some(BinaryOp::And),
            TokenKind::Or | TokenKind::OrKw => Some(BinaryOp::Or),
            TokenKind::Ampersand => Some(BinaryOp::BitAnd),
            TokenKind::Pipe => Some(BinaryOp::BitOr),
            TokenKind::Caret => Some(BinaryOp::BitXor),
            TokenKind::LessLess => Some(BinaryOp::LeftShift),
            TokenKind::GreaterGreater => Some(BinaryOp::RightShift),
            TokenKind::In => Some(BinaryOp::In),
            TokenKind::Has => Some(BinaryOp::Has),
            TokenKind::Of => Some(BinaryOp::Of),
            TokenKind::Is => Some(BinaryOp::Is),
            _ => None,
        }
    }

    /// The negated form for `not in`, `not has`, `not of` and `is not`
    pub fn negated(self) -> Option<Self> {
        match self {
            BinaryOp::In => Some(BinaryOp::NotIn),
            BinaryOp::Has => Some(BinaryOp::NotHas),
            BinaryOp::Of => Some(BinaryOp::NotOf),
            BinaryOp::Is => Some(BinaryOp::IsNot),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::LeftShift => "<<",
            BinaryOp::RightShift => ">>",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Has => "has",
            BinaryOp::NotHas => "not has",
            BinaryOp::Of => "of",
            BinaryOp::NotOf => "not of",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "is not",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate, // -
    Plus,   // +
    Not,    // not, !
    BitNot, // ~
}

impl UnaryOp {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang | TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "not",
            UnaryOp::BitNot => "~",
        }
    }
}

/// Assignment operators (for compound assignment)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,         // =
    AddAssign,      // +=
    SubAssign,      // -=
    MulAssign,      // *=
    DivAssign,      // /=
    FloorDivAssign, // //=
    ModAssign,      // %=
}

impl AssignOp {
    pub fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Equal => Some(AssignOp::Assign),
            TokenKind::PlusEqual => Some(AssignOp::AddAssign),
            TokenKind::MinusEqual => Some(AssignOp::SubAssign),
            TokenKind::StarEqual => Some(AssignOp::MulAssign),
            TokenKind::SlashEqual => Some(AssignOp::DivAssign),
            TokenKind::SlashSlashEqual => Some(AssignOp::FloorDivAssign),
            TokenKind::PercentEqual => Some(AssignOp::ModAssign),
            _ => None,
        }
    }

    /// Binary operator applied by a compound assignment
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
            AssignOp::FloorDivAssign => Some(BinaryOp::FloorDiv),
            AssignOp::ModAssign => Some(BinaryOp::Mod),
        }
    }
}

/// Literal values. `true`, `false` and `null` are prelude names, not literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

/// Function call argument (positional or keyword)
#[derive(Debug, Clone)]
pub struct CallArg {
    /// Parameter name for keyword arguments like `f(size=3)`
    pub name: Option<String>,
    pub value: Expr,
    pub span: Span,
}

/// Type expressions used in parameter, return and assignment annotations
#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// A class name: `int`, `Shape`
    Named { name: String, span: Span },
    /// `A | B` - any alternative may match
    Variants { members: Vec<TypeExpr>, span: Span },
    /// `A & B` - every member must match
    Union { members: Vec<TypeExpr>, span: Span },
    /// `A - B` - `B` never matches
    Exclude {
        base: Box<TypeExpr>,
        excluded: Vec<TypeExpr>,
        span: Span,
    },
    /// `{x: int, y: int}` - structural
    Fields {
        fields: Vec<(String, TypeExpr)>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. }
            | TypeExpr::Variants { span, .. }
            | TypeExpr::Union { span, .. }
            | TypeExpr::Exclude { span, .. }
            | TypeExpr::Fields { span, .. } => *span,
        }
    }
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let join = |members: &[TypeExpr], sep: &str| {
            members
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(sep)
        };
        match self {
            TypeExpr::Named { name, .. } => write!(f, "{}", name),
            TypeExpr::Variants { members, .. } => write!(f, "({})", join(members, " | ")),
            TypeExpr::Union { members, .. } => write!(f, "({})", join(members, " & ")),
            TypeExpr::Exclude { base, excluded, .. } => {
                write!(f, "({} - {})", base, join(excluded, " - "))
            }
            TypeExpr::Fields { fields, .. } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// A `case` arm of a match expression
#[derive(Debug, Clone)]
pub struct MatchArm {
    pub patterns: Vec<Expr>,
    pub body: Expr,
    pub span: Span,
}

/// Expression nodes. Control flow is expression-valued.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Literal value: 42, 2.5, "hello"
    Literal { value: Literal, span: Span },

    /// Name reference: x, print
    Identifier { name: String, span: Span },

    /// Binary operation: a + b, x of Shape
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        span: Span,
    },

    /// Unary operation: -x, not done
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },

    /// Assignment: x = 5, y += 1, n: int = f()
    Assignment {
        target: Box<Expr>,
        op: AssignOp,
        type_hint: Option<TypeExpr>,
        value: Box<Expr>,
        span: Span,
    },

    /// Function call: foo(a, b) or foo(a, size=3)
    Call {
        callee: Box<Expr>,
        args: Vec<CallArg>,
        span: Span,
    },

    /// Field access: obj.field
    Field {
        object: Box<Expr>,
        name: String,
        span: Span,
    },

    /// Index access: arr[0], dict["key"]
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },

    /// Slice: arr[start:end:step], every part optional
    Slice {
        object: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        span: Span,
    },

    /// Array literal: [1, 2, 3]
    Array { elements: Vec<Expr>, span: Span },

    /// Dictionary literal: ["a": 1, "b": 2] or [:]
    Dictionary {
        entries: Vec<(Expr, Expr)>,
        span: Span,
    },

    /// Block: { statements }, evaluates to its last statement
    Block { statements: Vec<Stmt>, span: Span },

    /// if / elif / else. `elif` chains nest in `else_branch`.
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        span: Span,
    },

    /// while cond { } else { }
    While {
        condition: Box<Expr>,
        body: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        span: Span,
    },

    /// do { } while cond
    DoWhile {
        body: Box<Expr>,
        condition: Box<Expr>,
        span: Span,
    },

    /// for x in iterable { } else { }
    For {
        variable: String,
        iterable: Box<Expr>,
        body: Box<Expr>,
        else_branch: Option<Box<Expr>>,
        span: Span,
    },

    /// match value { case a, b { } else { } }
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
        default: Option<Box<Expr>>,
        span: Span,
    },

    /// Function declaration or anonymous function
    Function { def: Rc<FunctionDef> },

    /// Class, static class or trait declaration
    Class { def: Rc<ClassDef> },

    /// return, return value
    Return {
        value: Option<Box<Expr>>,
        span: Span,
    },

    /// break, break label
    Break { label: Option<String>, span: Span },

    /// continue, continue label
    Continue { label: Option<String>, span: Span },

    /// leave, leave label
    Leave { label: Option<String>, span: Span },

    /// label name: expr
    Labeled {
        label: String,
        body: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. } => *span,
            Expr::Identifier { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Assignment { span, .. } => *span,
            Expr::Call { span, .. } => *span,
            Expr::Field { span, .. } => *span,
            Expr::Index { span, .. } => *span,
            Expr::Slice { span, .. } => *span,
            Expr::Array { span, .. } => *span,
            Expr::Dictionary { span, .. } => *span,
            Expr::Block { span, .. } => *span,
            Expr::If { span, .. } => *span,
            Expr::While { span, .. } => *span,
            Expr::DoWhile { span, .. } => *span,
            Expr::For { span, .. } => *span,
            Expr::Match { span, .. } => *span,
            Expr::Function { def } => def.span,
            Expr::Class { def } => def.span,
            Expr::Return { span, .. } => *span,
            Expr::Break { span, .. } => *span,
            Expr::Continue { span, .. } => *span,
            Expr::Leave { span, .. } => *span,
            Expr::Labeled { span, .. } => *span,
        }
    }

    /// Check if this expression is a valid assignment target
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self,
            Expr::Identifier { .. } | Expr::Field { .. } | Expr::Index { .. }
        )
    }
}
