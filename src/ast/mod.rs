// Foxscream AST Module
// Closed sum types for the syntax tree handed to the evaluator

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;
