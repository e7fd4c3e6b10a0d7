// Foxscream Programming Language
// A tree-walking interpreter with multiple inheritance and distance-scored overloads

pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod resolve;
pub mod runtime;

pub use config::RuntimeConfig;
pub use error::{ErrorKind, FoxError, FoxResult};
pub use runtime::{run, Runtime, Value};
