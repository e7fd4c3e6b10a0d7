// Foxscream Error Handling Module
// Spanned errors with source context and call traces

use colored::*;
use std::fmt::{self, Write};

/// Represents a position in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

/// Represents a span in the source code (start to end position)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn from_positions(
        start_line: usize,
        start_col: usize,
        end_line: usize,
        end_col: usize,
    ) -> Self {
        Self {
            start: Position::new(start_line, start_col, 0),
            end: Position::new(end_line, end_col, 0),
        }
    }

    pub fn single(line: usize, column: usize, offset: usize) -> Self {
        let pos = Position::new(line, column, offset);
        Self {
            start: pos,
            end: pos,
        }
    }

    /// Smallest span covering both `self` and `other`
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

/// Types of errors in Foxscream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    UndeclaredName,
    UnknownField,
    NotCallable,
    ArityMismatch,
    AmbiguousOverload,
    AmbiguousField,
    LabelNotFound,
    TypeError,
    ValueError,
    IndexError,
    DivisionByZero,
    RuntimeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::UndeclaredName => "UndeclaredNameError",
            ErrorKind::UnknownField => "UnknownFieldError",
            ErrorKind::NotCallable => "NotCallableError",
            ErrorKind::ArityMismatch => "ArityMismatchError",
            ErrorKind::AmbiguousOverload => "AmbiguousOverloadError",
            ErrorKind::AmbiguousField => "AmbiguousFieldError",
            ErrorKind::LabelNotFound => "LabelNotFoundError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::IndexError => "IndexError",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::RuntimeError => "RuntimeError",
        };
        write!(f, "{}", name)
    }
}

/// A stack frame for error traces
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub function_name: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl StackFrame {
    pub fn new(
        function_name: impl Into<String>,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  at {} ({}:{}:{})",
            self.function_name, self.file, self.line, self.column
        )
    }
}

/// Main error type for Foxscream
#[derive(Debug, Clone)]
pub struct FoxError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Span,
    pub file: String,
    pub help: Option<String>,
    pub stack_trace: Vec<StackFrame>,
    source_lines: Vec<String>,
}

impl FoxError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        span: Span,
        file: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            file: file.into(),
            help: None,
            stack_trace: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        if self.source_lines.is_empty() {
            self.source_lines = source.lines().map(String::from).collect();
        }
        self
    }

    pub fn push_frame(&mut self, frame: StackFrame) {
        self.stack_trace.push(frame);
    }

    /// Render the error for a terminal: header, a three-line excerpt with
    /// the offending range underlined, then help and the call trace
    pub fn format(&self) -> String {
        let mut out = format!(
            "{}: {} at {}:{}:{}\n",
            self.kind.to_string().red().bold(),
            self.message.white().bold(),
            self.file,
            self.span.start.line,
            self.span.start.column
        );

        let excerpt = self.excerpt();
        if !excerpt.is_empty() {
            out.push('\n');
            out.push_str(&excerpt);
        }
        if let Some(help) = &self.help {
            let _ = write!(out, "\n      {}: {}\n", "Help".cyan().bold(), help);
        }
        if !self.stack_trace.is_empty() {
            let _ = writeln!(out, "\n{}:", "Stack trace".yellow().bold());
            for frame in &self.stack_trace {
                let _ = writeln!(out, "{}", frame);
            }
        }
        out
    }

    fn excerpt(&self) -> String {
        let mut out = String::new();
        let line = self.span.start.line;
        let first = line.saturating_sub(1).max(1);
        let last = (line + 1).min(self.source_lines.len());

        for number in first..=last {
            let Some(text) = self.source_lines.get(number - 1) else {
                continue;
            };
            let gutter = format!("{:>4} |", number);
            if number != line {
                let _ = writeln!(out, "{} {}", gutter.dimmed(), text);
                continue;
            }
            let _ = writeln!(out, "{} {}", gutter.red(), text);
            let _ = writeln!(
                out,
                "{}{}",
                " ".repeat(6 + self.span.start.column),
                "^".repeat(self.underline_width()).red().bold()
            );
        }
        out
    }

    /// Columns covered by the span on its first line
    fn underline_width(&self) -> usize {
        let Span { start, end } = self.span;
        if end.line == start.line && end.column > start.column {
            end.column - start.column + 1
        } else {
            1
        }
    }
}

impl fmt::Display for FoxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl std::error::Error for FoxError {}

/// Result type for Foxscream operations
pub type FoxResult<T> = Result<T, FoxError>;

// Convenience constructors for common errors
impl FoxError {
    pub fn syntax_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message, span, file)
    }

    pub fn undeclared_name(name: &str, span: Span, file: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UndeclaredName,
            format!("Undeclared name '{}'", name),
            span,
            file,
        )
    }

    pub fn unknown_field(
        owner: &str,
        field: &str,
        span: Span,
        file: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::UnknownField,
            format!("'{}' has no field '{}'", owner, field),
            span,
            file,
        )
    }

    pub fn type_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message, span, file)
    }

    pub fn value_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueError, message, span, file)
    }

    pub fn index_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::IndexError, message, span, file)
    }

    pub fn runtime_error(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::RuntimeError, message, span, file)
    }

    pub fn label_not_found(message: impl Into<String>, span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::LabelNotFound, message, span, file)
    }

    pub fn division_by_zero(span: Span, file: impl Into<String>) -> Self {
        Self::new(ErrorKind::DivisionByZero, "Division by zero", span, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_points_at_error_line() {
        colored::control::set_override(false);
        let err = FoxError::undeclared_name("y", Span::from_positions(2, 5, 2, 5), "<test>")
            .with_source("x = 1\nz = y\nw = 3")
            .with_help("Assign it first");
        let text = err.format();
        assert!(text.starts_with("UndeclaredNameError: Undeclared name 'y' at <test>:2:5"));
        assert!(text.contains("   2 | z = y"));
        assert!(text.contains("Help: Assign it first"));
    }

    #[test]
    fn test_stack_frames_are_listed_in_push_order() {
        colored::control::set_override(false);
        let mut err = FoxError::runtime_error("boom", Span::default(), "<test>");
        err.push_frame(StackFrame::new("inner", "<test>", 3, 1));
        err.push_frame(StackFrame::new("outer", "<test>", 7, 1));
        let text = err.format();
        let inner = text.find("at inner").unwrap();
        let outer = text.find("at outer").unwrap();
        assert!(inner < outer);
    }

    #[test]
    fn test_span_to_joins_ends() {
        let a = Span::from_positions(1, 1, 1, 3);
        let b = Span::from_positions(2, 4, 2, 9);
        let joined = a.to(b);
        assert_eq!(joined.start.line, 1);
        assert_eq!(joined.end.column, 9);
    }
}
