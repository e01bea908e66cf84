// Structured error taxonomy for both pipeline stages: compiling source to
// bytecode, and executing bytecode on the VM. Each carries enough context
// (a source location, or a call-stack trace) to be useful standalone,
// without the caller having to reach back into the pipeline that produced
// it.

use std::fmt;

use thiserror::Error;

use crate::value::TypeSetDisplay;

/// A `(line, column, length)` triple identifying a span of source text.
///
/// `length` is in bytes of the lexeme, not the remainder of the line; it
/// lets callers underline the exact offending token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        SourceLocation { line, column, length }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// What was expected vs. what was actually found, for diagnostics that can
/// name both (a missing token, a type mismatch at compile time, etc).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub expected: String,
    pub actual: String,
}

/// Errors raised while turning source text into bytecode: lexing, parsing,
/// and the handful of semantic checks the code generator performs (mainly
/// name resolution). The lexer and parser do not abort on the first error;
/// they resynchronize and keep collecting, so a single compile pass can
/// return more than one of these (see `CompileErrors`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("{location}: lex error: {message}")]
    LexError {
        message: String,
        location: SourceLocation,
    },

    #[error("{location}: parse error: {message}")]
    ParseError {
        message: String,
        location: SourceLocation,
        expectation: Option<Expectation>,
    },

    #[error("{location}: semantic error: {message}")]
    SemanticError {
        message: String,
        location: SourceLocation,
    },
}

impl CompileError {
    pub fn location(&self) -> SourceLocation {
        match self {
            CompileError::LexError { location, .. } => *location,
            CompileError::ParseError { location, .. } => *location,
            CompileError::SemanticError { location, .. } => *location,
        }
    }
}

/// Accumulated compile errors from a single lex+parse(+codegen) pass.
///
/// The lexer/parser recover at statement boundaries rather than bailing
/// out on the first error, so a caller usually wants "all the errors found
/// this pass", not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, err: CompileError) {
        self.0.push(err);
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

/// One entry in a runtime stack trace: the address that was executing, and
/// the name of the function frame it belonged to (`None` for top-level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub address: usize,
    pub function: Option<String>,
}

/// A snapshot of the call chain at the moment a `RuntimeError` was raised,
/// innermost frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackTrace(pub Vec<TraceFrame>);

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.0 {
            match &frame.function {
                Some(name) => writeln!(f, "  at {} (pc={})", name, frame.address)?,
                None => writeln!(f, "  at <main> (pc={})", frame.address)?,
            }
        }
        Ok(())
    }
}

/// Errors raised while executing bytecode. Every variant aborts the
/// current `execute`/`step` call and is reported together with the
/// `StackTrace` captured at the point of fault (see `VmError`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("stack overflow: {kind} exceeded depth {limit}")]
    StackOverflow { kind: StackKind, limit: usize },

    #[error("division by zero")]
    DivisionByZero,

    #[error("type mismatch: expected {expected}, found {actual}{}", context.as_ref().map(|c| format!(" (in '{}')", c)).unwrap_or_default())]
    TypeMismatch {
        expected: TypeSetDisplay,
        actual: TypeSetDisplay,
        context: Option<String>,
    },

    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: String },

    #[error("undefined function '{name}'")]
    UndefinedFunction { name: String },

    #[error("invalid jump target {target}")]
    InvalidJump { target: i64 },

    #[error("out of memory")]
    OutOfMemory,

    #[error("budget exceeded: {budget}")]
    BudgetExceeded { budget: Budget },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    Operand,
    Call,
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackKind::Operand => write!(f, "operand stack"),
            StackKind::Call => write!(f, "call stack"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Steps,
    Instructions,
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Steps => write!(f, "max steps"),
            Budget::Instructions => write!(f, "max instructions"),
        }
    }
}

impl RuntimeError {
    /// Wrap a `TypeMismatch` raised while coercing a built-in's operand,
    /// tagging it with the built-in's name so the caller doesn't have to
    /// guess which argument failed. Per spec.md §7: "failures from a
    /// coerced built-in operand propagate as a TypeMismatch wrapped with
    /// the built-in's name."
    pub fn in_builtin(name: &str, err: RuntimeError) -> RuntimeError {
        match err {
            RuntimeError::TypeMismatch { expected, actual, context } => RuntimeError::TypeMismatch {
                expected,
                actual,
                context: context.or_else(|| Some(name.to_string())),
            },
            other => other,
        }
    }
}

/// A `RuntimeError` together with the stack trace captured when it fired.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}\n{trace}")]
pub struct VmError {
    pub error: RuntimeError,
    pub trace: StackTrace,
}
