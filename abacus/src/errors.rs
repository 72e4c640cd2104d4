/// Error taxonomy: compile-time errors are ordinary Rust errors; runtime
/// math/type/shape failures are *values* (`ErrorVal`) that flow through the
/// VM per the error-channel design. Numeric codes are stable and grouped by
/// kind; user-raised codes start at `E_USERDEF`.
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: u32,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(line: u32, start: usize, end: usize) -> Self {
        Span { line, start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            line: self.line.min(other.line),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Span { line: 1, start: 0, end: 0 }
    }
}

// ---------------------------------------------------------------------------
// Runtime error codes (errors-as-values)
// ---------------------------------------------------------------------------

// Numeric
pub const E_DIVZERO: u32 = 1;
pub const E_DOMAIN: u32 = 2;
pub const E_NONINT: u32 = 3;
pub const E_ZEROPOWNEG: u32 = 4;
pub const E_INVARG: u32 = 5;
// Type
pub const E_TYPE: u32 = 10;
pub const E_NOOP: u32 = 11;
// Shape
pub const E_SHAPE: u32 = 20;
pub const E_BOUNDS: u32 = 21;
pub const E_DIMS: u32 = 22;
// Lookup
pub const E_UNDEFVAR: u32 = 30;
pub const E_UNDEFFUNC: u32 = 31;
pub const E_UNDEFFIELD: u32 = 32;
pub const E_ARITY: u32 = 33;
// Resource
pub const E_FILE: u32 = 40;
pub const E_PERM: u32 = 41;
// Control
pub const E_INTERRUPT: u32 = 50;
pub const E_STACKDEPTH: u32 = 51;
/// User-raised codes via error() live at or above this threshold.
pub const E_USERDEF: u32 = 10000;

pub fn strerror(code: u32) -> &'static str {
    match code {
        E_DIVZERO => "division by zero",
        E_DOMAIN => "argument outside function domain",
        E_NONINT => "non-integer where integer required",
        E_ZEROPOWNEG => "zero raised to a negative power",
        E_INVARG => "invalid argument",
        E_TYPE => "operator undefined for operand types",
        E_NOOP => "no operator override for object type",
        E_SHAPE => "matrix dimension mismatch",
        E_BOUNDS => "index out of bounds",
        E_DIMS => "bad dimension count",
        E_UNDEFVAR => "undefined variable",
        E_UNDEFFUNC => "undefined function",
        E_UNDEFFIELD => "undefined object field",
        E_ARITY => "wrong number of arguments",
        E_FILE => "file operation failed",
        E_PERM => "operation denied by permission mode",
        E_INTERRUPT => "interrupted",
        E_STACKDEPTH => "call stack exhausted",
        c if c >= E_USERDEF => "user-defined error",
        _ => "unknown error",
    }
}

/// The runtime error value carried by `Value::Error`.
#[derive(Clone, PartialEq)]
pub struct ErrorVal {
    pub code: u32,
    pub msg: Option<Rc<str>>,
}

impl ErrorVal {
    pub fn new(code: u32) -> Self {
        ErrorVal { code, msg: None }
    }

    pub fn with_msg(code: u32, msg: impl Into<String>) -> Self {
        ErrorVal {
            code,
            msg: Some(Rc::from(msg.into())),
        }
    }

    pub fn describe(&self) -> String {
        match &self.msg {
            Some(m) => format!("error {}: {}", self.code, m),
            None => format!("error {}: {}", self.code, strerror(self.code)),
        }
    }
}

impl fmt::Debug for ErrorVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ErrorVal({})", self.describe())
    }
}

impl fmt::Display for ErrorVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

// ---------------------------------------------------------------------------
// Arithmetic-layer failures (converted to ErrorVal at the VM boundary)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("division by zero")]
    DivByZero,
    #[error("{0}")]
    Domain(&'static str),
    #[error("non-integer where integer required")]
    NonInteger,
    #[error("zero raised to a negative power")]
    ZeroPowNeg,
    #[error("invalid argument: {0}")]
    InvalidArg(&'static str),
}

impl MathError {
    pub fn code(&self) -> u32 {
        match self {
            MathError::DivByZero => E_DIVZERO,
            MathError::Domain(_) => E_DOMAIN,
            MathError::NonInteger => E_NONINT,
            MathError::ZeroPowNeg => E_ZEROPOWNEG,
            MathError::InvalidArg(_) => E_INVARG,
        }
    }
}

impl From<MathError> for ErrorVal {
    fn from(e: MathError) -> ErrorVal {
        ErrorVal::with_msg(e.code(), e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Compile-time errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, span: Span },
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },
    #[error("unterminated comment")]
    UnterminatedComment { span: Span },
    #[error("malformed number '{text}'")]
    InvalidNumber { text: String, span: Span },
    #[error("bad escape sequence '\\{ch}'")]
    BadEscape { ch: char, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::InvalidNumber { span, .. }
            | LexError::BadEscape { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("unexpected end of input in {context}")]
    UnexpectedEof { context: String, span: Span },
    #[error("invalid syntax: {context}")]
    InvalidSyntax { context: String, span: Span },
    #[error("'{name}' is already defined")]
    Redefinition { name: String, span: Span },
    #[error("undefined label '{name}'")]
    UndefinedLabel { name: String, span: Span },
    #[error("'{context}' outside of a loop")]
    LoopControlOutsideLoop { context: String, span: Span },
    #[error("too many {what} (limit {limit})")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(e) => e.span(),
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidSyntax { span, .. }
            | ParseError::Redefinition { span, .. }
            | ParseError::UndefinedLabel { span, .. }
            | ParseError::LoopControlOutsideLoop { span, .. }
            | ParseError::LimitExceeded { span, .. } => *span,
        }
    }
}

/// Top-level error for embedders and the CLI.
#[derive(Debug, Error)]
pub enum CalcError {
    #[error("syntax error: {0}")]
    Parse(#[from] ParseError),
    #[error("{}", .0.describe())]
    Uncaught(ErrorVal),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
