//! Error types for Glint scripts.
//!
//! There are three tiers:
//!
//! - [`ParseError`]: lexical and syntax errors, found once at parse time and
//!   recorded on the program.
//! - [`RuntimeError`]: script-level failures raised while executing. Once
//!   located at an instruction they become [`ScriptError::Runtime`], which
//!   `try`/`catch` can intercept.
//! - [`ScriptError::Internal`]: broken engine invariants (malformed
//!   instruction lists). Never catchable by scripts.

use thiserror::Error;

/// What went wrong while tokenizing or parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),

    /// A number that does not parse, or runs straight into an identifier
    /// (`1abc`).
    #[error("malformed number '{0}'")]
    MalformedNumber(String),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("cannot assign to this expression")]
    InvalidAssignmentTarget,

    #[error("duplicate parameter '{0}'")]
    DuplicateParameter(String),

    #[error("default value for parameter '{0}' must be a literal")]
    NonLiteralDefault(String),

    #[error("class '{0}' shadows an existing top-level name")]
    ClassShadowsName(String),

    #[error("'static' is only allowed inside a class body")]
    StaticOutsideClass,

    /// A forward reference was never patched. Indicates a parser bug.
    #[error("unresolved placeholder at instruction {0}")]
    UnresolvedPlaceholder(usize),
}

/// A syntax error with its source position and a rendered snippet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{file}:{line}:{column}: {kind}\n{snippet}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub kind: SyntaxError,
    /// The offending source line followed by a caret line.
    pub snippet: String,
}

impl ParseError {
    /// Build an error, rendering the snippet from `source`.
    pub fn new(file: &str, source: &str, line: u32, column: u32, kind: SyntaxError) -> Self {
        Self {
            file: file.to_string(),
            line,
            column,
            kind,
            snippet: render_snippet(source, line, column),
        }
    }
}

/// Render `line` of `source` with a caret under `column` (both 1-based).
pub fn render_snippet(source: &str, line: u32, column: u32) -> String {
    // Accept `\n`, `\r\n` and lone `\r` line breaks, like the lexer does.
    let text = source
        .split('\n')
        .flat_map(|piece| piece.strip_suffix('\r').unwrap_or(piece).split('\r'))
        .nth(line.saturating_sub(1) as usize)
        .unwrap_or("");
    let pad = " ".repeat(column.saturating_sub(1) as usize);
    format!("{text}\n{pad}^")
}

/// Script-level runtime failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("{type_name} has no member '{member}'")]
    UnknownMember { type_name: String, member: String },

    #[error("member '{member}' of {type_name} cannot be assigned")]
    ReadOnlyMember { type_name: String, member: String },

    #[error("missing argument '{parameter}' in call to {function}")]
    MissingArgument { function: String, parameter: String },

    #[error("{function} takes {expected} argument(s) but {found} were given")]
    TooManyArguments {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("positional argument follows keyword argument in call to {function}")]
    PositionalAfterKeyword { function: String },

    #[error("{function} has no parameter named '{name}'")]
    UnknownKeyword { function: String, name: String },

    #[error("argument '{name}' given more than once in call to {function}")]
    DuplicateArgument { function: String, name: String },

    #[error("{operation} expects {expected}, found {found}")]
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },

    #[error("index {index} out of bounds (length {length})")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("{value} is not a {bits}-bit integer")]
    IntegerOutOfRange { value: f64, bits: u8 },

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0} is not hashable")]
    Unhashable(String),

    #[error("{0} is not callable")]
    NotCallable(String),

    #[error("invalid argument to {function}: {message}")]
    InvalidArgument { function: String, message: String },

    #[error("range of {length} elements exceeds limit {limit}")]
    RangeTooLong { length: f64, limit: usize },

    #[error("call depth exceeded limit {limit}")]
    RecursionLimit { limit: usize },

    #[error("operand stack exceeded limit {limit}")]
    StackOverflow { limit: usize },

    #[error("output error: {0}")]
    Output(String),

    /// Raised explicitly by a script (`raise(...)`) or a host function.
    #[error("{0}")]
    Raised(String),
}

impl RuntimeError {
    /// Shorthand for a [`RuntimeError::TypeMismatch`].
    pub fn type_mismatch(operation: &str, expected: &str, found: &str) -> Self {
        Self::TypeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Shorthand for a [`RuntimeError::UnknownMember`].
    pub fn unknown_member(type_name: &str, member: &str) -> Self {
        Self::UnknownMember {
            type_name: type_name.to_string(),
            member: member.to_string(),
        }
    }
}

/// A runtime error pinned to the instruction that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{file}:{line}:{column}: {error}")]
pub struct LocatedError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub error: RuntimeError,
    /// Set once the error has been handed to the host's exception handler.
    pub reported: bool,
}

/// Everything a script run can fail with, as seen by the host.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// The program failed to parse; re-raised on every use.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A script-level error. The only kind `try`/`catch` intercepts.
    #[error(transparent)]
    Runtime(Box<LocatedError>),

    /// The run was stopped by a breakpoint handler or by the host.
    #[error("execution terminated")]
    Terminated,

    /// An engine invariant was violated (malformed instruction list).
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScriptError {
    /// Attach a source location to a runtime error.
    pub fn located(file: &str, line: u32, column: u32, error: RuntimeError) -> Self {
        Self::Runtime(Box::new(LocatedError {
            file: file.to_string(),
            line,
            column,
            error,
            reported: false,
        }))
    }

    /// Whether a script `try`/`catch` may intercept this error.
    pub fn is_catchable(&self) -> bool {
        matches!(self, Self::Runtime(_))
    }

    /// The underlying runtime error, if this is one.
    pub fn runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            Self::Runtime(located) => Some(&located.error),
            _ => None,
        }
    }
}
