//! Mini-Scheme - a small tree-walking Scheme-like expression evaluator
//!
//! This crate evaluates programs written in a compact Scheme dialect: integers and
//! floats, booleans, strings, lists, variable and function definitions, conditionals,
//! local bindings, boolean logic, and console I/O primitives.
//!
//! ```scheme
//! (define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))
//! (fact 5)                 ; 120
//! (define xs '(1 2 3))
//! (car xs)                 ; 1
//! (let ((x 2) (y 3)) (* x y))
//! (cond ((> 1 2) "no") (#t "yes"))
//! ```
//!
//! ## Semantics in brief
//!
//! - Only `#f` is false; `0`, `""` and the empty list are all true.
//! - Built-in operator names are resolved before user definitions at call sites.
//! - Functions do not capture their defining environment: a body sees whatever
//!   bindings are live when it is called.
//! - Every function call and every `let` runs in its own scope frame; anything
//!   defined or redefined inside is discarded when the frame ends.
//!
//! ## Modules
//!
//! - `ast`: runtime values and the parse tree consumed by the evaluator
//! - `builtinops`: the fixed registry of built-in operators
//! - `evaluator`: the interpreter, its environment and console
//! - `scheme`: source text to parse tree (feature `scheme`)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow on deeply nested input
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum depth of nested user function calls. Recursion is the only looping
/// construct, so this is generous; the evaluator grows its stack as needed.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed forms)
    InvalidSyntax,
    /// Input ended before the expression was complete (unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Show a little of what came before the error
        let context_start = error_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        // The offending token is whatever non-blank run starts at the error offset
        let found: String = input
            .chars()
            .skip(error_offset)
            .take_while(|c| !c.is_whitespace())
            .take(20)
            .collect();

        Self::new(
            kind,
            message,
            Some(display_context),
            (!found.is_empty()).then_some(found),
        )
    }
}

/// Expected argument count of an operator or user function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly n arguments
    Exact(usize),
    /// n or more arguments
    AtLeast(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check that `got` arguments satisfy this arity
    pub fn validate(self, got: usize) -> Result<(), Error> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
            Arity::Any => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::arity_error(self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
            Arity::Any => write!(f, "any number of"),
        }
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(ParseError),
    /// A variable, function or operator name with no binding
    UnboundName(String),
    /// An operand of the wrong shape for its operator
    TypeMismatch(String),
    /// `car`/`cdr` applied to an empty list; holds the operator name
    EmptyList(String),
    ArityError {
        expected: Arity,
        got: usize,
        expression: Option<String>, // Optional expression context
    },
    DivisionByZero,
    /// `cond` with no clause whose test is true
    NoMatchingClause,
    /// `read` failed or reached the end of input
    ReadError(String),
    /// Implementation limits: overflow, malformed literals, evaluation depth
    EvalError(String),
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: Arity, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundName(name) => write!(f, "Unbound name: {name}"),
            Error::TypeMismatch(msg) => write!(f, "Type mismatch: {msg}"),
            Error::EmptyList(op) => write!(f, "EmptyList: {op} applied to an empty list"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: expression {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: function expected {expected} arguments but got {got}"
                ),
            },
            Error::DivisionByZero => write!(f, "DivisionByZero: division by zero"),
            Error::NoMatchingClause => write!(f, "NoMatchingClause: no cond clause is true"),
            Error::ReadError(msg) => write!(f, "ReadError: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::ParseError(err)
    }
}

pub mod ast;
pub mod builtinops;
pub mod evaluator;

#[cfg(feature = "scheme")]
pub mod scheme;

#[cfg(test)]
mod test_helpers;

/// Parse and evaluate a whole source text, returning the printed form of every
/// top-level result that produced a value.
///
/// Output written by `display`/`newline` goes to the interpreter's console, not
/// into the returned lines.
#[cfg(feature = "scheme")]
pub fn run_source(
    source: &str,
    interpreter: &mut evaluator::Interpreter,
) -> Result<Vec<String>, Error> {
    let program = scheme::parse_program(source)?;
    let results = interpreter.evaluate(&program)?;
    Ok(results
        .iter()
        .flatten()
        .filter_map(evaluator::format_result)
        .collect())
}
