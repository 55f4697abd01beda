//! This module defines the runtime [`Value`] type and the parse tree ([`Expr`],
//! [`Program`]) the evaluator walks. Values cover every Mini-Scheme data type:
//! integers, floats, booleans, strings, lists and user-defined functions, plus the
//! `Unspecified` result of purely side-effecting forms. Ergonomic helpers such as
//! [`val`] and [`nil`] build values from Rust literals, arrays and vectors.
//!
//! The parse tree keeps literal tokens in their original lexical form; turning
//! numeric text into numbers and stripping string delimiters is the evaluator's job.

use std::rc::Rc;

/// Type alias for integer values in the interpreter
pub(crate) type IntegerType = i64;

/// Type alias for float values in the interpreter
pub(crate) type FloatType = f64;

/// Allowed non-alphanumeric characters in identifiers
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Check if a string is a valid identifier
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// A single expression node of a parsed program
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal, as written (`42`, `-7`, `3.14`)
    Number(String),
    /// `#t` / `#f`
    Bool(bool),
    /// String literal, as written including its delimiting quotes
    Str(String),
    /// List literal `'(e1 e2 ...)`; elements are evaluated
    List(Vec<Expr>),
    /// Variable reference
    Variable(String),
    /// `(define name value)`
    DefineVariable { name: String, value: Box<Expr> },
    /// `(define (name params...) body...)`
    DefineFunction {
        name: String,
        params: Vec<String>,
        body: Rc<[Expr]>,
    },
    /// `(name args...)` - built-in operator or user function
    Call { name: String, args: Vec<Expr> },
    /// `(if condition then else)`
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `(cond (test result)...)`
    Cond(Vec<CondClause>),
    /// `(let ((name expr)...) body...)`
    Let {
        bindings: Vec<(String, Expr)>,
        body: Vec<Expr>,
    },
}

/// One `(test result)` clause of a `cond`
#[derive(Debug, Clone, PartialEq)]
pub struct CondClause {
    pub test: Expr,
    pub result: Expr,
}

/// The root of a parse tree: top-level expressions in source order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub exprs: Vec<Expr>,
}

impl Program {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Program { exprs }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn write_seq(f: &mut std::fmt::Formatter<'_>, exprs: &[Expr]) -> std::fmt::Result {
            for expr in exprs {
                write!(f, " {expr}")?;
            }
            Ok(())
        }

        match self {
            Expr::Number(text) | Expr::Str(text) | Expr::Variable(text) => write!(f, "{text}"),
            Expr::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Expr::List(elements) => {
                write!(f, "'(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Expr::DefineVariable { name, value } => write!(f, "(define {name} {value})"),
            Expr::DefineFunction { name, params, body } => {
                write!(f, "(define ({name}")?;
                for param in params {
                    write!(f, " {param}")?;
                }
                write!(f, ")")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
            Expr::Call { name, args } => {
                write!(f, "({name}")?;
                write_seq(f, args)?;
                write!(f, ")")
            }
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "(if {condition} {then_branch} {else_branch})"),
            Expr::Cond(clauses) => {
                write!(f, "(cond")?;
                for clause in clauses {
                    write!(f, " ({} {})", clause.test, clause.result)?;
                }
                write!(f, ")")
            }
            Expr::Let { bindings, body } => {
                write!(f, "(let (")?;
                for (i, (name, expr)) in bindings.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "({name} {expr})")?;
                }
                write!(f, ")")?;
                write_seq(f, body)?;
                write!(f, ")")
            }
        }
    }
}

/// Runtime value produced and consumed by the evaluator
///
/// To build values in code and tests, use the helper functions:
/// - `val(42)`, `val(2.5)`, `val(true)`, `val("text")` for scalars
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![val(1), val("a")])` for mixed lists
/// - `nil()` for the empty list
#[derive(Clone)]
pub enum Value {
    Integer(IntegerType),
    Float(FloatType),
    Bool(bool),
    String(String),
    /// Immutable once built; list operators return new lists
    List(Vec<Value>),
    /// User-defined function. The body is shared with the parse tree, not copied,
    /// and carries no environment of its own.
    Function {
        params: Vec<String>,
        body: Rc<[Expr]>,
    },
    /// Result of definitions and output primitives
    /// These values never equal themselves or any other value
    Unspecified,
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Float(n) => write!(f, "Float({n:?})"),
            Value::String(s) => write!(f, "String(\"{s}\")"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Value::Function { params, body } => {
                write!(f, "Function(params={params:?}, body=[")?;
                for (i, expr) in body.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{expr}")?;
                }
                write!(f, "])")
            }
            Value::Unspecified => write!(f, "Unspecified"),
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<FloatType> for Value {
    fn from(n: FloatType) -> Self {
        Value::Float(n)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(n as IntegerType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntegerType); // no casting
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(slice: &[T]) -> Self {
        Value::List(slice.iter().cloned().map(|x| x.into()).collect())
    }
}

/// Helper function for creating Values - works great in mixed lists!
/// Accepts any type that can be converted to Value
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating empty lists
pub fn nil() -> Value {
    Value::List(vec![])
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            // Debug keeps the fractional part: 2.0 prints as "2.0", not "2"
            Value::Float(n) => write!(f, "{n:?}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Function { .. } => write!(f, "#<function>"),
            Value::Unspecified => write!(f, "#<unspecified>"),
        }
    }
}

impl Value {
    /// Only `#f` is false. Zero, the empty string and the empty list are all true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    /// Check if a value is the empty list
    pub(crate) fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    /// Numeric view of a value, if it is a number
    pub(crate) fn as_float(&self) -> Option<FloatType> {
        match self {
            Value::Integer(n) => Some(*n as FloatType),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in error messages
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Function { .. } => "function",
            Value::Unspecified => "unspecified",
        }
    }

    /// Equality as seen by `=` and `<>`: numbers compare numerically across
    /// integer and float, lists element-wise, everything else structurally.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y))
            }
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (
                Value::Function {
                    params: p1,
                    body: b1,
                },
                Value::Function {
                    params: p2,
                    body: b2,
                },
            ) => {
                // Same definition, not merely equal-looking source
                p1 == p2 && Rc::ptr_eq(b1, b2)
            }
            (Value::Unspecified, _) | (_, Value::Unspecified) => false, // Unspecified never equals anything
            _ => false, // Different variants are never equal
        }
    }
}
