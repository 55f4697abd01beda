//! Built-in operator registry.
//!
//! Every call node is first checked against this registry by exact name; only if no
//! built-in matches does the evaluator look for a user-defined function. Binding a
//! built-in name as a variable is allowed, but such a binding is only visible to plain
//! variable reads, never to calls.
//!
//! ```scheme
//! (+ 1 2.5)          ; 3.5
//! (< 1 2 3)          ; #t, chained comparison
//! (<> 1 2 1)         ; #f, all arguments must be pairwise distinct
//! (cons 0 xs)        ; new list, xs is unchanged
//! ```
//!
//! ## Operator kinds
//!
//! - **Functions**: receive fully evaluated arguments (e.g. `+`, `cons`, `not`)
//! - **Console operations**: evaluated arguments plus the interpreter's console
//!   (`display`, `newline`, `read`)
//! - **Special forms**: receive unevaluated argument nodes and decide what to
//!   evaluate themselves (`and`, `or`, `car`, `cdr`)
//!
//! ## Numbers
//!
//! Integer arithmetic stays integral and reports overflow as an error; any float
//! operand makes the result a float. Division is true division: once a
//! divisor is applied the quotient is a float, so `(/ 6 3)` is `2.0`.
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature matching its [`OpKind`]
//! 2. **Add it to BUILTIN_OPS** with its name and arity
//! 3. **Add tests** covering results and error conditions

use crate::ast::{FloatType, IntegerType, Value};
use crate::evaluator::{Console, eval_and, eval_car, eval_cdr, eval_or};
use crate::{Arity, Error};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::LazyLock;

pub(crate) type FunctionFn = fn(&[Value]) -> Result<Value, Error>;
pub(crate) type ConsoleFn = fn(&[Value], &mut Console) -> Result<Value, Error>;
pub(crate) type SpecialFormFn =
    fn(&[crate::ast::Expr], &mut crate::evaluator::Interpreter, usize) -> Result<Value, Error>;

/// Represents the implementation of a built-in operator
#[derive(Clone, Copy)]
pub enum OpKind {
    /// Takes evaluated arguments and returns a value
    Function(FunctionFn),
    /// Takes evaluated arguments and performs console I/O
    Console(ConsoleFn),
    /// Takes unevaluated argument nodes, the interpreter and the current evaluation depth
    SpecialForm(SpecialFormFn),
}

impl std::fmt::Debug for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::Console(_) => write!(f, "Console(<fn>)"),
            OpKind::SpecialForm(_) => write!(f, "SpecialForm(<fn>)"),
        }
    }
}

/// Definition of a built-in operator
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The name a call node must match exactly
    pub name: &'static str,
    pub op_kind: OpKind,
    /// Expected number of arguments
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // Names uniquely identify operators
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Check if this operator is a special form
    pub fn is_special_form(&self) -> bool {
        matches!(self.op_kind, OpKind::SpecialForm(_))
    }

    /// Check if the given number of arguments is valid for this operator
    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), Error> {
        self.arity.validate(arg_count)
    }
}

//
// Numeric helpers
//

fn overflow(op: &str) -> Error {
    Error::EvalError(format!("Integer overflow in {op}"))
}

/// Ensure every argument is a number before any arithmetic happens
fn check_numeric(op: &str, args: &[Value]) -> Result<(), Error> {
    match args.iter().find(|arg| arg.as_float().is_none()) {
        Some(bad) => Err(Error::TypeMismatch(format!(
            "'{op}' expects numbers, got {} {bad}",
            bad.type_name()
        ))),
        None => Ok(()),
    }
}

/// Combine two numbers: checked integer arithmetic when both are integers,
/// float arithmetic otherwise. Callers have already checked both are numeric.
fn combine(
    op: &str,
    lhs: &Value,
    rhs: &Value,
    int_op: fn(IntegerType, IntegerType) -> Option<IntegerType>,
    float_op: fn(FloatType, FloatType) -> FloatType,
) -> Result<Value, Error> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => int_op(*a, *b)
            .map(Value::Integer)
            .ok_or_else(|| overflow(op)),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(float_op(a, b))),
            _ => Err(Error::TypeMismatch(format!("'{op}' expects numbers"))),
        },
    }
}

fn sum(op: &str, args: &[Value]) -> Result<Value, Error> {
    args.iter().try_fold(Value::Integer(0), |acc, arg| {
        combine(op, &acc, arg, IntegerType::checked_add, |a, b| a + b)
    })
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Integer(n) => *n == 0,
        Value::Float(n) => *n == 0.0,
        _ => false,
    }
}

//
// Builtin Function Implementations
//

fn builtin_add(args: &[Value]) -> Result<Value, Error> {
    check_numeric("+", args)?;
    sum("+", args)
}

fn builtin_sub(args: &[Value]) -> Result<Value, Error> {
    check_numeric("-", args)?;
    match args {
        [Value::Integer(n)] => n.checked_neg().map(Value::Integer).ok_or_else(|| overflow("-")),
        [Value::Float(n)] => Ok(Value::Float(-n)),
        [first, rest @ ..] => {
            // First minus the sum of the rest, not a running subtraction
            let rest_sum = sum("-", rest)?;
            combine("-", first, &rest_sum, IntegerType::checked_sub, |a, b| a - b)
        }
        [] => Err(Error::arity_error(Arity::AtLeast(1), 0)),
    }
}

fn builtin_mul(args: &[Value]) -> Result<Value, Error> {
    check_numeric("*", args)?;
    args.iter().try_fold(Value::Integer(1), |acc, arg| {
        combine("*", &acc, arg, IntegerType::checked_mul, |a, b| a * b)
    })
}

fn builtin_div(args: &[Value]) -> Result<Value, Error> {
    check_numeric("/", args)?;
    let Some((first, divisors)) = args.split_first() else {
        return Err(Error::arity_error(Arity::AtLeast(1), 0));
    };

    // True division: once a divisor is applied the quotient is a float, even
    // when it happens to be whole
    divisors.iter().try_fold(first.clone(), |quotient, divisor| {
        if is_zero(divisor) {
            return Err(Error::DivisionByZero);
        }
        match (quotient.as_float(), divisor.as_float()) {
            (Some(a), Some(b)) => Ok(Value::Float(a / b)),
            _ => Err(Error::TypeMismatch("'/' expects numbers".to_owned())),
        }
    })
}

/// Order two values: numbers numerically, strings lexicographically.
/// `None` means the values are unordered (a NaN was involved).
fn compare(op: &str, lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, Error> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Some(a.cmp(b))),
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(Error::TypeMismatch(format!(
                "'{op}' cannot compare {} with {}",
                lhs.type_name(),
                rhs.type_name()
            ))),
        },
    }
}

// Macro to generate chained ordering comparisons
macro_rules! ordering_comparison {
    ($name:ident, $op_str:expr, $holds:expr) => {
        fn $name(args: &[Value]) -> Result<Value, Error> {
            // Every adjacent pair must satisfy the relation; stop at the first that doesn't
            for pair in args.windows(2) {
                let ordering = compare($op_str, &pair[0], &pair[1])?;
                if !ordering.is_some_and($holds) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
    };
}

ordering_comparison!(builtin_lt, "<", Ordering::is_lt);
ordering_comparison!(builtin_gt, ">", Ordering::is_gt);
ordering_comparison!(builtin_le, "<=", Ordering::is_le);
ordering_comparison!(builtin_ge, ">=", Ordering::is_ge);

fn builtin_eq(args: &[Value]) -> Result<Value, Error> {
    Ok(Value::Bool(
        args.windows(2).all(|pair| pair[0].equivalent(&pair[1])),
    ))
}

fn builtin_distinct(args: &[Value]) -> Result<Value, Error> {
    let distinct = args
        .iter()
        .enumerate()
        .all(|(i, a)| args[i + 1..].iter().all(|b| !a.equivalent(b)));
    Ok(Value::Bool(distinct))
}

fn builtin_cons(args: &[Value]) -> Result<Value, Error> {
    match args {
        [first, Value::List(tail)] => {
            let mut new_list = Vec::with_capacity(tail.len() + 1);
            new_list.push(first.clone());
            new_list.extend_from_slice(tail);
            Ok(Value::List(new_list))
        }
        [_, other] => Err(Error::TypeMismatch(format!(
            "cons requires a list as second argument, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error(Arity::Exact(2), args.len())),
    }
}

fn builtin_null(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value @ Value::List(_)] => Ok(Value::Bool(value.is_nil())),
        [other] => Err(Error::TypeMismatch(format!(
            "null? requires a list, got {} {other}",
            other.type_name()
        ))),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_not(args: &[Value]) -> Result<Value, Error> {
    match args {
        [value] => Ok(Value::Bool(!value.is_truthy())),
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

//
// Console operations
//

fn builtin_display(args: &[Value], console: &mut Console) -> Result<Value, Error> {
    match args {
        [value] => {
            console.write_value(value)?;
            Ok(Value::Unspecified)
        }
        _ => Err(Error::arity_error(Arity::Exact(1), args.len())),
    }
}

fn builtin_newline(_args: &[Value], console: &mut Console) -> Result<Value, Error> {
    console.newline()?;
    Ok(Value::Unspecified)
}

fn builtin_read(_args: &[Value], console: &mut Console) -> Result<Value, Error> {
    console.read_value()
}

/// Global registry of all built-in operators, in a single contiguous table for ease
/// of auditing.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn function(name: &'static str, func: FunctionFn, arity: Arity) -> BuiltinOp {
        BuiltinOp {
            name,
            op_kind: OpKind::Function(func),
            arity,
        }
    }

    fn console(name: &'static str, func: ConsoleFn, arity: Arity) -> BuiltinOp {
        BuiltinOp {
            name,
            op_kind: OpKind::Console(func),
            arity,
        }
    }

    fn special_form(name: &'static str, form: SpecialFormFn, arity: Arity) -> BuiltinOp {
        BuiltinOp {
            name,
            op_kind: OpKind::SpecialForm(form),
            arity,
        }
    }

    vec![
        // Arithmetic operations
        function("+", builtin_add, Arity::AtLeast(0)),
        function("-", builtin_sub, Arity::AtLeast(1)),
        function("*", builtin_mul, Arity::AtLeast(0)),
        function("/", builtin_div, Arity::AtLeast(1)),
        // Comparison operations
        function("<", builtin_lt, Arity::AtLeast(2)),
        function(">", builtin_gt, Arity::AtLeast(2)),
        function("<=", builtin_le, Arity::AtLeast(2)),
        function(">=", builtin_ge, Arity::AtLeast(2)),
        function("=", builtin_eq, Arity::AtLeast(2)),
        // Arity-generic distinctness, not a binary not-equal
        function("<>", builtin_distinct, Arity::Any),
        // List operations
        function("cons", builtin_cons, Arity::Exact(2)),
        function("null?", builtin_null, Arity::Exact(1)),
        // car/cdr take a bare variable name rather than an arbitrary expression
        special_form("car", eval_car, Arity::Exact(1)),
        special_form("cdr", eval_cdr, Arity::Exact(1)),
        // Logical operations
        special_form("and", eval_and, Arity::Any),
        special_form("or", eval_or, Arity::Any),
        function("not", builtin_not, Arity::Exact(1)),
        // Console I/O
        console("display", builtin_display, Arity::Exact(1)),
        console("newline", builtin_newline, Arity::Exact(0)),
        console("read", builtin_read, Arity::Exact(0)),
    ]
});

/// Lazy static map from name to BuiltinOp (private - use find_builtin_op)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.name, op)).collect()
});

/// Get all builtin operators
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operator by exact name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(name).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{nil, val};
    use pretty_assertions::assert_eq;

    /// Expected outcome of a builtin call in the table-driven tests
    #[derive(Debug)]
    enum Expected {
        Success(Value),
        DivisionByZero,
        TypeMismatch,
        Overflow,
    }
    use Expected::*;

    fn success<T: Into<Value>>(value: T) -> Expected {
        Success(value.into())
    }

    /// Invoke a builtin function through the public registry
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let op = find_builtin_op(name).unwrap();
        op.validate_arity(args.len())?;
        match op.op_kind {
            OpKind::Function(func) => func(args),
            other => panic!("expected function builtin in tests, got {other:?} for {name}"),
        }
    }

    #[test]
    fn test_builtin_ops_registry() {
        let add_op = find_builtin_op("+").unwrap();
        assert_eq!(add_op.arity, Arity::AtLeast(0));
        assert!(!add_op.is_special_form());

        for name in ["car", "cdr", "and", "or"] {
            assert!(find_builtin_op(name).unwrap().is_special_form(), "{name}");
        }
        for name in ["display", "newline", "read"] {
            assert!(
                matches!(find_builtin_op(name).unwrap().op_kind, OpKind::Console(_)),
                "{name}"
            );
        }

        // The table holds every operator exactly once
        let all_ops = get_builtin_ops();
        assert_eq!(all_ops.len(), 20);
        for op in all_ops {
            assert!(std::ptr::eq(find_builtin_op(op.name).unwrap(), op));
        }

        // Names match exactly; there is no case folding or aliasing
        assert!(find_builtin_op("CAR").is_none());
        assert!(find_builtin_op("list").is_none());
        assert!(find_builtin_op("if").is_none());
    }

    #[test]
    fn test_builtin_function_implementations() {
        let test_cases: Vec<(&str, Vec<Value>, Expected)> = vec![
            // =================================================================
            // ARITHMETIC
            // =================================================================
            ("+", vec![], success(0)),
            ("+", vec![val(1), val(2), val(3)], success(6)),
            ("+", vec![val(1), val(2.5)], success(3.5)),
            ("+", vec![val(i64::MAX), val(1)], Overflow),
            ("+", vec![val(1), val("2")], TypeMismatch),
            ("+", vec![val(true)], TypeMismatch),
            ("-", vec![val(5)], success(-5)),
            ("-", vec![val(2.5)], success(-2.5)),
            ("-", vec![val(10), val(1), val(2)], success(7)),
            ("-", vec![val(10), val(0.5)], success(9.5)),
            ("-", vec![val(i64::MIN)], Overflow),
            ("-", vec![nil()], TypeMismatch),
            ("*", vec![], success(1)),
            ("*", vec![val(2), val(3), val(4)], success(24)),
            ("*", vec![val(2), val(0.5)], success(1.0)),
            ("*", vec![val(i64::MAX), val(2)], Overflow),
            // Division always yields a float once a divisor is applied
            ("/", vec![val(6), val(3)], success(2.0)),
            ("/", vec![val(7), val(2)], success(3.5)),
            ("/", vec![val(-9), val(3)], success(-3.0)),
            ("/", vec![val(10), val(2), val(5)], success(1.0)),
            ("/", vec![val(100), val(8), val(5)], success(2.5)),
            ("/", vec![val(1.0), val(4)], success(0.25)),
            // A lone argument is returned unchanged
            ("/", vec![val(42)], success(42)),
            ("/", vec![val(1), val(0)], DivisionByZero),
            ("/", vec![val(1), val(0.0)], DivisionByZero),
            ("/", vec![val(8), val(2), val(0)], DivisionByZero),
            ("/", vec![val(0), val(5)], success(0.0)),
            ("/", vec![val(i64::MIN), val(-1)], success(9.223_372_036_854_776e18)),
            ("/", vec![val("6"), val(3)], TypeMismatch),
            // =================================================================
            // COMPARISONS
            // =================================================================
            ("<", vec![val(1), val(2), val(3)], success(true)),
            ("<", vec![val(1), val(3), val(2)], success(false)),
            ("<", vec![val(1), val(1)], success(false)),
            ("<", vec![val(1), val(1.5)], success(true)),
            ("<", vec![val("abc"), val("abd")], success(true)),
            ("<", vec![val(1), val("2")], TypeMismatch),
            ("<", vec![val(true), val(false)], TypeMismatch),
            // Chained comparison stops at the first failing pair
            ("<", vec![val(2), val(1), val("x")], success(false)),
            (">", vec![val(3), val(2), val(1)], success(true)),
            (">", vec![val(3), val(3)], success(false)),
            ("<=", vec![val(1), val(1), val(2)], success(true)),
            ("<=", vec![val(2), val(1)], success(false)),
            (">=", vec![val(2), val(2), val(1)], success(true)),
            (">=", vec![val(1), val(2)], success(false)),
            ("=", vec![val(5), val(5), val(5)], success(true)),
            ("=", vec![val(5), val(5), val(6)], success(false)),
            ("=", vec![val(1), val(1.0)], success(true)),
            ("=", vec![val("a"), val("a")], success(true)),
            ("=", vec![val([1, 2]), val([1, 2])], success(true)),
            ("=", vec![val(1), val("1")], success(false)),
            // <> checks that all arguments are pairwise distinct
            ("<>", vec![val(1), val(2), val(3)], success(true)),
            ("<>", vec![val(1), val(1)], success(false)),
            ("<>", vec![val(1), val(2), val(1)], success(false)),
            ("<>", vec![val(1), val(1.0)], success(false)),
            ("<>", vec![], success(true)),
            ("<>", vec![val("x")], success(true)),
            // =================================================================
            // LISTS AND LOGIC
            // =================================================================
            ("cons", vec![val(1), val([2, 3])], success([1, 2, 3])),
            ("cons", vec![val(1), nil()], success([1])),
            ("cons", vec![val([1]), val([2])], success(vec![val([1]), val(2)])),
            ("cons", vec![val(1), val(2)], TypeMismatch),
            ("null?", vec![nil()], success(true)),
            ("null?", vec![val([1])], success(false)),
            ("null?", vec![val(0)], TypeMismatch),
            ("not", vec![val(false)], success(true)),
            ("not", vec![val(true)], success(false)),
            ("not", vec![val(0)], success(false)),
            ("not", vec![nil()], success(false)),
        ];

        for (i, (name, args, expected)) in test_cases.into_iter().enumerate() {
            let result = call_builtin(name, &args);
            let test_id = format!("Builtin test #{} ({name} {args:?})", i + 1);
            match (result, expected) {
                (Ok(actual), Success(expected)) => {
                    assert_eq!(actual, expected, "{test_id}");
                }
                (Err(Error::DivisionByZero), DivisionByZero)
                | (Err(Error::TypeMismatch(_)), TypeMismatch) => {}
                (Err(Error::EvalError(msg)), Overflow) => {
                    assert!(msg.contains("overflow"), "{test_id}: {msg}");
                }
                (result, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {result:?}")
                }
            }
        }
    }

    #[test]
    fn test_builtin_arity_validation() {
        let cases = [
            ("-", 0, Arity::AtLeast(1)),
            ("/", 0, Arity::AtLeast(1)),
            ("<", 1, Arity::AtLeast(2)),
            ("=", 0, Arity::AtLeast(2)),
            ("cons", 1, Arity::Exact(2)),
            ("null?", 2, Arity::Exact(1)),
            ("not", 0, Arity::Exact(1)),
        ];
        for (name, count, arity) in cases {
            let args = vec![val(1); count];
            match call_builtin(name, &args) {
                Err(Error::ArityError { expected, got, .. }) => {
                    assert_eq!((expected, got), (arity, count), "{name}");
                }
                other => panic!("{name}: expected ArityError, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_cons_does_not_mutate_its_list() {
        let tail = val([2, 3]);
        let result = call_builtin("cons", &[val(1), tail.clone()]).unwrap();
        assert_eq!(result, val([1, 2, 3]));
        assert_eq!(tail, val([2, 3]));
    }
}
