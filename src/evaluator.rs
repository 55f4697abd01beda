use crate::ast::{CondClause, Expr, FloatType, IntegerType, Program, Value};
use crate::builtinops::{OpKind, find_builtin_op};
use crate::{Arity, Error, MAX_EVAL_DEPTH};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, trace};

mod console;
mod environment;

pub use console::Console;
pub use environment::Environment;

/// Tree-walking interpreter: one environment and one console shared by every
/// expression it evaluates.
#[derive(Debug)]
pub struct Interpreter {
    env: Environment,
    console: Console,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter with an empty environment, talking to standard input/output
    pub fn new() -> Self {
        Self::with_console(Console::stdio())
    }

    pub fn with_console(console: Console) -> Self {
        Interpreter {
            env: Environment::new(),
            console,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Evaluate every top-level expression of a program in order.
    ///
    /// Returns one slot per expression; purely side-effecting expressions
    /// (definitions, `display`, `newline`) yield `None`. The first error aborts the
    /// remaining expressions, but definitions made before it stay in effect.
    pub fn evaluate(&mut self, program: &Program) -> Result<Vec<Option<Value>>, Error> {
        program
            .exprs
            .iter()
            .map(|expr| {
                self.eval(expr).map(|value| match value {
                    Value::Unspecified => None,
                    value => Some(value),
                })
            })
            .collect()
    }

    /// Evaluate a single expression (public API)
    pub fn eval(&mut self, expr: &Expr) -> Result<Value, Error> {
        self.eval_with_depth_tracking(expr, 0)
    }

    /// Evaluate an expression with depth tracking to prevent runaway recursion.
    /// `depth` counts active user function calls; nested subexpressions share it.
    pub(crate) fn eval_with_depth_tracking(
        &mut self,
        expr: &Expr,
        depth: usize,
    ) -> Result<Value, Error> {
        if depth >= MAX_EVAL_DEPTH {
            return Err(Error::EvalError(format!(
                "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
            )));
        }
        ensure_sufficient_stack(|| self.eval_expr(expr, depth))
    }

    fn eval_expr(&mut self, expr: &Expr, depth: usize) -> Result<Value, Error> {
        match expr {
            Expr::Number(text) => parse_number_literal(text),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Str(text) => Ok(Value::String(strip_string_delimiters(text).to_owned())),
            Expr::List(elements) => Ok(Value::List(self.eval_args(elements, depth)?)),

            Expr::Variable(name) => self
                .env
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UnboundName(name.clone())),

            Expr::DefineVariable { name, value } => {
                let value = self.eval_with_depth_tracking(value, depth)?;
                debug!(name = %name, value = %value, "define variable");
                self.env.define(name.clone(), value);
                Ok(Value::Unspecified)
            }

            Expr::DefineFunction { name, params, body } => {
                debug!(name = %name, arity = params.len(), "define function");
                self.env.define(
                    name.clone(),
                    Value::Function {
                        params: params.clone(),
                        body: Rc::clone(body),
                    },
                );
                Ok(Value::Unspecified)
            }

            Expr::Call { name, args } => self
                .eval_call(name, args, depth)
                .map_err(|err| add_context(err, expr)),

            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.eval_with_depth_tracking(condition, depth)?;
                if condition.is_truthy() {
                    self.eval_with_depth_tracking(then_branch, depth)
                } else {
                    self.eval_with_depth_tracking(else_branch, depth)
                }
            }

            Expr::Cond(clauses) => self.eval_cond(clauses, depth),

            Expr::Let { bindings, body } => self.eval_let(bindings, body, depth),
        }
    }

    /// Helper function to evaluate a list of argument expressions left to right
    fn eval_args(&mut self, args: &[Expr], depth: usize) -> Result<Vec<Value>, Error> {
        args.iter()
            .map(|arg| self.eval_with_depth_tracking(arg, depth))
            .collect()
    }

    /// Evaluate a body and keep the value of its last expression
    fn eval_body(&mut self, body: &[Expr], depth: usize) -> Result<Value, Error> {
        let mut result = Value::Unspecified;
        for expr in body {
            result = self.eval_with_depth_tracking(expr, depth)?;
        }
        Ok(result)
    }

    /// Evaluate `body` inside a fresh scope frame holding `bindings`.
    /// The frame is discarded afterwards whether or not evaluation succeeded.
    fn eval_in_frame(
        &mut self,
        bindings: HashMap<String, Value>,
        body: &[Expr],
        depth: usize,
    ) -> Result<Value, Error> {
        self.env.push_frame(bindings);
        let result = self.eval_body(body, depth);
        self.env.pop_frame();
        result
    }

    /// Evaluate a call node: built-in operators first, then user functions.
    fn eval_call(&mut self, name: &str, args: &[Expr], depth: usize) -> Result<Value, Error> {
        if let Some(op) = find_builtin_op(name) {
            op.validate_arity(args.len())
                .map_err(|err| with_call_context(err, name, args))?;
            return match op.op_kind {
                OpKind::Function(func) => {
                    let values = self.eval_args(args, depth)?;
                    func(&values)
                }
                OpKind::Console(func) => {
                    let values = self.eval_args(args, depth)?;
                    func(&values, &mut self.console)
                }
                OpKind::SpecialForm(form) => form(args, self, depth),
            };
        }

        // Arguments are evaluated before the callee is looked up
        let values = self.eval_args(args, depth)?;
        match self.env.get(name) {
            Some(Value::Function { params, body }) => {
                let (params, body) = (params.clone(), Rc::clone(body));
                self.call_function(name, &params, &body, values, depth)
            }
            Some(other) => Err(Error::TypeMismatch(format!(
                "{name} is a {}, not a function",
                other.type_name()
            ))),
            None => Err(Error::UnboundName(name.to_owned())),
        }
    }

    /// Apply a user-defined function. Parameters are bound in a new frame on top of
    /// whatever is live at the call site; the body never sees its defining scope.
    fn call_function(
        &mut self,
        name: &str,
        params: &[String],
        body: &[Expr],
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_error_with_expr(
                Arity::Exact(params.len()),
                args.len(),
                name.to_owned(),
            ));
        }

        trace!(function = name, depth, "call");
        let frame: HashMap<String, Value> = params.iter().cloned().zip(args).collect();
        self.eval_in_frame(frame, body, depth + 1)
    }

    fn eval_cond(&mut self, clauses: &[CondClause], depth: usize) -> Result<Value, Error> {
        for clause in clauses {
            if self
                .eval_with_depth_tracking(&clause.test, depth)?
                .is_truthy()
            {
                return self.eval_with_depth_tracking(&clause.result, depth);
            }
        }
        Err(Error::NoMatchingClause)
    }

    /// Parallel let: every binding expression sees the environment as it was before
    /// the let, then all bindings are applied together.
    fn eval_let(
        &mut self,
        bindings: &[(String, Expr)],
        body: &[Expr],
        depth: usize,
    ) -> Result<Value, Error> {
        let mut frame = HashMap::with_capacity(bindings.len());
        for (name, expr) in bindings {
            let value = self.eval_with_depth_tracking(expr, depth)?;
            frame.insert(name.clone(), value);
        }
        trace!(bindings = frame.len(), depth, "let");
        self.eval_in_frame(frame, body, depth)
    }
}

/// Stack space that must remain before evaluating deeper
const RED_ZONE: usize = 100 * 1024;

/// Size of each additional stack segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if the current one is nearly
/// exhausted. Deep user recursion is bounded by `MAX_EVAL_DEPTH`, not the host stack.
#[inline]
fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

/// Numeric literal text containing '.' is a float, anything else an integer
fn parse_number_literal(text: &str) -> Result<Value, Error> {
    let parsed = if text.contains('.') {
        text.parse::<FloatType>().map(Value::Float).ok()
    } else {
        text.parse::<IntegerType>().map(Value::Integer).ok()
    };
    parsed.ok_or_else(|| Error::EvalError(format!("Invalid numeric literal: {text}")))
}

fn strip_string_delimiters(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(text)
}

/// Helper function to add expression context to errors. Only the innermost call
/// gets annotated so recursive calls don't stack up repeated context lines.
fn add_context(error: Error, expr: &Expr) -> Error {
    const MARKER: &str = "\n  Context: ";
    match error {
        Error::TypeMismatch(msg) if !msg.contains(MARKER) => {
            Error::TypeMismatch(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        Error::EvalError(msg) if !msg.contains(MARKER) => {
            Error::EvalError(format!("{msg}{MARKER}while evaluating: {expr}"))
        }
        // Other errors carry their own context or need none
        other => other,
    }
}

fn with_call_context(error: Error, name: &str, args: &[Expr]) -> Error {
    match error {
        Error::ArityError {
            expected,
            got,
            expression: None,
        } => {
            let call = Expr::Call {
                name: name.to_owned(),
                args: args.to_vec(),
            };
            Error::arity_error_with_expr(expected, got, call.to_string())
        }
        other => other,
    }
}

/// Render a top-level result for printing; `None` for results that print nothing
pub fn format_result(value: &Value) -> Option<String> {
    match value {
        Value::Unspecified => None,
        value => Some(value.to_string()),
    }
}

//
// Special forms
//

macro_rules! boolean_logic_op {
    ($name:ident, $short_circuit:literal) => {
        pub(crate) fn $name(
            args: &[Expr],
            interpreter: &mut Interpreter,
            depth: usize,
        ) -> Result<Value, Error> {
            // Left to right, stopping at the first argument whose truthiness matches
            for arg in args {
                let result = interpreter.eval_with_depth_tracking(arg, depth)?;
                if result.is_truthy() == $short_circuit {
                    return Ok(Value::Bool($short_circuit));
                }
            }
            Ok(Value::Bool(!$short_circuit))
        }
    };
}

boolean_logic_op!(eval_and, false);
boolean_logic_op!(eval_or, true);

/// `car`/`cdr` name a variable directly rather than taking an arbitrary expression
fn list_operand<'a>(
    op: &str,
    args: &[Expr],
    interpreter: &'a Interpreter,
) -> Result<&'a [Value], Error> {
    let [Expr::Variable(name)] = args else {
        let found = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        return Err(Error::TypeMismatch(format!(
            "{op} expects a variable name, got {found}"
        )));
    };

    match interpreter.env.get(name) {
        Some(Value::List(elements)) if elements.is_empty() => Err(Error::EmptyList(op.to_owned())),
        Some(Value::List(elements)) => Ok(elements),
        Some(other) => Err(Error::TypeMismatch(format!(
            "{op} requires a list, but {name} is a {}",
            other.type_name()
        ))),
        None => Err(Error::UnboundName(name.clone())),
    }
}

pub(crate) fn eval_car(
    args: &[Expr],
    interpreter: &mut Interpreter,
    _depth: usize,
) -> Result<Value, Error> {
    let elements = list_operand("car", args, interpreter)?;
    Ok(elements[0].clone())
}

pub(crate) fn eval_cdr(
    args: &[Expr],
    interpreter: &mut Interpreter,
    _depth: usize,
) -> Result<Value, Error> {
    let elements = list_operand("cdr", args, interpreter)?;
    Ok(Value::List(elements[1..].to_vec()))
}
