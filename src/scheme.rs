use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, satisfy},
    combinator::{cut, map, not, opt, recognize, value},
    error::ErrorKind,
    multi::{many0, many0_count},
    sequence::{pair, preceded, terminated},
};
use std::fmt;
use std::rc::Rc;

use crate::ast::{CondClause, Expr, Program, SYMBOL_SPECIAL_CHARS, is_valid_symbol};
use crate::builtinops::find_builtin_op;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Raw S-expression read by the nom layer, before special forms are recognised
#[derive(Debug, Clone, PartialEq)]
enum Sexpr<'a> {
    Number(&'a str),
    Bool(bool),
    /// String literal including its delimiting quotes
    Str(&'a str),
    Symbol(&'a str),
    List(Vec<Sexpr<'a>>),
    /// `'( ... )` list literal
    Quoted(Vec<Sexpr<'a>>),
}

impl fmt::Display for Sexpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_items(f: &mut fmt::Formatter<'_>, items: &[Sexpr<'_>]) -> fmt::Result {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, ")")
        }

        match self {
            Sexpr::Number(text) | Sexpr::Str(text) | Sexpr::Symbol(text) => write!(f, "{text}"),
            Sexpr::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Sexpr::List(items) => write_items(f, items),
            Sexpr::Quoted(items) => {
                write!(f, "'")?;
                write_items(f, items)
            }
        }
    }
}

/// Convert nom parsing errors to structured parse errors
fn parse_error_to_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let byte_offset = input.len().saturating_sub(e.input.len());
            let position = input
                .get(..byte_offset)
                .map_or(byte_offset, |consumed| consumed.chars().count());
            let (kind, message) = match e.code {
                ErrorKind::TooLarge => (
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                _ if e.input.is_empty() => (
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input (unclosed parenthesis or string?)".to_owned(),
                ),
                ErrorKind::Char => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Unexpected character at position {position}"),
                ),
                _ => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid syntax at position {position}"),
                ),
            };
            ParseError::with_context(kind, message, input, position)
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Skip whitespace and `;` line comments
fn skip_ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            recognize(pair(char(';'), not_line_ending)),
        ))),
    )
    .parse(input)
}

/// Atoms must not run straight into identifier characters ("12abc", "#tx")
fn token_end(input: &str) -> IResult<&str, ()> {
    not(satisfy(is_symbol_char)).parse(input)
}

/// Parse a number: optional minus, digits, optional fraction. The text is kept verbatim.
fn parse_number(input: &str) -> IResult<&str, Sexpr<'_>> {
    let (input, number_str) =
        recognize((opt(char('-')), digit1, opt(pair(char('.'), digit1)))).parse(input)?;
    let (input, ()) = token_end(input)?;
    Ok((input, Sexpr::Number(number_str)))
}

/// Parse a boolean (#t or #f)
fn parse_bool(input: &str) -> IResult<&str, Sexpr<'_>> {
    terminated(
        alt((
            value(Sexpr::Bool(true), tag("#t")),
            value(Sexpr::Bool(false), tag("#f")),
        )),
        token_end,
    )
    .parse(input)
}

/// Parse a string literal. There are no escape sequences: everything up to the
/// next double quote belongs to the string.
fn parse_string(input: &str) -> IResult<&str, Sexpr<'_>> {
    map(
        recognize(preceded(
            char('"'),
            cut(terminated(take_while(|c: char| c != '"'), char('"'))),
        )),
        Sexpr::Str,
    )
    .parse(input)
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, Sexpr<'_>> {
    let (remaining, candidate) = take_while1(is_symbol_char).parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, Sexpr::Symbol(candidate)))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse the elements of a parenthesised list. Once the opening parenthesis is
/// seen, failures are final so errors point at the innermost problem.
fn parse_list(input: &str, depth: usize) -> IResult<&str, Vec<Sexpr<'_>>> {
    let (input, _) = char('(').parse(input)?;
    cut(terminated(
        many0(preceded(skip_ws, |input| parse_sexpr(input, depth + 1))),
        preceded(skip_ws, char(')')),
    ))
    .parse(input)
}

/// Parse a list literal: '( ... )
fn parse_quoted(input: &str, depth: usize) -> IResult<&str, Sexpr<'_>> {
    let (input, _) = char('\'').parse(input)?;
    map(cut(|input| parse_list(input, depth)), Sexpr::Quoted).parse(input)
}

/// Parse a single S-expression with depth tracking
fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Sexpr<'_>> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    alt((
        |input| parse_quoted(input, depth),
        map(|input| parse_list(input, depth), Sexpr::List),
        parse_number,
        parse_bool,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}

fn skip(input: &str, rest: &str) -> Result<usize, Error> {
    let (rest, ()) = skip_ws(rest).map_err(|e| parse_error_to_message(input, e))?;
    Ok(input.len() - rest.len())
}

/// Parse a whole program: zero or more top-level expressions separated by
/// whitespace and comments.
pub fn parse_program(input: &str) -> Result<Program, Error> {
    let mut exprs = Vec::new();
    let mut offset = skip(input, input)?;

    while offset < input.len() {
        let (remaining, sexpr) = parse_sexpr(&input[offset..], 0)
            .map_err(|e| parse_error_to_message(input, e))?;
        exprs.push(build_expr(&sexpr)?);
        offset = skip(input, remaining)?;
    }

    Ok(Program::new(exprs))
}

/// Parse exactly one expression. Anything but whitespace or comments after it
/// is a `TrailingContent` error.
pub fn parse_expr(input: &str) -> Result<Expr, Error> {
    let start = skip(input, input)?;
    let (remaining, sexpr) =
        parse_sexpr(&input[start..], 0).map_err(|e| parse_error_to_message(input, e))?;
    let end = skip(input, remaining)?;

    if end < input.len() {
        let position = input[..end].chars().count();
        return Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input after expression at position {position}"),
            input,
            position,
        )
        .into());
    }

    build_expr(&sexpr)
}

//
// Special form recognition: raw S-expressions to the parse tree
//

fn syntax_error(message: impl Into<String>, form: &Sexpr<'_>) -> Error {
    const MAX_CONTEXT: usize = 100;
    let context: String = form.to_string().chars().take(MAX_CONTEXT).collect();
    ParseError::new(ParseErrorKind::InvalidSyntax, message, Some(context), None).into()
}

fn build_expr(sexpr: &Sexpr<'_>) -> Result<Expr, Error> {
    match sexpr {
        Sexpr::Number(text) => Ok(Expr::Number((*text).to_owned())),
        Sexpr::Bool(b) => Ok(Expr::Bool(*b)),
        Sexpr::Str(text) => Ok(Expr::Str((*text).to_owned())),
        Sexpr::Symbol(name) => Ok(Expr::Variable((*name).to_owned())),
        Sexpr::Quoted(items) => Ok(Expr::List(build_all(items)?)),
        Sexpr::List(items) => build_form(sexpr, items),
    }
}

fn build_all(items: &[Sexpr<'_>]) -> Result<Vec<Expr>, Error> {
    items.iter().map(build_expr).collect()
}

fn build_form(form: &Sexpr<'_>, items: &[Sexpr<'_>]) -> Result<Expr, Error> {
    let [head, rest @ ..] = items else {
        return Err(syntax_error(
            "Empty combination; write '() for the empty list",
            form,
        ));
    };
    let Sexpr::Symbol(name) = head else {
        return Err(syntax_error(
            format!("Expected an operator name, found {head}"),
            form,
        ));
    };

    match *name {
        "define" => build_define(form, rest),
        "if" => match rest {
            [condition, then_branch, else_branch] => Ok(Expr::If {
                condition: Box::new(build_expr(condition)?),
                then_branch: Box::new(build_expr(then_branch)?),
                else_branch: Box::new(build_expr(else_branch)?),
            }),
            _ => Err(syntax_error(
                "if expects a condition, a consequent and an alternative",
                form,
            )),
        },
        "cond" => build_cond(form, rest),
        "let" => build_let(form, rest),
        name => build_call(name, rest, form),
    }
}

fn build_define(form: &Sexpr<'_>, rest: &[Sexpr<'_>]) -> Result<Expr, Error> {
    match rest {
        [Sexpr::Symbol(name), value] => Ok(Expr::DefineVariable {
            name: (*name).to_owned(),
            value: Box::new(build_expr(value)?),
        }),
        [Sexpr::List(header), body @ ..] if !body.is_empty() => {
            let [Sexpr::Symbol(name), params @ ..] = header.as_slice() else {
                return Err(syntax_error(
                    "define: function header must start with its name",
                    form,
                ));
            };
            let params = unique_names(params, form, "parameter")?;
            Ok(Expr::DefineFunction {
                name: (*name).to_owned(),
                params,
                body: Rc::from(build_all(body)?),
            })
        }
        _ => Err(syntax_error(
            "define expects (define name expr) or (define (name param ...) body ...)",
            form,
        )),
    }
}

/// Collect identifiers, rejecting anything else and repeated names
fn unique_names(items: &[Sexpr<'_>], form: &Sexpr<'_>, what: &str) -> Result<Vec<String>, Error> {
    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Sexpr::Symbol(name) = item else {
            return Err(syntax_error(
                format!("Expected a {what} name, found {item}"),
                form,
            ));
        };
        if names.iter().any(|seen| seen == name) {
            return Err(syntax_error(format!("Duplicate {what} name: {name}"), form));
        }
        names.push((*name).to_owned());
    }
    Ok(names)
}

fn build_cond(form: &Sexpr<'_>, rest: &[Sexpr<'_>]) -> Result<Expr, Error> {
    if rest.is_empty() {
        return Err(syntax_error("cond expects at least one clause", form));
    }
    rest.iter()
        .map(|clause| match clause {
            Sexpr::List(parts) => match parts.as_slice() {
                [test, result] => Ok(CondClause {
                    test: build_expr(test)?,
                    result: build_expr(result)?,
                }),
                _ => Err(syntax_error(
                    format!("cond clause must be (test result), found {clause}"),
                    form,
                )),
            },
            _ => Err(syntax_error(
                format!("cond clause must be (test result), found {clause}"),
                form,
            )),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Expr::Cond)
}

fn build_let(form: &Sexpr<'_>, rest: &[Sexpr<'_>]) -> Result<Expr, Error> {
    let [Sexpr::List(binding_forms), body @ ..] = rest else {
        return Err(syntax_error(
            "let expects a binding list followed by a body",
            form,
        ));
    };
    if body.is_empty() {
        return Err(syntax_error("let body must not be empty", form));
    }

    let mut names = Vec::with_capacity(binding_forms.len());
    let mut exprs = Vec::with_capacity(binding_forms.len());
    for binding in binding_forms {
        let Sexpr::List(parts) = binding else {
            return Err(syntax_error(
                format!("let binding must be (name expr), found {binding}"),
                form,
            ));
        };
        let [name, expr] = parts.as_slice() else {
            return Err(syntax_error(
                format!("let binding must be (name expr), found {binding}"),
                form,
            ));
        };
        names.push(name.clone());
        exprs.push(build_expr(expr)?);
    }

    let names = unique_names(&names, form, "binding")?;
    Ok(Expr::Let {
        bindings: names.into_iter().zip(exprs).collect(),
        body: build_all(body)?,
    })
}

fn build_call(name: &str, args: &[Sexpr<'_>], form: &Sexpr<'_>) -> Result<Expr, Error> {
    if matches!(name, "car" | "cdr")
        && let Some(arg) = args.iter().find(|arg| !matches!(arg, Sexpr::Symbol(_)))
    {
        return Err(syntax_error(
            format!("{name} takes a variable name, found {arg}"),
            form,
        ));
    }

    let call = Expr::Call {
        name: name.to_owned(),
        args: build_all(args)?,
    };

    // Statically wrong argument counts for builtins are reported before evaluation
    if let Some(op) = find_builtin_op(name)
        && let Err(Error::ArityError { expected, got, .. }) = op.validate_arity(args.len())
    {
        return Err(Error::arity_error_with_expr(expected, got, call.to_string()));
    }

    Ok(call)
}
