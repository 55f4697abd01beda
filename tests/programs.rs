//! Whole programs through the public API and the command line driver

#![expect(clippy::unwrap_used)] // test code OK

mod common;

use common::{driver, interpreter_with_input};
use minischeme::Error;
use minischeme::ast::{Value, val};
use minischeme::run_source;
use pretty_assertions::assert_eq;
use std::io::Write;

/// Run a program with no console input and return its printed results
fn run(source: &str) -> Result<Vec<String>, Error> {
    let (mut interpreter, _) = interpreter_with_input("");
    run_source(source, &mut interpreter)
}

#[test]
fn test_program_results() {
    let cases: Vec<(&str, &[&str])> = vec![
        (
            "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 5)",
            &["120"],
        ),
        ("(/ 6 3) (/ 7 2) (/ 1.0 4) (/ 8)", &["2.0", "3.5", "0.25", "8"]),
        ("(/ 10 2 5) (/ 0 7)", &["1.0", "0.0"]),
        ("(+ 1 2.5) (* 2 2.0) (- 10 1 2) (- 3)", &["3.5", "4.0", "7", "-3"]),
        ("(<> 1 2 3) (<> 1 1) (< 1 2 3) (< 1 3 2)", &["#t", "#f", "#t", "#f"]),
        ("(= 1 1.0) (= 1 1 2) (<= 1 1 2) (> \"b\" \"a\")", &["#t", "#f", "#t", "#t"]),
        ("(cond (#f 1) (#t 2))", &["2"]),
        ("(null? '()) (null? '(1))", &["#t", "#f"]),
        ("(define xs (cons 1 '(2 3))) (car xs) (cdr xs)", &["1", "(2 3)"]),
        ("(define x 10) (let ((x 1) (y x)) y)", &["10"]),
        ("'(1 \"two\" #t (+ 1 2))", &["(1 two #t 3)"]),
        ("(define s \"hi\") s (and) (or)", &["hi", "#t", "#f"]),
        // Definitions and display produce no result lines
        ("(define a 1) (define (f) a) (display \"\")", &[]),
    ];

    for (source, expected) in cases {
        let lines = run(source).unwrap_or_else(|e| panic!("{source}: {e}"));
        assert_eq!(lines, expected.to_vec(), "{source}");
    }
}

#[test]
fn test_program_errors() {
    let cases = vec![
        ("(/ 1 0)", Error::DivisionByZero),
        ("(/ 1.5 0.0)", Error::DivisionByZero),
        ("(cond (#f 1) (#f 2))", Error::NoMatchingClause),
        ("(let ((x 1) (y x)) y)", Error::UnboundName("x".to_owned())),
        ("(undefined-fn 1)", Error::UnboundName("undefined-fn".to_owned())),
        (
            "(define e '()) (car e)",
            Error::EmptyList("car".to_owned()),
        ),
        ("(read)", Error::ReadError("end of input".to_owned())),
    ];
    for (source, expected) in cases {
        assert_eq!(run(source), Err(expected), "{source}");
    }

    for source in ["(+ 1 \"a\")", "(cons 1 2)", "(< 1 #t)", "(define x 1) (x)"] {
        assert!(
            matches!(run(source), Err(Error::TypeMismatch(_))),
            "{source}"
        );
    }
    for source in ["(+ 1 2", "(define (f x x) x)", "(car '(1))"] {
        assert!(matches!(run(source), Err(Error::ParseError(_))), "{source}");
    }
    assert!(matches!(
        run("(* 9223372036854775807 2)"),
        Err(Error::EvalError(_))
    ));
}

#[test]
fn test_deep_recursion() {
    let source = "(define (count n) (if (= n 0) 0 (+ 1 (count (- n 1))))) \
                  (count 85) (count 500) (count 3000)";
    assert_eq!(run(source).unwrap(), vec!["85", "500", "3000"]);
}

#[test]
fn test_function_leaves_globals_unchanged() {
    let (mut interpreter, output) = interpreter_with_input("");
    let source = r#"
        (define count 0)
        (define (shadow)
          (define count 99)
          (display count)
          count)
        (shadow)
        count
    "#;
    assert_eq!(run_source(source, &mut interpreter).unwrap(), vec!["99", "0"]);
    assert_eq!(output.contents(), "99");
}

#[test]
fn test_console_io() {
    let (mut interpreter, output) = interpreter_with_input("5\n2.5\nname\n");
    let source = r#"
        (define (ask prompt) (display prompt) (read))
        (define a (ask "a? "))
        (define b (ask "b? "))
        (display (+ a b))
        (newline)
        (display (ask "who? "))
        (newline)
    "#;
    assert_eq!(run_source(source, &mut interpreter).unwrap(), Vec::<String>::new());
    assert_eq!(output.contents(), "a? b? 7.5\nwho? name\n");
}

#[test]
fn test_session_survives_errors() {
    // The same interpreter keeps its bindings across failed inputs, like the REPL
    let (mut interpreter, _) = interpreter_with_input("");
    run_source("(define (double x) (* 2 x)) (define y 4)", &mut interpreter).unwrap();
    assert!(run_source("(double \"x\")", &mut interpreter).is_err());
    assert!(run_source("(double 1 2)", &mut interpreter).is_err());

    assert_eq!(
        run_source("(double y)", &mut interpreter).unwrap(),
        vec!["8"]
    );
    assert_eq!(interpreter.environment().get("y"), Some(&val(4)));
    assert!(matches!(
        interpreter.environment().get("double"),
        Some(Value::Function { .. })
    ));
}

#[test]
fn test_evaluate_stops_at_first_error() {
    let (mut interpreter, output) = interpreter_with_input("");
    let result = run_source(
        "(display 1) (car nothing) (display 2)",
        &mut interpreter,
    );
    assert_eq!(result, Err(Error::UnboundName("nothing".to_owned())));
    assert_eq!(output.contents(), "1");
}

#[test]
fn test_driver_runs_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "; sum two numbers from input\n\
         (define a (read))\n\
         (define b (read))\n\
         (display \"sum: \")\n\
         (display (+ a b))\n\
         (newline)\n\
         (+ a b)\n\
         (> a b)"
    )
    .unwrap();

    let output = driver(&[file.path().to_str().unwrap()], "3\n4\n");
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "sum: 7\n7\n#f\n");
    assert_eq!(String::from_utf8_lossy(&output.stderr), "");
}

#[test]
fn test_driver_reports_errors() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "(define x 1)\nx\n(/ x 0)").unwrap();

    let output = driver(&[file.path().to_str().unwrap()], "");
    assert_eq!(output.status.code(), Some(1));
    // Results are only printed once the whole file has evaluated
    assert_eq!(String::from_utf8_lossy(&output.stdout), "");
    assert!(
        String::from_utf8_lossy(&output.stderr).starts_with("Error: DivisionByZero"),
        "{output:?}"
    );

    let output = driver(&["/nonexistent/program.scm"], "");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_repl_with_piped_input() {
    let output = driver(&[], "(define x 2)\n(* x 21)\n:env\n(car x)\n(/ x 4)\n:quit\n");
    assert!(output.status.success(), "{output:?}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for expected in ["42\n", "x = 2\n", "Error: ", "0.5\n", "Goodbye!\n"] {
        assert!(stdout.contains(expected), "missing {expected:?} in {stdout}");
    }
}

#[test]
fn test_repl_exits_at_end_of_input() {
    // No :quit, the session ends when stdin closes
    let output = driver(&[], "(define (f) (display \"hi\"))\n(f)\n");
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("hi"), "{stdout}");
    assert!(stdout.ends_with("Goodbye!\n"), "{stdout}");
}

#[test]
fn test_repl_read_shares_stdin() {
    // `read` takes the next line of stdin after the line editor's own input
    let output = driver(&[], "(+ (read) 1)\n41\n:quit\n");
    assert!(output.status.success(), "{output:?}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("42\n"));
}
