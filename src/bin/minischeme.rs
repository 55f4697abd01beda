//! Mini-Scheme command line: run a source file, or start an interactive session

use minischeme::ast::Value;
use minischeme::evaluator::{Environment, Interpreter};
use minischeme::run_source;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Once;
use std::{env, fs, process};

static TRACING_INIT: Once = Once::new();

/// Install a stderr subscriber when `RUST_LOG` is set, e.g.
/// `RUST_LOG=minischeme=debug` for definitions or `=trace` for every call.
fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        if env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}

fn print_usage() {
    eprintln!("Usage: minischeme [file.scm]");
    eprintln!();
    eprintln!("With a file, evaluates it and prints each result.");
    eprintln!("Without one, starts an interactive session.");
}

fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    match args.as_slice() {
        [_] => run_repl(),
        [_, flag] if matches!(flag.as_str(), "-h" | "--help" | "help") => print_usage(),
        [_, path] => run_file(path),
        _ => {
            print_usage();
            process::exit(2);
        }
    }
}

/// Evaluate a whole file, print its results, exit 1 on the first error
fn run_file(path: &str) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: cannot read {path}: {err}");
            process::exit(1);
        }
    };

    let mut interpreter = Interpreter::new();
    match run_source(&source, &mut interpreter) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
        }
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    }
}

fn run_repl() {
    println!("Mini-Scheme interpreter");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Error: could not initialize line editor: {err}");
            process::exit(1);
        }
    };
    let mut interpreter = Interpreter::new();

    loop {
        match rl.readline("mini-scheme> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(interpreter.environment());
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // Definitions made before an error stay in the environment
                match run_source(line, &mut interpreter) {
                    Ok(lines) => {
                        for line in lines {
                            println!("{line}");
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Mini-Scheme commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current variable and function bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("Language:");
    println!("  Literals: 42, -1.5, #t, #f, \"text\", '(1 2 3)");
    println!("  Arithmetic: +, -, *, /");
    println!("  Comparison: =, <>, <, >, <=, >=");
    println!("  Logic: and, or, not");
    println!("  Lists: cons, car, cdr, null?");
    println!("  Console: display, newline, read");
    println!("  Forms: define, if, cond, let");
    println!();
    println!("Examples:");
    println!("  (define (square x) (* x x))");
    println!("  (square 12)");
    println!("  (let ((a 1) (b 2)) (+ a b))");
    println!("  (cond ((> 2 1) \"yes\") (#t \"no\"))");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    let (functions, values): (Vec<_>, Vec<_>) = bindings
        .into_iter()
        .partition(|(_, value)| matches!(value, Value::Function { .. }));

    if !functions.is_empty() {
        println!("Functions ({}):", functions.len());
        for (name, value) in functions {
            if let Value::Function { params, .. } = value {
                let signature: String = params.iter().map(|p| format!(" {p}")).collect();
                println!("  ({name}{signature})");
            }
        }
    }

    if !values.is_empty() {
        println!("Variables ({}):", values.len());
        for (name, value) in values {
            println!("  {name} = {value}");
        }
    }
}
