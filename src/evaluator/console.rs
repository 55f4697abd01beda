use crate::Error;
use crate::ast::{FloatType, IntegerType, Value};
use std::fmt;
use std::io::{self, BufRead, Write};

/// Input and output streams used by `read`, `display` and `newline`.
///
/// The interpreter owns exactly one console. [`Console::stdio`] connects it to the
/// process's standard streams; [`Console::new`] accepts any reader and writer, which
/// is how tests feed input and capture output.
pub struct Console {
    input: Input,
    output: Box<dyn Write>,
}

enum Input {
    /// Process stdin, locked only for the duration of each read so a line editor
    /// can share it
    Stdin,
    Reader(Box<dyn BufRead>),
}

impl Input {
    fn read_line(&mut self, line: &mut String) -> io::Result<usize> {
        match self {
            Input::Stdin => io::stdin().read_line(line),
            Input::Reader(reader) => reader.read_line(line),
        }
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Console")
    }
}

impl Console {
    pub fn new(input: impl BufRead + 'static, output: impl Write + 'static) -> Self {
        Console {
            input: Input::Reader(Box::new(input)),
            output: Box::new(output),
        }
    }

    /// Console bound to standard input and standard output
    pub fn stdio() -> Self {
        Console {
            input: Input::Stdin,
            output: Box::new(io::stdout()),
        }
    }

    /// Write a value's textual form with no trailing newline
    pub fn write_value(&mut self, value: &Value) -> Result<(), Error> {
        write!(self.output, "{value}").map_err(output_error)?;
        // Flush so prompts show up before a following blocking read
        self.output.flush().map_err(output_error)
    }

    pub fn newline(&mut self) -> Result<(), Error> {
        writeln!(self.output).map_err(output_error)?;
        self.output.flush().map_err(output_error)
    }

    /// Block until one line of input is available and convert it to a value.
    /// End of input is a `ReadError`.
    pub fn read_value(&mut self) -> Result<Value, Error> {
        let mut line = String::new();
        let bytes = self
            .input
            .read_line(&mut line)
            .map_err(|e| Error::ReadError(format!("failed to read input: {e}")))?;
        if bytes == 0 {
            return Err(Error::ReadError("end of input".to_owned()));
        }

        let line = line
            .strip_suffix('\n')
            .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
            .unwrap_or(line.as_str());
        Ok(parse_input_line(line))
    }
}

fn output_error(err: io::Error) -> Error {
    Error::EvalError(format!("failed to write output: {err}"))
}

/// All decimal digits: integer. Otherwise anything that parses as a float: float.
/// Otherwise the raw text.
pub(crate) fn parse_input_line(line: &str) -> Value {
    if !line.is_empty()
        && line.chars().all(|c| c.is_ascii_digit())
        && let Ok(n) = line.parse::<IntegerType>()
    {
        return Value::Integer(n);
    }

    match line.trim().parse::<FloatType>() {
        Ok(n) => Value::Float(n),
        Err(_) => Value::String(line.to_owned()),
    }
}
