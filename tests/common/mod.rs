//! Helpers shared by the integration tests

use minischeme::evaluator::{Console, Interpreter};
use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::process::{Command, Output, Stdio};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Output sink that stays readable after the interpreter takes its clone
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

pub fn interpreter_with_input(input: &str) -> (Interpreter, SharedBuffer) {
    let output = SharedBuffer::default();
    let console = Console::new(Cursor::new(input.to_owned()), output.clone());
    (Interpreter::with_console(console), output)
}

/// Run the command line binary with piped stdin. Panics if it has not exited
/// within ten seconds so a blocked process fails the test instead of hanging it.
pub fn driver(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_minischeme"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();

    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let _ = sender.send(child.wait_with_output());
    });
    receiver
        .recv_timeout(Duration::from_secs(10))
        .unwrap_or_else(|_| panic!("minischeme {args:?} did not exit"))
        .unwrap()
}
