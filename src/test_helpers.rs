//! Shared fixtures for unit tests that exercise console I/O.

use crate::evaluator::{Console, Interpreter};
use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

/// Writer whose contents stay readable after a console takes ownership of it
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

/// Interpreter reading `input` line by line and writing into the returned buffer
pub(crate) fn interpreter_with_input(input: &str) -> (Interpreter, SharedBuffer) {
    let output = SharedBuffer::default();
    let console = Console::new(Cursor::new(input.to_owned()), output.clone());
    (Interpreter::with_console(console), output)
}
