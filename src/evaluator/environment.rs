use crate::ast::Value;
use std::collections::HashMap;

/// Variable and function bindings, organised as a stack of scope frames.
///
/// Observably this is one flat table: lookups see the most recent binding of a
/// name anywhere on the stack. Every function call and every `let` pushes a frame
/// for its own bindings, and `define` always writes into the top frame, so popping
/// the frame undoes everything the call or `let` bound or rebound.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Frame 0 holds global bindings and is never popped
    frames: Vec<HashMap<String, Value>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            frames: vec![HashMap::new()],
        }
    }

    /// Bind `name` in the innermost frame, replacing any binding it already has there
    pub(crate) fn define(&mut self, name: String, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value);
        }
    }

    /// Look a name up, innermost frame first
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Enter a new scope whose initial bindings shadow everything below it
    pub(crate) fn push_frame(&mut self, bindings: HashMap<String, Value>) {
        self.frames.push(bindings);
    }

    /// Leave the innermost scope, discarding its bindings. The global frame stays.
    pub(crate) fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "attempted to pop the global frame");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of frames currently on the stack, including the global frame
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Get all visible bindings, innermost binding of each name winning.
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = HashMap::new();

        // Outer frames first so inner bindings override them
        for frame in &self.frames {
            for (name, value) in frame {
                bindings.insert(name.clone(), value.clone());
            }
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}
