use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{LoxError, Result};
use crate::value::Value;

/// A single frame in the environment chain: a name→value map plus a link to
/// the enclosing frame.  The chain outlives its syntactic scope whenever a
/// closure captures it.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Unconditional write in this frame.  Redefinition is permitted; class
    /// declarations rely on it (the name is defined as `nil` first, then
    /// assigned the finished class object).
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}'", name);

        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);

            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// The frame exactly `distance` enclosing links above `env`.
    /// `distance == 0` is `env` itself.
    fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut frame = Rc::clone(env);

        for _ in 0..distance {
            let next = frame.borrow().enclosing.clone()?;

            frame = next;
        }

        Some(frame)
    }

    /// Read `name` in the frame `distance` links up.  The resolver guarantees
    /// the frame exists and contains the name; a miss is still surfaced as an
    /// ordinary undefined-variable error rather than a panic.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        match Self::ancestor(env, distance) {
            Some(frame) => {
                let frame = frame.borrow();

                match frame.values.get(name) {
                    Some(value) => Ok(value.clone()),

                    None => Err(LoxError::runtime(
                        line,
                        format!("Undefined variable '{}'.", name),
                    )),
                }
            }

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }

    /// Write `name` in the frame `distance` links up.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        match Self::ancestor(env, distance) {
            Some(frame) => {
                frame.borrow_mut().values.insert(name.to_string(), value);

                Ok(())
            }

            None => Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            )),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
