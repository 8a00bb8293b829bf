//! Lexically scoped environments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::Value;

/// A chain of binding frames.
///
/// Cloning an `Env` aliases the same frame, so closures and goals that
/// captured an environment observe later `define`s in it. `set` always
/// binds in the local frame and never mutates a parent.
#[derive(Clone, Default)]
pub struct Env {
    frame: Rc<Frame>,
}

#[derive(Default)]
struct Frame {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    /// A fresh frame whose lookups fall back to `self`.
    pub fn child(&self) -> Self {
        Env {
            frame: Rc::new(Frame {
                vars: RefCell::new(HashMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Bind `name` in the local frame, shadowing any outer binding.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.frame.vars.borrow_mut().insert(name.into(), value);
    }

    /// Look `name` up, walking the frame chain outwards.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.frame.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.frame.parent.as_ref()?.get(name)
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vars = self.frame.vars.borrow();
        let mut names: Vec<&String> = vars.keys().collect();
        names.sort();
        write!(f, "{{")?;
        for (i, name) in names.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}:{}", vars[*name])?;
        }
        write!(f, "}}")
    }
}
