use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// Lexical variable storage.  Environments form a parent-linked chain shared
/// through `Rc<RefCell<..>>` so closures can keep their defining scope alive.
#[derive(Debug, Clone, Default)]
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

    /// Introduce (or overwrite) a binding in this environment.  `value` may be
    /// the undefined sentinel for `var` declarations without initialiser.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Chain-walking lookup, used for names the resolver classified as global.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            None
        }
    }

    /// Chain-walking assignment.  Returns false when the name is absent from
    /// the whole chain.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);
            true
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    /// Walk exactly `distance` parent links.  The resolver guarantees the
    /// chain is at least that deep; a short chain stops at the last frame.
    fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let parent: Option<Rc<RefCell<Environment>>> = current.borrow().enclosing.clone();

            match parent {
                Some(enclosing) => current = enclosing,
                None => break,
            }
        }

        current
    }

    /// Read a resolved local at its annotated depth.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Option<Value> {
        Self::ancestor(env, distance).borrow().values.get(name).cloned()
    }

    /// Write a resolved local at its annotated depth.  Returns false when the
    /// slot does not exist at that depth.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
    ) -> bool {
        let target: Rc<RefCell<Environment>> = Self::ancestor(env, distance);
        let mut target = target.borrow_mut();

        if target.values.contains_key(name) {
            target.values.insert(name.to_string(), value);
            true
        } else {
            false
        }
    }
}
