//! Runtime callables: user functions, native bindings, classes, instances and
//! traits.  Property-access semantics (field vs. method vs. getter) live in
//! the interpreter; this module owns construction, binding and invocation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::interpreter::{Interpreter, Signal};
use crate::value::Value;

/// Native functions receive the interpreter (for I/O) and the evaluated
/// arguments.  A `String` error is attributed to the call site by the caller.
pub type NativeFn = fn(&mut Interpreter, &[Value]) -> std::result::Result<Value, String>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn: {}>", self.name)
    }
}

/// A user-defined function, method or lambda together with its captured
/// closure environment.
pub struct LoxFunction {
    pub name: Option<String>,
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
    pub is_getter: bool,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a copy of this function whose closure is extended with `this`.
    /// `this` is an instance for ordinary methods and the class value itself
    /// for class methods.
    pub fn bind(&self, this: Value) -> LoxFunction {
        let environment: Rc<RefCell<Environment>> = Rc::new(RefCell::new(
            Environment::with_enclosing(Rc::clone(&self.closure)),
        ));

        environment.borrow_mut().define("this", this);

        LoxFunction {
            name: self.name.clone(),
            declaration: Rc::clone(&self.declaration),
            closure: environment,
            is_initializer: self.is_initializer,
            is_getter: self.is_getter,
        }
    }

    /// Invoke with already-evaluated arguments.  `line` attributes internal
    /// failures to the call site.  Arity has been checked by the caller.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!(
            "Calling <fn {}> with {} argument(s)",
            self.name.as_deref().unwrap_or("anonymous"),
            arguments.len()
        );

        let environment: Rc<RefCell<Environment>> = Rc::new(RefCell::new(
            Environment::with_enclosing(Rc::clone(&self.closure)),
        ));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        let signal: Signal = interpreter.execute_block(&self.declaration.body, environment)?;

        let value: Value = match signal {
            Signal::Return(value) => value,

            Signal::Normal => Value::Nil,

            // The resolver rejects `break`/`continue` that would cross a
            // function boundary, so these cannot reach a call frame.
            Signal::Break | Signal::Continue => {
                return Err(LoxError::runtime(
                    line,
                    "Mismatch between resolved and runtime scopes",
                ));
            }
        };

        if self.is_initializer {
            // A bound initializer's closure holds `this` directly; the return
            // value (always bare) is replaced by the instance.
            return match self.closure.borrow().get("this") {
                Some(this) => Ok(this),
                None => Err(LoxError::runtime(
                    line,
                    "Mismatch between resolved and runtime scopes",
                )),
            };
        }

        Ok(value)
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name),
            None => write!(f, "<fn>"),
        }
    }
}

pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
    pub class_methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Instance-method lookup through the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Class-method lookup, also inherited.
    pub fn find_class_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.class_methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_class_method(name))
    }

    /// Constructor arity is the arity of `init`, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map_or(0, |initializer| initializer.arity())
    }

    /// Calling a class constructs an instance and runs `init` when present.
    pub fn call(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!("Instantiating class '{}'", class.name);

        let instance: Rc<RefCell<LoxInstance>> =
            Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));

        if let Some(initializer) = class.find_method("init") {
            initializer
                .bind(Value::Instance(Rc::clone(&instance)))
                .call(interpreter, arguments, line)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }
}

impl fmt::Debug for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance <class {}>>", self.class.name)
    }
}

/// A named bundle of methods.  Not callable, not instantiable; consumed by
/// `use` clauses which copy the method tables at definition time.
pub struct LoxTrait {
    pub name: String,
    pub methods: HashMap<String, Rc<LoxFunction>>,
    pub class_methods: HashMap<String, Rc<LoxFunction>>,
}

impl fmt::Debug for LoxTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<trait {}>", self.name)
    }
}
