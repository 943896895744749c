//! Tree-walking evaluator.
//!
//! Statements produce a [`Signal`] describing how control left them: normal
//! completion, `break`/`continue` (caught by the nearest enclosing loop) or
//! `return` (caught by the call frame).  Runtime failures travel separately in
//! the `Err` channel, so control flow is never conflated with errors.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use rand::Rng;

use crate::ast::{Expr, ExprId, FunctionKind, LiteralValue, MethodDecl, Stmt};
use crate::callable::{LoxClass, LoxFunction, LoxInstance, LoxTrait, NativeFunction};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug)]
pub enum Signal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Build an interpreter writing `print` output to the given sink.  Tests
    /// pass an in-memory buffer here.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        let globals: Rc<RefCell<Environment>> = Rc::new(RefCell::new(Environment::new()));

        {
            let mut env = globals.borrow_mut();

            env.define(
                "clock",
                Value::Native(Rc::new(NativeFunction {
                    name: "clock",
                    arity: 0,
                    func: clock_native,
                })),
            );

            env.define(
                "input",
                Value::Native(Rc::new(NativeFunction {
                    name: "input",
                    arity: 1,
                    func: input_native,
                })),
            );

            env.define(
                "randint",
                Value::Native(Rc::new(NativeFunction {
                    name: "randint",
                    arity: 2,
                    func: randint_native,
                })),
            );
        }

        info!("Interpreter initialized with native functions");

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolver protocol
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a variable occurrence as a local at hop distance `depth`.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local binding: id={}, depth={}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Record a variable occurrence as a global (no annotation needed).
    pub fn note_global(&mut self, id: ExprId) {
        debug!("Noting global binding: id={}", id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────────

    /// Run a resolved program.  Top-level signals cannot occur (the resolver
    /// rejects stray `return`/`break`/`continue`), so only errors surface.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        for statement in statements {
            self.execute(statement)?;
        }

        Ok(())
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(Signal::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output.borrow_mut(), "{}", value)?;

                Ok(Signal::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Undefined,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(Signal::Normal)
            }

            Stmt::Block(statements) => {
                let environment: Rc<RefCell<Environment>> = Rc::new(RefCell::new(
                    Environment::with_enclosing(Rc::clone(&self.environment)),
                ));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body)? {
                        Signal::Break => break,

                        Signal::Normal | Signal::Continue => {}

                        ret @ Signal::Return(_) => return Ok(ret),
                    }
                }

                Ok(Signal::Normal)
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // The initializer gets its own scope, restored on all paths.
                let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

                self.environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &previous,
                ))));

                let result: Result<Signal> =
                    self.run_for(initializer.as_deref(), condition.as_ref(), increment.as_ref(), body);

                self.environment = previous;

                result
            }

            Stmt::Break(_) => Ok(Signal::Break),

            Stmt::Continue(_) => Ok(Signal::Continue),

            Stmt::Function {
                name, declaration, ..
            } => {
                let function = LoxFunction {
                    name: Some(name.lexeme.clone()),
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                    is_getter: false,
                };

                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Function(Rc::new(function)));

                Ok(Signal::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Signal::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                traits,
                methods,
            } => self.execute_class(name, superclass.as_ref(), traits, methods),

            Stmt::Trait {
                name,
                traits,
                methods,
            } => self.execute_trait(name, traits, methods),
        }
    }

    fn run_for(
        &mut self,
        initializer: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
    ) -> Result<Signal> {
        if let Some(init) = initializer {
            self.execute(init)?;
        }

        loop {
            if let Some(cond) = condition {
                if !is_truthy(&self.evaluate(cond)?) {
                    break;
                }
            }

            let signal: Signal = self.execute(body)?;

            // The increment runs after every body completion, including the
            // `continue` and `break` paths (`for` is not desugared).
            if let Some(inc) = increment {
                self.evaluate(inc)?;
            }

            match signal {
                Signal::Break => break,

                Signal::Normal | Signal::Continue => {}

                ret @ Signal::Return(_) => return Ok(ret),
            }
        }

        Ok(Signal::Normal)
    }

    /// Execute `statements` inside `environment`, restoring the previous
    /// environment pointer on every exit path.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Signal> {
        let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        self.environment = environment;

        let mut signal: Signal = Signal::Normal;

        for statement in statements {
            match self.execute(statement) {
                Ok(Signal::Normal) => {}

                Ok(other) => {
                    signal = other;
                    break;
                }

                Err(e) => {
                    self.environment = previous;
                    return Err(e);
                }
            }
        }

        self.environment = previous;

        Ok(signal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Class and trait definition
    // ─────────────────────────────────────────────────────────────────────────

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        traits: &[Expr],
        methods: &[MethodDecl],
    ) -> Result<Signal> {
        info!("Defining class '{}'", name.lexeme);

        // 1. Evaluate the superclass expression, which must name a class.
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    return Err(LoxError::runtime(
                        superclass_line(expr, name),
                        "Superclass must be a class",
                    ));
                }
            },

            None => None,
        };

        // 2. Make the class name visible (as nil) so methods can refer to it.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // 3. Method closures of a subclass capture `super` via an extra frame.
        let previous: Rc<RefCell<Environment>> = Rc::clone(&self.environment);

        if let Some(sc) = &superclass_value {
            let env: Rc<RefCell<Environment>> = Rc::new(RefCell::new(
                Environment::with_enclosing(Rc::clone(&self.environment)),
            ));

            env.borrow_mut()
                .define("super", Value::Class(Rc::clone(sc)));

            self.environment = env;
        }

        // 4. Stage methods copied in from used traits, then overlay the body's
        //    own members (the class wins on conflict).
        let staged = self.use_traits(traits);

        let (mut methods_map, mut class_methods_map) = match staged {
            Ok(maps) => maps,

            Err(e) => {
                self.environment = previous;
                return Err(e);
            }
        };

        for method in methods {
            let function = Rc::new(self.make_method(method));

            if method.kind == FunctionKind::ClassMethod {
                class_methods_map.insert(method.name.lexeme.clone(), function);
            } else {
                methods_map.insert(method.name.lexeme.clone(), function);
            }
        }

        let class = Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: methods_map,
            class_methods: class_methods_map,
        });

        // 5. Pop the `super` frame and fill the placeholder binding.
        self.environment = previous;

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(class));

        Ok(Signal::Normal)
    }

    fn execute_trait(
        &mut self,
        name: &Token,
        traits: &[Expr],
        methods: &[MethodDecl],
    ) -> Result<Signal> {
        info!("Defining trait '{}'", name.lexeme);

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        let (mut methods_map, mut class_methods_map) = self.use_traits(traits)?;

        // Unlike classes, a trait's own member clashing with a used trait's
        // member is a definition error rather than an override.
        for method in methods {
            let (map, what) = if method.kind == FunctionKind::ClassMethod {
                (&mut class_methods_map, "class method")
            } else {
                (&mut methods_map, "method")
            };

            if map.contains_key(&method.name.lexeme) {
                return Err(LoxError::runtime(
                    method.name.line,
                    format!(
                        "A previously used trait already provides {} '{}'",
                        what, method.name.lexeme
                    ),
                ));
            }

            map.insert(method.name.lexeme.clone(), Rc::new(self.make_method(method)));
        }

        let lox_trait = Rc::new(LoxTrait {
            name: name.lexeme.clone(),
            methods: methods_map,
            class_methods: class_methods_map,
        });

        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Trait(lox_trait));

        Ok(Signal::Normal)
    }

    fn make_method(&self, method: &MethodDecl) -> LoxFunction {
        LoxFunction {
            name: Some(method.name.lexeme.clone()),
            declaration: Rc::clone(&method.declaration),
            closure: Rc::clone(&self.environment),
            is_initializer: method.kind == FunctionKind::Initializer,
            is_getter: method.kind == FunctionKind::Getter,
        }
    }

    /// Merge the method tables of every trait named in a `use` list.  A name
    /// provided by two used traits is a definition-time error.
    #[allow(clippy::type_complexity)]
    fn use_traits(
        &mut self,
        traits: &[Expr],
    ) -> Result<(
        HashMap<String, Rc<LoxFunction>>,
        HashMap<String, Rc<LoxFunction>>,
    )> {
        let mut methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();
        let mut class_methods: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for trait_expr in traits {
            let (trait_name, line) = match trait_expr {
                Expr::Variable { name, .. } => (name.lexeme.clone(), name.line),
                _ => (String::from("trait"), 0),
            };

            let lox_trait: Rc<LoxTrait> = match self.evaluate(trait_expr)? {
                Value::Trait(t) => t,

                _ => {
                    return Err(LoxError::runtime(
                        line,
                        format!("'{}' is not a trait", trait_name),
                    ));
                }
            };

            for (method_name, function) in &lox_trait.methods {
                if methods.contains_key(method_name) {
                    return Err(LoxError::runtime(
                        line,
                        format!(
                            "A previously used trait already provides method '{}'",
                            method_name
                        ),
                    ));
                }

                methods.insert(method_name.clone(), Rc::clone(function));
            }

            for (method_name, function) in &lox_trait.class_methods {
                if class_methods.contains_key(method_name) {
                    return Err(LoxError::runtime(
                        line,
                        format!(
                            "A previously used trait already provides class method '{}'",
                            method_name
                        ),
                    ));
                }

                class_methods.insert(method_name.clone(), Rc::clone(function));
            }
        }

        Ok((methods, class_methods))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                // Short-circuit: yield the deciding operand itself.
                if operator.token_type == TokenType::OR {
                    if is_truthy(&left_val) {
                        return Ok(left_val);
                    }
                } else if !is_truthy(&left_val) {
                    return Ok(left_val);
                }

                self.evaluate(right)
            }

            Expr::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(on_true)
                } else {
                    self.evaluate(on_false)
                }
            }

            Expr::Variable { id, name } => self.lookup_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                let assigned: bool = match self.locals.get(id) {
                    Some(distance) => Environment::assign_at(
                        &self.environment,
                        *distance,
                        &name.lexeme,
                        value.clone(),
                    ),

                    None => self.globals.borrow_mut().assign(&name.lexeme, value.clone()),
                };

                if !assigned {
                    return Err(LoxError::runtime(
                        name.line,
                        format!("Undefined variable '{}'", name.lexeme),
                    ));
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => self.evaluate_get(object, name),

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object: Value = self.evaluate(object)?;

                let instance: Rc<RefCell<LoxInstance>> = match object {
                    Value::Instance(instance) => instance,

                    _ => {
                        return Err(LoxError::runtime(
                            name.line,
                            "Cannot set property, not an instance",
                        ));
                    }
                };

                let value: Value = self.evaluate(value)?;

                instance
                    .borrow_mut()
                    .fields
                    .insert(name.lexeme.clone(), value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.lookup_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),

            Expr::Lambda { declaration } => Ok(Value::Function(Rc::new(LoxFunction {
                name: None,
                declaration: Rc::clone(declaration),
                closure: Rc::clone(&self.environment),
                is_initializer: false,
                is_getter: false,
            }))),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operand must be a number.",
                )),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime(operator.line, "Invalid unary operator")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                // One string operand turns `+` into concatenation.
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Ok(Value::Str(format!("{}{}", left_val, right_val)))
                }

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings",
                )),
            },

            TokenType::MINUS => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;
                Ok(Value::Number(a * b))
            }

            TokenType::SLASH => {
                let (a, b) = number_operands(operator, &left_val, &right_val)?;

                if b == 0.0 {
                    Err(LoxError::runtime(operator.line, "Division by zero"))
                } else {
                    Ok(Value::Number(a / b))
                }
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_val, &right_val))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_val, &right_val))),

            TokenType::GREATER | TokenType::GREATER_EQUAL | TokenType::LESS
            | TokenType::LESS_EQUAL => self.evaluate_comparison(operator, &left_val, &right_val),

            TokenType::COMMA => Ok(right_val),

            _ => Err(LoxError::runtime(operator.line, "Invalid binary operator")),
        }
    }

    /// Ordering is defined within numbers, strings and booleans only
    /// (`false < true`); cross-type comparisons are runtime errors.
    fn evaluate_comparison(
        &self,
        operator: &Token,
        left: &Value,
        right: &Value,
    ) -> Result<Value> {
        let result: bool = match (left, right) {
            (Value::Number(a), Value::Number(b)) => compare(&operator.token_type, a, b),

            (Value::Str(a), Value::Str(b)) => compare(&operator.token_type, a, b),

            (Value::Bool(a), Value::Bool(b)) => compare(&operator.token_type, a, b),

            (a, b) if std::mem::discriminant(a) != std::mem::discriminant(b) => {
                return Err(LoxError::runtime(
                    operator.line,
                    "Cannot compare, expressions are of different types",
                ));
            }

            _ => {
                return Err(LoxError::runtime(
                    operator.line,
                    "Cannot compare, type is not orderable",
                ));
            }
        };

        Ok(Value::Bool(result))
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) -> Result<Value> {
        let callee_val: Value = self.evaluate(callee)?;

        let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        let arity: usize = match &callee_val {
            Value::Native(function) => function.arity,
            Value::Function(function) => function.arity(),
            Value::Class(class) => class.arity(),

            _ => {
                return Err(LoxError::runtime(
                    paren.line,
                    "Can only call functions and classes",
                ));
            }
        };

        if args.len() != arity {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}", arity, args.len()),
            ));
        }

        match callee_val {
            Value::Native(function) => {
                (function.func)(self, &args).map_err(|msg| LoxError::runtime(paren.line, msg))
            }

            Value::Function(function) => function.call(self, args, paren.line),

            Value::Class(class) => LoxClass::call(&class, self, args, paren.line),

            _ => Err(LoxError::runtime(
                paren.line,
                "Can only call functions and classes",
            )),
        }
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> Result<Value> {
        let object: Value = self.evaluate(object)?;

        match object {
            Value::Instance(instance) => {
                let field: Option<Value> = instance.borrow().fields.get(&name.lexeme).cloned();

                if let Some(value) = field {
                    return Ok(value);
                }

                let class: Rc<LoxClass> = Rc::clone(&instance.borrow().class);

                if let Some(method) = class.find_method(&name.lexeme) {
                    let bound: LoxFunction = method.bind(Value::Instance(Rc::clone(&instance)));

                    // Getters run immediately on access.
                    if bound.is_getter {
                        return bound.call(self, Vec::new(), name.line);
                    }

                    return Ok(Value::Function(Rc::new(bound)));
                }

                Err(LoxError::runtime(
                    name.line,
                    format!("Undefined property '{}'", name.lexeme),
                ))
            }

            Value::Class(class) => {
                if let Some(method) = class.find_class_method(&name.lexeme) {
                    let bound: LoxFunction = method.bind(Value::Class(Rc::clone(&class)));

                    return Ok(Value::Function(Rc::new(bound)));
                }

                Err(LoxError::runtime(
                    name.line,
                    format!("Undefined property '{}'", name.lexeme),
                ))
            }

            _ => Err(LoxError::runtime(
                name.line,
                "Cannot get property, not an instance",
            )),
        }
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = match self.locals.get(&id) {
            Some(distance) => *distance,

            None => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Mismatch between resolved and runtime scopes",
                ));
            }
        };

        let superclass: Rc<LoxClass> =
            match Environment::get_at(&self.environment, distance, "super") {
                Some(Value::Class(class)) => class,

                _ => {
                    return Err(LoxError::runtime(
                        keyword.line,
                        "Mismatch between resolved and runtime scopes",
                    ));
                }
            };

        // `this` sits one environment closer than `super`.
        let object: Value = match Environment::get_at(&self.environment, distance - 1, "this") {
            Some(value) => value,

            None => {
                return Err(LoxError::runtime(
                    keyword.line,
                    "Mismatch between resolved and runtime scopes",
                ));
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(object)))),

            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'", method.lexeme),
            )),
        }
    }

    fn lookup_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        let value: Option<Value> = match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, &name.lexeme),
            None => self.globals.borrow().get(&name.lexeme),
        };

        match value {
            Some(Value::Undefined) => Err(LoxError::runtime(
                name.line,
                format!("Access of uninitialized variable '{}'", name.lexeme),
            )),

            Some(value) => Ok(value),

            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined variable '{}'", name.lexeme),
            )),
        }
    }

    pub(crate) fn output(&self) -> Rc<RefCell<dyn Write>> {
        Rc::clone(&self.output)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value helpers
// ─────────────────────────────────────────────────────────────────────────────

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Nil | Value::Bool(false))
}

/// Same-variant structural equality; reference types compare by identity.
/// Cross-variant pairs are never equal.
fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,

        (Value::Bool(a), Value::Bool(b)) => a == b,

        (Value::Number(a), Value::Number(b)) => a == b,

        (Value::Str(a), Value::Str(b)) => a == b,

        (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),

        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),

        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

        (Value::Trait(a), Value::Trait(b)) => Rc::ptr_eq(a, b),

        _ => false,
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),

        _ => Err(LoxError::runtime(
            operator.line,
            "Operands must be numbers.",
        )),
    }
}

fn compare<T: PartialOrd>(operator: &TokenType, a: T, b: T) -> bool {
    match operator {
        TokenType::GREATER => a > b,
        TokenType::GREATER_EQUAL => a >= b,
        TokenType::LESS => a < b,
        TokenType::LESS_EQUAL => a <= b,
        _ => false,
    }
}

fn superclass_line(expr: &Expr, class_name: &Token) -> usize {
    match expr {
        Expr::Variable { name, .. } => name.line,
        _ => class_name.line,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Native functions
// ─────────────────────────────────────────────────────────────────────────────

fn clock_native(
    _interpreter: &mut Interpreter,
    _args: &[Value],
) -> std::result::Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}

fn input_native(
    interpreter: &mut Interpreter,
    args: &[Value],
) -> std::result::Result<Value, String> {
    let prompt: String = match &args[0] {
        Value::Str(s) => s.clone(),
        _ => return Err("Invalid arguments for input(), expected (string)".to_string()),
    };

    {
        let output = interpreter.output();
        let mut out = output.borrow_mut();

        write!(out, "{}", prompt).map_err(|e| e.to_string())?;
        out.flush().map_err(|e| e.to_string())?;
    }

    let mut line: String = String::new();

    io::stdin()
        .read_line(&mut line)
        .map_err(|e| e.to_string())?;

    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }

    Ok(Value::Str(line))
}

fn randint_native(
    _interpreter: &mut Interpreter,
    args: &[Value],
) -> std::result::Result<Value, String> {
    let (min, max): (f64, f64) = match (&args[0], &args[1]) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => return Err("Invalid arguments for randint(), expected (number, number)".to_string()),
    };

    let (min, max): (i64, i64) = (min as i64, max as i64);

    if min > max {
        return Err("Invalid range for randint(), min is greater than max".to_string());
    }

    let n: i64 = rand::thread_rng().gen_range(min..=max);

    Ok(Value::Number(n as f64))
}
