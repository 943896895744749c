//! Static resolution pass for the Lox interpreter.
//!
//! This module performs a single AST walk to:
//! 1. **Build lexical scopes**: maintains a stack of maps tracking declared,
//!    fully defined and used names in each nested block or function.
//! 2. **Enforce static rules**: reports errors such as redeclaration in the same
//!    scope, reading a variable in its own initializer, invalid `return` outside
//!    functions, `break`/`continue` outside loops, illegal `this`/`super`, and
//!    locals that are never read.
//! 3. **Record binding distances**: for every variable occurrence (`Variable`,
//!    `Assign`, `This`, `Super`), calls back into the interpreter to note
//!    whether it is a local (and at what depth) or a global. This enables the
//!    runtime to perform O(1) lookups by climbing exactly the right number of
//!    environment frames.
//!
//! # Error Recovery
//!
//! No in-place recovery: resolution halts on the first static error, returning
//! a `LoxError::Resolve`.
//!
//! # Usage
//!
//! After parsing, before interpretation, invoke:
//! ```ignore
//! let mut resolver = Resolver::new(&mut interpreter);
//! resolver.resolve(&statements)?;
//! ```

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, FunctionKind, MethodDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::token::Token;

/// Are we inside a user function?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,

    /// Inside a trait declaration (`this` is valid, `super` is not)
    Trait,
}

/// Per-name bookkeeping within one scope.
#[derive(Debug, Copy, Clone)]
struct Binding {
    defined: bool,
    used: bool,

    /// Parameters and the synthetic `this`/`super` are allowed to go unused.
    exempt: bool,

    line: usize,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, Binding>>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Class {
                name,
                superclass,
                traits,
                methods,
            } => {
                // 1. Self‑inheritance guard
                if let Some(Expr::Variable {
                    name: super_name, ..
                }) = superclass
                {
                    if super_name.lexeme == name.lexeme {
                        return Err(LoxError::resolve(
                            super_name.line,
                            "A class can't inherit from itself.",
                        ));
                    }
                }

                // 2. Declare & define the class name so methods can refer to it
                self.declare(name)?;
                self.define(name);

                // 3. Save and enter the class context
                let enclosing_class: ClassType = self.current_class;

                self.current_class = if superclass.is_some() {
                    ClassType::Subclass
                } else {
                    ClassType::Class
                };

                // 4. If there is a superclass, resolve it and bind `super`
                if let Some(super_expr) = superclass {
                    self.resolve_expr(super_expr)?;

                    self.begin_scope();
                    self.insert_synthetic("super", name.line);
                }

                // 5. Resolve the names consumed by `use` clauses
                for trait_expr in traits {
                    self.resolve_expr(trait_expr)?;
                }

                // 6. Open the implicit `this` scope for methods.  Class
                //    methods resolve here too: they see the class object
                //    itself bound to `this`.
                self.begin_scope();
                self.insert_synthetic("this", name.line);

                // 7. Resolve each member in its own function context.  Member
                //    names are properties, not variables, so they are not
                //    declared in any scope.
                for method in methods {
                    self.resolve_method(method)?;
                }

                // 8. Close the `this` scope
                self.end_scope()?;

                // 9. If we opened a `super` scope, close it now
                if superclass.is_some() {
                    self.end_scope()?;
                }

                // 10. Restore the outer class context
                self.current_class = enclosing_class;
            }

            Stmt::Trait {
                name,
                traits,
                methods,
            } => {
                // 1. Declare & define the trait name
                self.declare(name)?;
                self.define(name);

                // 2. Enter the trait context: `this` is legal, `super` is not
                let enclosing_class: ClassType = self.current_class;
                self.current_class = ClassType::Trait;

                // 3. Resolve the names consumed by `use` clauses
                for trait_expr in traits {
                    self.resolve_expr(trait_expr)?;
                }

                // 4. Members resolve under an implicit `this` scope, exactly
                //    like class members
                self.begin_scope();
                self.insert_synthetic("this", name.line);

                for method in methods {
                    self.resolve_method(method)?;
                }

                self.end_scope()?;

                // 5. Restore the outer class context
                self.current_class = enclosing_class;
            }

            Stmt::Block(statements) => {
                // 1. Push a new anonymous scope for `{ … }`
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s)?;
                }

                // 2. Pop the block scope
                self.end_scope()?;
            }

            Stmt::Var { name, initializer } => {
                // 1. Declare the variable name (marked but not yet defined)
                self.declare(name)?;

                // 2. Resolve the initializer expression, if any
                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }

                // 3. Define the variable so it's available in this scope
                self.define(name);
            }

            Stmt::Function {
                name, declaration, ..
            } => {
                // 1. Declare & define the function name (allow recursion)
                self.declare(name)?;
                self.define(name);

                // 2. Resolve parameters and body under a function context
                self.resolve_function(FunctionType::Function, declaration)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While { condition, body } => {
                // 1. Resolve the loop condition
                self.resolve_expr(condition)?;

                // 2. Resolve the loop body with `break`/`continue` enabled
                self.loop_depth += 1;
                let result: Result<()> = self.resolve_stmt(body);
                self.loop_depth -= 1;

                result?;
            }

            Stmt::For {
                initializer,
                condition,
                increment,
                body,
            } => {
                // 1. Begin the scope the initializer lives in
                self.begin_scope();

                // 2. Resolve the clauses in evaluation order
                if let Some(init) = initializer {
                    self.resolve_stmt(init)?;
                }

                if let Some(cond) = condition {
                    self.resolve_expr(cond)?;
                }

                if let Some(inc) = increment {
                    self.resolve_expr(inc)?;
                }

                // 3. Resolve the body with `break`/`continue` enabled
                self.loop_depth += 1;
                let result: Result<()> = self.resolve_stmt(body);
                self.loop_depth -= 1;

                result?;

                // 4. Exit the initializer scope
                self.end_scope()?;
            }

            Stmt::Break(keyword) | Stmt::Continue(keyword) => {
                if self.loop_depth == 0 {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Control flow statement used outside loop",
                    ));
                }
            }

            Stmt::Return { keyword, value } => {
                // 1. Ensure we're inside a function or method
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Can't return from top-level code",
                    ));
                }

                // 2. In an initializer, only bare `return;` is allowed; it
                //    implicitly yields `this` at runtime.
                if self.current_function == FunctionType::Initializer {
                    if value.is_some() {
                        return Err(LoxError::resolve(
                            keyword.line,
                            "Can't return a value from an initializer.",
                        ));
                    }
                } else if let Some(expr) = value {
                    self.resolve_expr(expr)?;
                }
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {
                // 1. Literals have no sub‑expressions
            }

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Ternary {
                condition,
                on_true,
                on_false,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(on_true)?;
                self.resolve_expr(on_false)?;
            }

            Expr::Variable { id, name } => {
                // 1. Prevent reading a variable in its own initializer
                if let Some(scope) = self.scopes.last() {
                    if let Some(binding) = scope.get(&name.lexeme) {
                        if !binding.defined {
                            return Err(LoxError::resolve(
                                name.line,
                                "Can't read local variable in its own initializer",
                            ));
                        }
                    }
                }

                // 2. Bind this variable occurrence at its lexical depth
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // 1. Resolve the right‑hand side first, then bind the target
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object)?;
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)?;
            }

            Expr::This { id, keyword } => {
                // 1. 'this' is valid inside class bodies and trait bodies
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'this' outside of a class",
                    ));
                }

                // 2. Bind 'this' like a local variable
                self.resolve_local(*id, keyword);
            }

            Expr::Super { id, keyword, .. } => {
                // 1. Disallow outside any class (traits included: a trait does
                //    not know which class it will be merged into)
                if self.current_class == ClassType::None
                    || self.current_class == ClassType::Trait
                {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'super' outside of a class.",
                    ));
                }

                // 2. Disallow in a class with no superclass
                if self.current_class != ClassType::Subclass {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'super' in a class with no superclass.",
                    ));
                }

                // 3. Valid. Bind 'super' like a local variable.
                self.resolve_local(*id, keyword);
            }

            Expr::Lambda { declaration } => {
                self.resolve_function(FunctionType::Function, declaration)?;
            }
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_method(&mut self, method: &MethodDecl) -> Result<()> {
        let function_type: FunctionType = match method.kind {
            FunctionKind::Initializer => FunctionType::Initializer,
            _ => FunctionType::Method,
        };

        self.resolve_function(function_type, &method.declaration)
    }

    /// Enter a fresh scope for a function's parameters + body.
    ///
    /// `loop_depth` is reset for the duration: `break`/`continue` cannot cross
    /// a call boundary even when the declaration sits inside a loop.
    fn resolve_function(&mut self, kind: FunctionType, declaration: &FunctionDecl) -> Result<()> {
        // 1. Save the enclosing contexts so we can restore them later.
        let enclosing: FunctionType = self.current_function;
        let enclosing_loop_depth: usize = self.loop_depth;

        self.current_function = kind;
        self.loop_depth = 0;

        // 2. Begin a new lexical scope for the parameters & body.
        self.begin_scope();

        // 3. Declare and immediately define each parameter.  Parameters are
        //    exempt from the unused-variable check.
        for param in &declaration.params {
            self.declare_param(param)?;
            self.define(param);
        }

        // 4. Resolve each statement in the function body.
        let mut result: Result<()> = Ok(());

        for stmt in &declaration.body {
            result = self.resolve_stmt(stmt);

            if result.is_err() {
                break;
            }
        }

        // 5. End the parameter/body scope and restore the previous contexts
        //    even on the error path.
        let popped: Result<()> = self.end_scope();

        self.current_function = enclosing;
        self.loop_depth = enclosing_loop_depth;

        result?;
        popped
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope, rejecting locals that were never read.
    fn end_scope(&mut self) -> Result<()> {
        let scope: HashMap<String, Binding> = match self.scopes.pop() {
            Some(scope) => scope,
            None => return Ok(()),
        };

        let mut unused: Option<(&String, &Binding)> = None;

        for entry in &scope {
            let (_, binding) = entry;

            if binding.defined && !binding.used && !binding.exempt {
                // Report the earliest declaration for determinism.
                match unused {
                    Some((_, prior)) if prior.line <= binding.line => {}
                    _ => unused = Some((entry.0, entry.1)),
                }
            }
        }

        if let Some((name, binding)) = unused {
            return Err(LoxError::resolve(
                binding.line,
                format!("Local variable '{}' is never used", name),
            ));
        }

        Ok(())
    }

    fn declare(&mut self, name: &Token) -> Result<()> {
        self.declare_binding(name, false)
    }

    fn declare_param(&mut self, name: &Token) -> Result<()> {
        self.declare_binding(name, true)
    }

    fn declare_binding(&mut self, name: &Token, exempt: bool) -> Result<()> {
        // 1. If in a local scope, ensure no duplicate declarations
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                return Err(LoxError::resolve(
                    name.line,
                    "Already a variable with this name in this scope",
                ));
            }

            // 2. Mark the name as declared but not yet defined
            scope.insert(
                name.lexeme.clone(),
                Binding {
                    defined: false,
                    used: false,
                    exempt,
                    line: name.line,
                },
            );
        }

        Ok(())
    }

    fn define(&mut self, name: &Token) {
        // Mark the name as fully defined in the current scope
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(binding) = scope.get_mut(&name.lexeme) {
                binding.defined = true;
            }
        }
    }

    /// Install a synthetic binding (`this`/`super`) in the innermost scope.
    fn insert_synthetic(&mut self, name: &str, line: usize) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Binding {
                    defined: true,
                    used: false,
                    exempt: true,
                    line,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this variable occurrence as either:
    ///  - a local at depth `d`, or
    ///  - a global if not found in any scope.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        // 1. Search each scope from innermost outward
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(binding) = scope.get_mut(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                binding.used = true;

                // 2. Tell the interpreter about the local binding
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        // 3. Not found in any scope → it's a global
        debug!("Resolved '{}' as global", name.lexeme);
        self.interpreter.note_global(id);
    }
}
