//! Driver tying the pipeline together: scan → parse → resolve → interpret.
//!
//! Static diagnostics (scan, parse, resolve) go to stderr and suppress the
//! downstream stages; runtime errors unwind to here.  The REPL resets the
//! error flags per line but keeps the interpreter (and its globals) alive.

use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use log::info;

use crate::ast::Stmt;
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::token::Token;

pub struct Lox {
    interpreter: Interpreter,
    had_error: bool,
    had_runtime_error: bool,
}

impl Lox {
    pub fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Like [`Lox::new`] but with `print` output redirected, for tests.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        Lox {
            interpreter: Interpreter::with_output(output),
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Execute a whole source file.
    pub fn run_file(&mut self, path: &Path) -> Result<()> {
        let source: String = fs::read_to_string(path)?;

        self.run(&source);

        Ok(())
    }

    /// Interactive prompt: one line at a time, globals preserved across lines.
    pub fn run_prompt(&mut self) -> Result<()> {
        let stdin = io::stdin();

        loop {
            print!("> ");
            io::stdout().flush()?;

            let mut line: String = String::new();

            if stdin.lock().read_line(&mut line)? == 0 {
                println!("Bye.");
                break;
            }

            let line: &str = line.trim_end_matches(['\n', '\r']);

            if !line.is_empty() {
                self.run(line);
            }

            self.had_error = false;
            self.had_runtime_error = false;
        }

        Ok(())
    }

    /// Run one source unit through the full pipeline.
    pub fn run(&mut self, source: &str) {
        info!("Running source unit of {} byte(s)", source.len());

        let scanner: Scanner = Scanner::new(source);

        let mut tokens: Vec<Token> = Vec::new();
        let mut static_errors: Vec<LoxError> = Vec::new();

        for item in scanner {
            match item {
                Ok(token) => tokens.push(token),
                Err(e) => static_errors.push(e),
            }
        }

        let mut parser: Parser = Parser::new(tokens);
        let statements: Vec<Stmt> = parser.parse();

        static_errors.extend(parser.take_errors());

        if !static_errors.is_empty() {
            for e in &static_errors {
                eprintln!("{}", e);
            }

            self.had_error = true;
            return;
        }

        let mut resolver: Resolver = Resolver::new(&mut self.interpreter);

        if let Err(e) = resolver.resolve(&statements) {
            eprintln!("{}", e);
            self.had_error = true;
            return;
        }

        if let Err(e) = self.interpreter.interpret(&statements) {
            eprintln!("{}", e);
            self.had_runtime_error = true;
        }
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}
