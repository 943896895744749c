//! Recursive-descent parser over the scanned token vector.
//!
//! Parse errors are collected rather than fatal: `declaration` catches an
//! error, records it, and re-synchronises at the next statement boundary so
//! one bad statement does not hide diagnostics in the rest of the program.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info};

use crate::ast::{Expr, ExprId, FunctionDecl, FunctionKind, LiteralValue, MethodDecl, Stmt};
use crate::error::LoxError;
use crate::token::{Token, TokenType};

type ParseResult<T> = std::result::Result<T, LoxError>;

// Node ids outlive a single parse: a REPL closure created on one line keeps
// its resolved depths while later lines allocate fresh ids.
static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

fn next_expr_id() -> ExprId {
    NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parse the whole token stream.  Statements that failed to parse are
    /// skipped; the corresponding diagnostics are available via
    /// [`Parser::take_errors`].
    pub fn parse(&mut self) -> Vec<Stmt> {
        info!("Beginning parse over {} token(s)", self.tokens.len());

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(decl) = self.declaration() {
                statements.push(decl);
            }
        }

        statements
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn take_errors(&mut self) -> Vec<LoxError> {
        std::mem::take(&mut self.errors)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> Option<Stmt> {
        let result: ParseResult<Stmt> = if self.match_tokens(&[TokenType::CLASS]) {
            self.class_declaration()
        } else if self.match_tokens(&[TokenType::TRAIT]) {
            self.trait_declaration()
        } else if self.check(&TokenType::FUN) && self.check_next(&TokenType::IDENTIFIER) {
            // `fun` followed by a name is a declaration; a bare `fun (` is an
            // anonymous function expression and falls through to `statement`.
            self.advance();
            self.named_function(FunctionKind::Function)
        } else if self.match_tokens(&[TokenType::VAR]) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),

            Err(e) => {
                debug!("Parse error, synchronizing: {}", e);
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected class name")?;

        let superclass: Option<Expr> = if self.match_tokens(&[TokenType::LESS]) {
            let super_name: Token =
                self.consume(&TokenType::IDENTIFIER, "Expected superclass name")?;

            Some(Expr::Variable {
                id: next_expr_id(),
                name: super_name,
            })
        } else {
            None
        };

        self.consume(&TokenType::LEFT_BRACE, "Expected '{' before class body")?;

        let (traits, methods) = self.member_list("class")?;

        self.consume(&TokenType::RIGHT_BRACE, "Expected '}' after class body")?;

        info!("Parsed class '{}'", name.lexeme);

        Ok(Stmt::Class {
            name,
            superclass,
            traits,
            methods,
        })
    }

    fn trait_declaration(&mut self) -> ParseResult<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected trait name")?;

        self.consume(&TokenType::LEFT_BRACE, "Expected '{' before trait body")?;

        let (traits, methods) = self.member_list("trait")?;

        self.consume(&TokenType::RIGHT_BRACE, "Expected '}' after trait body")?;

        info!("Parsed trait '{}'", name.lexeme);

        Ok(Stmt::Trait {
            name,
            traits,
            methods,
        })
    }

    /// Body of a `class` or `trait`: `use` lists plus methods, class methods
    /// and getters, in any order.
    fn member_list(&mut self, kind: &str) -> ParseResult<(Vec<Expr>, Vec<MethodDecl>)> {
        let mut traits: Vec<Expr> = Vec::new();
        let mut methods: Vec<MethodDecl> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if self.match_tokens(&[TokenType::USE]) {
                loop {
                    let trait_name: Token =
                        self.consume(&TokenType::IDENTIFIER, "Expected trait name after 'use'")?;

                    traits.push(Expr::Variable {
                        id: next_expr_id(),
                        name: trait_name,
                    });

                    if !self.match_tokens(&[TokenType::COMMA]) {
                        break;
                    }
                }

                self.consume(&TokenType::SEMICOLON, "Expected ';' after use declaration")?;

                continue;
            }

            methods.push(self.member(kind)?);
        }

        Ok((traits, methods))
    }

    fn member(&mut self, kind: &str) -> ParseResult<MethodDecl> {
        if self.match_tokens(&[TokenType::CLASS]) {
            let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected class method name")?;
            let declaration: Rc<FunctionDecl> = self.function_body("class method")?;

            return Ok(MethodDecl {
                name,
                kind: FunctionKind::ClassMethod,
                declaration,
            });
        }

        let name: Token = self.consume(
            &TokenType::IDENTIFIER,
            &format!("Expected method name in {} body", kind),
        )?;

        // A getter is a name directly followed by a body, no parameter list.
        if self.check(&TokenType::LEFT_BRACE) {
            self.consume(&TokenType::LEFT_BRACE, "Expected '{' before getter body")?;
            let body: Vec<Stmt> = self.block()?;

            return Ok(MethodDecl {
                name,
                kind: FunctionKind::Getter,
                declaration: Rc::new(FunctionDecl {
                    params: Vec::new(),
                    body,
                }),
            });
        }

        let method_kind: FunctionKind = if name.lexeme == "init" {
            FunctionKind::Initializer
        } else {
            FunctionKind::Method
        };

        let declaration: Rc<FunctionDecl> = self.function_body("method")?;

        Ok(MethodDecl {
            name,
            kind: method_kind,
            declaration,
        })
    }

    fn named_function(&mut self, kind: FunctionKind) -> ParseResult<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected function name")?;
        let declaration: Rc<FunctionDecl> = self.function_body("function")?;

        Ok(Stmt::Function {
            name,
            kind,
            declaration,
        })
    }

    /// Parameter list and braced body, shared by named functions, methods,
    /// class methods and lambdas.
    fn function_body(&mut self, kind: &str) -> ParseResult<Rc<FunctionDecl>> {
        self.consume(
            &TokenType::LEFT_PAREN,
            &format!("Expected '(' before {} parameters", kind),
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= 255 {
                    let at: usize = self.peek().line;
                    self.errors
                        .push(LoxError::parse(at, "Can't have more than 255 parameters"));
                }

                params.push(self.consume(&TokenType::IDENTIFIER, "Expected parameter name")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after parameters")?;
        self.consume(
            &TokenType::LEFT_BRACE,
            &format!("Expected '{{' before {} body", kind),
        )?;

        let body: Vec<Stmt> = self.block()?;

        Ok(Rc::new(FunctionDecl { params, body }))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name: Token = self.consume(&TokenType::IDENTIFIER, "Expected variable name")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            &TokenType::SEMICOLON,
            "Expected ';' after variable declaration",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_tokens(&[TokenType::BREAK]) {
            return self.break_statement();
        }
        if self.match_tokens(&[TokenType::CONTINUE]) {
            return self.continue_statement();
        }
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }
        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }
        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }
        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }
        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }
        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block()?));
        }

        self.expression_statement()
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword: Token = self.previous().clone();
        self.consume(&TokenType::SEMICOLON, "Expected ';' after 'break'")?;

        Ok(Stmt::Break(keyword))
    }

    fn continue_statement(&mut self) -> ParseResult<Stmt> {
        let keyword: Token = self.previous().clone();
        self.consume(&TokenType::SEMICOLON, "Expected ';' after 'continue'")?;

        Ok(Stmt::Continue(keyword))
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' after 'for'")?;

        let initializer: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(Box::new(self.var_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&TokenType::SEMICOLON, "Expected ';' after loop condition")?;

        let increment: Option<Expr> = if !self.check(&TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after for clauses")?;

        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
        })
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' after 'if'")?;
        let condition: Expr = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after if condition")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);

        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value: Expr = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expected ';' after value")?;

        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if !self.check(&TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(&TokenType::SEMICOLON, "Expected ';' after return value")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(&TokenType::LEFT_PAREN, "Expected '(' after 'while'")?;
        let condition: Expr = self.expression()?;
        self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after condition")?;

        let body: Box<Stmt> = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(&TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(decl) = self.declaration() {
                statements.push(decl);
            }
        }

        self.consume(&TokenType::RIGHT_BRACE, "Expected '}' after block")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(&TokenType::SEMICOLON, "Expected ';' after expression")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions (loosest precedence first)
    // ─────────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> ParseResult<Expr> {
        self.comma()
    }

    fn comma(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.assignment()?;

        while self.match_tokens(&[TokenType::COMMA]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.assignment()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr: Expr = self.conditional()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            match expr {
                Expr::Variable { name, .. } => {
                    return Ok(Expr::Assign {
                        id: next_expr_id(),
                        name,
                        value: Box::new(value),
                    });
                }

                Expr::Get { object, name } => {
                    return Ok(Expr::Set {
                        object,
                        name,
                        value: Box::new(value),
                    });
                }

                _ => {
                    // Reported but not fatal: the right-hand side has already
                    // been consumed, so parsing can continue.
                    self.errors
                        .push(LoxError::parse(equals.line, "Invalid assignment target"));
                }
            }
        }

        Ok(expr)
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        let condition: Expr = self.logical_or()?;

        if self.match_tokens(&[TokenType::QUESTION]) {
            let on_true: Expr = self.expression()?;
            self.consume(&TokenType::COLON, "Expected ':' after expression")?;
            let on_false: Expr = self.conditional()?;

            return Ok(Expr::Ternary {
                condition: Box::new(condition),
                on_true: Box::new(on_true),
                on_false: Box::new(on_false),
            });
        }

        Ok(condition)
    }

    fn logical_or(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.left_binary(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL], Self::comparison)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.left_binary(
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.left_binary(&[TokenType::MINUS, TokenType::PLUS], Self::factor)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        self.left_binary(&[TokenType::SLASH, TokenType::STAR], Self::unary)
    }

    /// Shared helper for the left-associative binary levels.
    fn left_binary(
        &mut self,
        operators: &[TokenType],
        matcher: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut expr: Expr = matcher(self)?;

        while self.match_tokens(operators) {
            let operator: Token = self.previous().clone();
            let right: Expr = matcher(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name: Token =
                    self.consume(&TokenType::IDENTIFIER, "Expected property name after '.'")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(&TokenType::RIGHT_PAREN) {
            // Arguments sit below the comma operator, which would otherwise
            // swallow the separators.
            arguments.push(self.assignment()?);

            while self.match_tokens(&[TokenType::COMMA]) {
                if arguments.len() >= 255 {
                    let at: usize = self.peek().line;
                    self.errors
                        .push(LoxError::parse(at, "Can't have more than 255 arguments"));
                }

                arguments.push(self.assignment()?);
            }
        }

        let paren: Token = self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after arguments")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(LiteralValue::False));
        }
        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(LiteralValue::True));
        }
        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if self.match_tokens(&[TokenType::NUMBER(0.0), TokenType::STRING(String::new())]) {
            let literal: LiteralValue = match &self.previous().token_type {
                TokenType::NUMBER(n) => LiteralValue::Number(*n),
                TokenType::STRING(s) => LiteralValue::Str(s.clone()),
                _ => LiteralValue::Nil,
            };

            return Ok(Expr::Literal(literal));
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                id: next_expr_id(),
                keyword: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword: Token = self.previous().clone();
            self.consume(&TokenType::DOT, "Expected '.' after 'super'")?;
            let method: Token =
                self.consume(&TokenType::IDENTIFIER, "Expected superclass method name")?;

            return Ok(Expr::Super {
                id: next_expr_id(),
                keyword,
                method,
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                id: next_expr_id(),
                name: self.previous().clone(),
            });
        }

        if self.match_tokens(&[TokenType::FUN]) {
            let declaration: Rc<FunctionDecl> = self.function_body("lambda")?;

            return Ok(Expr::Lambda { declaration });
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr: Expr = self.expression()?;
            self.consume(&TokenType::RIGHT_PAREN, "Expected ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        // Error productions: a binary operator with no left operand is
        // reported, then the right-hand side is consumed at the level the
        // operator would have produced so parsing can continue behind it.
        const ERROR_PRODUCTIONS: &[(&[TokenType], fn(&mut Parser) -> ParseResult<Expr>)] = &[
            (
                &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
                Parser::comparison,
            ),
            (
                &[
                    TokenType::GREATER,
                    TokenType::GREATER_EQUAL,
                    TokenType::LESS,
                    TokenType::LESS_EQUAL,
                ],
                Parser::term,
            ),
            (&[TokenType::PLUS], Parser::factor),
            (&[TokenType::SLASH, TokenType::STAR], Parser::unary),
            (&[TokenType::COMMA], Parser::conditional),
        ];

        for (token_group, matcher) in ERROR_PRODUCTIONS {
            if self.match_tokens(token_group) {
                let at: usize = self.previous().line;

                self.errors.push(LoxError::parse(
                    at,
                    "Expected expression before operator",
                ));

                return matcher(self);
            }
        }

        Err(LoxError::parse(self.peek().line, "Expected expression."))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token plumbing
    // ─────────────────────────────────────────────────────────────────────────

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            return Ok(self.advance().clone());
        }

        Err(LoxError::parse(self.peek().line, message))
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        &self.peek().token_type == token_type
    }

    fn check_next(&self, token_type: &TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type != TokenType::EOF && &token.token_type == token_type,
            None => false,
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Discard tokens until a likely statement boundary.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::BREAK
                | TokenType::CLASS
                | TokenType::CONTINUE
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::TRAIT => return,

                _ => {}
            }

            self.advance();
        }
    }
}
